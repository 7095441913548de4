pub mod auth;
pub mod logging;
pub mod rate_limit;

pub use auth::{auth_middleware, get_auth_user, AuthState, AuthUser};
pub use logging::logging_middleware;
pub use rate_limit::{rate_limit_middleware, RateLimitConfig, RateLimiter};
