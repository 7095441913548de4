pub mod auth;
pub mod chat;
pub mod health;
pub mod history;
pub mod notifications;
pub mod recurring;
pub mod stats;
pub mod tasks;

use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{auth_middleware, logging_middleware, rate_limit_middleware, AuthState, RateLimitConfig, RateLimiter};
use crate::services::AppServices;

/// Assembles the HTTP surface (spec §6). Public routes (health, signup/login,
/// the cleanup cron hook) skip auth entirely; everything else requires a
/// verified bearer credential and is rate-limited per caller.
pub fn create_router(services: Arc<AppServices>, auth_state: Arc<AuthState>, cors_origins: Vec<String>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(
            cors_origins
                .iter()
                .map(|origin| origin.parse().expect("Invalid CORS origin"))
                .collect::<Vec<_>>(),
        )
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::PATCH, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
        .allow_credentials(true);

    let rate_limiter = Arc::new(RateLimiter::new(Arc::new(services.cache.clone()), RateLimitConfig::default()));

    let public_routes = Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/admin/cleanup/messages", post(chat::cleanup_messages))
        .with_state(services.clone());

    let protected_routes = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/tasks", post(tasks::create_task))
        .route("/tasks", get(tasks::list_tasks))
        .route("/tasks/:id", get(tasks::get_task))
        .route("/tasks/:id", put(tasks::update_task))
        .route("/tasks/:id", delete(tasks::delete_task))
        .route("/tasks/:id/complete", patch(tasks::complete_task))
        .route("/tasks/:id/incomplete", patch(tasks::incomplete_task))
        .route("/history", get(history::list_history))
        .route("/history/:id", delete(history::delete_history))
        .route("/stats/weekly", get(stats::weekly_stats))
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/unread/count", get(notifications::unread_count))
        .route("/notifications/:id/read", patch(notifications::mark_read))
        .route("/notifications/mark-all-read", patch(notifications::mark_all_read))
        .route("/recurring-tasks", post(recurring::create_series))
        .route("/recurring-tasks", get(recurring::list_series))
        .route("/recurring-tasks/:id", get(recurring::get_series))
        .route("/recurring-tasks/:id", put(recurring::update_series))
        .route("/recurring-tasks/:id", delete(recurring::delete_series))
        .route("/recurring-tasks/:id/tasks", get(recurring::list_tasks_in_series))
        .route("/chat", post(chat::chat))
        .route("/:user_id/conversations", get(chat::list_conversations))
        .route("/:user_id/conversations/:id/messages", get(chat::load_messages))
        .layer(middleware::from_fn_with_state(rate_limiter, rate_limit_middleware))
        .layer(middleware::from_fn_with_state(auth_state.clone(), auth_middleware))
        .with_state(services.clone());

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(logging_middleware))
        .layer(cors)
}
