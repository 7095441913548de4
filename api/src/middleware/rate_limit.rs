use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::CacheClient;
use crate::middleware::auth::AuthUser;
use crate::utils::{AppError, AppResult};

#[derive(Clone)]
pub struct RateLimitConfig {
    pub requests_per_minute: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 100,
        }
    }
}

/// Per-identifier sliding-minute counter backed by Redis, so limits are
/// shared across every API replica rather than per-process.
#[derive(Clone)]
pub struct RateLimiter {
    cache: Arc<CacheClient>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(cache: Arc<CacheClient>, config: RateLimitConfig) -> Self {
        Self { cache, config }
    }

    pub async fn check(&self, identifier: &str) -> AppResult<bool> {
        let now = chrono::Utc::now();
        let minute_window = now.format("%Y%m%d%H%M").to_string();
        let key = format!("ratelimit:{identifier}:{minute_window}");

        let count = self.cache.increment(&key).await?;
        if count == 1 {
            self.cache.expire(&key, Duration::from_secs(60)).await?;
        }

        Ok(count <= self.config.requests_per_minute)
    }
}

fn identifier(headers: &HeaderMap, request: &Request) -> String {
    if let Some(user) = request.extensions().get::<AuthUser>() {
        return format!("user:{}", user.user_id);
    }

    if let Some(xff) = headers.get("X-Forwarded-For") {
        if let Ok(xff_str) = xff.to_str() {
            if let Some(ip) = xff_str.split(',').next() {
                return format!("ip:{}", ip.trim());
            }
        }
    }

    "ip:unknown".to_string()
}

pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let id = identifier(&headers, &request);

    if !limiter.check(&id).await? {
        return Err(AppError::Transient(
            "rate limit exceeded, try again shortly".to_string(),
        ));
    }

    Ok(next.run(request).await)
}
