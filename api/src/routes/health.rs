use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::services::AppServices;

/// Liveness: process is up and can answer HTTP.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Readiness: database and cache are both reachable.
pub async fn ready(State(services): State<Arc<AppServices>>) -> (StatusCode, Json<serde_json::Value>) {
    let db_ok = sqlx::query("SELECT 1").execute(&services.db).await.is_ok();
    let cache_ok = services.cache.exists("health:check").await.is_ok();

    if db_ok && cache_ok {
        (StatusCode::OK, Json(serde_json::json!({ "status": "ready" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "status": "not ready", "database": db_ok, "cache": cache_ok })),
        )
    }
}
