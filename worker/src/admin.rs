//! Operator-facing admin surface (spec §4.F: "a manual reprocess operation
//! resets the retry counter"). Distinct from `/health` and `/ready`, which
//! are unauthenticated liveness probes — this mutates DLQ state, so it's
//! gated behind a shared operator token rather than left open on the same
//! port.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::dlq::DlqConsumer;

#[derive(Clone)]
struct AdminState {
    dlq: DlqConsumer,
    admin_token: String,
}

pub fn router(dlq: DlqConsumer, admin_token: String) -> Router {
    let state = AdminState { dlq, admin_token };

    Router::new()
        .route("/admin/dlq/reprocess/:event_id", post(reprocess))
        .with_state(state)
}

fn is_authorized(headers: &HeaderMap, admin_token: &str) -> bool {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token == admin_token)
}

/// `POST /admin/dlq/reprocess/{event_id}` — resets the retry counter so the
/// next DLQ delivery of `event_id` gets a fresh backoff sequence instead of
/// going straight to the persistent-failure alert.
async fn reprocess(
    State(state): State<AdminState>,
    headers: HeaderMap,
    Path(event_id): Path<Uuid>,
) -> (StatusCode, Json<serde_json::Value>) {
    if !is_authorized(&headers, &state.admin_token) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"success": false, "error": "missing or invalid admin token"})),
        );
    }

    state.dlq.manual_reprocess(event_id).await;
    info!(event_id = %event_id, "DLQ retry counter reset via manual reprocess");

    (StatusCode::OK, Json(json!({"success": true, "data": {"event_id": event_id}})))
}
