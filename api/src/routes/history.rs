use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::middleware::AuthUser;
use crate::models::HistoryQuery;
use crate::services::AppServices;
use crate::utils::{envelope, AppResult};

pub async fn list_history(
    State(services): State<Arc<AppServices>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let page = services
        .task_store
        .list_history(&user.user_id, query.page, query.limit, query.offset, query.task_id, query.action_type)
        .await?;
    Ok(Json(envelope(page, None)))
}

pub async fn delete_history(
    State(services): State<Arc<AppServices>>,
    Extension(user): Extension<AuthUser>,
    Path(history_id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    services.task_store.delete_history(&user.user_id, history_id).await?;
    Ok(Json(envelope(serde_json::Value::Null, None)))
}
