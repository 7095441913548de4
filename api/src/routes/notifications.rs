use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::middleware::AuthUser;
use crate::models::NotificationQuery;
use crate::services::AppServices;
use crate::utils::{envelope, AppResult};

pub async fn list_notifications(
    State(services): State<Arc<AppServices>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<NotificationQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let notifications = services.notification.list(&user.user_id, query.unread.unwrap_or(false)).await?;
    Ok(Json(envelope(notifications, None)))
}

pub async fn unread_count(
    State(services): State<Arc<AppServices>>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<serde_json::Value>> {
    let count = services.notification.unread_count(&user.user_id).await?;
    Ok(Json(envelope(serde_json::json!({ "count": count }), None)))
}

pub async fn mark_read(
    State(services): State<Arc<AppServices>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let notification = services.notification.mark_read(&user.user_id, id).await?;
    Ok(Json(envelope(notification, None)))
}

pub async fn mark_all_read(
    State(services): State<Arc<AppServices>>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<serde_json::Value>> {
    let count = services.notification.mark_all_read(&user.user_id).await?;
    Ok(Json(envelope(serde_json::json!({ "marked": count }), None)))
}
