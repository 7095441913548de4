use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::{Deserialize, Deserializer};
use std::sync::Arc;
use uuid::Uuid;

use crate::middleware::AuthUser;
use crate::models::{
    CreateTaskRequest, POPUP_TASK_COMPLETED, POPUP_TASK_CREATED, POPUP_TASK_DELETED,
    POPUP_TASK_INCOMPLETE, POPUP_TASK_UPDATED,
};
use crate::services::{AppServices, TaskPatch};
use crate::utils::{envelope, AppResult};
use taskflow_core::model::TaskStatus;

/// A present-but-`null` JSON field deserializes to `Some(None)`, distinct
/// from an absent field which `#[serde(default)]` leaves as the outer `None`.
fn deserialize_double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::deserialize(de).map(Some)
}

/// PATCH/PUT body (spec §4.D `update`): a field absent from the JSON is never
/// touched; `due_date`/`description` present with `null` explicitly clear it.
#[derive(Debug, Deserialize, Default)]
pub struct UpdateTaskRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub due_date: Option<Option<chrono::DateTime<chrono::Utc>>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
}

impl From<UpdateTaskRequest> for TaskPatch {
    fn from(req: UpdateTaskRequest) -> Self {
        TaskPatch {
            title: req.title,
            description: req.description,
            due_date: req.due_date,
            tags: req.tags,
            status: req.status,
        }
    }
}

pub async fn create_task(
    State(services): State<Arc<AppServices>>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<CreateTaskRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let task = services
        .task_store
        .create(&user.user_id, input.title, input.description, input.due_date, input.tags)
        .await?;
    services.event_publisher.task_created(&task).await;
    Ok(Json(envelope(task, Some(POPUP_TASK_CREATED))))
}

pub async fn list_tasks(
    State(services): State<Arc<AppServices>>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<serde_json::Value>> {
    let tasks = services.task_store.list_all(&user.user_id).await?;
    Ok(Json(envelope(tasks, None)))
}

pub async fn get_task(
    State(services): State<Arc<AppServices>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let task = services.task_store.get(&user.user_id, id).await?;
    Ok(Json(envelope(task, None)))
}

pub async fn update_task(
    State(services): State<Arc<AppServices>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateTaskRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let before = services.task_store.get(&user.user_id, id).await?;
    let task = services.task_store.update(&user.user_id, id, input.into()).await?;

    let mut updated_fields = serde_json::Map::new();
    if before.title != task.title {
        updated_fields.insert("title".to_string(), serde_json::json!(task.title));
    }
    if before.description != task.description {
        updated_fields.insert("description".to_string(), serde_json::json!(task.description));
    }
    if before.due_date != task.due_date {
        updated_fields.insert("due_date".to_string(), serde_json::json!(task.due_date));
    }
    if before.tags != task.tags {
        updated_fields.insert("tags".to_string(), serde_json::json!(task.tags));
    }
    if before.status != task.status {
        updated_fields.insert("status".to_string(), serde_json::json!(task.status.to_string()));
    }
    services
        .event_publisher
        .task_updated(&user.user_id, id, updated_fields, task.updated_at)
        .await;

    Ok(Json(envelope(task, Some(POPUP_TASK_UPDATED))))
}

pub async fn delete_task(
    State(services): State<Arc<AppServices>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let task = services.task_store.get(&user.user_id, id).await?;
    services.task_store.delete(&user.user_id, id).await?;
    services
        .event_publisher
        .task_deleted(&user.user_id, id, task.series_id, chrono::Utc::now())
        .await;
    Ok(Json(envelope(serde_json::Value::Null, Some(POPUP_TASK_DELETED))))
}

pub async fn complete_task(
    State(services): State<Arc<AppServices>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let task = services.task_store.mark_complete(&user.user_id, id).await?;
    services.event_publisher.task_completed(&task).await;
    Ok(Json(envelope(task, Some(POPUP_TASK_COMPLETED))))
}

pub async fn incomplete_task(
    State(services): State<Arc<AppServices>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let task = services.task_store.mark_incomplete(&user.user_id, id).await?;
    let mut updated_fields = serde_json::Map::new();
    updated_fields.insert("status".to_string(), serde_json::json!(task.status.to_string()));
    services
        .event_publisher
        .task_updated(&user.user_id, id, updated_fields, task.updated_at)
        .await;
    Ok(Json(envelope(task, Some(POPUP_TASK_INCOMPLETE))))
}
