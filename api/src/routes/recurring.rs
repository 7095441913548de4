use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::middleware::AuthUser;
use crate::models::{CreateSeriesRequest, ListRecurringQuery, RecurringTaskSeriesResponse};
use crate::services::AppServices;
use crate::utils::{envelope, AppResult};
use taskflow_core::model::RecurringTaskSeries;

impl From<RecurringTaskSeries> for RecurringTaskSeriesResponse {
    fn from(series: RecurringTaskSeries) -> Self {
        RecurringTaskSeriesResponse {
            series_id: series.series_id,
            user_id: series.user_id,
            base_task_template: series.base_task_template,
            recurrence_pattern: series.recurrence_pattern,
            is_active: series.is_active,
            created_at: series.created_at,
            updated_at: series.updated_at,
        }
    }
}

pub async fn create_series(
    State(services): State<Arc<AppServices>>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<CreateSeriesRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let (series, first_instance) = services
        .task_store
        .series_create(&user.user_id, input.title, input.description, input.tags, input.recurrence_pattern)
        .await?;
    services.event_publisher.task_created(&first_instance).await;

    let response: RecurringTaskSeriesResponse = series.into();
    Ok(Json(envelope(
        serde_json::json!({ "series": response, "first_task": first_instance }),
        None,
    )))
}

pub async fn list_series(
    State(services): State<Arc<AppServices>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListRecurringQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let series = services.task_store.series_list(&user.user_id, query.include_inactive).await?;
    let response: Vec<RecurringTaskSeriesResponse> = series.into_iter().map(Into::into).collect();
    Ok(Json(envelope(response, None)))
}

pub async fn get_series(
    State(services): State<Arc<AppServices>>,
    Extension(user): Extension<AuthUser>,
    Path(series_id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let series = services.task_store.series_get(&user.user_id, series_id).await?;
    let response: RecurringTaskSeriesResponse = series.into();
    Ok(Json(envelope(response, None)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateSeriesRequest {
    #[serde(default)]
    pub recurrence_pattern: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

pub async fn update_series(
    State(services): State<Arc<AppServices>>,
    Extension(user): Extension<AuthUser>,
    Path(series_id): Path<Uuid>,
    Json(input): Json<UpdateSeriesRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let series = services
        .task_store
        .series_update(&user.user_id, series_id, input.recurrence_pattern, input.is_active)
        .await?;
    let response: RecurringTaskSeriesResponse = series.into();
    Ok(Json(envelope(response, None)))
}

pub async fn delete_series(
    State(services): State<Arc<AppServices>>,
    Extension(user): Extension<AuthUser>,
    Path(series_id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    services.task_store.series_delete(&user.user_id, series_id).await?;
    Ok(Json(envelope(serde_json::Value::Null, None)))
}

pub async fn list_tasks_in_series(
    State(services): State<Arc<AppServices>>,
    Extension(user): Extension<AuthUser>,
    Path(series_id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let tasks = services.task_store.list_tasks_in_series(&user.user_id, series_id).await?;
    Ok(Json(envelope(tasks, None)))
}
