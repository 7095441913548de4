use axum::{extract::State, Extension, Json};
use std::sync::Arc;

use crate::middleware::AuthUser;
use crate::models::WeeklyStats;
use crate::services::AppServices;
use crate::utils::{envelope, AppResult};

pub async fn weekly_stats(
    State(services): State<Arc<AppServices>>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<serde_json::Value>> {
    let stats = services.task_store.weekly_stats(&user.user_id).await?;
    Ok(Json(envelope(
        WeeklyStats {
            tasks_created_this_week: stats.tasks_created_this_week,
            tasks_completed_this_week: stats.tasks_completed_this_week,
            total_completed: stats.total_completed,
            total_incomplete: stats.total_incomplete,
            week_start: stats.week_start,
            week_end: stats.week_end,
            total_tasks: stats.total_tasks,
        },
        None,
    )))
}
