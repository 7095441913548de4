use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Popup codes the `{success, data, popup, error}` envelope echoes (spec §6).
pub const POPUP_TASK_CREATED: &str = "TASK_CREATED";
pub const POPUP_TASK_UPDATED: &str = "TASK_UPDATED";
pub const POPUP_TASK_DELETED: &str = "TASK_DELETED";
pub const POPUP_TASK_COMPLETED: &str = "TASK_COMPLETED";
pub const POPUP_TASK_INCOMPLETE: &str = "TASK_INCOMPLETE";

#[derive(Debug, Clone, Serialize)]
pub struct WeeklyStats {
    pub tasks_created_this_week: i64,
    pub tasks_completed_this_week: i64,
    pub total_completed: i64,
    pub total_incomplete: i64,
    pub week_start: chrono::DateTime<chrono::Utc>,
    pub week_end: chrono::DateTime<chrono::Utc>,
    pub total_tasks: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSeriesRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub recurrence_pattern: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListRecurringQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecurringTaskSeriesResponse {
    pub series_id: Uuid,
    pub user_id: String,
    pub base_task_template: serde_json::Value,
    pub recurrence_pattern: String,
    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}
