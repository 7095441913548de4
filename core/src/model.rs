use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Task priority, derivable from `(title, due_date, now)` — see [`crate::priority`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    VeryImportant,
    High,
    Medium,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::VeryImportant => write!(f, "VERY_IMPORTANT"),
            Priority::High => write!(f, "HIGH"),
            Priority::Medium => write!(f, "MEDIUM"),
            Priority::Low => write!(f, "LOW"),
        }
    }
}

impl Priority {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "VERY_IMPORTANT" => Some(Self::VeryImportant),
            "HIGH" => Some(Self::High),
            "MEDIUM" => Some(Self::Medium),
            "LOW" => Some(Self::Low),
            _ => None,
        }
    }
}

use std::fmt;

/// Task lifecycle status. Kept in lockstep with `is_completed`/`completed_at`
/// by every Task Store mutation — never set independently.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::NotStarted => write!(f, "NOT_STARTED"),
            TaskStatus::InProgress => write!(f, "IN_PROGRESS"),
            TaskStatus::Completed => write!(f, "COMPLETED"),
        }
    }
}

impl TaskStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "NOT_STARTED" => Some(Self::NotStarted),
            "IN_PROGRESS" => Some(Self::InProgress),
            "COMPLETED" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// The closed tag vocabulary enforced by [`crate::tags::validate_tags`].
pub const TAG_VOCABULARY: [&str; 7] = [
    "Work", "Personal", "Shopping", "Health", "Finance", "Learning", "Urgent",
];

pub const MAX_TAGS: usize = 5;
pub const MAX_TITLE_LEN: usize = 255;
pub const MAX_DESCRIPTION_LEN: usize = 5000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub due_date: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub priority: Priority,
    pub status: TaskStatus,
    pub series_id: Option<Uuid>,
    pub recurrence_pattern: Option<String>,
}

impl Task {
    pub fn is_recurring(&self) -> bool {
        self.series_id.is_some()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryAction {
    Created,
    Updated,
    Deleted,
    Completed,
    Incompleted,
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryAction::Created => write!(f, "CREATED"),
            HistoryAction::Updated => write!(f, "UPDATED"),
            HistoryAction::Deleted => write!(f, "DELETED"),
            HistoryAction::Completed => write!(f, "COMPLETED"),
            HistoryAction::Incompleted => write!(f, "INCOMPLETED"),
        }
    }
}

impl HistoryAction {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "CREATED" => Some(Self::Created),
            "UPDATED" => Some(Self::Updated),
            "DELETED" => Some(Self::Deleted),
            "COMPLETED" => Some(Self::Completed),
            "INCOMPLETED" => Some(Self::Incompleted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskHistory {
    pub history_id: Uuid,
    pub task_id: Option<Uuid>,
    pub task_title: String,
    pub action_type: HistoryAction,
    pub description: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub task_id: Uuid,
    pub user_id: String,
    pub message: String,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

impl Notification {
    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }
}

pub const NOTIFICATION_PRUNE_LIMIT: i64 = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringTaskSeries {
    pub series_id: Uuid,
    pub user_id: String,
    pub base_task_template: serde_json::Value,
    pub recurrence_pattern: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TaskEventType {
    TaskCreated,
    TaskUpdated,
    TaskDeleted,
    TaskCompleted,
}

impl fmt::Display for TaskEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskEventType::TaskCreated => write!(f, "task.created"),
            TaskEventType::TaskUpdated => write!(f, "task.updated"),
            TaskEventType::TaskDeleted => write!(f, "task.deleted"),
            TaskEventType::TaskCompleted => write!(f, "task.completed"),
        }
    }
}

impl TaskEventType {
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "task.created" => Some(Self::TaskCreated),
            "task.updated" => Some(Self::TaskUpdated),
            "task.deleted" => Some(Self::TaskDeleted),
            "task.completed" => Some(Self::TaskCompleted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEvent {
    pub event_id: Uuid,
    pub event_type: TaskEventType,
    pub user_id: String,
    pub task_id: Option<Uuid>,
    pub payload: serde_json::Value,
    pub published_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
        }
    }
}

impl MessageRole {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

/// Sentinel the streaming surface sends for a message whose id is not yet known.
/// The Conversation Store mints a fresh id in its place — see §4.H.
pub const PLACEHOLDER_ITEM_ID: &str = "pending";

pub const MESSAGE_RETENTION_DAYS: i64 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub external_item_id: String,
    pub conversation_id: Uuid,
    pub user_id: String,
    pub role: MessageRole,
    pub content: String,
    pub tool_calls: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub const PROCESSED_EVENT_TTL_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedEvent {
    pub event_id: Uuid,
    pub processed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}
