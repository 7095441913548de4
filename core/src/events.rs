//! CloudEvents v1.0 envelope construction and partition-key hashing (spec §4.E).

use crate::model::{Priority, TaskEventType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

pub const EVENT_SOURCE: &str = "backend-api";
pub const EVENT_SPEC_VERSION: &str = "1.0";
pub const DATA_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudEvent {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub event_type: String,
    pub source: String,
    pub specversion: String,
    pub time: DateTime<Utc>,
    pub datacontenttype: String,
    pub data: serde_json::Value,
}

impl CloudEvent {
    pub fn new(event_type: TaskEventType, data: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type: event_type.to_string(),
            source: EVENT_SOURCE.to_string(),
            specversion: EVENT_SPEC_VERSION.to_string(),
            time: Utc::now(),
            datacontenttype: DATA_CONTENT_TYPE.to_string(),
            data,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskCreatedData {
    pub task_id: Uuid,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub tags: Vec<String>,
    pub is_recurring: bool,
    pub series_id: Option<Uuid>,
    pub recurrence_pattern: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Key-set of fields that actually changed — never a "null means absent"
/// struct. Kept as a JSON object so the set of present keys *is* the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskUpdatedData {
    pub task_id: Uuid,
    pub user_id: String,
    pub updated_fields: serde_json::Map<String, serde_json::Value>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDeletedData {
    pub task_id: Uuid,
    pub user_id: String,
    pub series_id: Option<Uuid>,
    pub deleted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskCompletedData {
    pub task_id: Uuid,
    pub user_id: String,
    pub series_id: Option<Uuid>,
    pub recurrence_pattern: Option<String>,
    pub completed_at: DateTime<Utc>,
}

/// Hash `user_id` into a partition key so all of a user's events land on the
/// same partition, preserving per-user ordering. The original producer used
/// MD5 purely for distribution, not cryptographic strength; `DefaultHasher`
/// (SipHash) serves the same non-cryptographic purpose without pulling in an
/// MD5 dependency the rest of the stack has no other use for.
pub fn partition_key(user_id: &str) -> String {
    let mut hasher = DefaultHasher::new();
    user_id.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

pub const TOPIC_TASK_OPERATIONS: &str = "task-operations";
pub const TOPIC_ALERTS: &str = "alerts";
pub const TOPIC_TASK_MODIFICATIONS: &str = "task-modifications";
pub const TOPIC_PARTITIONS: i32 = 12;
pub const DLQ_SUFFIX: &str = "-dlq";

pub fn dlq_topic(topic: &str) -> String {
    format!("{topic}{DLQ_SUFFIX}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_user_id_always_hashes_to_the_same_key() {
        assert_eq!(partition_key("user-1"), partition_key("user-1"));
    }

    #[test]
    fn different_users_usually_hash_differently() {
        assert_ne!(partition_key("user-1"), partition_key("user-2"));
    }

    #[test]
    fn dlq_topic_naming() {
        assert_eq!(dlq_topic(TOPIC_TASK_OPERATIONS), "task-operations-dlq");
    }
}
