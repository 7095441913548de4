//! Event Publisher (spec §4.E): wraps a Task Store mutation with a CloudEvents
//! envelope and an audit (`TaskEvent`) row. Publish failures never roll back
//! the store mutation that already happened — they are logged and swallowed.

use chrono::{DateTime, Utc};
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use serde_json::json;
use sqlx::PgPool;
use std::time::Duration;
use taskflow_core::events::{
    partition_key, CloudEvent, TaskCompletedData, TaskCreatedData, TaskDeletedData, TaskUpdatedData,
    TOPIC_TASK_OPERATIONS,
};
use taskflow_core::model::{Task, TaskEventType};
use uuid::Uuid;

const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct EventPublisher {
    producer: FutureProducer,
    db: PgPool,
}

impl EventPublisher {
    /// Idempotent, acks=all, bounded retries — spec §4.E producer contract.
    pub fn new(brokers: &str, db: PgPool) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("enable.idempotence", "true")
            .set("acks", "all")
            .set("retries", "10")
            .set("message.timeout.ms", "30000")
            .create()?;

        Ok(Self { producer, db })
    }

    async fn publish(&self, user_id: &str, task_id: Option<Uuid>, event: CloudEvent) {
        let key = partition_key(user_id);
        let payload = match serde_json::to_vec(&event) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!("failed to serialize event {}: {e}", event.id);
                return;
            }
        };

        let record = FutureRecord::to(TOPIC_TASK_OPERATIONS).key(&key).payload(&payload);

        match self
            .producer
            .send(record, Timeout::After(PUBLISH_TIMEOUT))
            .await
        {
            Ok(_) => {
                if let Err(e) = self.insert_audit_row(&event, user_id, task_id).await {
                    tracing::error!("failed to write audit row for event {}: {e}", event.id);
                }
            }
            Err((kafka_err, _)) => {
                tracing::error!(
                    "publish failed for event {} (type={}): {kafka_err}",
                    event.id,
                    event.event_type
                );
            }
        }
    }

    async fn insert_audit_row(
        &self,
        event: &CloudEvent,
        user_id: &str,
        task_id: Option<Uuid>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO task_events (event_id, event_type, user_id, task_id, payload, published_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            "#,
        )
        .bind(event.id)
        .bind(&event.event_type)
        .bind(user_id)
        .bind(task_id)
        .bind(&event.data)
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        Ok(())
    }

    pub async fn task_created(&self, task: &Task) {
        let data = TaskCreatedData {
            task_id: task.id,
            user_id: task.user_id.clone(),
            title: task.title.clone(),
            description: task.description.clone(),
            due_date: task.due_date,
            priority: task.priority,
            tags: task.tags.clone(),
            is_recurring: task.is_recurring(),
            series_id: task.series_id,
            recurrence_pattern: task.recurrence_pattern.clone(),
            created_at: task.created_at,
        };
        let event = CloudEvent::new(TaskEventType::TaskCreated, json!(data));
        self.publish(&task.user_id, Some(task.id), event).await;
    }

    pub async fn task_updated(
        &self,
        user_id: &str,
        task_id: Uuid,
        updated_fields: serde_json::Map<String, serde_json::Value>,
        updated_at: DateTime<Utc>,
    ) {
        if updated_fields.is_empty() {
            return;
        }
        let data = TaskUpdatedData {
            task_id,
            user_id: user_id.to_string(),
            updated_fields,
            updated_at,
        };
        let event = CloudEvent::new(TaskEventType::TaskUpdated, json!(data));
        self.publish(user_id, Some(task_id), event).await;
    }

    pub async fn task_deleted(
        &self,
        user_id: &str,
        task_id: Uuid,
        series_id: Option<Uuid>,
        deleted_at: DateTime<Utc>,
    ) {
        let data = TaskDeletedData {
            task_id,
            user_id: user_id.to_string(),
            series_id,
            deleted_at,
        };
        let event = CloudEvent::new(TaskEventType::TaskDeleted, json!(data));
        self.publish(user_id, Some(task_id), event).await;
    }

    pub async fn task_completed(&self, task: &Task) {
        let data = TaskCompletedData {
            task_id: task.id,
            user_id: task.user_id.clone(),
            series_id: task.series_id,
            recurrence_pattern: task.recurrence_pattern.clone(),
            completed_at: task.completed_at.unwrap_or_else(Utc::now),
        };
        let event = CloudEvent::new(TaskEventType::TaskCompleted, json!(data));
        self.publish(&task.user_id, Some(task.id), event).await;
    }
}
