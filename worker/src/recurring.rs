//! Recurring Generator (spec §4.F), grounded in
//! `original_source/phase-5/services/recurring-task-service`'s
//! `TaskCompletionConsumer`: an idempotent consumer of `task.completed`
//! events that parses the series' recurrence rule and produces the next
//! task instance exactly once per completion.
//!
//! The original talks to its event backbone through a Dapr sidecar's HTTP
//! push model; this consumer reads the same `task-operations` topic
//! directly via `rdkafka`'s `StreamConsumer`, since the api crate's
//! `EventPublisher` already talks to Kafka directly rather than through
//! Dapr (spec §9 flags the Dapr-vs-direct question as unresolved; direct
//! Kafka keeps the whole workspace on one client rather than two).

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message as _;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use serde_json::Value;
use std::time::Duration;
use taskflow_api::services::{EventPublisher, TaskStore};
use taskflow_core::events::{partition_key, CloudEvent, TaskCompletedData};
use taskflow_core::model::TaskEventType;
use tracing::{error, info, warn};

use crate::dedup::DedupStore;

const LOCAL_RETRY_DELAYS: [Duration; 3] = [Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(4)];

pub struct RecurringGenerator {
    consumer: StreamConsumer,
    dlq_producer: FutureProducer,
    dlq_topic: String,
    task_store: TaskStore,
    event_publisher: EventPublisher,
    dedup: DedupStore,
}

impl RecurringGenerator {
    pub fn new(
        brokers: &str,
        consumer_group: &str,
        topic: &str,
        task_store: TaskStore,
        event_publisher: EventPublisher,
        dedup: DedupStore,
    ) -> anyhow::Result<Self> {
        // Offsets are stored after handling (success, permanent drop, or DLQ
        // hand-off) but committed in the background by librdkafka, giving
        // at-least-once delivery without a commit round trip per message.
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", consumer_group)
            .set("enable.auto.commit", "true")
            .set("enable.auto.offset.store", "false")
            .set("auto.offset.reset", "earliest")
            .create()?;
        consumer.subscribe(&[topic])?;

        let dlq_producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("enable.idempotence", "true")
            .set("acks", "all")
            .create()?;

        Ok(Self {
            consumer,
            dlq_producer,
            dlq_topic: taskflow_core::events::dlq_topic(topic),
            task_store,
            event_publisher,
            dedup,
        })
    }

    /// Consume forever. Each message is acknowledged (offset committed)
    /// whether it is handled, ignored, permanently failed, or routed to the
    /// DLQ — only a crash before that point causes redelivery, which
    /// idempotency (§4.F step 2) absorbs.
    pub async fn run(&self) {
        loop {
            match self.consumer.recv().await {
                Ok(message) => {
                    let payload = message.payload().map(|p| p.to_vec());
                    let key = message.key().map(|k| String::from_utf8_lossy(k).to_string());

                    if let Some(payload) = payload {
                        self.handle_with_retry(&payload, key.as_deref()).await;
                    }

                    if let Err(e) = self.consumer.store_offset_from_message(&message) {
                        warn!(error = %e, "failed to store Kafka offset");
                    }
                }
                Err(e) => {
                    error!(error = %e, "Kafka consumer recv error");
                }
            }
        }
    }

    async fn handle_with_retry(&self, payload: &[u8], key: Option<&str>) {
        let mut last_err = None;

        for (attempt, delay) in std::iter::once(Duration::ZERO).chain(LOCAL_RETRY_DELAYS).enumerate() {
            if attempt > 0 {
                tokio::time::sleep(delay).await;
            }
            match self.handle_once(payload).await {
                Ok(()) => return,
                Err(HandleError::Permanent(msg)) => {
                    warn!(error = %msg, "task.completed event failed permanently, not retrying");
                    return;
                }
                Err(HandleError::Transient(msg)) => {
                    last_err = Some(msg);
                }
            }
        }

        let reason = last_err.unwrap_or_else(|| "unknown transient error".to_string());
        error!(error = %reason, "task.completed event exhausted local retries, routing to DLQ");
        self.send_to_dlq(payload, key).await;
    }

    async fn send_to_dlq(&self, payload: &[u8], key: Option<&str>) {
        let record = match key {
            Some(k) => FutureRecord::to(&self.dlq_topic).key(k).payload(payload),
            None => FutureRecord::to(&self.dlq_topic).payload(payload),
        };
        if let Err((e, _)) = self.dlq_producer.send(record, Timeout::After(Duration::from_secs(5))).await {
            error!(error = %e, "failed to publish event to DLQ topic");
        }
    }

    async fn handle_once(&self, payload: &[u8]) -> Result<(), HandleError> {
        let event: CloudEvent = serde_json::from_slice(payload)
            .map_err(|e| HandleError::Permanent(format!("malformed CloudEvent envelope: {e}")))?;

        // Step 1: type guard.
        if TaskEventType::from_wire(&event.event_type) != Some(TaskEventType::TaskCompleted) {
            return Ok(());
        }

        // Step 2: idempotency.
        if self
            .dedup
            .is_processed(event.id)
            .await
            .map_err(|e| HandleError::Transient(format!("dedup lookup failed: {e}")))?
        {
            info!(event_id = %event.id, "task.completed event already processed, skipping");
            return Ok(());
        }

        let data: TaskCompletedData = serde_json::from_value(event.data.clone())
            .map_err(|e| HandleError::Permanent(format!("malformed task.completed payload: {e}")))?;

        // Step 3: series check.
        let Some(series_id) = data.series_id else {
            self.mark_processed(event.id, &data).await?;
            return Ok(());
        };

        // Step 4: liveness.
        let series = match self.task_store.series_get(&data.user_id, series_id).await {
            Ok(series) if series.is_active => series,
            Ok(_) => {
                self.mark_processed(event.id, &data).await?;
                return Ok(());
            }
            Err(taskflow_core::error::CoreError::NotFound(_)) => {
                self.mark_processed(event.id, &data).await?;
                return Ok(());
            }
            Err(e) => return Err(HandleError::Transient(e.to_string())),
        };

        // Step 5: next occurrence. Anchor `dtstart` on the completed task's
        // own due date so month/week/day-of-week arithmetic stays relative
        // to when the series actually started firing, not the completion.
        let rule = match taskflow_core::recurrence::parse(&series.recurrence_pattern) {
            Ok(rule) => rule,
            Err(e) => {
                warn!(series_id = %series_id, error = %e, "recurrence pattern failed to parse, will never succeed");
                self.mark_processed(event.id, &data).await?;
                return Ok(());
            }
        };

        let completed_task = self
            .task_store
            .get(&data.user_id, data.task_id)
            .await
            .map_err(|e| HandleError::Transient(e.to_string()))?;
        let dtstart = completed_task.due_date.unwrap_or(data.completed_at);

        let Some(next_due) = taskflow_core::recurrence::next_after(&rule, data.completed_at, dtstart) else {
            self.mark_processed(event.id, &data).await?;
            return Ok(());
        };

        // Step 6: generation, through the Task Store so it emits its own
        // `task.created` event (never directly on `task.completed`, which
        // would loop).
        let title = series
            .base_task_template
            .get("title")
            .and_then(Value::as_str)
            .ok_or_else(|| HandleError::Permanent("series template has no title".to_string()))?
            .to_string();
        let description = series
            .base_task_template
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string);
        let tags: Vec<String> = series
            .base_task_template
            .get("tags")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        let new_task = match self
            .task_store
            .create_series_instance(
                &data.user_id,
                title,
                description,
                Some(next_due),
                tags,
                series_id,
                series.recurrence_pattern.clone(),
            )
            .await
        {
            Ok(task) => task,
            // A concurrent redelivery (another consumer, or a retry that
            // actually landed before a transient error surfaced back to us)
            // already created this instance; `idx_tasks_series_due_date`
            // caught it. Treat it like any other already-processed event
            // rather than retrying something that can never succeed.
            Err(taskflow_core::error::CoreError::Conflict(msg)) => {
                info!(series_id = %series_id, due_date = %next_due, reason = %msg, "recurring instance already exists, skipping");
                self.mark_processed(event.id, &data).await?;
                return Ok(());
            }
            Err(e) => return Err(HandleError::Transient(e.to_string())),
        };

        self.event_publisher.task_created(&new_task).await;

        info!(
            event_id = %event.id,
            series_id = %series_id,
            next_task_id = %new_task.id,
            next_due_date = %next_due,
            "generated next recurring task instance"
        );

        // Step 7: mark processed.
        self.mark_processed(event.id, &data).await?;

        Ok(())
    }

    async fn mark_processed(&self, event_id: uuid::Uuid, data: &TaskCompletedData) -> Result<(), HandleError> {
        let metadata = serde_json::json!({"task_id": data.task_id, "user_id": data.user_id});
        self.dedup
            .mark_processed(event_id, Some(metadata))
            .await
            .map_err(|e| HandleError::Transient(format!("failed to record processed event: {e}")))
    }

    /// Used by the same-process DLQ reader (spec §4.F "DLQ consumer applies
    /// exponential backoff... then alerts") to anchor per-user ordering
    /// (spec §5: "partition key = hash(user_id)").
    #[allow(dead_code)]
    pub fn partition_key_for(user_id: &str) -> String {
        partition_key(user_id)
    }
}

enum HandleError {
    /// Will never succeed no matter how many times it's retried — mark
    /// processed (where applicable) and move on.
    Permanent(String),
    /// Database/store unavailable — worth a few immediate retries before
    /// falling back to the DLQ.
    Transient(String),
}
