//! `ProcessedEvent` dedup store (spec §4.F step 2/7, §9 "Recurring-task dedup
//! key-value surface"): a durable KV with per-key TTL, read before work,
//! write after success, so redelivery of the same `task.completed` event is
//! silently skipped even across replicas/restarts.
//!
//! Redis backs the hot, low-latency check; `processed_events` in Postgres is
//! the source of truth on a cache miss (spec §6 persisted-state layout), so a
//! cold cache after a Redis restart never replays a generation that already
//! committed.

use chrono::Utc;
use sqlx::PgPool;
use std::time::Duration;
use taskflow_api::cache::{cache_key, CacheClient};
use taskflow_core::model::ProcessedEvent;
use uuid::Uuid;

const PREFIX: &str = "processed-event";
const TTL: Duration = Duration::from_secs(taskflow_core::model::PROCESSED_EVENT_TTL_DAYS as u64 * 24 * 3600);

#[derive(Clone)]
pub struct DedupStore {
    cache: CacheClient,
    db: PgPool,
}

impl DedupStore {
    pub fn new(cache: CacheClient, db: PgPool) -> Self {
        Self { cache, db }
    }

    pub async fn is_processed(&self, event_id: Uuid) -> anyhow::Result<bool> {
        let key = cache_key(PREFIX, &event_id.to_string());
        if self.cache.get::<ProcessedEvent>(&key).await?.is_some() {
            return Ok(true);
        }

        let row: Option<ProcessedEvent> = sqlx::query_as::<_, ProcessedEventRow>(
            "SELECT event_id, processed_at, expires_at, metadata FROM processed_events \
             WHERE event_id = $1 AND expires_at > now()",
        )
        .bind(event_id)
        .fetch_optional(&self.db)
        .await?
        .map(Into::into);

        if let Some(ref record) = row {
            // Backfill the hot path so the next replica's check is a Redis hit.
            let _ = self.cache.set(&key, record, Some(TTL)).await;
        }

        Ok(row.is_some())
    }

    pub async fn mark_processed(&self, event_id: Uuid, metadata: Option<serde_json::Value>) -> anyhow::Result<()> {
        let now = Utc::now();
        let record = ProcessedEvent {
            event_id,
            processed_at: now,
            expires_at: now + chrono::Duration::days(taskflow_core::model::PROCESSED_EVENT_TTL_DAYS),
            metadata: metadata.clone(),
        };

        sqlx::query(
            "INSERT INTO processed_events (event_id, processed_at, expires_at, metadata) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (event_id) DO UPDATE SET processed_at = $2, expires_at = $3, metadata = $4",
        )
        .bind(event_id)
        .bind(record.processed_at)
        .bind(record.expires_at)
        .bind(&metadata)
        .execute(&self.db)
        .await?;

        let key = cache_key(PREFIX, &event_id.to_string());
        self.cache.set(&key, &record, Some(TTL)).await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct ProcessedEventRow {
    event_id: Uuid,
    processed_at: chrono::DateTime<Utc>,
    expires_at: chrono::DateTime<Utc>,
    metadata: Option<serde_json::Value>,
}

impl From<ProcessedEventRow> for ProcessedEvent {
    fn from(row: ProcessedEventRow) -> Self {
        ProcessedEvent {
            event_id: row.event_id,
            processed_at: row.processed_at,
            expires_at: row.expires_at,
            metadata: row.metadata,
        }
    }
}
