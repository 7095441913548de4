//! Notification read-side (spec §4.D/§8): list/mark-read/count over rows the
//! reminder scheduler (worker crate) inserts. The API never creates
//! notification rows itself — it only queries and mutates `read_at`.

use crate::cache::{user_cache_key, CacheClient};
use sqlx::PgPool;
use taskflow_core::error::{CoreError, CoreResult};
use taskflow_core::model::{Notification, Priority};
use uuid::Uuid;

const CACHE_PREFIX_NOTIFICATION: &str = "notification";

#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    task_id: Uuid,
    user_id: String,
    message: String,
    priority: String,
    created_at: chrono::DateTime<chrono::Utc>,
    read_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = CoreError;

    fn try_from(row: NotificationRow) -> CoreResult<Self> {
        Ok(Notification {
            id: row.id,
            task_id: row.task_id,
            user_id: row.user_id,
            message: row.message,
            priority: Priority::from_str(&row.priority)
                .ok_or_else(|| CoreError::FatalConfig(format!("unknown priority '{}'", row.priority)))?,
            created_at: row.created_at,
            read_at: row.read_at,
        })
    }
}

#[derive(Clone)]
pub struct NotificationStore {
    db: PgPool,
    cache: CacheClient,
}

impl NotificationStore {
    pub fn new(db: PgPool, cache: CacheClient) -> Self {
        Self { db, cache }
    }

    async fn invalidate(&self, user_id: &str) {
        let pattern = user_cache_key(user_id, CACHE_PREFIX_NOTIFICATION, "*");
        let _ = self.cache.delete_pattern(&pattern).await;
    }

    pub async fn list(&self, user_id: &str, unread_only: bool) -> CoreResult<Vec<Notification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, task_id, user_id, message, priority, created_at, read_at
            FROM notifications
            WHERE user_id = $1 AND ($2 = false OR read_at IS NULL)
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(unread_only)
        .fetch_all(&self.db)
        .await
        .map_err(|e| CoreError::Transient(e.to_string()))?;

        rows.into_iter().map(Notification::try_from).collect()
    }

    pub async fn unread_count(&self, user_id: &str) -> CoreResult<i64> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND read_at IS NULL",
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await
        .map_err(|e| CoreError::Transient(e.to_string()))
    }

    pub async fn mark_read(&self, user_id: &str, id: Uuid) -> CoreResult<Notification> {
        let row = sqlx::query_as::<_, NotificationRow>(
            r#"
            UPDATE notifications SET read_at = now()
            WHERE id = $1 AND user_id = $2
            RETURNING id, task_id, user_id, message, priority, created_at, read_at
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| CoreError::Transient(e.to_string()))?;

        self.invalidate(user_id).await;

        match row {
            Some(row) => Notification::try_from(row),
            None => {
                let exists: bool =
                    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM notifications WHERE id = $1)")
                        .bind(id)
                        .fetch_one(&self.db)
                        .await
                        .map_err(|e| CoreError::Transient(e.to_string()))?;
                if exists {
                    Err(CoreError::Forbidden(format!("notification {id} belongs to another user")))
                } else {
                    Err(CoreError::NotFound(format!("notification {id} not found")))
                }
            }
        }
    }

    pub async fn mark_all_read(&self, user_id: &str) -> CoreResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET read_at = now() WHERE user_id = $1 AND read_at IS NULL",
        )
        .bind(user_id)
        .execute(&self.db)
        .await
        .map_err(|e| CoreError::Transient(e.to_string()))?;

        self.invalidate(user_id).await;
        Ok(result.rows_affected())
    }
}
