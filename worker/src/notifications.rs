//! Notification write side (spec §3, §4.G): the reminder scheduler is the
//! only component that ever inserts a `Notification` row — the API crate's
//! `NotificationStore` is read/mark-read only (see its module doc).

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use taskflow_core::model::{Priority, NOTIFICATION_PRUNE_LIMIT};
use uuid::Uuid;

/// Insert a notification, relying on the `(task_id, message)` unique
/// constraint for duplicate suppression (spec §8: "at most one Notification
/// row exists" per pair) instead of a separate existence check racing a
/// concurrent tick.
///
/// Returns `true` iff a row was actually inserted.
pub async fn insert_if_absent(
    db: &PgPool,
    task_id: Uuid,
    user_id: &str,
    message: &str,
    priority: Priority,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO notifications (id, task_id, user_id, message, priority, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (task_id, message) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(task_id)
    .bind(user_id)
    .bind(message)
    .bind(priority.to_string())
    .bind(Utc::now())
    .execute(db)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Prune a user's notifications down to [`NOTIFICATION_PRUNE_LIMIT`],
/// deleting the oldest *read* rows first. Unread rows are never dropped
/// (spec §3, §8 round-trip law).
pub async fn prune(db: &PgPool, user_id: &str) -> Result<u64, sqlx::Error> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(db)
        .await?;

    let over = total - NOTIFICATION_PRUNE_LIMIT;
    if over <= 0 {
        return Ok(0);
    }

    let result = sqlx::query(
        r#"
        DELETE FROM notifications WHERE id IN (
            SELECT id FROM notifications
            WHERE user_id = $1 AND read_at IS NOT NULL
            ORDER BY created_at ASC
            LIMIT $2
        )
        "#,
    )
    .bind(user_id)
    .bind(over)
    .execute(db)
    .await?;

    Ok(result.rows_affected())
}

#[derive(Debug, sqlx::FromRow)]
pub struct ReminderCandidate {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub due_date: DateTime<Utc>,
}

/// Every non-completed `VERY_IMPORTANT` task with a due date — the scan set
/// for a single reminder tick (spec §4.G step 1).
pub async fn eligible_tasks(db: &PgPool) -> Result<Vec<ReminderCandidate>, sqlx::Error> {
    sqlx::query_as::<_, ReminderCandidate>(
        r#"
        SELECT id, user_id, title, due_date
        FROM tasks
        WHERE priority = 'VERY_IMPORTANT' AND is_completed = false AND due_date IS NOT NULL
        "#,
    )
    .fetch_all(db)
    .await
}
