//! Task Store (spec §4.D): durable rows, queries scoped by `user_id`,
//! invariant enforcement, history row emission. Transaction-per-mutation,
//! grounded in the teacher's `services/task.rs` style.

use crate::cache::{user_cache_key, CacheClient};
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use taskflow_core::error::{CoreError, CoreResult};
use taskflow_core::model::{
    HistoryAction, Priority, RecurringTaskSeries, Task, TaskHistory, TaskStatus,
};
use taskflow_core::pagination::{clamp_page_size, Page};
use taskflow_core::{priority, tags};
use uuid::Uuid;

const CACHE_PREFIX_TASK: &str = "task";

/// Maps the `idx_tasks_series_due_date` unique-violation (spec §7: "duplicate
/// task instance for (series, due_date)") to `CoreError::Conflict`; anything
/// else is a transient store failure.
fn map_series_insert_error(err: sqlx::Error) -> CoreError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.code().as_deref() == Some("23505") {
            return CoreError::Conflict("a task instance for this series and due date already exists".to_string());
        }
    }
    CoreError::Transient(err.to_string())
}

#[derive(Debug, sqlx::FromRow)]
struct TaskRow {
    id: Uuid,
    user_id: String,
    title: String,
    description: Option<String>,
    is_completed: bool,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    due_date: Option<DateTime<Utc>>,
    tags: Vec<String>,
    priority: String,
    status: String,
    series_id: Option<Uuid>,
    recurrence_pattern: Option<String>,
}

impl TryFrom<TaskRow> for Task {
    type Error = CoreError;

    fn try_from(row: TaskRow) -> CoreResult<Self> {
        Ok(Task {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            description: row.description,
            is_completed: row.is_completed,
            completed_at: row.completed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
            due_date: row.due_date,
            tags: row.tags,
            priority: Priority::from_str(&row.priority)
                .ok_or_else(|| CoreError::FatalConfig(format!("unknown priority '{}'", row.priority)))?,
            status: TaskStatus::from_str(&row.status)
                .ok_or_else(|| CoreError::FatalConfig(format!("unknown status '{}'", row.status)))?,
            series_id: row.series_id,
            recurrence_pattern: row.recurrence_pattern,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct HistoryRow {
    history_id: Uuid,
    task_id: Option<Uuid>,
    task_title: String,
    action_type: String,
    description: Option<String>,
    timestamp: DateTime<Utc>,
    user_id: String,
}

impl TryFrom<HistoryRow> for TaskHistory {
    type Error = CoreError;

    fn try_from(row: HistoryRow) -> CoreResult<Self> {
        Ok(TaskHistory {
            history_id: row.history_id,
            task_id: row.task_id,
            task_title: row.task_title,
            action_type: HistoryAction::from_str(&row.action_type).ok_or_else(|| {
                CoreError::FatalConfig(format!("unknown action_type '{}'", row.action_type))
            })?,
            description: row.description,
            timestamp: row.timestamp,
            user_id: row.user_id,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SeriesRow {
    series_id: Uuid,
    user_id: String,
    base_task_template: serde_json::Value,
    recurrence_pattern: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SeriesRow> for RecurringTaskSeries {
    fn from(row: SeriesRow) -> Self {
        RecurringTaskSeries {
            series_id: row.series_id,
            user_id: row.user_id,
            base_task_template: row.base_task_template,
            recurrence_pattern: row.recurrence_pattern,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Tri-state PATCH semantics for `update`: a field absent from the request's
/// JSON body is never touched; a field present with `null` explicitly clears
/// it (only `due_date` supports this); a field present with a value sets it.
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub tags: Option<Vec<String>>,
    pub status: Option<TaskStatus>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.due_date.is_none()
            && self.tags.is_none()
            && self.status.is_none()
    }
}

#[derive(Clone)]
pub struct TaskStore {
    db: PgPool,
    cache: CacheClient,
}

impl TaskStore {
    pub fn new(db: PgPool, cache: CacheClient) -> Self {
        Self { db, cache }
    }

    async fn invalidate(&self, user_id: &str) {
        let pattern = user_cache_key(user_id, CACHE_PREFIX_TASK, "*");
        let _ = self.cache.delete_pattern(&pattern).await;
    }

    async fn insert_history(
        tx: &mut Transaction<'_, Postgres>,
        user_id: &str,
        task_id: Option<Uuid>,
        task_title: &str,
        action: HistoryAction,
        description: Option<String>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO task_history (history_id, task_id, task_title, action_type, description, timestamp, user_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(task_id)
        .bind(task_title)
        .bind(action.to_string())
        .bind(description)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    async fn fetch_row(&self, id: Uuid) -> CoreResult<Option<TaskRow>> {
        sqlx::query_as::<_, TaskRow>(
            r#"
            SELECT id, user_id, title, description, is_completed, completed_at,
                   created_at, updated_at, due_date, tags, priority, status,
                   series_id, recurrence_pattern
            FROM tasks WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| CoreError::Transient(e.to_string()))
    }

    /// `create(user_id, title, description?, due_date?, tags?) → Task`.
    pub async fn create(
        &self,
        user_id: &str,
        title: String,
        description: Option<String>,
        due_date: Option<DateTime<Utc>>,
        tags: Vec<String>,
    ) -> CoreResult<Task> {
        let title = validate_title(&title)?;
        validate_description(description.as_deref())?;
        tags::validate_tags(&tags)?;

        let now = Utc::now();
        let priority = priority::classify(&title, due_date, now);

        let mut tx = self
            .db
            .begin()
            .await
            .map_err(|e| CoreError::Transient(e.to_string()))?;

        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO tasks (id, user_id, title, description, is_completed, completed_at,
                                created_at, updated_at, due_date, tags, priority, status,
                                series_id, recurrence_pattern)
            VALUES ($1, $2, $3, $4, false, NULL, $5, $5, $6, $7, $8, $9, NULL, NULL)
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(&title)
        .bind(&description)
        .bind(now)
        .bind(due_date)
        .bind(&tags)
        .bind(priority.to_string())
        .bind(TaskStatus::NotStarted.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| CoreError::Transient(e.to_string()))?;

        Self::insert_history(&mut tx, user_id, Some(id), &title, HistoryAction::Created, None)
            .await
            .map_err(|e| CoreError::Transient(e.to_string()))?;

        tx.commit().await.map_err(|e| CoreError::Transient(e.to_string()))?;
        self.invalidate(user_id).await;

        Ok(Task {
            id,
            user_id: user_id.to_string(),
            title,
            description,
            is_completed: false,
            completed_at: None,
            created_at: now,
            updated_at: now,
            due_date,
            tags,
            priority,
            status: TaskStatus::NotStarted,
            series_id: None,
            recurrence_pattern: None,
        })
    }

    /// Like `create`, but for a generated recurring instance: inherits
    /// `series_id`/`recurrence_pattern` and skips the CREATED history row's
    /// plain description in favor of one noting the series origin.
    pub async fn create_series_instance(
        &self,
        user_id: &str,
        title: String,
        description: Option<String>,
        due_date: Option<DateTime<Utc>>,
        tags: Vec<String>,
        series_id: Uuid,
        recurrence_pattern: String,
    ) -> CoreResult<Task> {
        let title = validate_title(&title)?;
        let now = Utc::now();
        let priority = priority::classify(&title, due_date, now);

        let mut tx = self
            .db
            .begin()
            .await
            .map_err(|e| CoreError::Transient(e.to_string()))?;

        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO tasks (id, user_id, title, description, is_completed, completed_at,
                                created_at, updated_at, due_date, tags, priority, status,
                                series_id, recurrence_pattern)
            VALUES ($1, $2, $3, $4, false, NULL, $5, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(&title)
        .bind(&description)
        .bind(now)
        .bind(due_date)
        .bind(&tags)
        .bind(priority.to_string())
        .bind(TaskStatus::NotStarted.to_string())
        .bind(series_id)
        .bind(&recurrence_pattern)
        .execute(&mut *tx)
        .await
        .map_err(map_series_insert_error)?;

        Self::insert_history(
            &mut tx,
            user_id,
            Some(id),
            &title,
            HistoryAction::Created,
            Some("generated from recurring series".to_string()),
        )
        .await
        .map_err(|e| CoreError::Transient(e.to_string()))?;

        tx.commit().await.map_err(|e| CoreError::Transient(e.to_string()))?;
        self.invalidate(user_id).await;

        Ok(Task {
            id,
            user_id: user_id.to_string(),
            title,
            description,
            is_completed: false,
            completed_at: None,
            created_at: now,
            updated_at: now,
            due_date,
            tags,
            priority,
            status: TaskStatus::NotStarted,
            series_id: Some(series_id),
            recurrence_pattern: Some(recurrence_pattern),
        })
    }

    /// `list_all(user_id) → [Task]` — incomplete before complete, then
    /// `created_at` descending within each group.
    pub async fn list_all(&self, user_id: &str) -> CoreResult<Vec<Task>> {
        let rows = sqlx::query_as::<_, TaskRow>(
            r#"
            SELECT id, user_id, title, description, is_completed, completed_at,
                   created_at, updated_at, due_date, tags, priority, status,
                   series_id, recurrence_pattern
            FROM tasks
            WHERE user_id = $1
            ORDER BY is_completed ASC, created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .map_err(|e| CoreError::Transient(e.to_string()))?;

        rows.into_iter().map(Task::try_from).collect()
    }

    /// `get(user_id, id) → Task` — NOT_FOUND if absent, FORBIDDEN if owned
    /// by someone else.
    pub async fn get(&self, user_id: &str, id: Uuid) -> CoreResult<Task> {
        let row = self
            .fetch_row(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("task {id} not found")))?;

        if row.user_id != user_id {
            return Err(CoreError::Forbidden("task belongs to another user".into()));
        }

        row.try_into()
    }

    /// `update(user_id, id, patch) → Task`.
    pub async fn update(&self, user_id: &str, id: Uuid, patch: TaskPatch) -> CoreResult<Task> {
        if patch.is_empty() {
            return Err(CoreError::Validation("at least one field is required".into()));
        }

        let current = self.get(user_id, id).await?;

        if let Some(ref title) = patch.title {
            validate_title(title)?;
        }
        if let Some(Some(ref description)) = patch.description {
            validate_description(Some(description))?;
        }
        if let Some(ref tags) = patch.tags {
            tags::validate_tags(tags)?;
        }

        let now = Utc::now();
        let title_changed = patch.title.is_some();
        let due_date_changed = patch.due_date.is_some();

        let new_title = patch.title.clone().unwrap_or_else(|| current.title.clone());
        let new_description = match patch.description.clone() {
            Some(d) => d,
            None => current.description.clone(),
        };
        let new_due_date = match patch.due_date {
            Some(d) => d,
            None => current.due_date,
        };
        let new_tags = patch.tags.clone().unwrap_or_else(|| current.tags.clone());

        let new_priority = if title_changed || due_date_changed {
            priority::reclassify_on_update(
                patch.title.as_deref(),
                patch.due_date,
                &current.title,
                current.due_date,
                now,
            )
        } else {
            current.priority
        };

        let (new_status, new_completed_at) = match patch.status {
            Some(TaskStatus::Completed) => (TaskStatus::Completed, Some(now)),
            Some(other) => (other, None),
            None => (current.status, current.completed_at),
        };

        let mut changed_fields = Vec::new();
        if title_changed {
            changed_fields.push("title");
        }
        if patch.description.is_some() {
            changed_fields.push("description");
        }
        if due_date_changed {
            changed_fields.push("due_date");
        }
        if patch.tags.is_some() {
            changed_fields.push("tags");
        }
        if patch.status.is_some() {
            changed_fields.push("status");
        }

        let mut tx = self
            .db
            .begin()
            .await
            .map_err(|e| CoreError::Transient(e.to_string()))?;

        sqlx::query(
            r#"
            UPDATE tasks SET
                title = $3, description = $4, due_date = $5, tags = $6,
                priority = $7, status = $8, is_completed = $9, completed_at = $10,
                updated_at = $11
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(&new_title)
        .bind(&new_description)
        .bind(new_due_date)
        .bind(&new_tags)
        .bind(new_priority.to_string())
        .bind(new_status.to_string())
        .bind(new_status == TaskStatus::Completed)
        .bind(new_completed_at)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| CoreError::Transient(e.to_string()))?;

        Self::insert_history(
            &mut tx,
            user_id,
            Some(id),
            &new_title,
            HistoryAction::Updated,
            Some(format!("changed: {}", changed_fields.join(", "))),
        )
        .await
        .map_err(|e| CoreError::Transient(e.to_string()))?;

        tx.commit().await.map_err(|e| CoreError::Transient(e.to_string()))?;
        self.invalidate(user_id).await;

        Ok(Task {
            id,
            user_id: user_id.to_string(),
            title: new_title,
            description: new_description,
            is_completed: new_status == TaskStatus::Completed,
            completed_at: new_completed_at,
            created_at: current.created_at,
            updated_at: now,
            due_date: new_due_date,
            tags: new_tags,
            priority: new_priority,
            status: new_status,
            series_id: current.series_id,
            recurrence_pattern: current.recurrence_pattern,
        })
    }

    /// `delete(user_id, id)` — DELETED history first, cascades notifications,
    /// history rows survive (task_id set NULL by the FK's `ON DELETE SET NULL`).
    pub async fn delete(&self, user_id: &str, id: Uuid) -> CoreResult<()> {
        let task = self.get(user_id, id).await?;

        let mut tx = self
            .db
            .begin()
            .await
            .map_err(|e| CoreError::Transient(e.to_string()))?;

        Self::insert_history(&mut tx, user_id, Some(id), &task.title, HistoryAction::Deleted, None)
            .await
            .map_err(|e| CoreError::Transient(e.to_string()))?;

        sqlx::query("DELETE FROM tasks WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| CoreError::Transient(e.to_string()))?;

        tx.commit().await.map_err(|e| CoreError::Transient(e.to_string()))?;
        self.invalidate(user_id).await;

        Ok(())
    }

    async fn set_completion(&self, user_id: &str, id: Uuid, completed: bool) -> CoreResult<Task> {
        let task = self.get(user_id, id).await?;
        let now = Utc::now();

        let (status, completed_at) = if completed {
            (TaskStatus::Completed, Some(now))
        } else {
            (TaskStatus::NotStarted, None)
        };

        let mut tx = self
            .db
            .begin()
            .await
            .map_err(|e| CoreError::Transient(e.to_string()))?;

        sqlx::query(
            r#"
            UPDATE tasks SET is_completed = $3, completed_at = $4, status = $5, updated_at = $6
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(completed)
        .bind(completed_at)
        .bind(status.to_string())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| CoreError::Transient(e.to_string()))?;

        let action = if completed {
            HistoryAction::Completed
        } else {
            HistoryAction::Incompleted
        };
        Self::insert_history(&mut tx, user_id, Some(id), &task.title, action, None)
            .await
            .map_err(|e| CoreError::Transient(e.to_string()))?;

        tx.commit().await.map_err(|e| CoreError::Transient(e.to_string()))?;
        self.invalidate(user_id).await;

        Ok(Task {
            is_completed: completed,
            completed_at,
            status,
            updated_at: now,
            ..task
        })
    }

    pub async fn mark_complete(&self, user_id: &str, id: Uuid) -> CoreResult<Task> {
        self.set_completion(user_id, id, true).await
    }

    pub async fn mark_incomplete(&self, user_id: &str, id: Uuid) -> CoreResult<Task> {
        self.set_completion(user_id, id, false).await
    }

    /// `list_history(user_id, page, limit, offset?, task_id?, action?) → Page<History>`.
    pub async fn list_history(
        &self,
        user_id: &str,
        page: i64,
        limit: i64,
        offset: Option<i64>,
        task_id: Option<Uuid>,
        action: Option<String>,
    ) -> CoreResult<Page<TaskHistory>> {
        let limit = clamp_page_size(limit);
        let page = page.max(1);
        let offset = offset.unwrap_or((page - 1) * limit);

        let total_count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM task_history
            WHERE user_id = $1
              AND ($2::uuid IS NULL OR task_id = $2)
              AND ($3::text IS NULL OR action_type = $3)
            "#,
        )
        .bind(user_id)
        .bind(task_id)
        .bind(&action)
        .fetch_one(&self.db)
        .await
        .map_err(|e| CoreError::Transient(e.to_string()))?;

        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT history_id, task_id, task_title, action_type, description, timestamp, user_id
            FROM task_history
            WHERE user_id = $1
              AND ($2::uuid IS NULL OR task_id = $2)
              AND ($3::text IS NULL OR action_type = $3)
            ORDER BY timestamp DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(user_id)
        .bind(task_id)
        .bind(&action)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await
        .map_err(|e| CoreError::Transient(e.to_string()))?;

        let items: CoreResult<Vec<TaskHistory>> = rows.into_iter().map(TaskHistory::try_from).collect();

        Ok(Page::new(items?, total_count, page, limit))
    }

    pub async fn delete_history(&self, user_id: &str, history_id: Uuid) -> CoreResult<()> {
        let result = sqlx::query("DELETE FROM task_history WHERE history_id = $1 AND user_id = $2")
            .bind(history_id)
            .bind(user_id)
            .execute(&self.db)
            .await
            .map_err(|e| CoreError::Transient(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("history row {history_id} not found")));
        }

        Ok(())
    }

    /// `weekly_stats(user_id) → Stats` — current UTC week, Monday 00:00:00
    /// through Sunday 23:59:59 inclusive.
    pub async fn weekly_stats(&self, user_id: &str) -> CoreResult<WeeklyStatsResult> {
        let now = Utc::now();
        let days_from_monday = now.weekday().num_days_from_monday() as i64;
        let week_start = (now - Duration::days(days_from_monday))
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .expect("valid midnight");
        let week_start = Utc.from_utc_datetime(&week_start);
        let week_end = week_start + Duration::days(7) - Duration::seconds(1);

        let (created_this_week, completed_this_week): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE created_at BETWEEN $2 AND $3),
                COUNT(*) FILTER (WHERE completed_at BETWEEN $2 AND $3)
            FROM tasks WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(week_start)
        .bind(week_end)
        .fetch_one(&self.db)
        .await
        .map_err(|e| CoreError::Transient(e.to_string()))?;

        let (total_completed, total_incomplete, total_tasks): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE is_completed),
                COUNT(*) FILTER (WHERE NOT is_completed),
                COUNT(*)
            FROM tasks WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await
        .map_err(|e| CoreError::Transient(e.to_string()))?;

        Ok(WeeklyStatsResult {
            tasks_created_this_week: created_this_week,
            tasks_completed_this_week: completed_this_week,
            total_completed,
            total_incomplete,
            week_start,
            week_end,
            total_tasks,
        })
    }

    // ==================== Recurring series ====================

    /// `series_create` — first instance's `due_date = now`.
    pub async fn series_create(
        &self,
        user_id: &str,
        title: String,
        description: Option<String>,
        tags: Vec<String>,
        recurrence_pattern: String,
    ) -> CoreResult<(RecurringTaskSeries, Task)> {
        let title = validate_title(&title)?;
        tags::validate_tags(&tags)?;
        if !taskflow_core::recurrence::validate(&recurrence_pattern) {
            return Err(CoreError::Validation(format!(
                "invalid recurrence pattern '{recurrence_pattern}'"
            )));
        }

        let now = Utc::now();
        let series_id = Uuid::new_v4();
        let template = serde_json::json!({
            "title": title,
            "description": description,
            "tags": tags,
        });

        sqlx::query(
            r#"
            INSERT INTO recurring_task_series (series_id, user_id, base_task_template, recurrence_pattern, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, true, $5, $5)
            "#,
        )
        .bind(series_id)
        .bind(user_id)
        .bind(&template)
        .bind(&recurrence_pattern)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(|e| CoreError::Transient(e.to_string()))?;

        let first_instance = self
            .create_series_instance(
                user_id,
                title,
                description,
                Some(now),
                tags,
                series_id,
                recurrence_pattern.clone(),
            )
            .await?;

        let series = RecurringTaskSeries {
            series_id,
            user_id: user_id.to_string(),
            base_task_template: template,
            recurrence_pattern,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        Ok((series, first_instance))
    }

    pub async fn series_list(&self, user_id: &str, include_inactive: bool) -> CoreResult<Vec<RecurringTaskSeries>> {
        let rows = sqlx::query_as::<_, SeriesRow>(
            r#"
            SELECT series_id, user_id, base_task_template, recurrence_pattern, is_active, created_at, updated_at
            FROM recurring_task_series
            WHERE user_id = $1 AND ($2 OR is_active)
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(include_inactive)
        .fetch_all(&self.db)
        .await
        .map_err(|e| CoreError::Transient(e.to_string()))?;

        Ok(rows.into_iter().map(RecurringTaskSeries::from).collect())
    }

    pub async fn series_get(&self, user_id: &str, series_id: Uuid) -> CoreResult<RecurringTaskSeries> {
        let row = sqlx::query_as::<_, SeriesRow>(
            r#"
            SELECT series_id, user_id, base_task_template, recurrence_pattern, is_active, created_at, updated_at
            FROM recurring_task_series WHERE series_id = $1
            "#,
        )
        .bind(series_id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| CoreError::Transient(e.to_string()))?
        .ok_or_else(|| CoreError::NotFound(format!("recurring series {series_id} not found")))?;

        if row.user_id != user_id {
            return Err(CoreError::Forbidden("series belongs to another user".into()));
        }

        Ok(row.into())
    }

    pub async fn series_update(
        &self,
        user_id: &str,
        series_id: Uuid,
        recurrence_pattern: Option<String>,
        is_active: Option<bool>,
    ) -> CoreResult<RecurringTaskSeries> {
        let mut series = self.series_get(user_id, series_id).await?;

        if let Some(ref pattern) = recurrence_pattern {
            if !taskflow_core::recurrence::validate(pattern) {
                return Err(CoreError::Validation(format!("invalid recurrence pattern '{pattern}'")));
            }
            series.recurrence_pattern = pattern.clone();
        }
        if let Some(active) = is_active {
            series.is_active = active;
        }
        series.updated_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE recurring_task_series SET recurrence_pattern = $3, is_active = $4, updated_at = $5
            WHERE series_id = $1 AND user_id = $2
            "#,
        )
        .bind(series_id)
        .bind(user_id)
        .bind(&series.recurrence_pattern)
        .bind(series.is_active)
        .bind(series.updated_at)
        .execute(&self.db)
        .await
        .map_err(|e| CoreError::Transient(e.to_string()))?;

        Ok(series)
    }

    /// Soft delete: deactivation preserves already-generated task rows.
    pub async fn series_delete(&self, user_id: &str, series_id: Uuid) -> CoreResult<()> {
        self.series_get(user_id, series_id).await?;

        sqlx::query(
            "UPDATE recurring_task_series SET is_active = false, updated_at = $3 WHERE series_id = $1 AND user_id = $2",
        )
        .bind(series_id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.db)
        .await
        .map_err(|e| CoreError::Transient(e.to_string()))?;

        Ok(())
    }

    pub async fn list_tasks_in_series(&self, user_id: &str, series_id: Uuid) -> CoreResult<Vec<Task>> {
        self.series_get(user_id, series_id).await?;

        let rows = sqlx::query_as::<_, TaskRow>(
            r#"
            SELECT id, user_id, title, description, is_completed, completed_at,
                   created_at, updated_at, due_date, tags, priority, status,
                   series_id, recurrence_pattern
            FROM tasks WHERE series_id = $1 AND user_id = $2
            ORDER BY created_at DESC
            "#,
        )
        .bind(series_id)
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .map_err(|e| CoreError::Transient(e.to_string()))?;

        rows.into_iter().map(Task::try_from).collect()
    }
}

#[derive(Debug, Clone)]
pub struct WeeklyStatsResult {
    pub tasks_created_this_week: i64,
    pub tasks_completed_this_week: i64,
    pub total_completed: i64,
    pub total_incomplete: i64,
    pub week_start: DateTime<Utc>,
    pub week_end: DateTime<Utc>,
    pub total_tasks: i64,
}

fn validate_title(title: &str) -> CoreResult<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("title must not be blank".into()));
    }
    if trimmed.chars().count() > taskflow_core::model::MAX_TITLE_LEN {
        return Err(CoreError::Validation(format!(
            "title exceeds {} characters",
            taskflow_core::model::MAX_TITLE_LEN
        )));
    }
    Ok(trimmed.to_string())
}

fn validate_description(description: Option<&str>) -> CoreResult<()> {
    if let Some(d) = description {
        if d.chars().count() > taskflow_core::model::MAX_DESCRIPTION_LEN {
            return Err(CoreError::Validation(format!(
                "description exceeds {} characters",
                taskflow_core::model::MAX_DESCRIPTION_LEN
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_title_is_rejected() {
        assert!(validate_title("   ").is_err());
    }

    #[test]
    fn title_is_trimmed() {
        assert_eq!(validate_title("  Buy milk  ").unwrap(), "Buy milk");
    }

    #[test]
    fn oversized_description_is_rejected() {
        let long = "x".repeat(5001);
        assert!(validate_description(Some(&long)).is_err());
    }

    #[test]
    fn patch_with_no_fields_is_empty() {
        let patch = TaskPatch {
            title: None,
            description: None,
            due_date: None,
            tags: None,
            status: None,
        };
        assert!(patch.is_empty());
    }
}
