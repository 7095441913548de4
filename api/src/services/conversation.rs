//! Chat Conversation Store (spec §4.H): stateless per-request persistence.
//! Every operation loads from durable storage, mutates, returns — there is no
//! in-process conversation state between requests, mirroring the Task
//! Store's transaction-per-call shape.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use taskflow_core::error::{CoreError, CoreResult};
use taskflow_core::model::{Conversation, Message, MessageRole, MESSAGE_RETENTION_DAYS, PLACEHOLDER_ITEM_ID};
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
struct ConversationRow {
    id: Uuid,
    user_id: String,
    title: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ConversationRow> for Conversation {
    fn from(row: ConversationRow) -> Self {
        Conversation {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    external_item_id: String,
    conversation_id: Uuid,
    user_id: String,
    role: String,
    content: String,
    tool_calls: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for Message {
    type Error = CoreError;

    fn try_from(row: MessageRow) -> CoreResult<Self> {
        Ok(Message {
            id: row.id,
            external_item_id: row.external_item_id,
            conversation_id: row.conversation_id,
            user_id: row.user_id,
            role: MessageRole::from_str(&row.role)
                .ok_or_else(|| CoreError::FatalConfig(format!("unknown role '{}'", row.role)))?,
            content: row.content,
            tool_calls: row.tool_calls,
            created_at: row.created_at,
            expires_at: row.expires_at,
        })
    }
}

#[derive(Clone)]
pub struct ConversationStore {
    db: PgPool,
}

impl ConversationStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// `get_or_create_conversation(user_id, conversation_id?) → Conversation`.
    pub async fn get_or_create(&self, user_id: &str, conversation_id: Option<Uuid>) -> CoreResult<Conversation> {
        if let Some(id) = conversation_id {
            let row = sqlx::query_as::<_, ConversationRow>(
                "SELECT id, user_id, title, is_active, created_at, updated_at FROM conversations WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| CoreError::Transient(e.to_string()))?;

            return match row {
                None => Err(CoreError::NotFound(format!("conversation {id} not found"))),
                Some(row) if row.user_id != user_id => {
                    Err(CoreError::Forbidden(format!("conversation {id} belongs to another user")))
                }
                Some(row) => {
                    let now = Utc::now();
                    sqlx::query("UPDATE conversations SET updated_at = $2 WHERE id = $1")
                        .bind(id)
                        .bind(now)
                        .execute(&self.db)
                        .await
                        .map_err(|e| CoreError::Transient(e.to_string()))?;
                    Ok(Conversation {
                        updated_at: now,
                        ..row.into()
                    })
                }
            };
        }

        let now = Utc::now();
        let id = Uuid::new_v4();
        let title = format!("Conversation {}", now.format("%Y-%m-%d %H:%M"));

        sqlx::query(
            r#"
            INSERT INTO conversations (id, user_id, title, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, true, $4, $4)
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(&title)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(|e| CoreError::Transient(e.to_string()))?;

        Ok(Conversation {
            id,
            user_id: user_id.to_string(),
            title,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// `add_message` (spec §4.H). `streamed_id` is the identifier the
    /// streaming surface attached to the message; when it is the sentinel
    /// placeholder a fresh opaque id is minted and recorded as
    /// `external_item_id` so later loads return a stable identity.
    pub async fn add_message(
        &self,
        user_id: &str,
        conversation_id: Uuid,
        role: MessageRole,
        content: String,
        tool_calls: Option<serde_json::Value>,
        streamed_id: Option<&str>,
    ) -> CoreResult<Message> {
        let external_item_id = match streamed_id {
            None | Some(PLACEHOLDER_ITEM_ID) => Uuid::new_v4().to_string(),
            Some(id) => id.to_string(),
        };

        let now = Utc::now();
        let expires_at = now + Duration::days(MESSAGE_RETENTION_DAYS);
        let id = Uuid::new_v4();

        let mut tx = self.db.begin().await.map_err(|e| CoreError::Transient(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO messages (id, external_item_id, conversation_id, user_id, role, content, tool_calls, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(id)
        .bind(&external_item_id)
        .bind(conversation_id)
        .bind(user_id)
        .bind(role.to_string())
        .bind(&content)
        .bind(&tool_calls)
        .bind(now)
        .bind(expires_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| CoreError::Transient(e.to_string()))?;

        sqlx::query("UPDATE conversations SET updated_at = $2 WHERE id = $1")
            .bind(conversation_id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| CoreError::Transient(e.to_string()))?;

        tx.commit().await.map_err(|e| CoreError::Transient(e.to_string()))?;

        Ok(Message {
            id,
            external_item_id,
            conversation_id,
            user_id: user_id.to_string(),
            role,
            content,
            tool_calls,
            created_at: now,
            expires_at,
        })
    }

    /// `load_history(user_id, conversation_id, limit?) → [{role, content}]`,
    /// chronological order. Caller enforces user isolation.
    pub async fn load_history(
        &self,
        conversation_id: Uuid,
        limit: Option<i64>,
    ) -> CoreResult<Vec<(MessageRole, String)>> {
        let rows = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT role, content FROM (
                SELECT role, content, created_at, id
                FROM messages WHERE conversation_id = $1
                ORDER BY created_at DESC, id DESC
                LIMIT $2
            ) recent ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(conversation_id)
        .bind(limit.unwrap_or(50))
        .fetch_all(&self.db)
        .await
        .map_err(|e| CoreError::Transient(e.to_string()))?;

        rows.into_iter()
            .map(|(role, content)| {
                MessageRole::from_str(&role)
                    .map(|r| (r, content))
                    .ok_or_else(|| CoreError::FatalConfig(format!("unknown role '{role}'")))
            })
            .collect()
    }

    /// `load_items(thread_id, after?, limit, order) → Page<Item>` — the
    /// ChatKit-style cursor-paginated surface. The cursor is the message id
    /// encoded as a string; `after` excludes the cursor row itself.
    pub async fn load_items(
        &self,
        conversation_id: Uuid,
        after: Option<Uuid>,
        limit: i64,
        ascending: bool,
    ) -> CoreResult<(Vec<Message>, bool)> {
        let order = if ascending { "ASC" } else { "DESC" };
        let query = format!(
            r#"
            SELECT id, external_item_id, conversation_id, user_id, role, content, tool_calls, created_at, expires_at
            FROM messages
            WHERE conversation_id = $1
              AND ($2::uuid IS NULL OR id {cmp} $2)
            ORDER BY created_at {order}, id {order}
            LIMIT $3
            "#,
            cmp = if ascending { ">" } else { "<" },
        );

        let rows = sqlx::query_as::<_, MessageRow>(&query)
            .bind(conversation_id)
            .bind(after)
            .bind(limit + 1)
            .fetch_all(&self.db)
            .await
            .map_err(|e| CoreError::Transient(e.to_string()))?;

        let has_more = rows.len() as i64 > limit;
        let items: CoreResult<Vec<Message>> = rows
            .into_iter()
            .take(limit as usize)
            .map(Message::try_from)
            .collect();

        Ok((items?, has_more))
    }

    pub async fn list_conversations(&self, user_id: &str, limit: i64, offset: i64) -> CoreResult<Vec<Conversation>> {
        let rows = sqlx::query_as::<_, ConversationRow>(
            r#"
            SELECT id, user_id, title, is_active, created_at, updated_at
            FROM conversations WHERE user_id = $1
            ORDER BY updated_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await
        .map_err(|e| CoreError::Transient(e.to_string()))?;

        Ok(rows.into_iter().map(Conversation::from).collect())
    }

    /// Daily cleanup job (spec §4.H): delete rows past retention, return
    /// `{deleted_count, timestamp}`. The worker's cron-scheduled job runs an
    /// equivalent direct query; this copy backs the synchronous
    /// `/admin/cleanup/messages` endpoint.
    pub async fn cleanup_expired(&self) -> CoreResult<(u64, DateTime<Utc>)> {
        let now = Utc::now();
        let result = sqlx::query("DELETE FROM messages WHERE expires_at < $1")
            .bind(now)
            .execute(&self.db)
            .await
            .map_err(|e| CoreError::Transient(e.to_string()))?;

        Ok((result.rows_affected(), now))
    }
}
