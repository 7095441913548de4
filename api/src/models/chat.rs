use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub conversation_id: Option<Uuid>,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListConversationsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

/// Cursor pagination for `load_items` (spec §4.H) — `after` is the opaque
/// cursor the ChatKit-style protocol surface hands back between pages.
#[derive(Debug, Clone, Deserialize)]
pub struct LoadItemsQuery {
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub order: ItemOrder,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ItemOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageItem {
    pub id: String,
    pub role: String,
    pub content: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemPage {
    pub items: Vec<MessageItem>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}
