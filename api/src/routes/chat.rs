use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use futures::StreamExt;
use std::sync::Arc;
use uuid::Uuid;

use crate::middleware::AuthUser;
use crate::models::{ChatRequest, ItemOrder, ItemPage, ListConversationsQuery, LoadItemsQuery, MessageItem};
use crate::services::AppServices;
use crate::utils::{envelope, AppError, AppResult};

/// `POST /chat` (spec §4.I/§6): starts a chat turn and streams the response
/// body verbatim — `ChatService` already produces `data: ...\n\n` framed
/// lines, ending in `data: [DONE]\n\n` or an unterminated error line.
pub async fn chat(
    State(services): State<Arc<AppServices>>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<ChatRequest>,
) -> AppResult<Response> {
    let (_conversation_id, stream) = services
        .chat
        .handle_chat(user.user_id, input.conversation_id, input.message)
        .await?;

    let body = Body::from_stream(stream.map(|chunk| Ok::<_, std::io::Error>(chunk)));

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(body)
        .map_err(|e| AppError::Internal(format!("failed to build SSE response: {e}")))?)
}

pub async fn list_conversations(
    State(services): State<Arc<AppServices>>,
    Extension(user): Extension<AuthUser>,
    Path(path_user_id): Path<String>,
    Query(query): Query<ListConversationsQuery>,
) -> AppResult<Json<serde_json::Value>> {
    if path_user_id != user.user_id {
        return Err(AppError::Forbidden("cannot list another user's conversations".to_string()));
    }
    let conversations = services.conversation.list_conversations(&user.user_id, query.limit, query.offset).await?;
    Ok(Json(envelope(conversations, None)))
}

pub async fn load_messages(
    State(services): State<Arc<AppServices>>,
    Extension(user): Extension<AuthUser>,
    Path((path_user_id, conversation_id)): Path<(String, Uuid)>,
    Query(query): Query<LoadItemsQuery>,
) -> AppResult<Json<serde_json::Value>> {
    if path_user_id != user.user_id {
        return Err(AppError::Forbidden("cannot read another user's conversation".to_string()));
    }

    let after = query
        .after
        .as_deref()
        .map(Uuid::parse_str)
        .transpose()
        .map_err(|_| AppError::Validation("after must be a valid cursor".to_string()))?;

    let (messages, has_more) = services
        .conversation
        .load_items(conversation_id, after, query.limit, query.order == ItemOrder::Asc)
        .await?;

    let next_cursor = messages.last().map(|m| m.id.to_string());
    let items = messages
        .into_iter()
        .map(|m| MessageItem {
            id: m.external_item_id,
            role: m.role.to_string(),
            content: m.content,
            created_at: m.created_at,
        })
        .collect();

    Ok(Json(envelope(ItemPage { items, next_cursor, has_more }, None)))
}

pub async fn cleanup_messages(State(services): State<Arc<AppServices>>) -> AppResult<Json<serde_json::Value>> {
    let (deleted_count, timestamp) = services.conversation.cleanup_expired().await?;
    Ok(Json(envelope(
        serde_json::json!({ "deleted_count": deleted_count, "timestamp": timestamp }),
        None,
    )))
}
