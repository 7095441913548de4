//! Task API chat operation (spec §4.I): resolves/creates the conversation,
//! appends the user turn, drives the external agent with task-store
//! operations bound as tools, and streams assistant text back ending in the
//! `[DONE]` sentinel (spec §6).

use crate::services::agent::{AgentClient, AgentEvent, AgentMessage, AgentTurnRequest, ToolDefinition, ToolResultMessage};
use crate::services::conversation::ConversationStore;
use crate::services::event_publisher::EventPublisher;
use crate::services::task_store::TaskStore;
use futures::StreamExt;
use serde_json::{json, Value};
use std::sync::Arc;
use taskflow_core::model::MessageRole;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

const MAX_TOOL_ITERATIONS: u32 = 5;

fn task_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "create_task".to_string(),
            description: "Create a new task for the current user".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "title": {"type": "string"},
                    "description": {"type": "string"},
                    "due_date": {"type": "string", "format": "date-time"},
                    "tags": {"type": "array", "items": {"type": "string"}},
                },
                "required": ["title"],
            }),
        },
        ToolDefinition {
            name: "list_tasks".to_string(),
            description: "List all tasks owned by the current user".to_string(),
            parameters: json!({"type": "object", "properties": {}}),
        },
        ToolDefinition {
            name: "complete_task".to_string(),
            description: "Mark a task as complete".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {"task_id": {"type": "string"}},
                "required": ["task_id"],
            }),
        },
    ]
}

/// Tools forwarded to the agent with `user_id` pre-bound, so the agent never
/// sees or chooses another user's rows (spec §4.I).
struct TaskTools {
    user_id: String,
    task_store: Arc<TaskStore>,
    event_publisher: Arc<EventPublisher>,
}

impl TaskTools {
    async fn execute(&self, name: &str, arguments: &Value) -> Value {
        match name {
            "create_task" => self.create_task(arguments).await,
            "list_tasks" => self.list_tasks().await,
            "complete_task" => self.complete_task(arguments).await,
            other => json!({"error": format!("unknown tool '{other}'")}),
        }
    }

    async fn create_task(&self, arguments: &Value) -> Value {
        let title = arguments.get("title").and_then(Value::as_str).unwrap_or_default().to_string();
        let description = arguments.get("description").and_then(Value::as_str).map(str::to_string);
        let due_date = arguments
            .get("due_date")
            .and_then(Value::as_str)
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&chrono::Utc));
        let tags: Vec<String> = arguments
            .get("tags")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        match self.task_store.create(&self.user_id, title, description, due_date, tags).await {
            Ok(task) => {
                self.event_publisher.task_created(&task).await;
                json!({"task_id": task.id, "priority": task.priority.to_string()})
            }
            Err(e) => json!({"error": e.to_string()}),
        }
    }

    async fn list_tasks(&self) -> Value {
        match self.task_store.list_all(&self.user_id).await {
            Ok(tasks) => json!(tasks
                .iter()
                .map(|t| json!({"id": t.id, "title": t.title, "status": t.status.to_string(), "due_date": t.due_date}))
                .collect::<Vec<_>>()),
            Err(e) => json!({"error": e.to_string()}),
        }
    }

    async fn complete_task(&self, arguments: &Value) -> Value {
        let Some(task_id) = arguments.get("task_id").and_then(Value::as_str).and_then(|s| Uuid::parse_str(s).ok())
        else {
            return json!({"error": "task_id is required and must be a valid id"});
        };

        match self.task_store.mark_complete(&self.user_id, task_id).await {
            Ok(task) => {
                self.event_publisher.task_completed(&task).await;
                json!({"task_id": task.id, "status": task.status.to_string()})
            }
            Err(e) => json!({"error": e.to_string()}),
        }
    }
}

#[derive(Clone)]
pub struct ChatService {
    conversations: Arc<ConversationStore>,
    task_store: Arc<TaskStore>,
    event_publisher: Arc<EventPublisher>,
    agent: Arc<dyn AgentClient>,
}

impl ChatService {
    pub fn new(
        conversations: Arc<ConversationStore>,
        task_store: Arc<TaskStore>,
        event_publisher: Arc<EventPublisher>,
        agent: Arc<dyn AgentClient>,
    ) -> Self {
        Self { conversations, task_store, event_publisher, agent }
    }

    /// Drives one chat turn, returning a channel-backed stream of
    /// already-formatted SSE lines (`data: ...\n\n`), terminated by
    /// `data: [DONE]\n\n` on success or left unterminated after
    /// `data: Error: <message>\n\n` on failure (spec §7).
    pub async fn handle_chat(
        &self,
        user_id: String,
        conversation_id: Option<Uuid>,
        user_message: String,
    ) -> taskflow_core::error::CoreResult<(Uuid, ReceiverStream<String>)> {
        let conversation = self.conversations.get_or_create(&user_id, conversation_id).await?;

        self.conversations
            .add_message(&user_id, conversation.id, MessageRole::User, user_message, None, None)
            .await?;

        let history = self.conversations.load_history(conversation.id, Some(50)).await?;

        let (tx, rx) = mpsc::channel::<String>(32);

        let tools = TaskTools {
            user_id: user_id.clone(),
            task_store: self.task_store.clone(),
            event_publisher: self.event_publisher.clone(),
        };
        let agent = self.agent.clone();
        let conversations = self.conversations.clone();
        let conversation_id = conversation.id;

        tokio::spawn(async move {
            let mut agent_history: Vec<AgentMessage> =
                history.into_iter().map(|(role, content)| AgentMessage { role: role.to_string(), content }).collect();
            let mut tool_results: Vec<ToolResultMessage> = Vec::new();
            let mut accumulated = String::new();

            'turn: for _ in 0..MAX_TOOL_ITERATIONS {
                let request = AgentTurnRequest {
                    history: agent_history.clone(),
                    tool_results: std::mem::take(&mut tool_results),
                    tools: task_tools(),
                };
                let mut stream = agent.stream_turn(request).await;

                while let Some(event) = stream.next().await {
                    match event {
                        AgentEvent::TextDelta(delta) => {
                            accumulated.push_str(&delta);
                            let chunk = json!({"delta": delta});
                            if tx.send(format!("data: {chunk}\n\n")).await.is_err() {
                                return;
                            }
                        }
                        AgentEvent::ToolCall { call_id, name, arguments } => {
                            let result = tools.execute(&name, &arguments).await;
                            tool_results.push(ToolResultMessage { call_id, content: result.to_string() });
                        }
                        AgentEvent::Done => {
                            if tool_results.is_empty() {
                                break 'turn;
                            }
                            agent_history.push(AgentMessage { role: "assistant".to_string(), content: accumulated.clone() });
                            continue 'turn;
                        }
                    }
                }
            }

            let persisted = conversations
                .add_message(
                    &user_id,
                    conversation_id,
                    MessageRole::Assistant,
                    accumulated,
                    None,
                    Some(taskflow_core::model::PLACEHOLDER_ITEM_ID),
                )
                .await;

            match persisted {
                Ok(_) => {
                    let _ = tx.send("data: [DONE]\n\n".to_string()).await;
                }
                Err(e) => {
                    let _ = tx.send(format!("data: Error: {e}\n\n")).await;
                }
            }
        });

        Ok((conversation.id, ReceiverStream::new(rx)))
    }
}
