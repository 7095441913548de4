pub mod agent;
pub mod auth;
pub mod chat;
pub mod conversation;
pub mod event_publisher;
pub mod notification;
pub mod task_store;

pub use agent::{AgentClient, HttpAgentClient};
pub use auth::AuthService;
pub use chat::ChatService;
pub use conversation::ConversationStore;
pub use event_publisher::EventPublisher;
pub use notification::NotificationStore;
pub use task_store::{TaskPatch, TaskStore, WeeklyStatsResult};

use crate::cache::CacheClient;
use crate::config::Config;
use crate::middleware::AuthState;
use sqlx::PgPool;
use std::sync::Arc;

/// Everything a route handler needs, assembled once at startup (spec §5).
/// `auth_state` is carried here too (rather than as a second router `State`)
/// so signup/login can issue tokens through the same extractor every other
/// handler uses.
#[derive(Clone)]
pub struct AppServices {
    pub db: PgPool,
    pub cache: CacheClient,
    pub task_store: TaskStore,
    pub event_publisher: EventPublisher,
    pub notification: NotificationStore,
    pub conversation: ConversationStore,
    pub auth: AuthService,
    pub chat: ChatService,
    pub auth_state: Arc<AuthState>,
}

impl AppServices {
    pub fn new(db: PgPool, cache: CacheClient, config: &Config, auth_state: Arc<AuthState>) -> anyhow::Result<Self> {
        let task_store = TaskStore::new(db.clone(), cache.clone());
        let event_publisher = EventPublisher::new(&config.kafka.brokers, db.clone())?;
        let notification = NotificationStore::new(db.clone(), cache.clone());
        let conversation = ConversationStore::new(db.clone());
        let auth = AuthService::new(db.clone());

        let agent: Arc<dyn AgentClient> = Arc::new(HttpAgentClient::new(
            config.agent.provider_url.clone().unwrap_or_default(),
            config.agent.api_key.clone(),
            config.agent.model.clone(),
            std::time::Duration::from_secs(config.agent.request_timeout_secs),
        ));
        let chat = ChatService::new(
            Arc::new(conversation.clone()),
            Arc::new(task_store.clone()),
            Arc::new(event_publisher.clone()),
            agent,
        );

        Ok(Self {
            db,
            cache,
            task_store,
            event_publisher,
            notification,
            conversation,
            auth,
            chat,
            auth_state,
        })
    }
}
