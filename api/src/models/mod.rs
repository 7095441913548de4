pub mod auth;
pub mod chat;
pub mod history;
pub mod notification;
pub mod task;

pub use auth::{AuthResponse, LoginRequest, SignupRequest, UserResponse, MIN_PASSWORD_LEN};
pub use chat::{ChatRequest, ItemOrder, ItemPage, ListConversationsQuery, LoadItemsQuery, MessageItem};
pub use history::HistoryQuery;
pub use notification::NotificationQuery;
pub use task::{
    CreateSeriesRequest, CreateTaskRequest, ListRecurringQuery, RecurringTaskSeriesResponse,
    WeeklyStats, POPUP_TASK_COMPLETED, POPUP_TASK_CREATED, POPUP_TASK_DELETED,
    POPUP_TASK_INCOMPLETE, POPUP_TASK_UPDATED,
};
