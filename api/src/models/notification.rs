use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread: Option<bool>,
}
