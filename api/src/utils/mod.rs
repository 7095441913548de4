pub mod error;

pub use error::{AppError, AppResult};

/// The `{success, data, popup, error}` envelope every route wraps its response in (spec §4.I, §6).
pub fn envelope<T: serde::Serialize>(data: T, popup: Option<&str>) -> serde_json::Value {
    serde_json::json!({
        "success": true,
        "data": data,
        "popup": popup,
        "error": serde_json::Value::Null,
    })
}
