pub mod error;
pub mod events;
pub mod model;
pub mod pagination;
pub mod priority;
pub mod recurrence;
pub mod tags;

pub use error::{CoreError, CoreResult};
