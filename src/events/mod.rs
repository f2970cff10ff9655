//! Event classification and dispatch
//!
//! Raw platform payloads become typed [`Event`]s (with an explicit
//! unclassified fallback), pass through a bounded dedup window, and fan
//! out to registered handlers in priority order with per-handler failure
//! isolation.

mod classifier;
mod dedup;
mod dispatcher;
mod handler;
mod registry;
mod types;

pub use classifier::classify;
pub use dedup::DedupWindow;
pub use dispatcher::{Dispatcher, HandlerError};
pub use handler::{Context, EventHandler, FnHandler};
pub use registry::{EventFilter, HandlerRegistry, RegistrationId};
pub use types::{Event, EventCategory, EventSubcategory};
