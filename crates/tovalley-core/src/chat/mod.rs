//! Chat messaging core.
//!
//! - `service` -- `ChatService`, the orchestrator behind every chat endpoint
//! - `dispatcher` -- `NotificationDispatcher` for recipients who are not present
//! - `best_effort` -- the failure-isolation boundary for side effects that must
//!   never fail a send

pub mod best_effort;
pub mod dispatcher;
pub mod service;

pub use best_effort::BestEffortRunner;
pub use dispatcher::{DispatchError, NotificationDispatcher};
pub use service::{ChatService, ChatSettings, NotificationTicket, RoomEntry, SendReceipt};
