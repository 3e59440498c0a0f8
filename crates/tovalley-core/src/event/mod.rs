//! Chat event bus.
//!
//! Two logical topics: the chat-message topic (every appended message, for
//! live delivery to connected clients) and the notification topic (keyed
//! per recipient). Publishing never blocks the caller.

pub mod bus;

pub use bus::{BusError, ChatEventBus, ChatEventPublisher};
