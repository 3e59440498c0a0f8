//! Shared domain types for Tovalley.
//!
//! Members, chat rooms, messages, notifications, presence records, paging
//! and the application time zone, plus the error enums shared by every layer.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod chat;
pub mod error;
pub mod member;
pub mod page;
pub mod time;
