//! SQLite storage layer.
//!
//! Repository implementations backed by SQLite with WAL mode and split
//! read/write connection pools.

pub mod member;
pub mod message;
pub mod notification;
pub mod pool;
pub mod room;

mod convert;
