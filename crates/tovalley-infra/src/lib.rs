//! Infrastructure layer for Tovalley.
//!
//! Contains implementations of the ports defined in `tovalley-core`:
//! SQLite storage for members, rooms, messages and notifications, and the
//! in-memory presence tracker.

pub mod presence;
pub mod sqlite;
