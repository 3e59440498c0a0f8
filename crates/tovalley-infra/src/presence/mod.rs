//! Presence tracker implementations.

pub mod memory;

pub use memory::InMemoryPresenceTracker;
