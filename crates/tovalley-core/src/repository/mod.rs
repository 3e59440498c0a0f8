//! Repository trait definitions (ports).
//!
//! These traits define the storage interface that the infrastructure layer
//! (tovalley-infra) implements. The core crate never depends on any
//! specific storage technology.

pub mod member;
pub mod message;
pub mod notification;
pub mod room;
