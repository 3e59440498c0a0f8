//! Chat orchestration and repository trait definitions for Tovalley.
//!
//! This crate defines the "ports" (repository, presence and directory
//! traits) that the infrastructure layer implements, the in-process event
//! bus, and the chat services built on top of them. It depends only on
//! `tovalley-types` -- never on `tovalley-infra` or any database/IO crate.

pub mod chat;
pub mod event;
pub mod presence;
pub mod repository;
