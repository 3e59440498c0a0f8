//! Request extractors shared by the chat handlers.

pub mod member;
pub mod query;
