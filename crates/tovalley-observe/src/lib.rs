//! Observability for Tovalley: subscriber setup and shared log attributes.

pub mod chat_attrs;
pub mod tracing_setup;
