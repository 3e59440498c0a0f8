//! HTTP/REST and WebSocket API layer for Tovalley chat.
//!
//! Axum-based REST API at `/api/v1/` with member identification via the
//! `X-Member-Id` header, envelope response format, and a live room socket
//! at `/ws/chat/rooms/{id}`.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod response;
pub mod router;
