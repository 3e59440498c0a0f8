//! Axum router configuration with middleware.
//!
//! REST routes live under `/api/v1/`; the live room socket is at
//! `/ws/chat/rooms/{id}`. Middleware: CORS, tracing.

use axum::Router;
use axum::extract::State;
use axum::routing::{delete, get, post, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Rooms
        .route(
            "/chat/rooms",
            post(handlers::room::create_room).get(handlers::room::list_rooms),
        )
        // Messages
        .route(
            "/chat/rooms/{id}/messages",
            get(handlers::message::list_messages).post(handlers::message::send_message),
        )
        .route("/chat/rooms/{id}/read", post(handlers::message::mark_read))
        // Presence
        .route(
            "/chat/rooms/{id}/presence",
            put(handlers::presence::enter_room),
        )
        .route("/chat/presence", delete(handlers::presence::leave))
        // Notifications
        .route(
            "/notifications",
            get(handlers::notification::list_notifications),
        );

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/ws/chat/rooms/{id}", get(handlers::ws::room_ws_handler))
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness plus the size of the in-memory live state.
async fn health_check(State(state): State<AppState>) -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "presence_records": state.chat_service.presence().snapshot().len(),
        "notification_topics": state.event_bus.notification_topic_count(),
    }))
}
