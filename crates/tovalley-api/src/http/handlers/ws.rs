//! WebSocket handler for live chat rooms.
//!
//! `/ws/chat/rooms/{id}` puts the connecting member in the room for as long
//! as the socket is open: presence is recorded and unread messages are
//! acknowledged on connect, messages published to the room are forwarded,
//! and every presence record of the member is dropped on close.
//!
//! The loop is a single `tokio::select!` over the heartbeat, the room
//! subscription and incoming frames. Frames are serde-tagged JSON enums
//! (`WsChatFrame` incoming, `WsChatResponse` outgoing).

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tovalley_core::event::bus::RoomSubscription;
use tovalley_observe::chat_attrs;
use tovalley_types::chat::{ChatMessageView, OutgoingMessage, RoomId};
use tovalley_types::member::MemberId;

use crate::http::error::AppError;
use crate::http::extractors::member::CurrentMember;
use crate::http::handlers::parse_room_id;
use crate::state::AppState;

/// Interval between server heartbeats.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// WebSocket message types
// ---------------------------------------------------------------------------

/// Incoming frame from a WebSocket client.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsChatFrame {
    /// Send a message to the room.
    Send { content: String },
    /// Acknowledge messages received while connected.
    Read,
    /// Keep-alive ping.
    Ping,
}

/// Outgoing frame to a WebSocket client.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsChatResponse {
    /// Connection accepted; the member is now present in the room.
    Entered {
        chat_room_id: RoomId,
        marked_read: u64,
        other_participant: Option<MemberId>,
    },
    /// A message was published to the room.
    Message { message: ChatMessageView },
    /// The client's own send was stored.
    Sent {
        chat_message_id: Uuid,
        all_present: bool,
    },
    /// Result of a `read` frame.
    Read { marked_read: u64 },
    /// A frame could not be processed.
    Error { message: String },
    /// Heartbeat or reply to `ping`.
    Pong,
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// GET /ws/chat/rooms/{id} - Upgrade to a live room connection.
///
/// Membership is checked and presence recorded before the upgrade, so a
/// rejected member gets a plain error response instead of a socket.
pub async fn room_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    member: CurrentMember,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let room_id = parse_room_id(&id)?;
    let member_id = member.id();

    // Subscribe first so nothing published after the entry is missed.
    let subscription = state.event_bus.subscribe_room(room_id);
    let entry = state.chat_service.enter_room(member_id, room_id).await?;

    let entered = WsChatResponse::Entered {
        chat_room_id: entry.chat_room_id,
        marked_read: entry.marked_read,
        other_participant: entry.other_participant,
    };

    let cleanup = state.clone();
    Ok(ws
        .on_failed_upgrade(move |err| {
            tracing::warn!(error = %err, %member_id, "room socket upgrade failed");
            tokio::spawn(async move {
                if let Err(e) = cleanup.chat_service.leave(member_id).await {
                    tracing::warn!(error = %e, %member_id, "failed to drop presence");
                }
            });
        })
        .on_upgrade(move |socket| {
            handle_room_ws(socket, state, member_id, subscription, entered)
        })
        .into_response())
}

#[tracing::instrument(skip_all, fields(operation = chat_attrs::OP_ROOM_SOCKET, member_id = %member_id, room_id = %subscription.room_id()))]
async fn handle_room_ws(
    socket: WebSocket,
    state: AppState,
    member_id: MemberId,
    mut subscription: RoomSubscription,
    entered: WsChatResponse,
) {
    let room_id = subscription.room_id();
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    // The first tick completes immediately.
    heartbeat.tick().await;

    if send_frame(&mut ws_sender, &entered).await {
        tracing::debug!("room socket connected");

        loop {
            tokio::select! {
                // --- Branch 1: Heartbeat ---
                _ = heartbeat.tick() => {
                    if !send_frame(&mut ws_sender, &WsChatResponse::Pong).await {
                        break;
                    }
                }

                // --- Branch 2: Messages published to the room ---
                published = subscription.recv() => {
                    let Some(message) = published else {
                        tracing::debug!("event bus closed");
                        break;
                    };
                    let frame = WsChatResponse::Message {
                        message: ChatMessageView::for_viewer(message, member_id),
                    };
                    if !send_frame(&mut ws_sender, &frame).await {
                        break;
                    }
                }

                // --- Branch 3: Incoming WebSocket frames ---
                msg_result = ws_receiver.next() => {
                    match msg_result {
                        Some(Ok(Message::Text(text))) => {
                            let response = process_frame(&text, &state, member_id, room_id).await;
                            if !send_frame(&mut ws_sender, &response).await {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Err(err)) => {
                            tracing::debug!(error = %err, "room socket receive error");
                            break;
                        }
                        // Ignore binary, ping, pong protocol frames
                        Some(Ok(_)) => {}
                    }
                }
            }
        }
    }

    if let Err(e) = state.chat_service.leave(member_id).await {
        tracing::warn!(error = %e, "failed to drop presence on disconnect");
    }
    tracing::debug!("room socket closed");
}

// ---------------------------------------------------------------------------
// Frame processing
// ---------------------------------------------------------------------------

/// Process a single incoming frame and build the reply.
async fn process_frame(
    text: &str,
    state: &AppState,
    member_id: MemberId,
    room_id: RoomId,
) -> WsChatResponse {
    let frame: WsChatFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(err) => {
            tracing::warn!(error = %err, "ignoring malformed room socket frame");
            return WsChatResponse::Error {
                message: format!("Invalid frame: {err}"),
            };
        }
    };

    match frame {
        WsChatFrame::Send { content } => {
            let outgoing = OutgoingMessage {
                chat_room_id: room_id,
                content,
            };
            match state.chat_service.send_message(member_id, outgoing).await {
                Ok(receipt) => WsChatResponse::Sent {
                    chat_message_id: receipt.message.id,
                    all_present: receipt.all_present,
                },
                Err(e) => WsChatResponse::Error {
                    message: e.to_string(),
                },
            }
        }
        WsChatFrame::Read => match state.chat_service.mark_read(member_id, room_id).await {
            Ok(marked_read) => WsChatResponse::Read { marked_read },
            Err(e) => WsChatResponse::Error {
                message: e.to_string(),
            },
        },
        WsChatFrame::Ping => WsChatResponse::Pong,
    }
}

/// Serialize and send one frame. Returns `false` once the socket is gone.
async fn send_frame(sender: &mut SplitSink<WebSocket, Message>, frame: &WsChatResponse) -> bool {
    let json = match serde_json::to_string(frame) {
        Ok(json) => json,
        Err(err) => {
            tracing::error!(error = %err, "failed to serialize room socket frame");
            return true;
        }
    };
    sender.send(Message::Text(json.into())).await.is_ok()
}
