//! WebSocket handler for live reload.
//!
//! Each connection registers a listener with the engine, answers client
//! frames, and forwards the listener's outbound channel to the socket.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use liveserve_core::{ClientMessage, ListenerId, ServerMessage};

use crate::state::AppState;
use crate::static_files;

/// Handle WebSocket upgrade for live reload.
pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Result of handling one client frame.
#[derive(Debug, PartialEq, Eq)]
enum FrameOutcome {
    Reply(ServerMessage),
    Silent,
    Close,
}

/// Handle an established WebSocket connection.
async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let listeners = state.engine.listeners();
    let (id, mut outbound) = listeners.register();

    loop {
        tokio::select! {
            // Forward engine messages to the client
            message = outbound.recv() => {
                let Some(message) = message else { break };
                let closing = message == ServerMessage::Closed;
                if !send(&mut socket, id, &message).await {
                    break;
                }
                if closing {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
            }
            // Handle client frames
            frame = socket.recv() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    Some(Ok(_)) => continue,
                };
                match handle_frame(&state, id, text.as_str()).await {
                    FrameOutcome::Reply(reply) => {
                        if !send(&mut socket, id, &reply).await {
                            break;
                        }
                    }
                    FrameOutcome::Silent => {}
                    FrameOutcome::Close => {
                        let _ = socket.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
        }
    }

    listeners.remove(id);
}

/// Send one frame. Returns `false` once the connection is gone.
async fn send(socket: &mut WebSocket, id: ListenerId, message: &ServerMessage) -> bool {
    let frame = match message.to_frame() {
        Ok(frame) => frame,
        Err(error) => {
            tracing::warn!(listener = id, %error, "Failed to encode frame");
            return true;
        }
    };
    match socket.send(Message::Text(frame.into())).await {
        Ok(()) => true,
        Err(error) => {
            tracing::debug!(listener = id, %error, "Listener went away");
            false
        }
    }
}

/// Decide the reply to a client frame.
async fn handle_frame(state: &AppState, id: ListenerId, text: &str) -> FrameOutcome {
    let message = match ClientMessage::parse(text) {
        Ok(message) => message,
        Err(error) => {
            tracing::debug!(listener = id, %error, "Rejected client frame");
            return FrameOutcome::Reply(ServerMessage::Error(error.to_string()));
        }
    };

    match message {
        ClientMessage::Open(path) => match state.engine.page(&path) {
            Ok(page) => {
                tracing::debug!(listener = id, page = %page, "Listener identified");
                if state.engine.listeners().identify(id, page) {
                    FrameOutcome::Reply(ServerMessage::Connected)
                } else {
                    FrameOutcome::Silent
                }
            }
            Err(error) => FrameOutcome::Reply(ServerMessage::Error(error.to_string())),
        },
        ClientMessage::Fetch(path) => match static_files::load_markup(state, &path).await {
            Some(markup) => FrameOutcome::Reply(ServerMessage::Dom(markup)),
            None => {
                tracing::debug!(listener = id, path = %path, "Fetch target missing");
                FrameOutcome::Silent
            }
        },
        ClientMessage::Close => FrameOutcome::Close,
    }
}
