//! WebSocket event stream
//!
//! Clients join rooms (one per campaign) with `{"type":"join-room","room":..}`
//! and only receive room-scoped events for rooms they joined. Events with no
//! room go to every client.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use std::collections::HashSet;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::state::SharedState;
use crate::events::{ClientMessage, ServerEvent};

pub async fn handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Whether a client subscribed to `rooms` should receive `event`.
pub fn should_deliver(event: &ServerEvent, rooms: &HashSet<String>) -> bool {
    match event.room() {
        Some(room) => rooms.contains(room),
        None => true,
    }
}

/// Apply a client text frame to the room set.
fn apply_client_message(text: &str, rooms: &mut HashSet<String>) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::JoinRoom { room }) => {
            debug!("[WS] joined {}", room);
            rooms.insert(room);
        }
        Ok(ClientMessage::LeaveRoom { room }) => {
            debug!("[WS] left {}", room);
            rooms.remove(&room);
        }
        Err(e) => debug!("[WS] ignoring client message: {}", e),
    }
}

async fn handle_socket(socket: WebSocket, state: SharedState) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.events.subscribe();
    let mut rooms: HashSet<String> = HashSet::new();

    state.metrics.ws_clients.inc();
    info!("[WS] client connected");

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(event) => {
                        if !should_deliver(&event, &rooms) {
                            continue;
                        }
                        let payload = match serde_json::to_string(&event) {
                            Ok(p) => p,
                            Err(e) => {
                                warn!("[WS] failed to encode event: {}", e);
                                continue;
                            }
                        };
                        if sender.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("[WS] slow client skipped {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => apply_client_message(&text, &mut rooms),
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sender.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    state.metrics.ws_clients.dec();
    info!("[WS] client disconnected");
}
