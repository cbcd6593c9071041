//! `WebSocket` handler for live store updates.
//!
//! Clients connect to `GET /ws/updates`. They first receive the current
//! store, then one message per published snapshot. Every message is a JSON
//! object `{"event": "data_update", "data": <snapshot>}`.
//!
//! A client that falls behind skips the snapshots it missed and resumes
//! from the most recent one.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use serde::Serialize;
use simfeed_core::store::Snapshot;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::state::AppState;

/// Event name carried by every push message.
pub const DATA_UPDATE_EVENT: &str = "data_update";

/// Envelope for one push message.
#[derive(Debug, Serialize)]
pub struct UpdateMessage<'a> {
    /// Always [`DATA_UPDATE_EVENT`].
    pub event: &'static str,
    /// The store as of the message.
    pub data: &'a Snapshot,
}

impl<'a> UpdateMessage<'a> {
    /// Wrap a snapshot.
    pub const fn new(data: &'a Snapshot) -> Self {
        Self {
            event: DATA_UPDATE_EVENT,
            data,
        }
    }

    /// Encode as a text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot fails to serialize.
    pub fn to_frame(&self) -> Result<Message, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(Message::Text(json.into()))
    }
}

/// Upgrade an HTTP request to a `WebSocket` connection and begin streaming
/// updates.
///
/// # Route
///
/// `GET /ws/updates`
pub async fn ws_updates(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

/// Send one snapshot. Returns `false` once the client is gone.
async fn send_snapshot(socket: &mut WebSocket, snapshot: &Snapshot) -> bool {
    let frame = match UpdateMessage::new(snapshot).to_frame() {
        Ok(frame) => frame,
        Err(e) => {
            warn!(tick = snapshot.tick, "Failed to serialize data update: {e}");
            return true;
        }
    };
    socket.send(frame).await.is_ok()
}

/// Handle the `WebSocket` lifecycle: send the current store, then forward
/// each broadcast snapshot until either side closes.
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    debug!("WebSocket client connected");

    // Subscribe before reading the store so no tick falls between the two.
    let mut rx = state.subscribe();

    let initial = Snapshot::capture(&*state.store.read().await);
    if !send_snapshot(&mut socket, &initial).await {
        debug!("WebSocket client disconnected (initial send failed)");
        return;
    }
    drop(initial);

    loop {
        tokio::select! {
            // Receive a snapshot from the scheduler.
            result = rx.recv() => {
                match result {
                    Ok(snapshot) => {
                        if !send_snapshot(&mut socket, &snapshot).await {
                            debug!("WebSocket client disconnected (send failed)");
                            return;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        debug!(skipped = n, "WebSocket client lagged, skipping ahead");
                    }
                    Err(RecvError::Closed) => {
                        debug!("Broadcast channel closed, shutting down WebSocket");
                        return;
                    }
                }
            }
            // Check if the client sent a close frame or disconnected.
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("WebSocket client disconnected");
                        return;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!("WebSocket client disconnected (pong failed)");
                            return;
                        }
                    }
                    Some(Err(e)) => {
                        debug!("WebSocket error: {e}");
                        return;
                    }
                    _ => {
                        // Client text and binary frames are ignored.
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use simfeed_core::store::Store;

    use super::*;

    #[test]
    fn message_envelope_shape() {
        let snapshot = Snapshot::capture(&Store::new());
        let value = serde_json::to_value(UpdateMessage::new(&snapshot)).unwrap();
        assert_eq!(value["event"], "data_update");
        assert_eq!(value["data"]["tick"], 0);
        assert!(value["data"]["collections"].as_object().unwrap().is_empty());
    }

    #[test]
    fn frames_are_text() {
        let snapshot = Snapshot::capture(&Store::new());
        let frame = UpdateMessage::new(&snapshot).to_frame().unwrap();
        assert!(matches!(frame, Message::Text(_)));
    }
}
