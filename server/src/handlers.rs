//! # WebSocket Handlers
//!
//! Connection lifecycle for the hub:
//! - Upgrading HTTP requests to WebSocket
//! - Draining each client's outbound queue into its socket
//! - Decoding inbound envelopes and broadcasting them to everyone

use crate::state::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use skaia_protocol::Envelope;
use tracing::{debug, info, warn};
use uuid::Uuid;

// ─── WebSocket Upgrade Endpoint ─────────────────────────────────

/// `GET /api/ws` (and the legacy `GET /ws`) — upgrades to the live channel.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

// ─── Connection Lifecycle ───────────────────────────────────────

/// Runs one client connection until either side goes away.
///
/// The connection ends when the client closes the socket, or when the hub
/// drops the client's queue (eviction), in which case a close frame is
/// sent first.
async fn handle_connection(socket: WebSocket, state: AppState) {
    let conn_id = Uuid::new_v4().to_string();
    info!("New connection: {}", conn_id);

    let (mut ws_sink, mut ws_stream) = socket.split();
    let mut rx = state.register(&conn_id);

    // ── Outbound Task ──
    let mut outbound_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_sink.send(Message::Text(frame)).await.is_err() {
                return;
            }
        }
        let _ = ws_sink.send(Message::Close(None)).await;
    });

    // ── Inbound Loop ──
    let inbound = async {
        while let Some(Ok(msg)) = ws_stream.next().await {
            match msg {
                Message::Text(text) => handle_frame(&state, &conn_id, text.as_str()),
                Message::Close(_) => break,
                _ => {}
            }
        }
    };

    tokio::select! {
        _ = inbound => {}
        _ = &mut outbound_task => {
            warn!("Outbound queue closed for {}", conn_id);
        }
    }

    // ── Cleanup ──
    info!("Disconnecting: {}", conn_id);
    outbound_task.abort();
    state.unregister(&conn_id);
}

/// Decodes one inbound frame and fans it out. Frames that are not a valid
/// envelope are dropped; the connection stays up.
fn handle_frame(state: &AppState, conn_id: &str, text: &str) {
    let envelope = match serde_json::from_str::<Envelope>(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("Dropping malformed frame from {}: {}", conn_id, e);
            return;
        }
    };

    if let Some(user_id) = envelope.user_id.as_deref() {
        state.set_user(conn_id, user_id);
    }

    let delivered = state.broadcast(&envelope);
    debug!(kind = %envelope.kind, delivered, "broadcast from {}", conn_id);
}
