//! # Hub State
//!
//! Registry of connected clients and the broadcast fan-out.
//!
//! Every client gets a bounded outbound queue. Broadcasting never waits:
//! a client whose queue is full is evicted, which closes its queue and
//! ends its connection.

use crate::config::ServerConfig;
use axum::extract::ws::Utf8Bytes;
use dashmap::DashMap;
use skaia_protocol::Envelope;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{error, info, warn};

/// Sender half of a client's outbound frame queue.
pub type ClientTx = mpsc::Sender<Utf8Bytes>;

/// Information stored for each connected client.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    /// Bounded queue feeding this client's WebSocket writer.
    pub tx: ClientTx,

    /// Last `user_id` seen on this connection.
    pub user_id: Option<String>,
}

/// Shared hub state, cloned into every handler.
///
/// Uses `Arc<DashMap<...>>` so connection tasks can register, broadcast
/// and unregister concurrently.
#[derive(Clone)]
pub struct AppState {
    /// Connected clients, keyed by connection ID.
    clients: Arc<DashMap<String, ClientHandle>>,

    /// Hub settings; only the queue capacity is read after startup.
    config: Arc<ServerConfig>,
}

impl AppState {
    /// Creates an empty hub.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            clients: Arc::new(DashMap::new()),
            config: Arc::new(config),
        }
    }

    /// Creates the outbound queue for a new connection and registers it.
    pub fn register(&self, conn_id: &str) -> mpsc::Receiver<Utf8Bytes> {
        let (tx, rx) = mpsc::channel(self.config.client_queue_capacity);
        self.clients.insert(
            conn_id.to_string(),
            ClientHandle { tx, user_id: None },
        );
        info!("Client registered: {}", conn_id);
        rx
    }

    /// Removes a client. Dropping its queue sender ends the connection's
    /// outbound task.
    pub fn unregister(&self, conn_id: &str) {
        if let Some((_, client)) = self.clients.remove(conn_id) {
            info!(
                "Client unregistered: {} (user {})",
                conn_id,
                client.user_id.as_deref().unwrap_or("-")
            );
        }
    }

    /// Remembers the last `user_id` seen on a connection, for logging.
    pub fn set_user(&self, conn_id: &str, user_id: &str) {
        if let Some(mut client) = self.clients.get_mut(conn_id) {
            client.user_id = Some(user_id.to_string());
        }
    }

    /// Number of currently connected clients.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Queues `envelope` for every connected client, sender included.
    /// Returns the number of clients it was queued for.
    pub fn broadcast(&self, envelope: &Envelope) -> usize {
        let frame = match envelope.encode() {
            Ok(text) => Utf8Bytes::from(text),
            Err(e) => {
                error!("Serialize error: {}", e);
                return 0;
            }
        };

        let mut delivered = 0;
        let mut evicted = Vec::new();
        for client in self.clients.iter() {
            match client.tx.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!("Send queue full for {}; evicting", client.key());
                    evicted.push(client.key().clone());
                }
                Err(TrySendError::Closed(_)) => evicted.push(client.key().clone()),
            }
        }

        // Removal happens after iteration; DashMap shards are still locked
        // inside the loop.
        for conn_id in evicted {
            self.unregister(&conn_id);
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use skaia_protocol::MessageType;

    fn state(capacity: usize) -> AppState {
        AppState::new(ServerConfig {
            client_queue_capacity: capacity,
            ..Default::default()
        })
    }

    fn envelope() -> Envelope {
        Envelope::new(MessageType::ForumUpdate, json!({"action": "create_thread"}))
    }

    #[tokio::test]
    async fn broadcast_reaches_every_client() {
        let state = state(8);
        let mut a = state.register("a");
        let mut b = state.register("b");

        assert_eq!(state.broadcast(&envelope()), 2);

        let expected = envelope().encode().unwrap();
        assert_eq!(a.recv().await.unwrap().as_str(), expected);
        assert_eq!(b.recv().await.unwrap().as_str(), expected);
    }

    #[tokio::test]
    async fn full_queue_evicts_slow_client() {
        let state = state(1);
        let _slow = state.register("slow");
        let mut fast = state.register("fast");

        assert_eq!(state.broadcast(&envelope()), 2);
        fast.recv().await.unwrap();

        assert_eq!(state.broadcast(&envelope()), 1);
        assert_eq!(state.client_count(), 1);
        assert!(fast.recv().await.is_some());
    }

    #[tokio::test]
    async fn evicted_client_sees_its_queue_close() {
        let state = state(1);
        let mut slow = state.register("slow");

        state.broadcast(&envelope());
        state.broadcast(&envelope());

        assert!(slow.recv().await.is_some());
        assert!(slow.recv().await.is_none());
    }

    #[tokio::test]
    async fn dropped_receiver_is_pruned() {
        let state = state(4);
        drop(state.register("gone"));

        assert_eq!(state.broadcast(&envelope()), 0);
        assert_eq!(state.client_count(), 0);
    }

    #[test]
    fn set_user_is_remembered_until_unregister() {
        let state = state(4);
        let _rx = state.register("c1");

        state.set_user("c1", "u-9");
        state.set_user("missing", "u-1");
        assert_eq!(
            state.clients.get("c1").and_then(|c| c.user_id.clone()).as_deref(),
            Some("u-9")
        );
        assert!(!state.clients.contains_key("missing"));

        state.unregister("c1");
        assert!(state.clients.get("c1").is_none());
    }
}
