//! Client error types.
//!
//! Only the initial [`connect`](crate::ConnectionManager::connect) surfaces
//! these to callers. Failures after the channel is up are logged and fed
//! into reconnection instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid channel endpoint '{origin}': {reason}")]
    InvalidEndpoint { origin: String, reason: String },

    #[error("connection failed: {0}")]
    ConnectFailed(String),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("connect cancelled by close()")]
    Cancelled,
}

pub type ClientResult<T> = Result<T, ClientError>;
