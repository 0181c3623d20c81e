//! # REST API Endpoints
//!
//! Plain HTTP endpoints next to the live channel: a health check and the
//! number of connected clients.

use crate::state::AppState;
use axum::{extract::State, Json};
use serde::Serialize;

/// Generic response body for endpoints that only report a status.
#[derive(Debug, Serialize)]
pub struct SimpleResponse {
    /// Human-readable message.
    pub message: String,

    /// Machine-readable status, `"ok"` when healthy.
    pub status: String,
}

/// `GET /health`
pub async fn health() -> Json<SimpleResponse> {
    Json(SimpleResponse {
        message: "Skaia API is healthy".to_string(),
        status: "ok".to_string(),
    })
}

/// Response body for `GET /api/clients`.
#[derive(Debug, Serialize)]
pub struct ClientCount {
    /// Number of WebSocket clients currently registered with the hub.
    pub clients: usize,
}

/// `GET /api/clients` — number of browsers currently on the live channel.
pub async fn client_count(State(state): State<AppState>) -> Json<ClientCount> {
    Json(ClientCount {
        clients: state.client_count(),
    })
}
