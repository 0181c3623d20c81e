//! # Skaia Hub
//!
//! WebSocket hub for the Skaia live-update channel. Every envelope a client
//! sends is broadcast to all connected clients; the hub does not interpret
//! payloads.
//!
//! ## Routes
//! - `GET /api/ws`, `GET /ws` — live channel
//! - `GET /health` — health check
//! - `GET /api/clients` — connected client count

pub mod api;
pub mod config;
pub mod handlers;
pub mod state;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

pub use config::{ConfigError, ServerConfig};
pub use state::AppState;

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/ws", get(handlers::ws_handler))
        .route("/ws", get(handlers::ws_handler))
        .route("/health", get(api::health))
        .route("/api/clients", get(api::client_count))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves the hub on an already-bound listener until the process exits.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    axum::serve(listener, app(state)).await
}
