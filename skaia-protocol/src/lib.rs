//! # Skaia Live-Update Protocol
//!
//! Types exchanged between the web client and the hub over the live
//! WebSocket channel. Both sides depend on this crate, so the envelope
//! and payload shapes cannot drift apart.
//!
//! - [`envelope`] — the `{type, user_id?, payload}` frame wrapper
//! - [`payload`] — store and forum records carried inside `payload`

pub mod envelope;
pub mod payload;

pub use envelope::{Envelope, MessageType, UnknownMessageType};
pub use payload::{
    CartItem, ForumAction, ForumPayload, ForumPost, ForumThread, Product, StoreAction,
    StoreCategory, StorePayload,
};
