//! # Message Envelope
//!
//! Every frame on the live channel is a JSON object of the form
//! `{"type": "...", "user_id": "...", "payload": ...}`. The `type` tag is
//! drawn from the closed [`MessageType`] set; `payload` is opaque at this
//! layer and its shape depends on the tag.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The fixed set of message tags understood by client and hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    // ── Store ─────────────────────────────────────────────────────
    /// Full store snapshot (cart, products, categories).
    #[serde(rename = "store:sync")]
    StoreSync,

    /// Incremental store change, e.g. an item added to a cart.
    #[serde(rename = "store:update")]
    StoreUpdate,

    // ── Forum ─────────────────────────────────────────────────────
    /// Full forum snapshot (threads, posts).
    #[serde(rename = "forum:sync")]
    ForumSync,

    /// Incremental forum change, e.g. a thread created.
    #[serde(rename = "forum:update")]
    ForumUpdate,

    // ── Presence ──────────────────────────────────────────────────
    #[serde(rename = "user:join")]
    UserJoin,

    #[serde(rename = "user:leave")]
    UserLeave,
}

impl MessageType {
    pub const ALL: [MessageType; 6] = [
        MessageType::StoreSync,
        MessageType::StoreUpdate,
        MessageType::ForumSync,
        MessageType::ForumUpdate,
        MessageType::UserJoin,
        MessageType::UserLeave,
    ];

    /// The wire tag, e.g. `"forum:update"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::StoreSync => "store:sync",
            MessageType::StoreUpdate => "store:update",
            MessageType::ForumSync => "forum:sync",
            MessageType::ForumUpdate => "forum:update",
            MessageType::UserJoin => "user:join",
            MessageType::UserLeave => "user:leave",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a wire tag is not one of [`MessageType::ALL`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown message type '{0}'")]
pub struct UnknownMessageType(pub String);

impl FromStr for MessageType {
    type Err = UnknownMessageType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MessageType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownMessageType(s.to_string()))
    }
}

/// One frame on the live channel.
///
/// `user_id` is omitted from the JSON when absent. A missing `payload`
/// deserializes as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: MessageType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Envelope {
    pub fn new(kind: MessageType, payload: serde_json::Value) -> Self {
        Self {
            kind,
            user_id: None,
            payload,
        }
    }

    /// Builds an envelope whose payload is the JSON form of `payload`.
    pub fn from_payload<T: Serialize>(
        kind: MessageType,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(kind, serde_json::to_value(payload)?))
    }

    /// Tags the envelope with the sending user.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Serializes the envelope as a JSON text frame.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tags_parse_back_to_the_same_variant() {
        for kind in MessageType::ALL {
            assert_eq!(kind.as_str().parse::<MessageType>(), Ok(kind));
        }
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let err = "chat:message".parse::<MessageType>().unwrap_err();
        assert_eq!(err, UnknownMessageType("chat:message".to_string()));
    }

    #[test]
    fn encode_omits_missing_user_id() {
        let env = Envelope::new(MessageType::UserJoin, json!({"name": "steve"}));
        let value: serde_json::Value = serde_json::from_str(&env.encode().unwrap()).unwrap();
        assert_eq!(value, json!({"type": "user:join", "payload": {"name": "steve"}}));
    }

    #[test]
    fn encode_includes_user_id_when_set() {
        let env = Envelope::new(MessageType::StoreUpdate, json!(null)).with_user("u-1");
        let value: serde_json::Value = serde_json::from_str(&env.encode().unwrap()).unwrap();
        assert_eq!(value["user_id"], "u-1");
        assert_eq!(value["type"], "store:update");
    }

    #[test]
    fn missing_payload_decodes_as_null() {
        let env: Envelope = serde_json::from_str(r#"{"type":"forum:sync"}"#).unwrap();
        assert_eq!(env.kind, MessageType::ForumSync);
        assert!(env.payload.is_null());
        assert_eq!(env.user_id, None);
    }

    #[test]
    fn unknown_type_does_not_decode_as_envelope() {
        assert!(serde_json::from_str::<Envelope>(r#"{"type":"nope","payload":1}"#).is_err());
    }
}
