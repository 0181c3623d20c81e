//! # Message Router
//!
//! Demultiplexes inbound text frames into per-type listeners.
//!
//! A frame is parsed as JSON; if that fails it is logged and discarded.
//! Otherwise its `type` tag selects the listeners to invoke, and each one
//! receives only the `payload` field. Frames with an absent or unknown tag
//! reach nobody.
//!
//! A listener that panics is logged and skipped; the panic never reaches
//! the task that called [`MessageRouter::dispatch`].
//!
//! The registry is shared with every [`Subscription`] handle through a weak
//! reference, so a handle never keeps the router alive.

use dashmap::DashMap;
use serde_json::Value;
use skaia_protocol::MessageType;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error};

/// Callback invoked with the `payload` of a matching frame.
pub type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

struct Registry {
    listeners: DashMap<MessageType, HashMap<u64, Listener>>,
    next_id: AtomicU64,
}

#[derive(Clone)]
pub struct MessageRouter {
    registry: Arc<Registry>,
}

impl Default for MessageRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageRouter {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Registry {
                listeners: DashMap::new(),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Registers `callback` for frames tagged `kind`.
    pub fn on<F>(&self, kind: MessageType, callback: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry
            .listeners
            .entry(kind)
            .or_default()
            .insert(id, Arc::new(callback));
        debug!(%kind, id, "listener registered");

        Subscription {
            kind,
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Routes one inbound frame and returns how many listeners ran to
    /// completion.
    ///
    /// Listeners are invoked after the registry lock is released, so a
    /// listener may itself subscribe or unsubscribe.
    pub fn dispatch(&self, frame: &str) -> usize {
        let message: Value = match serde_json::from_str(frame) {
            Ok(message) => message,
            Err(e) => {
                error!(error = %e, "Failed to parse message");
                return 0;
            }
        };

        let Some(tag) = message.get("type").and_then(Value::as_str) else {
            debug!("frame has no type tag; ignoring");
            return 0;
        };
        let Ok(kind) = tag.parse::<MessageType>() else {
            debug!(tag, "no listeners for unknown message type");
            return 0;
        };

        let listeners: Vec<Listener> = match self.registry.listeners.get(&kind) {
            Some(entry) => entry.values().cloned().collect(),
            None => return 0,
        };

        let payload = message.get("payload").unwrap_or(&Value::Null);
        let mut completed = 0;
        for listener in &listeners {
            match catch_unwind(AssertUnwindSafe(|| listener(payload))) {
                Ok(()) => completed += 1,
                Err(_) => error!(%kind, "listener panicked; frame skipped for it"),
            }
        }
        completed
    }

    pub fn listener_count(&self, kind: MessageType) -> usize {
        self.registry
            .listeners
            .get(&kind)
            .map(|entry| entry.len())
            .unwrap_or(0)
    }
}

/// Handle to one listener registration.
///
/// Dropping the handle leaves the listener in place; call
/// [`unsubscribe`](Subscription::unsubscribe) to remove it.
#[derive(Debug)]
pub struct Subscription {
    kind: MessageType,
    id: u64,
    registry: Weak<Registry>,
}

impl Subscription {
    pub fn kind(&self) -> MessageType {
        self.kind
    }

    /// Removes exactly this registration. Calling it again is a no-op.
    pub fn unsubscribe(&self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let entry = registry.listeners.get_mut(&self.kind);
        if let Some(mut entry) = entry {
            if entry.remove(&self.id).is_some() {
                debug!(kind = %self.kind, id = self.id, "listener removed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    fn recorder(router: &MessageRouter, kind: MessageType) -> (Subscription, Arc<Mutex<Vec<Value>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let sub = router.on(kind, move |payload| sink.lock().push(payload.clone()));
        (sub, seen)
    }

    #[test]
    fn matching_listener_receives_only_the_payload() {
        let router = MessageRouter::new();
        let (_sub, seen) = recorder(&router, MessageType::ForumUpdate);

        let frame = r#"{"type":"forum:update","payload":{"action":"create_thread","thread":{"title":"Hi","content":"Hello"}}}"#;
        assert_eq!(router.dispatch(frame), 1);

        assert_eq!(
            *seen.lock(),
            vec![json!({"action": "create_thread", "thread": {"title": "Hi", "content": "Hello"}})]
        );
    }

    #[test]
    fn every_listener_for_the_type_runs_once() {
        let router = MessageRouter::new();
        let (_a, first) = recorder(&router, MessageType::StoreSync);
        let (_b, second) = recorder(&router, MessageType::StoreSync);
        let (_c, other) = recorder(&router, MessageType::StoreUpdate);

        assert_eq!(router.dispatch(r#"{"type":"store:sync","payload":[1,2]}"#), 2);

        assert_eq!(first.lock().len(), 1);
        assert_eq!(second.lock().len(), 1);
        assert!(other.lock().is_empty());
    }

    #[test]
    fn malformed_frames_reach_nobody() {
        let router = MessageRouter::new();
        let (_sub, seen) = recorder(&router, MessageType::UserJoin);

        for frame in ["", "{", "user:join", r#"{"type":"user:join""#] {
            assert_eq!(router.dispatch(frame), 0);
        }
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn unknown_or_missing_type_is_ignored() {
        let router = MessageRouter::new();
        let (_sub, seen) = recorder(&router, MessageType::UserLeave);

        assert_eq!(router.dispatch(r#"{"type":"chat:message","payload":1}"#), 0);
        assert_eq!(router.dispatch(r#"{"payload":1}"#), 0);
        assert_eq!(router.dispatch(r#"{"type":7,"payload":1}"#), 0);
        assert_eq!(router.dispatch("[1,2,3]"), 0);
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn missing_payload_is_delivered_as_null() {
        let router = MessageRouter::new();
        let (_sub, seen) = recorder(&router, MessageType::UserJoin);

        router.dispatch(r#"{"type":"user:join","user_id":"u-7"}"#);
        assert_eq!(*seen.lock(), vec![Value::Null]);
    }

    #[test]
    fn unsubscribe_is_idempotent_and_targets_one_registration() {
        let router = MessageRouter::new();
        let (gone, removed) = recorder(&router, MessageType::ForumSync);
        let (_kept, kept) = recorder(&router, MessageType::ForumSync);

        gone.unsubscribe();
        gone.unsubscribe();
        assert_eq!(router.listener_count(MessageType::ForumSync), 1);

        router.dispatch(r#"{"type":"forum:sync","payload":{}}"#);
        assert!(removed.lock().is_empty());
        assert_eq!(kept.lock().len(), 1);
    }

    #[test]
    fn listener_may_unsubscribe_itself_during_dispatch() {
        let router = MessageRouter::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let calls = Arc::new(AtomicU64::new(0));

        let slot_in = slot.clone();
        let calls_in = calls.clone();
        let sub = router.on(MessageType::StoreUpdate, move |_| {
            calls_in.fetch_add(1, Ordering::SeqCst);
            if let Some(sub) = slot_in.lock().take() {
                sub.unsubscribe();
            }
        });
        *slot.lock() = Some(sub);

        router.dispatch(r#"{"type":"store:update","payload":null}"#);
        router.dispatch(r#"{"type":"store:update","payload":null}"#);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_listener_does_not_stop_the_others() {
        let router = MessageRouter::new();
        let _boom = router.on(MessageType::UserJoin, |_| panic!("listener bug"));
        let (_sub, seen) = recorder(&router, MessageType::UserJoin);

        assert_eq!(router.dispatch(r#"{"type":"user:join","payload":1}"#), 1);
        assert_eq!(router.dispatch(r#"{"type":"user:join","payload":2}"#), 1);
        assert_eq!(*seen.lock(), vec![json!(1), json!(2)]);
    }

    #[test]
    fn unsubscribe_after_router_dropped_is_harmless() {
        let router = MessageRouter::new();
        let (sub, _) = recorder(&router, MessageType::UserJoin);
        drop(router);
        sub.unsubscribe();
    }
}
