//! # Forum Thread List
//!
//! Threads created locally are appended immediately and mirrored to the hub
//! as `forum:update`. Because the hub echoes every message back to all
//! clients, inbound `create_thread` updates are de-duplicated by thread id.

use crate::manager::ConnectionManager;
use crate::router::Subscription;
use parking_lot::RwLock;
use serde::Deserialize;
use skaia_protocol::{Envelope, ForumAction, ForumPayload, ForumThread, MessageType};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct ThreadList {
    threads: Arc<RwLock<Vec<ForumThread>>>,
    manager: ConnectionManager,
    user_id: Option<String>,
}

impl ThreadList {
    pub fn new(manager: ConnectionManager) -> Self {
        Self {
            threads: Arc::new(RwLock::new(Vec::new())),
            manager,
            user_id: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Starts applying `forum:sync` snapshots and `forum:update` changes.
    pub fn attach(&self) -> Vec<Subscription> {
        let threads = self.threads.clone();
        let sync = self.manager.on(MessageType::ForumSync, move |payload| {
            match ForumPayload::deserialize(payload) {
                Ok(ForumPayload {
                    threads: Some(snapshot),
                    ..
                }) => *threads.write() = snapshot,
                Ok(_) => {}
                Err(e) => warn!(error = %e, "ignoring malformed forum:sync payload"),
            }
        });

        let threads = self.threads.clone();
        let update = self.manager.on(MessageType::ForumUpdate, move |payload| {
            match ForumAction::deserialize(payload) {
                Ok(action) => apply(&mut threads.write(), action),
                Err(e) => warn!(error = %e, "ignoring malformed forum:update payload"),
            }
        });

        vec![sync, update]
    }

    /// Creates a thread locally and mirrors it to the hub.
    pub fn create_thread(&self, title: impl Into<String>, content: impl Into<String>) -> ForumThread {
        let thread = ForumThread {
            id: Some(Uuid::new_v4().to_string()),
            user_id: self.user_id.clone(),
            title: title.into(),
            content: content.into(),
            ..Default::default()
        };
        self.threads.write().push(thread.clone());
        self.mirror(ForumAction::CreateThread {
            thread: thread.clone(),
        });
        thread
    }

    pub fn delete_thread(&self, thread_id: &str) -> bool {
        let removed = remove(&mut self.threads.write(), thread_id);
        if removed {
            self.mirror(ForumAction::DeleteThread {
                thread_id: thread_id.to_string(),
            });
        }
        removed
    }

    pub fn threads(&self) -> Vec<ForumThread> {
        self.threads.read().clone()
    }

    fn mirror(&self, action: ForumAction) {
        let envelope = match Envelope::from_payload(MessageType::ForumUpdate, &action) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "failed to encode forum update");
                return;
            }
        };
        match &self.user_id {
            Some(user_id) => self.manager.send(&envelope.with_user(user_id.clone())),
            None => self.manager.send(&envelope),
        }
    }
}

fn apply(threads: &mut Vec<ForumThread>, action: ForumAction) {
    match action {
        ForumAction::CreateThread { thread } => {
            let known = thread
                .id
                .as_deref()
                .is_some_and(|id| threads.iter().any(|t| t.id.as_deref() == Some(id)));
            if known {
                debug!("thread already present; skipping echo");
            } else {
                threads.push(thread);
            }
        }
        ForumAction::DeleteThread { thread_id } => {
            remove(threads, &thread_id);
        }
    }
}

fn remove(threads: &mut Vec<ForumThread>, thread_id: &str) -> bool {
    let before = threads.len();
    threads.retain(|t| t.id.as_deref() != Some(thread_id));
    threads.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;

    fn list() -> ThreadList {
        let manager = ConnectionManager::new("http://localhost:5173", ClientConfig::default()).unwrap();
        ThreadList::new(manager)
    }

    #[test]
    fn create_thread_assigns_id_and_author() {
        let forum = list().with_user("u-42");
        let thread = forum.create_thread("Welcome", "First post");

        assert!(thread.id.is_some());
        assert_eq!(thread.user_id.as_deref(), Some("u-42"));
        assert_eq!(forum.threads(), vec![thread]);
    }

    #[test]
    fn remote_create_thread_is_appended() {
        let forum = list();
        let _subs = forum.attach();

        forum.manager.router().dispatch(
            r#"{"type":"forum:update","payload":{"action":"create_thread","thread":{"title":"Hi","content":"Hello"}}}"#,
        );

        let threads = forum.threads();
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].title, "Hi");
        assert_eq!(threads[0].content, "Hello");
    }

    #[test]
    fn echo_of_own_thread_is_not_duplicated() {
        let forum = list();
        let _subs = forum.attach();
        let thread = forum.create_thread("Mine", "Body");

        let echo = serde_json::json!({
            "type": "forum:update",
            "payload": {"action": "create_thread", "thread": thread},
        });
        forum.manager.router().dispatch(&echo.to_string());

        assert_eq!(forum.threads().len(), 1);
    }

    #[test]
    fn remote_delete_removes_thread() {
        let forum = list();
        let _subs = forum.attach();
        let thread = forum.create_thread("Gone soon", "Body");
        let id = thread.id.unwrap();

        forum.manager.router().dispatch(&format!(
            r#"{{"type":"forum:update","payload":{{"action":"delete_thread","thread_id":"{id}"}}}}"#
        ));

        assert!(forum.threads().is_empty());
        assert!(!forum.delete_thread(&id));
    }

    #[test]
    fn forum_sync_replaces_threads() {
        let forum = list();
        let _subs = forum.attach();
        forum.create_thread("Stale", "Body");

        forum.manager.router().dispatch(
            r#"{"type":"forum:sync","payload":{"threads":[
                {"id":"t1","title":"Rules","content":"Read me","is_pinned":true},
                {"id":"t2","title":"Events","content":"Tonight"}
            ]}}"#,
        );

        let titles: Vec<String> = forum.threads().into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["Rules", "Events"]);
        assert!(forum.threads()[0].is_pinned);
    }

    #[test]
    fn unknown_action_is_ignored() {
        let forum = list();
        let _subs = forum.attach();
        forum.create_thread("Keep", "Body");

        forum
            .manager
            .router()
            .dispatch(r#"{"type":"forum:update","payload":{"action":"pin_thread","thread_id":"x"}}"#);

        assert_eq!(forum.threads().len(), 1);
    }
}
