//! Session registry.
//!
//! Maps each user to the set of that user's open sessions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::RwLock;

use super::session::{Session, SessionId};
use crate::messages::UserId;

/// Concurrency-safe mapping from user to open sessions.
#[derive(Debug, Default)]
pub struct Registry {
    /// Map from user to that user's sessions keyed by session ID.
    sessions: RwLock<HashMap<UserId, HashMap<SessionId, Arc<Session>>>>,

    /// Set once by `close_all`, only while the write lock is held.
    closed: AtomicBool,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a session under its user.
    ///
    /// Returns false if the registry has been closed; the caller owns the
    /// session's teardown in that case.
    pub async fn register(&self, session: Arc<Session>) -> bool {
        let mut sessions = self.sessions.write().await;
        if self.closed.load(Ordering::Acquire) {
            return false;
        }

        sessions
            .entry(session.user_id())
            .or_default()
            .insert(session.id(), session);
        true
    }

    /// Removes a session. Unknown sessions are ignored.
    ///
    /// Returns true if the session was present.
    pub async fn unregister(&self, user_id: UserId, session_id: SessionId) -> bool {
        let mut sessions = self.sessions.write().await;
        let Some(user_sessions) = sessions.get_mut(&user_id) else {
            return false;
        };

        let removed = user_sessions.remove(&session_id).is_some();
        if user_sessions.is_empty() {
            sessions.remove(&user_id);
        }
        removed
    }

    /// Returns the sessions registered for a user at the time of the call.
    pub async fn snapshot_for(&self, user_id: UserId) -> Vec<Arc<Session>> {
        let sessions = self.sessions.read().await;
        sessions
            .get(&user_id)
            .map(|s| s.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Closes the registry and tears down every session.
    ///
    /// Returns the number of sessions that were registered. When this returns
    /// the registry is empty and refuses new sessions.
    pub async fn close_all(&self) -> usize {
        let drained = {
            let mut sessions = self.sessions.write().await;
            self.closed.store(true, Ordering::Release);
            std::mem::take(&mut *sessions)
        };

        let sessions: Vec<Arc<Session>> = drained
            .into_values()
            .flat_map(HashMap::into_values)
            .collect();

        join_all(sessions.iter().map(|session| session.close())).await;
        sessions.len()
    }

    /// Returns true once `close_all` has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Returns the number of registered sessions.
    pub async fn session_count(&self) -> usize {
        let sessions = self.sessions.read().await;
        sessions.values().map(HashMap::len).sum()
    }

    /// Returns the number of users with at least one session.
    pub async fn user_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
