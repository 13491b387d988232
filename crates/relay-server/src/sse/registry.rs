//! Live session registry.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::gauge;
use parking_lot::RwLock;
use tracing::debug;

use super::session::{Session, SessionId, SessionTransport};

/// Builds a session around the send half of a freshly created channel.
///
/// Injected at construction so the owning application decides what a
/// session wraps; the registry itself only manages lifetimes.
pub type SessionFactory = Arc<dyn Fn(SessionTransport) -> Session + Send + Sync>;

/// Concurrent map of live sessions, keyed by session id.
///
/// Guarded by a synchronous lock so stream drop guards can clean up without
/// an async context. Locks are never held across an await point.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    factory: SessionFactory,
}

impl SessionRegistry {
    /// Create an empty registry with the given session factory.
    #[must_use]
    pub fn new(factory: SessionFactory) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            factory,
        }
    }

    /// Build a session from the factory and register it.
    pub fn create(&self, transport: SessionTransport) -> Arc<Session> {
        let session = Arc::new((self.factory)(transport));
        self.insert(Arc::clone(&session));
        session
    }

    /// Register a session under its id.
    pub fn insert(&self, session: Arc<Session>) {
        let id = session.id().clone();
        debug!(session_id = %id, "session registered");
        let _ = self.sessions.write().insert(id, session);
        gauge!("relay_active_sessions").set(self.len() as f64);
    }

    /// Look up a session by id.
    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().get(&SessionId::from(id)).cloned()
    }

    /// Remove a session by id, returning it if present.
    pub fn remove(&self, id: &SessionId) -> Option<Arc<Session>> {
        let removed = self.sessions.write().remove(id);
        if removed.is_some() {
            debug!(session_id = %id, "session removed");
            gauge!("relay_active_sessions").set(self.len() as f64);
        }
        removed
    }

    /// Snapshot all live sessions for iteration outside the lock.
    pub fn snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions.read().values().cloned().collect()
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether no sessions remain.
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Request close on every live session.
    ///
    /// Entries are removed by each stream task's drop guard, not here.
    pub fn close_all(&self) {
        for session in self.snapshot() {
            session.close();
        }
    }
}
