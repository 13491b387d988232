//! Credential correlation between the stream and message channels.
//!
//! The `Authorization` header arrives on the stream-establishing GET but the
//! protocol traffic arrives on later POSTs, which carry only the session id.
//! This store bridges the two: the header value captured at stream setup is
//! looked up again at dispatch time and handed to the message handler.

use dashmap::DashMap;

use super::session::SessionId;

/// Set-once map from session id to the credential captured at stream setup.
#[derive(Default)]
pub struct AuthTokenStore {
    tokens: DashMap<SessionId, String>,
}

impl AuthTokenStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a credential for a session. First write wins; a second write
    /// for the same session is ignored.
    pub fn put(&self, id: &SessionId, credential: String) {
        let _ = self
            .tokens
            .entry(id.clone())
            .or_insert_with(|| credential);
    }

    /// Fetch the credential captured for a session, if one was present.
    pub fn get(&self, id: &SessionId) -> Option<String> {
        self.tokens.get(id).map(|entry| entry.value().clone())
    }

    /// Drop the entry for a session. Called on every removal path so closed
    /// sessions never leak credentials.
    pub fn remove(&self, id: &SessionId) {
        let _ = self.tokens.remove(id);
    }

    /// Number of stored credentials.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }
}
