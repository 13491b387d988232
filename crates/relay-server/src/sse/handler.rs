//! Application-facing message handler seam.

use std::sync::Arc;

use async_trait::async_trait;
use relay_rpc::JsonRpcMessage;

use super::session::Session;

/// Failure reported by a [`MessageHandler`].
///
/// The message is surfaced verbatim in the HTTP 500 body returned to the
/// submitting client.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    /// Human-readable failure description.
    pub message: String,
}

impl HandlerError {
    /// Build a handler error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Per-dispatch view of the session a message arrived on.
///
/// Carries push access back to the originating client plus the credential
/// captured when the stream was established.
#[derive(Clone)]
pub struct SessionContext {
    session: Arc<Session>,
    credential: Option<String>,
}

impl SessionContext {
    /// Bind a session and its captured credential for one dispatch.
    pub fn new(session: Arc<Session>, credential: Option<String>) -> Self {
        Self {
            session,
            credential,
        }
    }

    /// The session the message arrived on.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Credential captured from the stream-establishing request, if any.
    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    /// Push a message back to this client on its event stream.
    pub fn reply(&self, message: &JsonRpcMessage) -> bool {
        self.session.send(message)
    }
}

/// Application entry point for inbound JSON-RPC messages.
///
/// The transport validates and routes; everything protocol-level above the
/// envelope happens behind this trait. Responses go back asynchronously via
/// [`SessionContext::reply`], never on the submitting HTTP response.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Process one decoded message from the given session.
    async fn handle(
        &self,
        ctx: &SessionContext,
        message: JsonRpcMessage,
    ) -> Result<(), HandlerError>;
}
