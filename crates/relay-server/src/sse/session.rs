//! Session state — one per connected SSE client.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use parking_lot::Mutex;
use relay_rpc::JsonRpcMessage;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error};
use uuid::Uuid;

use super::handler::{HandlerError, MessageHandler, SessionContext};
use super::{ENDPOINT_EVENT, MESSAGE_EVENT};

/// Unique session identifier (UUID v7, time-ordered).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a new random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Return the inner string as a slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A single frame queued for delivery on the push stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SseFrame {
    /// SSE event type (`endpoint` or `message`).
    pub event: &'static str,
    /// Event data — the endpoint URL or a serialized JSON-RPC message.
    pub data: String,
}

impl SseFrame {
    /// Handshake frame carrying the message-endpoint URL.
    pub fn endpoint(url: impl Into<String>) -> Self {
        Self {
            event: ENDPOINT_EVENT,
            data: url.into(),
        }
    }

    /// Protocol frame carrying a serialized JSON-RPC message.
    pub fn message(json: impl Into<String>) -> Self {
        Self {
            event: MESSAGE_EVENT,
            data: json.into(),
        }
    }
}

/// Send half of a session's push stream.
///
/// The sender can be dropped exactly once (close); all later sends are
/// no-ops so a slow close never panics the router.
pub struct SessionTransport {
    tx: Mutex<Option<mpsc::Sender<SseFrame>>>,
}

impl SessionTransport {
    /// Wrap the send half of a frame channel.
    pub fn new(tx: mpsc::Sender<SseFrame>) -> Self {
        Self {
            tx: Mutex::new(Some(tx)),
        }
    }

    /// Enqueue a frame without blocking. `false` when the channel is full,
    /// closed, or already terminated.
    fn try_send(&self, frame: SseFrame) -> bool {
        self.tx
            .lock()
            .as_ref()
            .is_some_and(|tx| tx.try_send(frame).is_ok())
    }

    /// Drop the sender, signaling end-of-stream to the receiving task.
    fn close(&self) {
        let _ = self.tx.lock().take();
    }

    /// Whether the sender has not been closed yet.
    pub fn is_open(&self) -> bool {
        self.tx.lock().is_some()
    }
}

/// Session lifecycle states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// Registered, handshake event not yet enqueued.
    Created = 0,
    /// Handshake delivered; message submissions accepted.
    Active = 1,
    /// Close requested; no new sends started.
    Closing = 2,
    /// Channel terminated; registry entry eligible for removal. Terminal.
    Closed = 3,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Created,
            1 => Self::Active,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// One client's logical connection: outbound push channel plus the
/// application message handler.
pub struct Session {
    id: SessionId,
    transport: SessionTransport,
    handler: Arc<dyn MessageHandler>,
    state: AtomicU8,
    dropped_frames: AtomicU64,
}

impl Session {
    /// Create a session in the `Created` state with a fresh id.
    pub fn new(transport: SessionTransport, handler: Arc<dyn MessageHandler>) -> Self {
        Self {
            id: SessionId::new(),
            transport,
            handler,
            state: AtomicU8::new(SessionState::Created as u8),
            dropped_frames: AtomicU64::new(0),
        }
    }

    /// Session identifier.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Whether message submissions and sends are accepted.
    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    /// Created → Active, once the handshake frame has been enqueued.
    pub fn mark_active(&self) {
        let _ = self.state.compare_exchange(
            SessionState::Created as u8,
            SessionState::Active as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    /// Enqueue a raw frame while the session is Created or Active.
    ///
    /// Used for the handshake event, which precedes activation.
    pub(crate) fn push_frame(&self, frame: SseFrame) -> bool {
        if self.state.load(Ordering::SeqCst) > SessionState::Active as u8 {
            return false;
        }
        let sent = self.transport.try_send(frame);
        if !sent {
            let _ = self.dropped_frames.fetch_add(1, Ordering::Relaxed);
        }
        sent
    }

    /// Enqueue a protocol message for delivery on the push stream.
    ///
    /// Non-blocking; `false` when the session is not Active or the client
    /// is gone. Callers log the failure but never propagate it.
    pub fn send(&self, message: &JsonRpcMessage) -> bool {
        match relay_rpc::encode(message) {
            Ok(json) => self.send_serialized(json),
            Err(e) => {
                error!(session_id = %self.id, error = %e, "failed to serialize outbound message");
                false
            }
        }
    }

    /// Enqueue an already-serialized message (single-encode broadcast path).
    pub(crate) fn send_serialized(&self, json: String) -> bool {
        if !self.is_active() {
            debug!(session_id = %self.id, state = ?self.state(), "send skipped, session not active");
            return false;
        }
        let sent = self.transport.try_send(SseFrame::message(json));
        if !sent {
            let _ = self.dropped_frames.fetch_add(1, Ordering::Relaxed);
        }
        sent
    }

    /// Frames dropped because the channel was full or closed.
    pub fn drop_count(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    /// Delegate an inbound message to the application handler.
    ///
    /// Pure pass-through: the transport attaches the session context (push
    /// access + captured credential) and reports the handler's outcome.
    pub async fn handle(
        self: &Arc<Self>,
        message: JsonRpcMessage,
        credential: Option<String>,
    ) -> Result<(), HandlerError> {
        let ctx = SessionContext::new(Arc::clone(self), credential);
        self.handler.handle(&ctx, message).await
    }

    /// Request close: Created/Active → Closing and terminate the channel.
    ///
    /// Idempotent; never regresses a Closed session.
    pub fn close(&self) {
        let prev = self
            .state
            .fetch_max(SessionState::Closing as u8, Ordering::SeqCst);
        if prev < SessionState::Closing as u8 {
            self.transport.close();
        }
    }

    /// Closing → Closed, once the stream task has observed termination.
    pub(crate) fn mark_closed(&self) {
        self.state
            .store(SessionState::Closed as u8, Ordering::SeqCst);
        self.transport.close();
    }
}
