//! `GET` stream endpoint: establishes the long-lived per-client push channel.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use metrics::counter;
use tracing::{debug, info};

use crate::error::service_unavailable;
use crate::server::AppState;
use crate::sse::auth::AuthTokenStore;
use crate::sse::registry::SessionRegistry;
use crate::sse::session::{Session, SessionTransport, SseFrame};

/// Removes a session's registry and credential entries when its stream task
/// ends, whichever way it ends (client disconnect, server close, task abort).
pub(crate) struct StreamGuard {
    session: Arc<Session>,
    registry: Arc<SessionRegistry>,
    auth: Arc<AuthTokenStore>,
}

impl StreamGuard {
    pub(crate) fn new(
        session: Arc<Session>,
        registry: Arc<SessionRegistry>,
        auth: Arc<AuthTokenStore>,
    ) -> Self {
        Self {
            session,
            registry,
            auth,
        }
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        let id = self.session.id().clone();
        self.session.mark_closed();
        let _ = self.registry.remove(&id);
        self.auth.remove(&id);
        counter!("relay_sessions_closed_total").increment(1);
        info!(session_id = %id, dropped_frames = self.session.drop_count(), "session closed");
    }
}

/// Advertised message-endpoint URL for a session.
pub(crate) fn endpoint_url(base_url: &str, message_path: &str, session_id: &str) -> String {
    format!("{base_url}{message_path}?sessionId={session_id}")
}

/// Handle `GET` on the stream path.
///
/// Registers a session, captures the `Authorization` header for later
/// dispatches, and returns an SSE response whose first event is the
/// handshake `endpoint` event. The stream stays open until the client
/// disconnects or the server closes the session.
pub async fn establish_stream(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if state.is_shutting_down() {
        debug!("stream request refused, shutdown in progress");
        return service_unavailable();
    }

    let (tx, mut rx) = tokio::sync::mpsc::channel(state.config.channel_capacity);
    let session = state.registry.create(SessionTransport::new(tx));
    let id = session.id().clone();

    if let Some(credential) = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
    {
        state.auth.put(&id, credential.to_owned());
    }

    counter!("relay_sessions_opened_total").increment(1);

    let url = endpoint_url(
        &state.config.base_url,
        &state.config.message_path,
        id.as_str(),
    );
    // Enqueued before activation so it is always the first frame out.
    let _ = session.push_frame(SseFrame::endpoint(url));
    session.mark_active();
    info!(session_id = %id, "session established");

    let guard = StreamGuard::new(session, Arc::clone(&state.registry), Arc::clone(&state.auth));
    let keep_alive_secs = state.config.keep_alive_secs;

    let stream = async_stream::stream! {
        // Owned by the generator: dropped when the client disconnects or
        // the channel ends, firing registry and credential cleanup.
        let _guard = guard;
        while let Some(frame) = rx.recv().await {
            yield Ok::<_, Infallible>(Event::default().event(frame.event).data(frame.data));
        }
    };

    Sse::new(stream)
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(keep_alive_secs)))
        .into_response()
}
