//! Server assembly: shared state, router, broadcast, lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::{get, post};
use metrics::counter;
use relay_rpc::JsonRpcMessage;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::health::{HealthResponse, health_check};
use crate::shutdown::ShutdownCoordinator;
use crate::sse::auth::AuthTokenStore;
use crate::sse::handler::MessageHandler;
use crate::sse::message::submit_message;
use crate::sse::registry::{SessionFactory, SessionRegistry};
use crate::sse::session::Session;
use crate::sse::stream::establish_stream;

/// Failure starting the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listen address could not be bound.
    #[error("failed to bind server address: {0}")]
    Bind(#[from] std::io::Error),
}

/// State shared by every endpoint handler.
pub struct AppState {
    /// Server configuration, fixed after startup.
    pub config: ServerConfig,
    /// Live sessions keyed by id.
    pub registry: Arc<SessionRegistry>,
    /// Credentials captured at stream setup.
    pub auth: Arc<AuthTokenStore>,
    shutting_down: AtomicBool,
    started_at: Instant,
}

impl AppState {
    /// Build fresh state around an application handler; every session the
    /// registry creates wraps that handler.
    pub fn new(config: ServerConfig, handler: Arc<dyn MessageHandler>) -> Self {
        let factory: SessionFactory =
            Arc::new(move |transport| Session::new(transport, Arc::clone(&handler)));
        Self {
            config,
            registry: Arc::new(SessionRegistry::new(factory)),
            auth: Arc::new(AuthTokenStore::new()),
            shutting_down: AtomicBool::new(false),
            started_at: Instant::now(),
        }
    }

    /// Whether new streams and messages are being refused.
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Flip the availability flag. Irreversible for the process lifetime.
    pub fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(health_check(
        state.started_at,
        state.registry.len(),
        state.is_shutting_down(),
    ))
}

/// JSON-RPC-over-SSE transport server.
///
/// Owns the shared state and shutdown coordinator; the axum serve loop runs
/// on a spawned task created by [`SseServer::listen`].
pub struct SseServer {
    state: Arc<AppState>,
    shutdown: ShutdownCoordinator,
}

impl SseServer {
    /// Create a server around an application handler.
    pub fn new(config: ServerConfig, handler: Arc<dyn MessageHandler>) -> Self {
        Self {
            state: Arc::new(AppState::new(config, handler)),
            shutdown: ShutdownCoordinator::new(),
        }
    }

    /// Shared endpoint state.
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Build the transport router: stream path, message path, `/health`.
    pub fn router(&self) -> Router {
        Router::new()
            .route(&self.state.config.sse_path, get(establish_stream))
            .route(&self.state.config.message_path, post(submit_message))
            .route("/health", get(health))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(Arc::clone(&self.state))
    }

    /// Bind the configured address and spawn the serve loop.
    ///
    /// Returns the bound address (useful with port `0`) and the join handle
    /// of the serve task. The task exits after [`SseServer::close_gracefully`]
    /// cancels the shutdown token.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let addr = format!("{}:{}", self.state.config.host, self.state.config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;

        let router = self.router();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %e, "serve loop failed");
            }
        });

        info!(%local_addr, "server listening");
        Ok((local_addr, handle))
    }

    /// Push one message to every active session.
    ///
    /// The payload is serialized once. A session whose delivery fails (full
    /// queue or vanished client) is closed and deregistered; the failure
    /// never touches the other sessions. Returns the number of sessions the
    /// message was enqueued for.
    pub fn notify_clients(&self, message: &JsonRpcMessage) -> usize {
        let json = match relay_rpc::encode(message) {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, "failed to serialize broadcast message");
                return 0;
            }
        };

        let mut delivered = 0;
        for session in self.state.registry.snapshot() {
            if session.send_serialized(json.clone()) {
                delivered += 1;
            } else {
                warn!(session_id = %session.id(), "broadcast delivery failed, dropping session");
                session.close();
                let _ = self.state.registry.remove(session.id());
                self.state.auth.remove(session.id());
            }
        }
        counter!("relay_broadcasts_total").increment(1);
        delivered
    }

    /// Gracefully stop: refuse new work, drain live sessions within the
    /// configured timeout, then stop the serve loop.
    pub async fn close_gracefully(&self) {
        info!("shutdown initiated");
        self.state.begin_shutdown();
        let timeout = Duration::from_secs(self.state.config.shutdown_timeout_secs);
        self.shutdown
            .drain_sessions(&self.state.registry, timeout)
            .await;
        self.shutdown.cancel();
        info!("shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sse::handler::test_support::NoopHandler;
    use crate::sse::session::{SessionState, SessionTransport, SseFrame};
    use axum::http::{HeaderMap, StatusCode};
    use relay_rpc::JsonRpcNotification;
    use tokio::sync::mpsc;

    fn make_server() -> SseServer {
        SseServer::new(ServerConfig::default(), Arc::new(NoopHandler))
    }

    fn attach_session(
        server: &SseServer,
        capacity: usize,
    ) -> (Arc<Session>, mpsc::Receiver<SseFrame>) {
        let (tx, rx) = mpsc::channel(capacity);
        let session = server.state.registry.create(SessionTransport::new(tx));
        session.mark_active();
        (session, rx)
    }

    fn note(method: &str) -> JsonRpcMessage {
        JsonRpcNotification::new(method, None).into()
    }

    #[test]
    fn shutdown_flag_starts_clear() {
        let state = AppState::new(ServerConfig::default(), Arc::new(NoopHandler));
        assert!(!state.is_shutting_down());
        state.begin_shutdown();
        assert!(state.is_shutting_down());
    }

    #[tokio::test]
    async fn broadcast_reaches_every_active_session() {
        let server = make_server();
        let (_a, mut rx_a) = attach_session(&server, 8);
        let (_b, mut rx_b) = attach_session(&server, 8);

        assert_eq!(server.notify_clients(&note("tick")), 2);
        assert!(rx_a.recv().await.unwrap().data.contains("tick"));
        assert!(rx_b.recv().await.unwrap().data.contains("tick"));
    }

    #[tokio::test]
    async fn broadcast_failure_drops_only_the_failing_session() {
        let server = make_server();
        let (dead, rx_dead) = attach_session(&server, 8);
        let (live, mut rx_live) = attach_session(&server, 8);
        let dead_id = dead.id().clone();
        server.state.auth.put(&dead_id, "Bearer t".into());
        drop(rx_dead);

        assert_eq!(server.notify_clients(&note("tick")), 1);

        // The vanished client is closed and deregistered.
        assert!(server.state.registry.get(dead_id.as_str()).is_none());
        assert!(server.state.auth.get(&dead_id).is_none());
        assert_eq!(dead.state(), SessionState::Closing);

        // The healthy client is untouched.
        assert!(server.state.registry.get(live.id().as_str()).is_some());
        assert!(rx_live.recv().await.unwrap().data.contains("tick"));
    }

    #[tokio::test]
    async fn broadcast_on_empty_registry_is_zero() {
        let server = make_server();
        assert_eq!(server.notify_clients(&note("tick")), 0);
    }

    #[tokio::test]
    async fn stream_refused_during_shutdown() {
        let server = make_server();
        server.state.begin_shutdown();
        let resp =
            establish_stream(axum::extract::State(Arc::clone(&server.state)), HeaderMap::new())
                .await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn close_gracefully_closes_sessions_and_cancels() {
        let mut config = ServerConfig::default();
        config.shutdown_timeout_secs = 1;
        let server = SseServer::new(config, Arc::new(NoopHandler));

        let (session, mut rx) = attach_session(&server, 8);
        let id = session.id().clone();

        // Stand-in for the stream task: deregisters when the channel ends.
        let registry = Arc::clone(&server.state.registry);
        let drain_task = tokio::spawn(async move {
            while rx.recv().await.is_some() {}
            let _ = registry.remove(&id);
        });

        server.close_gracefully().await;
        drain_task.await.unwrap();

        assert!(server.state.is_shutting_down());
        assert!(server.state.registry.is_empty());
        assert!(server.shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn health_reports_live_counters() {
        let server = make_server();
        let (_s, _rx) = attach_session(&server, 8);
        let resp = health(axum::extract::State(Arc::clone(&server.state))).await;
        assert_eq!(resp.0.status, "ok");
        assert_eq!(resp.0.active_sessions, 1);
        assert!(!resp.0.shutting_down);
    }
}
