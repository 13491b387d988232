//! Graceful shutdown coordination.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::sse::registry::SessionRegistry;

/// Coordinates the ordered teardown of the transport.
///
/// Cancellation stops the accept loop; session drain is a separate bounded
/// wait so in-flight streams get a chance to flush before the process exits.
#[derive(Clone, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a coordinator with a fresh cancellation token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Token handed to the serve loop for graceful connection teardown.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Signal the serve loop to stop accepting connections.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether cancellation has been signaled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Close every session and wait (bounded) for their stream tasks to
    /// deregister. Logs a warning when the deadline passes with sessions
    /// still live; teardown proceeds regardless.
    pub async fn drain_sessions(&self, registry: &Arc<SessionRegistry>, timeout: Duration) {
        let open = registry.len();
        if open == 0 {
            return;
        }
        info!(sessions = open, "draining sessions");
        registry.close_all();

        let deadline = tokio::time::Instant::now() + timeout;
        while !registry.is_empty() {
            if tokio::time::Instant::now() >= deadline {
                warn!(
                    remaining = registry.len(),
                    "session drain timed out, abandoning remaining sessions"
                );
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        info!("all sessions drained");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sse::handler::test_support::NoopHandler;
    use crate::sse::session::{Session, SessionTransport};
    use tokio::sync::mpsc;

    fn make_registry() -> Arc<SessionRegistry> {
        Arc::new(SessionRegistry::new(Arc::new(|transport| {
            Session::new(transport, Arc::new(NoopHandler))
        })))
    }

    #[test]
    fn cancel_flips_token() {
        let coordinator = ShutdownCoordinator::new();
        assert!(!coordinator.is_cancelled());
        coordinator.cancel();
        assert!(coordinator.is_cancelled());
        assert!(coordinator.token().is_cancelled());
    }

    #[tokio::test]
    async fn drain_on_empty_registry_returns_immediately() {
        let coordinator = ShutdownCoordinator::new();
        let registry = make_registry();
        coordinator
            .drain_sessions(&registry, Duration::from_secs(5))
            .await;
    }

    #[tokio::test]
    async fn drain_waits_for_deregistration() {
        let coordinator = ShutdownCoordinator::new();
        let registry = make_registry();

        let (tx, mut rx) = mpsc::channel(4);
        let session = registry.create(SessionTransport::new(tx));
        let id = session.id().clone();

        // Simulated stream task: deregister once the channel ends.
        let task_registry = Arc::clone(&registry);
        let task = tokio::spawn(async move {
            while rx.recv().await.is_some() {}
            let _ = task_registry.remove(&id);
        });

        coordinator
            .drain_sessions(&registry, Duration::from_secs(5))
            .await;
        assert!(registry.is_empty());
        task.await.unwrap();
    }

    #[tokio::test]
    async fn drain_gives_up_at_deadline() {
        let coordinator = ShutdownCoordinator::new();
        let registry = make_registry();

        // A session whose stream task never deregisters.
        let (tx, _rx) = mpsc::channel(4);
        let _session = registry.create(SessionTransport::new(tx));

        coordinator
            .drain_sessions(&registry, Duration::from_millis(50))
            .await;
        assert_eq!(registry.len(), 1);
    }
}
