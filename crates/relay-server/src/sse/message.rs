//! `POST` message endpoint: the short-lived inbound half of the transport.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use metrics::counter;
use relay_rpc::DecodeError;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{ErrorBody, service_unavailable};
use crate::server::AppState;

/// Query parameters accepted by the message endpoint.
#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    /// Session correlation id from the handshake `endpoint` event.
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// Handle `POST` on the message path.
///
/// Correlates the submission to a live session, decodes the JSON-RPC
/// envelope, and dispatches to the application handler. A `200` with an
/// empty body only acknowledges acceptance; any reply arrives later on the
/// session's event stream.
///
/// The body arrives as raw bytes so availability and correlation checks
/// run before any content validation; a body that is not UTF-8 is just
/// another malformed message.
pub async fn submit_message(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MessageQuery>,
    body: Bytes,
) -> Response {
    if state.is_shutting_down() {
        debug!("message refused, shutdown in progress");
        return service_unavailable();
    }

    let Some(session_id) = query.session_id else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody::new("Session ID missing in message endpoint")),
        )
            .into_response();
    };

    let Some(session) = state.registry.get(&session_id) else {
        debug!(session_id, "message for unknown session");
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorBody::new(format!("Session not found: {session_id}"))),
        )
            .into_response();
    };

    let Ok(body) = std::str::from_utf8(&body) else {
        warn!(session_id, "message body is not valid UTF-8");
        counter!("relay_messages_rejected_total").increment(1);
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody::new("Invalid message format")),
        )
            .into_response();
    };

    let message = match relay_rpc::decode(body) {
        Ok(message) => message,
        Err(e) => {
            match &e {
                DecodeError::Json(source) => {
                    warn!(session_id, error = %source, "message body is not valid JSON");
                }
                DecodeError::Envelope(reason) => {
                    warn!(session_id, reason, "message body is not a JSON-RPC envelope");
                }
            }
            counter!("relay_messages_rejected_total").increment(1);
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody::new("Invalid message format")),
            )
                .into_response();
        }
    };

    counter!("relay_messages_received_total").increment(1);
    let credential = state.auth.get(session.id());
    match session.handle(message, credential).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => {
            warn!(session_id, error = %e, "handler failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody::new(e.message)),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::sse::handler::MessageHandler;
    use crate::sse::handler::test_support::{FailingHandler, NoopHandler, RecordingHandler};
    use crate::sse::session::{SessionTransport, SseFrame};
    use tokio::sync::mpsc;

    fn make_state(handler: Arc<dyn MessageHandler>) -> Arc<AppState> {
        Arc::new(AppState::new(ServerConfig::default(), handler))
    }

    fn register_session(state: &Arc<AppState>) -> (String, mpsc::Receiver<SseFrame>) {
        let (tx, rx) = mpsc::channel(8);
        let session = state.registry.create(SessionTransport::new(tx));
        session.mark_active();
        (session.id().to_string(), rx)
    }

    async fn body_message(resp: Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        parsed["message"].as_str().unwrap().to_owned()
    }

    #[tokio::test]
    async fn missing_session_id_is_400() {
        let state = make_state(Arc::new(NoopHandler));
        let resp = submit_message(
            State(state),
            Query(MessageQuery { session_id: None }),
            "{}".into(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_message(resp).await,
            "Session ID missing in message endpoint"
        );
    }

    #[tokio::test]
    async fn unknown_session_is_404() {
        let state = make_state(Arc::new(NoopHandler));
        let resp = submit_message(
            State(state),
            Query(MessageQuery {
                session_id: Some("ghost".into()),
            }),
            "{}".into(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_message(resp).await, "Session not found: ghost");
    }

    #[tokio::test]
    async fn non_utf8_body_is_invalid_format() {
        let state = make_state(Arc::new(NoopHandler));
        let (id, _rx) = register_session(&state);
        let resp = submit_message(
            State(state),
            Query(MessageQuery {
                session_id: Some(id),
            }),
            Bytes::from_static(&[0xff, 0xfe, 0xfd]),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_message(resp).await, "Invalid message format");
    }

    #[tokio::test]
    async fn missing_session_id_wins_over_bad_body() {
        let state = make_state(Arc::new(NoopHandler));
        let resp = submit_message(
            State(state),
            Query(MessageQuery { session_id: None }),
            Bytes::from_static(&[0xff, 0xfe, 0xfd]),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_message(resp).await,
            "Session ID missing in message endpoint"
        );
    }

    #[tokio::test]
    async fn shutdown_wins_over_bad_body() {
        let state = make_state(Arc::new(NoopHandler));
        let (id, _rx) = register_session(&state);
        state.begin_shutdown();
        let resp = submit_message(
            State(state),
            Query(MessageQuery {
                session_id: Some(id),
            }),
            Bytes::from_static(&[0xff, 0xfe, 0xfd]),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_message(resp).await, "Server is shutting down");
    }

    #[tokio::test]
    async fn malformed_json_is_400() {
        let state = make_state(Arc::new(NoopHandler));
        let (id, _rx) = register_session(&state);
        let resp = submit_message(
            State(state),
            Query(MessageQuery {
                session_id: Some(id),
            }),
            "{not json".into(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_message(resp).await, "Invalid message format");
    }

    #[tokio::test]
    async fn invalid_envelope_is_400() {
        let state = make_state(Arc::new(NoopHandler));
        let (id, _rx) = register_session(&state);
        let resp = submit_message(
            State(state),
            Query(MessageQuery {
                session_id: Some(id),
            }),
            r#"{"hello":"world"}"#.into(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_message(resp).await, "Invalid message format");
    }

    #[tokio::test]
    async fn valid_message_is_200_with_empty_body() {
        let state = make_state(Arc::new(NoopHandler));
        let (id, _rx) = register_session(&state);
        let resp = submit_message(
            State(state),
            Query(MessageQuery {
                session_id: Some(id),
            }),
            r#"{"jsonrpc":"2.0","id":1,"method":"users/list"}"#.into(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn handler_failure_is_500_with_message() {
        let state = make_state(Arc::new(FailingHandler));
        let (id, _rx) = register_session(&state);
        let resp = submit_message(
            State(state),
            Query(MessageQuery {
                session_id: Some(id),
            }),
            r#"{"jsonrpc":"2.0","method":"boom"}"#.into(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_message(resp).await, "handler exploded");
    }

    #[tokio::test]
    async fn credential_reaches_handler() {
        let handler = Arc::new(RecordingHandler::default());
        let state = make_state(handler.clone());
        let (id, _rx) = register_session(&state);
        state
            .auth
            .put(&crate::sse::session::SessionId::from(id.as_str()), "Bearer tok".into());

        let resp = submit_message(
            State(state),
            Query(MessageQuery {
                session_id: Some(id),
            }),
            r#"{"jsonrpc":"2.0","method":"whoami"}"#.into(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let seen = handler.seen();
        assert_eq!(seen[0].0.as_deref(), Some("Bearer tok"));
        assert_eq!(seen[0].1.as_deref(), Some("whoami"));
    }

    #[tokio::test]
    async fn refused_during_shutdown() {
        let state = make_state(Arc::new(NoopHandler));
        let (id, _rx) = register_session(&state);
        state.begin_shutdown();
        let resp = submit_message(
            State(state),
            Query(MessageQuery {
                session_id: Some(id),
            }),
            r#"{"jsonrpc":"2.0","method":"ping"}"#.into(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_message(resp).await, "Server is shutting down");
    }
}
