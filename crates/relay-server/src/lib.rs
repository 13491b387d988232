//! # relay-server
//!
//! Axum HTTP + SSE server transport for JSON-RPC messaging.
//!
//! - Push channel: long-lived `GET /sse` event stream, one per client
//! - Pull channel: short-lived `POST /message?sessionId=...` submissions
//! - Session registry with per-session failure isolation on broadcast
//! - Graceful shutdown via `CancellationToken` + bounded session drain

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod health;
pub mod server;
pub mod shutdown;
pub mod sse;

pub use config::ServerConfig;
pub use server::{AppState, ServerError, SseServer};
pub use sse::registry::{SessionFactory, SessionRegistry};
pub use sse::handler::{HandlerError, MessageHandler, SessionContext};
pub use sse::session::{Session, SessionId, SessionState};
