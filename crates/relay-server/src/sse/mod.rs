//! SSE transport: session lifecycle, registry, auth correlation, endpoints.

pub mod auth;
pub mod handler;
pub mod message;
pub mod registry;
pub mod session;
pub mod stream;

/// Event type carrying the message-endpoint URL on a new stream.
pub const ENDPOINT_EVENT: &str = "endpoint";

/// Event type carrying a JSON-RPC payload on an established stream.
pub const MESSAGE_EVENT: &str = "message";
