//! Decode errors and standard JSON-RPC error codes.

// ── Standard error codes ────────────────────────────────────────────

/// Invalid JSON was received.
pub const PARSE_ERROR: i64 = -32700;
/// The JSON is not a valid request object.
pub const INVALID_REQUEST: i64 = -32600;
/// The method does not exist.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Invalid method parameters.
pub const INVALID_PARAMS: i64 = -32602;
/// Internal JSON-RPC error.
pub const INTERNAL_ERROR: i64 = -32603;

/// Why a byte payload could not be decoded into a protocol message.
///
/// Both variants surface to clients as the same "Invalid message format"
/// outcome; the distinction exists for logging.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The payload was not syntactically valid JSON.
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload was valid JSON but not a valid protocol envelope.
    #[error("invalid JSON-RPC envelope: {0}")]
    Envelope(String),
}
