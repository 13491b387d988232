//! Encoding and decoding of protocol messages.
//!
//! Decoding distinguishes malformed JSON from JSON that is not a valid
//! protocol envelope so the two can be logged separately, even though both
//! produce the same externally visible outcome.

use serde_json::Value;

use crate::errors::DecodeError;
use crate::types::{JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

/// Serialize a protocol message to its JSON wire form.
///
/// Never fails for well-formed message values; the `Result` exists because
/// `serde_json` is fallible in the general case.
pub fn encode(message: &JsonRpcMessage) -> Result<String, serde_json::Error> {
    serde_json::to_string(message)
}

/// Parse a JSON payload into a protocol message.
pub fn decode(payload: &str) -> Result<JsonRpcMessage, DecodeError> {
    let value: Value = serde_json::from_str(payload)?;

    let Some(obj) = value.as_object() else {
        return Err(DecodeError::Envelope(format!(
            "expected an object, got {}",
            kind_of(&value)
        )));
    };

    match obj.get("jsonrpc").and_then(Value::as_str) {
        Some("2.0") => {}
        Some(other) => {
            return Err(DecodeError::Envelope(format!(
                "unsupported jsonrpc version: {other}"
            )));
        }
        None => return Err(DecodeError::Envelope("missing jsonrpc field".into())),
    }

    let has_id = obj.get("id").is_some_and(|id| !id.is_null());
    let has_method = obj.contains_key("method");
    let has_result = obj.contains_key("result");
    let has_error = obj.contains_key("error");

    if has_method {
        if has_result || has_error {
            return Err(DecodeError::Envelope(
                "message mixes request and response fields".into(),
            ));
        }
        if has_id {
            let request: JsonRpcRequest = from_value(value)?;
            Ok(JsonRpcMessage::Request(request))
        } else {
            let notification: JsonRpcNotification = from_value(value)?;
            Ok(JsonRpcMessage::Notification(notification))
        }
    } else if has_result && has_error {
        Err(DecodeError::Envelope(
            "response carries both result and error".into(),
        ))
    } else if has_result || has_error {
        let response: JsonRpcResponse = from_value(value)?;
        Ok(JsonRpcMessage::Response(response))
    } else {
        Err(DecodeError::Envelope(
            "message has neither method nor result/error".into(),
        ))
    }
}

/// Deserialize a classified envelope; field-level type mismatches are
/// envelope errors, not syntax errors.
fn from_value<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, DecodeError> {
    serde_json::from_value(value).map_err(|e| DecodeError::Envelope(e.to_string()))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
