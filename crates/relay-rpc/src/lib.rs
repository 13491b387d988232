//! # relay-rpc
//!
//! JSON-RPC 2.0 wire-format types and codec for the relay transport.
//!
//! - Message envelope: request / notification / response (`types`)
//! - Encode/decode with framing-error classification (`codec`)
//! - Standard error codes and the decode error type (`errors`)

#![deny(unsafe_code)]

pub mod codec;
pub mod errors;
pub mod types;

pub use codec::{decode, encode};
pub use errors::DecodeError;
pub use types::{
    JsonRpcError, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId,
};
