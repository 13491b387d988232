//! # relay-directory
//!
//! Demo application layer for the relay transport: a small in-memory
//! directory of users and documents queried over JSON-RPC. Exists to
//! exercise the transport end to end; the data set is fixed seed content
//! plus whatever `documents/add` stores at runtime.

#![deny(unsafe_code)]

pub mod handler;
pub mod model;

pub use handler::{DirectoryHandler, DirectoryStore};
pub use model::{Document, User};
