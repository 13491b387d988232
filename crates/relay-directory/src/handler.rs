//! JSON-RPC dispatch over the directory store.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use relay_rpc::errors::{INVALID_PARAMS, METHOD_NOT_FOUND};
use relay_rpc::{JsonRpcMessage, JsonRpcRequest, JsonRpcResponse};
use relay_server::{HandlerError, MessageHandler, SessionContext};
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::model::{Document, User, seed_documents, seed_users};

/// In-memory directory state: fixed seed users and documents plus
/// documents added at runtime.
pub struct DirectoryStore {
    users: Vec<User>,
    seed: Vec<Document>,
    added: RwLock<Vec<Document>>,
}

impl Default for DirectoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectoryStore {
    /// Create a store populated with the seed data.
    #[must_use]
    pub fn new() -> Self {
        Self {
            users: seed_users(),
            seed: seed_documents(),
            added: RwLock::new(Vec::new()),
        }
    }

    /// All user ids.
    pub fn user_ids(&self) -> Vec<Uuid> {
        self.users.iter().map(|u| u.id).collect()
    }

    /// Look up a user by id.
    pub fn user(&self, id: Uuid) -> Option<User> {
        self.users.iter().find(|u| u.id == id).cloned()
    }

    /// All document ids, seed and added.
    pub fn document_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.seed.iter().map(|d| d.id).collect();
        ids.extend(self.added.read().iter().map(|d| d.id));
        ids
    }

    /// Look up a document by id, seed and added.
    pub fn document(&self, id: Uuid) -> Option<Document> {
        self.seed
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .or_else(|| self.added.read().iter().find(|d| d.id == id).cloned())
    }

    /// Store a new document and return it.
    pub fn add_document(&self, title: String, content: String) -> Document {
        let document = Document::new(title, content);
        self.added.write().push(document.clone());
        document
    }
}

fn param_str(params: Option<&Value>, key: &str) -> Result<String, String> {
    params
        .and_then(|p| p.get(key))
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| format!("missing string parameter '{key}'"))
}

fn param_uuid(params: Option<&Value>, key: &str) -> Result<Uuid, String> {
    let raw = param_str(params, key)?;
    Uuid::parse_str(&raw).map_err(|_| format!("parameter '{key}' is not a valid UUID"))
}

/// Directory query handler.
///
/// Answers `users/*` and `documents/*` requests; every reply is pushed
/// back on the requesting session's event stream.
pub struct DirectoryHandler {
    store: Arc<DirectoryStore>,
}

impl Default for DirectoryHandler {
    fn default() -> Self {
        Self::new(Arc::new(DirectoryStore::new()))
    }
}

impl DirectoryHandler {
    /// Build a handler over an existing store.
    #[must_use]
    pub fn new(store: Arc<DirectoryStore>) -> Self {
        Self { store }
    }

    /// Shared directory state.
    pub fn store(&self) -> &Arc<DirectoryStore> {
        &self.store
    }

    fn dispatch(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone();
        let params = request.params.as_ref();
        let result = match request.method.as_str() {
            "users/list" => Ok(json!({ "users": self.store.user_ids() })),
            "users/get" => param_uuid(params, "userId").map(|user_id| {
                self.store
                    .user(user_id)
                    .map_or(Value::Null, |u| json!(u))
            }),
            "documents/list" => Ok(json!({ "documents": self.store.document_ids() })),
            "documents/get" => param_uuid(params, "documentId").map(|doc_id| {
                self.store
                    .document(doc_id)
                    .map_or(Value::Null, |d| json!(d))
            }),
            "documents/add" => param_str(params, "title").and_then(|title| {
                let content = param_str(params, "content")?;
                let document = self.store.add_document(title, content);
                info!(document_id = %document.id, "document added");
                Ok(json!(document))
            }),
            other => {
                return JsonRpcResponse::error(
                    Some(id),
                    METHOD_NOT_FOUND,
                    format!("Method not found: {other}"),
                );
            }
        };

        match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(detail) => {
                JsonRpcResponse::error(Some(id), INVALID_PARAMS, format!("Invalid params: {detail}"))
            }
        }
    }
}

#[async_trait]
impl MessageHandler for DirectoryHandler {
    async fn handle(
        &self,
        ctx: &SessionContext,
        message: JsonRpcMessage,
    ) -> Result<(), HandlerError> {
        match message {
            JsonRpcMessage::Request(request) => {
                debug!(method = %request.method, request_id = %request.id, "directory request");
                let response = self.dispatch(&request);
                if !ctx.reply(&response.into()) {
                    warn!(
                        session_id = %ctx.session().id(),
                        method = %request.method,
                        "reply could not be enqueued"
                    );
                }
            }
            JsonRpcMessage::Notification(notification) => {
                debug!(method = %notification.method, "notification ignored");
            }
            JsonRpcMessage::Response(_) => {
                debug!("unsolicited response ignored");
            }
        }
        Ok(())
    }
}
