//! Store collaborator traits.
//!
//! The reindex coordinator and the script manager talk to OpenSearch only
//! through these traits. [`IndexManager`](crate::IndexManager) and
//! [`ScriptRegistry`](crate::ScriptRegistry) implement them for a live
//! cluster; tests substitute in-memory stores.

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Classification of a store response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    /// The request was applied.
    Succeeded,
    /// The target does not exist (HTTP 404).
    NotFound,
    /// The store rejected the request (HTTP 400, e.g. already exists or a
    /// reindex with per-document failures).
    RequestInvalid,
}

/// A store response with its classification and raw body.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreResponse {
    /// Outcome.
    pub outcome: StoreOutcome,
    /// Response body, `Value::Null` when empty.
    pub body: Value,
}

impl StoreResponse {
    /// A successful response.
    pub fn succeeded(body: Value) -> Self {
        Self {
            outcome: StoreOutcome::Succeeded,
            body,
        }
    }

    /// A not-found response.
    pub fn not_found(body: Value) -> Self {
        Self {
            outcome: StoreOutcome::NotFound,
            body,
        }
    }

    /// A rejected request.
    pub fn request_invalid(body: Value) -> Self {
        Self {
            outcome: StoreOutcome::RequestInvalid,
            body,
        }
    }

    /// Whether the request was applied.
    pub fn is_success(&self) -> bool {
        self.outcome == StoreOutcome::Succeeded
    }
}

/// Index operations needed to migrate a logical index.
///
/// Every method returns `Err` only for infrastructure failures (transport,
/// authentication, unexpected status codes). Expected "not found" and
/// "request invalid" answers come back as a [`StoreResponse`].
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Create an index. `body` carries `mappings` and/or `settings`.
    async fn create_index(&self, name: &str, body: &Value) -> Result<StoreResponse>;

    /// Delete an index.
    async fn delete_index(&self, name: &str) -> Result<StoreResponse>;

    /// Whether an index or alias with this name exists.
    async fn index_exists(&self, name: &str) -> Result<bool>;

    /// Raw get-mapping response: `{ "<physical>": { "mappings": {..} } }`.
    async fn get_mapping(&self, name: &str) -> Result<Value>;

    /// Raw get-settings response: `{ "<physical>": { "settings": {..} } }`.
    async fn get_settings(&self, name: &str) -> Result<Value>;

    /// Point `alias` at `index`.
    async fn put_alias(&self, index: &str, alias: &str) -> Result<StoreResponse>;

    /// Copy every document of `source` (index or alias) into `dest`,
    /// returning once the copy has finished.
    async fn copy_documents(&self, source: &str, dest: &str) -> Result<StoreResponse>;
}

/// Stored script operations.
#[async_trait]
pub trait ScriptStore: Send + Sync {
    /// Fetch a stored script. `None` when the store answers 400 or 404.
    ///
    /// The returned value is the `script` object: `{ "lang": .., "source": .. }`.
    async fn get_script(&self, id: &str) -> Result<Option<Value>>;

    /// Create or replace a stored script.
    async fn put_script(&self, id: &str, lang: &str, source: &Value) -> Result<Value>;

    /// Delete a stored script.
    async fn delete_script(&self, id: &str) -> Result<StoreResponse>;

    /// Render and run an inline search template against `index`.
    async fn search_template(&self, index: &str, source: &Value, params: &Value) -> Result<Value>;
}
