//! Search template and painless script management.
//!
//! Uploads are compared with the stored version first and skipped when
//! nothing changed, so re-running a deployment does not bump script
//! versions needlessly.

use crate::client::read_response;
use crate::diff::{diff, Diff};
use crate::error::{error_reason, OsmanError, Result};
use crate::store::{ScriptStore, StoreOutcome, StoreResponse};
use async_trait::async_trait;
use opensearch::{
    DeleteScriptParts, GetScriptParts, OpenSearch, PutScriptParts, SearchTemplateParts,
};
use osman_log::{debug, info};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Language of stored search templates.
pub const MUSTACHE: &str = "mustache";
/// Language of stored painless scripts.
pub const PAINLESS: &str = "painless";

/// What an upload changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ScriptDifferences {
    /// The script did not exist; holds the uploaded source.
    Created(Value),
    /// The stored script differed from the uploaded one.
    Changed(Diff),
}

/// Result of a script upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptUpload {
    /// Whether the store accepted a new version. False when the stored
    /// script was already identical.
    pub acknowledged: bool,
    /// Present whenever something was uploaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub differences: Option<ScriptDifferences>,
}

/// Diff-before-upload logic over a [`ScriptStore`].
pub struct ScriptManager<'a, S: ScriptStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: ScriptStore + ?Sized> ScriptManager<'a, S> {
    /// Create a manager over a store.
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Upload (or update) a mustache search template.
    ///
    /// The template is first run against `index` with `params` and must
    /// return at least one hit.
    pub async fn upload_search_template(
        &self,
        source: &Value,
        name: &str,
        index: &str,
        params: &Value,
    ) -> Result<ScriptUpload> {
        let result = self.store.search_template(index, source, params).await?;

        let hits = result
            .pointer("/hits/hits")
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0);
        debug!("Template {} returned {} hits on {}", name, hits, index);

        if hits == 0 {
            return Err(OsmanError::Template(format!(
                "template '{}' returned no hits on index '{}'",
                name, index
            )));
        }

        self.upload(name, MUSTACHE, source).await
    }

    /// Upload (or update) a painless script.
    pub async fn upload_painless_script(&self, source: &Value, name: &str) -> Result<ScriptUpload> {
        self.upload(name, PAINLESS, source).await
    }

    /// Delete a template or script. Returns `false` when it did not exist.
    pub async fn delete_script(&self, name: &str) -> Result<bool> {
        let response = self.store.delete_script(name).await?;
        match response.outcome {
            StoreOutcome::Succeeded => Ok(response.body["acknowledged"].as_bool().unwrap_or(true)),
            StoreOutcome::NotFound => Ok(false),
            StoreOutcome::RequestInvalid => Err(OsmanError::Internal(error_reason(&response.body))),
        }
    }

    async fn upload(&self, name: &str, lang: &str, source: &Value) -> Result<ScriptUpload> {
        let differences = match self.store.get_script(name).await? {
            Some(stored) => {
                let stored = normalize_source(stored.get("source").unwrap_or(&Value::Null));
                match diff(&normalize_source(source), &stored) {
                    Some(changes) => ScriptDifferences::Changed(changes),
                    None => {
                        info!("Script {} is unchanged", name);
                        return Ok(ScriptUpload {
                            acknowledged: false,
                            differences: None,
                        });
                    }
                }
            }
            None => ScriptDifferences::Created(source.clone()),
        };

        let response = self.store.put_script(name, lang, source).await?;
        info!("Script {} updated", name);

        Ok(ScriptUpload {
            acknowledged: response["acknowledged"].as_bool().unwrap_or(false),
            differences: Some(differences),
        })
    }
}

// Stored templates come back as a JSON string; parse it so that formatting
// differences do not count. Painless code is not JSON and stays a string.
fn normalize_source(source: &Value) -> Value {
    match source {
        Value::String(text) => {
            serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.clone()))
        }
        other => other.clone(),
    }
}

/// Stored script access backed by a live cluster.
#[derive(Clone)]
pub struct ScriptRegistry {
    client: Arc<OpenSearch>,
}

impl ScriptRegistry {
    pub(crate) fn new(client: Arc<OpenSearch>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ScriptStore for ScriptRegistry {
    async fn get_script(&self, id: &str) -> Result<Option<Value>> {
        debug!("Getting script: {}", id);

        let response = self
            .client
            .get_script(GetScriptParts::Id(id))
            .send()
            .await?;
        let response = read_response(response).await?;

        if !response.is_success() || !response.body["found"].as_bool().unwrap_or(false) {
            return Ok(None);
        }

        Ok(response.body.get("script").cloned())
    }

    async fn put_script(&self, id: &str, lang: &str, source: &Value) -> Result<Value> {
        info!("Uploading {} script: {}", lang, id);

        let response = self
            .client
            .put_script(PutScriptParts::Id(id))
            .body(json!({ "script": { "lang": lang, "source": source } }))
            .send()
            .await?;

        expect_success(read_response(response).await?)
    }

    async fn delete_script(&self, id: &str) -> Result<StoreResponse> {
        info!("Deleting script: {}", id);

        let response = self
            .client
            .delete_script(DeleteScriptParts::Id(id))
            .send()
            .await?;

        read_response(response).await
    }

    async fn search_template(&self, index: &str, source: &Value, params: &Value) -> Result<Value> {
        debug!("Running search template against {}", index);

        let response = self
            .client
            .search_template(SearchTemplateParts::Index(&[index]))
            .body(json!({ "source": source, "params": params }))
            .send()
            .await?;
        let response = read_response(response).await?;

        match response.outcome {
            StoreOutcome::Succeeded => Ok(response.body),
            StoreOutcome::NotFound => Err(OsmanError::IndexNotFound(index.to_string())),
            StoreOutcome::RequestInvalid => Err(OsmanError::Template(error_reason(&response.body))),
        }
    }
}

fn expect_success(response: StoreResponse) -> Result<Value> {
    if response.is_success() {
        Ok(response.body)
    } else {
        Err(OsmanError::Internal(error_reason(&response.body)))
    }
}
