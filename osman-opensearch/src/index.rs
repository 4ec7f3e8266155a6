//! Index management for OpenSearch.

use crate::client::read_response;
use crate::error::{OsmanError, Result};
use crate::store::{IndexStore, StoreResponse};
use async_trait::async_trait;
use opensearch::indices::{
    IndicesCreateParts, IndicesDeleteParts, IndicesExistsParts, IndicesGetAliasParts,
    IndicesGetMappingParts, IndicesGetSettingsParts, IndicesRefreshParts,
};
use opensearch::OpenSearch;
use osman_log::{debug, info};
use serde_json::{json, Value};
use std::sync::Arc;

/// Index manager backed by a live cluster.
#[derive(Clone)]
pub struct IndexManager {
    client: Arc<OpenSearch>,
}

impl IndexManager {
    /// Create a new index manager.
    pub(crate) fn new(client: Arc<OpenSearch>) -> Self {
        Self { client }
    }

    /// Refresh an index so recent writes become searchable.
    pub async fn refresh(&self, name: &str) -> Result<()> {
        debug!("Refreshing index: {}", name);

        self.client
            .indices()
            .refresh(IndicesRefreshParts::Index(&[name]))
            .send()
            .await?;

        Ok(())
    }

    /// Indices the alias currently points at.
    pub async fn alias_targets(&self, alias: &str) -> Result<Vec<String>> {
        let response = self
            .client
            .indices()
            .get_alias(IndicesGetAliasParts::Name(&[alias]))
            .send()
            .await?;

        if !response.status_code().is_success() {
            return Ok(Vec::new());
        }

        let body: Value = response.json().await?;
        Ok(body
            .as_object()
            .map(|indices| indices.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_or_not_found(
        &self,
        name: &str,
        response: opensearch::http::response::Response,
    ) -> Result<Value> {
        let response = read_response(response).await?;
        if response.is_success() {
            Ok(response.body)
        } else {
            Err(OsmanError::IndexNotFound(name.to_string()))
        }
    }
}

#[async_trait]
impl IndexStore for IndexManager {
    async fn create_index(&self, name: &str, body: &Value) -> Result<StoreResponse> {
        info!("Creating index: {}", name);

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(name))
            .body(body.clone())
            .send()
            .await?;

        read_response(response).await
    }

    async fn delete_index(&self, name: &str) -> Result<StoreResponse> {
        info!("Deleting index: {}", name);

        let response = self
            .client
            .indices()
            .delete(IndicesDeleteParts::Index(&[name]))
            .send()
            .await?;

        read_response(response).await
    }

    async fn index_exists(&self, name: &str) -> Result<bool> {
        debug!("Checking if index exists: {}", name);

        let response = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[name]))
            .send()
            .await?;

        Ok(response.status_code().is_success())
    }

    async fn get_mapping(&self, name: &str) -> Result<Value> {
        debug!("Getting mapping: {}", name);

        let response = self
            .client
            .indices()
            .get_mapping(IndicesGetMappingParts::Index(&[name]))
            .send()
            .await?;

        self.get_or_not_found(name, response).await
    }

    async fn get_settings(&self, name: &str) -> Result<Value> {
        debug!("Getting settings: {}", name);

        let response = self
            .client
            .indices()
            .get_settings(IndicesGetSettingsParts::Index(&[name]))
            .send()
            .await?;

        self.get_or_not_found(name, response).await
    }

    async fn put_alias(&self, index: &str, alias: &str) -> Result<StoreResponse> {
        info!("Pointing alias {} at index {}", alias, index);

        // One update_aliases call moves the alias atomically.
        let mut actions: Vec<Value> = self
            .alias_targets(alias)
            .await?
            .into_iter()
            .filter(|bound| bound != index)
            .map(|bound| json!({ "remove": { "index": bound, "alias": alias } }))
            .collect();
        actions.push(json!({ "add": { "index": index, "alias": alias } }));

        let response = self
            .client
            .indices()
            .update_aliases()
            .body(json!({ "actions": actions }))
            .send()
            .await?;

        read_response(response).await
    }

    async fn copy_documents(&self, source: &str, dest: &str) -> Result<StoreResponse> {
        info!("Reindexing {} into {}", source, dest);

        let response = self
            .client
            .reindex()
            .wait_for_completion(true)
            .refresh(true)
            .body(json!({
                "source": { "index": source },
                "dest": { "index": dest }
            }))
            .send()
            .await?;

        let response = read_response(response).await?;

        let failures = response.body["failures"]
            .as_array()
            .map(|f| f.len())
            .unwrap_or(0);
        if response.is_success() && failures > 0 {
            debug!("Reindex into {} reported {} failures", dest, failures);
            return Ok(StoreResponse::request_invalid(response.body));
        }

        Ok(response)
    }
}
