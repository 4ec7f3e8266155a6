//! OpenSearch client wrapper.

use crate::{
    bulk::{bulk_lines, BulkInsert, BulkResponse},
    config::{Auth, OsmanConfig},
    error::{error_reason, OsmanError, Result},
    index::IndexManager,
    reindex::{ReindexCoordinator, ReindexOutcome},
    script::{ScriptManager, ScriptRegistry, ScriptUpload},
    store::{IndexStore, StoreResponse},
};
use opensearch::{
    http::{
        request::JsonBody,
        response::Response,
        transport::{SingleNodeConnectionPool, TransportBuilder},
        StatusCode, Url,
    },
    params::Refresh,
    BulkParts, OpenSearch, SearchParts,
};
use osman_log::{debug, error, info};
use serde_json::Value;
use std::sync::Arc;

/// OpenSearch client with index, bulk, script and reindex helpers.
#[derive(Clone)]
pub struct OsmanClient {
    client: Arc<OpenSearch>,
    config: Arc<OsmanConfig>,
}

impl OsmanClient {
    /// Build a client without contacting the cluster.
    pub fn new(config: OsmanConfig) -> Result<Self> {
        info!(
            "Initializing OpenSearch client by '{}' auth method, host: {}, port: {}",
            config.auth_method().as_str(),
            config.host,
            config.port
        );

        let url = Url::parse(&config.node_url())
            .map_err(|e| OsmanError::Config(format!("Invalid URL: {}", e)))?;

        let conn_pool = SingleNodeConnectionPool::new(url);
        let mut builder = TransportBuilder::new(conn_pool)
            .timeout(config.request_timeout)
            .disable_proxy();

        match &config.auth {
            Auth::Http => {
                if let (Some(user), Some(secret)) = (&config.user, &config.secret) {
                    builder = builder.auth(opensearch::auth::Credentials::Basic(
                        user.clone(),
                        secret.clone(),
                    ));
                }
            }
            Auth::AwsSigV4(signing) => {
                builder = aws_signing(builder, signing)?;
            }
        }

        let transport = builder
            .build()
            .map_err(|e| OsmanError::Connection(e.to_string()))?;

        debug!("OpenSearch client initialized");

        Ok(Self {
            client: Arc::new(OpenSearch::new(transport)),
            config: Arc::new(config),
        })
    }

    /// Build a client and check the connection by reading cluster settings.
    pub async fn connect(config: OsmanConfig) -> Result<Self> {
        let client = Self::new(config)?;

        info!("Getting cluster settings");
        if let Err(e) = client.cluster_settings().await {
            error!("Getting cluster settings failed: {}", e);
            return Err(e);
        }

        Ok(client)
    }

    /// Get the underlying OpenSearch client.
    pub fn inner(&self) -> &OpenSearch {
        &self.client
    }

    /// Get the configuration.
    pub fn config(&self) -> &OsmanConfig {
        &self.config
    }

    /// Index operations.
    pub fn indices(&self) -> IndexManager {
        IndexManager::new(self.client.clone())
    }

    /// Stored script operations.
    pub fn scripts(&self) -> ScriptRegistry {
        ScriptRegistry::new(self.client.clone())
    }

    /// Cluster settings.
    pub async fn cluster_settings(&self) -> Result<Value> {
        let response = self
            .client
            .cluster()
            .get_settings()
            .send()
            .await?;

        let response = read_response(response).await?;
        if !response.is_success() {
            return Err(OsmanError::Connection(error_reason(&response.body)));
        }
        Ok(response.body)
    }

    // =========================================================================
    // Index Operations
    // =========================================================================

    /// Create an index. `body` may carry `mappings` and `settings`.
    pub async fn create_index(&self, name: &str, body: Option<&Value>) -> Result<StoreResponse> {
        let empty = Value::Object(Default::default());
        self.indices().create_index(name, body.unwrap_or(&empty)).await
    }

    /// Delete an index.
    pub async fn delete_index(&self, name: &str) -> Result<StoreResponse> {
        self.indices().delete_index(name).await
    }

    /// Check whether an index or alias exists.
    pub async fn index_exists(&self, name: &str) -> Result<bool> {
        self.indices().index_exists(name).await
    }

    /// Search an index with a raw query body such as `{"query": {..}}`.
    pub async fn search_index(&self, name: &str, query: &Value) -> Result<Value> {
        debug!("Searching index {}", name);

        let response = self
            .client
            .search(SearchParts::Index(&[name]))
            .body(query.clone())
            .send()
            .await?;

        let response = read_response(response).await?;
        if !response.is_success() {
            return Err(OsmanError::Internal(error_reason(&response.body)));
        }
        Ok(response.body)
    }

    /// Migrate a logical index to a new mapping and/or settings.
    ///
    /// See [`ReindexCoordinator`].
    pub async fn reindex(
        &self,
        name: &str,
        mapping: Option<&Value>,
        settings: Option<&Value>,
    ) -> Result<ReindexOutcome> {
        let indices = self.indices();
        ReindexCoordinator::new(&indices)
            .reindex(name, mapping, settings)
            .await
    }

    // =========================================================================
    // Bulk Operations
    // =========================================================================

    /// Bulk insert documents.
    ///
    /// `id_key` names the document field used as `_id`; without it random
    /// UUIDs are used. `refresh` makes the documents searchable immediately
    /// at the cost of cluster performance.
    pub async fn add_data_to_index(
        &self,
        index_name: &str,
        documents: &[Value],
        id_key: Option<&str>,
        refresh: bool,
    ) -> Result<BulkInsert> {
        info!("Creating data in index '{}'...", index_name);

        if documents.is_empty() {
            return Ok(BulkInsert {
                acknowledged: true,
                documents_inserted: 0,
                index: index_name.to_string(),
            });
        }

        let body: Vec<JsonBody<Value>> = bulk_lines(index_name, documents, id_key)?
            .into_iter()
            .map(JsonBody::from)
            .collect();

        let response = self
            .client
            .bulk(BulkParts::None)
            .refresh(if refresh { Refresh::True } else { Refresh::False })
            .body(body)
            .send()
            .await?;

        let status = response.status_code();
        if !status.is_success() {
            let body: Value = response.json().await?;
            debug!("Bulk insert failed: {}", body);
            return Err(OsmanError::Bulk {
                succeeded: 0,
                failed: documents.len(),
                errors: vec![error_reason(&body)],
            });
        }

        let result: BulkResponse = response.json().await?;
        result.into_result(index_name)
    }

    // =========================================================================
    // Scripts
    // =========================================================================

    /// Upload (or update) a search template after validating it on `index`.
    pub async fn upload_search_template(
        &self,
        source: &Value,
        name: &str,
        index: &str,
        params: &Value,
    ) -> Result<ScriptUpload> {
        let scripts = self.scripts();
        ScriptManager::new(&scripts)
            .upload_search_template(source, name, index, params)
            .await
    }

    /// Upload (or update) a painless script.
    pub async fn upload_painless_script(&self, source: &Value, name: &str) -> Result<ScriptUpload> {
        let scripts = self.scripts();
        ScriptManager::new(&scripts)
            .upload_painless_script(source, name)
            .await
    }

    /// Delete a search template or painless script.
    pub async fn delete_script(&self, name: &str) -> Result<bool> {
        let scripts = self.scripts();
        ScriptManager::new(&scripts).delete_script(name).await
    }
}

impl std::fmt::Debug for OsmanClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OsmanClient")
            .field("url", &self.config.node_url())
            .finish()
    }
}

#[cfg(feature = "aws-auth")]
fn aws_signing(
    builder: TransportBuilder,
    signing: &crate::config::AwsSigning,
) -> Result<TransportBuilder> {
    use aws_credential_types::{provider::SharedCredentialsProvider, Credentials};
    use aws_types::region::Region;

    let credentials = Credentials::new(
        signing.access_key_id.clone(),
        signing.secret_access_key.clone(),
        None,
        None,
        "osman",
    );

    Ok(builder
        .auth(opensearch::auth::Credentials::AwsSigV4(
            SharedCredentialsProvider::new(credentials),
            Region::new(signing.region.clone()),
        ))
        .service_name(&signing.service))
}

#[cfg(not(feature = "aws-auth"))]
fn aws_signing(
    _builder: TransportBuilder,
    _signing: &crate::config::AwsSigning,
) -> Result<TransportBuilder> {
    Err(OsmanError::Config(
        "awsauth requires the 'aws-auth' feature".to_string(),
    ))
}

/// Classify a response into a [`StoreResponse`].
///
/// 2xx, 404 and 400 are expected answers; authentication failures and any
/// other status are returned as errors.
pub(crate) async fn read_response(response: Response) -> Result<StoreResponse> {
    let status = response.status_code();
    let text = response.text().await?;
    let body = if text.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap_or(Value::String(text))
    };

    match status {
        s if s.is_success() => Ok(StoreResponse::succeeded(body)),
        StatusCode::NOT_FOUND => Ok(StoreResponse::not_found(body)),
        StatusCode::BAD_REQUEST => Ok(StoreResponse::request_invalid(body)),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(OsmanError::Authentication(error_reason(&body)))
        }
        s => Err(OsmanError::Internal(format!(
            "{} (status {})",
            error_reason(&body),
            s.as_u16()
        ))),
    }
}
