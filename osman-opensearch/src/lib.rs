//! OpenSearch index and script management.
//!
//! This crate provides a client for OpenSearch with support for:
//! - Index creation, deletion and existence checks
//! - Bulk document loading
//! - Mapping and settings migrations through an alias swap between two
//!   physical indices
//! - Search template and painless script uploads that skip unchanged scripts
//! - Configuration from URLs, environment variables or `.env` files
//!
//! # Example
//!
//! ```rust,no_run
//! use osman_opensearch::{OsmanClient, OsmanConfig};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = OsmanConfig::from_env()?;
//!     let client = OsmanClient::connect(config).await?;
//!
//!     let mapping = json!({
//!         "properties": {
//!             "title": { "type": "text" },
//!             "views": { "type": "integer" }
//!         }
//!     });
//!
//!     let outcome = client.reindex("articles", Some(&mapping), None).await?;
//!     println!("{}", serde_json::to_string_pretty(&outcome)?);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod bulk;
mod client;
mod config;
mod diff;
mod error;
mod index;
mod reindex;
mod script;
mod store;

pub use bulk::{bulk_lines, BulkInsert, BulkItem, BulkItemError, BulkItemStatus, BulkResponse};
pub use client::OsmanClient;
pub use config::{
    Auth, AuthMethod, AwsSigning, OsmanConfig, OsmanConfigBuilder, DEFAULT_HOST_URL,
};
pub use diff::{diff, diff_str, Change, Diff};
pub use error::{OsmanError, Result};
pub use index::IndexManager;
pub use reindex::{shadow_name, ReindexCoordinator, ReindexOutcome, SkipReason};
pub use script::{
    ScriptDifferences, ScriptManager, ScriptRegistry, ScriptUpload, MUSTACHE, PAINLESS,
};
pub use store::{IndexStore, ScriptStore, StoreOutcome, StoreResponse};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        diff, IndexStore, OsmanClient, OsmanConfig, OsmanError, ReindexCoordinator,
        ReindexOutcome, Result, ScriptManager, ScriptStore,
    };
}
