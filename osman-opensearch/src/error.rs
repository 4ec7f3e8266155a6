//! Error types for Osman operations.

use thiserror::Error;

/// Osman error type.
#[derive(Error, Debug)]
pub enum OsmanError {
    /// Invalid or incomplete connection configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Authentication error.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Index not found.
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    /// Validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Bulk insert error.
    #[error("Bulk insert failed: {succeeded} succeeded, {failed} failed")]
    Bulk {
        /// Number of successful operations.
        succeeded: usize,
        /// Number of failed operations.
        failed: usize,
        /// Error details.
        errors: Vec<String>,
    },

    /// Search template did not validate against the test index.
    #[error("Search template check failed: {0}")]
    Template(String),

    /// Internal OpenSearch error.
    #[error("OpenSearch error: {0}")]
    Internal(String),

    /// Client error from opensearch crate.
    #[error("Client error: {0}")]
    Client(#[from] opensearch::Error),
}

/// Result type alias for Osman operations.
pub type Result<T> = std::result::Result<T, OsmanError>;

/// Pull the most specific reason out of an OpenSearch error body.
pub(crate) fn error_reason(body: &serde_json::Value) -> String {
    body.get("error")
        .and_then(|e| {
            e.get("reason")
                .and_then(|r| r.as_str())
                .or_else(|| e.as_str())
        })
        .unwrap_or("Unknown error")
        .to_string()
}
