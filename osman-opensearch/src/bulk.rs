//! Bulk document loading.

use crate::error::{OsmanError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

/// Build the bulk request lines indexing `documents` into `index`.
///
/// Each document contributes an action line and a source line. The `_id`
/// is taken from the `id_key` field when given, otherwise a random UUID is
/// generated.
pub fn bulk_lines(index: &str, documents: &[Value], id_key: Option<&str>) -> Result<Vec<Value>> {
    let mut lines = Vec::with_capacity(documents.len() * 2);

    for doc in documents {
        let id = match id_key {
            Some(key) => document_id(doc, key)?,
            None => Uuid::new_v4().to_string(),
        };
        lines.push(json!({ "index": { "_index": index, "_id": id } }));
        lines.push(doc.clone());
    }

    Ok(lines)
}

fn document_id(doc: &Value, key: &str) -> Result<String> {
    match doc.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(OsmanError::Validation(format!(
            "Id field '{}' must be a string or number, got {}",
            key, other
        ))),
        None => Err(OsmanError::Validation(format!(
            "Document has no id field '{}'",
            key
        ))),
    }
}

/// Summary returned by a successful bulk insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkInsert {
    /// Always true; failures are reported as errors.
    pub acknowledged: bool,
    /// Number of documents written.
    pub documents_inserted: usize,
    /// Target index.
    pub index: String,
}

/// Bulk API response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkResponse {
    /// Time taken in milliseconds.
    #[serde(default)]
    pub took: u64,
    /// Whether any item failed.
    pub errors: bool,
    /// Per-item results.
    #[serde(default)]
    pub items: Vec<BulkItem>,
}

/// One item of a bulk response, keyed by its action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkItem {
    /// Index result.
    Index(BulkItemStatus),
    /// Create result.
    Create(BulkItemStatus),
    /// Update result.
    Update(BulkItemStatus),
    /// Delete result.
    Delete(BulkItemStatus),
}

impl BulkItem {
    /// Status regardless of action.
    pub fn status(&self) -> &BulkItemStatus {
        match self {
            BulkItem::Index(s)
            | BulkItem::Create(s)
            | BulkItem::Update(s)
            | BulkItem::Delete(s) => s,
        }
    }
}

/// Status of a bulk item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkItemStatus {
    /// Index name.
    #[serde(rename = "_index")]
    pub index: String,
    /// Document ID.
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    /// HTTP status code.
    pub status: u16,
    /// Error details.
    #[serde(default)]
    pub error: Option<BulkItemError>,
}

/// Bulk item error details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkItemError {
    /// Error type.
    #[serde(rename = "type")]
    pub error_type: String,
    /// Error reason.
    #[serde(default)]
    pub reason: String,
}

impl BulkItemStatus {
    /// Check if the operation was successful.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl BulkResponse {
    /// Turn the response into a summary, or a bulk error if any item failed.
    pub fn into_result(self, index: &str) -> Result<BulkInsert> {
        let total = self.items.len();
        let errors: Vec<String> = self
            .items
            .iter()
            .map(BulkItem::status)
            .filter(|s| !s.is_success())
            .map(|s| match &s.error {
                Some(e) => format!("{}: {}", e.error_type, e.reason),
                None => format!("status {}", s.status),
            })
            .collect();

        if self.errors || !errors.is_empty() {
            return Err(OsmanError::Bulk {
                succeeded: total - errors.len(),
                failed: errors.len(),
                errors,
            });
        }

        Ok(BulkInsert {
            acknowledged: true,
            documents_inserted: total,
            index: index.to_string(),
        })
    }
}
