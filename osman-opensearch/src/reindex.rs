//! Reindex with alias swap.
//!
//! A logical index `name` is served through an alias of the same name that
//! points at one of two physical indices, `name-1` or `name-2`. Migrating
//! to a new mapping or new settings creates the inactive one of the pair,
//! copies the documents over, deletes the old physical index and moves the
//! alias. If the copy is rejected the new index is dropped again and the
//! live index is left untouched.
//!
//! Documents written while the copy runs may be missing from the new
//! index; no write block is taken.
//!
//! The coordinator does not lock. Two concurrent migrations of the same
//! logical name can pick the same shadow index, so callers must run them
//! one at a time.

use crate::diff::{diff, Diff};
use crate::error::{error_reason, OsmanError, Result};
use crate::store::{IndexStore, StoreOutcome};
use osman_log::{debug, info, warn};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Why a reindex request was not carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Neither a mapping nor settings were supplied.
    NothingToApply,
    /// The logical index does not exist.
    IndexMissing,
    /// The supplied mapping and settings match the live index.
    Unchanged,
}

/// Result of [`ReindexCoordinator::reindex`].
///
/// Serializes to the acknowledgment documents callers exchange:
/// `{"acknowledged": false}`, `{"acknowledged": false, "name", "alias"}`
/// after a rollback, or `{"acknowledged": true, "name", "alias",
/// "mapping_differences", "settings"}`.
#[derive(Debug, Clone, PartialEq)]
pub enum ReindexOutcome {
    /// Nothing was changed on the store.
    Skipped(SkipReason),
    /// The copy was rejected and the shadow index removed again.
    RolledBack {
        /// Shadow index that was attempted.
        name: String,
        /// Logical name.
        alias: String,
    },
    /// The alias now points at the new physical index.
    Completed {
        /// New physical index.
        name: String,
        /// Logical name.
        alias: String,
        /// Local mapping against the previous live mapping. `None` for a
        /// settings-only migration.
        mapping_differences: Option<Diff>,
        /// Settings of the logical index after the swap.
        settings: Value,
    },
}

impl ReindexOutcome {
    /// Whether the migration happened.
    pub fn is_acknowledged(&self) -> bool {
        matches!(self, ReindexOutcome::Completed { .. })
    }

    /// Physical index that was created or attempted.
    pub fn index_name(&self) -> Option<&str> {
        match self {
            ReindexOutcome::Skipped(_) => None,
            ReindexOutcome::RolledBack { name, .. } | ReindexOutcome::Completed { name, .. } => {
                Some(name)
            }
        }
    }
}

impl Serialize for ReindexOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            ReindexOutcome::Skipped(_) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("acknowledged", &false)?;
                map.end()
            }
            ReindexOutcome::RolledBack { name, alias } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("acknowledged", &false)?;
                map.serialize_entry("name", name)?;
                map.serialize_entry("alias", alias)?;
                map.end()
            }
            ReindexOutcome::Completed {
                name,
                alias,
                mapping_differences,
                settings,
            } => {
                let mut map = serializer.serialize_map(Some(5))?;
                map.serialize_entry("acknowledged", &true)?;
                map.serialize_entry("name", name)?;
                map.serialize_entry("alias", alias)?;
                map.serialize_entry("mapping_differences", mapping_differences)?;
                map.serialize_entry("settings", settings)?;
                map.end()
            }
        }
    }
}

/// Name of a physical index of the shadow pair.
pub fn shadow_name(name: &str, suffix: u8) -> String {
    format!("{}-{}", name, suffix)
}

/// Runs the alias-swap migration against an [`IndexStore`].
pub struct ReindexCoordinator<'a, S: IndexStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: IndexStore + ?Sized> ReindexCoordinator<'a, S> {
    /// Create a coordinator over a store.
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Migrate the logical index `name` to `mapping` and/or `settings`.
    ///
    /// `mapping` is the body of the `mappings` section, `settings` the body
    /// of the `settings` section. Store errors other than a rejected copy
    /// are returned as `Err` without any cleanup, and so is a delete the
    /// store refuses. A `RolledBack` outcome means the shadow index is gone.
    pub async fn reindex(
        &self,
        name: &str,
        mapping: Option<&Value>,
        settings: Option<&Value>,
    ) -> Result<ReindexOutcome> {
        let mapping = mapping.filter(|m| !is_empty_tree(m));
        let settings = settings.filter(|s| !is_empty_tree(s));

        if mapping.is_none() && settings.is_none() {
            info!("Reindex of {} skipped: no mapping or settings given", name);
            return Ok(ReindexOutcome::Skipped(SkipReason::NothingToApply));
        }

        if !self.store.index_exists(name).await? {
            info!("Reindex of {} skipped: index does not exist", name);
            return Ok(ReindexOutcome::Skipped(SkipReason::IndexMissing));
        }

        let (live_index, current_mapping) = live_mappings(&self.store.get_mapping(name).await?);
        let mapping_differences = mapping.and_then(|m| diff(m, &current_mapping));

        let settings_changed = match settings {
            Some(wanted) => settings_drift(wanted, &self.store.get_settings(name).await?),
            None => false,
        };

        if mapping_differences.is_none() && !settings_changed {
            info!("Reindex of {} skipped: mapping and settings unchanged", name);
            return Ok(ReindexOutcome::Skipped(SkipReason::Unchanged));
        }

        let (mut new_suffix, mut old_suffix) =
            if self.store.index_exists(&shadow_name(name, 1)).await? {
                (2, 1)
            } else {
                (1, 2)
            };
        // A leftover of an interrupted run can make the probe pick the live
        // index. The shadow must never be the index behind the alias.
        if live_index.as_deref() == Some(shadow_name(name, new_suffix).as_str()) {
            warn!(
                "{} is live behind {}, using {} as shadow index",
                shadow_name(name, new_suffix),
                name,
                shadow_name(name, old_suffix)
            );
            std::mem::swap(&mut new_suffix, &mut old_suffix);
        }
        let new_index = shadow_name(name, new_suffix);
        let old_index = shadow_name(name, old_suffix);
        debug!("Reindex of {}: {} -> {}", name, old_index, new_index);

        let mut body = Map::new();
        body.insert(
            "mappings".to_string(),
            mapping.cloned().unwrap_or(current_mapping),
        );
        if let Some(settings) = settings {
            body.insert("settings".to_string(), settings.clone());
        }

        info!("Creating shadow index {}", new_index);
        let created = self
            .store
            .create_index(&new_index, &Value::Object(body))
            .await?;
        if !created.is_success() {
            warn!(
                "Creating {} answered {:?}, continuing with the existing index",
                new_index, created.outcome
            );
        }

        info!("Copying documents from {} to {}", name, new_index);
        let copied = self.store.copy_documents(name, &new_index).await?;
        if !copied.is_success() {
            warn!(
                "Copy into {} rejected ({:?}), removing it: {}",
                new_index, copied.outcome, copied.body
            );
            self.delete_checked(&new_index).await?;
            return Ok(ReindexOutcome::RolledBack {
                name: new_index,
                alias: name.to_string(),
            });
        }

        if self.store.index_exists(&old_index).await? {
            info!("Deleting old index {}", old_index);
            self.delete_checked(&old_index).await?;
        }

        // Removing the old physical index also removed the alias, so `name`
        // can only still exist as an index created before suffixing.
        if self.store.index_exists(name).await? {
            info!("Deleting unsuffixed index {}", name);
            self.delete_checked(name).await?;
        }

        info!("Pointing alias {} at {}", name, new_index);
        let aliased = self.store.put_alias(&new_index, name).await?;
        if !aliased.is_success() {
            return Err(OsmanError::Internal(format!(
                "Binding alias {} to {} failed: {}",
                name, new_index, aliased.body
            )));
        }

        let settings = self.store.get_settings(name).await?;

        Ok(ReindexOutcome::Completed {
            name: new_index,
            alias: name.to_string(),
            mapping_differences,
            settings,
        })
    }

    /// Delete an index, treating "not found" as already deleted.
    async fn delete_checked(&self, index: &str) -> Result<()> {
        let response = self.store.delete_index(index).await?;
        match response.outcome {
            StoreOutcome::Succeeded | StoreOutcome::NotFound => Ok(()),
            StoreOutcome::RequestInvalid => Err(OsmanError::Internal(format!(
                "Deleting index {} failed: {}",
                index,
                error_reason(&response.body)
            ))),
        }
    }
}

fn is_empty_tree(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Physical index name and `mappings` of the first index in a get-mapping
/// response.
fn live_mappings(response: &Value) -> (Option<String>, Value) {
    match response.as_object().and_then(|indices| indices.iter().next()) {
        Some((index, body)) => (
            Some(index.clone()),
            body.get("mappings").cloned().unwrap_or_else(|| json!({})),
        ),
        None => (None, json!({})),
    }
}

/// Whether any locally supplied setting differs from the live index.
///
/// Only keys given locally are compared. The store reports settings as
/// strings under `settings.index`, so both sides are flattened to dotted
/// keys with string values and a leading `index.` is dropped locally.
fn settings_drift(wanted: &Value, response: &Value) -> bool {
    let live = response
        .as_object()
        .and_then(|indices| indices.values().next())
        .and_then(|index| index.pointer("/settings/index"))
        .cloned()
        .unwrap_or_else(|| json!({}));

    let mut local = BTreeMap::new();
    flatten_settings("", wanted, &mut local);
    let mut remote = BTreeMap::new();
    flatten_settings("", &live, &mut remote);

    local.iter().any(|(key, value)| {
        let key = key.strip_prefix("index.").unwrap_or(key);
        remote.get(key) != Some(value)
    })
}

fn flatten_settings(prefix: &str, value: &Value, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_settings(&path, child, out);
            }
        }
        Value::Null => {}
        Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        other => {
            out.insert(prefix.to_string(), other.to_string());
        }
    }
}
