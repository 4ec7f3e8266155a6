//! Structural comparison of JSON trees.
//!
//! Used to decide whether a mapping, a search template or a painless script
//! actually changed before anything is written to the cluster. Comparison is
//! on parsed values, so key order and whitespace never count as a change.
//!
//! Paths are reported as `root['mappings']['properties']['title']` for
//! object keys and `root['tags'][2]` for array positions.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::collections::BTreeMap;

/// Old and new value at a changed path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    /// Value on the local side.
    pub old: Value,
    /// Value on the remote side.
    pub new: Value,
}

/// Differences between a local and a remote tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diff {
    /// Paths only present remotely.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub added: BTreeMap<String, Value>,
    /// Paths only present locally.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub removed: BTreeMap<String, Value>,
    /// Paths present on both sides with different values.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub changed: BTreeMap<String, Change>,
}

impl Diff {
    /// No differences recorded.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    /// Number of differing paths.
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.changed.len()
    }

    /// Every differing path, sorted within each category.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.added
            .keys()
            .chain(self.removed.keys())
            .chain(self.changed.keys())
            .map(String::as_str)
    }
}

/// Compare `local` against `remote`.
///
/// Returns `None` when both trees are deep-equal.
pub fn diff(local: &Value, remote: &Value) -> Option<Diff> {
    let mut out = Diff::default();
    compare("root", local, remote, &mut out);
    if out.is_empty() { None } else { Some(out) }
}

/// Parse two JSON documents and compare them with [`diff`].
pub fn diff_str(local: &str, remote: &str) -> Result<Option<Diff>> {
    let local: Value = serde_json::from_str(local)?;
    let remote: Value = serde_json::from_str(remote)?;
    Ok(diff(&local, &remote))
}

fn compare(path: &str, local: &Value, remote: &Value, out: &mut Diff) {
    match (local, remote) {
        (Value::Object(l), Value::Object(r)) => {
            for (key, lv) in l {
                let child = key_path(path, key);
                match r.get(key) {
                    Some(rv) => compare(&child, lv, rv, out),
                    None => {
                        out.removed.insert(child, lv.clone());
                    }
                }
            }
            for (key, rv) in r {
                if !l.contains_key(key) {
                    out.added.insert(key_path(path, key), rv.clone());
                }
            }
        }
        (Value::Array(l), Value::Array(r)) => {
            for i in 0..l.len().max(r.len()) {
                let child = format!("{}[{}]", path, i);
                match (l.get(i), r.get(i)) {
                    (Some(lv), Some(rv)) => compare(&child, lv, rv, out),
                    (Some(lv), None) => {
                        out.removed.insert(child, lv.clone());
                    }
                    (None, Some(rv)) => {
                        out.added.insert(child, rv.clone());
                    }
                    (None, None) => {}
                }
            }
        }
        (Value::Number(l), Value::Number(r)) => {
            if !numbers_equal(l, r) {
                record_change(path, local, remote, out);
            }
        }
        _ => {
            if local != remote {
                record_change(path, local, remote, out);
            }
        }
    }
}

fn record_change(path: &str, local: &Value, remote: &Value, out: &mut Diff) {
    out.changed.insert(
        path.to_string(),
        Change {
            old: local.clone(),
            new: remote.clone(),
        },
    );
}

fn key_path(parent: &str, key: &str) -> String {
    format!("{}['{}']", parent, key.replace('\'', "\\'"))
}

// 1 and 1.0 are the same value once parsed. Two integers compare exactly,
// f64 would merge neighbours above 2^53.
fn numbers_equal(a: &Number, b: &Number) -> bool {
    if a == b {
        return true;
    }
    if !a.is_f64() && !b.is_f64() {
        return false;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}
