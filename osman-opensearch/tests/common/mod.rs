//! In-memory stores for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use osman_opensearch::{IndexStore, OsmanError, Result, ScriptStore, StoreResponse, MUSTACHE};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct IndexState {
    pub mappings: Value,
    pub settings: Map<String, Value>,
    pub documents: Vec<Value>,
}

#[derive(Debug, Default)]
struct State {
    indices: BTreeMap<String, IndexState>,
    aliases: BTreeMap<String, String>,
    scripts: BTreeMap<String, (String, Value)>,
    calls: Vec<String>,
    fail_copies: bool,
    refused_deletes: BTreeSet<String>,
}

/// Behaves like a single-node cluster: aliases resolve on reads, deleting an
/// index drops the aliases bound to it, and index settings read back as
/// strings.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_index(self, name: &str, mappings: Value, documents: Vec<Value>) -> Self {
        self.state.lock().unwrap().indices.insert(
            name.to_string(),
            IndexState {
                mappings,
                settings: default_settings(),
                documents,
            },
        );
        self
    }

    pub fn with_alias(self, alias: &str, index: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .aliases
            .insert(alias.to_string(), index.to_string());
        self
    }

    pub fn with_script(self, id: &str, lang: &str, source: Value) -> Self {
        self.state
            .lock()
            .unwrap()
            .scripts
            .insert(id.to_string(), (lang.to_string(), stored_source(lang, source)));
        self
    }

    /// Make every document copy report per-document failures.
    pub fn fail_copies(&self) {
        self.state.lock().unwrap().fail_copies = true;
    }

    /// Make deleting `index` fail the way a closed or blocked index does.
    pub fn refuse_delete(&self, index: &str) {
        self.state
            .lock()
            .unwrap()
            .refused_deletes
            .insert(index.to_string());
    }

    /// Mutating calls in the order they were made.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn physical_indices(&self) -> Vec<String> {
        self.state.lock().unwrap().indices.keys().cloned().collect()
    }

    pub fn alias_target(&self, alias: &str) -> Option<String> {
        self.state.lock().unwrap().aliases.get(alias).cloned()
    }

    pub fn index(&self, name: &str) -> Option<IndexState> {
        let state = self.state.lock().unwrap();
        let physical = state.aliases.get(name).map(String::as_str).unwrap_or(name);
        state.indices.get(physical).cloned()
    }

    pub fn script(&self, id: &str) -> Option<(String, Value)> {
        self.state.lock().unwrap().scripts.get(id).cloned()
    }
}

impl State {
    fn resolve(&self, name: &str) -> Option<String> {
        if self.indices.contains_key(name) {
            return Some(name.to_string());
        }
        self.aliases
            .get(name)
            .filter(|index| self.indices.contains_key(*index))
            .cloned()
    }
}

fn default_settings() -> Map<String, Value> {
    let mut settings = Map::new();
    settings.insert("number_of_shards".into(), json!("1"));
    settings.insert("number_of_replicas".into(), json!("1"));
    settings.insert("uuid".into(), json!("mem"));
    settings
}

// Settings come back as strings, with a leading `index` level folded in.
fn stringify(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, child)| (key.clone(), stringify(child)))
                .collect(),
        ),
        Value::String(s) => Value::String(s.clone()),
        other => Value::String(other.to_string()),
    }
}

fn apply_settings(target: &mut Map<String, Value>, given: &Value) {
    if let Value::Object(map) = stringify(given) {
        for (key, value) in map {
            match (key.as_str(), value) {
                ("index", Value::Object(inner)) => target.extend(inner),
                (_, value) => {
                    target.insert(key, value);
                }
            }
        }
    }
}

// Templates are kept as their JSON text, the way the cluster stores them.
fn stored_source(lang: &str, source: Value) -> Value {
    match (lang, &source) {
        (MUSTACHE, Value::Object(_)) => Value::String(source.to_string()),
        _ => source,
    }
}

#[async_trait]
impl IndexStore for MemoryStore {
    async fn create_index(&self, name: &str, body: &Value) -> Result<StoreResponse> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("create {}", name));

        if state.resolve(name).is_some() {
            return Ok(StoreResponse::request_invalid(json!({
                "error": {
                    "type": "resource_already_exists_exception",
                    "reason": format!("index [{}] already exists", name)
                },
                "status": 400
            })));
        }

        let mut settings = default_settings();
        if let Some(given) = body.get("settings") {
            apply_settings(&mut settings, given);
        }

        state.indices.insert(
            name.to_string(),
            IndexState {
                mappings: body.get("mappings").cloned().unwrap_or_else(|| json!({})),
                settings,
                documents: Vec::new(),
            },
        );

        Ok(StoreResponse::succeeded(
            json!({ "acknowledged": true, "index": name }),
        ))
    }

    async fn delete_index(&self, name: &str) -> Result<StoreResponse> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("delete {}", name));

        if state.refused_deletes.contains(name) {
            return Ok(StoreResponse::request_invalid(json!({
                "error": {
                    "type": "cluster_block_exception",
                    "reason": format!("index [{}] blocked by: [FORBIDDEN/8/index write]", name)
                },
                "status": 400
            })));
        }

        if state.indices.remove(name).is_none() {
            return Ok(StoreResponse::not_found(json!({
                "error": { "type": "index_not_found_exception", "reason": "no such index" },
                "status": 404
            })));
        }
        state.aliases.retain(|_, index| index != name);

        Ok(StoreResponse::succeeded(json!({ "acknowledged": true })))
    }

    async fn index_exists(&self, name: &str) -> Result<bool> {
        Ok(self.state.lock().unwrap().resolve(name).is_some())
    }

    async fn get_mapping(&self, name: &str) -> Result<Value> {
        let state = self.state.lock().unwrap();
        let physical = state
            .resolve(name)
            .ok_or_else(|| OsmanError::IndexNotFound(name.to_string()))?;
        let index = &state.indices[&physical];

        Ok(json!({ physical: { "mappings": index.mappings } }))
    }

    async fn get_settings(&self, name: &str) -> Result<Value> {
        let state = self.state.lock().unwrap();
        let physical = state
            .resolve(name)
            .ok_or_else(|| OsmanError::IndexNotFound(name.to_string()))?;
        let index = &state.indices[&physical];

        Ok(json!({ physical: { "settings": { "index": index.settings } } }))
    }

    async fn put_alias(&self, index: &str, alias: &str) -> Result<StoreResponse> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("alias {} -> {}", alias, index));

        if !state.indices.contains_key(index) {
            return Ok(StoreResponse::not_found(json!({
                "error": { "type": "index_not_found_exception", "reason": "no such index" }
            })));
        }
        if state.indices.contains_key(alias) {
            return Ok(StoreResponse::request_invalid(json!({
                "error": {
                    "type": "invalid_alias_name_exception",
                    "reason": "an index exists with the same name as the alias"
                }
            })));
        }
        state.aliases.insert(alias.to_string(), index.to_string());

        Ok(StoreResponse::succeeded(json!({ "acknowledged": true })))
    }

    async fn copy_documents(&self, source: &str, dest: &str) -> Result<StoreResponse> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("copy {} -> {}", source, dest));

        let Some(from) = state.resolve(source) else {
            return Ok(StoreResponse::not_found(json!({
                "error": { "type": "index_not_found_exception", "reason": "no such index" }
            })));
        };
        let documents = state.indices[&from].documents.clone();

        if state.fail_copies {
            return Ok(StoreResponse::request_invalid(json!({
                "total": documents.len(),
                "failures": [{ "cause": { "type": "mapper_parsing_exception" } }]
            })));
        }

        let total = documents.len();
        let target = state
            .indices
            .entry(dest.to_string())
            .or_insert_with(|| IndexState {
                mappings: json!({}),
                settings: default_settings(),
                documents: Vec::new(),
            });
        target.documents.extend(documents);

        Ok(StoreResponse::succeeded(
            json!({ "total": total, "created": total, "failures": [] }),
        ))
    }
}

#[async_trait]
impl ScriptStore for MemoryStore {
    async fn get_script(&self, id: &str) -> Result<Option<Value>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .scripts
            .get(id)
            .map(|(lang, source)| json!({ "lang": lang, "source": source })))
    }

    async fn put_script(&self, id: &str, lang: &str, source: &Value) -> Result<Value> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("put script {}", id));
        state.scripts.insert(
            id.to_string(),
            (lang.to_string(), stored_source(lang, source.clone())),
        );

        Ok(json!({ "acknowledged": true }))
    }

    async fn delete_script(&self, id: &str) -> Result<StoreResponse> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("delete script {}", id));

        match state.scripts.remove(id) {
            Some(_) => Ok(StoreResponse::succeeded(json!({ "acknowledged": true }))),
            None => Ok(StoreResponse::not_found(json!({ "found": false }))),
        }
    }

    // Every document of the index is a hit.
    async fn search_template(
        &self,
        index: &str,
        _source: &Value,
        _params: &Value,
    ) -> Result<Value> {
        let state = self.state.lock().unwrap();
        let physical = state
            .resolve(index)
            .ok_or_else(|| OsmanError::IndexNotFound(index.to_string()))?;
        let hits: Vec<Value> = state.indices[&physical]
            .documents
            .iter()
            .map(|doc| json!({ "_index": physical, "_source": doc }))
            .collect();

        Ok(json!({ "hits": { "total": { "value": hits.len() }, "hits": hits } }))
    }
}
