//! Persisted publish preferences
//!
//! The last options a user published with are stored under the
//! `PublishRDFCommandPreferences` namespace and used to prefill the next
//! invocation. Last write wins. The store credential is never persisted.

use crate::config::PublishConfig;
use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

pub const PUBLISH_RDF_NAMESPACE: &str = "PublishRDFCommandPreferences";

/// Key/value persistence keyed by namespace
pub trait PreferenceStore: Send + Sync {
    fn load(&self, namespace: &str) -> Result<Option<Value>>;

    fn save(&self, namespace: &str, value: Value) -> Result<()>;
}

/// Preference record written for every publish request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRdfPreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rdf_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rdf_namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_inverse_properties: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_to_store: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
}

impl PublishRdfPreferences {
    pub fn from_config(config: &PublishConfig) -> Self {
        Self {
            rdf_prefix: Some(config.subject_prefix.clone()),
            rdf_namespace: Some(config.subject_namespace.clone()),
            add_inverse_properties: Some(config.add_inverse_properties),
            save_to_store: Some(config.persist_to_store),
            db_name: Some(config.store.database.clone()),
            host_name: Some(config.store.host.clone()),
            user_name: config.store.user.clone(),
            model_name: Some(config.store.model_name.clone()),
        }
    }

    pub fn load(store: &dyn PreferenceStore) -> Result<Option<Self>> {
        store
            .load(PUBLISH_RDF_NAMESPACE)?
            .map(|value| {
                serde_json::from_value(value)
                    .with_context(|| format!("invalid {PUBLISH_RDF_NAMESPACE} record"))
            })
            .transpose()
    }

    pub fn save(&self, store: &dyn PreferenceStore) -> Result<()> {
        store.save(PUBLISH_RDF_NAMESPACE, serde_json::to_value(self)?)
    }
}

// ============================================================================
// Implementations
// ============================================================================

/// Preferences kept in memory
#[derive(Debug, Default)]
pub struct InMemoryPreferenceStore {
    values: RwLock<Map<String, Value>>,
}

impl InMemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for InMemoryPreferenceStore {
    fn load(&self, namespace: &str) -> Result<Option<Value>> {
        Ok(self.values.read().get(namespace).cloned())
    }

    fn save(&self, namespace: &str, value: Value) -> Result<()> {
        self.values.write().insert(namespace.to_string(), value);
        Ok(())
    }
}

/// Preferences stored as one JSON object per file, one key per namespace
#[derive(Debug)]
pub struct JsonFilePreferenceStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl JsonFilePreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read preferences {:?}", self.path))?;
        if contents.trim().is_empty() {
            return Ok(Map::new());
        }
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse preferences {:?}", self.path))
    }
}

impl PreferenceStore for JsonFilePreferenceStore {
    fn load(&self, namespace: &str) -> Result<Option<Value>> {
        let _guard = self.lock.read();
        Ok(self.read_all()?.remove(namespace))
    }

    fn save(&self, namespace: &str, value: Value) -> Result<()> {
        let _guard = self.lock.write();
        let mut all = self.read_all()?;
        all.insert(namespace.to_string(), value);

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create preferences directory {:?}", dir))?;
        let json = serde_json::to_string_pretty(&all)?;
        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        std::io::Write::write_all(&mut temp, json.as_bytes())?;
        temp.persist(&self.path)
            .with_context(|| format!("failed to write preferences {:?}", self.path))?;
        tracing::debug!(namespace, path = %self.path.display(), "preferences saved");
        Ok(())
    }
}
