//! Triple store publication
//!
//! A published artifact is committed once into a *collection* of a triple
//! store: a named graph of an embedded Oxigraph store, or a graph of a
//! remote SPARQL Graph Store endpoint. Backends sit behind
//! [`TripleStoreBackend`] so tests and other stores can be plugged in.

pub mod embedded;
pub mod http;
pub mod ledger;
pub mod publisher;

use crate::error::StoreError;
use crate::serializer::RdfSyntax;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use embedded::{EmbeddedBackend, StorePool};
pub use http::HttpBackend;
pub use ledger::PublishLedger;
pub use publisher::{PublishStatus, StorePublisher};

/// Model name used when none is configured
pub const DEFAULT_MODEL_NAME: &str = "karma";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackendKind {
    /// Oxigraph RocksDB store on the local filesystem
    #[default]
    Embedded,
    /// SPARQL 1.1 Graph Store HTTP protocol
    Http,
}

impl fmt::Display for StoreBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackendKind::Embedded => write!(f, "embedded"),
            StoreBackendKind::Http => write!(f, "http"),
        }
    }
}

impl std::str::FromStr for StoreBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "embedded" | "oxigraph" | "local" => Ok(StoreBackendKind::Embedded),
            "http" | "remote" | "gsp" => Ok(StoreBackendKind::Http),
            other => Err(format!("unknown store backend: {other}")),
        }
    }
}

/// Where and as whom to publish
///
/// For the embedded backend `host` is a directory and the store lives at
/// `host/database`. For the HTTP backend the endpoint is `host/database`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConnectionInfo {
    #[serde(default)]
    pub backend: StoreBackendKind,
    pub host: String,
    pub database: String,
    #[serde(default)]
    pub user: Option<String>,
    /// Never written back to preferences
    #[serde(default, skip_serializing)]
    pub credential: Option<String>,
    #[serde(default = "default_model_name")]
    pub model_name: String,
}

fn default_model_name() -> String {
    DEFAULT_MODEL_NAME.to_string()
}

impl fmt::Debug for StoreConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConnectionInfo")
            .field("backend", &self.backend)
            .field("host", &self.host)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("model_name", &self.model_name)
            .finish()
    }
}

impl StoreConnectionInfo {
    pub fn new(backend: StoreBackendKind, host: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            backend,
            host: host.into(),
            database: database.into(),
            user: None,
            credential: None,
            model_name: default_model_name(),
        }
    }

    pub fn with_user(mut self, user: impl Into<String>, credential: Option<String>) -> Self {
        self.user = Some(user.into());
        self.credential = credential;
        self
    }

    pub fn with_model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = model_name.into();
        self
    }

    /// Human-readable endpoint used in errors and logs
    pub fn endpoint(&self) -> String {
        match self.backend {
            StoreBackendKind::Embedded => std::path::Path::new(&self.host)
                .join(&self.database)
                .display()
                .to_string(),
            StoreBackendKind::Http => {
                let host = if self.host.contains("://") {
                    self.host.clone()
                } else {
                    format!("http://{}", self.host)
                };
                format!("{}/{}", host.trim_end_matches('/'), self.database.trim_start_matches('/'))
            }
        }
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        if self.host.trim().is_empty() {
            return Err(StoreError::Configuration("store host is empty".to_string()));
        }
        if self.database.trim().is_empty() {
            return Err(StoreError::Configuration("store database is empty".to_string()));
        }
        if self.model_name.trim().is_empty() {
            return Err(StoreError::Configuration("model name is empty".to_string()));
        }
        Ok(())
    }
}

/// Acknowledgement of a committed artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreAck {
    pub backend: StoreBackendKind,
    pub endpoint: String,
    pub collection: String,
    /// Triples the store reports as loaded, when it says so
    pub triples_loaded: Option<usize>,
    pub committed_at: DateTime<Utc>,
}

/// A store connection able to hand out collections
#[async_trait]
pub trait TripleStoreBackend: Send + Sync {
    fn kind(&self) -> StoreBackendKind;

    fn endpoint(&self) -> String;

    async fn open_collection(&self, name: &str) -> Result<Box<dyn Collection>, StoreError>;
}

/// A named graph (or equivalent) that accepts serialized RDF
#[async_trait]
pub trait Collection: Send + Sync {
    fn name(&self) -> &str;

    async fn load(&self, payload: Vec<u8>, syntax: RdfSyntax) -> Result<StoreAck, StoreError>;
}

/// Graph IRI used for a collection name
///
/// Absolute IRIs are used as is; plain names live under a fixed URN space.
pub fn collection_graph_iri(name: &str) -> String {
    if name.contains("://") || name.starts_with("urn:") {
        name.to_string()
    } else {
        format!("urn:x-karma:model:{}", crate::generator::iri_escape(name))
    }
}
