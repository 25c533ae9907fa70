//! Embedded Oxigraph backend

use super::{Collection, StoreAck, StoreBackendKind, TripleStoreBackend, collection_graph_iri};
use crate::error::StoreError;
use crate::serializer::RdfSyntax;
use async_trait::async_trait;
use oxigraph::io::RdfParser;
use oxigraph::model::{NamedNode, Quad};
use oxigraph::store::Store;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Open stores keyed by directory
///
/// RocksDB allows one writer handle per directory, so concurrent runs that
/// target the same store must share it.
#[derive(Default)]
pub struct StorePool {
    stores: Mutex<HashMap<PathBuf, Store>>,
}

impl StorePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the store at `path`, opening (and creating) it on first use
    pub fn get_or_open(&self, path: &Path) -> Result<Store, StoreError> {
        let mut stores = self.stores.lock();
        if let Some(store) = stores.get(path) {
            return Ok(store.clone());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Connection {
                endpoint: path.display().to_string(),
                cause: e.to_string(),
            })?;
        }
        let store = Store::open(path).map_err(|e| StoreError::Connection {
            endpoint: path.display().to_string(),
            cause: e.to_string(),
        })?;
        tracing::info!(path = %path.display(), "embedded store opened");
        stores.insert(path.to_path_buf(), store.clone());
        Ok(store)
    }

    /// Register an already open store, e.g. an in-memory one
    pub fn insert(&self, path: impl Into<PathBuf>, store: Store) {
        self.stores.lock().insert(path.into(), store);
    }

    pub fn len(&self) -> usize {
        self.stores.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.lock().is_empty()
    }
}

pub struct EmbeddedBackend {
    pool: Arc<StorePool>,
    location: PathBuf,
}

impl EmbeddedBackend {
    pub fn new(pool: Arc<StorePool>, host: &str, database: &str) -> Self {
        Self {
            pool,
            location: Path::new(host).join(database),
        }
    }

    pub fn location(&self) -> &Path {
        &self.location
    }
}

#[async_trait]
impl TripleStoreBackend for EmbeddedBackend {
    fn kind(&self) -> StoreBackendKind {
        StoreBackendKind::Embedded
    }

    fn endpoint(&self) -> String {
        self.location.display().to_string()
    }

    async fn open_collection(&self, name: &str) -> Result<Box<dyn Collection>, StoreError> {
        let graph = NamedNode::new(collection_graph_iri(name))
            .map_err(|e| StoreError::Configuration(format!("model name {name}: {e}")))?;
        let pool = self.pool.clone();
        let location = self.location.clone();
        let store = tokio::task::spawn_blocking(move || pool.get_or_open(&location))
            .await
            .map_err(|e| StoreError::Backend(format!("store open task failed: {e}")))??;

        Ok(Box::new(EmbeddedCollection {
            name: name.to_string(),
            endpoint: self.endpoint(),
            graph,
            store,
        }))
    }
}

struct EmbeddedCollection {
    name: String,
    endpoint: String,
    graph: NamedNode,
    store: Store,
}

#[async_trait]
impl Collection for EmbeddedCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self, payload: Vec<u8>, syntax: RdfSyntax) -> Result<StoreAck, StoreError> {
        let store = self.store.clone();
        let graph = self.graph.clone();

        let loaded = tokio::task::spawn_blocking(move || -> Result<usize, StoreError> {
            // Parse everything first so a malformed file commits nothing
            let quads = RdfParser::from_format(syntax.format())
                .with_default_graph(graph)
                .without_named_graphs()
                .rename_blank_nodes()
                .for_reader(payload.as_slice())
                .collect::<Result<Vec<Quad>, _>>()
                .map_err(|e| StoreError::MalformedFile {
                    cause: e.to_string(),
                })?;
            let count = quads.len();
            store
                .extend(quads)
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            store.flush().map_err(|e| StoreError::Backend(e.to_string()))?;
            Ok(count)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("store load task failed: {e}")))??;

        tracing::info!(
            endpoint = %self.endpoint,
            collection = %self.name,
            triples = loaded,
            "artifact committed to embedded store"
        );

        Ok(StoreAck {
            backend: StoreBackendKind::Embedded,
            endpoint: self.endpoint.clone(),
            collection: self.name.clone(),
            triples_loaded: Some(loaded),
            committed_at: chrono::Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxigraph::model::GraphNameRef;

    const TTL: &[u8] = b"@prefix foaf: <http://xmlns.com/foaf/0.1/> .\n_:b1 foaf:name \"Alice\" .\n";

    #[tokio::test]
    async fn test_load_into_named_graph() {
        let dir = tempfile::tempdir().unwrap();
        let pool = Arc::new(StorePool::new());
        let backend = EmbeddedBackend::new(pool.clone(), &dir.path().display().to_string(), "db");

        let collection = backend.open_collection("karma").await.unwrap();
        let ack = collection.load(TTL.to_vec(), RdfSyntax::Turtle).await.unwrap();
        assert_eq!(ack.triples_loaded, Some(1));
        assert_eq!(ack.collection, "karma");

        let store = pool.get_or_open(backend.location()).unwrap();
        let graph = NamedNode::new(collection_graph_iri("karma")).unwrap();
        let in_graph = store
            .quads_for_pattern(None, None, None, Some(GraphNameRef::NamedNode(graph.as_ref())))
            .count();
        assert_eq!(in_graph, 1);
        assert_eq!(pool.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_payload_commits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let pool = Arc::new(StorePool::new());
        let backend = EmbeddedBackend::new(pool.clone(), &dir.path().display().to_string(), "db");
        let collection = backend.open_collection("karma").await.unwrap();

        let mut payload = TTL.to_vec();
        payload.extend_from_slice(b"this is not turtle");
        let err = collection.load(payload, RdfSyntax::Turtle).await.unwrap_err();
        assert!(matches!(err, StoreError::MalformedFile { .. }));

        let store = pool.get_or_open(backend.location()).unwrap();
        assert_eq!(store.len().unwrap(), 0);
    }
}
