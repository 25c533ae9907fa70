//! Commit a serialized artifact to the configured store, once

use super::{
    EmbeddedBackend, HttpBackend, PublishLedger, StoreAck, StoreBackendKind, StoreConnectionInfo,
    StorePool, TripleStoreBackend, http::DEFAULT_TIMEOUT,
};
use crate::error::StoreError;
use crate::serializer::{RdfSyntax, sha256_hex};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task;

/// What happened to a publish request that did not fail
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum PublishStatus {
    Committed(StoreAck),
    /// The same bytes were already committed to this collection
    #[serde(rename_all = "camelCase")]
    AlreadyPublished { collection: String, sha256: String },
}

pub struct StorePublisher {
    pool: Arc<StorePool>,
    ledger: Arc<PublishLedger>,
    timeout: Duration,
    backend_override: Option<Arc<dyn TripleStoreBackend>>,
    /// One async lock per store target; held from the ledger check until the
    /// commit is recorded
    target_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl StorePublisher {
    pub fn new(pool: Arc<StorePool>, ledger: Arc<PublishLedger>) -> Self {
        Self {
            pool,
            ledger,
            timeout: DEFAULT_TIMEOUT,
            backend_override: None,
            target_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Route every publish to `backend`, ignoring the configured kind
    pub fn with_backend(mut self, backend: Arc<dyn TripleStoreBackend>) -> Self {
        self.backend_override = Some(backend);
        self
    }

    pub fn ledger(&self) -> &PublishLedger {
        &self.ledger
    }

    fn target_lock(&self, target: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.target_locks
            .lock()
            .entry(target.to_string())
            .or_default()
            .clone()
    }

    fn backend_for(&self, info: &StoreConnectionInfo) -> Result<Arc<dyn TripleStoreBackend>, StoreError> {
        if let Some(backend) = &self.backend_override {
            return Ok(backend.clone());
        }
        Ok(match info.backend {
            StoreBackendKind::Embedded => Arc::new(EmbeddedBackend::new(
                self.pool.clone(),
                &info.host,
                &info.database,
            )),
            StoreBackendKind::Http => Arc::new(HttpBackend::new(info, self.timeout)?),
        })
    }

    /// Read the artifact back and submit it to the store exactly once.
    ///
    /// Nothing is retried; every failure comes back as a [`StoreError`].
    pub async fn publish(
        &self,
        file_path: &Path,
        syntax: RdfSyntax,
        info: &StoreConnectionInfo,
    ) -> Result<PublishStatus, StoreError> {
        info.validate()?;
        let backend = self.backend_for(info)?;

        let payload = tokio::fs::read(file_path)
            .await
            .map_err(|e| StoreError::Artifact {
                path: file_path.to_path_buf(),
                cause: e.to_string(),
            })?;
        let sha256 = sha256_hex(&payload);
        let target = PublishLedger::target_key(
            &backend.kind().to_string(),
            &backend.endpoint(),
            &info.model_name,
        );

        let lock = self.target_lock(&target);
        let _guard = lock.lock().await;

        if self.ledger.contains(&target, &sha256) {
            tracing::info!(
                target = %target,
                sha256 = %sha256,
                "artifact already published, skipping store commit"
            );
            return Ok(PublishStatus::AlreadyPublished {
                collection: info.model_name.clone(),
                sha256,
            });
        }

        let collection = backend.open_collection(&info.model_name).await?;
        let ack = collection.load(payload, syntax).await?;
        if self.ledger.insert(&target, &sha256) {
            // The commit already happened, so a failed write is only logged
            let ledger = self.ledger.clone();
            match task::spawn_blocking(move || ledger.persist()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "failed to persist publish ledger"),
                Err(e) => tracing::warn!(error = %e, "publish ledger writer panicked"),
            }
        }
        Ok(PublishStatus::Committed(ack))
    }
}
