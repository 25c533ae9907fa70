//! Record of artifacts already committed to a store
//!
//! Publishing the same bytes into the same collection twice would duplicate
//! every blank-node triple. The ledger remembers `(target, sha256)` pairs of
//! successful commits so a repeat can be skipped.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    /// `backend|endpoint|collection`
    pub target: String,
    pub sha256: String,
}

#[derive(Debug, Default)]
pub struct PublishLedger {
    entries: Mutex<BTreeSet<LedgerEntry>>,
    io: Mutex<()>,
    path: Option<PathBuf>,
}

impl PublishLedger {
    /// Ledger that lives only as long as the process
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the ledger file at `path`, starting empty if it does not exist
    pub fn open(path: &Path) -> Result<Self> {
        let entries = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read publish ledger {:?}", path))?;
            serde_json::from_str::<Vec<LedgerEntry>>(&contents)
                .with_context(|| format!("failed to parse publish ledger {:?}", path))?
                .into_iter()
                .collect()
        } else {
            BTreeSet::new()
        };
        Ok(Self {
            entries: Mutex::new(entries),
            io: Mutex::new(()),
            path: Some(path.to_path_buf()),
        })
    }

    pub fn target_key(backend: &str, endpoint: &str, collection: &str) -> String {
        format!("{backend}|{endpoint}|{collection}")
    }

    pub fn contains(&self, target: &str, sha256: &str) -> bool {
        self.entries.lock().contains(&LedgerEntry {
            target: target.to_string(),
            sha256: sha256.to_string(),
        })
    }

    /// Add an entry in memory only. Returns `false` when it was already known.
    pub fn insert(&self, target: &str, sha256: &str) -> bool {
        self.entries.lock().insert(LedgerEntry {
            target: target.to_string(),
            sha256: sha256.to_string(),
        })
    }

    /// Write the current entries to the ledger file, if there is one.
    /// Blocking; async callers run it on the blocking pool.
    pub fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        // Serializes writers so an older snapshot never lands last
        let _io = self.io.lock();
        let snapshot: Vec<LedgerEntry> = self.entries.lock().iter().cloned().collect();
        write_atomic(path, &snapshot)
            .with_context(|| format!("failed to persist publish ledger {:?}", path))
    }

    /// Remember a successful commit. Persisting is best effort: the commit
    /// already happened, so a write failure is only logged.
    pub fn record(&self, target: &str, sha256: &str) {
        if !self.insert(target, sha256) {
            return;
        }
        if let Err(e) = self.persist() {
            tracing::warn!(error = %e, "failed to persist publish ledger");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

fn write_atomic(path: &Path, entries: &[LedgerEntry]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let json = serde_json::to_string_pretty(entries)?;
    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    std::io::Write::write_all(&mut temp, json.as_bytes())?;
    temp.persist(path)?;
    Ok(())
}
