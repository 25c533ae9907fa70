//! Alignment lookup keyed by workspace + worksheet

use super::model::{AlignmentModel, SemanticTypes};
use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Build the registry key for a worksheet's alignment
pub fn construct_alignment_id(workspace_id: &str, worksheet_id: &str) -> String {
    format!("{workspace_id}:{worksheet_id}")
}

/// Alignment document as written by the modeling side
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignmentDocument {
    pub worksheet_id: String,
    #[serde(default)]
    pub workspace_id: Option<String>,
    pub alignment: AlignmentModel,
    #[serde(default)]
    pub semantic_types: SemanticTypes,
}

impl AlignmentDocument {
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read alignment {:?}", path))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse alignment {:?}", path))
    }
}

/// Shared registry of alignments
///
/// Concurrent runs only read; registration takes the write lock briefly.
#[derive(Debug, Default)]
pub struct AlignmentRegistry {
    alignments: RwLock<HashMap<String, Arc<AlignmentModel>>>,
}

impl AlignmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, workspace_id: &str, worksheet_id: &str, alignment: AlignmentModel) {
        let id = construct_alignment_id(workspace_id, worksheet_id);
        tracing::debug!(alignment_id = %id, nodes = alignment.nodes().len(), "alignment registered");
        self.alignments.write().insert(id, Arc::new(alignment));
    }

    pub fn get(&self, alignment_id: &str) -> Option<Arc<AlignmentModel>> {
        self.alignments.read().get(alignment_id).cloned()
    }

    pub fn remove(&self, alignment_id: &str) -> Option<Arc<AlignmentModel>> {
        self.alignments.write().remove(alignment_id)
    }

    pub fn len(&self) -> usize {
        self.alignments.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.alignments.read().is_empty()
    }
}
