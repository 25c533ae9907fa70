//! Error taxonomy for the publication pipeline
//!
//! This module provides:
//! - Numeric error codes with categories and retryability
//! - One `thiserror` enum per pipeline stage
//! - `PublishError`, the fatal errors that abort a run, with the generic
//!   messages shown to callers
//!
//! Per-cell failures are not errors in this sense: they are collected as
//! entries of an [`ErrorReport`](crate::report::ErrorReport).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

// =============================================================================
// ERROR CODES
// =============================================================================

/// Pipeline error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum ErrorCode {
    /// No alignment registered for the worksheet
    AlignmentMissing = -32101,
    /// The alignment could not be turned into a mapping
    MappingGeneration = -32102,
    /// A single cell or row could not be mapped
    RowMapping = -32103,
    /// The RDF artifact could not be written
    Serialization = -32104,
    /// The triple store rejected or could not receive the artifact
    Store = -32105,
    /// Invalid or incomplete configuration
    Configuration = -32106,
}

impl ErrorCode {
    /// Get the integer code
    pub fn code(&self) -> i32 {
        *self as i32
    }

    /// Check if this error type is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCode::Store | ErrorCode::Serialization)
    }

    /// Get the error category for metrics
    pub fn category(&self) -> &'static str {
        match self {
            ErrorCode::AlignmentMissing => "resource_not_found",
            ErrorCode::MappingGeneration | ErrorCode::RowMapping => "mapping_error",
            ErrorCode::Serialization => "io_error",
            ErrorCode::Store => "store_error",
            ErrorCode::Configuration => "client_error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

// =============================================================================
// MAPPING GENERATION
// =============================================================================

/// Inconsistencies between an alignment, its semantic types and the ontology
#[derive(Debug, Error)]
pub enum MappingGenerationError {
    #[error("alignment has no class nodes")]
    EmptyAlignment,

    #[error("semantic type for column '{column_id}' has no terminal node in the alignment")]
    UnboundColumn { column_id: String },

    #[error("column '{column_id}' is bound to {count} terminal nodes, expected exactly one")]
    AmbiguousColumn { column_id: String, count: usize },

    #[error("edge {source_id} -> {target_id} references unknown node '{missing}'")]
    DanglingEdge {
        source_id: String,
        target_id: String,
        missing: String,
    },

    #[error("edge {source_id} -> {target_id} ({property}) must start at a class node")]
    SourceNotClass {
        source_id: String,
        target_id: String,
        property: String,
    },

    #[error("edge {source_id} -> {target_id} has kind {kind} but targets a {target_kind} node")]
    EdgeKindMismatch {
        source_id: String,
        target_id: String,
        kind: &'static str,
        target_kind: &'static str,
    },

    #[error("class instantiation cycle: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },

    #[error("invalid IRI '{iri}': {reason}")]
    InvalidIri { iri: String, reason: String },
}

// =============================================================================
// SERIALIZATION
// =============================================================================

/// Failures while writing an RDF artifact
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("cannot write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot encode triple as {syntax}: {message}")]
    Encoding {
        syntax: &'static str,
        message: String,
    },

    #[error("cannot read back {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
}

// =============================================================================
// STORE
// =============================================================================

/// Failures while committing an artifact to a triple store
///
/// None of these are retried by the store publisher itself.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("connection refused")]
    ConnectionRefused { endpoint: String },

    #[error("cannot connect to {endpoint}: {cause}")]
    Connection { endpoint: String, cause: String },

    #[error("timed out talking to {endpoint}")]
    Timeout { endpoint: String },

    #[error("authentication failed for {endpoint}: {cause}")]
    Authentication { endpoint: String, cause: String },

    #[error("store rejected the RDF file: {cause}")]
    MalformedFile { cause: String },

    #[error("cannot read artifact {}: {cause}", path.display())]
    Artifact { path: PathBuf, cause: String },

    #[error("store backend error: {0}")]
    Backend(String),

    #[error("invalid store configuration: {0}")]
    Configuration(String),
}

impl StoreError {
    pub fn code(&self) -> ErrorCode {
        match self {
            StoreError::Configuration(_) => ErrorCode::Configuration,
            _ => ErrorCode::Store,
        }
    }
}

// =============================================================================
// FATAL RUN ERRORS
// =============================================================================

/// Errors that abort a publication run before an artifact exists
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("no alignment for worksheet {worksheet_id}")]
    AlignmentMissing { worksheet_id: String },

    #[error(transparent)]
    MappingGeneration(#[from] MappingGenerationError),

    #[error(transparent)]
    Serialization(#[from] SerializationError),

    #[error("publication worker failed: {0}")]
    Worker(String),
}

impl PublishError {
    pub fn code(&self) -> ErrorCode {
        match self {
            PublishError::AlignmentMissing { .. } => ErrorCode::AlignmentMissing,
            PublishError::MappingGeneration(_) | PublishError::Worker(_) => {
                ErrorCode::MappingGeneration
            }
            PublishError::Serialization(_) => ErrorCode::Serialization,
        }
    }

    /// Message safe to show to the caller. Causes stay in the logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            PublishError::AlignmentMissing { .. } => "alignment missing",
            PublishError::MappingGeneration(_) | PublishError::Worker(_) => {
                "error occurred while generating RDF"
            }
            PublishError::Serialization(_) => "error occurred while writing RDF",
        }
    }
}
