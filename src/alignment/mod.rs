//! Semantic alignment of worksheet columns to an ontology
//!
//! - [`AlignmentModel`] - tagged-variant graph of classes, column terminals
//!   and constant literals
//! - [`SemanticTypes`] - per-column class/property assignments
//! - [`AlignmentRegistry`] - alignments keyed by workspace + worksheet

pub mod model;
pub mod registry;

pub use model::{AlignmentModel, Edge, EdgeKind, Node, NodeKind, SemanticType, SemanticTypes};
pub use registry::{AlignmentDocument, AlignmentRegistry, construct_alignment_id};
