//! Mapping generation
//!
//! [`MappingGenerator`] walks an [`AlignmentModel`](crate::alignment::AlignmentModel)
//! and produces a [`MappingDescription`]: an R2RML-shaped set of triples
//! maps that the [`RdfGenerator`](crate::generator::RdfGenerator) executes
//! row by row.

pub mod description;
pub mod generator;

pub use description::{
    MappingDescription, MappingWarning, ObjectMap, PredicateObjectMap, SubjectMap, TriplesMap,
};
pub use generator::{DEFAULT_BLANK_NODE_PREFIX, MappingGenerator};
