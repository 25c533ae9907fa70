//! Ontology facts consulted by the mapping generator
//!
//! ```rust,ignore
//! use worksheet_rdf::ontology::Ontology;
//!
//! let ontology = Ontology::from_path("ontology/org.ttl".as_ref())?;
//! assert_eq!(
//!     ontology.inverse_of("http://www.w3.org/ns/org#memberOf"),
//!     Some("http://www.w3.org/ns/org#hasMember"),
//! );
//! ```

pub mod index;

pub use index::{Ontology, OntologyError};
