//! Vocabulary constants used by mapping generation and materialization
//!
//! Only the terms the pipeline actually emits or reads are listed here;
//! anything else in an ontology is passed through untouched.

/// R2RML vocabulary (https://www.w3.org/TR/r2rml/)
pub struct R2RML;

impl R2RML {
    // ==========================================================================
    // Namespace
    // ==========================================================================

    /// R2RML namespace IRI
    pub const NS: &'static str = "http://www.w3.org/ns/r2rml#";

    // ==========================================================================
    // Classes
    // ==========================================================================

    /// rr:TriplesMap
    pub const TRIPLES_MAP: &'static str = "http://www.w3.org/ns/r2rml#TriplesMap";

    // ==========================================================================
    // Properties
    // ==========================================================================

    pub const LOGICAL_TABLE: &'static str = "http://www.w3.org/ns/r2rml#logicalTable";
    pub const TABLE_NAME: &'static str = "http://www.w3.org/ns/r2rml#tableName";
    pub const SUBJECT_MAP: &'static str = "http://www.w3.org/ns/r2rml#subjectMap";
    pub const PREDICATE_OBJECT_MAP: &'static str =
        "http://www.w3.org/ns/r2rml#predicateObjectMap";
    pub const PREDICATE: &'static str = "http://www.w3.org/ns/r2rml#predicate";
    pub const OBJECT_MAP: &'static str = "http://www.w3.org/ns/r2rml#objectMap";
    pub const TEMPLATE: &'static str = "http://www.w3.org/ns/r2rml#template";
    pub const COLUMN: &'static str = "http://www.w3.org/ns/r2rml#column";
    pub const CONSTANT: &'static str = "http://www.w3.org/ns/r2rml#constant";
    pub const CLASS: &'static str = "http://www.w3.org/ns/r2rml#class";
    pub const TERM_TYPE: &'static str = "http://www.w3.org/ns/r2rml#termType";
    pub const DATATYPE: &'static str = "http://www.w3.org/ns/r2rml#datatype";
    pub const PARENT_TRIPLES_MAP: &'static str = "http://www.w3.org/ns/r2rml#parentTriplesMap";

    // ==========================================================================
    // Term types
    // ==========================================================================

    pub const IRI: &'static str = "http://www.w3.org/ns/r2rml#IRI";
    pub const BLANK_NODE: &'static str = "http://www.w3.org/ns/r2rml#BlankNode";
    pub const LITERAL: &'static str = "http://www.w3.org/ns/r2rml#Literal";
}

/// Karma extensions to R2RML used to describe inverse predicate maps and
/// the blank-node naming strategy of a mapping.
pub struct KARMA;

impl KARMA {
    pub const NS: &'static str = "http://isi.edu/integration/karma/dev#";

    /// Marks a predicate-object map whose triples are emitted object → subject
    pub const IS_INVERSE: &'static str = "http://isi.edu/integration/karma/dev#isInverse";

    /// Prefix used to label blank nodes produced by a mapping
    pub const BLANK_NODE_PREFIX: &'static str =
        "http://isi.edu/integration/karma/dev#blankNodePrefix";

    /// Pseudo-property a semantic type uses to say "this column holds the
    /// IRI of the class instance"
    pub const CLASS_LINK: &'static str = "http://isi.edu/integration/karma/dev#classLink";
}

pub const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const RDFS_NS: &str = "http://www.w3.org/2000/01/rdf-schema#";
pub const OWL_NS: &str = "http://www.w3.org/2002/07/owl#";
pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema#";

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const RDFS_RANGE: &str = "http://www.w3.org/2000/01/rdf-schema#range";
pub const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
pub const OWL_INVERSE_OF: &str = "http://www.w3.org/2002/07/owl#inverseOf";

/// Prefixes every generated document declares, in declaration order.
pub const STANDARD_PREFIXES: &[(&str, &str)] = &[
    ("rdf", RDF_NS),
    ("rdfs", RDFS_NS),
    ("owl", OWL_NS),
    ("xsd", XSD_NS),
];

/// Return the local name of an IRI (the part after the last `#` or `/`).
pub fn local_name(iri: &str) -> &str {
    iri.rsplit(['#', '/']).next().filter(|s| !s.is_empty()).unwrap_or(iri)
}
