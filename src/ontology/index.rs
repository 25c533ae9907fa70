//! Ontology index used while generating mappings
//!
//! Only two facts are needed from an ontology: which properties are inverses
//! of each other (`owl:inverseOf`), and which XSD datatype a data property
//! declares as its range (`rdfs:range`). Everything else is ignored.

use crate::vocab::{OWL_INVERSE_OF, RDFS_RANGE, XSD_NS};
use oxigraph::io::{RdfFormat, RdfParser};
use oxigraph::model::{NamedOrBlankNode, Term, Triple};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OntologyError {
    #[error("failed to read ontology {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse ontology {path}: {message}")]
    Parse { path: String, message: String },

    #[error("unsupported ontology file extension: {0}")]
    UnsupportedFormat(String),
}

/// Inverse-property and datatype-range lookup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ontology {
    inverses: BTreeMap<String, String>,
    ranges: BTreeMap<String, String>,
}

impl Ontology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load an ontology file, guessing the syntax from its extension
    pub fn from_path(path: &Path) -> Result<Self, OntologyError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        let format = RdfFormat::from_extension(&extension)
            .ok_or_else(|| OntologyError::UnsupportedFormat(extension.clone()))?;
        let file = std::fs::File::open(path).map_err(|source| OntologyError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut ontology = Self::new();
        ontology.load(format, std::io::BufReader::new(file), &path.display().to_string())?;
        Ok(ontology)
    }

    pub fn from_turtle(turtle: &str) -> Result<Self, OntologyError> {
        let mut ontology = Self::new();
        ontology.load(RdfFormat::Turtle, turtle.as_bytes(), "<inline>")?;
        Ok(ontology)
    }

    /// Parse an RDF document and add its facts to this index
    pub fn load(
        &mut self,
        format: RdfFormat,
        reader: impl Read,
        origin: &str,
    ) -> Result<(), OntologyError> {
        let before = (self.inverses.len(), self.ranges.len());
        for quad in RdfParser::from_format(format).for_reader(reader) {
            let quad = quad.map_err(|e| OntologyError::Parse {
                path: origin.to_string(),
                message: e.to_string(),
            })?;
            self.add_triple(&Triple::from(quad));
        }
        tracing::debug!(
            origin,
            inverses = self.inverses.len() - before.0,
            ranges = self.ranges.len() - before.1,
            "ontology loaded"
        );
        Ok(())
    }

    fn add_triple(&mut self, triple: &Triple) {
        // Blank-node subjects carry nothing we use
        let NamedOrBlankNode::NamedNode(subject) = &triple.subject else {
            return;
        };
        let subject = subject.as_str();
        let Term::NamedNode(object) = &triple.object else {
            return;
        };
        match triple.predicate.as_str() {
            OWL_INVERSE_OF => {
                self.declare_inverse(subject, object.as_str());
            }
            RDFS_RANGE if object.as_str().starts_with(XSD_NS) => {
                self.declare_range(subject, object.as_str());
            }
            _ => {}
        }
    }

    /// Record `a owl:inverseOf b` (and therefore `b owl:inverseOf a`)
    pub fn declare_inverse(&mut self, a: &str, b: &str) -> &mut Self {
        self.inverses.entry(a.to_string()).or_insert_with(|| b.to_string());
        self.inverses.entry(b.to_string()).or_insert_with(|| a.to_string());
        self
    }

    pub fn declare_range(&mut self, property: &str, datatype: &str) -> &mut Self {
        self.ranges.insert(property.to_string(), datatype.to_string());
        self
    }

    pub fn inverse_of(&self, property: &str) -> Option<&str> {
        self.inverses.get(property).map(String::as_str)
    }

    /// XSD datatype declared as the range of a data property
    pub fn datatype_of(&self, property: &str) -> Option<&str> {
        self.ranges.get(property).map(String::as_str)
    }

    pub fn merge(&mut self, other: Ontology) {
        for (a, b) in other.inverses {
            self.inverses.entry(a).or_insert(b);
        }
        self.ranges.extend(other.ranges);
    }

    pub fn is_empty(&self) -> bool {
        self.inverses.is_empty() && self.ranges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: &str = r#"
@prefix owl: <http://www.w3.org/2002/07/owl#> .
@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
@prefix xsd: <http://www.w3.org/2001/XMLSchema#> .
@prefix org: <http://www.w3.org/ns/org#> .
@prefix ex: <http://example.org/> .

org:hasMember owl:inverseOf org:memberOf .
ex:age rdfs:range xsd:integer .
ex:employer rdfs:range org:Organization .
"#;

    #[test]
    fn test_inverse_is_symmetric() {
        let ontology = Ontology::from_turtle(TTL).unwrap();
        assert_eq!(
            ontology.inverse_of("http://www.w3.org/ns/org#memberOf"),
            Some("http://www.w3.org/ns/org#hasMember")
        );
        assert_eq!(
            ontology.inverse_of("http://www.w3.org/ns/org#hasMember"),
            Some("http://www.w3.org/ns/org#memberOf")
        );
    }

    #[test]
    fn test_only_xsd_ranges_are_datatypes() {
        let ontology = Ontology::from_turtle(TTL).unwrap();
        assert_eq!(
            ontology.datatype_of("http://example.org/age"),
            Some("http://www.w3.org/2001/XMLSchema#integer")
        );
        assert_eq!(ontology.datatype_of("http://example.org/employer"), None);
    }

    #[test]
    fn test_blank_node_subjects_are_ignored() {
        let ontology = Ontology::from_turtle(
            "_:p <http://www.w3.org/2002/07/owl#inverseOf> <http://example.org/q> .\n\
             [] <http://www.w3.org/2000/01/rdf-schema#range> <http://www.w3.org/2001/XMLSchema#date> .\n",
        )
        .unwrap();
        assert_eq!(ontology, Ontology::new());
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err = Ontology::from_turtle("this is not turtle").unwrap_err();
        assert!(matches!(err, OntologyError::Parse { .. }));
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let err = Ontology::from_path(Path::new("ontology.docx")).unwrap_err();
        assert!(matches!(err, OntologyError::UnsupportedFormat(ext) if ext == "docx"));
    }
}
