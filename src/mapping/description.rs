//! Declarative mapping structures
//!
//! A [`MappingDescription`] is the R2RML-shaped product of mapping generation:
//! one [`TriplesMap`] per class node of the alignment, each with a subject
//! map and an ordered list of predicate-object maps. It is immutable once
//! generated and can be rendered as R2RML Turtle for reuse outside this
//! pipeline.

use crate::error::SerializationError;
use crate::vocab::{KARMA, R2RML, RDF_TYPE, STANDARD_PREFIXES};
use oxigraph::io::{RdfFormat, RdfSerializer};
use oxigraph::model::{BlankNode, Literal, NamedNode, NamedOrBlankNode, Term, Triple};
use serde::Serialize;
use std::collections::BTreeMap;

/// How the subject of a triples map is produced for a row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SubjectMap {
    /// IRI built from `{column}` placeholders, values are percent-encoded
    Template {
        template: String,
        columns: Vec<String>,
    },
    /// The cell already holds the instance IRI (absolute, or relative to the
    /// source namespace)
    Column { column: String },
    /// A fresh blank node per row
    BlankNode,
}

impl SubjectMap {
    /// Columns whose values are required to build the subject
    pub fn referenced_columns(&self) -> Vec<&str> {
        match self {
            SubjectMap::Template { columns, .. } => columns.iter().map(String::as_str).collect(),
            SubjectMap::Column { column } => vec![column.as_str()],
            SubjectMap::BlankNode => Vec::new(),
        }
    }

    pub fn is_blank_node(&self) -> bool {
        matches!(self, SubjectMap::BlankNode)
    }
}

/// How the object of a predicate-object map is produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ObjectMap {
    /// Literal taken from a column value
    Column {
        column: String,
        datatype: Option<String>,
    },
    /// Literal constant from the alignment
    Constant {
        value: String,
        datatype: Option<String>,
    },
    /// The subject of another triples map for the same row
    #[serde(rename_all = "camelCase")]
    ParentTriplesMap { triples_map_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredicateObjectMap {
    pub predicate: String,
    pub object_map: ObjectMap,
    /// Emit `(object, predicate, subject)` instead of `(subject, predicate, object)`
    pub is_inverse: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriplesMap {
    pub id: String,
    /// Alignment node this map instantiates
    pub node_id: String,
    pub class_uri: String,
    pub subject_map: SubjectMap,
    pub predicate_object_maps: Vec<PredicateObjectMap>,
}

impl TriplesMap {
    /// Every worksheet column this map reads
    pub fn referenced_columns(&self) -> Vec<&str> {
        let mut columns = self.subject_map.referenced_columns();
        for pom in &self.predicate_object_maps {
            if let ObjectMap::Column { column, .. } = &pom.object_map {
                if !columns.contains(&column.as_str()) {
                    columns.push(column);
                }
            }
        }
        columns
    }
}

/// Non-fatal remark produced while generating a mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingWarning {
    pub column_id: Option<String>,
    pub message: String,
}

/// Complete mapping for one worksheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingDescription {
    pub triples_maps: Vec<TriplesMap>,
    /// Prefix name → namespace, used by serializers
    pub prefixes: BTreeMap<String, String>,
    pub source_prefix: String,
    pub source_namespace: String,
    /// Blank-node labels are this prefix followed by a counter
    pub blank_node_prefix: String,
    pub warnings: Vec<MappingWarning>,
}

impl MappingDescription {
    pub fn triples_map(&self, id: &str) -> Option<&TriplesMap> {
        self.triples_maps.iter().find(|m| m.id == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.triples_maps.iter().position(|m| m.id == id)
    }

    /// IRI naming a triples map in the rendered R2RML document
    pub fn triples_map_iri(&self, id: &str) -> String {
        format!("{}{}", self.source_namespace, id)
    }

    // ========================================================================
    // R2RML rendering
    // ========================================================================

    /// Express the mapping as R2RML triples.
    ///
    /// Blank nodes for subject/predicate-object/object maps are labeled from
    /// their position so identical mappings render identically.
    pub fn to_r2rml_triples(&self, table_name: &str) -> Vec<Triple> {
        let mut out = Vec::new();
        let rr = |local: &str| NamedNode::new_unchecked(local);
        let rdf_type = NamedNode::new_unchecked(RDF_TYPE);

        for (map_index, map) in self.triples_maps.iter().enumerate() {
            let map_node = NamedOrBlankNode::from(NamedNode::new_unchecked(
                self.triples_map_iri(&map.id),
            ));
            out.push(Triple::new(map_node.clone(), rdf_type.clone(), rr(R2RML::TRIPLES_MAP)));

            let table = BlankNode::new_unchecked(format!("lt{map_index}"));
            out.push(Triple::new(map_node.clone(), rr(R2RML::LOGICAL_TABLE), table.clone()));
            out.push(Triple::new(
                table,
                rr(R2RML::TABLE_NAME),
                Literal::new_simple_literal(table_name),
            ));

            let subject = BlankNode::new_unchecked(format!("sm{map_index}"));
            out.push(Triple::new(map_node.clone(), rr(R2RML::SUBJECT_MAP), subject.clone()));
            out.push(Triple::new(
                subject.clone(),
                rr(R2RML::CLASS),
                NamedNode::new_unchecked(map.class_uri.as_str()),
            ));
            match &map.subject_map {
                SubjectMap::Template { template, .. } => {
                    out.push(Triple::new(
                        subject.clone(),
                        rr(R2RML::TEMPLATE),
                        Literal::new_simple_literal(template),
                    ));
                }
                SubjectMap::Column { column } => {
                    out.push(Triple::new(
                        subject.clone(),
                        rr(R2RML::COLUMN),
                        Literal::new_simple_literal(column),
                    ));
                    out.push(Triple::new(subject.clone(), rr(R2RML::TERM_TYPE), rr(R2RML::IRI)));
                }
                SubjectMap::BlankNode => {
                    out.push(Triple::new(
                        subject.clone(),
                        rr(R2RML::TERM_TYPE),
                        rr(R2RML::BLANK_NODE),
                    ));
                    out.push(Triple::new(
                        subject,
                        rr(KARMA::BLANK_NODE_PREFIX),
                        Literal::new_simple_literal(&self.blank_node_prefix),
                    ));
                }
            }

            for (pom_index, pom) in map.predicate_object_maps.iter().enumerate() {
                let pom_node = BlankNode::new_unchecked(format!("pom{map_index}_{pom_index}"));
                let object = BlankNode::new_unchecked(format!("om{map_index}_{pom_index}"));
                out.push(Triple::new(
                    map_node.clone(),
                    rr(R2RML::PREDICATE_OBJECT_MAP),
                    pom_node.clone(),
                ));
                out.push(Triple::new(
                    pom_node.clone(),
                    rr(R2RML::PREDICATE),
                    NamedNode::new_unchecked(pom.predicate.as_str()),
                ));
                out.push(Triple::new(pom_node.clone(), rr(R2RML::OBJECT_MAP), object.clone()));
                if pom.is_inverse {
                    out.push(Triple::new(
                        pom_node,
                        rr(KARMA::IS_INVERSE),
                        Literal::from(true),
                    ));
                }
                match &pom.object_map {
                    ObjectMap::Column { column, datatype } => {
                        out.push(Triple::new(
                            object.clone(),
                            rr(R2RML::COLUMN),
                            Literal::new_simple_literal(column),
                        ));
                        if let Some(datatype) = datatype {
                            out.push(Triple::new(
                                object,
                                rr(R2RML::DATATYPE),
                                NamedNode::new_unchecked(datatype.as_str()),
                            ));
                        }
                    }
                    ObjectMap::Constant { value, datatype } => {
                        let literal = match datatype {
                            Some(datatype) => Literal::new_typed_literal(
                                value,
                                NamedNode::new_unchecked(datatype.as_str()),
                            ),
                            None => Literal::new_simple_literal(value),
                        };
                        out.push(Triple::new(object, rr(R2RML::CONSTANT), Term::from(literal)));
                    }
                    ObjectMap::ParentTriplesMap { triples_map_id } => {
                        out.push(Triple::new(
                            object,
                            rr(R2RML::PARENT_TRIPLES_MAP),
                            NamedNode::new_unchecked(self.triples_map_iri(triples_map_id)),
                        ));
                    }
                }
            }
        }
        out
    }

    /// Prefixes declared in R2RML output: the mapping's own plus `rr` and `km-dev`
    pub fn r2rml_prefixes(&self) -> BTreeMap<String, String> {
        let mut prefixes = self.prefixes.clone();
        prefixes.insert("rr".to_string(), R2RML::NS.to_string());
        prefixes.insert("km-dev".to_string(), KARMA::NS.to_string());
        prefixes
    }

    /// Render the mapping as an R2RML Turtle document
    pub fn to_r2rml_turtle(&self, table_name: &str) -> Result<String, SerializationError> {
        let encoding = |e: &dyn std::fmt::Display| SerializationError::Encoding {
            syntax: "Turtle",
            message: e.to_string(),
        };

        let mut serializer = RdfSerializer::from_format(RdfFormat::Turtle);
        for (name, iri) in &self.r2rml_prefixes() {
            serializer = serializer
                .with_prefix(name.as_str(), iri.as_str())
                .map_err(|e| encoding(&e))?;
        }

        let mut writer = serializer.for_writer(Vec::new());
        for triple in self.to_r2rml_triples(table_name) {
            writer.serialize_triple(&triple).map_err(|e| encoding(&e))?;
        }
        let bytes = writer.finish().map_err(|e| encoding(&e))?;
        String::from_utf8(bytes).map_err(|e| encoding(&e))
    }
}

/// Prefix table with the standard vocabularies plus the source prefix
pub(crate) fn prefix_table(source_prefix: &str, source_namespace: &str) -> BTreeMap<String, String> {
    let mut prefixes: BTreeMap<String, String> = STANDARD_PREFIXES
        .iter()
        .map(|(name, iri)| (name.to_string(), iri.to_string()))
        .collect();
    if !source_prefix.is_empty() {
        prefixes.insert(source_prefix.to_string(), source_namespace.to_string());
    }
    prefixes
}
