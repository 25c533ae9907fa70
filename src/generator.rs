//! Mapping execution: worksheet rows → RDF triples
//!
//! [`RdfGenerator::run`] returns a [`TripleStream`], a lazy iterator that
//! expands one row at a time. Rows are processed in order and every triples
//! map of the description is applied to each row. Failures on individual
//! cells are written to the run's [`ErrorReport`] and only the affected
//! triple (or, for subject failures, the affected `(row, map)` pair) is
//! dropped.
//!
//! The stream cannot be rewound. Blank-node labels restart when `run` is
//! called again, so they are only stable within one run.

use crate::error::MappingGenerationError;
use crate::mapping::{MappingDescription, ObjectMap, SubjectMap};
use crate::report::ErrorReport;
use crate::vocab::XSD_NS;
use crate::worksheet::WorksheetRow;
use once_cell::sync::Lazy;
use oxigraph::model::vocab::{rdf, xsd};
use oxigraph::model::{BlankNode, Literal, NamedNode, NamedOrBlankNode, Term, Triple};
use oxsdatatypes::{Boolean, Date, DateTime, Decimal, Double, Float, Integer};
use regex::Regex;
use std::borrow::Borrow;
use std::collections::VecDeque;
use std::fmt::Write as _;
use std::str::FromStr;

// ============================================================================
// Compiled mapping
// ============================================================================

#[derive(Debug, Clone)]
enum CompiledObject {
    Column {
        column: String,
        datatype: Option<NamedNode>,
    },
    Constant(Term),
    /// Index of the parent triples map
    Parent(usize),
}

#[derive(Debug, Clone)]
struct CompiledPom {
    predicate: NamedNode,
    object: CompiledObject,
    is_inverse: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TemplatePart {
    Text(String),
    Column(String),
}

#[derive(Debug, Clone)]
enum CompiledSubject {
    Template {
        template: String,
        parts: Vec<TemplatePart>,
    },
    Column(String),
    BlankNode,
}

#[derive(Debug, Clone)]
struct CompiledMap {
    class: NamedNode,
    subject: CompiledSubject,
    poms: Vec<CompiledPom>,
    /// Columns read by literal object maps
    data_columns: Vec<String>,
    /// Triples maps referenced as objects
    children: Vec<usize>,
}

impl CompiledMap {
    fn is_blank_node(&self) -> bool {
        matches!(self.subject, CompiledSubject::BlankNode)
    }
}

/// Executes a [`MappingDescription`] against worksheet rows
#[derive(Debug, Clone)]
pub struct RdfGenerator {
    maps: Vec<CompiledMap>,
    namespace: String,
    blank_node_prefix: String,
}

impl RdfGenerator {
    /// Resolve every IRI of the description once, up front
    pub fn new(mapping: &MappingDescription) -> Result<Self, MappingGenerationError> {
        BlankNode::new(format!("{}1", mapping.blank_node_prefix)).map_err(|e| {
            MappingGenerationError::InvalidIri {
                iri: format!("_:{}", mapping.blank_node_prefix),
                reason: e.to_string(),
            }
        })?;

        let mut maps = Vec::with_capacity(mapping.triples_maps.len());
        for map in &mapping.triples_maps {
            let mut poms = Vec::with_capacity(map.predicate_object_maps.len());
            for pom in &map.predicate_object_maps {
                let object = match &pom.object_map {
                    ObjectMap::Column { column, datatype } => CompiledObject::Column {
                        column: column.clone(),
                        datatype: datatype.as_deref().map(named_node).transpose()?,
                    },
                    ObjectMap::Constant { value, datatype } => {
                        let literal = match datatype {
                            Some(datatype) => typed_literal(value, &named_node(datatype)?)
                                .map_err(|reason| MappingGenerationError::InvalidIri {
                                    iri: datatype.clone(),
                                    reason,
                                })?,
                            None => Literal::new_simple_literal(value),
                        };
                        CompiledObject::Constant(literal.into())
                    }
                    ObjectMap::ParentTriplesMap { triples_map_id } => {
                        let index = mapping.position(triples_map_id).ok_or_else(|| {
                            MappingGenerationError::DanglingEdge {
                                source_id: map.id.clone(),
                                target_id: triples_map_id.clone(),
                                missing: triples_map_id.clone(),
                            }
                        })?;
                        CompiledObject::Parent(index)
                    }
                };
                poms.push(CompiledPom {
                    predicate: named_node(&pom.predicate)?,
                    object,
                    is_inverse: pom.is_inverse,
                });
            }
            let subject = match &map.subject_map {
                SubjectMap::Template { template, .. } => CompiledSubject::Template {
                    template: template.clone(),
                    parts: parse_template(template)?,
                },
                SubjectMap::Column { column } => CompiledSubject::Column(column.clone()),
                SubjectMap::BlankNode => CompiledSubject::BlankNode,
            };
            let mut data_columns = Vec::new();
            let mut children = Vec::new();
            for pom in &poms {
                match &pom.object {
                    CompiledObject::Column { column, .. } if !data_columns.contains(column) => {
                        data_columns.push(column.clone());
                    }
                    CompiledObject::Parent(index) if !children.contains(index) => {
                        children.push(*index);
                    }
                    _ => {}
                }
            }
            maps.push(CompiledMap {
                class: named_node(&map.class_uri)?,
                subject,
                poms,
                data_columns,
                children,
            });
        }

        Ok(Self {
            maps,
            namespace: mapping.source_namespace.clone(),
            blank_node_prefix: mapping.blank_node_prefix.clone(),
        })
    }

    /// Which blank-node maps have an instance for `row`.
    ///
    /// A blank-node map exists when one of its literal columns holds a value,
    /// or when it links to a map that exists. A map that reads no columns and
    /// links to nothing always exists.
    fn blank_nodes_present(&self, row: &WorksheetRow, subjects: &[Option<NamedOrBlankNode>]) -> Vec<bool> {
        let mut present: Vec<bool> = self
            .maps
            .iter()
            .map(|map| {
                map.is_blank_node()
                    && ((map.data_columns.is_empty() && map.children.is_empty())
                        || map
                            .data_columns
                            .iter()
                            .any(|column| row.get(column).is_some_and(|v| !v.trim().is_empty())))
            })
            .collect();

        loop {
            let mut changed = false;
            for (index, map) in self.maps.iter().enumerate() {
                if present[index] || !map.is_blank_node() {
                    continue;
                }
                if map
                    .children
                    .iter()
                    .any(|&child| present[child] || subjects[child].is_some())
                {
                    present[index] = true;
                    changed = true;
                }
            }
            if !changed {
                return present;
            }
        }
    }

    /// Start a new pass over `rows`.
    ///
    /// Nothing is computed until the returned stream is iterated.
    pub fn run<'g, 'r, I>(
        &'g self,
        rows: I,
        report: &'r mut ErrorReport,
    ) -> TripleStream<'g, 'r, I::IntoIter>
    where
        I: IntoIterator,
        I::Item: Borrow<WorksheetRow>,
    {
        TripleStream {
            generator: self,
            rows: rows.into_iter(),
            report,
            buffer: VecDeque::new(),
            next_blank: 1,
            rows_seen: 0,
            triples_emitted: 0,
        }
    }
}

// ============================================================================
// Triple stream
// ============================================================================

/// Lazy, finite, single-pass sequence of generated triples
pub struct TripleStream<'g, 'r, I> {
    generator: &'g RdfGenerator,
    rows: I,
    report: &'r mut ErrorReport,
    buffer: VecDeque<Triple>,
    next_blank: u64,
    rows_seen: usize,
    triples_emitted: usize,
}

impl<I> TripleStream<'_, '_, I> {
    pub fn rows_seen(&self) -> usize {
        self.rows_seen
    }

    pub fn triples_emitted(&self) -> usize {
        self.triples_emitted
    }

    fn allocate_blank(&mut self) -> BlankNode {
        let label = format!("{}{}", self.generator.blank_node_prefix, self.next_blank);
        self.next_blank += 1;
        BlankNode::new_unchecked(label)
    }

    fn expand_row(&mut self, row: &WorksheetRow) {
        let generator = self.generator;

        // Subjects first so parent maps can be referenced in any order
        let mut subjects: Vec<Option<NamedOrBlankNode>> = Vec::with_capacity(generator.maps.len());
        for map in &generator.maps {
            let subject: Option<NamedOrBlankNode> = match &map.subject {
                CompiledSubject::BlankNode => None,
                CompiledSubject::Template { template, parts } => match expand_template(parts, row) {
                    Ok(iri) => match NamedNode::new(iri.as_str()) {
                        Ok(node) => Some(node.into()),
                        Err(e) => {
                            self.report.row_error(
                                row.index,
                                template.clone(),
                                format!("subject IRI {iri} is invalid: {e}"),
                            );
                            None
                        }
                    },
                    Err(failure) => {
                        self.report.row_error(row.index, failure.column, failure.message);
                        None
                    }
                },
                CompiledSubject::Column(column) => match row.get(column).map(str::trim) {
                    None => {
                        self.report
                            .row_error(row.index, column.clone(), "column not present in worksheet");
                        None
                    }
                    Some("") => {
                        self.report
                            .row_error(row.index, column.clone(), "subject column is empty");
                        None
                    }
                    Some(value) => match resolve_iri(value, &generator.namespace) {
                        Ok(node) => Some(node.into()),
                        Err(e) => {
                            self.report.row_error(
                                row.index,
                                column.clone(),
                                format!("value {value:?} is not a valid IRI: {e}"),
                            );
                            None
                        }
                    },
                },
            };
            subjects.push(subject);
        }

        // Blank nodes are labelled in map order, and only for maps with data in this row
        let present = generator.blank_nodes_present(row, &subjects);
        for (index, map) in generator.maps.iter().enumerate() {
            if !map.is_blank_node() {
                continue;
            }
            if present[index] {
                subjects[index] = Some(self.allocate_blank().into());
            } else {
                for column in &map.data_columns {
                    if row.get(column).is_none() {
                        self.report
                            .row_error(row.index, column.clone(), "column not present in worksheet");
                    }
                }
            }
        }

        for (map, subject) in generator.maps.iter().zip(&subjects) {
            let Some(subject) = subject else {
                continue;
            };
            self.buffer.push_back(Triple::new(
                subject.clone(),
                rdf::TYPE.into_owned(),
                map.class.clone(),
            ));

            for pom in &map.poms {
                let object: Term = match &pom.object {
                    CompiledObject::Column { column, datatype } => match row.get(column) {
                        None => {
                            self.report.row_error(
                                row.index,
                                column.clone(),
                                "column not present in worksheet",
                            );
                            continue;
                        }
                        Some(value) if value.trim().is_empty() => continue,
                        Some(value) => match datatype {
                            None => Literal::new_simple_literal(value).into(),
                            Some(datatype) => match typed_literal(value.trim(), datatype) {
                                Ok(literal) => literal.into(),
                                Err(reason) => {
                                    self.report.row_error(row.index, column.clone(), reason);
                                    continue;
                                }
                            },
                        },
                    },
                    CompiledObject::Constant(term) => term.clone(),
                    CompiledObject::Parent(index) => match subjects.get(*index) {
                        Some(Some(parent)) => parent.clone().into(),
                        // The parent's failure has already been reported
                        _ => continue,
                    },
                };

                if pom.is_inverse {
                    let reversed = match object {
                        Term::NamedNode(node) => NamedOrBlankNode::from(node),
                        Term::BlankNode(node) => NamedOrBlankNode::from(node),
                        _ => continue,
                    };
                    self.buffer.push_back(Triple::new(
                        reversed,
                        pom.predicate.clone(),
                        subject.clone(),
                    ));
                } else {
                    self.buffer
                        .push_back(Triple::new(subject.clone(), pom.predicate.clone(), object));
                }
            }
        }
    }
}

impl<I> Iterator for TripleStream<'_, '_, I>
where
    I: Iterator,
    I::Item: Borrow<WorksheetRow>,
{
    type Item = Triple;

    fn next(&mut self) -> Option<Triple> {
        loop {
            if let Some(triple) = self.buffer.pop_front() {
                self.triples_emitted += 1;
                return Some(triple);
            }
            let row = self.rows.next()?;
            self.rows_seen += 1;
            self.expand_row(row.borrow());
        }
    }
}

// ============================================================================
// Term helpers
// ============================================================================

struct TemplateFailure {
    column: String,
    message: String,
}

/// Split an R2RML string template into literal text and `{column}`
/// references. Braces and backslashes inside a column name are escaped with
/// a backslash.
fn parse_template(template: &str) -> Result<Vec<TemplatePart>, MappingGenerationError> {
    static PLACEHOLDER_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\{((?:\\.|[^\\{}])+)\}").expect("valid regex"));

    let invalid = |reason: &str| MappingGenerationError::InvalidIri {
        iri: template.to_string(),
        reason: reason.to_string(),
    };
    let text = |segment: &str| -> Result<TemplatePart, MappingGenerationError> {
        if segment.contains(['{', '}', '\\']) {
            return Err(invalid("unbalanced braces in subject template"));
        }
        Ok(TemplatePart::Text(segment.to_string()))
    };

    let mut parts = Vec::new();
    let mut last = 0;
    for caps in PLACEHOLDER_RE.captures_iter(template) {
        let (Some(whole), Some(column)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > last {
            parts.push(text(&template[last..whole.start()])?);
        }
        parts.push(TemplatePart::Column(unescape_template_column(column.as_str())));
        last = whole.end();
    }
    if last < template.len() {
        parts.push(text(&template[last..])?);
    }
    Ok(parts)
}

fn unescape_template_column(escaped: &str) -> String {
    let mut column = String::with_capacity(escaped.len());
    let mut chars = escaped.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => column.extend(chars.next()),
            c => column.push(c),
        }
    }
    column
}

/// Substitute column references with percent-encoded row values
fn expand_template(parts: &[TemplatePart], row: &WorksheetRow) -> Result<String, TemplateFailure> {
    let mut result = String::new();
    for part in parts {
        let column = match part {
            TemplatePart::Text(text) => {
                result.push_str(text);
                continue;
            }
            TemplatePart::Column(column) => column,
        };
        match row.get(column).map(str::trim) {
            None => {
                return Err(TemplateFailure {
                    column: column.clone(),
                    message: "subject column not present in worksheet".to_string(),
                });
            }
            Some("") => {
                return Err(TemplateFailure {
                    column: column.clone(),
                    message: "subject column is empty".to_string(),
                });
            }
            Some(value) => result.push_str(&iri_escape(value)),
        }
    }
    Ok(result)
}

/// Percent-encode a value for use inside an IRI path segment
pub fn iri_escape(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '.' | '_' | '~' => result.push(c),
            '!' | '$' | '&' | '\'' | '(' | ')' | '*' | '+' | ',' | ';' | '=' | ':' | '@' => {
                result.push(c)
            }
            _ => {
                let mut buf = [0u8; 4];
                for byte in c.encode_utf8(&mut buf).as_bytes() {
                    let _ = write!(result, "%{byte:02X}");
                }
            }
        }
    }
    result
}

/// Absolute IRIs are kept, anything else is resolved against `namespace`
fn resolve_iri(value: &str, namespace: &str) -> Result<NamedNode, String> {
    let has_scheme = value
        .split_once(':')
        .is_some_and(|(scheme, _)| {
            !scheme.is_empty()
                && scheme.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        });
    let iri = if has_scheme {
        value.to_string()
    } else {
        format!("{namespace}{}", iri_escape(value))
    };
    NamedNode::new(iri).map_err(|e| e.to_string())
}

fn named_node(iri: &str) -> Result<NamedNode, MappingGenerationError> {
    NamedNode::new(iri).map_err(|e| MappingGenerationError::InvalidIri {
        iri: iri.to_string(),
        reason: e.to_string(),
    })
}

/// Build a typed literal, validating and canonicalizing the XSD types we
/// know about. Unknown datatypes pass through verbatim.
pub fn typed_literal(value: &str, datatype: &NamedNode) -> Result<Literal, String> {
    let invalid = |e: &dyn std::fmt::Display| {
        format!(
            "value {value:?} is not a valid xsd:{}: {e}",
            datatype.as_str().trim_start_matches(XSD_NS)
        )
    };

    let canonical = match datatype.as_ref() {
        d if d == xsd::INTEGER => Integer::from_str(value).map_err(|e| invalid(&e))?.to_string(),
        d if d == xsd::INT => bounded(value, i64::from(i32::MIN), i64::from(i32::MAX))
            .map_err(|e| invalid(&e))?,
        d if d == xsd::LONG => bounded(value, i64::MIN, i64::MAX).map_err(|e| invalid(&e))?,
        d if d == xsd::SHORT => bounded(value, i64::from(i16::MIN), i64::from(i16::MAX))
            .map_err(|e| invalid(&e))?,
        d if d == xsd::DECIMAL => Decimal::from_str(value).map_err(|e| invalid(&e))?.to_string(),
        d if d == xsd::DOUBLE => Double::from_str(value).map_err(|e| invalid(&e))?.to_string(),
        d if d == xsd::FLOAT => Float::from_str(value).map_err(|e| invalid(&e))?.to_string(),
        d if d == xsd::BOOLEAN => Boolean::from_str(value).map_err(|e| invalid(&e))?.to_string(),
        d if d == xsd::DATE => Date::from_str(value).map_err(|e| invalid(&e))?.to_string(),
        d if d == xsd::DATE_TIME => {
            DateTime::from_str(value).map_err(|e| invalid(&e))?.to_string()
        }
        d if d == xsd::STRING => return Ok(Literal::new_simple_literal(value)),
        _ => value.to_string(),
    };
    Ok(Literal::new_typed_literal(canonical, datatype.clone()))
}

fn bounded(value: &str, min: i64, max: i64) -> Result<String, String> {
    let integer = Integer::from_str(value).map_err(|e| e.to_string())?;
    let n = i64::from(integer);
    if n < min || n > max {
        return Err(format!("{n} is out of range"));
    }
    Ok(n.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::{AlignmentModel, SemanticType, SemanticTypes};
    use crate::mapping::MappingGenerator;
    use crate::ontology::Ontology;
    use crate::vocab::RDFS_LABEL;
    use crate::worksheet::Worksheet;

    const FOAF: &str = "http://xmlns.com/foaf/0.1/";
    const ORG: &str = "http://www.w3.org/ns/org#";
    const NS: &str = "http://isi.edu/data/";

    fn mapping(ontology: &Ontology, key: bool, inverse: bool) -> MappingDescription {
        let mut model = AlignmentModel::new();
        model
            .add_class("n1", format!("{FOAF}Person"))
            .add_class("n2", format!("{ORG}Organization"))
            .add_column("c1", "name")
            .add_column("c2", "worksOrg")
            .add_column("c3", "age")
            .data_property("n1", "c1", format!("{FOAF}name"))
            .data_property("n1", "c3", format!("{FOAF}age"))
            .object_property("n1", "n2", format!("{ORG}memberOf"))
            .data_property("n2", "c2", RDFS_LABEL);
        let mut name = SemanticType::new("name", format!("{FOAF}Person"), format!("{FOAF}name"));
        if key {
            name = name.key();
        }
        let types = SemanticTypes::new(vec![
            name,
            SemanticType::new("worksOrg", format!("{ORG}Organization"), RDFS_LABEL),
            SemanticType::new("age", format!("{FOAF}Person"), format!("{FOAF}age")),
        ]);
        MappingGenerator::new(ontology)
            .generate(&model, &types, "isi", NS, inverse)
            .unwrap()
    }

    fn typed_ontology() -> Ontology {
        let mut ontology = Ontology::new();
        ontology
            .declare_range(&format!("{FOAF}age"), xsd::INTEGER.as_str())
            .declare_inverse(&format!("{ORG}memberOf"), &format!("{ORG}hasMember"));
        ontology
    }

    fn rows(records: Vec<Vec<&str>>) -> Worksheet {
        Worksheet::from_records(
            "WS1",
            "Persons",
            vec!["name".into(), "worksOrg".into(), "age".into()],
            records
                .into_iter()
                .map(|r| r.into_iter().map(str::to_string).collect())
                .collect(),
        )
    }

    fn rendered(triples: &[Triple]) -> Vec<String> {
        triples.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_blank_nodes_link_person_to_organization() {
        let ontology = Ontology::new();
        let generator = RdfGenerator::new(&mapping(&ontology, false, false)).unwrap();
        let sheet = rows(vec![vec!["Alice", "ISI", ""]]);
        let mut report = ErrorReport::new();
        let triples: Vec<Triple> = generator.run(&sheet.rows, &mut report).collect();
        let out = rendered(&triples);

        assert!(out.contains(&format!("_:b1 <{FOAF}name> \"Alice\"")));
        assert!(out.contains(&format!("_:b1 <{ORG}memberOf> _:b2")));
        assert!(out.contains(&format!("_:b2 <{}> <{ORG}Organization>", rdf::TYPE.as_str())));
        assert!(out.contains(&format!("_:b2 <{RDFS_LABEL}> \"ISI\"")));
        assert_eq!(triples.len(), 5);
        assert!(report.is_empty());
    }

    #[test]
    fn test_invalid_integer_skips_only_that_triple() {
        let ontology = typed_ontology();
        let generator = RdfGenerator::new(&mapping(&ontology, false, false)).unwrap();
        let sheet = rows(vec![vec!["Alice", "ISI", "forty"], vec!["Bob", "USC", " 042 "]]);
        let mut report = ErrorReport::new();
        let triples: Vec<Triple> = generator.run(&sheet.rows, &mut report).collect();
        let out = rendered(&triples);

        assert_eq!(report.len(), 1);
        let entry = &report.entries()[0];
        assert_eq!(entry.row_index, Some(0));
        assert_eq!(entry.column_id.as_deref(), Some("age"));
        assert!(out.contains(&format!("_:b1 <{FOAF}name> \"Alice\"")));
        assert!(out.contains(&format!("_:b1 <{ORG}memberOf> _:b2")));
        assert!(out.contains(&format!(
            "_:b3 <{FOAF}age> \"42\"^^<{}>",
            xsd::INTEGER.as_str()
        )));
    }

    #[test]
    fn test_missing_key_column_drops_the_map_for_that_row() {
        let ontology = Ontology::new();
        let generator = RdfGenerator::new(&mapping(&ontology, true, false)).unwrap();
        let sheet = rows(vec![vec!["", "ISI", ""], vec!["Bob Smith", "USC", ""]]);
        let mut report = ErrorReport::new();
        let triples: Vec<Triple> = generator.run(&sheet.rows, &mut report).collect();
        let out = rendered(&triples);

        assert_eq!(report.len(), 1);
        assert_eq!(report.entries()[0].column_id.as_deref(), Some("name"));
        assert!(!out.iter().any(|t| t.contains("memberOf> _:b1")));
        assert!(out.contains(&format!("<{NS}Person/Bob%20Smith> <{ORG}memberOf> _:b2")));
    }

    #[test]
    fn test_empty_cells_create_no_blank_node() {
        let ontology = Ontology::new();
        let generator = RdfGenerator::new(&mapping(&ontology, false, false)).unwrap();
        let sheet = rows(vec![vec!["", "", ""], vec!["Alice", "", ""]]);
        let mut report = ErrorReport::new();
        let triples: Vec<Triple> = generator.run(&sheet.rows, &mut report).collect();
        let out = rendered(&triples);

        // row 0 has nothing, row 1 only a person without organization
        assert_eq!(
            out,
            vec![
                format!("_:b1 <{}> <{FOAF}Person>", rdf::TYPE.as_str()),
                format!("_:b1 <{FOAF}name> \"Alice\""),
            ]
        );
        assert!(report.is_empty());
    }

    #[test]
    fn test_blank_node_without_literals_exists_through_its_children() {
        let mut model = AlignmentModel::new();
        model
            .add_class("n1", format!("{FOAF}Person"))
            .add_class("n2", format!("{ORG}Organization"))
            .add_column("c2", "worksOrg")
            .object_property("n1", "n2", format!("{ORG}memberOf"))
            .data_property("n2", "c2", RDFS_LABEL);
        let types = SemanticTypes::new(vec![SemanticType::new(
            "worksOrg",
            format!("{ORG}Organization"),
            RDFS_LABEL,
        )]);
        let ontology = Ontology::new();
        let mapping = MappingGenerator::new(&ontology)
            .generate(&model, &types, "isi", NS, false)
            .unwrap();
        let generator = RdfGenerator::new(&mapping).unwrap();
        let sheet = Worksheet::from_records(
            "WS1",
            "Persons",
            vec!["worksOrg".into()],
            vec![vec!["ISI".into()], vec!["".into()]],
        );
        let mut report = ErrorReport::new();
        let out = rendered(&generator.run(&sheet.rows, &mut report).collect::<Vec<_>>());

        assert_eq!(out.len(), 4);
        assert!(out.contains(&format!("_:b1 <{ORG}memberOf> _:b2")));
    }

    #[test]
    fn test_brace_in_key_header_resolves_the_column() {
        let mut model = AlignmentModel::new();
        model
            .add_class("n1", format!("{FOAF}Person"))
            .add_column("c1", "id{x}")
            .data_property("n1", "c1", format!("{FOAF}account"));
        let types = SemanticTypes::new(vec![
            SemanticType::new("id{x}", format!("{FOAF}Person"), format!("{FOAF}account")).key(),
        ]);
        let ontology = Ontology::new();
        let mapping = MappingGenerator::new(&ontology)
            .generate(&model, &types, "isi", NS, false)
            .unwrap();
        let generator = RdfGenerator::new(&mapping).unwrap();
        let sheet = Worksheet::from_records(
            "WS1",
            "Persons",
            vec!["id{x}".into()],
            vec![vec!["a1".into()]],
        );
        let mut report = ErrorReport::new();
        let out = rendered(&generator.run(&sheet.rows, &mut report).collect::<Vec<_>>());

        assert!(report.is_empty(), "{report:?}");
        assert!(out.contains(&format!("<{NS}Person/a1> <{FOAF}account> \"a1\"")));
    }

    #[test]
    fn test_template_parsing_unescapes_columns() {
        assert_eq!(
            parse_template(r"http://ex.org/P/{a\{b\}}/{c\\d}").unwrap(),
            vec![
                TemplatePart::Text("http://ex.org/P/".into()),
                TemplatePart::Column("a{b}".into()),
                TemplatePart::Text("/".into()),
                TemplatePart::Column(r"c\d".into()),
            ]
        );
        assert!(parse_template("http://ex.org/P/{a").is_err());
    }

    #[test]
    fn test_inverse_triples_point_back() {
        let ontology = typed_ontology();
        let generator = RdfGenerator::new(&mapping(&ontology, false, true)).unwrap();
        let sheet = rows(vec![vec!["Alice", "ISI", "1"]]);
        let mut report = ErrorReport::new();
        let out = rendered(&generator.run(&sheet.rows, &mut report).collect::<Vec<_>>());

        assert!(out.contains(&format!("_:b1 <{ORG}memberOf> _:b2")));
        assert!(out.contains(&format!("_:b2 <{ORG}hasMember> _:b1")));
    }

    #[test]
    fn test_unknown_column_is_reported() {
        let ontology = Ontology::new();
        let generator = RdfGenerator::new(&mapping(&ontology, false, false)).unwrap();
        let sheet = Worksheet::from_records(
            "WS1",
            "Persons",
            vec!["name".into(), "worksOrg".into()],
            vec![vec!["Alice".into(), "ISI".into()]],
        );
        let mut report = ErrorReport::new();
        let count = generator.run(&sheet.rows, &mut report).count();

        assert_eq!(count, 5);
        assert_eq!(report.len(), 1);
        assert_eq!(report.entries()[0].column_id.as_deref(), Some("age"));
    }

    #[test]
    fn test_rerun_restarts_blank_labels() {
        let ontology = Ontology::new();
        let generator = RdfGenerator::new(&mapping(&ontology, false, false)).unwrap();
        let sheet = rows(vec![vec!["Alice", "ISI", ""]]);
        let mut report = ErrorReport::new();
        let first: Vec<Triple> = generator.run(&sheet.rows, &mut report).collect();
        let second: Vec<Triple> = generator.run(&sheet.rows, &mut report).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_stream_is_lazy() {
        let ontology = Ontology::new();
        let generator = RdfGenerator::new(&mapping(&ontology, false, false)).unwrap();
        let sheet = rows(vec![vec!["Alice", "ISI", ""], vec!["Bob", "USC", ""]]);
        let mut report = ErrorReport::new();
        let mut stream = generator.run(&sheet.rows, &mut report);
        assert_eq!(stream.rows_seen(), 0);
        stream.next();
        assert_eq!(stream.rows_seen(), 1);
    }

    #[test]
    fn test_iri_escape() {
        assert_eq!(iri_escape("Bob Smith"), "Bob%20Smith");
        assert_eq!(iri_escape("a/b"), "a%2Fb");
        assert_eq!(iri_escape("é"), "%C3%A9");
        assert_eq!(iri_escape("x:y@z"), "x:y@z");
    }

    #[test]
    fn test_typed_literal_canonical_forms() {
        let lit = typed_literal("true", &xsd::BOOLEAN.into_owned()).unwrap();
        assert_eq!(lit.value(), "true");
        let lit = typed_literal("1.50", &xsd::DECIMAL.into_owned()).unwrap();
        assert_eq!(lit.value(), "1.5");
        assert!(typed_literal("70000", &xsd::SHORT.into_owned()).is_err());
        assert!(typed_literal("2024-13-01", &xsd::DATE.into_owned()).is_err());
        let custom = NamedNode::new("http://example.org/dt").unwrap();
        assert_eq!(typed_literal("x", &custom).unwrap().value(), "x");
    }
}
