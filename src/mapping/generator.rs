//! Alignment → mapping description

use super::description::{
    MappingDescription, MappingWarning, ObjectMap, PredicateObjectMap, SubjectMap, TriplesMap,
    prefix_table,
};
use crate::alignment::{AlignmentModel, EdgeKind, Node, NodeKind, SemanticTypes};
use crate::error::MappingGenerationError;
use crate::ontology::Ontology;
use crate::vocab::local_name;
use oxigraph::model::NamedNode;
use std::collections::{BTreeMap, BTreeSet};

/// Default label prefix for generated blank nodes
pub const DEFAULT_BLANK_NODE_PREFIX: &str = "b";

/// Turns an alignment into a [`MappingDescription`]
pub struct MappingGenerator<'a> {
    ontology: &'a Ontology,
    blank_node_prefix: String,
}

impl<'a> MappingGenerator<'a> {
    pub fn new(ontology: &'a Ontology) -> Self {
        Self {
            ontology,
            blank_node_prefix: DEFAULT_BLANK_NODE_PREFIX.to_string(),
        }
    }

    pub fn with_blank_node_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.blank_node_prefix = prefix.into();
        self
    }

    /// Build the mapping for one worksheet.
    ///
    /// Class nodes are visited depth-first from the roots (in id order),
    /// children in `(property, target)` order, so the same alignment always
    /// yields the same description.
    pub fn generate(
        &self,
        alignment: &AlignmentModel,
        semantic_types: &SemanticTypes,
        source_prefix: &str,
        source_namespace: &str,
        add_inverse_properties: bool,
    ) -> Result<MappingDescription, MappingGenerationError> {
        alignment.validate(semantic_types)?;
        check_iri(source_namespace)?;
        if self.blank_node_prefix.is_empty()
            || !self
                .blank_node_prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(MappingGenerationError::InvalidIri {
                iri: format!("_:{}", self.blank_node_prefix),
                reason: "blank node prefix must be alphanumeric".to_string(),
            });
        }

        let order = traversal_order(alignment);
        let map_ids: BTreeMap<&str, String> = order
            .iter()
            .map(|node| (node.id.as_str(), triples_map_id(&node.id)))
            .collect();

        let mut warnings = Vec::new();
        let mut triples_maps = Vec::with_capacity(order.len());

        for node in &order {
            let NodeKind::Class { uri } = &node.kind else {
                continue;
            };
            check_iri(uri)?;

            let subject_map =
                self.subject_map(alignment, semantic_types, node, uri, source_namespace);
            let mut predicate_object_maps = Vec::new();

            for edge in alignment.outgoing(&node.id) {
                if edge.kind == EdgeKind::ClassInstance {
                    // Already consumed by the subject map
                    continue;
                }
                check_iri(&edge.property_uri)?;
                let Some(target) = alignment.node(&edge.target) else {
                    continue;
                };

                match &target.kind {
                    NodeKind::Column { column_id } => {
                        let datatype = self
                            .ontology
                            .datatype_of(&edge.property_uri)
                            .map(str::to_string);
                        predicate_object_maps.push(PredicateObjectMap {
                            predicate: edge.property_uri.clone(),
                            object_map: ObjectMap::Column {
                                column: column_id.clone(),
                                datatype,
                            },
                            is_inverse: false,
                        });
                    }
                    NodeKind::Literal { value, datatype } => {
                        if let Some(datatype) = datatype {
                            check_iri(datatype)?;
                        }
                        predicate_object_maps.push(PredicateObjectMap {
                            predicate: edge.property_uri.clone(),
                            object_map: ObjectMap::Constant {
                                value: value.clone(),
                                datatype: datatype.clone(),
                            },
                            is_inverse: false,
                        });
                    }
                    NodeKind::Class { .. } => {
                        let Some(parent_id) = map_ids.get(target.id.as_str()) else {
                            continue;
                        };
                        predicate_object_maps.push(PredicateObjectMap {
                            predicate: edge.property_uri.clone(),
                            object_map: ObjectMap::ParentTriplesMap {
                                triples_map_id: parent_id.clone(),
                            },
                            is_inverse: edge.is_inverse,
                        });

                        if add_inverse_properties {
                            match self.ontology.inverse_of(&edge.property_uri) {
                                Some(inverse) => {
                                    check_iri(inverse)?;
                                    predicate_object_maps.push(PredicateObjectMap {
                                        predicate: inverse.to_string(),
                                        object_map: ObjectMap::ParentTriplesMap {
                                            triples_map_id: parent_id.clone(),
                                        },
                                        is_inverse: !edge.is_inverse,
                                    });
                                }
                                None => warnings.push(MappingWarning {
                                    column_id: None,
                                    message: format!(
                                        "no inverse declared for {}; inverse triples not generated",
                                        edge.property_uri
                                    ),
                                }),
                            }
                        }
                    }
                }
            }

            triples_maps.push(TriplesMap {
                id: map_ids
                    .get(node.id.as_str())
                    .cloned()
                    .unwrap_or_else(|| triples_map_id(&node.id)),
                node_id: node.id.clone(),
                class_uri: uri.clone(),
                subject_map,
                predicate_object_maps,
            });
        }

        for semantic_type in semantic_types.iter() {
            if semantic_type.is_part_of_key && !semantic_type.is_class_link() {
                let used = triples_maps
                    .iter()
                    .any(|m| m.subject_map.referenced_columns().contains(&semantic_type.column_id.as_str()));
                if !used {
                    warnings.push(MappingWarning {
                        column_id: Some(semantic_type.column_id.clone()),
                        message: "key column is not a data property of any class node".to_string(),
                    });
                }
            }
        }

        tracing::debug!(
            triples_maps = triples_maps.len(),
            warnings = warnings.len(),
            add_inverse_properties,
            "mapping generated"
        );

        Ok(MappingDescription {
            triples_maps,
            prefixes: prefix_table(source_prefix, source_namespace),
            source_prefix: source_prefix.to_string(),
            source_namespace: source_namespace.to_string(),
            blank_node_prefix: self.blank_node_prefix.clone(),
            warnings,
        })
    }

    fn subject_map(
        &self,
        alignment: &AlignmentModel,
        semantic_types: &SemanticTypes,
        node: &Node,
        class_uri: &str,
        source_namespace: &str,
    ) -> SubjectMap {
        let outgoing = alignment.outgoing(&node.id);

        let instance_column = outgoing
            .iter()
            .filter(|e| e.kind == EdgeKind::ClassInstance)
            .filter_map(|e| alignment.node(&e.target))
            .find_map(|n| n.column_id());
        if let Some(column) = instance_column {
            return SubjectMap::Column {
                column: column.to_string(),
            };
        }

        let mut key_columns: Vec<String> = Vec::new();
        for edge in outgoing.iter().filter(|e| e.kind == EdgeKind::DataProperty) {
            if let Some(column) = alignment.node(&edge.target).and_then(Node::column_id) {
                if semantic_types.is_key(column) && !key_columns.iter().any(|c| c == column) {
                    key_columns.push(column.to_string());
                }
            }
        }
        if key_columns.is_empty() {
            return SubjectMap::BlankNode;
        }

        let mut template = format!("{}{}", source_namespace, local_name(class_uri));
        for column in &key_columns {
            template.push_str("/{");
            for c in column.chars() {
                // R2RML string templates escape braces and backslashes in column names
                if matches!(c, '{' | '}' | '\\') {
                    template.push('\\');
                }
                template.push(c);
            }
            template.push('}');
        }
        SubjectMap::Template {
            template,
            columns: key_columns,
        }
    }
}

/// Class nodes in depth-first order from the roots, each visited once
fn traversal_order(alignment: &AlignmentModel) -> Vec<&Node> {
    fn visit<'m>(
        alignment: &'m AlignmentModel,
        node: &'m Node,
        seen: &mut BTreeSet<&'m str>,
        order: &mut Vec<&'m Node>,
    ) {
        if !seen.insert(node.id.as_str()) {
            return;
        }
        order.push(node);
        for edge in alignment.outgoing(&node.id) {
            if edge.kind != EdgeKind::ObjectProperty {
                continue;
            }
            if let Some(child) = alignment.node(&edge.target) {
                visit(alignment, child, seen, order);
            }
        }
    }

    let mut seen = BTreeSet::new();
    let mut order = Vec::new();
    for root in alignment.root_classes() {
        visit(alignment, root, &mut seen, &mut order);
    }
    // Unreachable classes only exist in cyclic graphs, which validation
    // rejects; keep them anyway so every class yields a map.
    for class in alignment.class_nodes() {
        visit(alignment, class, &mut seen, &mut order);
    }
    order
}

fn triples_map_id(node_id: &str) -> String {
    let sanitized: String = node_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    format!("TriplesMap_{sanitized}")
}

fn check_iri(iri: &str) -> Result<(), MappingGenerationError> {
    NamedNode::new(iri)
        .map(|_| ())
        .map_err(|e| MappingGenerationError::InvalidIri {
            iri: iri.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::SemanticType;
    use crate::vocab::RDFS_LABEL;
    use assert_matches::assert_matches;

    const FOAF: &str = "http://xmlns.com/foaf/0.1/";
    const ORG: &str = "http://www.w3.org/ns/org#";
    const NS: &str = "http://isi.edu/data/";

    fn persons() -> (AlignmentModel, SemanticTypes) {
        let mut model = AlignmentModel::new();
        model
            .add_class("n1", format!("{FOAF}Person"))
            .add_class("n2", format!("{ORG}Organization"))
            .add_column("c1", "name")
            .add_column("c2", "worksOrg")
            .data_property("n1", "c1", format!("{FOAF}name"))
            .object_property("n1", "n2", format!("{ORG}memberOf"))
            .data_property("n2", "c2", RDFS_LABEL);
        let types = SemanticTypes::new(vec![
            SemanticType::new("name", format!("{FOAF}Person"), format!("{FOAF}name")),
            SemanticType::new("worksOrg", format!("{ORG}Organization"), RDFS_LABEL),
        ]);
        (model, types)
    }

    #[test]
    fn test_one_triples_map_per_class_in_traversal_order() {
        let (model, types) = persons();
        let ontology = Ontology::new();
        let mapping = MappingGenerator::new(&ontology)
            .generate(&model, &types, "s", NS, false)
            .unwrap();

        let ids: Vec<_> = mapping.triples_maps.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["TriplesMap_n1", "TriplesMap_n2"]);
        assert!(mapping.triples_maps[0].subject_map.is_blank_node());
        assert_eq!(
            mapping.triples_maps[0].predicate_object_maps[1].object_map,
            ObjectMap::ParentTriplesMap {
                triples_map_id: "TriplesMap_n2".into()
            }
        );
        assert!(mapping.warnings.is_empty());
    }

    #[test]
    fn test_key_columns_build_template() {
        let (model, types) = persons();
        let types: SemanticTypes = types
            .iter()
            .cloned()
            .map(|t| if t.column_id == "name" { t.key() } else { t })
            .collect();
        let ontology = Ontology::new();
        let mapping = MappingGenerator::new(&ontology)
            .generate(&model, &types, "s", NS, false)
            .unwrap();

        assert_eq!(
            mapping.triples_maps[0].subject_map,
            SubjectMap::Template {
                template: format!("{NS}Person/{{name}}"),
                columns: vec!["name".into()],
            }
        );
    }

    #[test]
    fn test_braces_in_key_column_are_escaped() {
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
            .generate(&model, &types, "s", NS, false)
            .unwrap();

        assert_eq!(
            mapping.triples_maps[0].subject_map,
            SubjectMap::Template {
                template: format!(r"{NS}Person/{{id\{{x\}}}}"),
                columns: vec!["id{x}".into()],
            }
        );
    }

    #[test]
    fn test_class_instance_column_becomes_subject() {
        let (mut model, mut types) = persons();
        model.add_column("c3", "orgUri").class_instance("n2", "c3");
        types = types
            .iter()
            .cloned()
            .chain([SemanticType::new(
                "orgUri",
                format!("{ORG}Organization"),
                crate::vocab::KARMA::CLASS_LINK,
            )])
            .collect();
        let ontology = Ontology::new();
        let mapping = MappingGenerator::new(&ontology)
            .generate(&model, &types, "s", NS, false)
            .unwrap();

        let org = mapping.triples_map("TriplesMap_n2").unwrap();
        assert_eq!(
            org.subject_map,
            SubjectMap::Column {
                column: "orgUri".into()
            }
        );
        assert_eq!(org.predicate_object_maps.len(), 1);
    }

    #[test]
    fn test_datatype_comes_from_ontology_range() {
        let (mut model, mut types) = persons();
        model
            .add_column("c3", "age")
            .data_property("n1", "c3", format!("{FOAF}age"));
        types = types
            .iter()
            .cloned()
            .chain([SemanticType::new("age", format!("{FOAF}Person"), format!("{FOAF}age"))])
            .collect();
        let mut ontology = Ontology::new();
        ontology.declare_range(
            &format!("{FOAF}age"),
            "http://www.w3.org/2001/XMLSchema#integer",
        );
        let mapping = MappingGenerator::new(&ontology)
            .generate(&model, &types, "s", NS, false)
            .unwrap();

        let age = mapping.triples_maps[0]
            .predicate_object_maps
            .iter()
            .find(|p| p.predicate.ends_with("age"))
            .unwrap();
        assert_matches!(
            &age.object_map,
            ObjectMap::Column { datatype: Some(dt), .. } if dt.ends_with("#integer")
        );
    }

    #[test]
    fn test_inverse_added_when_ontology_declares_it() {
        let (model, types) = persons();
        let mut ontology = Ontology::new();
        ontology.declare_inverse(&format!("{ORG}memberOf"), &format!("{ORG}hasMember"));
        let mapping = MappingGenerator::new(&ontology)
            .generate(&model, &types, "s", NS, true)
            .unwrap();

        let person = &mapping.triples_maps[0];
        let inverse = person
            .predicate_object_maps
            .iter()
            .find(|p| p.predicate == format!("{ORG}hasMember"))
            .unwrap();
        assert!(inverse.is_inverse);
        assert!(mapping.warnings.is_empty());
    }

    #[test]
    fn test_missing_inverse_is_a_warning() {
        let (model, types) = persons();
        let ontology = Ontology::new();
        let mapping = MappingGenerator::new(&ontology)
            .generate(&model, &types, "s", NS, true)
            .unwrap();

        assert_eq!(mapping.warnings.len(), 1);
        assert!(mapping.warnings[0].message.contains("memberOf"));
        assert_eq!(mapping.triples_maps[0].predicate_object_maps.len(), 2);
    }

    #[test]
    fn test_invalid_namespace_rejected() {
        let (model, types) = persons();
        let ontology = Ontology::new();
        let err = MappingGenerator::new(&ontology)
            .generate(&model, &types, "s", "not an iri", false)
            .unwrap_err();
        assert_matches!(err, MappingGenerationError::InvalidIri { .. });
    }

    #[test]
    fn test_shared_class_emitted_once() {
        let (mut model, mut types) = persons();
        model
            .add_class("n0", format!("{FOAF}Group"))
            .add_column("c4", "group")
            .data_property("n0", "c4", format!("{FOAF}name"))
            .object_property("n0", "n2", format!("{ORG}hasUnit"));
        types = types
            .iter()
            .cloned()
            .chain([SemanticType::new("group", format!("{FOAF}Group"), format!("{FOAF}name"))])
            .collect();
        let ontology = Ontology::new();
        let mapping = MappingGenerator::new(&ontology)
            .generate(&model, &types, "s", NS, false)
            .unwrap();

        let ids: Vec<_> = mapping.triples_maps.iter().map(|m| m.node_id.as_str()).collect();
        assert_eq!(ids, vec!["n0", "n2", "n1"]);
    }

    #[test]
    fn test_r2rml_rendering_is_deterministic() {
        let (model, types) = persons();
        let ontology = Ontology::new();
        let generator = MappingGenerator::new(&ontology);
        let a = generator.generate(&model, &types, "s", NS, false).unwrap();
        let b = generator.generate(&model, &types, "s", NS, false).unwrap();
        assert_eq!(a, b);

        let turtle = a.to_r2rml_turtle("Persons").unwrap();
        assert_eq!(turtle, b.to_r2rml_turtle("Persons").unwrap());
        assert!(turtle.contains("rr:parentTriplesMap"));
        assert!(turtle.contains("\"Persons\""));
    }
}
