//! Alignment graph: worksheet columns → ontology classes and properties
//!
//! Nodes and edges are tagged variants so every consumer matches on them
//! exhaustively. The graph is produced upstream (by the modeling UI or an
//! alignment document) and only read here.

use crate::error::MappingGenerationError;
use crate::vocab::KARMA;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// What an alignment node stands for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NodeKind {
    /// An instance of an ontology class
    Class { uri: String },
    /// Terminal node carrying the value of a worksheet column
    #[serde(rename_all = "camelCase")]
    Column { column_id: String },
    /// Terminal node carrying a constant literal
    Literal {
        value: String,
        #[serde(default)]
        datatype: Option<String>,
    },
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Class { .. } => "class",
            NodeKind::Column { .. } => "column",
            NodeKind::Literal { .. } => "literal",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(flatten)]
    pub kind: NodeKind,
}

impl Node {
    pub fn class_uri(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Class { uri } => Some(uri),
            NodeKind::Column { .. } | NodeKind::Literal { .. } => None,
        }
    }

    pub fn column_id(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Column { column_id } => Some(column_id),
            NodeKind::Class { .. } | NodeKind::Literal { .. } => None,
        }
    }
}

/// What an alignment edge stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EdgeKind {
    /// class → column or literal, the value becomes a literal object
    DataProperty,
    /// class → class, the target instance becomes the object
    ObjectProperty,
    /// class → column whose cells hold the IRI of the class instance
    ClassInstance,
}

impl EdgeKind {
    pub fn label(&self) -> &'static str {
        match self {
            EdgeKind::DataProperty => "dataProperty",
            EdgeKind::ObjectProperty => "objectProperty",
            EdgeKind::ClassInstance => "classInstance",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub property_uri: String,
    pub kind: EdgeKind,
    /// The property points target → source in the ontology
    #[serde(default)]
    pub is_inverse: bool,
}

/// Directed alignment graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentModel {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl AlignmentModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_class(&mut self, id: impl Into<String>, uri: impl Into<String>) -> &mut Self {
        self.nodes.push(Node {
            id: id.into(),
            kind: NodeKind::Class { uri: uri.into() },
        });
        self
    }

    pub fn add_column(&mut self, id: impl Into<String>, column_id: impl Into<String>) -> &mut Self {
        self.nodes.push(Node {
            id: id.into(),
            kind: NodeKind::Column {
                column_id: column_id.into(),
            },
        });
        self
    }

    pub fn add_literal(
        &mut self,
        id: impl Into<String>,
        value: impl Into<String>,
        datatype: Option<String>,
    ) -> &mut Self {
        self.nodes.push(Node {
            id: id.into(),
            kind: NodeKind::Literal {
                value: value.into(),
                datatype,
            },
        });
        self
    }

    pub fn add_edge(&mut self, edge: Edge) -> &mut Self {
        self.edges.push(edge);
        self
    }

    pub fn data_property(
        &mut self,
        source: impl Into<String>,
        target: impl Into<String>,
        property_uri: impl Into<String>,
    ) -> &mut Self {
        self.add_edge(Edge {
            source: source.into(),
            target: target.into(),
            property_uri: property_uri.into(),
            kind: EdgeKind::DataProperty,
            is_inverse: false,
        })
    }

    pub fn object_property(
        &mut self,
        source: impl Into<String>,
        target: impl Into<String>,
        property_uri: impl Into<String>,
    ) -> &mut Self {
        self.add_edge(Edge {
            source: source.into(),
            target: target.into(),
            property_uri: property_uri.into(),
            kind: EdgeKind::ObjectProperty,
            is_inverse: false,
        })
    }

    /// Object property whose ontology direction is target → source
    pub fn inverse_object_property(
        &mut self,
        source: impl Into<String>,
        target: impl Into<String>,
        property_uri: impl Into<String>,
    ) -> &mut Self {
        self.add_edge(Edge {
            source: source.into(),
            target: target.into(),
            property_uri: property_uri.into(),
            kind: EdgeKind::ObjectProperty,
            is_inverse: true,
        })
    }

    pub fn class_instance(
        &mut self,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> &mut Self {
        self.add_edge(Edge {
            source: source.into(),
            target: target.into(),
            property_uri: KARMA::CLASS_LINK.to_string(),
            kind: EdgeKind::ClassInstance,
            is_inverse: false,
        })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Class nodes sorted by id
    pub fn class_nodes(&self) -> Vec<&Node> {
        let mut classes: Vec<&Node> = self
            .nodes
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::Class { .. }))
            .collect();
        classes.sort_by(|a, b| a.id.cmp(&b.id));
        classes
    }

    /// Outgoing edges of a node ordered by `(property, target)`
    pub fn outgoing(&self, node_id: &str) -> Vec<&Edge> {
        let mut edges: Vec<&Edge> = self.edges.iter().filter(|e| e.source == node_id).collect();
        edges.sort_by(|a, b| {
            (a.property_uri.as_str(), a.target.as_str(), a.is_inverse)
                .cmp(&(b.property_uri.as_str(), b.target.as_str(), b.is_inverse))
        });
        edges
    }

    /// Edges ending at a node, in declaration order
    pub fn incoming(&self, node_id: &str) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.target == node_id)
    }

    /// Terminal nodes bound to a worksheet column
    pub fn terminals_for_column<'a>(&'a self, column_id: &'a str) -> impl Iterator<Item = &'a Node> {
        self.nodes
            .iter()
            .filter(move |n| n.column_id() == Some(column_id))
    }

    /// Class nodes no class→class edge points at, sorted by id
    pub fn root_classes(&self) -> Vec<&Node> {
        let targeted: BTreeSet<&str> = self
            .edges
            .iter()
            .filter(|e| e.kind == EdgeKind::ObjectProperty)
            .map(|e| e.target.as_str())
            .collect();
        self.class_nodes()
            .into_iter()
            .filter(|n| !targeted.contains(n.id.as_str()))
            .collect()
    }

    /// Check structural invariants.
    ///
    /// Every semantic-typed column must be bound to exactly one terminal
    /// node, every edge must connect existing nodes with a kind matching its
    /// endpoints, and class→class edges must not form a cycle.
    pub fn validate(&self, semantic_types: &SemanticTypes) -> Result<(), MappingGenerationError> {
        if self.class_nodes().is_empty() {
            return Err(MappingGenerationError::EmptyAlignment);
        }

        let by_id: BTreeMap<&str, &Node> = self.nodes.iter().map(|n| (n.id.as_str(), n)).collect();

        for edge in &self.edges {
            let source = by_id.get(edge.source.as_str()).ok_or_else(|| {
                MappingGenerationError::DanglingEdge {
                    source_id: edge.source.clone(),
                    target_id: edge.target.clone(),
                    missing: edge.source.clone(),
                }
            })?;
            let target = by_id.get(edge.target.as_str()).ok_or_else(|| {
                MappingGenerationError::DanglingEdge {
                    source_id: edge.source.clone(),
                    target_id: edge.target.clone(),
                    missing: edge.target.clone(),
                }
            })?;

            if source.class_uri().is_none() {
                return Err(MappingGenerationError::SourceNotClass {
                    source_id: edge.source.clone(),
                    target_id: edge.target.clone(),
                    property: edge.property_uri.clone(),
                });
            }

            let compatible = match (edge.kind, &target.kind) {
                (EdgeKind::DataProperty, NodeKind::Column { .. } | NodeKind::Literal { .. }) => true,
                (EdgeKind::ObjectProperty, NodeKind::Class { .. }) => true,
                (EdgeKind::ClassInstance, NodeKind::Column { .. }) => true,
                (EdgeKind::DataProperty, NodeKind::Class { .. })
                | (EdgeKind::ObjectProperty, NodeKind::Column { .. } | NodeKind::Literal { .. })
                | (EdgeKind::ClassInstance, NodeKind::Class { .. } | NodeKind::Literal { .. }) => {
                    false
                }
            };
            if !compatible {
                return Err(MappingGenerationError::EdgeKindMismatch {
                    source_id: edge.source.clone(),
                    target_id: edge.target.clone(),
                    kind: edge.kind.label(),
                    target_kind: target.kind.label(),
                });
            }
        }

        for semantic_type in semantic_types.iter() {
            let count = self.terminals_for_column(&semantic_type.column_id).count();
            match count {
                0 => {
                    return Err(MappingGenerationError::UnboundColumn {
                        column_id: semantic_type.column_id.clone(),
                    });
                }
                1 => {}
                _ => {
                    return Err(MappingGenerationError::AmbiguousColumn {
                        column_id: semantic_type.column_id.clone(),
                        count,
                    });
                }
            }
        }

        self.check_acyclic()
    }

    fn check_acyclic(&self) -> Result<(), MappingGenerationError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit<'a>(
            model: &'a AlignmentModel,
            node: &'a str,
            marks: &mut BTreeMap<&'a str, Mark>,
            stack: &mut Vec<&'a str>,
        ) -> Result<(), MappingGenerationError> {
            match marks.get(node) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Visiting) => {
                    let start = stack.iter().position(|n| *n == node).unwrap_or(0);
                    let mut path: Vec<String> = stack[start..].iter().map(|n| n.to_string()).collect();
                    path.push(node.to_string());
                    return Err(MappingGenerationError::Cycle { path });
                }
                None => {}
            }
            marks.insert(node, Mark::Visiting);
            stack.push(node);
            for edge in model
                .edges
                .iter()
                .filter(|e| e.source == node && e.kind == EdgeKind::ObjectProperty)
            {
                visit(model, &edge.target, marks, stack)?;
            }
            stack.pop();
            marks.insert(node, Mark::Done);
            Ok(())
        }

        let mut marks = BTreeMap::new();
        for class in self.class_nodes() {
            let mut stack = Vec::new();
            visit(self, &class.id, &mut marks, &mut stack)?;
        }
        Ok(())
    }
}

// ============================================================================
// Semantic types
// ============================================================================

/// Ontology class/property assigned to one worksheet column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticType {
    pub column_id: String,
    /// Class the column's value describes
    pub domain_uri: String,
    /// Property linking the class to the value, or `karma:classLink`
    pub property_uri: String,
    /// The column identifies instances of the domain class
    #[serde(default)]
    pub is_part_of_key: bool,
}

impl SemanticType {
    pub fn new(
        column_id: impl Into<String>,
        domain_uri: impl Into<String>,
        property_uri: impl Into<String>,
    ) -> Self {
        Self {
            column_id: column_id.into(),
            domain_uri: domain_uri.into(),
            property_uri: property_uri.into(),
            is_part_of_key: false,
        }
    }

    pub fn key(mut self) -> Self {
        self.is_part_of_key = true;
        self
    }

    pub fn is_class_link(&self) -> bool {
        self.property_uri == KARMA::CLASS_LINK
    }
}

/// Semantic types of one worksheet, keyed by column id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SemanticTypes(Vec<SemanticType>);

impl SemanticTypes {
    pub fn new(types: Vec<SemanticType>) -> Self {
        Self(types)
    }

    pub fn get(&self, column_id: &str) -> Option<&SemanticType> {
        self.0.iter().find(|t| t.column_id == column_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SemanticType> {
        self.0.iter()
    }

    pub fn is_key(&self, column_id: &str) -> bool {
        self.get(column_id).is_some_and(|t| t.is_part_of_key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<SemanticType> for SemanticTypes {
    fn from_iter<T: IntoIterator<Item = SemanticType>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
