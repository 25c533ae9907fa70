//! Publishable artifacts
//!
//! Each artifact kind knows how to build its graph and where it lives under
//! the output root. The RDF export of a worksheet and the R2RML mapping that
//! produced it are the two kinds.

use crate::error::{PublishError, SerializationError};
use crate::generator::RdfGenerator;
use crate::mapping::MappingDescription;
use crate::report::ErrorReport;
use crate::serializer::{self, RdfSyntax, SerializedArtifact};
use crate::worksheet::WorksheetRow;
use oxigraph::model::Triple;
use std::path::{Path, PathBuf};

/// Directory, relative to the output root, holding RDF exports
pub const RDF_PUBLISH_DIR: &str = "publish/RDF";
/// Directory, relative to the output root, holding R2RML exports
pub const R2RML_PUBLISH_DIR: &str = "publish/R2RML";
/// RDF exports keep this extension whatever syntax they are written in
pub const RDF_ARTIFACT_EXTENSION: &str = "ttl";

pub trait ArtifactPublisher {
    /// Build the artifact's graph in memory. Row-level problems go to `report`.
    fn export_graph(&self, report: &mut ErrorReport) -> Result<Vec<Triple>, PublishError>;

    /// Serialize the artifact to `destination`
    fn write_to_file(
        &self,
        destination: &Path,
        report: &mut ErrorReport,
    ) -> Result<SerializedArtifact, PublishError>;

    /// Location of the artifact relative to the output root
    fn relative_path(&self) -> PathBuf;

    /// Write the artifact at its place under `output_root`
    fn publish(
        &self,
        output_root: &Path,
        report: &mut ErrorReport,
    ) -> Result<SerializedArtifact, PublishError> {
        self.write_to_file(&output_root.join(self.relative_path()), report)
    }
}

// ============================================================================
// Worksheet RDF
// ============================================================================

/// Materialized RDF of one worksheet
pub struct WorksheetRdfPublisher<'a> {
    mapping: &'a MappingDescription,
    generator: RdfGenerator,
    rows: &'a [WorksheetRow],
    syntax: RdfSyntax,
    file_stem: String,
}

impl<'a> WorksheetRdfPublisher<'a> {
    /// `file_stem` is the owner id followed by the worksheet id
    pub fn new(
        mapping: &'a MappingDescription,
        rows: &'a [WorksheetRow],
        syntax: RdfSyntax,
        file_stem: impl Into<String>,
    ) -> Result<Self, PublishError> {
        Ok(Self {
            generator: RdfGenerator::new(mapping)?,
            mapping,
            rows,
            syntax,
            file_stem: file_stem.into(),
        })
    }
}

impl ArtifactPublisher for WorksheetRdfPublisher<'_> {
    fn export_graph(&self, report: &mut ErrorReport) -> Result<Vec<Triple>, PublishError> {
        Ok(self.generator.run(self.rows, report).collect())
    }

    fn write_to_file(
        &self,
        destination: &Path,
        report: &mut ErrorReport,
    ) -> Result<SerializedArtifact, PublishError> {
        let triples = self.generator.run(self.rows, report);
        Ok(serializer::write(
            triples,
            self.syntax,
            destination,
            &self.mapping.prefixes,
        )?)
    }

    fn relative_path(&self) -> PathBuf {
        Path::new(RDF_PUBLISH_DIR).join(format!("{}.{RDF_ARTIFACT_EXTENSION}", self.file_stem))
    }
}

// ============================================================================
// R2RML mapping
// ============================================================================

/// The mapping itself, as R2RML Turtle
pub struct MappingPublisher<'a> {
    mapping: &'a MappingDescription,
    table_name: String,
    file_stem: String,
}

impl<'a> MappingPublisher<'a> {
    pub fn new(
        mapping: &'a MappingDescription,
        table_name: impl Into<String>,
        file_stem: impl Into<String>,
    ) -> Self {
        Self {
            mapping,
            table_name: table_name.into(),
            file_stem: file_stem.into(),
        }
    }
}

impl ArtifactPublisher for MappingPublisher<'_> {
    fn export_graph(&self, _report: &mut ErrorReport) -> Result<Vec<Triple>, PublishError> {
        Ok(self.mapping.to_r2rml_triples(&self.table_name))
    }

    fn write_to_file(
        &self,
        destination: &Path,
        report: &mut ErrorReport,
    ) -> Result<SerializedArtifact, PublishError> {
        let triples = self.export_graph(report)?;
        serializer::write(
            triples,
            RdfSyntax::Turtle,
            destination,
            &self.mapping.r2rml_prefixes(),
        )
        .map_err(|e: SerializationError| e.into())
    }

    fn relative_path(&self) -> PathBuf {
        Path::new(R2RML_PUBLISH_DIR).join(format!("{}-model.ttl", self.file_stem))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::{AlignmentModel, SemanticType, SemanticTypes};
    use crate::mapping::MappingGenerator;
    use crate::ontology::Ontology;
    use indexmap::IndexMap;

    fn mapping() -> MappingDescription {
        let mut alignment = AlignmentModel::new();
        alignment
            .add_class("n1", "http://xmlns.com/foaf/0.1/Person")
            .add_column("c1", "name")
            .data_property("n1", "c1", "http://xmlns.com/foaf/0.1/name");
        let types: SemanticTypes = vec![SemanticType::new(
            "name",
            "http://xmlns.com/foaf/0.1/Person",
            "http://xmlns.com/foaf/0.1/name",
        )]
        .into_iter()
        .collect();
        let ontology = Ontology::new();
        MappingGenerator::new(&ontology)
            .generate(&alignment, &types, "s", "http://isi.edu/data/", false)
            .unwrap()
    }

    fn rows() -> Vec<WorksheetRow> {
        ["Ann", "Bob"]
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let mut cells = IndexMap::new();
                cells.insert("name".to_string(), name.to_string());
                WorksheetRow::new(i, cells)
            })
            .collect()
    }

    #[test]
    fn test_rdf_artifact_path() {
        let mapping = mapping();
        let rows = rows();
        let publisher = WorksheetRdfPublisher::new(&mapping, &rows, RdfSyntax::Turtle, "WSP1ws1").unwrap();
        assert_eq!(publisher.relative_path(), PathBuf::from("publish/RDF/WSP1ws1.ttl"));
    }

    #[test]
    fn test_artifact_name_does_not_follow_syntax() {
        let dir = tempfile::tempdir().unwrap();
        let mapping = mapping();
        let rows = rows();
        let publisher = WorksheetRdfPublisher::new(&mapping, &rows, RdfSyntax::NTriples, "WSP1ws1").unwrap();
        let mut report = ErrorReport::new();

        let artifact = publisher.publish(dir.path(), &mut report).unwrap();
        assert_eq!(artifact.path, dir.path().join("publish/RDF/WSP1ws1.ttl"));
        assert_eq!(artifact.syntax, RdfSyntax::NTriples);
        let text = std::fs::read_to_string(&artifact.path).unwrap();
        assert!(!text.contains("@prefix"));
        assert_eq!(serializer::read_back(&artifact.path, RdfSyntax::NTriples).unwrap().len(), 4);
    }

    #[test]
    fn test_publish_writes_under_output_root() {
        let dir = tempfile::tempdir().unwrap();
        let mapping = mapping();
        let rows = rows();
        let publisher = WorksheetRdfPublisher::new(&mapping, &rows, RdfSyntax::Turtle, "WSP1ws1").unwrap();
        let mut report = ErrorReport::new();

        let artifact = publisher.publish(dir.path(), &mut report).unwrap();
        assert_eq!(artifact.path, dir.path().join("publish/RDF/WSP1ws1.ttl"));
        assert_eq!(artifact.triple_count, 4);
        assert!(report.is_empty());

        let exported = publisher.export_graph(&mut report).unwrap();
        assert_eq!(exported.len(), artifact.triple_count);
    }

    #[test]
    fn test_mapping_artifact_is_r2rml() {
        let dir = tempfile::tempdir().unwrap();
        let mapping = mapping();
        let publisher = MappingPublisher::new(&mapping, "persons", "WSP1ws1");
        let mut report = ErrorReport::new();
        let artifact = publisher.publish(dir.path(), &mut report).unwrap();

        assert_eq!(artifact.path, dir.path().join("publish/R2RML/WSP1ws1-model.ttl"));
        let text = std::fs::read_to_string(&artifact.path).unwrap();
        assert!(text.contains("@prefix rr:"));
        assert!(text.contains("rr:TriplesMap"));
    }
}
