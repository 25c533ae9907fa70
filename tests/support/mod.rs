#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::{TempDir, tempdir};
use umya_spreadsheet::{self, Spreadsheet};
use worksheet_rdf::PublishConfig;
use worksheet_rdf::alignment::{AlignmentModel, AlignmentRegistry, SemanticType, SemanticTypes};
use worksheet_rdf::metrics::PublishMetrics;
use worksheet_rdf::ontology::Ontology;
use worksheet_rdf::orchestrator::{PublicationOrchestrator, PublishRequest};
use worksheet_rdf::preferences::InMemoryPreferenceStore;
use worksheet_rdf::store::{PublishLedger, StorePool, StorePublisher};
use worksheet_rdf::vocab::RDFS_LABEL;
use worksheet_rdf::worksheet::Worksheet;

pub const FOAF: &str = "http://xmlns.com/foaf/0.1/";
pub const ORG: &str = "http://www.w3.org/ns/org#";
pub const NS: &str = "http://isi.edu/data/";
pub const WORKSPACE: &str = "wsp";

pub fn write_workbook_to_path<F>(path: &Path, f: F)
where
    F: FnOnce(&mut Spreadsheet),
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create dir");
    }
    let mut book = umya_spreadsheet::new_file();
    f(&mut book);
    umya_spreadsheet::writer::xlsx::write(&book, path).expect("write workbook");
}

/// Temp directory acting as the output root of one test
pub struct TestWorkspace {
    _tempdir: TempDir,
    root: PathBuf,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let tempdir = tempdir().expect("tempdir");
        let root = tempdir.path().to_path_buf();
        Self {
            _tempdir: tempdir,
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn create_workbook<F>(&self, name: &str, f: F) -> PathBuf
    where
        F: FnOnce(&mut Spreadsheet),
    {
        let path = self.path(name);
        write_workbook_to_path(&path, f);
        path
    }
}

/// Orchestrator wired to in-memory collaborators
pub struct Harness {
    pub workspace: TestWorkspace,
    pub registry: Arc<AlignmentRegistry>,
    pub preferences: Arc<InMemoryPreferenceStore>,
    pub metrics: Arc<PublishMetrics>,
    pub orchestrator: PublicationOrchestrator,
}

impl Harness {
    pub fn new(ontology: Ontology) -> Self {
        Self::with_store(ontology, StorePublisher::new(
            Arc::new(StorePool::new()),
            Arc::new(PublishLedger::in_memory()),
        ))
    }

    pub fn with_store(ontology: Ontology, store: StorePublisher) -> Self {
        let workspace = TestWorkspace::new();
        let registry = Arc::new(AlignmentRegistry::new());
        let preferences = Arc::new(InMemoryPreferenceStore::new());
        let metrics = Arc::new(PublishMetrics::new());
        let orchestrator = PublicationOrchestrator::new(
            workspace.root().to_path_buf(),
            registry.clone(),
            Arc::new(ontology),
            preferences.clone(),
            Arc::new(store),
        )
        .with_metrics(metrics.clone());
        Self {
            workspace,
            registry,
            preferences,
            metrics,
            orchestrator,
        }
    }
}

pub fn config() -> PublishConfig {
    PublishConfig {
        subject_prefix: "s".into(),
        subject_namespace: NS.into(),
        ..PublishConfig::default()
    }
}

pub fn request(worksheet: Worksheet, semantic_types: SemanticTypes, config: PublishConfig) -> PublishRequest {
    PublishRequest {
        workspace_id: WORKSPACE.into(),
        worksheet: Arc::new(worksheet),
        semantic_types,
        owner_id: "WSP1".into(),
        config,
    }
}

pub fn worksheet(id: &str, columns: &[&str], rows: &[&[&str]]) -> Worksheet {
    Worksheet::from_records(
        id,
        id,
        columns.iter().map(|c| c.to_string()).collect(),
        rows.iter()
            .map(|row| row.iter().map(|v| v.to_string()).collect())
            .collect(),
    )
}

/// Person --memberOf--> Organization, both without keys
pub fn persons_alignment() -> (AlignmentModel, SemanticTypes) {
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

/// A port nothing listens on
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    listener.local_addr().expect("addr").port()
}
