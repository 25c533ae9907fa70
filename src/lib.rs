pub mod alignment;
pub mod config;
pub mod error;
pub mod generator;
pub mod logging;
pub mod mapping;
pub mod metrics;
pub mod ontology;
pub mod orchestrator;
pub mod preferences;
pub mod publisher;
pub mod report;
pub mod serializer;
pub mod store;
pub mod vocab;
pub mod worksheet;

pub use config::{AppConfig, CliArgs, PublishConfig};
pub use error::{ErrorCode, MappingGenerationError, PublishError, SerializationError, StoreError};
pub use logging::{LoggingConfig, init_logging, shutdown_telemetry};
pub use orchestrator::{PublicationOrchestrator, PublishOutcome, PublishRequest, PublishRun, StoreResult};
pub use report::ErrorReport;

use alignment::{AlignmentDocument, AlignmentRegistry};
use anyhow::{Context, Result};
use mapping::MappingGenerator;
use metrics::PublishMetrics;
use ontology::Ontology;
use preferences::JsonFilePreferenceStore;
use publisher::{ArtifactPublisher, MappingPublisher};
use serializer::SerializedArtifact;
use std::path::Path;
use std::sync::Arc;
use store::{PublishLedger, StorePool, StorePublisher};
use tokio::task;
use worksheet::Worksheet;

/// What one CLI invocation produced
#[derive(Debug)]
pub struct RunResult {
    pub run: PublishRun,
    /// R2RML export, when requested and the run got that far
    pub mapping: Option<SerializedArtifact>,
}

/// Load the inputs named by `config` and publish the worksheet once
pub async fn run(config: AppConfig) -> Result<RunResult> {
    let config = Arc::new(config);

    let worksheet = {
        let config = config.clone();
        task::spawn_blocking(move || {
            Worksheet::load(
                &config.worksheet,
                config.sheet.as_deref(),
                config.worksheet_id.as_deref(),
            )
        })
        .await??
    };
    let document = AlignmentDocument::from_path(&config.alignment)?;
    let ontology = load_ontologies(&config.ontologies)?;

    tracing::info!(
        worksheet = %worksheet.id,
        rows = worksheet.rows.len(),
        columns = worksheet.columns.len(),
        ontology_files = config.ontologies.len(),
        "inputs loaded"
    );

    let registry = Arc::new(AlignmentRegistry::new());
    let workspace_id = document
        .workspace_id
        .clone()
        .unwrap_or_else(|| config.workspace_id.clone());
    if document.worksheet_id != worksheet.id {
        tracing::warn!(
            alignment_worksheet = %document.worksheet_id,
            worksheet = %worksheet.id,
            "alignment document belongs to a different worksheet"
        );
    }
    registry.register(&workspace_id, &document.worksheet_id, document.alignment.clone());

    let ledger = PublishLedger::open(&config.ledger_path)?;
    let store = StorePublisher::new(Arc::new(StorePool::new()), Arc::new(ledger))
        .with_timeout(config.store_timeout);
    let orchestrator = PublicationOrchestrator::new(
        config.output_root.clone(),
        registry,
        ontology.clone(),
        Arc::new(JsonFilePreferenceStore::new(&config.preferences_path)),
        Arc::new(store),
    );

    let worksheet = Arc::new(worksheet);
    let request = PublishRequest {
        workspace_id,
        worksheet: worksheet.clone(),
        semantic_types: document.semantic_types.clone(),
        owner_id: config.owner_id.clone(),
        config: config.publish.clone(),
    };
    let run = orchestrator.publish(request).await;

    let mapping = match (&config.mapping_out, run.is_done()) {
        (Some(path), true) => Some(export_mapping(
            path,
            &document,
            &worksheet,
            &ontology,
            &config,
        )?),
        _ => None,
    };

    if let Some(path) = &config.metrics_out {
        write_metrics(path, orchestrator.metrics())?;
    }

    Ok(RunResult { run, mapping })
}

fn load_ontologies(paths: &[std::path::PathBuf]) -> Result<Arc<Ontology>> {
    let mut ontology = Ontology::new();
    for path in paths {
        let loaded = Ontology::from_path(path)
            .with_context(|| format!("failed to load ontology {:?}", path))?;
        ontology.merge(loaded);
    }
    Ok(Arc::new(ontology))
}

fn write_metrics(path: &Path, metrics: &PublishMetrics) -> Result<()> {
    let text = metrics
        .encode()
        .map_err(|e| anyhow::anyhow!("failed to encode metrics: {e}"))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {:?}", parent))?;
    }
    std::fs::write(path, text).with_context(|| format!("failed to write metrics {:?}", path))?;
    tracing::info!(path = %path.display(), "metrics written");
    Ok(())
}

fn export_mapping(
    path: &Path,
    document: &AlignmentDocument,
    worksheet: &Worksheet,
    ontology: &Ontology,
    config: &AppConfig,
) -> Result<SerializedArtifact> {
    let mapping = MappingGenerator::new(ontology).generate(
        &document.alignment,
        &document.semantic_types,
        &config.publish.subject_prefix,
        &config.publish.subject_namespace,
        config.publish.add_inverse_properties,
    )?;
    let file_stem = format!("{}{}", config.owner_id, worksheet.id);
    let publisher = MappingPublisher::new(&mapping, &worksheet.title, file_stem);
    let artifact = publisher.write_to_file(path, &mut ErrorReport::new())?;
    tracing::info!(path = %artifact.path.display(), "R2RML mapping written");
    Ok(artifact)
}
