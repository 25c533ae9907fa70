//! Publication state machine
//!
//! One call to [`PublicationOrchestrator::publish`] drives a worksheet through
//!
//! ```text
//! Init -> AlignmentChecked -> Generated -> Serialized -> [StoreAttempted] -> Done
//!   \             \               \
//!    `-------------`---------------`--> Aborted
//! ```
//!
//! Preferences are saved on entry regardless of the outcome. Fatal failures
//! before the artifact exists abort the run with a generic message (the cause
//! is logged). A store failure does not abort: the artifact stays on disk and
//! the run finishes with [`StoreResult::Failure`].

use crate::alignment::{AlignmentRegistry, SemanticTypes, construct_alignment_id};
use crate::config::PublishConfig;
use crate::error::{ErrorCode, PublishError, StoreError};
use crate::logging::{publish_span, store_span};
use crate::mapping::MappingGenerator;
use crate::metrics::{METRICS, PublishMetrics, PublishRunMetrics};
use crate::ontology::Ontology;
use crate::preferences::{PreferenceStore, PublishRdfPreferences};
use crate::publisher::{ArtifactPublisher, WorksheetRdfPublisher};
use crate::report::ErrorReport;
use crate::serializer::SerializedArtifact;
use crate::store::{PublishStatus, StoreAck, StorePublisher};
use crate::worksheet::Worksheet;
use serde::Serialize;
use serde_json::{Value, json};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::task;
use tracing::Instrument;

pub const PUBLISH_RDF_UPDATE: &str = "PublishRDFUpdate";
pub const ERROR_UPDATE: &str = "KarmaError";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RunState {
    Init,
    AlignmentChecked,
    Generated,
    Serialized,
    StoreAttempted,
    Done,
    Aborted,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Why no store commit happened
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "camelCase")]
pub enum SkipReason {
    NotRequested,
    #[serde(rename_all = "camelCase")]
    AlreadyPublished { collection: String, sha256: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum StoreResult {
    Success(StoreAck),
    Failure { reason: String, code: i32 },
    Skipped(SkipReason),
}

impl StoreResult {
    fn from_store(result: Result<PublishStatus, StoreError>) -> Self {
        match result {
            Ok(PublishStatus::Committed(ack)) => StoreResult::Success(ack),
            Ok(PublishStatus::AlreadyPublished { collection, sha256 }) => {
                StoreResult::Skipped(SkipReason::AlreadyPublished { collection, sha256 })
            }
            Err(e) => StoreResult::Failure {
                reason: e.to_string(),
                code: e.code().code(),
            },
        }
    }

    fn metric_label(&self) -> &'static str {
        match self {
            StoreResult::Success(_) => "success",
            StoreResult::Failure { .. } => "failure",
            StoreResult::Skipped(_) => "skipped",
        }
    }
}

/// Everything one publish run needs from the caller
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub workspace_id: String,
    pub worksheet: Arc<Worksheet>,
    pub semantic_types: SemanticTypes,
    /// Prefixed to the worksheet id to name the artifact
    pub owner_id: String,
    pub config: PublishConfig,
}

/// Result of a run that reached `Done`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishOutcome {
    pub file_path: PathBuf,
    /// Artifact path relative to the output root, `/`-separated
    pub artifact_relative_path: String,
    pub worksheet_id: String,
    pub triple_count: usize,
    pub sha256: String,
    pub store_result: StoreResult,
    pub error_report: ErrorReport,
    #[serde(skip)]
    pub states: Vec<RunState>,
}

impl PublishOutcome {
    /// Payload returned to the client
    pub fn to_response(&self) -> Value {
        json!({
            "updateType": PUBLISH_RDF_UPDATE,
            "fileUrl": self.artifact_relative_path,
            "worksheetId": self.worksheet_id,
            "errorReport": self.error_report,
            "storeResult": self.store_result,
        })
    }
}

/// Result of a run that stopped before producing an artifact
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AbortedRun {
    pub worksheet_id: String,
    /// State the run was in when it failed
    pub failed_in: RunState,
    pub message: String,
    pub code: ErrorCode,
    pub error_report: ErrorReport,
    #[serde(skip)]
    pub states: Vec<RunState>,
}

impl AbortedRun {
    pub fn to_response(&self) -> Value {
        json!({
            "updateType": ERROR_UPDATE,
            "Error": self.message,
            "worksheetId": self.worksheet_id,
            "errorReport": self.error_report,
        })
    }
}

#[derive(Debug, Clone)]
pub enum PublishRun {
    Done(PublishOutcome),
    Aborted(AbortedRun),
}

impl PublishRun {
    pub fn to_response(&self) -> Value {
        match self {
            PublishRun::Done(outcome) => outcome.to_response(),
            PublishRun::Aborted(aborted) => aborted.to_response(),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, PublishRun::Done(_))
    }

    pub fn states(&self) -> &[RunState] {
        match self {
            PublishRun::Done(outcome) => &outcome.states,
            PublishRun::Aborted(aborted) => &aborted.states,
        }
    }
}

/// State and transitions of one run
struct RunTracker {
    worksheet_id: String,
    states: Vec<RunState>,
}

impl RunTracker {
    fn new(worksheet_id: &str) -> Self {
        Self {
            worksheet_id: worksheet_id.to_string(),
            states: vec![RunState::Init],
        }
    }

    fn current(&self) -> RunState {
        self.states.last().copied().unwrap_or(RunState::Init)
    }

    fn advance(&mut self, next: RunState) {
        tracing::debug!(from = %self.current(), to = %next, "publish state transition");
        self.states.push(next);
    }

    fn abort(mut self, error: PublishError, report: ErrorReport) -> PublishRun {
        let failed_in = self.current();
        match &error {
            PublishError::AlignmentMissing { .. } => {
                tracing::warn!(state = %failed_in, error = %error, "publish aborted")
            }
            _ => tracing::error!(state = %failed_in, code = %error.code(), error = %error, "publish aborted"),
        }
        self.advance(RunState::Aborted);
        PublishRun::Aborted(AbortedRun {
            worksheet_id: self.worksheet_id,
            failed_in,
            message: error.user_message().to_string(),
            code: error.code(),
            error_report: report,
            states: self.states,
        })
    }
}

pub struct PublicationOrchestrator {
    output_root: PathBuf,
    registry: Arc<AlignmentRegistry>,
    ontology: Arc<Ontology>,
    preferences: Arc<dyn PreferenceStore>,
    store: Arc<StorePublisher>,
    metrics: Arc<PublishMetrics>,
}

impl PublicationOrchestrator {
    pub fn new(
        output_root: impl Into<PathBuf>,
        registry: Arc<AlignmentRegistry>,
        ontology: Arc<Ontology>,
        preferences: Arc<dyn PreferenceStore>,
        store: Arc<StorePublisher>,
    ) -> Self {
        Self {
            output_root: output_root.into(),
            registry,
            ontology,
            preferences,
            store,
            metrics: METRICS.clone(),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<PublishMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn metrics(&self) -> &PublishMetrics {
        &self.metrics
    }

    /// Run one publication to completion
    pub async fn publish(&self, request: PublishRequest) -> PublishRun {
        let span = publish_span(&request.worksheet.id, &request.workspace_id);
        let run_metrics = PublishRunMetrics::new(self.metrics.clone());
        let run = self.run(request).instrument(span).await;
        run_metrics.finish(if run.is_done() { "done" } else { "aborted" });
        run
    }

    async fn run(&self, request: PublishRequest) -> PublishRun {
        let PublishRequest {
            workspace_id,
            worksheet,
            semantic_types,
            owner_id,
            config,
        } = request;
        let mut tracker = RunTracker::new(&worksheet.id);

        self.save_preferences(&config);

        // Init -> AlignmentChecked
        let alignment_id = construct_alignment_id(&workspace_id, &worksheet.id);
        let Some(alignment) = self.registry.get(&alignment_id) else {
            return tracker.abort(
                PublishError::AlignmentMissing {
                    worksheet_id: worksheet.id.clone(),
                },
                ErrorReport::new(),
            );
        };
        tracker.advance(RunState::AlignmentChecked);

        // AlignmentChecked -> Generated
        let mut report = ErrorReport::new();
        let started = Instant::now();
        let mapping = match MappingGenerator::new(&self.ontology).generate(
            &alignment,
            &semantic_types,
            &config.subject_prefix,
            &config.subject_namespace,
            config.add_inverse_properties,
        ) {
            Ok(mapping) => mapping,
            Err(e) => return tracker.abort(e.into(), report),
        };
        self.metrics.record_phase("mapping", started.elapsed());
        for warning in &mapping.warnings {
            report.warning(warning.column_id.clone(), warning.message.clone());
        }
        tracing::debug!(
            triples_maps = mapping.triples_maps.len(),
            warnings = mapping.warnings.len(),
            "mapping generated"
        );
        tracker.advance(RunState::Generated);

        // Generated -> Serialized
        let started = Instant::now();
        let output_root = self.output_root.clone();
        let file_stem = format!("{}{}", owner_id, worksheet.id);
        let syntax = config.syntax;
        let rows = worksheet.clone();
        let worker = task::spawn_blocking(move || {
            let result = WorksheetRdfPublisher::new(&mapping, &rows.rows, syntax, file_stem)
                .and_then(|publisher| {
                    let relative = publisher.relative_path();
                    publisher
                        .publish(&output_root, &mut report)
                        .map(|artifact| (artifact, relative))
                });
            (result, report)
        })
        .await;
        let (result, report) = match worker {
            Ok(done) => done,
            Err(e) => {
                return tracker.abort(PublishError::Worker(e.to_string()), ErrorReport::new());
            }
        };
        let (artifact, relative) = match result {
            Ok(written) => written,
            Err(e) => return tracker.abort(e, report),
        };
        self.metrics.record_phase("serialize", started.elapsed());
        self.metrics
            .record_generation(artifact.triple_count, report.error_count());
        crate::log_slow_phase!(
            started.elapsed(),
            5_000,
            triples = artifact.triple_count,
            row_errors = report.error_count(),
            "artifact serialized"
        );
        tracker.advance(RunState::Serialized);

        // Serialized -> StoreAttempted
        let store_result = if config.persist_to_store {
            tracker.advance(RunState::StoreAttempted);
            self.commit(&artifact, &config).await
        } else {
            StoreResult::Skipped(SkipReason::NotRequested)
        };

        tracker.advance(RunState::Done);
        tracing::info!(
            path = %artifact.path.display(),
            triples = artifact.triple_count,
            row_errors = report.error_count(),
            store = store_result.metric_label(),
            "publish finished"
        );

        PublishRun::Done(PublishOutcome {
            file_path: artifact.path,
            artifact_relative_path: relative.to_string_lossy().replace('\\', "/"),
            worksheet_id: worksheet.id.clone(),
            triple_count: artifact.triple_count,
            sha256: artifact.sha256,
            store_result,
            error_report: report,
            states: tracker.states,
        })
    }

    fn save_preferences(&self, config: &PublishConfig) {
        if let Err(e) = PublishRdfPreferences::from_config(config).save(self.preferences.as_ref()) {
            tracing::warn!(error = %e, "failed to save publish preferences");
        }
    }

    async fn commit(&self, artifact: &SerializedArtifact, config: &PublishConfig) -> StoreResult {
        let span = store_span(&config.store.backend.to_string(), &config.store.model_name);
        let started = Instant::now();
        let result = StoreResult::from_store(
            self.store
                .publish(&artifact.path, artifact.syntax, &config.store)
                .instrument(span)
                .await,
        );
        self.metrics.record_phase("store", started.elapsed());
        self.metrics
            .record_store(&config.store.backend.to_string(), result.metric_label());

        if let StoreResult::Failure { reason, code } = &result {
            tracing::error!(
                endpoint = %config.store.endpoint(),
                code,
                reason = %reason,
                "store commit failed, artifact kept on disk"
            );
        }
        result
    }
}
