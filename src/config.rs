use crate::preferences::{JsonFilePreferenceStore, PublishRdfPreferences};
use crate::serializer::RdfSyntax;
use crate::store::{DEFAULT_MODEL_NAME, StoreBackendKind, StoreConnectionInfo};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_SUBJECT_PREFIX: &str = "s";
const DEFAULT_SUBJECT_NAMESPACE: &str = "http://localhost:8080/source/";
const DEFAULT_DATABASE: &str = "karma";
const DEFAULT_STORE_DIR: &str = "stores";
const DEFAULT_OWNER_ID: &str = "WSP1";
const DEFAULT_WORKSPACE_ID: &str = "default";
const DEFAULT_STORE_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyntaxArg {
    Turtle,
    N3,
    #[value(alias = "nt")]
    NTriples,
    #[value(alias = "xml")]
    RdfXml,
}

impl From<SyntaxArg> for RdfSyntax {
    fn from(value: SyntaxArg) -> Self {
        match value {
            SyntaxArg::Turtle => RdfSyntax::Turtle,
            SyntaxArg::N3 => RdfSyntax::N3,
            SyntaxArg::NTriples => RdfSyntax::NTriples,
            SyntaxArg::RdfXml => RdfSyntax::RdfXml,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendArg {
    Embedded,
    Http,
}

impl From<BackendArg> for StoreBackendKind {
    fn from(value: BackendArg) -> Self {
        match value {
            BackendArg::Embedded => StoreBackendKind::Embedded,
            BackendArg::Http => StoreBackendKind::Http,
        }
    }
}

/// Options of one publish request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishConfig {
    pub subject_prefix: String,
    pub subject_namespace: String,
    pub add_inverse_properties: bool,
    pub persist_to_store: bool,
    pub syntax: RdfSyntax,
    pub store: StoreConnectionInfo,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            subject_prefix: DEFAULT_SUBJECT_PREFIX.to_string(),
            subject_namespace: DEFAULT_SUBJECT_NAMESPACE.to_string(),
            add_inverse_properties: false,
            persist_to_store: false,
            syntax: RdfSyntax::Turtle,
            store: StoreConnectionInfo::new(
                StoreBackendKind::Embedded,
                DEFAULT_STORE_DIR,
                DEFAULT_DATABASE,
            ),
        }
    }
}

impl PublishConfig {
    /// Fill unset values from saved preferences
    pub fn with_preferences(mut self, prefs: &PublishRdfPreferences) -> Self {
        if let Some(prefix) = &prefs.rdf_prefix {
            self.subject_prefix = prefix.clone();
        }
        if let Some(namespace) = &prefs.rdf_namespace {
            self.subject_namespace = namespace.clone();
        }
        if let Some(add) = prefs.add_inverse_properties {
            self.add_inverse_properties = add;
        }
        if let Some(save) = prefs.save_to_store {
            self.persist_to_store = save;
        }
        if let Some(db) = &prefs.db_name {
            self.store.database = db.clone();
        }
        if let Some(host) = &prefs.host_name {
            self.store.host = host.clone();
        }
        if let Some(user) = &prefs.user_name {
            self.store.user = Some(user.clone());
        }
        if let Some(model) = &prefs.model_name {
            self.store.model_name = model.clone();
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.subject_namespace.trim().is_empty(),
            "subject namespace must not be empty"
        );
        oxigraph::model::NamedNode::new(self.subject_namespace.as_str())
            .with_context(|| format!("subject namespace {} is not an IRI", self.subject_namespace))?;
        anyhow::ensure!(
            self.subject_prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'),
            "subject prefix {:?} is not a valid prefix name",
            self.subject_prefix
        );
        if self.persist_to_store {
            self.store.validate()?;
            if self.store.backend == StoreBackendKind::Http {
                anyhow::ensure!(
                    self.store.user.is_some() || self.store.credential.is_none(),
                    "a store credential was given without a user name"
                );
            }
        }
        Ok(())
    }
}

/// Everything the binary needs for one run
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub output_root: PathBuf,
    pub worksheet: PathBuf,
    pub sheet: Option<String>,
    pub worksheet_id: Option<String>,
    pub alignment: PathBuf,
    pub ontologies: Vec<PathBuf>,
    pub workspace_id: String,
    pub owner_id: String,
    pub preferences_path: PathBuf,
    pub ledger_path: PathBuf,
    pub mapping_out: Option<PathBuf>,
    /// Prometheus text exposition of the run's metrics
    pub metrics_out: Option<PathBuf>,
    pub store_timeout: Duration,
    pub publish: PublishConfig,
}

impl AppConfig {
    /// Merge CLI, config file and saved preferences (in that order of
    /// precedence) over the defaults.
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let CliArgs {
            config,
            worksheet: cli_worksheet,
            sheet: cli_sheet,
            worksheet_id: cli_worksheet_id,
            alignment: cli_alignment,
            ontology: cli_ontology,
            workspace_id: cli_workspace_id,
            owner_id: cli_owner_id,
            output_root: cli_output_root,
            preferences: cli_preferences,
            mapping_out: cli_mapping_out,
            metrics_out: cli_metrics_out,
            prefix: cli_prefix,
            namespace: cli_namespace,
            add_inverse_properties: cli_add_inverse,
            save_to_store: cli_save_to_store,
            syntax: cli_syntax,
            store_backend: cli_store_backend,
            host_name: cli_host_name,
            db_name: cli_db_name,
            user_name: cli_user_name,
            password: cli_password,
            model_name: cli_model_name,
            store_timeout_secs: cli_store_timeout,
        } = args;

        let file_config = if let Some(path) = config.as_ref() {
            load_config_file(path)?
        } else {
            PartialConfig::default()
        };

        let PartialConfig {
            worksheet: file_worksheet,
            sheet: file_sheet,
            worksheet_id: file_worksheet_id,
            alignment: file_alignment,
            ontologies: file_ontologies,
            workspace_id: file_workspace_id,
            owner_id: file_owner_id,
            output_root: file_output_root,
            preferences: file_preferences,
            mapping_out: file_mapping_out,
            metrics_out: file_metrics_out,
            prefix: file_prefix,
            namespace: file_namespace,
            add_inverse_properties: file_add_inverse,
            save_to_store: file_save_to_store,
            syntax: file_syntax,
            store_backend: file_store_backend,
            host_name: file_host_name,
            db_name: file_db_name,
            user_name: file_user_name,
            password: file_password,
            model_name: file_model_name,
            store_timeout_secs: file_store_timeout,
        } = file_config;

        let output_root = cli_output_root
            .or(file_output_root)
            .unwrap_or_else(|| PathBuf::from("."));
        let worksheet = cli_worksheet
            .or(file_worksheet)
            .context("a worksheet file is required (--worksheet)")?;
        let alignment = cli_alignment
            .or(file_alignment)
            .context("an alignment document is required (--alignment)")?;
        let ontologies = cli_ontology
            .filter(|list| !list.is_empty())
            .or(file_ontologies)
            .unwrap_or_default();

        let preferences_path = cli_preferences
            .or(file_preferences)
            .unwrap_or_else(|| output_root.join("preferences.json"));
        let saved = PublishRdfPreferences::load(&JsonFilePreferenceStore::new(&preferences_path))?;

        let mut publish = PublishConfig::default();
        if let Some(saved) = saved.as_ref() {
            publish = publish.with_preferences(saved);
        }
        if let Some(prefix) = cli_prefix.or(file_prefix) {
            publish.subject_prefix = prefix;
        }
        if let Some(namespace) = cli_namespace.or(file_namespace) {
            publish.subject_namespace = namespace;
        }
        if let Some(add) = cli_add_inverse.or(file_add_inverse) {
            publish.add_inverse_properties = add;
        }
        if let Some(save) = cli_save_to_store.or(file_save_to_store) {
            publish.persist_to_store = save;
        }
        if let Some(syntax) = cli_syntax.or(file_syntax) {
            publish.syntax = syntax.into();
        }
        if let Some(backend) = cli_store_backend.or(file_store_backend) {
            publish.store.backend = backend.into();
        }
        if let Some(host) = cli_host_name.or(file_host_name) {
            publish.store.host = host;
        }
        if let Some(db) = cli_db_name.or(file_db_name) {
            publish.store.database = db;
        }
        if let Some(user) = cli_user_name.or(file_user_name) {
            publish.store.user = Some(user);
        }
        publish.store.credential = cli_password.or(file_password);
        publish.store.model_name = cli_model_name
            .or(file_model_name)
            .unwrap_or(publish.store.model_name);
        if publish.store.model_name.trim().is_empty() {
            publish.store.model_name = DEFAULT_MODEL_NAME.to_string();
        }
        if publish.store.backend == StoreBackendKind::Embedded
            && Path::new(&publish.store.host).is_relative()
        {
            publish.store.host = output_root.join(&publish.store.host).display().to_string();
        }

        let store_timeout = Duration::from_secs(
            cli_store_timeout
                .or(file_store_timeout)
                .unwrap_or(DEFAULT_STORE_TIMEOUT_SECS)
                .max(1),
        );

        Ok(Self {
            ledger_path: output_root.join("publish").join("ledger.json"),
            output_root,
            worksheet,
            sheet: cli_sheet.or(file_sheet),
            worksheet_id: cli_worksheet_id.or(file_worksheet_id),
            alignment,
            ontologies,
            workspace_id: cli_workspace_id
                .or(file_workspace_id)
                .unwrap_or_else(|| DEFAULT_WORKSPACE_ID.to_string()),
            owner_id: cli_owner_id
                .or(file_owner_id)
                .unwrap_or_else(|| DEFAULT_OWNER_ID.to_string()),
            preferences_path,
            mapping_out: cli_mapping_out.or(file_mapping_out),
            metrics_out: cli_metrics_out.or(file_metrics_out),
            store_timeout,
            publish,
        })
    }

    /// Fail fast on anything that would only break mid-run
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.worksheet.is_file(),
            "worksheet {:?} does not exist",
            self.worksheet
        );
        anyhow::ensure!(
            self.alignment.is_file(),
            "alignment document {:?} does not exist",
            self.alignment
        );
        for ontology in &self.ontologies {
            anyhow::ensure!(ontology.is_file(), "ontology {:?} does not exist", ontology);
        }
        anyhow::ensure!(
            !self.owner_id.is_empty() && !self.owner_id.contains(['/', '\\']),
            "owner id {:?} must be a non-empty file name fragment",
            self.owner_id
        );
        if self.output_root.exists() {
            anyhow::ensure!(
                self.output_root.is_dir(),
                "output root {:?} is not a directory",
                self.output_root
            );
        }
        self.publish.validate()
    }
}

#[derive(Parser, Debug, Default, Clone)]
#[command(
    name = "worksheet-rdf",
    about = "Publish an aligned worksheet as RDF",
    version
)]
pub struct CliArgs {
    #[arg(long, value_name = "FILE", help = "Path to a configuration file (YAML or JSON)")]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        env = "WORKSHEET_RDF_WORKSHEET",
        value_name = "FILE",
        help = "Worksheet to publish (.xlsx or .json)"
    )]
    pub worksheet: Option<PathBuf>,

    #[arg(long, env = "WORKSHEET_RDF_SHEET", value_name = "NAME", help = "Sheet name inside an .xlsx workbook")]
    pub sheet: Option<String>,

    #[arg(long, env = "WORKSHEET_RDF_WORKSHEET_ID", value_name = "ID", help = "Worksheet id (defaults to the sheet name)")]
    pub worksheet_id: Option<String>,

    #[arg(
        long,
        env = "WORKSHEET_RDF_ALIGNMENT",
        value_name = "FILE",
        help = "Alignment document (JSON)"
    )]
    pub alignment: Option<PathBuf>,

    #[arg(
        long,
        env = "WORKSHEET_RDF_ONTOLOGY",
        value_name = "FILE",
        value_delimiter = ',',
        help = "Ontology files consulted for inverse properties and datatypes"
    )]
    pub ontology: Option<Vec<PathBuf>>,

    #[arg(long, env = "WORKSHEET_RDF_WORKSPACE", value_name = "ID", help = "Workspace the worksheet belongs to")]
    pub workspace_id: Option<String>,

    #[arg(
        long,
        env = "WORKSHEET_RDF_OWNER_ID",
        value_name = "ID",
        help = "Preferences owner id, used as the artifact file name prefix"
    )]
    pub owner_id: Option<String>,

    #[arg(long, env = "WORKSHEET_RDF_OUTPUT_ROOT", value_name = "DIR", help = "Root directory for published artifacts")]
    pub output_root: Option<PathBuf>,

    #[arg(long, env = "WORKSHEET_RDF_PREFERENCES", value_name = "FILE", help = "Preferences file")]
    pub preferences: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help = "Also write the generated R2RML mapping here")]
    pub mapping_out: Option<PathBuf>,

    #[arg(
        long,
        env = "WORKSHEET_RDF_METRICS_OUT",
        value_name = "FILE",
        help = "Write publish metrics in Prometheus text format here"
    )]
    pub metrics_out: Option<PathBuf>,

    #[arg(long, env = "WORKSHEET_RDF_PREFIX", value_name = "PREFIX", help = "Prefix for the subject namespace")]
    pub prefix: Option<String>,

    #[arg(long, env = "WORKSHEET_RDF_NAMESPACE", value_name = "IRI", help = "Namespace for generated subject IRIs")]
    pub namespace: Option<String>,

    #[arg(
        long,
        env = "WORKSHEET_RDF_ADD_INVERSE_PROPERTIES",
        value_name = "BOOL",
        help = "Also emit inverse properties declared in the ontology"
    )]
    pub add_inverse_properties: Option<bool>,

    #[arg(
        long,
        env = "WORKSHEET_RDF_SAVE_TO_STORE",
        value_name = "BOOL",
        help = "Commit the artifact to the triple store"
    )]
    pub save_to_store: Option<bool>,

    #[arg(long, env = "WORKSHEET_RDF_SYNTAX", value_enum, value_name = "SYNTAX", help = "Output syntax")]
    pub syntax: Option<SyntaxArg>,

    #[arg(long, env = "WORKSHEET_RDF_STORE_BACKEND", value_enum, value_name = "BACKEND", help = "Triple store backend")]
    pub store_backend: Option<BackendArg>,

    #[arg(
        long,
        env = "WORKSHEET_RDF_STORE_HOST",
        value_name = "HOST",
        help = "Store directory (embedded) or host[:port] (http)"
    )]
    pub host_name: Option<String>,

    #[arg(long, env = "WORKSHEET_RDF_STORE_DB", value_name = "NAME", help = "Store database name")]
    pub db_name: Option<String>,

    #[arg(long, env = "WORKSHEET_RDF_STORE_USER", value_name = "USER", help = "Store user name")]
    pub user_name: Option<String>,

    #[arg(
        long,
        env = "WORKSHEET_RDF_STORE_PASSWORD",
        value_name = "PASSWORD",
        hide_env_values = true,
        help = "Store credential (never saved to preferences)"
    )]
    pub password: Option<String>,

    #[arg(long, env = "WORKSHEET_RDF_MODEL_NAME", value_name = "NAME", help = "Model (graph) name inside the store")]
    pub model_name: Option<String>,

    #[arg(
        long,
        env = "WORKSHEET_RDF_STORE_TIMEOUT",
        value_name = "SECS",
        help = "Timeout for remote store requests",
        value_parser = clap::value_parser!(u64)
    )]
    pub store_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
struct PartialConfig {
    worksheet: Option<PathBuf>,
    sheet: Option<String>,
    worksheet_id: Option<String>,
    alignment: Option<PathBuf>,
    ontologies: Option<Vec<PathBuf>>,
    workspace_id: Option<String>,
    owner_id: Option<String>,
    output_root: Option<PathBuf>,
    preferences: Option<PathBuf>,
    mapping_out: Option<PathBuf>,
    metrics_out: Option<PathBuf>,
    prefix: Option<String>,
    namespace: Option<String>,
    add_inverse_properties: Option<bool>,
    save_to_store: Option<bool>,
    syntax: Option<SyntaxArg>,
    store_backend: Option<BackendArg>,
    host_name: Option<String>,
    db_name: Option<String>,
    user_name: Option<String>,
    password: Option<String>,
    model_name: Option<String>,
    store_timeout_secs: Option<u64>,
}

fn load_config_file(path: &Path) -> Result<PartialConfig> {
    if !path.exists() {
        anyhow::bail!("config file {:?} does not exist", path);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {:?}", path))?;
    let ext = path
        .extension()
        .and_then(|os| os.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let parsed = match ext.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse YAML config {:?}", path))?,
        "json" => serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse JSON config {:?}", path))?,
        other => anyhow::bail!("unsupported config extension: {other}"),
    };
    Ok(parsed)
}
