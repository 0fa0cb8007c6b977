//! `graphrunner`: the facade an embedder depends on.
//!
//! Re-exports the step data model, dependency graph, object store,
//! persistence layer, scheduler, and uploader from their respective
//! crates, and wires them into one entrypoint: [`run_integration`] runs a
//! declared set of steps to completion, and [`synchronize`] streams the
//! staged result into a remote synchronization job (spec §1: "The core").
//!
//! Grounded on the teacher's root `ada-n8n` package, which wires
//! `clients`/`config`/`handlers` into one deployable behind `AppState`;
//! here the wiring point is a library entrypoint rather than an HTTP
//! server, since the runtime itself (not an HTTP surface) is in scope
//! per spec §1's Non-goals.

mod error;
mod logger;

use std::path::PathBuf;
use std::sync::Arc;

pub use error::GraphRunnerError;
pub use logger::TracingLogger;

pub use graphrunner_core::{
    AfterExecution, DefaultExecutionHandlerWrapper, ExecutionHandlerWrapper, GetStepStartStates,
    InvocationConfig, Logger, Metric, Scheduler, SchedulerConfig, SchedulerError, StepContext,
    StepDeclaration, StepHandler, StepStartState, ValidateInvocation,
};
pub use graphrunner_graph::{DependencyGraph, GraphError};
pub use graphrunner_model::{
    DirectRelationship, Entity, EntityClass, FlushedFile, GraphObject, MappedRelationship,
    PartialDatasetMetadata, Properties, Relationship, RelationshipDirection, RelationshipMapping,
    RunSummary, RunSummaryMetadata, Step, StepEntityMetadata, StepRelationshipMetadata,
    StepResult, StepStatus,
};
pub use graphrunner_persist::{DirStats, GraphFile, PersistError, StagingRoot};
pub use graphrunner_store::{EntityHook, PermissiveValidator, RelationshipHook, SchemaValidator, StoreError};
pub use graphrunner_sync::{
    JobSource, ShrinkReport, SyncJob, UploadError, UploadEvent, UploadReport, Uploader,
    UploaderConfig,
};

pub use tokio_util::sync::CancellationToken;

const DEFAULT_STAGING_ROOT: &str = ".j1-integration";
const COMPRESSION_ENV_VAR: &str = "INTEGRATION_FILE_COMPRESSION_ENABLED";

/// Installs a `tracing_subscriber` registry with an `EnvFilter` layer,
/// the way the teacher's `main.rs` does for its own binary. CLI
/// bootstrapping is out of scope (spec §1's Non-goals), but an embedder
/// wiring this crate into its own binary gets the teacher's default
/// filter/format setup for free instead of hand-rolling one.
pub fn init_tracing(default_filter: &str) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Everything the run needs that isn't part of the embedder's
/// [`InvocationConfig`] (spec §1's Non-goals: `.env` loading is external,
/// but the two env vars §6 actually names are read here).
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub staging_root: PathBuf,
    pub compression_enabled: bool,
    pub scheduler: SchedulerConfig,
    /// Mirrors the run's `enableSchemaValidation` option (spec §4.5); ORed
    /// with whatever the `InvocationConfig` itself sets.
    pub enable_schema_validation: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            staging_root: PathBuf::from(DEFAULT_STAGING_ROOT),
            compression_enabled: false,
            scheduler: SchedulerConfig::default(),
            enable_schema_validation: false,
        }
    }
}

impl RunnerConfig {
    pub fn new(staging_root: impl Into<PathBuf>) -> Self {
        RunnerConfig {
            staging_root: staging_root.into(),
            ..RunnerConfig::default()
        }
    }

    /// Reads `INTEGRATION_FILE_COMPRESSION_ENABLED` (spec §6); every other
    /// field keeps its default and can be overridden afterward.
    pub fn from_env(staging_root: impl Into<PathBuf>) -> Self {
        let compression_enabled = std::env::var(COMPRESSION_ENV_VAR)
            .map(|v| !v.is_empty())
            .unwrap_or(false);
        RunnerConfig {
            compression_enabled,
            ..RunnerConfig::new(staging_root)
        }
    }
}

/// The remote-service details [`synchronize`] needs: where to upload and
/// which job-source body to initiate with (spec §4.6, step 1).
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub base_url: String,
    pub source: JobSource,
    pub uploader: UploaderConfig,
}

/// Run every declared step to completion, write `summary.json`, and
/// return the in-memory equivalent (spec §4.5, §4.2).
///
/// Clears and recreates the staging root first (spec §4.2: "At run start
/// the root is removed recursively and recreated").
pub async fn run_integration(
    config: &RunnerConfig,
    mut invocation: InvocationConfig,
    logger: Arc<dyn Logger>,
    cancellation: CancellationToken,
) -> Result<RunSummary, GraphRunnerError> {
    invocation.enable_schema_validation |= config.enable_schema_validation;

    let persist = Arc::new(StagingRoot::new(
        &config.staging_root,
        config.compression_enabled,
    ));
    persist.prepare()?;

    let scheduler = Scheduler::new(persist, logger, config.scheduler);
    let summary = scheduler.run(invocation, cancellation).await?;
    Ok(summary)
}

/// Upload the staging root produced by a prior [`run_integration`] call
/// into a remote synchronization job (spec §4.6).
pub async fn synchronize(
    config: &RunnerConfig,
    sync: &SyncConfig,
    summary: &RunSummary,
    logger: &dyn Logger,
    cancellation: &CancellationToken,
) -> Result<UploadReport, GraphRunnerError> {
    let persist = StagingRoot::new(&config.staging_root, config.compression_enabled);
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .map_err(UploadError::Transport)?;

    let uploader = Uploader::new(client, sync.base_url.clone(), sync.uploader);
    let report = uploader
        .run(sync.source.clone(), &persist, summary, logger, cancellation)
        .await?;
    Ok(report)
}
