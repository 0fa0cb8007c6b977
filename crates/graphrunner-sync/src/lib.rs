//! Bulk synchronization uploader (spec §4.6): job lifecycle, batching,
//! bounded concurrency, retry, and raw-data shrinking.
//!
//! Grounded on the teacher's `clients.rs` HTTP-client shape (a thin
//! wrapper around a shared `reqwest::Client` with one method per
//! endpoint) for the job-lifecycle calls, and on the teacher's
//! `WorkflowEngine::execute_with_events` `mpsc`-channel event stream for
//! the event queue that must drain before finalize returns (spec §5).

mod error;
mod retry;
mod shrink;

use std::sync::Mutex;

use futures::stream::{self, StreamExt};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

pub use error::UploadError;
pub use retry::{delay_for_attempt, BACKOFF_FACTOR, BASE_DELAY_MS, MAX_ATTEMPTS};
pub use shrink::{shrink_batch, ShrinkReport};

use graphrunner_core::Logger;
use graphrunner_model::{Entity, FlushedFile, Relationship, RunSummary};
use graphrunner_persist::{GraphFile, StagingRoot};

/// `POST /persister/synchronization/jobs` body (spec §4.6, step 1).
#[derive(Debug, Clone)]
pub enum JobSource {
    IntegrationManaged { integration_instance_id: String },
    Explicit { source: String, scope: Option<Value> },
}

/// A remote-service-side resource accumulating this run's uploads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncJob {
    pub job_id: String,
}

#[derive(Debug, Clone, Copy)]
pub struct UploaderConfig {
    pub batch_size: usize,
    pub concurrency: usize,
    pub max_batch_bytes: usize,
    pub max_attempts: u32,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        UploaderConfig {
            batch_size: 250,
            concurrency: 6,
            max_batch_bytes: 6_275_072,
            max_attempts: MAX_ATTEMPTS,
        }
    }
}

/// What one upload pass accomplished, for logging/diagnostics.
#[derive(Debug, Clone, Default)]
pub struct UploadReport {
    pub batches_uploaded: usize,
    pub shrink_reports: Vec<ShrinkReport>,
}

/// One queued note about upload progress. Drained into the logger before
/// finalize returns (spec §4.6: "attaches an event queue that drains
/// before the upload completes").
#[derive(Debug, Clone)]
pub struct UploadEvent {
    pub stage: &'static str,
    pub detail: String,
}

#[derive(Default)]
struct EventQueue {
    events: Mutex<Vec<UploadEvent>>,
}

impl EventQueue {
    fn push(&self, stage: &'static str, detail: impl Into<String>) {
        self.events.lock().unwrap().push(UploadEvent {
            stage,
            detail: detail.into(),
        });
    }

    fn drain(&self) -> Vec<UploadEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

enum Batch {
    Entities(Vec<Entity>),
    Relationships(Vec<Relationship>),
}

impl Batch {
    fn kind(&self) -> &'static str {
        match self {
            Batch::Entities(_) => "entities",
            Batch::Relationships(_) => "relationships",
        }
    }

    fn into_values(self) -> Vec<Value> {
        match self {
            Batch::Entities(items) => items
                .into_iter()
                .map(|e| serde_json::to_value(e).expect("Entity always serializes"))
                .collect(),
            Batch::Relationships(items) => items
                .into_iter()
                .map(|r| serde_json::to_value(r).expect("Relationship always serializes"))
                .collect(),
        }
    }
}

fn batches_for(graph_files: &[GraphFile], batch_size: usize) -> Vec<Batch> {
    let mut batches = Vec::new();
    for file in graph_files {
        match &file.content {
            FlushedFile::Entities { entities } if !entities.is_empty() => {
                for chunk in entities.chunks(batch_size) {
                    batches.push(Batch::Entities(chunk.to_vec()));
                }
            }
            FlushedFile::Relationships { relationships } if !relationships.is_empty() => {
                for chunk in relationships.chunks(batch_size) {
                    batches.push(Batch::Relationships(chunk.to_vec()));
                }
            }
            _ => {}
        }
    }
    batches
}

fn batch_body(kind: &str, items: &[Value]) -> Value {
    let mut map = serde_json::Map::new();
    map.insert(kind.to_string(), Value::Array(items.to_vec()));
    Value::Object(map)
}

/// Drives the synchronization lifecycle against a remote HTTP service
/// (spec §4.6).
pub struct Uploader {
    client: reqwest::Client,
    base_url: String,
    config: UploaderConfig,
}

impl Uploader {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, config: UploaderConfig) -> Self {
        Uploader {
            client,
            base_url: base_url.into(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Interpret a response as success, a shrink-required 413, a fatal
    /// application error, a transient credentials error, or a generic
    /// `SYNC_API_ERROR` (spec §4.6, retry error handler).
    async fn send(&self, url: &str, body: &Value) -> Result<Value, UploadError> {
        let response = self.client.post(url).json(body).send().await?;
        let status = response.status();
        if status.as_u16() == 413 {
            return Err(UploadError::TooLarge);
        }
        let parsed: Value = response.json().await.unwrap_or(Value::Null);
        if status.is_success() {
            return Ok(parsed);
        }

        let code = parsed
            .pointer("/error/code")
            .and_then(Value::as_str)
            .unwrap_or("");
        match code {
            "RequestEntityTooLargeException" => Err(UploadError::TooLarge),
            "JOB_NOT_AWAITING_UPLOADS" => Err(UploadError::Fatal(parsed.to_string())),
            "CredentialsError" => Err(UploadError::CredentialsTransient),
            _ => Err(UploadError::Api(format!("status {status}: {parsed}"))),
        }
    }

    /// `POST /persister/synchronization/jobs` (spec §4.6, step 1).
    pub async fn initiate(&self, source: JobSource) -> Result<SyncJob, UploadError> {
        let body = match source {
            JobSource::IntegrationManaged {
                integration_instance_id,
            } => json!({
                "source": "integration-managed",
                "integrationInstanceId": integration_instance_id,
            }),
            JobSource::Explicit { source, scope } => {
                let mut map = serde_json::Map::new();
                map.insert("source".to_string(), Value::String(source));
                if let Some(scope) = scope {
                    map.insert("scope".to_string(), scope);
                }
                Value::Object(map)
            }
        };

        let response = self.send(&self.url("/persister/synchronization/jobs"), &body).await?;
        let job_id = response
            .get("jobId")
            .and_then(Value::as_str)
            .ok_or_else(|| UploadError::Api(format!("initiate response missing jobId: {response}")))?
            .to_string();
        Ok(SyncJob { job_id })
    }

    /// Retry one batch POST per §4.6's exact error-handler rules, shrinking
    /// in place on a 413/`RequestEntityTooLargeException` and giving up
    /// immediately on `JOB_NOT_AWAITING_UPLOADS`.
    async fn upload_batch_with_retry(
        &self,
        job: &SyncJob,
        batch: Batch,
        cancellation: &CancellationToken,
    ) -> Result<Option<ShrinkReport>, UploadError> {
        let kind = batch.kind();
        let url = self.url(&format!(
            "/persister/synchronization/jobs/{}/{}",
            job.job_id, kind
        ));
        let mut items = batch.into_values();
        let mut shrink_report = None;

        for attempt in 1..=self.config.max_attempts {
            if cancellation.is_cancelled() {
                return Err(UploadError::Api("upload cancelled".to_string()));
            }

            let body = batch_body(kind, &items);
            match self.send(&url, &body).await {
                Ok(_) => return Ok(shrink_report),
                Err(UploadError::TooLarge) => {
                    let report = shrink_batch(&mut items, self.config.max_batch_bytes)?;
                    shrink_report = Some(report);
                }
                Err(UploadError::Fatal(msg)) => return Err(UploadError::Fatal(msg)),
                Err(UploadError::CredentialsTransient) => {}
                Err(e) => {
                    tracing::warn!(%kind, attempt, error = %e, "upload batch failed, retrying");
                }
            }

            if attempt < self.config.max_attempts {
                tokio::time::sleep(delay_for_attempt(attempt)).await;
            }
        }

        Err(UploadError::Api(format!(
            "exhausted {} attempts uploading a {kind} batch",
            self.config.max_attempts
        )))
    }

    /// Upload every batch under `graph_files` with the configured
    /// concurrency limit (spec §4.6, step 2).
    pub async fn upload_graph_files(
        &self,
        job: &SyncJob,
        graph_files: &[GraphFile],
        cancellation: &CancellationToken,
    ) -> Result<UploadReport, UploadError> {
        let batches = batches_for(graph_files, self.config.batch_size);
        let total = batches.len();

        let results: Vec<Result<Option<ShrinkReport>, UploadError>> = stream::iter(batches)
            .map(|batch| self.upload_batch_with_retry(job, batch, cancellation))
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        let mut shrink_reports = Vec::new();
        for result in results {
            if let Some(report) = result? {
                shrink_reports.push(report);
            }
        }

        Ok(UploadReport {
            batches_uploaded: total,
            shrink_reports,
        })
    }

    /// `POST .../finalize` (spec §4.6, step 3).
    pub async fn finalize(&self, job: &SyncJob, summary: &RunSummary) -> Result<(), UploadError> {
        let url = self.url(&format!(
            "/persister/synchronization/jobs/{}/finalize",
            job.job_id
        ));
        let body = json!({ "partialDatasets": summary.metadata.partial_datasets });
        self.send(&url, &body).await?;
        Ok(())
    }

    /// `POST .../abort` (spec §4.6, step 4). Abort errors are logged by the
    /// caller and re-raised, per spec.
    pub async fn abort(&self, job: &SyncJob, reason: &str) -> Result<(), UploadError> {
        let url = self.url(&format!("/persister/synchronization/jobs/{}/abort", job.job_id));
        let body = json!({ "reason": reason });
        self.send(&url, &body).await?;
        Ok(())
    }

    /// Initiate → upload → finalize, aborting the job on any error path
    /// (spec §4.6, §7 `SYNC_API_ERROR`/`UPLOAD_FATAL`). The event queue
    /// drains into `logger` before `finalize` is called (spec §5).
    pub async fn run(
        &self,
        source: JobSource,
        persist: &StagingRoot,
        summary: &RunSummary,
        logger: &dyn Logger,
        cancellation: &CancellationToken,
    ) -> Result<UploadReport, UploadError> {
        let job = self.initiate(source).await?;
        logger.synchronization_upload_start(&job.job_id);

        let events = EventQueue::default();
        events.push("initiate", job.job_id.clone());

        let outcome = async {
            let graph_files = persist.graph_files()?;
            events.push("collect", format!("{} flushed files", graph_files.len()));

            if cancellation.is_cancelled() {
                return Err(UploadError::Api("run cancelled before upload".to_string()));
            }

            let report = self.upload_graph_files(&job, &graph_files, cancellation).await?;
            events.push("upload", format!("{} batches uploaded", report.batches_uploaded));

            if cancellation.is_cancelled() {
                return Err(UploadError::Api("run cancelled before finalize".to_string()));
            }

            Ok(report)
        }
        .await;

        for event in events.drain() {
            logger.info(&format!("{}: {}", event.stage, event.detail));
        }

        let report = match outcome {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(error = %e, job_id = %job.job_id, "upload failed, aborting synchronization job");
                if let Err(abort_err) = self.abort(&job, &e.to_string()).await {
                    tracing::error!(error = %abort_err, "abort request itself failed");
                }
                return Err(e);
            }
        };

        self.finalize(&job, summary).await?;
        logger.synchronization_upload_end(&job.job_id);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphrunner_model::StepResult;
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct NullLogger;
    impl Logger for NullLogger {
        fn info(&self, _message: &str) {}
        fn warn(&self, _message: &str) {}
        fn error(&self, _message: &str) {}
        fn debug(&self, _message: &str) {}
        fn child(&self, _fields: serde_json::Value) -> Box<dyn Logger> {
            Box::new(NullLogger)
        }
        fn publish_metric(&self, _metric: graphrunner_core::Metric) {}
        fn validation_failure(&self, _error: &str) {}
        fn synchronization_upload_start(&self, _job_id: &str) {}
        fn synchronization_upload_end(&self, _job_id: &str) {}
    }

    fn uploader(base_url: String) -> Uploader {
        Uploader::new(reqwest::Client::new(), base_url, UploaderConfig::default())
    }

    #[tokio::test]
    async fn uploads_entities_and_relationships_in_separate_batches() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/persister/synchronization/jobs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"jobId": "job-1"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/persister/synchronization/jobs/job-1/entities"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/persister/synchronization/jobs/job-1/relationships"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/persister/synchronization/jobs/job-1/finalize"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let persist = Arc::new(StagingRoot::new(dir.path(), false));
        persist.prepare().unwrap();
        persist
            .write_flush(
                "step-a",
                &FlushedFile::entities(vec![Entity::new("h:1", "aws_host", "Host")]),
            )
            .unwrap();

        let uploader = uploader(server.uri());
        let summary = RunSummary::new(vec![StepResult {
            id: "step-a".into(),
            name: "a".into(),
            declared_types: vec!["aws_host".into()],
            partial_types: vec![],
            encountered_types: vec!["aws_host".into()],
            depends_on: None,
            status: graphrunner_model::StepStatus::Success,
        }]);

        let report = uploader
            .run(
                JobSource::IntegrationManaged {
                    integration_instance_id: "instance-1".into(),
                },
                &persist,
                &summary,
                &NullLogger,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.batches_uploaded, 1);
        assert!(report.shrink_reports.is_empty());
    }

    #[tokio::test]
    async fn retries_on_413_after_shrinking_the_batch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/persister/synchronization/jobs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"jobId": "job-1"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/persister/synchronization/jobs/job-1/entities"))
            .respond_with(ResponseTemplate::new(413))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/persister/synchronization/jobs/job-1/entities"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/persister/synchronization/jobs/job-1/finalize"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let persist = Arc::new(StagingRoot::new(dir.path(), false));
        persist.prepare().unwrap();
        let big_payload = "x".repeat(7 * 1024 * 1024);
        let entity = Entity::new("h:1", "aws_host", "Host").with_property(
            "_rawData",
            json!([{"name": "raw", "rawData": {"payload": big_payload}}]),
        );
        persist
            .write_flush("step-a", &FlushedFile::entities(vec![entity]))
            .unwrap();

        let uploader = Uploader::new(reqwest::Client::new(), server.uri(), UploaderConfig::default());
        let summary = RunSummary::new(vec![]);

        let report = uploader
            .run(
                JobSource::IntegrationManaged {
                    integration_instance_id: "instance-1".into(),
                },
                &persist,
                &summary,
                &NullLogger,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.shrink_reports.len(), 1);
    }

    #[tokio::test]
    async fn job_not_awaiting_uploads_aborts_without_retrying() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/persister/synchronization/jobs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"jobId": "job-1"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/persister/synchronization/jobs/job-1/entities"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "error": {"code": "JOB_NOT_AWAITING_UPLOADS", "message": "job ended"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/persister/synchronization/jobs/job-1/abort"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let persist = Arc::new(StagingRoot::new(dir.path(), false));
        persist.prepare().unwrap();
        persist
            .write_flush(
                "step-a",
                &FlushedFile::entities(vec![Entity::new("h:1", "aws_host", "Host")]),
            )
            .unwrap();

        let uploader = uploader(server.uri());
        let summary = RunSummary::new(vec![]);

        let err = uploader
            .run(
                JobSource::IntegrationManaged {
                    integration_instance_id: "instance-1".into(),
                },
                &persist,
                &summary,
                &NullLogger,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Fatal(_)));
    }
}
