//! End-to-end coverage of the facade crate: a declared step runs through
//! `run_integration`, flushes to the staging root, and the resulting
//! summary is synchronized against a mocked remote service.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use graphrunner::{
    run_integration, synchronize, CancellationToken, Entity, InvocationConfig, JobSource,
    RunnerConfig, StepContext, StepDeclaration, StepHandler, StepStatus, SyncConfig,
    TracingLogger, UploaderConfig,
};

struct AddsOneHost;

#[async_trait]
impl StepHandler for AddsOneHost {
    async fn execute(&self, ctx: &StepContext) -> anyhow::Result<()> {
        ctx.job_state
            .add_entity(Entity::new("host:1", "aws_host", "Host"))
            .await?;
        Ok(())
    }
}

struct NoopHandler;

#[async_trait]
impl StepHandler for NoopHandler {
    async fn execute(&self, _ctx: &StepContext) -> anyhow::Result<()> {
        Ok(())
    }
}

fn entity_meta(type_name: &str) -> graphrunner::StepEntityMetadata {
    graphrunner::StepEntityMetadata {
        type_name: type_name.to_string(),
        class: vec!["Resource".to_string()],
        partial: false,
    }
}

#[tokio::test]
async fn run_then_synchronize_uploads_the_staged_entity() {
    let dir = tempfile::tempdir().unwrap();
    let config = RunnerConfig::new(dir.path());

    let step = graphrunner::Step::new("fetch-hosts", "fetch-hosts").with_entity(entity_meta("aws_host"));
    let invocation = InvocationConfig::new(vec![StepDeclaration {
        step,
        handler: Arc::new(AddsOneHost),
    }]);

    let summary = run_integration(
        &config,
        invocation,
        Arc::new(TracingLogger::new()),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(summary.integration_step_results.len(), 1);
    assert_eq!(summary.integration_step_results[0].status, StepStatus::Success);
    assert!(dir.path().join("summary.json").exists());

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
        .and(path("/persister/synchronization/jobs/job-1/finalize"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let sync = SyncConfig {
        base_url: server.uri(),
        source: JobSource::IntegrationManaged {
            integration_instance_id: "instance-1".to_string(),
        },
        uploader: UploaderConfig::default(),
    };

    let report = synchronize(
        &config,
        &sync,
        &summary,
        &TracingLogger::new(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.batches_uploaded, 1);
}

#[tokio::test]
async fn staging_root_is_cleared_between_runs() {
    let dir = tempfile::tempdir().unwrap();
    let stray = dir.path().join("graph").join("my-test");
    std::fs::create_dir_all(&stray).unwrap();
    std::fs::write(stray.join("someFile.json"), b"{}").unwrap();

    let config = RunnerConfig::new(dir.path());
    let step = graphrunner::Step::new("noop", "noop");
    let invocation = InvocationConfig::new(vec![StepDeclaration {
        step,
        handler: Arc::new(NoopHandler),
    }]);

    run_integration(
        &config,
        invocation,
        Arc::new(TracingLogger::new()),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert!(!stray.join("someFile.json").exists());
}
