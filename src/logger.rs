//! Default `tracing`-backed [`Logger`] (spec §6), so the crate is runnable
//! without an embedder-supplied logger. Grounded on the teacher's
//! `main.rs`, which installs a `tracing_subscriber::registry()` with an
//! `EnvFilter` layer; this struct is what emits into that subscriber.

use graphrunner_core::{Logger, Metric};

/// Scoped by `fields`, the way `logger.child({stepId})` scopes the spec's
/// logger contract (§4.3, §6).
#[derive(Debug, Clone, Default)]
pub struct TracingLogger {
    fields: serde_json::Value,
}

impl TracingLogger {
    pub fn new() -> Self {
        TracingLogger::default()
    }
}

impl Logger for TracingLogger {
    fn info(&self, message: &str) {
        tracing::info!(fields = %self.fields, "{message}");
    }

    fn warn(&self, message: &str) {
        tracing::warn!(fields = %self.fields, "{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!(fields = %self.fields, "{message}");
    }

    fn debug(&self, message: &str) {
        tracing::debug!(fields = %self.fields, "{message}");
    }

    fn child(&self, fields: serde_json::Value) -> Box<dyn Logger> {
        Box::new(TracingLogger { fields })
    }

    fn publish_metric(&self, metric: Metric) {
        tracing::info!(name = %metric.name, unit = %metric.unit, value = metric.value, "metric");
    }

    fn validation_failure(&self, error: &str) {
        tracing::error!(error, "validateInvocation rejected the run");
    }

    fn synchronization_upload_start(&self, job_id: &str) {
        tracing::info!(job_id, "synchronization upload started");
    }

    fn synchronization_upload_end(&self, job_id: &str) {
        tracing::info!(job_id, "synchronization upload finished");
    }
}
