//! The logger contract consumed from the surrounding system (spec §6).
//! Lives in this crate, rather than the root facade, because the
//! scheduler is the thing that calls it; the root crate supplies the
//! default `tracing`-backed implementation.

#[derive(Debug, Clone)]
pub struct Metric {
    pub name: String,
    pub unit: String,
    pub value: f64,
}

pub trait Logger: Send + Sync {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
    fn debug(&self, message: &str);

    /// A logger scoped with additional structured fields, e.g. `{stepId}`.
    fn child(&self, fields: serde_json::Value) -> Box<dyn Logger>;

    fn publish_metric(&self, metric: Metric);
    fn validation_failure(&self, error: &str);
    fn synchronization_upload_start(&self, job_id: &str);
    fn synchronization_upload_end(&self, job_id: &str);
}
