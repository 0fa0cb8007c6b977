//! Top-level error composing every crate's error taxonomy (spec §7),
//! the way the teacher's `ExecutionEngineError` wraps `WorkflowError`.

use thiserror::Error;

use graphrunner_core::SchedulerError;
use graphrunner_persist::PersistError;
use graphrunner_sync::UploadError;

#[derive(Debug, Error)]
pub enum GraphRunnerError {
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Persist(#[from] PersistError),
}
