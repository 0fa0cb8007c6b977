use thiserror::Error;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("SYNC_API_ERROR: {0}")]
    Api(String),

    /// `JOB_NOT_AWAITING_UPLOADS` (spec §4.6): fatal, stops retrying.
    #[error("INTEGRATION_UPLOAD_AFTER_JOB_ENDED: {0}")]
    Fatal(String),

    /// HTTP 413 / `RequestEntityTooLargeException` (spec §4.6).
    #[error("batch too large, shrink required")]
    TooLarge,

    /// Transient `CredentialsError` (spec §4.6): retried silently.
    #[error("transient credentials error")]
    CredentialsTransient,

    #[error("CANNOT_SHRINK: batch did not shrink after truncating the largest field")]
    CannotShrink,

    #[error(transparent)]
    Persist(#[from] graphrunner_persist::PersistError),
}
