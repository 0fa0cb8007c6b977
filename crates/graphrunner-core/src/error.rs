use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("VALIDATION_ERROR: {0}")]
    Validation(String),

    #[error("CONFIG_ERROR: {0}")]
    Config(String),

    #[error(transparent)]
    Graph(#[from] graphrunner_graph::GraphError),

    #[error(transparent)]
    Persist(#[from] graphrunner_persist::PersistError),
}
