use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("DUPLICATE_KEY: {0} already exists in the store")]
    DuplicateKey(String),

    #[error(transparent)]
    Persist(#[from] graphrunner_persist::PersistError),
}
