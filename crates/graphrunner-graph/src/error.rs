use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("CYCLIC_DEPENDENCY: dependency graph contains a cycle among {0:?}")]
    CyclicDependency(Vec<String>),

    #[error("step {0} depends on undeclared step {1}")]
    UnknownDependency(String, String),

    #[error("duplicate step id {0}")]
    DuplicateStepId(String),
}
