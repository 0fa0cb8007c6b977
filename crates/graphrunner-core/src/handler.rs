//! Step handler contract (spec §9: "a single asynchronous function taking
//! a step context ... returns no value. A thrown/failed result maps to
//! FAILURE."). Declared separately from `graphrunner_model::Step` so the
//! data model stays serializable; the handler is bound to its declaration
//! here, at the scheduler boundary, instead.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::StepContext;

#[async_trait]
pub trait StepHandler: Send + Sync {
    async fn execute(&self, ctx: &StepContext) -> anyhow::Result<()>;
}

/// Wraps each step handler invocation (spec §4.5: "the scheduler calls
/// the wrapper, which must eventually call `fn()` exactly once").
#[async_trait]
pub trait ExecutionHandlerWrapper: Send + Sync {
    async fn wrap(&self, ctx: &StepContext, handler: Arc<dyn StepHandler>) -> anyhow::Result<()>;
}

pub struct DefaultExecutionHandlerWrapper;

#[async_trait]
impl ExecutionHandlerWrapper for DefaultExecutionHandlerWrapper {
    async fn wrap(&self, ctx: &StepContext, handler: Arc<dyn StepHandler>) -> anyhow::Result<()> {
        handler.execute(ctx).await
    }
}

/// Runs once after all steps terminate, regardless of any step's failure
/// (spec §4.5).
#[async_trait]
pub trait AfterExecution: Send + Sync {
    async fn call(&self) -> anyhow::Result<()>;
}

/// Runs once before any step, aborting the run on failure (spec §4.5).
#[async_trait]
pub trait ValidateInvocation: Send + Sync {
    async fn call(&self) -> anyhow::Result<()>;
}

/// `getStepStartStates` (spec §4.5): maps each declared step id to its
/// start state. A missing entry for any declared step is
/// `START_STATES_MISSING`.
#[async_trait]
pub trait GetStepStartStates: Send + Sync {
    async fn call(&self, step_ids: &[String]) -> std::collections::HashMap<String, StepStartState>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StepStartState {
    pub disabled: bool,
}
