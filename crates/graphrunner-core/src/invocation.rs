//! The embedder-supplied bundle (spec §6, "Invocation configuration").

use std::sync::Arc;

use graphrunner_model::Step;
use graphrunner_store::{EntityHook, RelationshipHook, SchemaValidator};

use crate::handler::{
    AfterExecution, ExecutionHandlerWrapper, GetStepStartStates, StepHandler, ValidateInvocation,
};

/// One declared step paired with the handler that executes it.
pub struct StepDeclaration {
    pub step: Step,
    pub handler: Arc<dyn StepHandler>,
}

pub struct InvocationConfig {
    pub instance_config_fields: serde_json::Value,
    pub steps: Vec<StepDeclaration>,
    pub get_step_start_states: Option<Arc<dyn GetStepStartStates>>,
    pub validate_invocation: Option<Arc<dyn ValidateInvocation>>,
    pub before_add_entity: Option<Arc<dyn EntityHook>>,
    pub before_add_relationship: Option<Arc<dyn RelationshipHook>>,
    pub after_execution: Option<Arc<dyn AfterExecution>>,
    pub execution_handler_wrapper: Option<Arc<dyn ExecutionHandlerWrapper>>,
    pub schema_validator: Option<Arc<dyn SchemaValidator>>,
    /// Mirrors the run configuration's `enableSchemaValidation` option
    /// (spec §4.5, §6 `ENABLE_GRAPH_OBJECT_SCHEMA_VALIDATION`).
    pub enable_schema_validation: bool,
}

impl InvocationConfig {
    pub fn new(steps: Vec<StepDeclaration>) -> Self {
        InvocationConfig {
            instance_config_fields: serde_json::Value::Null,
            steps,
            get_step_start_states: None,
            validate_invocation: None,
            before_add_entity: None,
            before_add_relationship: None,
            after_execution: None,
            execution_handler_wrapper: None,
            schema_validator: None,
            enable_schema_validation: false,
        }
    }
}

/// Scheduler-internal knobs not exposed through `InvocationConfig` (spec
/// §5: "a safe default is one" in-flight step, §4.1 flush threshold).
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub max_concurrent_steps: usize,
    pub flush_threshold: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            max_concurrent_steps: 1,
            flush_threshold: 500,
        }
    }
}
