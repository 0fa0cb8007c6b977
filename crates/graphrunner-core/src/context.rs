use std::sync::Arc;

use crate::job_state::JobState;
use crate::logger::Logger;

/// Passed to a step handler on invocation (spec §9: `{jobState, instance,
/// logger, executionConfig}`).
pub struct StepContext {
    pub job_state: Arc<JobState>,
    pub instance_config_fields: serde_json::Value,
    pub logger: Arc<dyn Logger>,
    pub execution_config: serde_json::Value,
}
