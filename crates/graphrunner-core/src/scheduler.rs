//! DAG-driven step scheduler (spec §4.5) plus the execution-summary
//! aggregation that closes out a run (spec §4.5, §3 `PartialDatasetMetadata`).
//!
//! Grounded on the teacher's `WorkflowEngine::execute_with_events`: a
//! work-queue loop draining an `mpsc` channel of completion events,
//! generalized from a single FIFO stack (n8n's node graph has no
//! concurrent-execution story) to a semaphore-bounded set of concurrently
//! in-flight steps, since spec §5 explicitly allows overlap up to an
//! implementation-chosen in-flight limit.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use graphrunner_graph::DependencyGraph;
use graphrunner_model::{RunSummary, Step, StepResult, StepStatus};
use graphrunner_persist::StagingRoot;
use graphrunner_store::{ObjectStore, ObjectStoreConfig, PermissiveValidator};

use crate::context::StepContext;
use crate::error::SchedulerError;
use crate::handler::{DefaultExecutionHandlerWrapper, StepStartState};
use crate::invocation::{InvocationConfig, SchedulerConfig};
use crate::job_state::JobState;
use crate::logger::{Logger, Metric};

const SCHEMA_VALIDATION_ENV_VAR: &str = "ENABLE_GRAPH_OBJECT_SCHEMA_VALIDATION";

struct SchemaValidationEnvGuard;

impl Drop for SchemaValidationEnvGuard {
    fn drop(&mut self) {
        std::env::remove_var(SCHEMA_VALIDATION_ENV_VAR);
    }
}

pub struct Scheduler {
    persist: Arc<StagingRoot>,
    logger: Arc<dyn Logger>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(persist: Arc<StagingRoot>, logger: Arc<dyn Logger>, config: SchedulerConfig) -> Self {
        Scheduler {
            persist,
            logger,
            config,
        }
    }

    /// Run every declared step to completion and write `summary.json`.
    pub async fn run(
        &self,
        invocation: InvocationConfig,
        cancellation: CancellationToken,
    ) -> Result<RunSummary, SchedulerError> {
        if let Some(validator) = &invocation.validate_invocation {
            if let Err(e) = validator.call().await {
                self.logger.validation_failure(&e.to_string());
                return Err(SchedulerError::Validation(e.to_string()));
            }
        }

        let steps: Vec<Step> = invocation.steps.iter().map(|d| d.step.clone()).collect();
        let step_ids: Vec<String> = steps.iter().map(|s| s.id.clone()).collect();
        let graph = DependencyGraph::build(&steps)?;

        let start_states: HashMap<String, StepStartState> =
            if let Some(provider) = &invocation.get_step_start_states {
                let states = provider.call(&step_ids).await;
                for id in &step_ids {
                    if !states.contains_key(id) {
                        return Err(SchedulerError::Config(format!(
                            "START_STATES_MISSING: no start state for step {id}"
                        )));
                    }
                }
                states
            } else {
                step_ids
                    .iter()
                    .map(|id| (id.clone(), StepStartState::default()))
                    .collect()
            };

        let _env_guard = if invocation.enable_schema_validation {
            std::env::set_var(SCHEMA_VALIDATION_ENV_VAR, "1");
            Some(SchemaValidationEnvGuard)
        } else {
            None
        };

        let store_config = ObjectStoreConfig {
            flush_threshold: self.config.flush_threshold,
            before_add_entity: invocation.before_add_entity.clone(),
            before_add_relationship: invocation.before_add_relationship.clone(),
            schema_validator: invocation
                .schema_validator
                .clone()
                .unwrap_or_else(|| Arc::new(PermissiveValidator)),
        };
        let store = Arc::new(ObjectStore::new(self.persist.clone(), store_config));

        let steps_by_id: HashMap<String, Step> =
            steps.iter().map(|s| (s.id.clone(), s.clone())).collect();
        let mut handlers: HashMap<String, _> = HashMap::new();
        for declaration in invocation.steps {
            handlers.insert(declaration.step.id.clone(), declaration.handler);
        }
        let wrapper = invocation
            .execution_handler_wrapper
            .unwrap_or_else(|| Arc::new(DefaultExecutionHandlerWrapper));
        let instance_config_fields = invocation.instance_config_fields;

        let mut results: HashMap<String, StepResult> = HashMap::new();
        let mut dependency_failed: HashMap<String, bool> = HashMap::new();
        let mut cursor = graph.cursor();

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_steps.max(1)));
        let (tx, mut rx) = mpsc::channel::<StepResult>(step_ids.len().max(1));

        let mut runnable: Vec<String> = cursor
            .initial_runnable()
            .into_iter()
            .map(String::from)
            .collect();
        let mut in_flight = 0usize;
        let mut remaining = step_ids.len();

        while remaining > 0 {
            while let Some(id) = runnable.pop() {
                let step = steps_by_id.get(&id).unwrap().clone();

                if cancellation.is_cancelled() {
                    let result = terminal_result(&step, StepStatus::Cancelled, Vec::new());
                    remaining -= 1;
                    runnable.extend(cursor.mark_terminal(&id));
                    results.insert(id, result);
                    continue;
                }

                let disabled = start_states.get(&id).copied().unwrap_or_default().disabled;
                if disabled {
                    let result = terminal_result(&step, StepStatus::Disabled, Vec::new());
                    remaining -= 1;
                    runnable.extend(cursor.mark_terminal(&id));
                    results.insert(id, result);
                    continue;
                }

                let deps_failed = step
                    .depends_on
                    .iter()
                    .any(|d| dependency_failed.get(d).copied().unwrap_or(false));

                let handler = handlers.get(&id).unwrap().clone();
                let job_state = Arc::new(JobState::new(store.clone(), id.clone()));
                let logger: Arc<dyn Logger> =
                    Arc::from(self.logger.child(serde_json::json!({ "stepId": id })));
                let instance_config_fields = instance_config_fields.clone();
                let wrapper = wrapper.clone();
                let tx = tx.clone();
                let semaphore = semaphore.clone();

                in_flight += 1;
                tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.unwrap();
                    let diagnostics_logger = logger.clone();
                    let ctx = StepContext {
                        job_state: job_state.clone(),
                        instance_config_fields,
                        logger,
                        execution_config: serde_json::Value::Null,
                    };
                    let outcome = wrapper.wrap(&ctx, handler).await;
                    if let Err(e) = &outcome {
                        tracing::warn!(step = %step.id, error = %e, "step handler failed");
                    }
                    let _ = job_state.finalize();
                    let encountered = job_state.encountered_types();

                    let declared = step.declared_types();
                    for type_name in &encountered {
                        if !declared.contains(type_name) {
                            diagnostics_logger.warn(&format!(
                                "step {} wrote undeclared type {type_name}",
                                step.id
                            ));
                        }
                    }

                    let status = match (&outcome, deps_failed) {
                        (Ok(()), true) => StepStatus::PartialSuccessDueToDependencyFailure,
                        (Ok(()), false) => StepStatus::Success,
                        (Err(_), _) => StepStatus::Failure,
                    };
                    let result = terminal_result(&step, status, encountered);
                    let _ = tx.send(result).await;
                });
            }

            if in_flight == 0 {
                tracing::error!("scheduler stalled with steps remaining but none runnable");
                break;
            }

            match rx.recv().await {
                Some(result) => {
                    in_flight -= 1;
                    remaining -= 1;
                    let id = result.id.clone();
                    let failed = matches!(
                        result.status,
                        StepStatus::Failure | StepStatus::PartialSuccessDueToDependencyFailure
                    );
                    dependency_failed.insert(id.clone(), failed);
                    runnable.extend(cursor.mark_terminal(&id));
                    results.insert(id, result);
                }
                None => break,
            }
        }

        let stats = self.persist.dir_stats()?;
        self.logger.publish_metric(Metric {
            name: "disk-usage".to_string(),
            unit: "Bytes".to_string(),
            value: stats.total_bytes as f64,
        });

        if let Some(after) = invocation.after_execution {
            if let Err(e) = after.call().await {
                tracing::warn!(error = %e, "afterExecution hook failed");
            }
        }

        let ordered_results: Vec<StepResult> = step_ids
            .iter()
            .filter_map(|id| results.remove(id))
            .collect();

        let summary = RunSummary::new(ordered_results);
        self.persist.write_summary(&summary)?;
        Ok(summary)
    }
}

fn terminal_result(step: &Step, status: StepStatus, encountered_types: Vec<String>) -> StepResult {
    StepResult {
        id: step.id.clone(),
        name: step.name.clone(),
        declared_types: step.declared_types().into_iter().collect(),
        partial_types: step.partial_types().into_iter().collect(),
        encountered_types,
        depends_on: Some(step.depends_on.clone()),
        status,
    }
}
