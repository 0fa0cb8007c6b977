//! Job State facade, DAG-driven step scheduler, and the execution-summary
//! aggregation that closes out a run (spec §4.3, §4.5, §4.6-partial).

mod context;
mod error;
mod handler;
mod invocation;
mod job_state;
mod logger;
mod scheduler;

pub use context::StepContext;
pub use error::SchedulerError;
pub use handler::{
    AfterExecution, DefaultExecutionHandlerWrapper, ExecutionHandlerWrapper, GetStepStartStates,
    StepHandler, StepStartState, ValidateInvocation,
};
pub use invocation::{InvocationConfig, SchedulerConfig, StepDeclaration};
pub use job_state::JobState;
pub use logger::{Logger, Metric};
pub use scheduler::Scheduler;
