//! Step scheduling and execution

pub mod context;
pub mod engine;
pub mod monitor;
pub mod procedure;
pub mod scheduler;
pub mod step;

pub use context::{ClientContext, ExecutionContext};
pub use engine::{ActionExecutor, CheckExecutor, ExecutionEngine, ExecutionResult, RunOutcome, StepResult};
pub use monitor::{log_snapshot, run_with_monitor, spawn_monitor, EngineSnapshot};
pub use procedure::{build_execution_context, TestProcedure};
pub use scheduler::StepScheduler;
pub use step::{
    ActionDefinition, ActionResult, CheckDefinition, CheckResult, ParameterReader, Parameters, StepDefinition,
    StepExecution,
};
