//! Conformance test harness core for IEEE 2030.5 / CSIP-Aus utility servers
//!
//! The harness acts as one or more clients against a server under test. It
//! discovers the server's resource tree, keeps what it finds in a per-client
//! [`resource::ResourceStore`], and runs a test procedure's steps through the
//! [`execution::ExecutionEngine`], recording warnings, progress and every
//! server response along the way.
//!
//! ```ignore
//! let procedure = TestProcedure::from_file(&run.test_procedure)?;
//! let mut context = build_execution_context(&config, &run, &procedure)?;
//! let engine = ExecutionEngine::new(Arc::new(StandardActions), Arc::new(StandardChecks));
//! let result = engine.run(&mut context, procedure.build_steps()?).await;
//! ```

pub mod action;
pub mod check;
pub mod config;
pub mod discovery;
pub mod error;
pub mod execution;
pub mod report;
pub mod resource;
pub mod server;
pub mod tracker;

pub use action::StandardActions;
pub use check::StandardChecks;
pub use config::{ClientConfig, ExecutionSettings, GlobalConfig, RunConfig, ServerConfig};
pub use error::{ConfigError, GraphError, HarnessError, RequestError, Result};
pub use execution::{
    build_execution_context, ExecutionContext, ExecutionEngine, ExecutionResult, RunOutcome, StepScheduler,
    TestProcedure,
};
pub use report::{relative_time, render_summary, write_report, RunSummary};
pub use resource::{Resource, ResourceKind, ResourceStore, ResourceTypeGraph, StoredResource, StoredResourceId};
