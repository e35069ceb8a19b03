//! Built-in checks
//!
//! [`StandardChecks`] evaluates a step's checks in order and reports the
//! first failure. A step without checks passes.

pub mod count;
pub mod discovered;

use async_trait::async_trait;

use crate::error::{HarnessError, Result};
use crate::execution::{CheckDefinition, CheckExecutor, CheckResult, ExecutionContext, ParameterReader, StepExecution};

pub const DISCOVERED: &str = "discovered";
pub const RESOURCE_COUNT: &str = "resource-count";

#[derive(Debug, Clone, Copy, Default)]
pub struct StandardChecks;

impl StandardChecks {
    fn run_check(step: &StepExecution, check: &CheckDefinition, context: &ExecutionContext) -> Result<CheckResult> {
        let params = ParameterReader::new(step.id(), &check.parameters);
        match check.kind.as_str() {
            DISCOVERED => discovered::check_discovered(step, &params, context),
            RESOURCE_COUNT => count::check_resource_count(step, &params, context),
            other => Err(HarnessError::invalid_parameter(
                step.id(),
                "type",
                format!("unknown check type '{other}'"),
            )),
        }
    }
}

#[async_trait]
impl CheckExecutor for StandardChecks {
    async fn execute_checks(&self, step: &StepExecution, context: &mut ExecutionContext) -> Result<CheckResult> {
        for check in &step.source.checks {
            let result = Self::run_check(step, check, context)?;
            if !result.passed {
                tracing::debug!("{}: check {} failed", step.id(), check.kind);
                return Ok(result);
            }
        }
        Ok(CheckResult::pass())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::testing::{context_with, ScriptedFetcher};
    use crate::execution::{Parameters, StepDefinition};
    use crate::resource::{Resource, ResourceKind};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_checks_stop_at_first_failure() {
        let mut context = context_with(Arc::new(ScriptedFetcher::default()));
        context
            .clients
            .get_mut("client")
            .unwrap()
            .resources
            .append_resource(ResourceKind::Time, None, Resource::new("/tm"));

        let definition = StepDefinition::new("CHECKS", "wait")
            .with_check(DISCOVERED, Parameters::new().with("resources", serde_json::json!(["Time"])))
            .with_check(
                RESOURCE_COUNT,
                Parameters::new().with("resource", "Time").with("minimum_count", 2),
            )
            .with_check("never-reached", Parameters::new());
        let step = StepExecution::new(Arc::new(definition), "client", 0);

        let result = StandardChecks.execute_checks(&step, &mut context).await.unwrap();
        assert!(!result.passed);
        assert!(result.description.unwrap().contains("Time"));
    }

    #[tokio::test]
    async fn test_no_checks_passes_and_unknown_errors() {
        let mut context = context_with(Arc::new(ScriptedFetcher::default()));
        let step = StepExecution::new(Arc::new(StepDefinition::new("A", "wait")), "client", 0);
        assert!(StandardChecks.execute_checks(&step, &mut context).await.unwrap().passed);

        let definition = StepDefinition::new("B", "wait").with_check("bogus", Parameters::new());
        let step = StepExecution::new(Arc::new(definition), "client", 0);
        let err = StandardChecks.execute_checks(&step, &mut context).await.unwrap_err();
        assert!(matches!(err, HarnessError::InvalidParameter { .. }));
    }
}
