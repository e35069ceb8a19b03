//! Built-in actions
//!
//! [`StandardActions`] dispatches on the action `type` named in the step
//! definition.

pub mod discovery;
pub mod refresh;
pub mod wait;

use async_trait::async_trait;

use crate::error::{HarnessError, Result};
use crate::execution::{ActionExecutor, ActionResult, ExecutionContext, StepExecution};

pub const DISCOVERY: &str = "discovery";
pub const WAIT: &str = "wait";
pub const REFRESH_RESOURCE: &str = "refresh-resource";

#[derive(Debug, Clone, Copy, Default)]
pub struct StandardActions;

#[async_trait]
impl ActionExecutor for StandardActions {
    async fn execute_action(&self, step: &StepExecution, context: &mut ExecutionContext) -> Result<ActionResult> {
        let kind = step.source.action.kind.as_str();
        tracing::debug!("{}: running action {}", step.id(), kind);
        match kind {
            DISCOVERY => discovery::action_discovery(step, context).await,
            WAIT => wait::action_wait(step).await,
            REFRESH_RESOURCE => refresh::action_refresh_resource(step, context).await,
            other => Err(HarnessError::invalid_parameter(
                step.id(),
                "type",
                format!("unknown action type '{other}'"),
            )),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::StepDefinition;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_unknown_action_type() {
        let mut context = testing::context_with(Arc::new(testing::ScriptedFetcher::default()));
        let step = StepExecution::new(Arc::new(StepDefinition::new("S1", "teleport")), "client", 0);

        let err = StandardActions.execute_action(&step, &mut context).await.unwrap_err();
        assert!(err.to_string().contains("unknown action type 'teleport'"), "{err}");
    }
}
