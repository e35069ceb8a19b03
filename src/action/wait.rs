use std::time::Duration;

use crate::error::{HarnessError, Result};
use crate::execution::{ActionResult, StepExecution};

/// Sleep for `wait_seconds`
pub async fn action_wait(step: &StepExecution) -> Result<ActionResult> {
    let seconds: f64 = step.source.action_parameters().required("wait_seconds")?;
    let duration = Duration::try_from_secs_f64(seconds).map_err(|e| {
        HarnessError::invalid_parameter(step.id(), "wait_seconds", format!("{seconds} is not a usable duration: {e}"))
    })?;
    tracing::info!("{}: waiting {}s", step.id(), seconds);
    tokio::time::sleep(duration).await;
    Ok(ActionResult::done())
}
