use crate::error::Result;
use crate::execution::{CheckResult, ExecutionContext, ParameterReader, StepExecution};

/// Number of stored `resource` instances lies within the optional
/// `minimum_count` and `maximum_count` bounds
pub fn check_resource_count(
    step: &StepExecution,
    params: &ParameterReader<'_>,
    context: &ExecutionContext,
) -> Result<CheckResult> {
    let kind = params.kind("resource")?;
    let minimum: Option<usize> = params.optional("minimum_count")?;
    let maximum: Option<usize> = params.optional("maximum_count")?;
    let count = context.resources(step)?.get(kind).len();

    if let Some(min) = minimum.filter(|min| count < *min) {
        return Ok(CheckResult::fail(format!("expected at least {min} {kind} but found {count}")));
    }
    if let Some(max) = maximum.filter(|max| count > *max) {
        return Ok(CheckResult::fail(format!("expected at most {max} {kind} but found {count}")));
    }
    Ok(CheckResult::pass())
}
