use crate::error::Result;
use crate::execution::{CheckResult, ExecutionContext, ParameterReader, StepExecution};

/// Every kind in `resources` has at least one stored instance, and every kind
/// in `links` is advertised by at least one stored parent.
pub fn check_discovered(
    step: &StepExecution,
    params: &ParameterReader<'_>,
    context: &ExecutionContext,
) -> Result<CheckResult> {
    let store = context.resources(step)?;
    let mut missing = Vec::new();

    for kind in params.optional_kinds("resources")? {
        if store.get(kind).is_empty() {
            missing.push(format!("no {kind} discovered"));
        }
    }

    for kind in params.optional_kinds("links")? {
        let advertised = store
            .graph()
            .parent_of(kind)
            .is_some_and(|parent| store.get(parent).iter().any(|sr| sr.link_href(kind).is_some()));
        if !advertised {
            missing.push(format!("no link to {kind} advertised"));
        }
    }

    if missing.is_empty() {
        Ok(CheckResult::pass())
    } else {
        Ok(CheckResult::fail(missing.join("; ")))
    }
}
