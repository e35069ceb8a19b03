use std::sync::Arc;

use crate::error::{HarnessError, RequestError, Result};
use crate::execution::{ActionResult, ExecutionContext, StepExecution};
use crate::resource::{Resource, ResourceKind, StoredResourceId};
use crate::server::ResourceFetcher;

/// Refetch every stored instance of `resource` and upsert it under its
/// existing parent.
///
/// `expect_rejection: true` requires every refetch to be refused with a 4xx
/// and stores nothing. `expect_rejection: false` turns a failed refetch into a
/// retriable failure; when the flag is absent a failed refetch aborts the run.
/// `expect_rejection_or_empty` accepts either a 4xx or an empty list.
pub async fn action_refresh_resource(step: &StepExecution, context: &mut ExecutionContext) -> Result<ActionResult> {
    let params = step.source.action_parameters();
    let kind = params.kind("resource")?;
    let expect_rejection = params.optional_bool("expect_rejection")?;
    let expect_rejection_or_empty = params.optional_bool("expect_rejection_or_empty")?.unwrap_or(false);

    let fetcher = context.fetcher(step)?;
    let targets: Vec<(Option<StoredResourceId>, String)> = context
        .resources(step)?
        .hrefs(kind)
        .map(|(sr, href)| (sr.parent.clone(), href.to_string()))
        .collect();
    if targets.is_empty() {
        return Err(HarnessError::precondition(format!("no stored {kind} with an href to refresh")));
    }

    for (parent, href) in targets {
        if expect_rejection == Some(true) {
            match fetcher.fetch(kind, &href).await {
                Ok(_) => {
                    return Ok(ActionResult::failed(format!("expected {href} to be rejected but it was served")));
                }
                Err(e) if e.is_client_error() => {
                    tracing::info!("{}: {} rejected as expected ({})", step.id(), href, e);
                }
                Err(e) => return Err(e.into()),
            }
        } else if expect_rejection_or_empty {
            let is_list = context.graph.is_list_kind(kind);
            let result = expect_rejection_or_empty_list(&fetcher, kind, is_list, &href).await?;
            if result.failure.is_some() {
                return Ok(result);
            }
        } else {
            match fetcher.fetch(kind, &href).await {
                Ok(resource) => {
                    context.resources_mut(step)?.upsert_resource(kind, parent.as_ref(), resource);
                }
                Err(e) => {
                    tracing::error!("{}: error refreshing {}: {}", step.id(), href, e);
                    if expect_rejection == Some(false) {
                        return Ok(ActionResult::failed(format!("Error: {e}")));
                    }
                    return Err(e.into());
                }
            }
        }
    }
    Ok(ActionResult::done())
}

/// A 4xx or an empty list passes. A non-empty list is retriable; a served
/// non-list resource or any other status is fatal.
async fn expect_rejection_or_empty_list(
    fetcher: &Arc<dyn ResourceFetcher>,
    kind: ResourceKind,
    is_list: bool,
    href: &str,
) -> Result<ActionResult> {
    let resource: Resource = match fetcher.fetch(kind, href).await {
        Ok(resource) => resource,
        Err(e) if e.is_client_error() => return Ok(ActionResult::done()),
        Err(RequestError::Status { status, .. }) => {
            return Err(HarnessError::precondition(format!(
                "unexpected status {status} for {href} when expecting rejection or an empty list"
            )));
        }
        Err(e) => return Err(e.into()),
    };

    if !is_list {
        return Err(HarnessError::precondition(format!(
            "expected rejection or empty for {kind} at {href}, but a non-list resource was served"
        )));
    }
    match resource.list.and_then(|list| list.all) {
        Some(0) => Ok(ActionResult::done()),
        _ => Ok(ActionResult::failed(format!(
            "expected rejection or empty list for {kind} at {href}, but got a non-empty list"
        ))),
    }
}
