use chrono::Utc;

use crate::discovery::{polling_window_delay, DiscoveryEngine};
use crate::error::Result;
use crate::execution::{ActionResult, ExecutionContext, StepExecution};

/// Discover `resources` for the step's client, optionally waiting for the
/// start of the server's next polling window first.
pub async fn action_discovery(step: &StepExecution, context: &mut ExecutionContext) -> Result<ActionResult> {
    let params = step.source.action_parameters();
    let resources = params.kinds("resources")?;

    if params.optional_bool("next_polling_window")?.unwrap_or(false) {
        let now = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
        let delay = polling_window_delay(
            context.resources(step)?,
            now,
            context.settings.default_poll_rate_seconds,
        );
        tracing::info!("{}: waiting {}s for the next polling window", step.id(), delay.as_secs());
        tokio::time::sleep(delay).await;
    }

    let settings = context.settings.discovery();
    let dcap_path = context.dcap_path.clone();
    let (fetcher, store, warnings) = context.discovery_parts(step)?;
    DiscoveryEngine::new(fetcher.as_ref(), settings)
        .discover(store, warnings, &dcap_path, &resources)
        .await?;
    Ok(ActionResult::done())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::testing::{context_with, ScriptedFetcher};
    use crate::error::HarnessError;
    use crate::execution::{Parameters, StepDefinition};
    use crate::resource::{ListPage, Resource, ResourceKind};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    fn step(parameters: Parameters) -> StepExecution {
        let definition = StepDefinition::new("DISCOVER", "discovery").with_action_parameters(parameters);
        StepExecution::new(Arc::new(definition), "client", 0)
    }

    fn fetcher() -> ScriptedFetcher {
        ScriptedFetcher::default()
            .with(
                "/dcap",
                Resource::new("/dcap")
                    .with_link("EndDeviceListLink", "/edev")
                    .with_field("pollRate", 10),
            )
            .with("/edev", Resource::new("/edev").with_list(ListPage::new(vec![]).with_all(1)))
            .with(
                "/edev?s=0&l=5",
                Resource::new("/edev").with_list(ListPage::new(vec![Resource::new("/edev/1")]).with_all(1)),
            )
            .with("/edev?s=5&l=5", Resource::new("/edev").with_list(ListPage::new(vec![]).with_all(1)))
    }

    #[tokio::test]
    async fn test_discovery_fills_client_store() {
        let fetcher = Arc::new(fetcher());
        let mut context = context_with(fetcher.clone());
        let params = Parameters::new().with("resources", json!(["EndDevice"]));

        let result = action_discovery(&step(params), &mut context).await.unwrap();

        assert_eq!(result, ActionResult::done());
        let store = &context.client("client").unwrap().resources;
        assert_eq!(store.get(ResourceKind::EndDevice).len(), 1);
        assert!(context.warnings.is_empty());
        assert_eq!(fetcher.requests().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_discovery_waits_for_polling_window() {
        let mut context = context_with(Arc::new(fetcher()));
        let params = Parameters::new()
            .with("resources", json!(["EndDevice"]))
            .with("next_polling_window", true);

        let started = Instant::now();
        action_discovery(&step(params.clone()), &mut context).await.unwrap();
        // Nothing known yet, so the default poll rate bounds the wait
        assert!(started.elapsed() <= Duration::from_secs(60));

        let started = Instant::now();
        action_discovery(&step(params), &mut context).await.unwrap();
        assert!(started.elapsed() <= Duration::from_secs(10));
        assert!(started.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_discovery_requires_resources() {
        let mut context = context_with(Arc::new(fetcher()));
        let err = action_discovery(&step(Parameters::new()), &mut context).await.unwrap_err();
        assert!(matches!(err, HarnessError::InvalidParameter { .. }));
    }
}
