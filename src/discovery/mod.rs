//! Resource discovery
//!
//! Walks the resource tree from DeviceCapability down to a requested set of
//! kinds, storing everything it fetches. Kinds whose parent is a list are
//! paginated; everything else is fetched by following the link on each stored
//! parent. A missing link is a warning, not an error.

pub mod pagination;

use std::time::Duration;

use crate::error::Result;
use crate::resource::{ResourceKind, ResourceStore, StoredResourceId};
use crate::server::ResourceFetcher;
use crate::tracker::WarningSink;

pub use pagination::{page_href, paginate_list_items, PaginationSettings};

/// Poll rate assumed when DeviceCapability doesn't advertise one
pub const DEFAULT_POLL_RATE_SECONDS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoverySettings {
    pub pagination: PaginationSettings,
    pub default_poll_rate_seconds: u64,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            pagination: PaginationSettings::default(),
            default_poll_rate_seconds: DEFAULT_POLL_RATE_SECONDS,
        }
    }
}

/// Drives discovery for one client against one server
pub struct DiscoveryEngine<'a> {
    fetcher: &'a dyn ResourceFetcher,
    settings: DiscoverySettings,
}

impl<'a> DiscoveryEngine<'a> {
    pub fn new(fetcher: &'a dyn ResourceFetcher, settings: DiscoverySettings) -> Self {
        Self { fetcher, settings }
    }

    /// Discover `targets` (and everything above them), replacing what the
    /// store held for each visited kind.
    pub async fn discover(
        &self,
        store: &mut ResourceStore,
        warnings: &mut dyn WarningSink,
        dcap_href: &str,
        targets: &[ResourceKind],
    ) -> Result<()> {
        let plan = store.graph().discovery_plan(targets)?;
        tracing::info!("Discovery plan: {:?}", plan);

        for kind in plan {
            store.clear_resource(kind);
            match store.graph().parent_of(kind) {
                None => {
                    let dcap = self.fetcher.fetch(kind, dcap_href).await?;
                    store.set_resource(kind, None, dcap);
                }
                Some(parent) if store.graph().is_list_kind(parent) => {
                    self.discover_list_items(store, warnings, kind, parent).await?;
                }
                Some(parent) => {
                    self.discover_linked(store, warnings, kind, parent).await?;
                }
            }
            tracing::debug!("Discovered {} x {}", store.get(kind).len(), kind);
        }
        Ok(())
    }

    async fn discover_linked(
        &self,
        store: &mut ResourceStore,
        warnings: &mut dyn WarningSink,
        kind: ResourceKind,
        parent: ResourceKind,
    ) -> Result<()> {
        let link = store.graph().link_name(kind).unwrap_or("link");
        let parents: Vec<(StoredResourceId, Option<String>)> = store
            .get(parent)
            .iter()
            .map(|sr| (sr.id.clone(), sr.link_href(kind).map(str::to_string)))
            .collect();

        for (parent_id, href) in parents {
            let Some(href) = href else {
                warnings.log_resource_warning(
                    kind,
                    &format!("expected a {link} on {parent} {parent_id} that wasn't present"),
                );
                continue;
            };
            let resource = self.fetcher.fetch(kind, &href).await?;
            store.append_resource(kind, Some(&parent_id), resource);
        }
        Ok(())
    }

    async fn discover_list_items(
        &self,
        store: &mut ResourceStore,
        warnings: &mut dyn WarningSink,
        kind: ResourceKind,
        list_kind: ResourceKind,
    ) -> Result<()> {
        let lists: Vec<(StoredResourceId, Option<String>)> = store
            .get(list_kind)
            .iter()
            .map(|sr| (sr.id.clone(), sr.href().map(str::to_string)))
            .collect();

        for (list_id, href) in lists {
            let Some(href) = href else {
                warnings.log_resource_warning(list_kind, &format!("{list_id} has no href, unable to fetch {kind} items"));
                continue;
            };
            let items =
                paginate_list_items(self.fetcher, list_kind, &href, self.settings.pagination, warnings).await?;
            for item in items {
                store.append_resource(kind, Some(&list_id), item);
            }
        }
        Ok(())
    }
}

/// Time until the next boundary of the server's poll rate, taken from the
/// last known DeviceCapability.
pub fn polling_window_delay(store: &ResourceStore, now_epoch_seconds: u64, default_poll_rate_seconds: u64) -> Duration {
    let poll_rate = store
        .get(ResourceKind::DeviceCapability)
        .last()
        .and_then(|sr| sr.resource.poll_rate())
        .unwrap_or(default_poll_rate_seconds)
        .max(1);
    Duration::from_secs(poll_rate - (now_epoch_seconds % poll_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{HarnessError, RequestError};
    use crate::resource::{ListPage, Resource, ResourceTypeGraph};
    use crate::tracker::WarningTracker;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct MapFetcher {
        resources: HashMap<String, Resource>,
        requests: Mutex<Vec<String>>,
    }

    impl MapFetcher {
        fn with(mut self, href: &str, resource: Resource) -> Self {
            self.resources.insert(href.to_string(), resource);
            self
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ResourceFetcher for MapFetcher {
        async fn fetch(&self, _kind: ResourceKind, href: &str) -> std::result::Result<Resource, RequestError> {
            self.requests.lock().unwrap().push(href.to_string());
            self.resources.get(href).cloned().ok_or_else(|| RequestError::Status {
                method: "GET".to_string(),
                url: href.to_string(),
                status: 404,
                body: String::new(),
            })
        }
    }

    fn list_page(href: &str, items: Vec<Resource>, all: u32) -> Resource {
        Resource::new(href).with_list(ListPage::new(items).with_all(all))
    }

    fn server() -> MapFetcher {
        let edev1 = Resource::new("/edev/1").with_link("DERListLink", "/edev/1/der");
        let edev2 = Resource::new("/edev/2");
        MapFetcher::default()
            .with(
                "/dcap",
                Resource::new("/dcap")
                    .with_link("TimeLink", "/tm")
                    .with_link("EndDeviceListLink", "/edev")
                    .with_field("pollRate", 300),
            )
            .with("/tm", Resource::new("/tm"))
            .with("/edev", list_page("/edev", vec![], 2))
            .with("/edev?s=0&l=5", list_page("/edev", vec![edev1, edev2], 2))
            .with("/edev?s=5&l=5", list_page("/edev", vec![], 2))
    }

    fn store() -> ResourceStore {
        ResourceStore::new(Arc::new(ResourceTypeGraph::new()))
    }

    #[tokio::test]
    async fn test_discover_singular_and_list_items() {
        let fetcher = server();
        let engine = DiscoveryEngine::new(&fetcher, DiscoverySettings::default());
        let mut store = store();
        let mut warnings = WarningTracker::new();

        engine
            .discover(&mut store, &mut warnings, "/dcap", &[ResourceKind::Time, ResourceKind::EndDevice])
            .await
            .unwrap();

        assert_eq!(store.get(ResourceKind::DeviceCapability).len(), 1);
        assert_eq!(store.get(ResourceKind::Time).len(), 1);
        assert_eq!(store.get(ResourceKind::EndDeviceList).len(), 1);
        let edevs: Vec<_> = store.hrefs(ResourceKind::EndDevice).map(|(_, h)| h).collect();
        assert_eq!(edevs, vec!["/edev/1", "/edev/2"]);

        let edev_list = &store.get(ResourceKind::EndDeviceList)[0];
        for edev in store.get(ResourceKind::EndDevice) {
            assert_eq!(edev.parent.as_ref(), Some(&edev_list.id));
            assert_eq!(edev.member_of_list, Some(ResourceKind::EndDeviceList));
        }
        assert!(warnings.is_empty(), "{:?}", warnings.warnings());
        assert_eq!(
            fetcher.requests(),
            vec!["/dcap", "/tm", "/edev", "/edev?s=0&l=5", "/edev?s=5&l=5"]
        );
    }

    #[tokio::test]
    async fn test_missing_link_warns_and_skips() {
        let fetcher = server().with("/edev/1/der", list_page("/edev/1/der", vec![], 0));
        let engine = DiscoveryEngine::new(&fetcher, DiscoverySettings::default());
        let mut store = store();
        let mut warnings = WarningTracker::new();

        engine
            .discover(&mut store, &mut warnings, "/dcap", &[ResourceKind::DERList])
            .await
            .unwrap();

        // Only /edev/1 advertises a DERList
        assert_eq!(store.get(ResourceKind::DERList).len(), 1);
        assert_eq!(warnings.len(), 1);
        assert!(warnings.warnings()[0].starts_with("Resource DERList: expected a DERListLink"));
    }

    #[tokio::test]
    async fn test_rediscovery_replaces_only_requested_kinds() {
        let fetcher = server();
        let engine = DiscoveryEngine::new(&fetcher, DiscoverySettings::default());
        let mut store = store();
        let mut warnings = WarningTracker::new();

        engine
            .discover(&mut store, &mut warnings, "/dcap", &[ResourceKind::EndDevice])
            .await
            .unwrap();
        store.append_resource(ResourceKind::DERSettings, None, Resource::new("/untouched"));
        engine
            .discover(&mut store, &mut warnings, "/dcap", &[ResourceKind::EndDevice])
            .await
            .unwrap();

        assert_eq!(store.get(ResourceKind::EndDevice).len(), 2);
        assert_eq!(store.get(ResourceKind::DeviceCapability).len(), 1);
        assert_eq!(store.get(ResourceKind::DERSettings).len(), 1);
    }

    #[tokio::test]
    async fn test_request_failure_is_fatal() {
        let fetcher = MapFetcher::default();
        let engine = DiscoveryEngine::new(&fetcher, DiscoverySettings::default());
        let mut store = store();
        let mut warnings = WarningTracker::new();

        let err = engine
            .discover(&mut store, &mut warnings, "/dcap", &[ResourceKind::Time])
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::Request(ref e) if e.status() == Some(404)));
    }

    #[test]
    fn test_polling_window_delay() {
        let mut store = store();
        assert_eq!(polling_window_delay(&store, 1_800_000_030, 60), Duration::from_secs(30));
        assert_eq!(polling_window_delay(&store, 1_800_000_020, 60), Duration::from_secs(40));
        assert_eq!(polling_window_delay(&store, 120, 60), Duration::from_secs(60));

        store.set_resource(ResourceKind::DeviceCapability, None, Resource::new("/dcap").with_field("pollRate", 300));
        assert_eq!(polling_window_delay(&store, 1_000, 60), Duration::from_secs(200));
    }
}
