//! Execution context
//!
//! Everything a run's actions and checks can see: per-client sessions and
//! resource stores, the trackers, and the settings. Owned by the single
//! execution stream.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::step::StepExecution;
use crate::config::{ClientConfig, ExecutionSettings};
use crate::error::{HarnessError, Result};
use crate::resource::{ResourceStore, ResourceTypeGraph};
use crate::server::{ResourceFetcher, ResponseTracker};
use crate::tracker::{ProgressTracker, WarningTracker};

/// One client identity taking part in a run
pub struct ClientContext {
    /// Alias the test procedure uses for this client
    pub alias: String,
    pub config: ClientConfig,
    pub resources: ResourceStore,
    pub fetcher: Arc<dyn ResourceFetcher>,
}

pub struct ExecutionContext {
    pub test_procedure_id: String,
    /// Path of DeviceCapability on the server
    pub dcap_path: String,
    pub graph: Arc<ResourceTypeGraph>,
    pub settings: ExecutionSettings,
    pub clients: BTreeMap<String, ClientContext>,
    pub warnings: WarningTracker,
    pub progress: ProgressTracker,
    pub responses: ResponseTracker,
    pub created_at: DateTime<Utc>,
}

impl ExecutionContext {
    pub fn new(test_procedure_id: impl Into<String>, dcap_path: impl Into<String>, settings: ExecutionSettings) -> Self {
        Self {
            test_procedure_id: test_procedure_id.into(),
            dcap_path: dcap_path.into(),
            graph: Arc::new(ResourceTypeGraph::new()),
            settings,
            clients: BTreeMap::new(),
            warnings: WarningTracker::new(),
            progress: ProgressTracker::new(),
            responses: ResponseTracker::new(),
            created_at: Utc::now(),
        }
    }

    /// Register a client under its procedure alias, with an empty store
    pub fn add_client(&mut self, alias: impl Into<String>, config: ClientConfig, fetcher: Arc<dyn ResourceFetcher>) {
        let alias = alias.into();
        let resources = ResourceStore::new(self.graph.clone());
        self.clients.insert(
            alias.clone(),
            ClientContext {
                alias,
                config,
                resources,
                fetcher,
            },
        );
    }

    pub fn client(&self, alias: &str) -> Result<&ClientContext> {
        self.clients
            .get(alias)
            .ok_or_else(|| HarnessError::precondition(format!("no client with alias '{alias}'")))
    }

    fn client_mut(&mut self, alias: &str) -> Result<&mut ClientContext> {
        self.clients
            .get_mut(alias)
            .ok_or_else(|| HarnessError::precondition(format!("no client with alias '{alias}'")))
    }

    /// Session of the client performing `step`
    pub fn fetcher(&self, step: &StepExecution) -> Result<Arc<dyn ResourceFetcher>> {
        Ok(self.client(&step.client_alias)?.fetcher.clone())
    }

    /// Resource store `step` reads
    pub fn resources(&self, step: &StepExecution) -> Result<&ResourceStore> {
        Ok(&self.client(&step.client_resources_alias)?.resources)
    }

    /// Resource store `step` writes
    pub fn resources_mut(&mut self, step: &StepExecution) -> Result<&mut ResourceStore> {
        Ok(&mut self.client_mut(&step.client_resources_alias)?.resources)
    }

    /// Session, store and warning sink for a discovery performed by `step`
    pub fn discovery_parts(
        &mut self,
        step: &StepExecution,
    ) -> Result<(Arc<dyn ResourceFetcher>, &mut ResourceStore, &mut WarningTracker)> {
        let fetcher = self.fetcher(step)?;
        let client = self
            .clients
            .get_mut(&step.client_resources_alias)
            .ok_or_else(|| HarnessError::precondition(format!("no client with alias '{}'", step.client_resources_alias)))?;
        Ok((fetcher, &mut client.resources, &mut self.warnings))
    }
}
