//! Test procedure loading
//!
//! A procedure is a YAML document naming the client aliases it needs and the
//! ordered steps to run. Step position becomes scheduling primacy.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::context::ExecutionContext;
use super::scheduler::StepScheduler;
use super::step::{StepDefinition, StepExecution};
use crate::config::{GlobalConfig, RunConfig};
use crate::error::{ConfigError, HarnessError, Result};
use crate::server::{HttpFetcher, HttpOptions};

fn default_clients() -> Vec<String> {
    vec!["client".to_string()]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestProcedure {
    pub id: String,
    #[serde(default)]
    pub description: String,
    /// Client aliases, in the order configured clients are mapped onto them
    #[serde(default = "default_clients")]
    pub clients: Vec<String>,
    pub steps: Vec<StepDefinition>,
}

impl TestProcedure {
    pub fn from_yaml_str(content: &str) -> std::result::Result<Self, ConfigError> {
        let procedure: TestProcedure = serde_yaml::from_str(content)?;
        procedure.validate()?;
        Ok(procedure)
    }

    pub fn from_file(path: &Path) -> std::result::Result<Self, ConfigError> {
        info!("Loading test procedure from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.clients.is_empty() {
            return Err(ConfigError::Invalid(format!("{}: no client aliases", self.id)));
        }
        for step in &self.steps {
            for alias in step.client.iter().chain(step.use_client_resources.iter()) {
                if !self.clients.contains(alias) {
                    return Err(ConfigError::Invalid(format!(
                        "{}: step {} refers to unknown client alias '{alias}'",
                        self.id, step.id
                    )));
                }
            }
        }
        Ok(())
    }

    /// One execution per step, primacy taken from step position
    pub fn build_steps(&self) -> Result<StepScheduler> {
        let default_client = self
            .clients
            .first()
            .ok_or_else(|| HarnessError::precondition(format!("{} has no client aliases", self.id)))?;

        let mut scheduler = StepScheduler::new();
        for (primacy, step) in self.steps.iter().enumerate() {
            let alias = step.client.as_deref().unwrap_or(default_client);
            scheduler.add(StepExecution::new(Arc::new(step.clone()), alias, primacy as u32));
        }
        Ok(scheduler)
    }
}

/// Create the execution context for running `procedure` against the
/// configured server, with one HTTP session per client alias.
pub fn build_execution_context(
    config: &GlobalConfig,
    run: &RunConfig,
    procedure: &TestProcedure,
) -> Result<ExecutionContext> {
    if run.client_ids.len() != procedure.clients.len() {
        return Err(ConfigError::Invalid(format!(
            "{} needs {} clients ({}) but {} were selected",
            procedure.id,
            procedure.clients.len(),
            procedure.clients.join(", "),
            run.client_ids.len()
        ))
        .into());
    }

    let (base_url, dcap_path) = config.server.split_uri()?;
    let mut context = ExecutionContext::new(&procedure.id, dcap_path, config.execution);

    for (alias, client_id) in procedure.clients.iter().zip(&run.client_ids) {
        let client = config
            .client(client_id)
            .ok_or_else(|| ConfigError::Invalid(format!("no client configured with id '{client_id}'")))?;
        let options = HttpOptions {
            verify_ssl: config.server.verify_ssl,
            timeout: config.execution.request_timeout(),
            identity_pem: Some(client.identity_pem()?),
        };
        let fetcher = HttpFetcher::new(base_url.clone(), options, context.responses.clone())?;
        info!("Client alias {} uses {} ({:?})", alias, client.id, client.client_type);
        context.add_client(alias.clone(), client.clone(), Arc::new(fetcher));
    }
    Ok(context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tokio::time::Instant;

    const PROCEDURE_YAML: &str = r#"
id: S-ALL-01
description: Discovery with a second client
clients: [client, other]
steps:
  - id: DISCOVER
    action:
      type: discovery
      parameters:
        resources: [EndDevice]
    checks:
      - type: discovered
        parameters:
          resources: [EndDevice]
  - id: WAIT
    client: other
    use_client_resources: client
    action:
      type: wait
      parameters:
        wait_seconds: 5
"#;

    #[test]
    fn test_load_and_build_steps() {
        let procedure = TestProcedure::from_yaml_str(PROCEDURE_YAML).unwrap();
        assert_eq!(procedure.steps.len(), 2);

        let mut steps = procedure.build_steps().unwrap();
        let now = Instant::now();
        let first = steps.pop(now).unwrap();
        assert_eq!((first.id(), first.primacy, first.client_alias.as_str()), ("DISCOVER", 0, "client"));

        let second = steps.pop(now).unwrap();
        assert_eq!(second.primacy, 1);
        assert_eq!(second.client_alias, "other");
        assert_eq!(second.client_resources_alias, "client");
    }

    #[test]
    fn test_default_client_alias() {
        let procedure = TestProcedure::from_yaml_str("id: P\nsteps:\n  - id: A\n    action:\n      type: wait\n").unwrap();
        assert_eq!(procedure.clients, vec!["client"]);
    }

    #[test]
    fn test_unknown_alias_rejected() {
        let yaml = PROCEDURE_YAML.replace("client: other", "client: nobody");
        let err = TestProcedure::from_yaml_str(&yaml).unwrap_err();
        assert!(err.to_string().contains("nobody"), "{err}");
    }

    #[test]
    fn test_context_client_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let config_yaml = format!(
            r#"
output_dir: {out}
server:
  device_capability_uri: https://localhost:8443/dcap
clients:
  - id: device-1
    certificate_file: {cert}
    key_file: {key}
    lfdi: ABC
    sfdi: 1
"#,
            out = dir.path().display(),
            cert = dir.path().join("missing.crt").display(),
            key = dir.path().join("missing.key").display(),
        );
        let config = GlobalConfig::from_yaml_str(&config_yaml).unwrap();
        let procedure = TestProcedure::from_yaml_str(PROCEDURE_YAML).unwrap();

        let run = RunConfig {
            test_procedure: PathBuf::from("S-ALL-01.yaml"),
            client_ids: vec!["device-1".to_string()],
        };
        let err = build_execution_context(&config, &run, &procedure).err().unwrap();
        assert!(err.to_string().contains("needs 2 clients"), "{err}");

        let run = RunConfig {
            client_ids: vec!["device-1".to_string(), "ghost".to_string()],
            ..run
        };
        let err = build_execution_context(&config, &run, &procedure).err().unwrap();
        assert!(matches!(err, HarnessError::Config(ConfigError::Io { .. }) | HarnessError::Config(ConfigError::Invalid(_))));
    }
}
