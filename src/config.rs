//! Harness configuration
//!
//! Loaded from `.cactus.yaml`: where the server lives, which client identities
//! may be used against it, and the execution tunables.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

use crate::discovery::{DiscoverySettings, PaginationSettings};
use crate::error::ConfigError;

pub const CONFIG_FILE_NAME: &str = ".cactus.yaml";

/// Overrides the config file lookup when set
pub const CONFIG_ENV_VAR: &str = "CACTUS_CONFIG";

fn default_true() -> bool {
    true
}

/// The server under test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub device_capability_uri: String,
    #[serde(default = "default_true")]
    pub verify_ssl: bool,
}

impl ServerConfig {
    /// Split the device capability URI into the server base URL and the dcap path
    pub fn split_uri(&self) -> Result<(Url, String), ConfigError> {
        let uri = Url::parse(&self.device_capability_uri).map_err(|e| {
            ConfigError::Invalid(format!(
                "device_capability_uri '{}' is not a valid URL: {e}",
                self.device_capability_uri
            ))
        })?;
        if uri.cannot_be_a_base() || uri.host_str().is_none() {
            return Err(ConfigError::Invalid(format!(
                "device_capability_uri '{}' has no host",
                self.device_capability_uri
            )));
        }

        let mut dcap_path = uri.path().to_string();
        if let Some(query) = uri.query() {
            dcap_path.push('?');
            dcap_path.push_str(query);
        }

        let mut base = uri;
        base.set_path("/");
        base.set_query(None);
        base.set_fragment(None);
        Ok((base, dcap_path))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientType {
    #[default]
    Device,
    Aggregator,
}

/// One client identity the harness can act as
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub id: String,
    #[serde(rename = "type", default)]
    pub client_type: ClientType,
    pub certificate_file: PathBuf,
    pub key_file: PathBuf,
    pub lfdi: String,
    pub sfdi: u64,
    #[serde(default)]
    pub pen: u32,
    #[serde(default)]
    pub pin: u32,
    #[serde(default)]
    pub max_watts: u32,
}

impl ClientConfig {
    /// Certificate followed by key, PEM encoded
    pub fn identity_pem(&self) -> Result<Vec<u8>, ConfigError> {
        let read = |path: &Path| {
            std::fs::read(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        };
        let mut pem = read(&self.certificate_file)?;
        if !pem.ends_with(b"\n") {
            pem.push(b'\n');
        }
        pem.extend(read(&self.key_file)?);
        Ok(pem)
    }
}

/// Execution tunables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSettings {
    pub page_size: u32,
    pub max_pages: u32,
    /// Delay before retrying a failed repeat-until-pass step
    pub repeat_delay_seconds: u64,
    /// Executions allowed for a repeat-until-pass step before it fails for good
    pub max_attempts: u32,
    pub default_poll_rate_seconds: u64,
    pub request_timeout_seconds: u64,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            page_size: 5,
            max_pages: 100,
            repeat_delay_seconds: 5,
            max_attempts: 60,
            default_poll_rate_seconds: 60,
            request_timeout_seconds: 30,
        }
    }
}

impl ExecutionSettings {
    pub fn repeat_delay(&self) -> Duration {
        Duration::from_secs(self.repeat_delay_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn discovery(&self) -> DiscoverySettings {
        DiscoverySettings {
            pagination: PaginationSettings {
                page_size: self.page_size,
                max_pages: self.max_pages,
            },
            default_poll_rate_seconds: self.default_poll_rate_seconds,
        }
    }
}

/// Top level configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalConfig {
    pub output_dir: PathBuf,
    pub server: ServerConfig,
    #[serde(default)]
    pub clients: Vec<ClientConfig>,
    #[serde(default)]
    pub execution: ExecutionSettings,
}

impl GlobalConfig {
    /// Parse and validate YAML
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: GlobalConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        info!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml_str(&content)?;
        info!("Loaded configuration with {} clients", config.clients.len());
        Ok(config)
    }

    /// Where to look for the config file, most specific first
    pub fn candidate_paths(env_override: Option<PathBuf>, cwd: Option<PathBuf>, home: Option<PathBuf>) -> Vec<PathBuf> {
        env_override
            .into_iter()
            .chain(cwd.map(|d| d.join(CONFIG_FILE_NAME)))
            .chain(home.map(|d| d.join(CONFIG_FILE_NAME)))
            .collect()
    }

    /// Load from `$CACTUS_CONFIG`, else the working directory, else home
    pub fn discover() -> Result<(PathBuf, Self), ConfigError> {
        let candidates = Self::candidate_paths(
            std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from),
            std::env::current_dir().ok(),
            std::env::var_os("HOME").map(PathBuf::from),
        );
        match candidates.iter().find(|p| p.is_file()) {
            Some(path) => Ok((path.clone(), Self::from_file(path)?)),
            None => Err(ConfigError::NotFound(
                candidates
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            )),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("output_dir must be set".to_string()));
        }
        self.server.split_uri()?;

        let mut seen = HashSet::new();
        for client in &self.clients {
            if client.id.is_empty() {
                return Err(ConfigError::Invalid("client id must not be empty".to_string()));
            }
            if !seen.insert(client.id.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate client id '{}'", client.id)));
            }
        }

        if self.execution.page_size == 0 {
            return Err(ConfigError::Invalid("execution.page_size must be at least 1".to_string()));
        }
        if self.execution.max_pages == 0 {
            return Err(ConfigError::Invalid("execution.max_pages must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn client(&self, id: &str) -> Option<&ClientConfig> {
        self.clients.iter().find(|c| c.id == id)
    }
}

/// What to run: a procedure file and the configured clients to run it with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub test_procedure: PathBuf,
    /// Mapped onto the procedure's client aliases in order
    pub client_ids: Vec<String>,
}
