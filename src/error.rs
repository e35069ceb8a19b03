//! Error handling for the conformance harness
//!
//! Transport failures, run-fatal harness errors, configuration problems and
//! resource table faults each get their own thiserror enum. Non-fatal
//! inconsistencies are not errors at all; they go to the warning tracker.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for a harness run. Anything surfacing as this aborts the run.
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Request error: {0}")]
    Request(#[from] RequestError),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Invalid resource kind: {0}")]
    InvalidResourceKind(String),

    #[error("Step {step}: invalid parameter '{name}': {message}")]
    InvalidParameter {
        step: String,
        name: String,
        message: String,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Monitor error: {0}")]
    Monitor(String),
}

impl HarnessError {
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition(message.into())
    }

    pub fn invalid_parameter(
        step: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            step: step.into(),
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Failures of a single fetch (or a pagination sequence) against the server
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("{method} {url} returned {status}: {body}")]
    Status {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("Transport error requesting {url}: {message}")]
    Transport { url: String, message: String },

    #[error("Unable to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Requested {max_pages} pages of {href} without reaching an empty page")]
    TooManyPages { href: String, max_pages: u32 },

    #[error("{0}")]
    Unexpected(String),
}

impl RequestError {
    /// HTTP status if the server actually answered
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self.status(), Some(s) if (400..500).contains(&s))
    }
}

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No configuration file found (looked for {0})")]
    NotFound(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Faults in a resource descriptor table, detected when the graph is built
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Resource kind {0} has no descriptor")]
    MissingKind(String),

    #[error("Resource kind {0} is described more than once")]
    DuplicateKind(String),

    #[error("Resource kind {0} is a second root")]
    MultipleRoots(String),

    #[error("Resource kind {0} is not reachable from the root")]
    Unreachable(String),
}

pub type Result<T, E = HarnessError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_error_client_error() {
        let err = RequestError::Status {
            method: "GET".to_string(),
            url: "/edev".to_string(),
            status: 403,
            body: String::new(),
        };
        assert!(err.is_client_error());
        assert_eq!(err.status(), Some(403));

        let err = RequestError::Transport {
            url: "/edev".to_string(),
            message: "connection refused".to_string(),
        };
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_harness_error_from_request() {
        let err: HarnessError = RequestError::Unexpected("boom".to_string()).into();
        assert!(matches!(err, HarnessError::Request(_)));
        assert_eq!(err.to_string(), "Request error: boom");
    }
}
