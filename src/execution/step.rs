//! Step definitions and scheduled step executions

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;

use crate::error::{HarnessError, Result};
use crate::resource::ResourceKind;

/// Named parameters of an action or check
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters(BTreeMap<String, Value>);

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }
}

/// Typed access to [`Parameters`] with errors naming the owning step
pub struct ParameterReader<'a> {
    step_id: &'a str,
    parameters: &'a Parameters,
}

impl<'a> ParameterReader<'a> {
    pub fn new(step_id: &'a str, parameters: &'a Parameters) -> Self {
        Self { step_id, parameters }
    }

    fn error(&self, name: &str, message: impl Into<String>) -> HarnessError {
        HarnessError::invalid_parameter(self.step_id, name, message)
    }

    pub fn optional<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        match self.parameters.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| self.error(name, e.to_string())),
        }
    }

    pub fn required<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        self.optional(name)?
            .ok_or_else(|| self.error(name, "missing mandatory parameter"))
    }

    pub fn kind(&self, name: &str) -> Result<ResourceKind> {
        self.required(name)
    }

    pub fn kinds(&self, name: &str) -> Result<Vec<ResourceKind>> {
        self.required(name)
    }

    pub fn optional_kinds(&self, name: &str) -> Result<Vec<ResourceKind>> {
        Ok(self.optional(name)?.unwrap_or_default())
    }

    pub fn optional_bool(&self, name: &str) -> Result<Option<bool>> {
        self.optional(name)
    }
}

/// What a step does
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub parameters: Parameters,
}

/// How a step's outcome is judged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub parameters: Parameters,
}

/// One step of a test procedure, immutable once loaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Client alias that performs the step, defaults to the procedure's first client
    #[serde(default)]
    pub client: Option<String>,
    /// Client alias whose resource store the step reads and writes
    #[serde(default)]
    pub use_client_resources: Option<String>,
    pub action: ActionDefinition,
    #[serde(default)]
    pub checks: Vec<CheckDefinition>,
    #[serde(default)]
    pub repeat_until_pass: bool,
    /// Operator instructions shown when the step starts
    #[serde(default)]
    pub instructions: Vec<String>,
}

impl StepDefinition {
    pub fn new(id: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: None,
            client: None,
            use_client_resources: None,
            action: ActionDefinition {
                kind: action.into(),
                parameters: Parameters::new(),
            },
            checks: Vec::new(),
            repeat_until_pass: false,
            instructions: Vec::new(),
        }
    }

    pub fn with_action_parameters(mut self, parameters: Parameters) -> Self {
        self.action.parameters = parameters;
        self
    }

    pub fn with_check(mut self, kind: impl Into<String>, parameters: Parameters) -> Self {
        self.checks.push(CheckDefinition {
            kind: kind.into(),
            parameters,
        });
        self
    }

    pub fn repeat_until_pass(mut self) -> Self {
        self.repeat_until_pass = true;
        self
    }

    pub fn action_parameters(&self) -> ParameterReader<'_> {
        ParameterReader::new(&self.id, &self.action.parameters)
    }
}

/// A scheduled execution of a step
#[derive(Debug, Clone)]
pub struct StepExecution {
    pub source: Arc<StepDefinition>,
    /// Client whose session performs the step
    pub client_alias: String,
    /// Client whose resource store is used, usually `client_alias`
    pub client_resources_alias: String,
    /// Lower runs first
    pub primacy: u32,
    /// Number of prior executions that asked to be repeated
    pub repeat_number: u32,
    pub not_before: Option<Instant>,
    /// Number of prior executions of this step
    pub attempts: u32,
}

impl StepExecution {
    pub fn new(source: Arc<StepDefinition>, client_alias: impl Into<String>, primacy: u32) -> Self {
        let client_alias = client_alias.into();
        let client_resources_alias = source
            .use_client_resources
            .clone()
            .unwrap_or_else(|| client_alias.clone());
        Self {
            source,
            client_alias,
            client_resources_alias,
            primacy,
            repeat_number: 0,
            not_before: None,
            attempts: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.source.id
    }

    pub fn is_ready(&self, now: Instant) -> bool {
        self.not_before.map_or(true, |nb| nb <= now)
    }

    /// The execution scheduled when an action asks to be repeated
    pub fn next_repeat(&self, not_before: Option<Instant>) -> Self {
        Self {
            repeat_number: self.repeat_number + 1,
            attempts: self.attempts + 1,
            not_before,
            ..self.clone()
        }
    }

    /// The execution scheduled when a failed step is retried
    pub fn next_attempt(&self, not_before: Option<Instant>) -> Self {
        Self {
            attempts: self.attempts + 1,
            not_before,
            ..self.clone()
        }
    }
}

/// Outcome of an action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResult {
    /// Run the action again (with a higher repeat number) instead of checking
    pub repeat: bool,
    /// When `repeat` is set, the earliest the next execution may start
    pub not_before: Option<Instant>,
    /// Retriable failure reported by the action itself
    pub failure: Option<String>,
}

impl ActionResult {
    pub fn done() -> Self {
        Self {
            repeat: false,
            not_before: None,
            failure: None,
        }
    }

    pub fn repeat(not_before: Option<Instant>) -> Self {
        Self {
            repeat: true,
            not_before,
            failure: None,
        }
    }

    pub fn failed(description: impl Into<String>) -> Self {
        Self {
            repeat: false,
            not_before: None,
            failure: Some(description.into()),
        }
    }
}

/// Outcome of a step's checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub passed: bool,
    pub description: Option<String>,
}

impl CheckResult {
    pub fn pass() -> Self {
        Self {
            passed: true,
            description: None,
        }
    }

    pub fn fail(description: impl Into<String>) -> Self {
        Self {
            passed: false,
            description: Some(description.into()),
        }
    }
}
