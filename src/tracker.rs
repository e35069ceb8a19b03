//! Warning and progress tracking
//!
//! Warnings are minor failures that never stop a run but count against it in
//! the final report. Progress is the per-execution log of what each step did.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::execution::step::StepExecution;
use crate::resource::ResourceKind;

/// Non-fatal diagnostic channel
pub trait WarningSink: Send {
    fn log(&mut self, message: String);

    fn log_resource_warning(&mut self, kind: ResourceKind, message: &str) {
        self.log(format!("Resource {kind}: {message}"));
    }

    fn log_step_warning(&mut self, step: &StepExecution, message: &str) {
        self.log(format!("Step {}[{}]: {message}", step.id(), step.repeat_number));
    }
}

#[derive(Debug, Clone, Default)]
pub struct WarningTracker {
    warnings: Vec<String>,
}

impl WarningTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }
}

impl WarningSink for WarningTracker {
    fn log(&mut self, message: String) {
        tracing::warn!("{}", message);
        self.warnings.push(message);
    }
}

/// One line of step progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub step_id: String,
    pub repeat_number: u32,
    pub attempt: u32,
    pub message: String,
    pub success: bool,
    pub logged_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    entries: Vec<ProgressEntry>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record progress for one execution of a step
    pub fn log_step_progress(&mut self, step: &StepExecution, message: impl Into<String>, success: bool) {
        let message = message.into();
        tracing::info!(
            "{}[{}] Attempt {}: {}",
            step.id(),
            step.repeat_number,
            step.attempts,
            message
        );
        self.entries.push(ProgressEntry {
            step_id: step.id().to_string(),
            repeat_number: step.repeat_number,
            attempt: step.attempts,
            message,
            success,
            logged_at: Utc::now(),
        });
    }

    pub fn entries(&self) -> &[ProgressEntry] {
        &self.entries
    }

    /// Entries for a single step, oldest first
    pub fn for_step<'a>(&'a self, step_id: &'a str) -> impl Iterator<Item = &'a ProgressEntry> + 'a {
        self.entries.iter().filter(move |e| e.step_id == step_id)
    }
}
