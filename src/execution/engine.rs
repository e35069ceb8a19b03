//! Execution engine
//!
//! Drains a [`StepScheduler`] one execution at a time. Each execution runs its
//! action, then (unless the action asked to repeat) its checks, and the result
//! decides whether the step is repeated, retried, finalised, or whether the
//! whole run aborts.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::Instant;

use super::context::ExecutionContext;
use super::monitor::EngineSnapshot;
use super::scheduler::StepScheduler;
use super::step::{ActionResult, CheckResult, StepExecution};
use crate::error::{HarnessError, Result};

/// Runs the action part of a step
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute_action(&self, step: &StepExecution, context: &mut ExecutionContext) -> Result<ActionResult>;
}

/// Runs the checks of a step
#[async_trait]
pub trait CheckExecutor: Send + Sync {
    async fn execute_checks(&self, step: &StepExecution, context: &mut ExecutionContext) -> Result<CheckResult>;
}

/// Final result of one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub passed: bool,
    pub description: Option<String>,
    /// Set when the step aborted the run
    pub error: Option<String>,
    /// Executions it took to reach this result
    pub executions: u32,
    pub completed_at: DateTime<Utc>,
}

impl StepResult {
    fn new(step: &StepExecution, passed: bool, description: Option<String>, error: Option<String>) -> Self {
        Self {
            step_id: step.id().to_string(),
            passed,
            description,
            error,
            executions: step.attempts + 1,
            completed_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every scheduled step was evaluated
    Completed,
    /// A step raised a harness or transport error
    Aborted { step_id: String, error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub outcome: RunOutcome,
    pub step_results: Vec<StepResult>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ExecutionResult {
    pub fn completed(&self) -> bool {
        self.outcome == RunOutcome::Completed
    }
}

pub struct ExecutionEngine {
    actions: Arc<dyn ActionExecutor>,
    checks: Arc<dyn CheckExecutor>,
    snapshots: watch::Sender<EngineSnapshot>,
}

impl ExecutionEngine {
    pub fn new(actions: Arc<dyn ActionExecutor>, checks: Arc<dyn CheckExecutor>) -> Self {
        let (snapshots, _) = watch::channel(EngineSnapshot::default());
        Self {
            actions,
            checks,
            snapshots,
        }
    }

    /// Receiver for the snapshots published as the run progresses
    pub fn subscribe(&self) -> watch::Receiver<EngineSnapshot> {
        self.snapshots.subscribe()
    }

    fn publish(
        &self,
        context: &ExecutionContext,
        steps: &StepScheduler,
        current: Option<&StepExecution>,
        results: &[StepResult],
        finished: bool,
    ) {
        self.snapshots.send_replace(EngineSnapshot {
            current_step: current.map(|s| s.id().to_string()),
            queued: steps.len(),
            finished_steps: results.len(),
            failed_steps: results.iter().filter(|r| !r.passed).count(),
            warnings: context.warnings.len(),
            responses: context.responses.len(),
            resource_counts: context
                .clients
                .iter()
                .map(|(alias, client)| (alias.clone(), client.resources.counts()))
                .collect(),
            finished,
        });
    }

    /// Run until the scheduler drains or a step aborts the run
    pub async fn run(&self, context: &mut ExecutionContext, mut steps: StepScheduler) -> ExecutionResult {
        let started_at = Utc::now();
        let mut results: Vec<StepResult> = Vec::new();
        tracing::info!("Executing {} with {} steps", context.test_procedure_id, steps.len());

        let outcome = loop {
            let Some(wait) = steps.time_until_next(Instant::now()) else {
                break RunOutcome::Completed;
            };
            if !wait.is_zero() {
                tracing::info!("Delaying execution for {}s", wait.as_secs());
                tokio::time::sleep(wait).await;
                continue;
            }

            let Some(step) = steps.pop(Instant::now()) else {
                continue;
            };
            self.publish(context, &steps, Some(&step), &results, false);
            if step.attempts == 0 {
                for instruction in &step.source.instructions {
                    tracing::info!("{}: {}", step.id(), instruction);
                }
            }

            let action = match self.actions.execute_action(&step, context).await {
                Ok(action) => action,
                Err(e) => break self.abort(context, &mut results, &step, "executing", e),
            };

            if action.repeat {
                context.progress.log_step_progress(&step, "Action requested a repeat", true);
                steps.add(step.next_repeat(action.not_before));
                continue;
            }

            let check = match action.failure {
                Some(failure) => CheckResult::fail(failure),
                None => match self.checks.execute_checks(&step, context).await {
                    Ok(check) => check,
                    Err(e) => break self.abort(context, &mut results, &step, "checking", e),
                },
            };

            if check.passed {
                context.progress.log_step_progress(&step, "Passed", true);
                results.push(StepResult::new(&step, true, check.description, None));
                continue;
            }

            let description = check.description.unwrap_or_else(|| "Checks failed".to_string());
            if step.source.repeat_until_pass && step.attempts + 1 < context.settings.max_attempts {
                context
                    .progress
                    .log_step_progress(&step, format!("Failed, will retry: {description}"), false);
                steps.add(step.next_attempt(Some(Instant::now() + context.settings.repeat_delay())));
                continue;
            }

            context.progress.log_step_progress(&step, format!("Failed: {description}"), false);
            results.push(StepResult::new(&step, false, Some(description), None));
        };

        self.publish(context, &steps, None, &results, true);
        let result = ExecutionResult {
            outcome,
            step_results: results,
            started_at,
            finished_at: Utc::now(),
        };
        tracing::info!(
            "Finished {}: {:?} ({} step results)",
            context.test_procedure_id,
            result.outcome,
            result.step_results.len()
        );
        result
    }

    fn abort(
        &self,
        context: &mut ExecutionContext,
        results: &mut Vec<StepResult>,
        step: &StepExecution,
        phase: &str,
        error: HarnessError,
    ) -> RunOutcome {
        tracing::error!("Step {} aborted the run while {}: {}", step.id(), phase, error);
        context
            .progress
            .log_step_progress(step, format!("Exception raised while {phase} step: {error}"), false);
        results.push(StepResult::new(step, false, None, Some(error.to_string())));
        RunOutcome::Aborted {
            step_id: step.id().to_string(),
            error: error.to_string(),
        }
    }
}
