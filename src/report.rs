//! Run summary and report output

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::execution::{ExecutionContext, ExecutionResult, RunOutcome, StepResult};
use crate::server::ServerResponse;
use crate::tracker::ProgressEntry;

/// Everything worth keeping once a run is over
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub test_procedure_id: String,
    pub outcome: RunOutcome,
    pub step_results: Vec<StepResult>,
    pub warnings: Vec<String>,
    pub progress: Vec<ProgressEntry>,
    pub responses: Vec<ServerResponse>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn new(context: &ExecutionContext, result: ExecutionResult) -> Self {
        Self {
            test_procedure_id: context.test_procedure_id.clone(),
            outcome: result.outcome,
            step_results: result.step_results,
            warnings: context.warnings.warnings().to_vec(),
            progress: context.progress.entries().to_vec(),
            responses: context.responses.responses(),
            started_at: result.started_at,
            finished_at: result.finished_at,
        }
    }

    /// Completed, every step passed and nothing was warned about
    pub fn success(&self) -> bool {
        self.outcome == RunOutcome::Completed
            && self.step_results.iter().all(|r| r.passed)
            && self.warnings.is_empty()
    }

    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at).to_std().unwrap_or_default()
    }
}

/// Compact duration: `Nms` under 5s, `Ns` under 2 minutes, else `XmYs`
pub fn relative_time(duration: Duration) -> String {
    let seconds = duration.as_secs();
    if duration < Duration::from_secs(5) {
        format!("{}ms", duration.as_millis())
    } else if seconds < 120 {
        format!("{seconds}s")
    } else {
        format!("{}m{}s", seconds / 60, seconds % 60)
    }
}

/// Human readable summary printed at the end of a run
pub fn render_summary(summary: &RunSummary) -> String {
    let mut out = String::new();
    let verdict = if summary.success() { "PASS" } else { "FAIL" };
    let _ = writeln!(
        out,
        "{} {} in {}",
        summary.test_procedure_id,
        verdict,
        relative_time(summary.duration())
    );
    if let RunOutcome::Aborted { step_id, error } = &summary.outcome {
        let _ = writeln!(out, "  aborted at {step_id}: {error}");
    }

    for result in &summary.step_results {
        let offset = (result.completed_at - summary.started_at).to_std().unwrap_or_default();
        let status = if result.passed { "ok" } else { "FAILED" };
        let _ = write!(out, "  +{:<8} {:<24} {}", relative_time(offset), result.step_id, status);
        if let Some(description) = result.description.as_deref().filter(|_| !result.passed) {
            let _ = write!(out, " ({description})");
        }
        out.push('\n');
    }

    if !summary.warnings.is_empty() {
        let _ = writeln!(out, "  {} warnings:", summary.warnings.len());
        for warning in &summary.warnings {
            let _ = writeln!(out, "    {warning}");
        }
    }
    let _ = writeln!(out, "  {} requests sent", summary.responses.len());
    out
}

/// Write the summary as JSON under `output_dir`, returning the file path
pub fn write_report(output_dir: &Path, summary: &RunSummary) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;

    let file_name = format!(
        "{}-{}.json",
        summary.test_procedure_id,
        summary.started_at.format("%Y%m%dT%H%M%SZ")
    );
    let path = output_dir.join(file_name);
    let json = serde_json::to_string_pretty(summary).context("Failed to serialize run summary")?;
    std::fs::write(&path, json).with_context(|| format!("Failed to write report {}", path.display()))?;

    tracing::info!("Report written to {}", path.display());
    Ok(path)
}
