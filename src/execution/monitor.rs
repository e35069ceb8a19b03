//! Read-only run monitor
//!
//! The engine publishes an [`EngineSnapshot`] after every transition on a
//! watch channel. A monitor task polls the latest snapshot at a fixed cadence
//! and renders it; it never touches the engine's state directly.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{HarnessError, Result};
use crate::resource::ResourceKind;

/// Point-in-time view of a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineSnapshot {
    pub current_step: Option<String>,
    pub queued: usize,
    pub finished_steps: usize,
    pub failed_steps: usize,
    pub warnings: usize,
    pub responses: usize,
    /// Stored resource counts per client alias
    pub resource_counts: BTreeMap<String, BTreeMap<ResourceKind, usize>>,
    pub finished: bool,
}

impl EngineSnapshot {
    /// One line summary used by the default renderer
    pub fn status_line(&self) -> String {
        let current = self.current_step.as_deref().unwrap_or("-");
        format!(
            "step {current} | {} done ({} failed) | {} queued | {} warnings | {} responses",
            self.finished_steps, self.failed_steps, self.queued, self.warnings, self.responses
        )
    }
}

/// Poll `snapshots` every `cadence` and hand each to `render` until the run
/// reports finished or the engine goes away.
pub fn spawn_monitor<F>(mut snapshots: watch::Receiver<EngineSnapshot>, cadence: Duration, mut render: F) -> JoinHandle<()>
where
    F: FnMut(&EngineSnapshot) + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cadence);
        loop {
            ticker.tick().await;
            let snapshot = snapshots.borrow_and_update().clone();
            render(&snapshot);
            if snapshot.finished {
                break;
            }
            if snapshots.has_changed().is_err() {
                // Sender dropped without a final snapshot
                break;
            }
        }
    })
}

/// Default renderer: log the status line
pub fn log_snapshot(snapshot: &EngineSnapshot) {
    tracing::info!("{}", snapshot.status_line());
}

/// Drive `run` to completion alongside a monitor. The monitor finishing
/// first is a fatal harness error.
pub async fn run_with_monitor<T, Fut>(run: Fut, monitor: JoinHandle<()>) -> Result<T>
where
    Fut: Future<Output = T>,
{
    tokio::pin!(run);
    let mut monitor = monitor;
    tokio::select! {
        biased;
        output = &mut run => {
            // Let the monitor render the final snapshot
            if let Err(e) = monitor.await {
                tracing::warn!("Monitor failed after the run finished: {}", e);
            }
            Ok(output)
        }
        joined = &mut monitor => {
            let reason = match joined {
                Ok(()) => "monitor exited before the run finished".to_string(),
                Err(e) => format!("monitor failed: {e}"),
            };
            tracing::error!("{}", reason);
            Err(HarnessError::Monitor(reason))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test(start_paused = true)]
    async fn test_monitor_renders_until_finished() {
        let (tx, rx) = watch::channel(EngineSnapshot::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handle = spawn_monitor(rx, Duration::from_millis(100), move |s| {
            sink.lock().unwrap().push(s.current_step.clone());
        });

        let run = async {
            tx.send_replace(EngineSnapshot {
                current_step: Some("1".to_string()),
                ..Default::default()
            });
            tokio::time::sleep(Duration::from_millis(250)).await;
            tx.send_replace(EngineSnapshot {
                finished: true,
                ..Default::default()
            });
            42
        };

        assert_eq!(run_with_monitor(run, handle).await.unwrap(), 42);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.first(), Some(&Some("1".to_string())));
        assert_eq!(seen.last(), Some(&None));
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_exit_is_fatal() {
        let handle = tokio::spawn(async {});
        let run = async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        };
        let err = run_with_monitor(run, handle).await.unwrap_err();
        assert!(matches!(err, HarnessError::Monitor(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_failure_after_run_keeps_output() {
        let handle = tokio::spawn(async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            panic!("renderer blew up");
        });
        let output = run_with_monitor(async { 7 }, handle).await.unwrap();
        assert_eq!(output, 7);
    }

    #[test]
    fn test_status_line() {
        let snapshot = EngineSnapshot {
            current_step: Some("DISCOVER".to_string()),
            queued: 3,
            finished_steps: 2,
            failed_steps: 1,
            warnings: 4,
            responses: 9,
            ..Default::default()
        };
        assert_eq!(
            snapshot.status_line(),
            "step DISCOVER | 2 done (1 failed) | 3 queued | 4 warnings | 9 responses"
        );
    }
}
