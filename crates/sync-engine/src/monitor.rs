// crates/sync-engine/src/monitor.rs
//! Waiting for engine tasks to finish

use bookshelf_core::AppError;
use bookshelf_resilience::{CancellationToken, Deadline, WaitOutcome};
use bookshelf_search_engine::{SearchEngine, TaskHandle};
use std::time::Duration;

/// What a successful wait observed
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorReport {
    pub tasks: usize,
    pub polls: usize,
    pub waited: Duration,
}

/// Polls task statuses until all are terminal, the deadline passes or the wait is
/// cancelled
#[derive(Debug, Clone)]
pub struct TaskMonitor {
    deadline: Duration,
    poll_interval: Duration,
}

impl TaskMonitor {
    pub fn new(deadline: Duration, poll_interval: Duration) -> Self {
        Self {
            deadline,
            poll_interval,
        }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Waits for `handles`
    ///
    /// A task ending `failed` or `canceled` fails the wait with `WriteRejected`
    /// right away. A failing status query fails it with `TaskStatusUnavailable`.
    pub async fn wait_for(
        &self,
        engine: &dyn SearchEngine,
        handles: &[TaskHandle],
        cancel: &CancellationToken,
    ) -> Result<MonitorReport, AppError> {
        let deadline = Deadline::after(self.deadline);
        let mut pending = handles.to_vec();
        let mut polls = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(cancelled());
            }
            if pending.is_empty() {
                return Ok(MonitorReport {
                    tasks: handles.len(),
                    polls,
                    waited: deadline.elapsed(),
                });
            }

            pending = poll(engine, &pending).await?;
            polls += 1;
            if pending.is_empty() {
                continue;
            }

            log::debug!(
                "{} of {} task(s) pending after {:?}",
                pending.len(),
                handles.len(),
                deadline.elapsed()
            );

            match deadline.pause(self.poll_interval, cancel).await {
                WaitOutcome::Elapsed => {}
                WaitOutcome::DeadlineReached => {
                    // Last look at the deadline itself.
                    pending = poll(engine, &pending).await?;
                    polls += 1;
                    if pending.is_empty() {
                        continue;
                    }
                    return Err(AppError::IndexingTimeout {
                        pending: pending.len(),
                        waited_secs: deadline.elapsed().as_secs(),
                    });
                }
                WaitOutcome::Cancelled => return Err(cancelled()),
            }
        }
    }
}

/// Queries `pending` once and returns the handles that are still not terminal
async fn poll(engine: &dyn SearchEngine, pending: &[TaskHandle]) -> Result<Vec<TaskHandle>, AppError> {
    let statuses = engine
        .get_task_statuses(pending)
        .await
        .map_err(|e| AppError::TaskStatusUnavailable {
            reason: e.to_string(),
        })?;

    if let Some(failed) = statuses
        .iter()
        .find(|s| s.state.is_terminal() && !s.state.is_success())
    {
        return Err(AppError::WriteRejected {
            index: failed.index.clone().unwrap_or_default(),
            reason: format!(
                "{} {}: {}",
                failed.handle,
                failed.state,
                failed.error.as_deref().unwrap_or("no reason given")
            ),
        });
    }

    Ok(statuses
        .iter()
        .filter(|s| !s.state.is_terminal())
        .map(|s| s.handle)
        .collect())
}

fn cancelled() -> AppError {
    AppError::Cancelled {
        operation: "waiting for indexing tasks".to_string(),
    }
}
