// crates/sync-engine/src/controller.rs
//! Reindex runs: staging, cutover and the single-flight guard

use crate::error::{ReindexError, ReindexResult};
use crate::monitor::TaskMonitor;
use crate::provisioner::IndexProvisioner;
use crate::writer::{StagingReport, StagingWriter};
use bookshelf_config::{ReindexConfig, SearchConfig};
use bookshelf_content_sources::MetadataSource;
use bookshelf_core::AppError;
use bookshelf_resilience::CancellationToken;
use bookshelf_search_engine::{SearchEngine, SearchError, TaskHandle};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Where a reindex run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReindexState {
    Idle,
    Provisioning,
    Staging,
    Monitoring,
    Swapping,
    Aborted,
}

impl fmt::Display for ReindexState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReindexState::Idle => "idle",
            ReindexState::Provisioning => "provisioning",
            ReindexState::Staging => "staging",
            ReindexState::Monitoring => "monitoring",
            ReindexState::Swapping => "swapping",
            ReindexState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Index names and limits a controller runs with
#[derive(Debug, Clone, PartialEq)]
pub struct ReindexSettings {
    pub primary_index: String,
    pub staging_index: String,
    pub batch_size: usize,
    pub write_batch_size: usize,
    pub task_deadline: Duration,
    pub poll_interval: Duration,
}

impl Default for ReindexSettings {
    fn default() -> Self {
        Self::from_config(&SearchConfig::default(), &ReindexConfig::default())
    }
}

impl ReindexSettings {
    pub fn from_config(search: &SearchConfig, reindex: &ReindexConfig) -> Self {
        Self {
            primary_index: search.primary_index().to_string(),
            staging_index: search.staging_index(),
            batch_size: reindex.batch_size,
            write_batch_size: reindex.write_batch_size,
            task_deadline: reindex.task_deadline(),
            poll_interval: reindex.poll_interval(),
        }
    }
}

/// How a finished run ended
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Succeeded,
    Aborted {
        stage: ReindexState,
        kind: &'static str,
        message: String,
    },
}

/// Summary of one reindex run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: RunOutcome,
    /// Ids listed by the source
    pub identifiers: usize,
    pub documents: usize,
    pub skipped: usize,
    pub batches: usize,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.outcome == RunOutcome::Succeeded
    }
}

/// Snapshot served by the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ControllerStatus {
    pub state: ReindexState,
    pub primary_index: String,
    pub staging_index: String,
    pub running_since: Option<DateTime<Utc>>,
    pub last_run: Option<RunReport>,
}

#[derive(Debug)]
struct Progress {
    state: ReindexState,
    running_since: Option<DateTime<Utc>>,
    last_run: Option<RunReport>,
}

/// Drives reindex runs against one source and one engine
///
/// At most one run is in flight; a second trigger is rejected with
/// `AlreadyRunning`. Only the swap step changes what readers see.
pub struct ReindexController {
    source: Arc<dyn MetadataSource>,
    engine: Arc<dyn SearchEngine>,
    settings: ReindexSettings,
    provisioner: IndexProvisioner,
    writer: StagingWriter,
    monitor: TaskMonitor,
    running: AtomicBool,
    progress: Mutex<Progress>,
    cancel: CancellationToken,
}

/// Releases the single-flight flag however the run ends
struct RunGuard<'a> {
    controller: &'a ReindexController,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.controller.set_state(ReindexState::Idle, None);
        self.controller.running.store(false, Ordering::Release);
    }
}

impl ReindexController {
    pub fn new(
        source: Arc<dyn MetadataSource>,
        engine: Arc<dyn SearchEngine>,
        settings: ReindexSettings,
    ) -> Self {
        Self::with_cancellation(source, engine, settings, CancellationToken::new())
    }

    /// A controller whose waits end when `cancel` fires
    pub fn with_cancellation(
        source: Arc<dyn MetadataSource>,
        engine: Arc<dyn SearchEngine>,
        settings: ReindexSettings,
        cancel: CancellationToken,
    ) -> Self {
        let writer = StagingWriter::new(
            source.clone(),
            engine.clone(),
            settings.batch_size,
            settings.write_batch_size,
        );
        let monitor = TaskMonitor::new(settings.task_deadline, settings.poll_interval);
        Self {
            provisioner: IndexProvisioner::new(engine.clone()),
            source,
            engine,
            settings,
            writer,
            monitor,
            running: AtomicBool::new(false),
            progress: Mutex::new(Progress {
                state: ReindexState::Idle,
                running_since: None,
                last_run: None,
            }),
            cancel,
        }
    }

    pub fn settings(&self) -> &ReindexSettings {
        &self.settings
    }

    pub fn source(&self) -> &Arc<dyn MetadataSource> {
        &self.source
    }

    pub fn engine(&self) -> &Arc<dyn SearchEngine> {
        &self.engine
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn state(&self) -> ReindexState {
        self.with_progress(|p| p.state).unwrap_or(ReindexState::Idle)
    }

    pub fn status(&self) -> ControllerStatus {
        let (state, running_since, last_run) = self
            .with_progress(|p| (p.state, p.running_since, p.last_run.clone()))
            .unwrap_or((ReindexState::Idle, None, None));
        ControllerStatus {
            state,
            primary_index: self.settings.primary_index.clone(),
            staging_index: self.settings.staging_index.clone(),
            running_since,
            last_run,
        }
    }

    pub fn last_run(&self) -> Option<RunReport> {
        self.with_progress(|p| p.last_run.clone()).flatten()
    }

    /// Ensures both indexes exist with the catalog schema
    pub async fn provision(&self) -> Result<(), AppError> {
        self.provisioner
            .ensure_all(
                &[
                    self.settings.primary_index.as_str(),
                    self.settings.staging_index.as_str(),
                ],
                &self.monitor,
                &self.cancel,
            )
            .await
    }

    /// Runs a full reindex and swaps it in on success
    pub async fn run(&self) -> ReindexResult<RunReport> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            let started_secs_ago = self
                .with_progress(|p| p.running_since)
                .flatten()
                .map(|since| (Utc::now() - since).num_seconds().max(0) as u64)
                .unwrap_or(0);
            log::warn!("Reindex trigger rejected: a run is already in progress");
            return Err(ReindexError::new(
                self.state(),
                AppError::AlreadyRunning { started_secs_ago },
            ));
        }
        let _guard = RunGuard { controller: self };

        let started_at = Utc::now();
        self.set_state(ReindexState::Provisioning, Some(started_at));
        log::info!(
            "Reindex started: {} -> '{}' (primary '{}')",
            self.source.name(),
            self.settings.staging_index,
            self.settings.primary_index
        );

        let mut staged = StagingReport::default();
        match self.execute(&mut staged).await {
            Ok(()) => {
                let report = self.report(started_at, &staged, RunOutcome::Succeeded);
                log::info!(
                    "Reindex finished: {} document(s) from {} id(s), {} skipped",
                    report.documents,
                    report.identifiers,
                    report.skipped
                );
                self.record(report.clone());
                Ok(report)
            }
            Err(err) => {
                log::error!("{}; primary index untouched", err);
                self.set_state(ReindexState::Aborted, Some(started_at));
                let outcome = RunOutcome::Aborted {
                    stage: err.stage,
                    kind: err.kind(),
                    message: err.cause.to_string(),
                };
                self.record(self.report(started_at, &staged, outcome));
                Err(err)
            }
        }
    }

    async fn execute(&self, staged: &mut StagingReport) -> ReindexResult<()> {
        let primary = self.settings.primary_index.as_str();
        let staging = self.settings.staging_index.as_str();

        self.provision()
            .await
            .map_err(|e| ReindexError::new(ReindexState::Provisioning, e))?;

        self.enter(ReindexState::Staging);
        *staged = self
            .writer
            .populate(staging, &self.cancel)
            .await
            .map_err(|e| ReindexError::new(ReindexState::Staging, e))?;

        self.enter(ReindexState::Monitoring);
        let waited = self
            .monitor
            .wait_for(self.engine.as_ref(), &staged.tasks, &self.cancel)
            .await
            .map_err(|e| ReindexError::new(ReindexState::Monitoring, e))?;
        log::debug!("{} task(s) finished after {} poll(s)", waited.tasks, waited.polls);

        self.enter(ReindexState::Swapping);
        let task = self
            .engine
            .swap_indexes(primary, staging)
            .await
            .map_err(|e| {
                let cause = match e {
                    SearchError::Unavailable { .. } => AppError::from(e),
                    other => AppError::SwapRejected {
                        primary: primary.to_string(),
                        staging: staging.to_string(),
                        reason: other.to_string(),
                    },
                };
                ReindexError::new(ReindexState::Swapping, cause)
            })?;

        // The engine owns the swap from here on; the run has succeeded.
        self.observe_swap(task).await;
        Ok(())
    }

    /// Follows an accepted swap task for the log only
    async fn observe_swap(&self, task: TaskHandle) {
        match self
            .monitor
            .wait_for(self.engine.as_ref(), &[task], &self.cancel)
            .await
        {
            Ok(_) => log::debug!("Swap task {} applied", task),
            Err(AppError::WriteRejected { reason, .. }) => {
                log::error!("Swap task {} accepted but reported failure: {}", task, reason)
            }
            Err(e) => log::warn!("Swap task {} not confirmed yet: {}", task, e),
        }
    }

    fn report(&self, started_at: DateTime<Utc>, staged: &StagingReport, outcome: RunOutcome) -> RunReport {
        RunReport {
            started_at,
            finished_at: Utc::now(),
            outcome,
            identifiers: staged.identifiers,
            documents: staged.documents,
            skipped: staged.skipped,
            batches: staged.batches,
        }
    }

    fn enter(&self, state: ReindexState) {
        log::info!("Reindex state: {}", state);
        let _ = self.with_progress(|p| p.state = state);
    }

    fn set_state(&self, state: ReindexState, running_since: Option<DateTime<Utc>>) {
        let _ = self.with_progress(|p| {
            p.state = state;
            p.running_since = running_since;
        });
    }

    fn record(&self, report: RunReport) {
        let _ = self.with_progress(|p| p.last_run = Some(report));
    }

    fn with_progress<T>(&self, f: impl FnOnce(&mut Progress) -> T) -> Option<T> {
        match self.progress.lock() {
            Ok(mut progress) => Some(f(&mut progress)),
            Err(_) => {
                log::error!("Reindex progress lock poisoned");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookshelf_content_sources::MemorySource;
    use bookshelf_search_engine::MemorySearchEngine;

    fn controller(source: MemorySource) -> (Arc<MemorySearchEngine>, ReindexController) {
        let engine = Arc::new(MemorySearchEngine::new());
        let controller =
            ReindexController::new(Arc::new(source), engine.clone(), ReindexSettings::default());
        (engine, controller)
    }

    #[test]
    fn test_settings_from_config() {
        let settings = ReindexSettings::default();
        assert_eq!(settings.primary_index, "library");
        assert_eq!(settings.staging_index, "library-bak");
        assert_eq!(settings.batch_size, 2000);
        assert_eq!(settings.write_batch_size, 1000);
        assert_eq!(settings.task_deadline, Duration::from_secs(30));
        assert_eq!(settings.poll_interval, Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_successful_run_returns_to_idle() {
        let (engine, controller) = controller(MemorySource::with_sequential(3));

        let report = controller.run().await.unwrap();

        assert!(report.succeeded());
        assert_eq!(report.identifiers, 3);
        assert_eq!(controller.state(), ReindexState::Idle);
        assert!(!controller.is_running());
        assert_eq!(controller.last_run(), Some(report));
        assert_eq!(engine.document_ids("library").await, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_failed_run_is_recorded() {
        let source = MemorySource::with_sequential(3);
        source.fail_listing(true).await;
        let (engine, controller) = controller(source);

        let err = controller.run().await.unwrap_err();

        assert_eq!(err.stage, ReindexState::Staging);
        assert!(matches!(err.cause, AppError::SourceUnavailable { .. }));
        assert_eq!(engine.document_ids("library").await, Some(vec![]));
        match controller.status().last_run.map(|r| r.outcome) {
            Some(RunOutcome::Aborted { stage, kind, .. }) => {
                assert_eq!(stage, ReindexState::Staging);
                assert_eq!(kind, "source_unavailable");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(!controller.is_running());
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = RunOutcome::Aborted {
            stage: ReindexState::Monitoring,
            kind: "indexing_timeout",
            message: "late".to_string(),
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["status"], "aborted");
        assert_eq!(value["stage"], "monitoring");
    }
}
