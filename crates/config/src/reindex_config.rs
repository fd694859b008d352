//! Reindex run configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning for reindex runs
///
/// These only trade latency against throughput. Any valid combination produces the
/// same catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReindexConfig {
    /// Identifiers fetched from the source per chunk
    pub batch_size: usize,

    /// Documents per engine write task within one chunk
    pub write_batch_size: usize,

    /// How long to wait for indexing tasks before aborting
    pub task_deadline_secs: u64,

    /// Pause between task status polls
    pub poll_interval_secs: u64,
}

impl Default for ReindexConfig {
    fn default() -> Self {
        Self {
            batch_size: 2000,
            write_batch_size: 1000,
            task_deadline_secs: 30,
            poll_interval_secs: 3,
        }
    }
}

impl ReindexConfig {
    /// Task deadline as a duration
    pub fn task_deadline(&self) -> Duration {
        Duration::from_secs(self.task_deadline_secs)
    }

    /// Poll interval as a duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl ConfigSection for ReindexConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut results = vec![
            Validator::in_range(self.batch_size, 1, 100_000, "reindex.batch_size"),
            Validator::in_range(self.write_batch_size, 1, 100_000, "reindex.write_batch_size"),
            Validator::in_range(self.task_deadline_secs, 1, 3600, "reindex.task_deadline_secs"),
            Validator::in_range(self.poll_interval_secs, 1, 600, "reindex.poll_interval_secs"),
        ];
        if self.poll_interval_secs > self.task_deadline_secs {
            results.push(Err(ValidationError::with_value(
                "reindex.poll_interval_secs",
                "must not exceed reindex.task_deadline_secs",
                self.poll_interval_secs,
            )));
        }
        Validator::collect_errors(results)
    }

    fn merge(&mut self, other: Self) {
        self.batch_size = other.batch_size;
        self.write_batch_size = other.write_batch_size;
        self.task_deadline_secs = other.task_deadline_secs;
        self.poll_interval_secs = other.poll_interval_secs;
    }

    fn section_name(&self) -> &'static str {
        "reindex"
    }
}
