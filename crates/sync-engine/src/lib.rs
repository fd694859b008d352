// crates/sync-engine/src/lib.rs
//! Reindexing the catalog into the search engine
//!
//! A run provisions the primary and staging indexes, fills staging from the
//! metadata source, waits for the engine to apply every write and then swaps the two
//! indexes. Readers keep seeing the previous primary until the swap lands.
//!
//! # Example
//!
//! ```rust,no_run
//! use bookshelf_content_sources::MemorySource;
//! use bookshelf_search_engine::MemorySearchEngine;
//! use bookshelf_sync_engine::{ReindexController, ReindexSettings};
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), bookshelf_sync_engine::ReindexError> {
//! let controller = ReindexController::new(
//!     Arc::new(MemorySource::with_sequential(10)),
//!     Arc::new(MemorySearchEngine::new()),
//!     ReindexSettings::default(),
//! );
//! let report = controller.run().await?;
//! assert_eq!(report.documents, 10);
//! # Ok(())
//! # }
//! ```

mod catalog;
mod controller;
mod error;
mod mapper;
mod monitor;
mod provisioner;
mod writer;

pub use catalog::{Catalog, DEFAULT_RECENT_LIMIT, DEFAULT_SORT};
pub use controller::{
    ControllerStatus, ReindexController, ReindexSettings, ReindexState, RunOutcome, RunReport,
};
pub use error::{ReindexError, ReindexResult};
pub use mapper::{map_batch, map_record, parse_timestamp, MappedBatch};
pub use monitor::{MonitorReport, TaskMonitor};
pub use provisioner::IndexProvisioner;
pub use writer::{partition, StagingReport, StagingWriter};

#[cfg(test)]
mod tests {
    use super::*;
    use bookshelf_content_sources::MemorySource;
    use bookshelf_search_engine::MemorySearchEngine;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_all_exports_accessible() {
        let source = Arc::new(MemorySource::new());
        let engine = Arc::new(MemorySearchEngine::new());

        let _ = TaskMonitor::new(Duration::from_secs(30), Duration::from_secs(3));
        let _ = IndexProvisioner::new(engine.clone());
        let _ = StagingWriter::new(source.clone(), engine.clone(), 2000, 1000);
        let _ = Catalog::new(source.clone(), engine.clone(), "library");
        let controller = ReindexController::new(source, engine, ReindexSettings::default());
        assert_eq!(controller.state(), ReindexState::Idle);
        assert!(controller.last_run().is_none());
    }
}
