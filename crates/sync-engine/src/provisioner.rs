// crates/sync-engine/src/provisioner.rs
//! Index creation and configuration

use crate::monitor::TaskMonitor;
use bookshelf_core::AppError;
use bookshelf_resilience::CancellationToken;
use bookshelf_search_engine::{IndexSchema, SearchEngine};
use std::sync::Arc;

/// Makes sure indexes exist with the catalog schema
pub struct IndexProvisioner {
    engine: Arc<dyn SearchEngine>,
    schema: IndexSchema,
}

impl IndexProvisioner {
    pub fn new(engine: Arc<dyn SearchEngine>) -> Self {
        Self::with_schema(engine, IndexSchema::library())
    }

    pub fn with_schema(engine: Arc<dyn SearchEngine>, schema: IndexSchema) -> Self {
        Self { engine, schema }
    }

    pub fn schema(&self) -> &IndexSchema {
        &self.schema
    }

    /// Ensures `index` and waits until the engine has applied the change
    ///
    /// Returns the number of tasks that were needed; zero when the index already
    /// matched.
    pub async fn ensure(
        &self,
        index: &str,
        monitor: &TaskMonitor,
        cancel: &CancellationToken,
    ) -> Result<usize, AppError> {
        let failure = |reason: String| AppError::ProvisioningFailure {
            index: index.to_string(),
            reason,
        };

        let tasks = self
            .engine
            .ensure_index(index, &self.schema)
            .await
            .map_err(|e| failure(e.to_string()))?;

        match monitor.wait_for(self.engine.as_ref(), &tasks, cancel).await {
            Ok(_) => {}
            Err(AppError::Cancelled { operation }) => return Err(AppError::Cancelled { operation }),
            Err(e) => return Err(failure(e.to_string())),
        }

        if tasks.is_empty() {
            log::debug!("Index '{}' already provisioned", index);
        } else {
            log::info!("Provisioned index '{}' ({} task(s))", index, tasks.len());
        }
        Ok(tasks.len())
    }

    /// Ensures every index in turn, stopping at the first failure
    pub async fn ensure_all(
        &self,
        indexes: &[&str],
        monitor: &TaskMonitor,
        cancel: &CancellationToken,
    ) -> Result<(), AppError> {
        for index in indexes {
            self.ensure(index, monitor, cancel).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookshelf_search_engine::{MemorySearchEngine, Operation};
    use std::time::Duration;

    fn monitor() -> TaskMonitor {
        TaskMonitor::new(Duration::from_secs(30), Duration::from_secs(3))
    }

    #[tokio::test]
    async fn test_provisioning_is_idempotent() {
        let engine = Arc::new(MemorySearchEngine::new());
        let provisioner = IndexProvisioner::new(engine.clone());
        let cancel = CancellationToken::new();

        assert_eq!(provisioner.ensure("library", &monitor(), &cancel).await.unwrap(), 1);
        assert_eq!(provisioner.ensure("library", &monitor(), &cancel).await.unwrap(), 0);
        assert_eq!(engine.document_ids("library").await, Some(vec![]));
    }

    #[tokio::test]
    async fn test_ensure_all_creates_both() {
        let engine = Arc::new(MemorySearchEngine::new());
        let provisioner = IndexProvisioner::new(engine.clone());

        provisioner
            .ensure_all(&["library", "library-bak"], &monitor(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(engine.generation_of("library").await.is_some());
        assert!(engine.generation_of("library-bak").await.is_some());
    }

    #[tokio::test]
    async fn test_engine_refusal_is_provisioning_failure() {
        let engine = Arc::new(MemorySearchEngine::new());
        engine.fail_operation(Operation::EnsureIndex).await;
        let provisioner = IndexProvisioner::new(engine);

        let err = provisioner
            .ensure("library", &monitor(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ProvisioningFailure { ref index, .. } if index == "library"));
    }
}
