// crates/sync-engine/src/writer.rs
//! Populating the staging index from the metadata source

use crate::mapper::map_batch;
use bookshelf_content_sources::MetadataSource;
use bookshelf_core::AppError;
use bookshelf_resilience::{with_cancellation, CancellationToken};
use bookshelf_search_engine::{SearchEngine, SearchError, TaskHandle};
use std::sync::Arc;

/// Splits ascending ids into inclusive ranges covering `size` ids each
pub fn partition(ids: &[i64], size: usize) -> Vec<(i64, i64)> {
    ids.chunks(size.max(1))
        .filter_map(|chunk| Some((*chunk.first()?, *chunk.last()?)))
        .collect()
}

/// What one staging pass wrote
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StagingReport {
    /// Ids listed by the source
    pub identifiers: usize,
    /// Chunks fetched from the source
    pub batches: usize,
    /// Documents submitted to the staging index
    pub documents: usize,
    /// Records skipped by the mapper
    pub skipped: usize,
    /// Every task enqueued, the clearing task first
    pub tasks: Vec<TaskHandle>,
}

/// Clears the staging index and fills it chunk by chunk
///
/// Tasks are collected, not awaited. Any fetch or write failure stops the pass.
pub struct StagingWriter {
    source: Arc<dyn MetadataSource>,
    engine: Arc<dyn SearchEngine>,
    batch_size: usize,
    write_batch_size: usize,
}

fn cancelled() -> AppError {
    AppError::Cancelled {
        operation: "staging".to_string(),
    }
}

fn rejected(index: &str, err: SearchError) -> AppError {
    match err {
        SearchError::Unavailable { .. } => AppError::from(err),
        other => AppError::WriteRejected {
            index: index.to_string(),
            reason: other.to_string(),
        },
    }
}

impl StagingWriter {
    pub fn new(
        source: Arc<dyn MetadataSource>,
        engine: Arc<dyn SearchEngine>,
        batch_size: usize,
        write_batch_size: usize,
    ) -> Self {
        Self {
            source,
            engine,
            batch_size,
            write_batch_size,
        }
    }

    pub async fn populate(
        &self,
        staging: &str,
        cancel: &CancellationToken,
    ) -> Result<StagingReport, AppError> {
        let mut report = StagingReport::default();

        let cleared = self
            .engine
            .delete_all_documents(staging)
            .await
            .map_err(|e| rejected(staging, e))?;
        report.tasks.push(cleared);

        let ids = self.source.list_all_identifiers().await?;
        report.identifiers = ids.len();
        let ranges = partition(&ids, self.batch_size);
        log::info!(
            "Staging {} book(s) from {} into '{}' in {} batch(es)",
            ids.len(),
            self.source.name(),
            staging,
            ranges.len()
        );

        for (min, max) in ranges {
            if cancel.is_cancelled() {
                return Err(cancelled());
            }

            let records = with_cancellation(cancel, self.source.fetch_metadata(min, max))
                .await
                .map_err(|_| cancelled())??;
            let mapped = map_batch(&records);
            report.batches += 1;
            report.skipped += mapped.skipped.len();

            if mapped.documents.is_empty() {
                log::debug!("Batch {}..={} produced no documents", min, max);
                continue;
            }

            let tasks = self
                .engine
                .write_documents_batch(staging, &mapped.documents, self.write_batch_size)
                .await
                .map_err(|e| rejected(staging, e))?;
            log::debug!(
                "Batch {}..={}: {} document(s), {} task(s)",
                min,
                max,
                mapped.documents.len(),
                tasks.len()
            );
            report.documents += mapped.documents.len();
            report.tasks.extend(tasks);
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookshelf_content_sources::MemorySource;
    use bookshelf_core::RawBookRecord;
    use bookshelf_search_engine::{IndexSchema, MemorySearchEngine, Operation};

    #[test]
    fn test_partition_covers_every_id_once() {
        let ids: Vec<i64> = (1..=4500).collect();
        let ranges = partition(&ids, 2000);
        assert_eq!(ranges, vec![(1, 2000), (2001, 4000), (4001, 4500)]);
    }

    #[test]
    fn test_partition_sparse_and_edge_cases() {
        assert_eq!(partition(&[3, 9, 27, 81], 3), vec![(3, 27), (81, 81)]);
        assert!(partition(&[], 2000).is_empty());
        assert_eq!(partition(&[5, 6], 0), vec![(5, 5), (6, 6)]);
    }

    async fn setup(source: MemorySource) -> (Arc<MemorySource>, Arc<MemorySearchEngine>, StagingWriter) {
        let source = Arc::new(source);
        let engine = Arc::new(MemorySearchEngine::new());
        engine.ensure_index("staging", &IndexSchema::library()).await.unwrap();
        let writer = StagingWriter::new(source.clone(), engine.clone(), 2, 1000);
        (source, engine, writer)
    }

    #[tokio::test]
    async fn test_populate_replaces_staging_contents() {
        let (_, engine, writer) = setup(MemorySource::with_sequential(5)).await;
        engine
            .write_documents_batch(
                "staging",
                &[bookshelf_core::BookDocument::new(bookshelf_core::BookId::new(99).unwrap())],
                0,
            )
            .await
            .unwrap();

        let report = writer.populate("staging", &CancellationToken::new()).await.unwrap();

        assert_eq!(report.identifiers, 5);
        assert_eq!(report.batches, 3);
        assert_eq!(report.documents, 5);
        assert_eq!(report.tasks.len(), 4);
        assert_eq!(engine.document_ids("staging").await, Some(vec![1, 2, 3, 4, 5]));
    }

    #[tokio::test]
    async fn test_fetch_failure_stops_later_batches() {
        let (source, engine, writer) = setup(MemorySource::with_sequential(6)).await;
        source.fail_fetch_on_call(2).await;

        let err = writer.populate("staging", &CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, AppError::SourceUnavailable { .. }));
        assert_eq!(source.fetch_calls().await, vec![(1, 2), (3, 4)]);
        assert_eq!(engine.write_calls().await.len(), 1);
    }

    #[tokio::test]
    async fn test_write_failure_is_write_rejected() {
        let (_, engine, writer) = setup(MemorySource::with_sequential(2)).await;
        engine.fail_operation(Operation::Write).await;

        let err = writer.populate("staging", &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, AppError::WriteRejected { ref index, .. } if index == "staging"));
    }

    #[tokio::test]
    async fn test_all_malformed_batch_is_not_written() {
        let source = MemorySource::new();
        source.insert_at(1, RawBookRecord::new("one")).await;
        source.insert_at(2, RawBookRecord::new("two")).await;
        let (_, engine, writer) = setup(source).await;

        let report = writer.populate("staging", &CancellationToken::new()).await.unwrap();
        assert_eq!(report.skipped, 2);
        assert_eq!(report.documents, 0);
        assert!(engine.write_calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_first_batch() {
        let (source, _, writer) = setup(MemorySource::with_sequential(2)).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = writer.populate("staging", &cancel).await.unwrap_err();
        assert!(matches!(err, AppError::Cancelled { .. }));
        assert!(source.fetch_calls().await.is_empty());
    }
}
