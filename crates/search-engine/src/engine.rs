//! The search engine seam

use crate::{IndexSchema, IndexStats, SearchQuery, SearchResponse, SearchResult, TaskHandle, TaskStatus};
use async_trait::async_trait;
use bookshelf_core::{BookDocument, BookId};

/// A document store with named indexes, asynchronous writes and atomic index swaps
///
/// Writes return task handles and complete in the background; callers poll
/// [`SearchEngine::get_task_statuses`] until every handle is terminal. Reads always
/// resolve the index by name, so a swap is visible to the next query.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Creates or reconfigures `index` so that it carries `schema`
    ///
    /// Returns the tasks that were enqueued, none when the index already matched.
    async fn ensure_index(&self, index: &str, schema: &IndexSchema) -> SearchResult<Vec<TaskHandle>>;

    /// Removes every document from `index`
    async fn delete_all_documents(&self, index: &str) -> SearchResult<TaskHandle>;

    /// Adds or replaces `documents`, split into writes of at most `batch_size`
    ///
    /// A `batch_size` of zero sends everything in one write.
    async fn write_documents_batch(
        &self,
        index: &str,
        documents: &[BookDocument],
        batch_size: usize,
    ) -> SearchResult<Vec<TaskHandle>>;

    /// Current state of each task, in the order of `handles`
    async fn get_task_statuses(&self, handles: &[TaskHandle]) -> SearchResult<Vec<TaskStatus>>;

    /// Exchanges the contents of two indexes in one step
    async fn swap_indexes(&self, first: &str, second: &str) -> SearchResult<TaskHandle>;

    /// Runs a search against `index`
    async fn query(&self, index: &str, query: &SearchQuery) -> SearchResult<SearchResponse>;

    /// One document by id, `None` when the index has no such document
    async fn get_document(&self, index: &str, id: BookId) -> SearchResult<Option<BookDocument>>;

    /// Adds or replaces a handful of documents outside a reindex run
    async fn upsert_documents(&self, index: &str, documents: &[BookDocument]) -> SearchResult<TaskHandle>;

    /// Removes documents by id
    async fn delete_documents(&self, index: &str, ids: &[BookId]) -> SearchResult<TaskHandle>;

    /// Document count of `index`
    async fn index_stats(&self, index: &str) -> SearchResult<IndexStats>;
}
