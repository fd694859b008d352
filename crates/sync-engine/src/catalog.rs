// crates/sync-engine/src/catalog.rs
//! Reads and single-book edits against the primary index

use crate::mapper::map_record;
use bookshelf_content_sources::{Download, MetadataChanges, MetadataSource};
use bookshelf_core::{AppError, BookDocument, BookId};
use bookshelf_search_engine::{SearchEngine, SearchError, SearchQuery, SearchResponse};
use std::sync::Arc;

/// Sort applied when a search names none
pub const DEFAULT_SORT: &str = "id:desc";

/// Page size of the recently-added listing
pub const DEFAULT_RECENT_LIMIT: usize = 10;

/// The catalog as readers see it
///
/// Every call resolves the primary index by name, so a swap is visible to the very
/// next call. Edits go straight to the primary index and to the source.
#[derive(Clone)]
pub struct Catalog {
    source: Arc<dyn MetadataSource>,
    engine: Arc<dyn SearchEngine>,
    primary: String,
}

impl Catalog {
    pub fn new(
        source: Arc<dyn MetadataSource>,
        engine: Arc<dyn SearchEngine>,
        primary: impl Into<String>,
    ) -> Self {
        Self {
            source,
            engine,
            primary: primary.into(),
        }
    }

    pub fn primary_index(&self) -> &str {
        &self.primary
    }

    fn query_failed(&self, err: SearchError) -> AppError {
        match err {
            SearchError::Unavailable { .. } | SearchError::InvalidQuery { .. } => AppError::from(err),
            other => AppError::QueryFailed {
                index: self.primary.clone(),
                reason: other.to_string(),
            },
        }
    }

    /// Searches the primary index, newest first unless a sort is given
    pub async fn search(&self, query: SearchQuery) -> Result<SearchResponse, AppError> {
        let mut query = query;
        if query.sort.is_empty() {
            query.sort.push(DEFAULT_SORT.to_string());
        }

        let mut response = self
            .engine
            .query(&self.primary, &query)
            .await
            .map_err(|e| self.query_failed(e))?;
        for hit in &mut response.hits {
            hit.refresh_links();
        }
        Ok(response)
    }

    /// The most recently added books
    pub async fn recent(&self, limit: usize, offset: usize) -> Result<SearchResponse, AppError> {
        self.search(SearchQuery::new("").with_limit(limit).with_offset(offset))
            .await
    }

    /// One book from the primary index
    pub async fn get_book(&self, id: BookId) -> Result<BookDocument, AppError> {
        let mut document = self
            .engine
            .get_document(&self.primary, id)
            .await
            .map_err(|e| self.query_failed(e))?
            .ok_or(AppError::BookNotFound { id: id.get() })?;
        document.refresh_links();
        Ok(document)
    }

    /// Pushes `changes` to the source and stores the resulting record in the primary
    /// index
    pub async fn update_book(
        &self,
        id: BookId,
        changes: &MetadataChanges,
    ) -> Result<BookDocument, AppError> {
        if changes.is_empty() {
            return Err(AppError::InvalidArgument {
                argument: "changes".to_string(),
                reason: "no field to update".to_string(),
            });
        }

        let record = self.source.update_metadata(id, changes).await?;
        let document = map_record(&record)?;
        if document.id != id.get() {
            return Err(AppError::InvalidSourceResponse {
                source_name: self.source.name().to_string(),
                details: format!("update of book {} returned book {}", id, document.id),
            });
        }

        self.engine
            .upsert_documents(&self.primary, std::slice::from_ref(&document))
            .await
            .map_err(|e| write_rejected(&self.primary, e))?;
        log::info!("Updated book {} in '{}'", id, self.primary);
        Ok(document)
    }

    /// Deletes a book at the source, then from the primary index
    pub async fn delete_book(&self, id: BookId) -> Result<(), AppError> {
        self.source.delete_books(&[id]).await?;
        self.engine
            .delete_documents(&self.primary, &[id])
            .await
            .map_err(|e| write_rejected(&self.primary, e))?;
        log::info!("Deleted book {} from '{}'", id, self.primary);
        Ok(())
    }

    /// Cover image of a book, fetched from the source
    pub async fn cover(&self, id: BookId) -> Result<Download, AppError> {
        Ok(self.source.fetch_cover(id).await?)
    }

    /// Book file, fetched from the source
    pub async fn book_file(&self, id: BookId) -> Result<Download, AppError> {
        Ok(self.source.fetch_book_file(id).await?)
    }
}

fn write_rejected(index: &str, err: SearchError) -> AppError {
    match err {
        SearchError::Unavailable { .. } => AppError::from(err),
        other => AppError::WriteRejected {
            index: index.to_string(),
            reason: other.to_string(),
        },
    }
}
