// crates/content-sources/src/library_db.rs

use crate::{MetadataSource, SourceResult};
use async_trait::async_trait;
use bookshelf_core::RawBookRecord;
use bookshelf_database::{self as database, DatabaseConfig, DbPool};
use std::path::Path;

const SOURCE_NAME: &str = "library_db";

/// A Calibre `metadata.db` read directly
///
/// Read-only: covers, files and edits need the content server.
pub struct LibraryDbSource {
    pool: DbPool,
}

impl LibraryDbSource {
    /// Opens the library database at `path` read-only and checks that it is one
    pub async fn open(path: impl AsRef<Path>) -> SourceResult<Self> {
        let pool = database::connect(DatabaseConfig::new(path.as_ref())).await?;
        database::verify_library(&pool).await?;
        log::info!("Using library database {}", path.as_ref().display());
        Ok(Self { pool })
    }

    /// Wraps an already open pool
    pub fn from_pool(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Number of books in the library
    pub async fn book_count(&self) -> SourceResult<i64> {
        Ok(database::count_books(&self.pool).await?)
    }
}

#[async_trait]
impl MetadataSource for LibraryDbSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn list_all_identifiers(&self) -> SourceResult<Vec<i64>> {
        Ok(database::list_book_ids(&self.pool).await?)
    }

    async fn fetch_metadata(&self, min: i64, max: i64) -> SourceResult<Vec<RawBookRecord>> {
        Ok(database::fetch_books_in_range(&self.pool, min, max).await?)
    }
}
