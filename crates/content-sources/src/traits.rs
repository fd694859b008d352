// crates/content-sources/src/traits.rs

use crate::{SourceError, SourceResult};
use async_trait::async_trait;
use bookshelf_core::{BookId, RawBookRecord};
use bookshelf_network::Download;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// The authoritative store of book metadata
///
/// Reads are what a reindex run needs. Writes and asset downloads are optional and
/// default to [`SourceError::Unsupported`].
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Short name used in logs and errors
    fn name(&self) -> &str;

    /// Every book id, ascending and without duplicates
    async fn list_all_identifiers(&self) -> SourceResult<Vec<i64>>;

    /// Metadata for every book whose id lies in `min..=max`
    async fn fetch_metadata(&self, min: i64, max: i64) -> SourceResult<Vec<RawBookRecord>>;

    /// Applies `changes` to one book and returns the record as stored afterwards
    async fn update_metadata(
        &self,
        _id: BookId,
        _changes: &MetadataChanges,
    ) -> SourceResult<RawBookRecord> {
        Err(self.unsupported("metadata updates"))
    }

    /// Deletes books at the source
    async fn delete_books(&self, _ids: &[BookId]) -> SourceResult<()> {
        Err(self.unsupported("deleting books"))
    }

    /// The cover image of a book
    async fn fetch_cover(&self, _id: BookId) -> SourceResult<Download> {
        Err(self.unsupported("cover downloads"))
    }

    /// The EPUB file of a book
    async fn fetch_book_file(&self, _id: BookId) -> SourceResult<Download> {
        Err(self.unsupported("book downloads"))
    }

    #[doc(hidden)]
    fn unsupported(&self, operation: &'static str) -> SourceError {
        SourceError::Unsupported {
            source_name: self.name().to_string(),
            operation,
        }
    }
}

/// Metadata edits accepted from a reader
///
/// Blank strings and absent fields leave the stored value alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataChanges {
    pub title: Option<String>,
    pub authors: Option<Vec<String>>,
    pub publisher: Option<String>,
    pub pubdate: Option<DateTime<Utc>>,
    pub comments: Option<String>,
    pub isbn: Option<String>,
}

impl MetadataChanges {
    /// Format the content server expects for `pubdate`
    pub const PUBDATE_FORMAT: &'static str = "%Y-%m-%dT%H:%M:%S+00:00";

    /// True when applying these changes would not modify anything
    pub fn is_empty(&self) -> bool {
        self.to_fields().is_empty()
    }

    /// The changed fields keyed by their source field name
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        let text = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        if let Some(title) = text(&self.title) {
            fields.insert("title".to_string(), json!(title));
        }
        if let Some(authors) = &self.authors {
            let authors: Vec<&str> = authors
                .iter()
                .map(|a| a.trim())
                .filter(|a| !a.is_empty())
                .collect();
            if !authors.is_empty() {
                fields.insert("authors".to_string(), json!(authors));
            }
        }
        if let Some(publisher) = text(&self.publisher) {
            fields.insert("publisher".to_string(), json!(publisher));
        }
        if let Some(pubdate) = self.pubdate {
            fields.insert(
                "pubdate".to_string(),
                json!(pubdate.format(Self::PUBDATE_FORMAT).to_string()),
            );
        }
        if let Some(comments) = text(&self.comments) {
            fields.insert("comments".to_string(), json!(comments));
        }
        if let Some(isbn) = text(&self.isbn) {
            fields.insert("identifiers".to_string(), json!({ "isbn": isbn }));
        }
        fields
    }
}
