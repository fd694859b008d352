//! Book identifiers and the searchable book document

use crate::error::AppError;
use crate::types::links;
use crate::types::Validator;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Identifier assigned to a book by the metadata source
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookId(i64);

impl BookId {
    /// Wraps a raw identifier, rejecting zero and negative values
    pub fn new(id: i64) -> Result<Self, AppError> {
        if id <= 0 {
            return Err(AppError::MalformedRecord {
                raw_id: id.to_string(),
                reason: "identifier must be a positive integer".to_string(),
            });
        }
        Ok(Self(id))
    }

    /// Parses an identifier token as received from a source or a URL
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let trimmed = raw.trim();
        let value = trimmed
            .parse::<i64>()
            .map_err(|e| AppError::MalformedRecord {
                raw_id: raw.to_string(),
                reason: e.to_string(),
            })?;
        Self::new(value)
    }

    /// Returns the raw integer value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl FromStr for BookId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for BookId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The searchable unit stored in every index generation
///
/// `cover_url` and `file_url` are derived from `id` when the document is built and
/// are never set independently. Use [`BookDocument::refresh_links`] after changing
/// the identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookDocument {
    pub id: i64,
    pub title: String,
    pub authors: Vec<String>,
    pub author_sort: String,
    pub isbn: String,
    pub identifiers: HashMap<String, String>,
    pub languages: Vec<String>,
    pub tags: Vec<String>,
    pub publisher: String,
    pub pubdate: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub series_index: f64,
    pub rating: f64,
    pub size: i64,
    pub comments: String,
    pub cover_url: String,
    pub file_url: String,
}

impl BookDocument {
    /// Creates an otherwise empty document for the given book
    pub fn new(id: BookId) -> Self {
        Self {
            id: id.get(),
            cover_url: links::cover_url(id),
            file_url: links::file_url(id),
            ..Self::default()
        }
    }

    /// Typed view of the identifier
    pub fn book_id(&self) -> Result<BookId, AppError> {
        BookId::new(self.id)
    }

    /// Recomputes the derived links from `id`
    pub fn refresh_links(&mut self) {
        if let Ok(id) = self.book_id() {
            self.cover_url = links::cover_url(id);
            self.file_url = links::file_url(id);
        }
    }
}

impl Default for BookDocument {
    fn default() -> Self {
        Self {
            id: 0,
            title: String::new(),
            authors: Vec::new(),
            author_sort: String::new(),
            isbn: String::new(),
            identifiers: HashMap::new(),
            languages: Vec::new(),
            tags: Vec::new(),
            publisher: String::new(),
            pubdate: DateTime::<Utc>::UNIX_EPOCH,
            last_modified: DateTime::<Utc>::UNIX_EPOCH,
            series_index: 0.0,
            rating: 0.0,
            size: 0,
            comments: String::new(),
            cover_url: String::new(),
            file_url: String::new(),
        }
    }
}

impl Validator for BookDocument {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.id <= 0 {
            errors.push("Identifier must be a positive integer".to_string());
        }

        if !self.series_index.is_finite() {
            errors.push("Series index must be a finite number".to_string());
        }

        if !self.rating.is_finite() || !(0.0..=10.0).contains(&self.rating) {
            errors.push("Rating must be between 0 and 10".to_string());
        }

        if self.size < 0 {
            errors.push("Size cannot be negative".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_book_id_parse() {
        assert_eq!(BookId::parse("42").map(|id| id.get()).ok(), Some(42));
        assert_eq!(BookId::parse(" 7 ").map(|id| id.get()).ok(), Some(7));
    }

    #[test]
    fn test_book_id_rejects_garbage() {
        assert!(matches!(
            BookId::parse("forty-two"),
            Err(AppError::MalformedRecord { .. })
        ));
        assert!(BookId::parse("").is_err());
        assert!(BookId::parse("0").is_err());
        assert!(BookId::parse("-3").is_err());
    }

    #[test]
    fn test_new_document_derives_links() {
        let id = BookId::new(42).unwrap();
        let doc = BookDocument::new(id);
        assert_eq!(doc.id, 42);
        assert_eq!(doc.cover_url, "/api/get/cover/42.jpg");
        assert_eq!(doc.file_url, "/api/get/book/42.epub");
    }

    #[test]
    fn test_default_timestamps_are_epoch() {
        let doc = BookDocument::default();
        assert_eq!(doc.pubdate.timestamp(), 0);
        assert_eq!(doc.last_modified.timestamp(), 0);
    }

    #[test]
    fn test_refresh_links_follows_id() {
        let mut doc = BookDocument::new(BookId::new(1).unwrap());
        doc.id = 9;
        doc.refresh_links();
        assert_eq!(doc.cover_url, "/api/get/cover/9.jpg");
    }

    #[test]
    fn test_validation() {
        let mut doc = BookDocument::new(BookId::new(3).unwrap());
        assert!(doc.is_valid());

        doc.rating = 11.0;
        doc.size = -1;
        let errors = doc.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_deserialize_partial_hit() {
        let json = r#"{"id": 5, "title": "Dune", "_rankingScore": 0.9}"#;
        let doc: BookDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.id, 5);
        assert_eq!(doc.title, "Dune");
        assert!(doc.authors.is_empty());
    }
}
