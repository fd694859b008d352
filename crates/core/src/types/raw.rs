//! Raw book records as delivered by a metadata source
//!
//! Every field a source may omit or null out is an `Option`. The identifier is kept
//! as the token the source sent so that a malformed one can be reported and skipped
//! by the mapper instead of failing the whole fetch.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A timestamp value in one of the shapes sources emit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    /// Plain string, usually RFC 3339 or `YYYY-MM-DD HH:MM:SS`
    Text(String),
    /// `{"__class__": "datetime.datetime", "__value__": "..."}`
    Tagged {
        #[serde(rename = "__value__")]
        value: String,
    },
    /// `{"v": "..."}` wrapper used by the content server's list command
    Wrapped { v: Option<String> },
}

impl RawTimestamp {
    /// The textual value, if any
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            Self::Tagged { value } => Some(value.as_str()),
            Self::Wrapped { v } => v.as_deref(),
        }
    }
}

impl From<&str> for RawTimestamp {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// One book's metadata before mapping
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawBookRecord {
    pub id: String,
    pub title: Option<String>,
    pub authors: Option<Vec<String>>,
    pub author_sort: Option<String>,
    pub isbn: Option<String>,
    pub identifiers: Option<HashMap<String, String>>,
    pub languages: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub publisher: Option<String>,
    pub pubdate: Option<RawTimestamp>,
    pub last_modified: Option<RawTimestamp>,
    pub series_index: Option<f64>,
    pub rating: Option<f64>,
    pub size: Option<i64>,
    pub comments: Option<String>,
}

impl RawBookRecord {
    /// Creates a record carrying only its identifier token
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Sets the title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the authors
    pub fn with_authors(mut self, authors: Vec<String>) -> Self {
        self.authors = Some(authors);
        self
    }
}
