//! Values exchanged with a search engine

use bookshelf_core::BookDocument;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to an asynchronous engine task
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskHandle(u64);

impl TaskHandle {
    pub fn new(uid: u64) -> Self {
        Self(uid)
    }

    pub fn uid(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task #{}", self.0)
    }
}

/// Lifecycle state of an engine task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Enqueued,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

impl TaskState {
    /// The task will not change state any more
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskState::Enqueued | TaskState::Processing)
    }

    pub fn is_success(&self) -> bool {
        *self == TaskState::Succeeded
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskState::Enqueued => "enqueued",
            TaskState::Processing => "processing",
            TaskState::Succeeded => "succeeded",
            TaskState::Failed => "failed",
            TaskState::Canceled => "canceled",
        };
        f.write_str(name)
    }
}

/// Current state of one task
#[derive(Debug, Clone, PartialEq)]
pub struct TaskStatus {
    pub handle: TaskHandle,
    pub index: Option<String>,
    pub state: TaskState,
    /// Engine-provided reason for a failed task
    pub error: Option<String>,
}

/// Settings an index must carry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSchema {
    pub primary_key: String,
    pub searchable: Vec<String>,
    pub filterable: Vec<String>,
    pub sortable: Vec<String>,
    pub displayed: Vec<String>,
}

impl IndexSchema {
    /// Schema of the book catalog indexes
    pub fn library() -> Self {
        fn names(list: &[&str]) -> Vec<String> {
            list.iter().map(|s| s.to_string()).collect()
        }

        Self {
            primary_key: "id".to_string(),
            searchable: names(&["title", "authors", "isbn"]),
            filterable: names(&[
                "authors",
                "file_url",
                "id",
                "last_modified",
                "pubdate",
                "publisher",
                "isbn",
                "tags",
                "languages",
            ]),
            sortable: names(&["author_sort", "id", "last_modified", "pubdate", "publisher"]),
            displayed: names(&["*"]),
        }
    }

    pub fn is_filterable(&self, attribute: &str) -> bool {
        self.filterable.iter().any(|a| a == attribute)
    }

    pub fn is_sortable(&self, attribute: &str) -> bool {
        self.sortable.iter().any(|a| a == attribute)
    }
}

/// A search request against one index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchQuery {
    pub q: String,
    pub offset: usize,
    pub limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<String>,
}

impl SearchQuery {
    pub const DEFAULT_LIMIT: usize = 20;

    pub fn new(q: impl Into<String>) -> Self {
        Self {
            q: q.into(),
            offset: 0,
            limit: Self::DEFAULT_LIMIT,
            filter: None,
            sort: Vec::new(),
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Sets a filter expression; blank expressions clear it
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        let filter = filter.into();
        self.filter = (!filter.trim().is_empty()).then_some(filter);
        self
    }

    /// Appends a sort rule such as `id:desc`
    pub fn with_sort(mut self, rule: impl Into<String>) -> Self {
        self.sort.push(rule.into());
        self
    }
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self::new("")
    }
}

/// One page of search hits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    #[serde(default)]
    pub hits: Vec<BookDocument>,
    #[serde(default)]
    pub estimated_total_hits: u64,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub limit: usize,
    #[serde(default)]
    pub processing_time_ms: u64,
    #[serde(default)]
    pub query: String,
}

/// Document count of an index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub number_of_documents: u64,
    #[serde(default)]
    pub is_indexing: bool,
}

/// Size of each sub-batch when `requested` documents per write are asked for
pub(crate) fn effective_batch_size(requested: usize, total: usize) -> usize {
    if requested == 0 {
        total.max(1)
    } else {
        requested
    }
}
