//! Search engine adapters for Bookshelf
//!
//! [`SearchEngine`] is what the reindex engine and the read surface talk to.
//! [`MeilisearchEngine`] speaks to a Meilisearch instance over HTTP;
//! [`MemorySearchEngine`] keeps everything in process for tests and local runs.

mod engine;
mod error;
mod meilisearch;
mod memory;
mod types;

pub use engine::SearchEngine;
pub use error::{Operation, SearchError, SearchResult};
pub use meilisearch::MeilisearchEngine;
pub use memory::{MemorySearchEngine, WriteCall};
pub use types::{
    IndexSchema, IndexStats, SearchQuery, SearchResponse, TaskHandle, TaskState, TaskStatus,
};
