// FILE: crates/content-sources/src/lib.rs

//! Metadata sources a reindex run reads from
//!
//! [`ContentServerSource`] talks to a Calibre content server over HTTP,
//! [`LibraryDbSource`] reads `metadata.db` directly and [`MemorySource`] keeps
//! records in memory.

mod content_server;
mod error;
mod library_db;
mod memory;
mod traits;

pub use content_server::ContentServerSource;
pub use error::{SourceError, SourceResult};
pub use library_db::LibraryDbSource;
pub use memory::MemorySource;
pub use traits::{MetadataChanges, MetadataSource};

pub use bookshelf_network::Download;
