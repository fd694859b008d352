//! Core domain types and errors for Bookshelf
//!
//! Shared by the metadata sources, the search engine adapters, the reindex engine
//! and the HTTP surface.

pub mod error;
pub mod types;

pub use error::{AppError, ErrorSeverity, RecoveryAction, Result};
pub use types::links;
pub use types::{BookDocument, BookId, RawBookRecord, RawTimestamp, Validator};
