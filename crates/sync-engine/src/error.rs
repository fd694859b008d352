// crates/sync-engine/src/error.rs
//! Error types for reindex runs

use crate::controller::ReindexState;
use bookshelf_core::AppError;
use thiserror::Error;

/// Result type for reindex operations
pub type ReindexResult<T> = Result<T, ReindexError>;

/// A reindex run that did not reach cutover
///
/// Carries the state the run was in when it failed. The primary index is untouched
/// whenever this is returned.
#[derive(Debug, Error)]
#[error("Reindex aborted during {stage}: {cause}")]
pub struct ReindexError {
    pub stage: ReindexState,
    #[source]
    pub cause: AppError,
}

impl ReindexError {
    pub fn new(stage: ReindexState, cause: AppError) -> Self {
        Self { stage, cause }
    }

    /// Machine-readable failure class of the cause
    pub fn kind(&self) -> &'static str {
        self.cause.kind()
    }
}

impl From<ReindexError> for AppError {
    fn from(err: ReindexError) -> Self {
        err.cause
    }
}
