//! Error types for metadata sources

use bookshelf_core::AppError;
use bookshelf_network::NetworkError;
use thiserror::Error;

/// Result type for content source operations
pub type SourceResult<T> = Result<T, SourceError>;

/// Errors from metadata sources
#[derive(Debug, Error)]
pub enum SourceError {
    /// Transport or HTTP status failure talking to the source
    #[error("{source_name} request failed: {error}")]
    Network {
        source_name: String,
        #[source]
        error: NetworkError,
    },

    /// The source answered with something other than the expected shape
    #[error("{source_name} returned an invalid response: {details}")]
    InvalidResponse { source_name: String, details: String },

    /// The book does not exist at the source
    #[error("book {id} not found")]
    NotFound { id: i64 },

    /// The source has no way to perform the operation
    #[error("{source_name} does not support {operation}")]
    Unsupported {
        source_name: String,
        operation: &'static str,
    },

    /// Library database failure
    #[error(transparent)]
    Database(#[from] AppError),
}

impl SourceError {
    pub(crate) fn network(source_name: &str, error: NetworkError) -> Self {
        SourceError::Network {
            source_name: source_name.to_string(),
            error,
        }
    }

    pub(crate) fn invalid(source_name: &str, details: impl Into<String>) -> Self {
        SourceError::InvalidResponse {
            source_name: source_name.to_string(),
            details: details.into(),
        }
    }
}

impl From<SourceError> for AppError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Network { source_name, error } => AppError::SourceUnavailable {
                source_name,
                reason: error.to_string(),
            },
            SourceError::InvalidResponse {
                source_name,
                details,
            } => AppError::InvalidSourceResponse {
                source_name,
                details,
            },
            SourceError::NotFound { id } => AppError::BookNotFound { id },
            SourceError::Unsupported {
                source_name,
                operation,
            } => AppError::InvalidArgument {
                argument: operation.to_string(),
                reason: format!("not supported by {}", source_name),
            },
            SourceError::Database(inner) => inner,
        }
    }
}
