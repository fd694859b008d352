//! Error types for search engine adapters

use bookshelf_core::AppError;
use bookshelf_network::NetworkError;
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// Result type for search engine operations
pub type SearchResult<T> = Result<T, SearchError>;

/// Search engine operation an error happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    EnsureIndex,
    DeleteAll,
    Write,
    TaskStatus,
    Swap,
    Query,
    GetDocument,
    DeleteDocuments,
    Stats,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::EnsureIndex => "ensure index",
            Operation::DeleteAll => "delete all documents",
            Operation::Write => "write documents",
            Operation::TaskStatus => "task status",
            Operation::Swap => "swap indexes",
            Operation::Query => "query",
            Operation::GetDocument => "get document",
            Operation::DeleteDocuments => "delete documents",
            Operation::Stats => "index stats",
        };
        f.write_str(name)
    }
}

/// Errors from the search engine
#[derive(Debug, Error)]
pub enum SearchError {
    /// The engine could not be reached
    #[error("search engine unreachable during {operation}: {error}")]
    Unavailable {
        operation: Operation,
        #[source]
        error: NetworkError,
    },

    /// The engine answered and refused the request
    #[error("{operation} on '{index}' rejected: {reason}")]
    Rejected {
        operation: Operation,
        index: String,
        reason: String,
    },

    /// The engine refused to exchange two indexes
    #[error("swap of '{first}' and '{second}' rejected: {reason}")]
    SwapRejected {
        first: String,
        second: String,
        reason: String,
    },

    /// The named index does not exist
    #[error("index '{index}' does not exist")]
    IndexNotFound { index: String },

    /// The engine does not know the task
    #[error("unknown task {uid}")]
    UnknownTask { uid: u64 },

    /// The engine answered with an unexpected body
    #[error("invalid response from search engine: {details}")]
    InvalidResponse { details: String },

    /// The query could not be interpreted
    #[error("invalid query: {reason}")]
    InvalidQuery { reason: String },
}

#[derive(Deserialize)]
struct EngineErrorBody {
    message: String,
    #[serde(default)]
    code: String,
}

impl SearchError {
    /// Classifies a failed HTTP exchange with the engine
    pub(crate) fn from_network(operation: Operation, index: &str, error: NetworkError) -> Self {
        match error {
            NetworkError::Status { status, body } if (400..500).contains(&status) => {
                let parsed = serde_json::from_str::<EngineErrorBody>(&body).ok();
                if parsed.as_ref().is_some_and(|b| b.code == "index_not_found") {
                    return SearchError::IndexNotFound {
                        index: index.to_string(),
                    };
                }
                let reason = parsed.map(|b| b.message).unwrap_or(body);
                SearchError::Rejected {
                    operation,
                    index: index.to_string(),
                    reason: format!("HTTP {}: {}", status, reason),
                }
            }
            NetworkError::Decode { url, reason } => SearchError::InvalidResponse {
                details: format!("{}: {}", url, reason),
            },
            error => SearchError::Unavailable { operation, error },
        }
    }
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        let reason = err.to_string();
        match err {
            SearchError::Unavailable {
                operation: Operation::TaskStatus,
                ..
            }
            | SearchError::Rejected {
                operation: Operation::TaskStatus,
                ..
            }
            | SearchError::UnknownTask { .. } => AppError::TaskStatusUnavailable { reason },

            SearchError::Unavailable { .. } | SearchError::InvalidResponse { .. } => {
                AppError::SearchEngineUnavailable { reason }
            }

            SearchError::Rejected {
                operation, index, ..
            } => match operation {
                Operation::EnsureIndex => AppError::ProvisioningFailure { index, reason },
                Operation::Query | Operation::GetDocument | Operation::Stats => {
                    AppError::QueryFailed { index, reason }
                }
                _ => AppError::WriteRejected { index, reason },
            },

            SearchError::SwapRejected { first, second, .. } => AppError::SwapRejected {
                primary: first,
                staging: second,
                reason,
            },

            SearchError::IndexNotFound { index } => AppError::QueryFailed { index, reason },

            SearchError::InvalidQuery { .. } => AppError::InvalidArgument {
                argument: "query".to_string(),
                reason,
            },
        }
    }
}
