//! Error types and recovery strategies for Bookshelf
//!
//! Every failure a reindex run or a catalog read can hit is classified into one of
//! three severity tiers:
//! - **Recoverable**: a later attempt may succeed (source briefly down, engine slow)
//! - **Degraded**: one record or one request is lost, the service keeps running
//! - **Fatal**: the process cannot safely serve (indexes could not be provisioned)
//!
//! None of the recovery actions are performed automatically. A failed reindex run
//! is reported to whoever triggered it and waits for an explicit re-trigger.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// What an operator (or caller) should do about an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Trigger the operation again, nothing needs fixing first
    Retrigger,
    /// Wait for the other run to finish
    WaitForCompletion,
    /// Skip the offending item and carry on
    SkipItem,
    /// Check that the metadata source or search engine is reachable
    CheckConnectivity,
    /// Fix the configuration and restart
    FixConfiguration,
    /// Stop the process
    SafeShutdown,
    /// No automatic recovery - user intervention required
    UserIntervention,
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retrigger => write!(f, "Trigger again"),
            Self::WaitForCompletion => write!(f, "Wait for the running operation"),
            Self::SkipItem => write!(f, "Skipping item"),
            Self::CheckConnectivity => write!(f, "Check upstream connectivity"),
            Self::FixConfiguration => write!(f, "Fix configuration"),
            Self::SafeShutdown => write!(f, "Performing safe shutdown"),
            Self::UserIntervention => write!(f, "User intervention required"),
        }
    }
}

/// Error severity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// A later attempt may succeed
    Recoverable,
    /// Part of the work is lost but the service continues
    Degraded,
    /// The process cannot continue safely
    Fatal,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recoverable => write!(f, "Recoverable"),
            Self::Degraded => write!(f, "Degraded"),
            Self::Fatal => write!(f, "Fatal"),
        }
    }
}

/// Main error type for Bookshelf
#[derive(Error, Debug)]
pub enum AppError {
    // ===== Metadata Source Errors =====
    /// The metadata source could not be reached or refused the request
    #[error("Metadata source '{source_name}' unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    /// The metadata source answered with something that could not be decoded
    #[error("Invalid response from {source_name}: {details}")]
    InvalidSourceResponse { source_name: String, details: String },

    /// A single record could not be mapped into a search document
    #[error("Malformed record '{raw_id}': {reason}")]
    MalformedRecord { raw_id: String, reason: String },

    // ===== Search Engine Errors =====
    /// The search engine could not be reached
    #[error("Search engine unavailable: {reason}")]
    SearchEngineUnavailable { reason: String },

    /// The search engine rejected a write (call error or failed task)
    #[error("Write to index '{index}' rejected: {reason}")]
    WriteRejected { index: String, reason: String },

    /// Indexing tasks were still pending when the deadline elapsed
    #[error("Indexing timed out after {waited_secs}s with {pending} task(s) pending")]
    IndexingTimeout { pending: usize, waited_secs: u64 },

    /// The task status query itself failed while waiting for indexing
    #[error("Task status unavailable: {reason}")]
    TaskStatusUnavailable { reason: String },

    /// An index could not be created or configured
    #[error("Provisioning of index '{index}' failed: {reason}")]
    ProvisioningFailure { index: String, reason: String },

    /// The engine refused to exchange the primary and staging indexes
    #[error("Index swap '{primary}' <-> '{staging}' rejected: {reason}")]
    SwapRejected {
        primary: String,
        staging: String,
        reason: String,
    },

    /// A search query failed
    #[error("Query against '{index}' failed: {reason}")]
    QueryFailed { index: String, reason: String },

    // ===== Reindex Control Errors =====
    /// A reindex run was triggered while another one is in flight
    #[error("A reindex run is already in progress (started {started_secs_ago}s ago)")]
    AlreadyRunning { started_secs_ago: u64 },

    /// Operation cancelled before completion
    #[error("Operation cancelled: {operation}")]
    Cancelled { operation: String },

    // ===== Catalog Errors =====
    /// Book not present in the primary index or at the source
    #[error("Book not found: {id}")]
    BookNotFound { id: i64 },

    // ===== Configuration Errors =====
    /// Invalid configuration
    #[error("Invalid configuration: {setting} = '{value}' ({reason})")]
    InvalidConfiguration {
        setting: String,
        value: String,
        reason: String,
    },

    /// Configuration file corrupted
    #[error("Configuration corrupted: {path}")]
    ConfigurationCorrupted { path: PathBuf },

    // ===== Storage Errors =====
    /// The library database could not be read
    #[error("Database error: {message}")]
    DatabaseError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// General I/O error
    #[error("I/O error: {message}")]
    IoError {
        message: String,
        #[source]
        source: io::Error,
    },

    // ===== Generic Errors =====
    /// Generic internal error
    #[error("Internal error: {message}")]
    InternalError { message: String },

    /// Invalid argument provided
    #[error("Invalid argument: {argument} - {reason}")]
    InvalidArgument { argument: String, reason: String },
}

impl AppError {
    /// Returns the severity level of this error
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::SourceUnavailable { .. }
            | Self::SearchEngineUnavailable { .. }
            | Self::IndexingTimeout { .. }
            | Self::TaskStatusUnavailable { .. }
            | Self::AlreadyRunning { .. }
            | Self::Cancelled { .. } => ErrorSeverity::Recoverable,

            Self::MalformedRecord { .. }
            | Self::InvalidSourceResponse { .. }
            | Self::WriteRejected { .. }
            | Self::SwapRejected { .. }
            | Self::QueryFailed { .. }
            | Self::BookNotFound { .. } => ErrorSeverity::Degraded,

            Self::ProvisioningFailure { .. }
            | Self::InvalidConfiguration { .. }
            | Self::ConfigurationCorrupted { .. } => ErrorSeverity::Fatal,

            _ => ErrorSeverity::Degraded,
        }
    }

    /// Returns the recommended recovery action for this error
    pub fn recovery_action(&self) -> RecoveryAction {
        match self {
            Self::IndexingTimeout { .. } | Self::Cancelled { .. } => RecoveryAction::Retrigger,

            Self::AlreadyRunning { .. } => RecoveryAction::WaitForCompletion,

            Self::MalformedRecord { .. } => RecoveryAction::SkipItem,

            Self::SourceUnavailable { .. }
            | Self::SearchEngineUnavailable { .. }
            | Self::TaskStatusUnavailable { .. } => RecoveryAction::CheckConnectivity,

            Self::InvalidConfiguration { .. } | Self::ConfigurationCorrupted { .. } => {
                RecoveryAction::FixConfiguration
            }

            Self::ProvisioningFailure { .. } => RecoveryAction::SafeShutdown,

            _ => RecoveryAction::UserIntervention,
        }
    }

    /// Returns a message suitable for an HTTP response body or a CLI report
    pub fn user_message(&self) -> String {
        match self {
            Self::SourceUnavailable { source_name, .. } => {
                format!("{} is currently unavailable. Please try again later.", source_name)
            }
            Self::InvalidSourceResponse { .. } => {
                "Received invalid data from the library server.".to_string()
            }
            Self::MalformedRecord { raw_id, .. } => {
                format!("Book record '{}' could not be read and was skipped.", raw_id)
            }
            Self::SearchEngineUnavailable { .. } => {
                "The search engine is unreachable. Please try again later.".to_string()
            }
            Self::WriteRejected { .. } => {
                "The search engine rejected the catalog update. The live catalog is unchanged."
                    .to_string()
            }
            Self::IndexingTimeout { .. } => {
                "Indexing did not finish in time. The live catalog is unchanged.".to_string()
            }
            Self::TaskStatusUnavailable { .. } => {
                "Could not check indexing progress. The live catalog is unchanged.".to_string()
            }
            Self::ProvisioningFailure { index, .. } => {
                format!("Search index '{}' could not be prepared.", index)
            }
            Self::SwapRejected { .. } => {
                "The new catalog could not be activated. The live catalog is unchanged.".to_string()
            }
            Self::QueryFailed { .. } => "Search failed. Please try again.".to_string(),
            Self::AlreadyRunning { .. } => {
                "A reindex is already running. Please wait for it to finish.".to_string()
            }
            Self::Cancelled { .. } => "Operation was cancelled.".to_string(),
            Self::BookNotFound { .. } => "The requested book was not found.".to_string(),
            Self::InvalidConfiguration { setting, .. } => {
                format!("Invalid setting: {}. Please check your configuration.", setting)
            }
            Self::ConfigurationCorrupted { .. } => {
                "Configuration file is corrupted. Using defaults.".to_string()
            }
            Self::DatabaseError { .. } => {
                "The library database is temporarily unavailable.".to_string()
            }
            Self::IoError { .. } => "A file operation failed. Please try again.".to_string(),
            Self::InternalError { .. } => {
                "An unexpected error occurred. Please try again.".to_string()
            }
            Self::InvalidArgument { .. } => "Invalid input provided.".to_string(),
        }
    }

    /// Returns true if this error should be logged at ERROR level
    pub fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Fatal
    }

    /// Returns true if simply triggering the operation again may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.recovery_action(),
            RecoveryAction::Retrigger
                | RecoveryAction::WaitForCompletion
                | RecoveryAction::CheckConnectivity
        )
    }

    /// Short machine-readable name of the failure class
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SourceUnavailable { .. } => "source_unavailable",
            Self::InvalidSourceResponse { .. } => "invalid_source_response",
            Self::MalformedRecord { .. } => "malformed_record",
            Self::SearchEngineUnavailable { .. } => "search_engine_unavailable",
            Self::WriteRejected { .. } => "write_rejected",
            Self::IndexingTimeout { .. } => "indexing_timeout",
            Self::TaskStatusUnavailable { .. } => "task_status_unavailable",
            Self::ProvisioningFailure { .. } => "provisioning_failure",
            Self::SwapRejected { .. } => "swap_rejected",
            Self::QueryFailed { .. } => "query_failed",
            Self::AlreadyRunning { .. } => "already_running",
            Self::Cancelled { .. } => "cancelled",
            Self::BookNotFound { .. } => "not_found",
            Self::InvalidConfiguration { .. } => "invalid_configuration",
            Self::ConfigurationCorrupted { .. } => "configuration_corrupted",
            Self::DatabaseError { .. } => "database_error",
            Self::IoError { .. } => "io_error",
            Self::InternalError { .. } => "internal_error",
            Self::InvalidArgument { .. } => "invalid_argument",
        }
    }

    /// Helper to create a database error from any error type
    pub fn database<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::DatabaseError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Helper to create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }
}

/// Convenience type alias for Results using AppError
pub type Result<T> = std::result::Result<T, AppError>;

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        Self::IoError {
            message: err.to_string(),
            source: err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_recovery_action_display() {
        assert_eq!(RecoveryAction::Retrigger.to_string(), "Trigger again");
        assert_eq!(RecoveryAction::SkipItem.to_string(), "Skipping item");
        assert_eq!(
            RecoveryAction::UserIntervention.to_string(),
            "User intervention required"
        );
    }

    #[test]
    fn test_error_severity_ordering() {
        assert!(ErrorSeverity::Recoverable < ErrorSeverity::Degraded);
        assert!(ErrorSeverity::Degraded < ErrorSeverity::Fatal);
    }

    #[test]
    fn test_timeout_is_distinct_from_write_rejected() {
        let timeout = AppError::IndexingTimeout {
            pending: 2,
            waited_secs: 30,
        };
        let rejected = AppError::WriteRejected {
            index: "library-bak".to_string(),
            reason: "invalid document".to_string(),
        };

        assert_ne!(timeout.kind(), rejected.kind());
        assert_eq!(timeout.severity(), ErrorSeverity::Recoverable);
        assert_eq!(rejected.severity(), ErrorSeverity::Degraded);
        assert!(timeout.is_retryable());
        assert!(!rejected.is_retryable());
    }

    #[test]
    fn test_provisioning_failure_is_fatal() {
        let err = AppError::ProvisioningFailure {
            index: "library".to_string(),
            reason: "connection refused".to_string(),
        };
        assert!(err.is_critical());
        assert_eq!(err.recovery_action(), RecoveryAction::SafeShutdown);
        assert!(err.user_message().contains("library"));
    }

    #[test]
    fn test_malformed_record_is_skipped() {
        let err = AppError::MalformedRecord {
            raw_id: "abc".to_string(),
            reason: "not an integer".to_string(),
        };
        assert_eq!(err.recovery_action(), RecoveryAction::SkipItem);
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn test_already_running_message() {
        let err = AppError::AlreadyRunning { started_secs_ago: 4 };
        assert_eq!(err.kind(), "already_running");
        assert_eq!(err.recovery_action(), RecoveryAction::WaitForCompletion);
        assert!(err.to_string().contains("4s"));
    }

    #[test]
    fn test_indexing_timeout_display() {
        let err = AppError::IndexingTimeout {
            pending: 3,
            waited_secs: 30,
        };
        let msg = err.to_string();
        assert!(msg.contains("30s"));
        assert!(msg.contains("3 task"));
    }

    #[test]
    fn test_io_error_conversion_keeps_source() {
        let io_err = io::Error::new(io::ErrorKind::Other, "disk gone");
        let err: AppError = io_err.into();
        assert!(matches!(err, AppError::IoError { .. }));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_database_helper() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "metadata.db");
        let err = AppError::database("open failed", io_err);
        assert!(err.to_string().contains("open failed"));
        assert_eq!(err.kind(), "database_error");
    }
}
