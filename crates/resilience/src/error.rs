// crates/resilience/src/error.rs
//! Error types for resilience operations

use thiserror::Error;

/// Result type for resilience operations
pub type ResilienceResult<T> = Result<T, ResilienceError>;

/// Errors that can occur in resilience operations
#[derive(Debug, Error)]
pub enum ResilienceError {
    /// Operation did not finish within its time budget
    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The cancellation token fired before the operation finished
    #[error("Operation was cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_error() {
        let err = ResilienceError::Timeout(std::time::Duration::from_secs(30));
        assert!(err.to_string().contains("timed out"));
        assert!(err.to_string().contains("30s"));
    }

    #[test]
    fn test_cancelled_error() {
        assert!(ResilienceError::Cancelled.to_string().contains("cancelled"));
    }
}
