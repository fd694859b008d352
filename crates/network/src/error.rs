// crates/network/src/error.rs
//! Error types for network operations

use thiserror::Error;

/// Result type for network operations
pub type NetworkResult<T> = Result<T, NetworkError>;

/// Errors that can occur during network operations
#[derive(Debug, Error)]
pub enum NetworkError {
    /// Transport-level failure (connect, TLS, body read)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The server answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not the expected JSON
    #[error("Failed to decode response from {url}: {reason}")]
    Decode { url: String, reason: String },

    /// The request did not complete in time
    #[error("Operation timed out")]
    Timeout,
}

impl NetworkError {
    /// Returns true if the same request may succeed when repeated
    pub fn is_retryable(&self) -> bool {
        match self {
            NetworkError::Timeout => true,
            NetworkError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            NetworkError::Status { status, .. } => *status >= 500 || *status == 429,
            NetworkError::InvalidUrl(_) | NetworkError::Decode { .. } => false,
        }
    }

    /// Returns true if the server reported 404
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// HTTP status code, when the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            NetworkError::Status { status, .. } => Some(*status),
            NetworkError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NetworkError::InvalidUrl("::".to_string());
        assert!(err.to_string().contains("Invalid URL"));
    }

    #[test]
    fn test_status_error() {
        let err = NetworkError::Status {
            status: 404,
            body: "missing".to_string(),
        };
        assert!(err.is_not_found());
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn test_retryable_errors() {
        assert!(NetworkError::Timeout.is_retryable());
        assert!(NetworkError::Status {
            status: 503,
            body: String::new()
        }
        .is_retryable());
        assert!(NetworkError::Status {
            status: 429,
            body: String::new()
        }
        .is_retryable());
        assert!(!NetworkError::Decode {
            url: "http://x".to_string(),
            reason: "eof".to_string()
        }
        .is_retryable());
    }
}
