// crates/server/src/error.rs
//! Error types for the HTTP surface

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bookshelf_core::AppError;
use serde::Serialize;
use thiserror::Error;

/// Result type for server operations
pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    App(#[from] AppError),

    /// A path segment did not name a servable file
    #[error("No such file: {name}")]
    UnknownFile { name: String },

    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// JSON body of every error response
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: u16,
    pub kind: &'static str,
    pub message: String,
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::App(err) => app_status(err),
            ServerError::UnknownFile { .. } => StatusCode::NOT_FOUND,
            ServerError::Bind { .. } | ServerError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServerError::App(err) => err.kind(),
            ServerError::UnknownFile { .. } => "not_found",
            ServerError::Bind { .. } | ServerError::Io(_) => "io_error",
        }
    }
}

fn app_status(err: &AppError) -> StatusCode {
    match err {
        AppError::BookNotFound { .. } => StatusCode::NOT_FOUND,
        AppError::AlreadyRunning { .. } => StatusCode::CONFLICT,
        AppError::IndexingTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        AppError::InvalidArgument { .. } | AppError::MalformedRecord { .. } => {
            StatusCode::BAD_REQUEST
        }
        AppError::Cancelled { .. } => StatusCode::SERVICE_UNAVAILABLE,
        AppError::SourceUnavailable { .. }
        | AppError::InvalidSourceResponse { .. }
        | AppError::SearchEngineUnavailable { .. }
        | AppError::WriteRejected { .. }
        | AppError::TaskStatusUnavailable { .. }
        | AppError::SwapRejected { .. }
        | AppError::QueryFailed { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("Request failed: {}", self);
        } else {
            log::debug!("Request rejected: {}", self);
        }

        let body = ErrorBody {
            code: status.as_u16(),
            kind: self.kind(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
