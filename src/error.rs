use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::middleware::current_request_id;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("User not found")]
    UserNotFound,

    #[error("Incorrect path: {0}")]
    IncorrectPath(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Resource already exists: {0}")]
    ResourceAlreadyExists(String),

    #[error("Resource operation failed: {0}")]
    OperationFailed(String),

    /// A multi-object operation failed after it had already changed the store.
    #[error("{operation} stopped after {applied} of {total} steps: {reason}")]
    Incomplete {
        operation: &'static str,
        applied: usize,
        total: usize,
        reason: String,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::OperationFailed(format!("archive packaging failed: {}", err))
    }
}

impl Error {
    /// Wraps `source` as a partial failure when earlier steps of `operation`
    /// already went through; with nothing applied the source is returned as-is.
    pub fn incomplete(operation: &'static str, applied: usize, total: usize, source: Error) -> Self {
        if applied == 0 {
            return source;
        }
        Error::Incomplete {
            operation,
            applied,
            total,
            reason: source.to_string(),
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, Error::Incomplete { .. })
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::UserNotFound => StatusCode::UNAUTHORIZED,
            Error::IncorrectPath(_) => StatusCode::BAD_REQUEST,
            Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Error::ResourceNotFound(_) => StatusCode::NOT_FOUND,
            Error::ResourceAlreadyExists(_) => StatusCode::CONFLICT,
            Error::OperationFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Incomplete { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &str {
        match self {
            Error::UserNotFound => "UserNotFound",
            Error::IncorrectPath(_) => "IncorrectPath",
            Error::InvalidRequest(_) => "InvalidRequest",
            Error::ResourceNotFound(_) => "ResourceNotFound",
            Error::ResourceAlreadyExists(_) => "ResourceAlreadyExists",
            _ => "ResourceOperationFailed",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, partial = self.is_partial(), "Request failed");
        }

        let body = json!({
            "code": self.error_code(),
            "message": self.to_string(),
            "requestId": current_request_id(),
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_errors_to_status_codes() {
        assert_eq!(Error::UserNotFound.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            Error::IncorrectPath("a//b".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::ResourceNotFound("a".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::ResourceAlreadyExists("a".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            Error::Storage("timeout".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn store_failures_surface_as_operation_failures() {
        assert_eq!(Error::Storage("x".into()).error_code(), "ResourceOperationFailed");
        assert_eq!(
            Error::OperationFailed("x".into()).error_code(),
            "ResourceOperationFailed"
        );
    }

    #[test]
    fn incomplete_only_when_something_was_applied() {
        let untouched = Error::incomplete("delete", 0, 3, Error::Storage("down".into()));
        assert!(!untouched.is_partial());
        assert!(matches!(untouched, Error::Storage(_)));

        let partial = Error::incomplete("delete", 2, 3, Error::Storage("down".into()));
        assert!(partial.is_partial());
        assert_eq!(partial.error_code(), "ResourceOperationFailed");
        assert!(partial.to_string().contains("2 of 3"));
    }
}
