//! Error types for the workspace reconciler

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the workspace reconciler
#[derive(Debug, Error)]
pub enum Error {
    // Workspace errors (2000-2999)
    #[error("Workspace not found: {0}")]
    WorkspaceNotFound(String),

    #[error("Workspace already exists: {0}")]
    WorkspaceAlreadyExists(String),

    #[error("Workspace in invalid state: cannot change desired state from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Invalid devfile: {0}")]
    InvalidDevfile(String),

    // Agent errors (5000-5999)
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Agent already exists: {0}")]
    AgentAlreadyExists(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Feature disabled: {0}")]
    FeatureDisabled(String),

    // Infrastructure errors (6000-6999)
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // General errors (1000-1999)
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get the error code
    pub fn code(&self) -> u32 {
        match self {
            // Workspace errors (2000-2999)
            Error::WorkspaceNotFound(_) => 2001,
            Error::WorkspaceAlreadyExists(_) => 2002,
            Error::InvalidStateTransition { .. } => 2003,
            Error::InvalidDevfile(_) => 2004,

            // Agent errors (5000-5999)
            Error::AgentNotFound(_) => 5001,
            Error::AgentAlreadyExists(_) => 5002,
            Error::Unauthorized(_) => 5003,
            Error::FeatureDisabled(_) => 5004,

            // Infrastructure errors (6000-6999)
            Error::DatabaseError(_) => 6001,
            Error::Serialization(_) => 6002,

            // General errors (1000-1999)
            Error::InvalidParameter(_) => 1002,
            Error::Internal(_) => 1003,
        }
    }

    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::WorkspaceNotFound(_) | Error::AgentNotFound(_) => StatusCode::NOT_FOUND,

            Error::WorkspaceAlreadyExists(_) | Error::AgentAlreadyExists(_) => {
                StatusCode::CONFLICT
            }

            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,

            Error::FeatureDisabled(_) => StatusCode::FORBIDDEN,

            Error::InvalidParameter(_)
            | Error::InvalidDevfile(_)
            | Error::InvalidStateTransition { .. } => StatusCode::BAD_REQUEST,

            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code(),
            message: self.to_string(),
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
