//! Error types for the server crate.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use portico_audit::AuditError;
use portico_auth::AuthError;
use serde_json::json;
use thiserror::Error;

/// Errors that can occur while serving the portal API.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to start the server.
    #[error("failed to start server: {0}")]
    StartupFailed(String),

    /// No authenticated identity on a request that requires one.
    #[error("authentication required")]
    Unauthorized,

    /// The authenticated user lacks the required permission.
    #[error("missing permission: {0}")]
    Forbidden(String),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Account or session error from the auth layer.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Audit store error surfaced by the reporting endpoints.
    #[error("audit store error: {0}")]
    Audit(#[from] AuditError),

    /// Payload serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials
                | AuthError::SessionInvalid
                | AuthError::SessionExpired => StatusCode::UNAUTHORIZED,
                AuthError::AccountLocked
                | AuthError::AccountNotVerified
                | AuthError::AccountDisabled(_) => StatusCode::FORBIDDEN,
                AuthError::NotFound(_) => StatusCode::NOT_FOUND,
                AuthError::Conflict(_) => StatusCode::CONFLICT,
                AuthError::Crypto(_) | AuthError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    /// Render as `{"error": "..."}` so downstream tooling (including the
    /// audit middleware) can extract the message from failure responses.
    /// Internal errors are logged here and reported without detail.
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
            "internal error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
