//! Error taxonomy for mediated resource access.
//!
//! Every failure a caller can observe from [`crate::auth::GatedResource::call`]
//! or the HTTP surface is one of these variants. Authorization failures are
//! always distinguishable from failures raised by the resource itself.

use axum::http::StatusCode;
use thiserror::Error;

/// Errors produced while mediating a resource call.
#[derive(Debug, Error)]
pub enum AccessError {
    /// Input failed the resource's request schema.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Policy evaluation or a middleware denied the call.
    #[error("Access denied: {0}")]
    Forbidden(String),

    /// Unknown resource code or tool name.
    #[error("{0} not found")]
    NotFound(String),

    /// Malformed envelope or unsupported protocol version.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Raised by the resource's `execute`; the message is passed through untouched.
    #[error(transparent)]
    Resource(#[from] anyhow::Error),
}

impl AccessError {
    /// HTTP status used when this error crosses the REST boundary.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AccessError::Validation(_) | AccessError::Protocol(_) => StatusCode::BAD_REQUEST,
            AccessError::Forbidden(_) => StatusCode::FORBIDDEN,
            AccessError::NotFound(_) => StatusCode::NOT_FOUND,
            AccessError::Resource(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether this error came from policy evaluation or middleware.
    pub fn is_authorization(&self) -> bool {
        matches!(self, AccessError::Forbidden(_))
    }
}

impl From<serde_json::Error> for AccessError {
    fn from(err: serde_json::Error) -> Self {
        AccessError::Validation(err.to_string())
    }
}
