//! Shared error type for the grievance portal
//!
//! Every failure that crosses the HTTP boundary is one of these variants.
//! `status_code()` decides the response status and `public_message()` decides
//! what the caller sees; internal variants never leak their detail.

use hyper::StatusCode;
use thiserror::Error;

/// Errors raised by the workflow, guard, stores and routes
#[derive(Error, Debug)]
pub enum PortalError {
    /// Grievance, account or file does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Role or ownership mismatch
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Grievance is terminal or the requested transition is not permitted
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Resolve requested without an evidence file
    #[error("Evidence required: {0}")]
    MissingEvidence(String),

    /// Malformed form, JSON or file
    #[error("Validation error: {0}")]
    Validation(String),

    /// Request body or upload above the configured limit
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Credentials rejected
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// No valid session for the requested role
    #[error("Session expired or missing")]
    SessionExpired,

    /// Unique constraint hit (duplicate email)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Evidence storage failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// MongoDB failure
    #[error("Database error: {0}")]
    Database(String),

    /// Transport-level failure
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, PortalError>;

impl PortalError {
    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            PortalError::NotFound(_) => StatusCode::NOT_FOUND,
            PortalError::Forbidden(_) => StatusCode::FORBIDDEN,
            PortalError::InvalidTransition(_) | PortalError::Conflict(_) => StatusCode::CONFLICT,
            PortalError::MissingEvidence(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PortalError::Validation(_) | PortalError::Http(_) => StatusCode::BAD_REQUEST,
            PortalError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            PortalError::Unauthorized(_) | PortalError::SessionExpired => StatusCode::UNAUTHORIZED,
            PortalError::Storage(_)
            | PortalError::Database(_)
            | PortalError::Io(_)
            | PortalError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to the caller
    pub fn public_message(&self) -> String {
        match self {
            PortalError::NotFound(m)
            | PortalError::Forbidden(m)
            | PortalError::InvalidTransition(m)
            | PortalError::MissingEvidence(m)
            | PortalError::Validation(m)
            | PortalError::PayloadTooLarge(m)
            | PortalError::Unauthorized(m)
            | PortalError::Conflict(m)
            | PortalError::Http(m) => m.clone(),
            PortalError::SessionExpired => "Session expired, please log in again".to_string(),
            PortalError::Storage(_) => "Failed to store evidence file".to_string(),
            PortalError::Database(_) | PortalError::Io(_) | PortalError::Internal(_) => {
                "Internal server error".to_string()
            }
        }
    }

    /// Whether this is a server-side failure worth an `error!` line
    pub fn is_internal(&self) -> bool {
        self.status_code().is_server_error()
    }
}
