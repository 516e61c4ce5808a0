//! # Engine Errors
//!
//! Every failure the data engine can report. Each variant belongs to one
//! class and maps to exactly one HTTP status; the envelope carries the
//! display text.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::store::StoreError;

use super::response::Envelope;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Error class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad input; nothing was attempted against the store
    Client,
    /// The identifying key matched more than one row
    Ambiguity,
    /// Store, parsing or timeout failure
    Server,
}

/// Data engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    // ==================
    // Client Errors
    // ==================
    /// `action` field absent from the envelope
    #[error("Missing action")]
    MissingAction,

    /// `action` present but not a string
    #[error("Invalid action: expected a string")]
    InvalidAction,

    /// `action` names no registered handler
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// A field the action requires is absent
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A field is present but has the wrong shape
    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// `body` content cannot be turned into a query
    #[error("Invalid body: {0}")]
    InvalidBody(String),

    /// A column outside the configured allow-list
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// A search value that is not a valid pattern
    #[error("Invalid pattern for {column}: {reason}")]
    InvalidPattern { column: String, reason: String },

    /// Update/delete did not carry exactly one identifying pair
    #[error("Expected exactly one identifying key/value pair, got {0}")]
    WrongKeyCount(usize),

    /// No row matches the identifying pair
    #[error("Record does not exist")]
    RecordNotFound,

    /// Non-POST request
    #[error("Method not allowed")]
    MethodNotAllowed,

    // ==================
    // Ambiguity Errors
    // ==================
    /// More than one row matches the identifying pair
    #[error("Ambiguous key: {column} matches more than one record")]
    AmbiguousKey { column: String },

    // ==================
    // Server Errors
    // ==================
    /// Request bytes are not a JSON object
    #[error("Malformed JSON: {0}")]
    MalformedJson(String),

    /// The store call exceeded the configured budget
    #[error("Query timed out after {0} ms")]
    Timeout(u64),

    /// Store connectivity or statement failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The worker running the request failed
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn invalid_field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }

    pub fn invalid_body(reason: impl Into<String>) -> Self {
        Self::InvalidBody(reason.into())
    }

    /// Get the error class
    pub fn class(&self) -> ErrorClass {
        match self {
            EngineError::AmbiguousKey { .. } => ErrorClass::Ambiguity,
            EngineError::MalformedJson(_)
            | EngineError::Timeout(_)
            | EngineError::Store(_)
            | EngineError::Internal(_) => ErrorClass::Server,
            _ => ErrorClass::Client,
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 404 Not Found
            EngineError::RecordNotFound => StatusCode::NOT_FOUND,

            // 405 Method Not Allowed
            EngineError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,

            // 504 Gateway Timeout
            EngineError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,

            // 500 Internal Server Error
            EngineError::AmbiguousKey { .. }
            | EngineError::MalformedJson(_)
            | EngineError::Store(_)
            | EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 400 Bad Request
            EngineError::MissingAction
            | EngineError::InvalidAction
            | EngineError::UnknownAction(_)
            | EngineError::MissingField(_)
            | EngineError::InvalidField { .. }
            | EngineError::InvalidBody(_)
            | EngineError::UnknownColumn(_)
            | EngineError::InvalidPattern { .. }
            | EngineError::WrongKeyCount(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Envelope::failed(&self)).into_response()
    }
}
