//! # Response Envelope
//!
//! Fixed-shape JSON wrapper for every data endpoint answer:
//!
//! ```text
//! {"status":"OK","response":"null"|<payload>,"error":"null"}
//! {"status":"Failed","response":"null","error":"<message>"}
//! ```
//!
//! Error text is embedded through the JSON serializer, so quotes and
//! control characters always arrive escaped.

use axum::http::header::{HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;

use super::errors::EngineError;

/// Placeholder used for absent payload/error values
pub const NULL_TEXT: &str = "null";

/// Envelope status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "Failed")]
    Failed,
}

/// Response envelope
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub status: Status,
    pub response: Value,
    pub error: String,
}

impl Envelope {
    /// Success without payload
    pub fn ok() -> Self {
        Self {
            status: Status::Ok,
            response: Value::String(NULL_TEXT.to_string()),
            error: NULL_TEXT.to_string(),
        }
    }

    /// Success carrying a payload
    pub fn with_payload(payload: Value) -> Self {
        Self {
            status: Status::Ok,
            response: payload,
            error: NULL_TEXT.to_string(),
        }
    }

    /// Failure carrying the error's message
    pub fn failed(err: &EngineError) -> Self {
        Self::failed_with(err.to_string())
    }

    pub fn failed_with(message: impl Into<String>) -> Self {
        Self {
            status: Status::Failed,
            response: Value::String(NULL_TEXT.to_string()),
            error: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// Serialize to the wire representation
    pub fn to_json(&self) -> String {
        // An Envelope holds only strings and serde_json values, which always serialize
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"status":"Failed","response":"null","error":"serialization failed"}"#.to_string()
        })
    }
}

// Access-Control-Allow-Origin is owned by the server's CORS layer, which
// answers `*` or echoes an allow-listed origin.
impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        let mut response = self.to_json().into_response();
        let headers = response.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type, Origin, cache-control"),
        );
        response
    }
}
