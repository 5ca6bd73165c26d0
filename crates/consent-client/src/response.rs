//! Normalized result envelope
//!
//! Every client operation resolves to a [`ResponseContext`], the only
//! shape consumers ever see. `ok` and `error` are mutually exclusive;
//! callers that want hard failures opt in through
//! [`ResponseContext::into_result`] instead of the client throwing.

use serde::{Deserialize, Serialize};

/// Machine-readable failure classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Transport-level failure (DNS, connection, timeout)
    NetworkError,
    /// Non-2xx HTTP response with a parseable or absent body
    ApiError,
    /// Unparseable body on an otherwise complete response
    ParseError,
    /// Retry loop exhausted without a definitive outcome
    MaxRetriesExceeded,
    /// Custom strategy has no handler registered for the path
    EndpointNotFound,
    /// A custom handler reported a failure
    HandlerError,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = match self {
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::ApiError => "API_ERROR",
            ErrorCode::ParseError => "PARSE_ERROR",
            ErrorCode::MaxRetriesExceeded => "MAX_RETRIES_EXCEEDED",
            ErrorCode::EndpointNotFound => "ENDPOINT_NOT_FOUND",
            ErrorCode::HandlerError => "HANDLER_ERROR",
        };
        write!(f, "{code}")
    }
}

/// Structured error carried in a failed [`ResponseContext`]
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
#[error("{code} ({status}): {message}")]
pub struct ResponseError {
    /// Human-readable description
    pub message: String,
    /// HTTP status, 0 for transport-level failures
    pub status: u16,
    /// Failure classification
    pub code: ErrorCode,
    /// Backend-supplied detail payload, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ResponseError {
    /// Create an error with no detail payload
    pub fn new(code: ErrorCode, status: u16, message: impl Into<String>) -> Self {
        Self { message: message.into(), status, code, details: None }
    }

    /// Create a transport-level error (status 0)
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NetworkError, 0, message)
    }

    /// Attach a detail payload
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// The normalized outcome of a client operation
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseContext<T> {
    /// Parsed payload, None for empty bodies and failures
    pub data: Option<T>,
    /// Failure description, None on success
    pub error: Option<ResponseError>,
    /// Whether the operation succeeded
    pub ok: bool,
    /// HTTP status of the final attempt, if one completed
    pub status: Option<u16>,
}

impl<T> ResponseContext<T> {
    /// A successful outcome; `data` is None for empty bodies
    pub fn success(data: Option<T>, status: Option<u16>) -> Self {
        Self { data, error: None, ok: true, status }
    }

    /// A failed outcome
    pub fn failure(error: ResponseError) -> Self {
        let status = if error.status == 0 { None } else { Some(error.status) };
        Self { data: None, error: Some(error), ok: false, status }
    }

    /// Convert into a hard `Result` for callers that opt into errors
    pub fn into_result(self) -> Result<Option<T>, ResponseError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.data),
        }
    }

    /// Map the payload type, preserving the outcome
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ResponseContext<U> {
        ResponseContext {
            data: self.data.map(f),
            error: self.error,
            ok: self.ok,
            status: self.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_and_error_are_mutually_exclusive() {
        let ok: ResponseContext<i32> = ResponseContext::success(Some(1), Some(200));
        assert!(ok.ok);
        assert!(ok.error.is_none());

        let failed: ResponseContext<i32> =
            ResponseContext::failure(ResponseError::new(ErrorCode::ApiError, 503, "down"));
        assert!(!failed.ok);
        assert!(failed.data.is_none());
        assert_eq!(failed.status, Some(503));
    }

    #[test]
    fn test_network_error_has_no_status() {
        let failed: ResponseContext<i32> =
            ResponseContext::failure(ResponseError::network("connection refused"));
        assert_eq!(failed.status, None);
        assert_eq!(failed.error.unwrap().code, ErrorCode::NetworkError);
    }

    #[test]
    fn test_into_result() {
        let ok: ResponseContext<i32> = ResponseContext::success(Some(7), Some(200));
        assert_eq!(ok.into_result().unwrap(), Some(7));

        let failed: ResponseContext<i32> =
            ResponseContext::failure(ResponseError::new(ErrorCode::ParseError, 200, "bad json"));
        assert!(failed.into_result().is_err());
    }

    #[test]
    fn test_error_code_display_matches_wire_names() {
        assert_eq!(ErrorCode::NetworkError.to_string(), "NETWORK_ERROR");
        assert_eq!(ErrorCode::ApiError.to_string(), "API_ERROR");
        assert_eq!(ErrorCode::MaxRetriesExceeded.to_string(), "MAX_RETRIES_EXCEEDED");
    }

    #[test]
    fn test_map_preserves_outcome() {
        let ok: ResponseContext<i32> = ResponseContext::success(Some(2), Some(200));
        let mapped = ok.map(|n| n * 10);
        assert_eq!(mapped.data, Some(20));
        assert!(mapped.ok);
    }
}
