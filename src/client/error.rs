//! Unified error handling for the API client.
//!
//! Every request resolves to exactly one of the variants below; callers never
//! see a raw transport or JSON parse failure. UI code maps `SessionExpired`
//! to a forced logout and everything else to an inline error display.

use serde::{Deserialize, Serialize};

/// Errors surfaced by the authenticated request client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No access token was available when the call was made. No network
    /// request is issued in this case.
    #[error("not authenticated: no access token available")]
    Unauthenticated,

    /// The access token expired, the refresh-and-retry cycle failed, and the
    /// session has been logged out.
    #[error("session expired")]
    SessionExpired,

    /// The backend rejected the request with a non-retryable status.
    #[error("request failed with status {status}: [{code}] {message}")]
    RequestFailed {
        status: u16,
        code: String,
        message: String,
    },

    /// No response reached us at all (DNS failure, connection refused,
    /// timeout). Distinguished from `RequestFailed` so callers can render
    /// "offline" differently from "rejected".
    #[error("network error: {0}")]
    NetworkError(String),

    /// The response body was not parseable JSON. Carries the HTTP status the
    /// malformed body arrived with.
    #[error("invalid response body (status {status})")]
    InvalidResponse { status: u16 },

    /// The backend rejected the token refresh (expired refresh credential,
    /// revoked session, or the refresh call itself failed to reach it).
    #[error("token refresh rejected: {0}")]
    RefreshFailed(String),
}

impl ApiError {
    /// Whether this error is a 401 caused by an expired or invalid access
    /// token, i.e. the one case worth a refresh-and-retry.
    ///
    /// Prefers the structured error code when the backend sends one; falls
    /// back to substring matching on the message for backends that only
    /// return text.
    pub fn is_token_expiry(&self) -> bool {
        match self {
            ApiError::RequestFailed {
                status: 401,
                code,
                message,
            } => {
                matches!(code.as_str(), "token_expired" | "token_invalid") || {
                    let lower = message.to_lowercase();
                    lower.contains("expired") || lower.contains("invalid")
                }
            }
            _ => false,
        }
    }
}

/// The inner error object in a backend error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code
    #[serde(default)]
    pub code: String,
    /// Human-readable error message
    #[serde(default)]
    pub message: String,
}

/// The error response envelope used by the backend:
/// `{"error": {"code": "...", "message": "..."}}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Translate a non-success response body into a `RequestFailed` error.
///
/// Bodies that don't match the envelope are still surfaced as
/// `RequestFailed`, carrying whatever text was sent.
pub fn request_failed(status: u16, body: &[u8]) -> ApiError {
    match serde_json::from_slice::<ErrorResponse>(body) {
        Ok(envelope) => ApiError::RequestFailed {
            status,
            code: envelope.error.code,
            message: envelope.error.message,
        },
        Err(_) => ApiError::RequestFailed {
            status,
            code: String::new(),
            message: String::from_utf8_lossy(body).into_owned(),
        },
    }
}
