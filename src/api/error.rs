//! The single error type every stats call fails with.
//!
//! Whatever went wrong (connection refused, timeout, a 4xx/5xx from the
//! backend, a body that does not decode) the caller only ever sees an
//! [`ApiError`] carrying a human-readable message.

use thiserror::Error;

/// Message used when neither the body nor the transport says anything useful.
pub const FALLBACK_MESSAGE: &str = "request failed";

/// Broad category of a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network unreachable, DNS, timeout, connection reset.
    Transport,
    /// Backend answered with a non-2xx status other than 401.
    Status(u16),
    /// Backend answered 401. Auth observers have been notified.
    Unauthorized,
    /// A 2xx body that does not match the expected response shape.
    Decode,
    /// The query could not be built (missing required parameter, unknown
    /// parameter, unknown dimension). Nothing was sent.
    InvalidQuery,
}

/// Normalized failure of a stats call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.is_empty() {
            FALLBACK_MESSAGE.to_string()
        } else {
            message
        };
        Self { kind, message }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    pub fn status(code: u16, message: impl Into<String>) -> Self {
        if code == 401 {
            Self::new(ErrorKind::Unauthorized, message)
        } else {
            Self::new(ErrorKind::Status(code), message)
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Decode, message)
    }

    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidQuery, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP status of the failed response, if the backend answered at all.
    pub fn http_status(&self) -> Option<u16> {
        match self.kind {
            ErrorKind::Status(code) => Some(code),
            ErrorKind::Unauthorized => Some(401),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind == ErrorKind::Unauthorized
    }
}

/// Pick the user-facing message: body `error` field, then the transport's
/// own message, then [`FALLBACK_MESSAGE`]. Empty candidates are skipped;
/// anything else is kept verbatim.
pub fn resolve_message(body_error: Option<&str>, transport_message: Option<&str>) -> String {
    [body_error, transport_message]
        .into_iter()
        .flatten()
        .find(|m| !m.is_empty())
        .unwrap_or(FALLBACK_MESSAGE)
        .to_string()
}

/// Extract a non-empty `error` string from a JSON error body.
pub fn body_error_field(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")?
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
