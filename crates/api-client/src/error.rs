//! Error types for the backend-access layer
//!
//! Every failure a caller can observe is one of a small, closed set of kinds
//! (see [`ErrorKind`]). Each variant carries the target URL so the failure can
//! be diagnosed from the log line or error message alone.

use crate::transport::{TransportError, TransportErrorKind};
use std::fmt;
use thiserror::Error;

/// Result type alias for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Closed set of failure kinds raised to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connection establishment/reset failure, TLS failure, or exhausted retries
    Connection,
    /// Connect or read timeout
    Timeout,
    /// Redirect loop or HTTP protocol error
    Http,
    /// Malformed URL, scheme, header, or request serialization
    InvalidRequest,
    /// Body failed to decode, or was not a structured payload
    InvalidResponse,
    /// A backend type omitted required construction logic
    NotImplemented,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connection => "connection",
            Self::Timeout => "timeout",
            Self::Http => "http",
            Self::InvalidRequest => "invalid_request",
            Self::InvalidResponse => "invalid_response",
            Self::NotImplemented => "not_implemented",
        };
        f.write_str(name)
    }
}

/// Backend access errors
#[derive(Error, Debug)]
pub enum BackendError {
    /// The backend could not be reached
    #[error("Connection error occurred while requesting {url}{}: {reason}", attempts_note(.attempts))]
    Connection {
        /// Target URL
        url: String,
        /// Attempts made before giving up
        attempts: u32,
        /// Underlying failure
        reason: String,
    },

    /// Connect or read timeout
    #[error("Timeout occurred while connecting to {url}: {reason}")]
    Timeout {
        /// Target URL
        url: String,
        /// Underlying failure
        reason: String,
    },

    /// Redirect loop or HTTP protocol error
    #[error("HTTP error occurred while connecting to {url}: {reason}")]
    Http {
        /// Target URL
        url: String,
        /// Underlying failure
        reason: String,
    },

    /// The request could not be built or sent as described
    #[error("Invalid request to {url}: {reason}")]
    InvalidRequest {
        /// Target URL
        url: String,
        /// Underlying failure
        reason: String,
    },

    /// The response could not be decoded or parsed
    #[error("Invalid response from {url}: {reason}")]
    InvalidResponse {
        /// Target URL
        url: String,
        /// Underlying failure
        reason: String,
    },

    /// Required construction logic is missing
    #[error("Not implemented: {0}")]
    NotImplemented(String),
}

/// Attempt count for a message; zero means no request went out
#[allow(clippy::trivially_copy_pass_by_ref)]
fn attempts_note(attempts: &u32) -> String {
    if *attempts == 0 {
        String::new()
    } else {
        format!(" (after {attempts} attempt(s))")
    }
}

impl BackendError {
    /// Create a connection error
    pub fn connection(url: impl Into<String>, attempts: u32, reason: impl Into<String>) -> Self {
        Self::Connection {
            url: url.into(),
            attempts,
            reason: reason.into(),
        }
    }

    /// Create an invalid request error
    pub fn invalid_request(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid response error
    pub fn invalid_response(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a not-implemented error
    pub fn not_implemented(msg: impl Into<String>) -> Self {
        Self::NotImplemented(msg.into())
    }

    /// Map a terminal transport failure for `url` into the taxonomy
    pub(crate) fn from_transport(failure: TransportError, url: &str, attempts: u32) -> Self {
        let url = url.to_string();
        let reason = failure.to_string();
        match failure.kind() {
            TransportErrorKind::Connection | TransportErrorKind::Tls => Self::Connection {
                url,
                attempts,
                reason,
            },
            TransportErrorKind::Timeout => Self::Timeout { url, reason },
            TransportErrorKind::Redirect | TransportErrorKind::Protocol => {
                Self::Http { url, reason }
            }
            TransportErrorKind::InvalidRequest => Self::InvalidRequest { url, reason },
            TransportErrorKind::Decode => Self::InvalidResponse { url, reason },
        }
    }

    /// The taxonomy kind of this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connection { .. } => ErrorKind::Connection,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Http { .. } => ErrorKind::Http,
            Self::InvalidRequest { .. } => ErrorKind::InvalidRequest,
            Self::InvalidResponse { .. } => ErrorKind::InvalidResponse,
            Self::NotImplemented(_) => ErrorKind::NotImplemented,
        }
    }

    /// Target URL, when the failure happened on the wire
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Connection { url, .. }
            | Self::Timeout { url, .. }
            | Self::Http { url, .. }
            | Self::InvalidRequest { url, .. }
            | Self::InvalidResponse { url, .. } => Some(url),
            Self::NotImplemented(_) => None,
        }
    }
}
