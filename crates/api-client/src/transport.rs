//! Transport boundary between dispatch and the network
//!
//! Dispatch never talks to `reqwest` directly: it sends a [`TransportRequest`]
//! through a [`Transport`] handle and gets back either a [`RawResponse`] or a
//! tagged [`TransportError`]. The tag decides whether the attempt is retried.

use crate::config::BackendConfig;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect::Policy;
use reqwest::Method;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Request correlation ID header
pub const X_REQUEST_ID: &str = "X-Request-ID";

/// Redirects followed before the request fails as a redirect loop
const MAX_REDIRECTS: usize = 10;

/// Failure classes a transport can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// Connection could not be established, or was reset
    Connection,
    /// Secure-transport negotiation failed
    Tls,
    /// Connect or read timeout
    Timeout,
    /// Too many redirects
    Redirect,
    /// Generic HTTP-layer protocol error
    Protocol,
    /// The request was malformed before it was sent
    InvalidRequest,
    /// The response body could not be decoded
    Decode,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connection => "connection",
            Self::Tls => "tls",
            Self::Timeout => "timeout",
            Self::Redirect => "redirect",
            Self::Protocol => "protocol",
            Self::InvalidRequest => "invalid request",
            Self::Decode => "decode",
        };
        f.write_str(name)
    }
}

/// A single failed transport attempt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} failure: {message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
}

impl TransportError {
    /// Create a transport error of the given kind
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The failure class
    #[must_use]
    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    /// Human-readable detail
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether an immediate retry may succeed
    ///
    /// Only connection-level failures qualify; everything else is
    /// deterministic and fails fast.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.kind == TransportErrorKind::Connection
    }

    /// Classify a `reqwest` failure
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        let kind = if err.is_builder() {
            TransportErrorKind::InvalidRequest
        } else if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_redirect() {
            TransportErrorKind::Redirect
        } else if err.is_decode() || err.is_body() {
            TransportErrorKind::Decode
        } else if err.is_connect() {
            if mentions_tls(err) {
                TransportErrorKind::Tls
            } else {
                TransportErrorKind::Connection
            }
        } else if is_protocol_violation(err) {
            TransportErrorKind::Protocol
        } else if err.is_request() {
            TransportErrorKind::Connection
        } else {
            TransportErrorKind::Protocol
        };

        Self::new(kind, error_chain(err))
    }
}

/// Check the error's sources for a TLS negotiation failure
///
/// The top-level message is skipped since it embeds the request URL. rustls
/// reports a peer that does not speak TLS as `InvalidData`.
fn mentions_tls(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut source = err.source();
    while let Some(inner) = source {
        let invalid_data = inner
            .downcast_ref::<std::io::Error>()
            .is_some_and(|io| io.kind() == std::io::ErrorKind::InvalidData);
        let text = inner.to_string().to_lowercase();
        if invalid_data
            || ["certificate", "tls", "ssl", "handshake"]
                .iter()
                .any(|needle| text.contains(needle))
        {
            return true;
        }
        source = inner.source();
    }
    false
}

/// Whether hyper rejected the exchange as malformed HTTP
///
/// reqwest files these under its request kind alongside dropped sockets.
/// Parse and misuse errors are deterministic; closed or truncated
/// connections are not, and stay connection failures.
fn is_protocol_violation(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut source = err.source();
    while let Some(inner) = source {
        if let Some(hyper_err) = inner.downcast_ref::<hyper::Error>() {
            return hyper_err.is_parse() || hyper_err.is_user();
        }
        source = inner.source();
    }
    false
}

/// Flatten an error and its sources into one line
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        out.push_str(": ");
        out.push_str(&inner.to_string());
        source = inner.source();
    }
    out
}

/// Body of an outbound request
#[derive(Debug, Clone, Copy)]
pub enum RequestBody<'a> {
    /// No body
    Empty,
    /// Form-encoded fields
    Form(&'a [(String, String)]),
    /// Structured JSON payload
    Json(&'a Value),
}

/// One outbound call as seen by a transport
#[derive(Debug, Clone, Copy)]
pub struct TransportRequest<'a> {
    /// HTTP method
    pub method: &'a Method,
    /// Fully built URL
    pub url: &'a str,
    /// Ordered query parameters
    pub query: &'a [(String, String)],
    /// Extra headers
    pub headers: &'a BTreeMap<String, String>,
    /// Request body
    pub body: RequestBody<'a>,
    /// Correlation id, stable across retries of one logical request
    pub request_id: &'a str,
}

/// Status code plus raw body bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    status: u16,
    body: Vec<u8>,
}

impl RawResponse {
    /// Create a raw response
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// HTTP status code
    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Raw body bytes
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// A live transport session
pub trait Transport: Send {
    /// Send one request and wait for the full response
    fn send(&self, request: &TransportRequest<'_>) -> Result<RawResponse, TransportError>;

    /// Release the session's resources
    fn close(self)
    where
        Self: Sized,
    {
    }
}

/// Opens fresh transport sessions
pub trait TransportFactory: Send {
    /// Session type produced by this factory
    type Handle: Transport;

    /// Open a new session
    fn open(&self) -> Result<Self::Handle, TransportError>;
}

/// Blocking `reqwest` session
#[derive(Debug)]
pub struct ReqwestTransport {
    inner: Client,
}

impl Transport for ReqwestTransport {
    fn send(&self, request: &TransportRequest<'_>) -> Result<RawResponse, TransportError> {
        let headers = header_map(request.headers)?;

        let mut builder = self
            .inner
            .request(request.method.clone(), request.url)
            .headers(headers)
            .header(X_REQUEST_ID, request.request_id);

        if !request.query.is_empty() {
            builder = builder.query(request.query);
        }

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Form(fields) => builder.form(fields),
            RequestBody::Json(payload) => builder.json(payload),
        };

        let response = builder.send().map_err(|e| TransportError::from_reqwest(&e))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .map_err(|e| TransportError::from_reqwest(&e))?;

        Ok(RawResponse::new(status, body.to_vec()))
    }

    fn close(self) {
        debug!("Closing HTTP session");
        drop(self.inner);
    }
}

/// Convert header pairs, rejecting names or values that cannot be sent
fn header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap, TransportError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            TransportError::new(
                TransportErrorKind::InvalidRequest,
                format!("invalid header name {name:?}: {e}"),
            )
        })?;
        let value = HeaderValue::from_str(value).map_err(|e| {
            TransportError::new(
                TransportErrorKind::InvalidRequest,
                format!("invalid value for header {name}: {e}"),
            )
        })?;
        map.insert(name, value);
    }
    Ok(map)
}

/// Opens blocking `reqwest` sessions with the configured timeouts
#[derive(Debug, Clone)]
pub struct ReqwestTransportFactory {
    timeout: Duration,
    connect_timeout: Duration,
    user_agent: String,
}

impl ReqwestTransportFactory {
    /// Build a factory from backend configuration
    #[must_use]
    pub fn from_config(config: &BackendConfig) -> Self {
        Self {
            timeout: config.timeout,
            connect_timeout: config.connect_timeout,
            user_agent: config.user_agent.clone(),
        }
    }
}

impl TransportFactory for ReqwestTransportFactory {
    type Handle = ReqwestTransport;

    fn open(&self) -> Result<ReqwestTransport, TransportError> {
        let inner = Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(self.user_agent.clone())
            .redirect(Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| {
                TransportError::new(
                    TransportErrorKind::Connection,
                    format!("failed to open HTTP session: {}", error_chain(&e)),
                )
            })?;

        Ok(ReqwestTransport { inner })
    }
}
