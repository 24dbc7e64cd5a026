//! Backend service capability and its shared implementation
//!
//! A concrete backend is a type that implements [`BackendService`] (what
//! callers can do with it) and [`BackendType`] (how its single instance is
//! built). The request machinery lives in [`BackendCore`]; backends own one
//! and forward to it explicitly.
//!
//! ```rust,no_run
//! use appnexus_api_client::prelude::*;
//!
//! struct Catalog {
//!     core: BackendCore,
//! }
//!
//! impl BackendService for Catalog {
//!     fn connect(&self) -> bool {
//!         self.core.connect()
//!     }
//!
//!     fn make_request(&self, request: &mut RequestDescriptor) -> BackendResult<ResponseEnvelope> {
//!         self.core.make_request(request)
//!     }
//! }
//!
//! impl BackendType for Catalog {
//!     type Args = BackendConfig;
//!
//!     fn create_instance(config: BackendConfig) -> BackendResult<Self> {
//!         Ok(Self { core: BackendCore::from_config(&config)? })
//!     }
//! }
//!
//! # fn main() -> BackendResult<()> {
//! let catalog = Catalog::get_instance(BackendConfig::new("https://catalog.example.com"))?;
//! let mut request = RequestDescriptor::get("/items").with_max_retries(3);
//! let items = catalog.make_request(&mut request)?;
//! println!("status {}", items.status_code());
//! # Ok(())
//! # }
//! ```

use crate::config::BackendConfig;
use crate::connection::ManagedConnection;
use crate::error::{BackendError, BackendResult};
use crate::registry;
use crate::request::RequestDescriptor;
use crate::response::ResponseEnvelope;
use crate::transport::{
    RawResponse, ReqwestTransportFactory, Transport, TransportError, TransportFactory,
};
use serde_json::Value;
use std::any::type_name;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// What callers can do with a backend
pub trait BackendService: Send + Sync + 'static {
    /// Probe the backend; never fails, only reports reachability
    fn connect(&self) -> bool;

    /// Send `request` and return the structured response
    fn make_request(&self, request: &mut RequestDescriptor) -> BackendResult<ResponseEnvelope>;
}

/// How a backend's single process-wide instance is created
pub trait BackendType: BackendService + Sized {
    /// Construction arguments
    type Args;

    /// Build a fresh instance
    ///
    /// Backends must override this; the default reports the omission.
    fn create_instance(_args: Self::Args) -> BackendResult<Self> {
        Err(BackendError::not_implemented(format!(
            "{} does not implement create_instance",
            type_name::<Self>()
        )))
    }

    /// Return the instance for this type, creating it on first use
    ///
    /// Later calls return the original instance and ignore `args`.
    fn get_instance(args: Self::Args) -> BackendResult<Arc<Self>> {
        registry::get_or_create(|| Self::create_instance(args))
    }

    /// Like [`get_instance`](Self::get_instance), producing `args` only if
    /// the instance has to be built
    fn get_instance_with<A>(args: A) -> BackendResult<Arc<Self>>
    where
        A: FnOnce() -> BackendResult<Self::Args>,
    {
        registry::get_or_create(|| Self::create_instance(args()?))
    }
}

/// Join base URL, prefix, and path, dropping empty segments
#[must_use]
pub fn build_full_url(base_url: &str, url_prefix: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let prefix = url_prefix.trim_matches('/');
    let path = path.trim_start_matches('/');

    [base, prefix, path]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Shared request machinery owned by every backend
///
/// The connection sits behind a mutex that a dispatch holds for its whole
/// retry loop, so one logical request at a time runs per backend.
pub struct BackendCore<F: TransportFactory = ReqwestTransportFactory> {
    base_url: String,
    url_prefix: String,
    connect_endpoint: String,
    connection: Mutex<ManagedConnection<F>>,
}

impl BackendCore<ReqwestTransportFactory> {
    /// Create a core backed by a blocking `reqwest` session
    pub fn from_config(config: &BackendConfig) -> BackendResult<Self> {
        config.validate()?;
        Self::new(
            &config.base_url,
            &config.url_prefix,
            &config.connect_endpoint,
            ReqwestTransportFactory::from_config(config),
            config.max_connection_age,
        )
    }
}

impl<F: TransportFactory> BackendCore<F> {
    /// Create a core over any transport factory
    pub fn new(
        base_url: impl Into<String>,
        url_prefix: impl Into<String>,
        connect_endpoint: impl Into<String>,
        factory: F,
        max_connection_age: Duration,
    ) -> BackendResult<Self> {
        let base_url = base_url.into();
        let connection = ManagedConnection::open(factory, max_connection_age).map_err(|e| {
            error!(url = %base_url, error = %e, "Failed to open connection");
            BackendError::from_transport(e, &base_url, 0)
        })?;

        Ok(Self {
            base_url,
            url_prefix: url_prefix.into(),
            connect_endpoint: connect_endpoint.into(),
            connection: Mutex::new(connection),
        })
    }

    /// Base URL of the backend
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Prefix inserted before every request path
    #[must_use]
    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    /// Endpoint probed by [`connect`](Self::connect)
    #[must_use]
    pub fn connect_endpoint(&self) -> &str {
        &self.connect_endpoint
    }

    /// Times the underlying session has been recycled
    #[must_use]
    pub fn connection_generation(&self) -> u64 {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generation()
    }

    /// Full URL for a request path
    #[must_use]
    pub fn build_full_url(&self, path: &str) -> String {
        build_full_url(&self.base_url, &self.url_prefix, path)
    }

    /// GET the connect endpoint; true only on a 200
    pub fn connect(&self) -> bool {
        let mut request = RequestDescriptor::get(self.connect_endpoint.clone());
        match self.dispatch(&mut request) {
            Ok(response) => response.status() == 200,
            Err(e) => {
                debug!(error = %e, "Backend unreachable");
                false
            }
        }
    }

    /// Dispatch `request` and parse the body as a JSON object
    pub fn make_request(&self, request: &mut RequestDescriptor) -> BackendResult<ResponseEnvelope> {
        let response = self.dispatch(request)?;

        match serde_json::from_slice::<Value>(response.body()) {
            Ok(Value::Object(fields)) => Ok(ResponseEnvelope::new(fields, response.status())),
            Ok(other) => {
                let url = self.build_full_url(request.path());
                error!(url = %url, "Response body is JSON but not an object");
                Err(BackendError::invalid_response(
                    url,
                    format!("expected a JSON object, got {}", json_type(&other)),
                ))
            }
            Err(e) => {
                let url = self.build_full_url(request.path());
                error!(url = %url, error = %e, "Response body is not valid JSON");
                Err(BackendError::invalid_response(url, e.to_string()))
            }
        }
    }

    /// Send `request`, retrying transient connection failures
    ///
    /// Retries are immediate. Every attempt advances
    /// `request.attempts_made()`; the loop ends at the first success, the
    /// first non-transient failure, or when the attempt budget is spent.
    /// A request dispatched again starts a fresh budget.
    pub fn dispatch(&self, request: &mut RequestDescriptor) -> BackendResult<RawResponse> {
        let request_id = Uuid::new_v4().to_string();
        if request.attempts_made() > 0 {
            debug!(
                request_id = %request_id,
                path = request.path(),
                previous_attempts = request.attempts_made(),
                "Request dispatched again, attempt count reset"
            );
            request.reset_attempts();
        }
        let mut connection = self
            .connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        loop {
            let url = self.build_full_url(request.path());
            request.record_attempt();

            let outcome: Result<RawResponse, TransportError> = connection
                .acquire_for_use()
                .and_then(|handle| handle.send(&request.to_transport(&url, &request_id)));

            match outcome {
                Ok(response) => {
                    debug!(
                        request_id = %request_id,
                        url = %url,
                        status = response.status(),
                        attempt = request.attempts_made(),
                        "Request completed"
                    );
                    return Ok(response);
                }
                Err(e) if e.is_transient() && !request.is_exhausted() => {
                    warn!(
                        request_id = %request_id,
                        url = %url,
                        attempt = request.attempts_made(),
                        max_retries = request.max_retries(),
                        error = %e,
                        "Connection error occurred, retrying"
                    );
                }
                Err(e) => {
                    error!(
                        request_id = %request_id,
                        url = %url,
                        attempt = request.attempts_made(),
                        max_retries = request.max_retries(),
                        error = %e,
                        "Request failed"
                    );
                    return Err(BackendError::from_transport(e, &url, request.attempts_made()));
                }
            }
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
