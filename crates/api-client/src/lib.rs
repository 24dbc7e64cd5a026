//! Resilient HTTP backend-access layer
//!
//! This crate lets several backend-specific clients share one implementation
//! of connection lifecycle, URL construction, retry policy, and error
//! handling. A concrete backend supplies only its base address and endpoint
//! semantics.
//!
//! # Features
//!
//! - **Self-recycling connections**: HTTP sessions idle for longer than a
//!   configurable age are closed and reopened before use
//! - **Bounded immediate retry**: connection-level failures are retried up to
//!   each request's budget; everything else fails fast
//! - **Closed error taxonomy**: every failure is one of six [`ErrorKind`]s
//! - **One instance per backend type**: backends are created once per process
//!   and shared through factories and adapters
//! - **Request correlation**: each logical request carries an `X-Request-ID`
//!
//! # Example
//!
//! ```rust,no_run
//! use appnexus_api_client::prelude::*;
//! use appnexus_api_client::endpoints::{RecommendationsAdapter, RecommendationsBackendFactory};
//! use serde_json::json;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads RECOMMENDATIONS_URL and friends from the environment
//!     let adapter = RecommendationsAdapter::from_factory(&RecommendationsBackendFactory::new())?
//!         .with_max_retries(3);
//!
//!     let response = adapter.embed_topics(json!({"topics": []}))?;
//!     println!("Embedded with status {}", response.status_code());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod adapter;
pub mod config;
pub mod connection;
pub mod endpoints;
pub mod error;
pub mod registry;
pub mod request;
pub mod response;
pub mod service;
pub mod transport;

pub use adapter::{Adapter, BackendFactory};
pub use config::BackendConfig;
pub use connection::ManagedConnection;
pub use error::{BackendError, BackendResult, ErrorKind};
pub use request::RequestDescriptor;
pub use reqwest::Method;
pub use response::ResponseEnvelope;
pub use service::{build_full_url, BackendCore, BackendService, BackendType};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::adapter::{Adapter, BackendFactory};
    pub use crate::config::BackendConfig;
    pub use crate::error::{BackendError, BackendResult, ErrorKind};
    pub use crate::request::RequestDescriptor;
    pub use crate::response::ResponseEnvelope;
    pub use crate::service::{BackendCore, BackendService, BackendType};
    pub use reqwest::Method;
}
