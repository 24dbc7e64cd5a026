//! Recommendations service endpoints
//!
//! Maps to the embeddings/recommendations service:
//! - `POST /embed-topics`: embed a topic tree
//! - `POST /embed-content`: embed content resources
//! - `POST /recommendations`: recommend content for an embedding
//! - `GET /status`: reachability probe used by `connect`

use crate::adapter::{Adapter, BackendFactory};
use crate::config::BackendConfig;
use crate::error::{BackendError, BackendResult};
use crate::request::RequestDescriptor;
use crate::response::ResponseEnvelope;
use crate::service::{BackendCore, BackendService, BackendType};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

/// Environment variable prefix, e.g. `RECOMMENDATIONS_URL`
pub const ENV_PREFIX: &str = "RECOMMENDATIONS";

const EMBED_TOPICS_PATH: &str = "/embed-topics";
const EMBED_CONTENT_PATH: &str = "/embed-content";
const RECOMMENDATIONS_PATH: &str = "/recommendations";

/// Recommendations backend
pub struct RecommendationsBackend {
    core: BackendCore,
}

impl RecommendationsBackend {
    /// Shared request machinery
    #[must_use]
    pub fn core(&self) -> &BackendCore {
        &self.core
    }
}

impl BackendService for RecommendationsBackend {
    fn connect(&self) -> bool {
        self.core.connect()
    }

    fn make_request(&self, request: &mut RequestDescriptor) -> BackendResult<ResponseEnvelope> {
        self.core.make_request(request)
    }
}

impl BackendType for RecommendationsBackend {
    type Args = BackendConfig;

    fn create_instance(config: BackendConfig) -> BackendResult<Self> {
        Ok(Self {
            core: BackendCore::from_config(&config)?,
        })
    }
}

/// Hands out the recommendations backend
///
/// Configuration is read from the environment unless one is supplied, and
/// only when the backend has not been created yet.
#[derive(Debug, Clone, Default)]
pub struct RecommendationsBackendFactory {
    config: Option<BackendConfig>,
}

impl RecommendationsBackendFactory {
    /// Factory that reads `RECOMMENDATIONS_*` environment variables
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory with explicit configuration
    #[must_use]
    pub fn with_config(config: BackendConfig) -> Self {
        Self {
            config: Some(config),
        }
    }
}

impl BackendFactory for RecommendationsBackendFactory {
    type Backend = RecommendationsBackend;

    fn create_backend(&self) -> BackendResult<Arc<RecommendationsBackend>> {
        RecommendationsBackend::get_instance_with(|| match &self.config {
            Some(config) => Ok(config.clone()),
            None => BackendConfig::from_env(ENV_PREFIX),
        })
    }
}

/// Domain operations on the recommendations backend
#[derive(Clone)]
pub struct RecommendationsAdapter {
    adapter: Adapter,
    max_retries: u32,
}

impl RecommendationsAdapter {
    /// Wrap a backend
    pub fn new(backend: Arc<dyn BackendService>) -> Self {
        Self {
            adapter: Adapter::new(backend),
            max_retries: 1,
        }
    }

    /// Wrap the backend produced by `factory`
    pub fn from_factory<F>(factory: &F) -> BackendResult<Self>
    where
        F: BackendFactory,
        F::Backend: Sized,
    {
        let backend: Arc<dyn BackendService> = factory.create_backend()?;
        Ok(Self::new(backend))
    }

    /// Attempt budget for every request this adapter sends
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// The wrapped backend
    #[must_use]
    pub fn backend(&self) -> &dyn BackendService {
        self.adapter.backend()
    }

    /// Embed a topic tree
    ///
    /// POST /embed-topics
    pub fn embed_topics(&self, topics: Value) -> BackendResult<ResponseEnvelope> {
        self.ensure_connected(EMBED_TOPICS_PATH)?;
        self.post(EMBED_TOPICS_PATH, topics)
    }

    /// Embed content resources
    ///
    /// POST /embed-content
    pub fn embed_content(&self, resources: Vec<Value>) -> BackendResult<ResponseEnvelope> {
        self.ensure_connected(EMBED_CONTENT_PATH)?;
        self.post(
            EMBED_CONTENT_PATH,
            json!({
                "resources": resources,
                "metadata": {},
            }),
        )
    }

    /// Recommend content for an embedding
    ///
    /// POST /recommendations
    pub fn get_recommendations(&self, embedding: Value) -> BackendResult<ResponseEnvelope> {
        self.post(RECOMMENDATIONS_PATH, json!({ "embedding": embedding }))
    }

    fn ensure_connected(&self, path: &str) -> BackendResult<()> {
        if self.backend().connect() {
            Ok(())
        } else {
            warn!(path, "Recommendations backend unreachable");
            Err(BackendError::connection(
                path,
                0,
                "Connection to the backend failed",
            ))
        }
    }

    fn post(&self, path: &str, payload: Value) -> BackendResult<ResponseEnvelope> {
        let mut request = RequestDescriptor::post(path)
            .with_json(payload)
            .with_max_retries(self.max_retries);
        self.backend().make_request(&mut request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::registry::is_registered;
    use reqwest::Method;
    use serde_json::Map;
    use std::sync::Mutex;

    /// Records every request and answers with the request body echoed back
    struct RecordingBackend {
        reachable: bool,
        seen: Mutex<Vec<(Method, String, Option<Value>, u32)>>,
    }

    impl RecordingBackend {
        fn new(reachable: bool) -> Arc<Self> {
            Arc::new(Self {
                reachable,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    impl BackendService for RecordingBackend {
        fn connect(&self) -> bool {
            self.reachable
        }

        fn make_request(&self, request: &mut RequestDescriptor) -> BackendResult<ResponseEnvelope> {
            self.seen.lock().unwrap().push((
                request.method().clone(),
                request.path().to_string(),
                request.json().cloned(),
                request.max_retries(),
            ));
            let mut fields = Map::new();
            fields.insert("echo".to_string(), request.json().cloned().unwrap_or_default());
            Ok(ResponseEnvelope::new(fields, 200))
        }
    }

    #[test]
    fn test_embed_topics_posts_json() {
        let backend = RecordingBackend::new(true);
        let adapter = RecommendationsAdapter::new(backend.clone()).with_max_retries(3);

        let topics = json!({"topics": [{"id": "t1", "title": "Algebra"}]});
        let envelope = adapter.embed_topics(topics.clone()).unwrap();

        assert_eq!(envelope.get("echo"), Some(&topics));
        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, Method::POST);
        assert_eq!(seen[0].1, "/embed-topics");
        assert_eq!(seen[0].3, 3);
    }

    #[test]
    fn test_embed_content_wraps_resources() {
        let backend = RecordingBackend::new(true);
        let adapter = RecommendationsAdapter::new(backend.clone());

        adapter.embed_content(vec![json!({"id": "c1"})]).unwrap();

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen[0].1, "/embed-content");
        assert_eq!(
            seen[0].2,
            Some(json!({"resources": [{"id": "c1"}], "metadata": {}}))
        );
    }

    #[test]
    fn test_unreachable_backend_fails_before_sending() {
        let backend = RecordingBackend::new(false);
        let adapter = RecommendationsAdapter::new(backend.clone());

        let err = adapter.embed_topics(json!({})).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Connection);
        let msg = err.to_string();
        assert!(msg.contains("Connection to the backend failed"));
        assert!(!msg.contains("attempt(s)"));
        assert!(backend.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_recommendations_skip_connect_check() {
        let backend = RecordingBackend::new(false);
        let adapter = RecommendationsAdapter::new(backend.clone());

        adapter.get_recommendations(json!([0.1, 0.2])).unwrap();

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen[0].1, "/recommendations");
        assert_eq!(seen[0].2, Some(json!({"embedding": [0.1, 0.2]})));
    }

    #[test]
    fn test_backend_is_a_singleton() {
        let first = RecommendationsBackendFactory::with_config(
            BackendConfig::new("http://127.0.0.1:1").with_url_prefix("/v1/"),
        )
        .create_backend()
        .unwrap();
        assert!(is_registered::<RecommendationsBackend>());

        let second = RecommendationsBackend::get_instance(
            BackendConfig::new("http://127.0.0.1:2").with_url_prefix("/v2/"),
        )
        .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.core().url_prefix(), "/v1/");
        assert_eq!(second.core().base_url(), "http://127.0.0.1:1");

        // Config is never consulted once the instance exists
        let third = RecommendationsBackendFactory::new().create_backend().unwrap();
        assert!(Arc::ptr_eq(&first, &third));

        let adapter = RecommendationsAdapter::from_factory(&RecommendationsBackendFactory::new());
        assert!(adapter.is_ok());
    }
}
