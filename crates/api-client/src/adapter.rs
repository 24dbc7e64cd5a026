//! Factory and adapter seams
//!
//! Callers never construct a backend directly. They ask a [`BackendFactory`]
//! for one, wrap it in an [`Adapter`], and build domain operations on top.

use crate::error::BackendResult;
use crate::service::BackendService;
use std::sync::Arc;

/// Produces the backend a caller should use
pub trait BackendFactory {
    /// Backend handed out by this factory
    type Backend: BackendService + ?Sized;

    /// Create (or look up) the backend
    fn create_backend(&self) -> BackendResult<Arc<Self::Backend>>;
}

/// Holds a backend for domain-specific adapters to build on
pub struct Adapter<B: BackendService + ?Sized = dyn BackendService> {
    backend: Arc<B>,
}

impl<B: BackendService + ?Sized> Adapter<B> {
    /// Wrap a backend
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Wrap whatever `factory` produces
    pub fn from_factory<F>(factory: &F) -> BackendResult<Self>
    where
        F: BackendFactory<Backend = B>,
    {
        factory.create_backend().map(Self::new)
    }

    /// The wrapped backend
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: BackendService + ?Sized> Clone for Adapter<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use crate::request::RequestDescriptor;
    use crate::response::ResponseEnvelope;
    use crate::service::BackendType;
    use serde_json::Map;

    struct StubBackend;

    impl BackendService for StubBackend {
        fn connect(&self) -> bool {
            true
        }

        fn make_request(&self, request: &mut RequestDescriptor) -> BackendResult<ResponseEnvelope> {
            let mut fields = Map::new();
            fields.insert("path".to_string(), request.path().into());
            Ok(ResponseEnvelope::new(fields, 200))
        }
    }

    impl BackendType for StubBackend {
        type Args = ();

        fn create_instance((): ()) -> BackendResult<Self> {
            Ok(Self)
        }
    }

    struct StubFactory;

    impl BackendFactory for StubFactory {
        type Backend = StubBackend;

        fn create_backend(&self) -> BackendResult<Arc<StubBackend>> {
            StubBackend::get_instance(())
        }
    }

    struct ErasedFactory;

    impl BackendFactory for ErasedFactory {
        type Backend = dyn BackendService;

        fn create_backend(&self) -> BackendResult<Arc<dyn BackendService>> {
            Err(BackendError::not_implemented("no backend configured"))
        }
    }

    #[test]
    fn test_adapter_holds_the_factory_backend() {
        let adapter = Adapter::from_factory(&StubFactory).unwrap();
        let same = StubFactory.create_backend().unwrap();

        assert!(std::ptr::eq(adapter.backend(), same.as_ref()));
        assert!(adapter.backend().connect());
    }

    #[test]
    fn test_type_erased_adapter() {
        let backend: Arc<dyn BackendService> = StubBackend::get_instance(()).unwrap();
        let adapter: Adapter = Adapter::new(backend);

        let mut request = RequestDescriptor::get("/info");
        let envelope = adapter.clone().backend().make_request(&mut request).unwrap();
        assert_eq!(envelope.get("path"), Some(&serde_json::json!("/info")));
    }

    #[test]
    fn test_factory_errors_propagate() {
        let err = Adapter::from_factory(&ErasedFactory).err().unwrap();
        assert!(err.to_string().contains("no backend configured"));
    }
}
