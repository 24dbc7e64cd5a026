//! Process-wide registry of backend instances
//!
//! One slot per concrete backend type, keyed by `TypeId`. Each slot is a
//! construct-once cell, so racing first calls for the same type build exactly
//! one instance, and a failed construction leaves the slot empty for the next
//! caller. The registry lock is held only to find the slot, never while a
//! backend is being constructed.

use crate::error::{BackendError, BackendResult};
use once_cell::sync::{Lazy, OnceCell};
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

type Instance = Arc<dyn Any + Send + Sync>;
type Slot = Arc<OnceCell<Instance>>;

static REGISTRY: Lazy<Mutex<HashMap<TypeId, Slot>>> = Lazy::new(|| Mutex::new(HashMap::new()));

fn slot_for<B: 'static>() -> Slot {
    let mut slots = REGISTRY.lock().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(slots.entry(TypeId::of::<B>()).or_default())
}

/// Return the registered `B`, building it with `create` if there is none
pub(crate) fn get_or_create<B>(create: impl FnOnce() -> BackendResult<B>) -> BackendResult<Arc<B>>
where
    B: Send + Sync + 'static,
{
    let slot = slot_for::<B>();
    let instance = slot.get_or_try_init(|| {
        debug!(backend = type_name::<B>(), "Creating backend instance");
        create().map(|backend| Arc::new(backend) as Instance)
    })?;

    Arc::clone(instance).downcast::<B>().map_err(|_| {
        BackendError::not_implemented(format!(
            "registry slot for {} holds another type",
            type_name::<B>()
        ))
    })
}

/// Whether an instance of `B` has been created
#[must_use]
pub fn is_registered<B: 'static>() -> bool {
    REGISTRY
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&TypeId::of::<B>())
        .is_some_and(|slot| slot.get().is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    struct Counter(usize);

    static BUILT: AtomicUsize = AtomicUsize::new(0);

    #[test]
    fn test_concurrent_first_calls_build_once() {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                thread::spawn(|| {
                    get_or_create(|| Ok(Counter(BUILT.fetch_add(1, Ordering::SeqCst)))).unwrap()
                })
            })
            .collect();

        let instances: Vec<Arc<Counter>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(BUILT.load(Ordering::SeqCst), 1);
        assert!(instances.iter().all(|i| Arc::ptr_eq(i, &instances[0])));
        assert_eq!(instances[0].0, 0);
    }

    #[test]
    fn test_failed_creation_leaves_slot_empty() {
        struct Flaky;

        let err = get_or_create::<Flaky>(|| Err(BackendError::not_implemented("nope")))
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::NotImplemented);
        assert!(!is_registered::<Flaky>());

        assert!(get_or_create(|| Ok(Flaky)).is_ok());
        assert!(is_registered::<Flaky>());
    }

    #[test]
    fn test_types_get_separate_slots() {
        struct Left(u8);
        struct Right(u8);

        let left = get_or_create(|| Ok(Left(1))).unwrap();
        let right = get_or_create(|| Ok(Right(2))).unwrap();
        assert_eq!(left.0, 1);
        assert_eq!(right.0, 2);
    }
}
