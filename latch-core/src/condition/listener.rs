//! Listener registries and dispatch.
//!
//! Every callback attached to a condition (or to an emitter) lives in a
//! [`Registry`]: an insertion-ordered map keyed by the [`ListenerId`] handed
//! out at registration time. Removing by token means two registrations of
//! the same closure stay independent, and detaching never has to compare
//! closures.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use smallvec::SmallVec;

/// A callback fired on an edge.
pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// Position of a listener in the registry that issued it.
///
/// Only meaningful together with that registry. A registry never hands the
/// same value out twice, even after it has been cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Ordered set of listeners.
#[derive(Default)]
pub(crate) struct Registry {
    next_seq: u64,
    entries: IndexMap<ListenerId, Listener>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append a listener, returning its token.
    pub(crate) fn insert(&mut self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_seq);
        self.next_seq += 1;
        self.entries.insert(id, listener);
        id
    }

    /// Remove a listener. Returns false if it was already gone.
    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        self.entries.shift_remove(&id).is_some()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Copy the current listeners out so they can be called without holding
    /// the lock that guards this registry.
    pub(crate) fn snapshot(&self) -> SmallVec<[Listener; 4]> {
        self.entries.values().cloned().collect()
    }
}

/// A registry shared between its owner and the [`Detach`] handles it hands out.
pub(crate) type SharedRegistry = Arc<Mutex<Registry>>;

/// Handle returned by listener registration.
///
/// Calling [`detach`](Detach::detach) removes exactly the listener it was
/// issued for. It is idempotent and harmless after the registry was cleared
/// or its owner dropped. Dropping the handle does NOT detach.
#[derive(Debug, Clone)]
pub struct Detach {
    registry: Weak<Mutex<Registry>>,
    id: ListenerId,
}

impl Detach {
    pub(crate) fn new(registry: &SharedRegistry, id: ListenerId) -> Self {
        Self {
            registry: Arc::downgrade(registry),
            id,
        }
    }

    /// The token of the listener this handle removes.
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Remove the listener.
    pub fn detach(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().remove(self.id);
        }
    }
}

/// Register `listener` on a shared registry.
pub(crate) fn attach(registry: &SharedRegistry, listener: Listener) -> Detach {
    let id = registry.lock().insert(listener);
    Detach::new(registry, id)
}

/// Invoke every listener in order.
///
/// A panicking listener is logged and skipped; the rest still run and the
/// panic never reaches the caller.
pub(crate) fn dispatch(listeners: &[Listener], edge: &'static str) {
    for listener in listeners {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| listener())) {
            tracing::warn!(edge, reason = panic_message(&*payload), "listener panicked");
        }
    }
}

/// Best-effort extraction of a panic payload's message.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn tokens_increase_and_survive_clear() {
        let mut registry = Registry::new();
        let before: Vec<_> = (0..3).map(|_| registry.insert(Arc::new(|| {}))).collect();
        assert!(before.windows(2).all(|pair| pair[0] < pair[1]));

        registry.clear();
        let after = registry.insert(Arc::new(|| {}));
        assert!(before.iter().all(|stale| *stale < after));

        // A token issued before the clear cannot remove the new listener.
        assert!(!registry.remove(before[0]));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn snapshot_preserves_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut registry = Registry::new();

        for n in 0..3 {
            let order = order.clone();
            registry.insert(Arc::new(move || order.lock().push(n)));
        }

        dispatch(&registry.snapshot(), "test");
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn remove_is_by_token() {
        let mut registry = Registry::new();
        let listener: Listener = Arc::new(|| {});

        let first = registry.insert(listener.clone());
        let second = registry.insert(listener);
        assert_eq!(registry.len(), 2);

        assert!(registry.remove(first));
        assert!(!registry.remove(first));
        assert_eq!(registry.len(), 1);

        assert!(registry.remove(second));
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn detach_is_idempotent() {
        let registry: SharedRegistry = Arc::new(Mutex::new(Registry::new()));
        let keep = attach(&registry, Arc::new(|| {}));
        let handle = attach(&registry, Arc::new(|| {}));

        handle.detach();
        handle.detach();
        assert_eq!(registry.lock().len(), 1);

        registry.lock().clear();
        keep.detach();
        assert_eq!(registry.lock().len(), 0);
    }

    #[test]
    fn detach_after_owner_dropped_is_harmless() {
        let registry: SharedRegistry = Arc::new(Mutex::new(Registry::new()));
        let handle = attach(&registry, Arc::new(|| {}));

        drop(registry);
        handle.detach();
    }

    #[test]
    fn dispatch_survives_panicking_listener() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let failing: Listener = Arc::new(|| panic!("observer failure"));
        let counting: Listener = Arc::new(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        dispatch(&[failing, counting], "test");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
