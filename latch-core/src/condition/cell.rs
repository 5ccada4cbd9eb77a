//! Condition Implementation
//!
//! A Condition is a boolean cell that notifies observers on edges only.
//!
//! # How Conditions Work
//!
//! 1. A condition starts deactivated (`false`).
//!
//! 2. `activate()` and `deactivate()` set the state. Listeners fire only when
//!    the state actually flips; repeating the current state is a no-op.
//!
//! 3. Listeners fire synchronously, in registration order, on the thread
//!    that caused the edge. The set of listeners is captured when the edge
//!    happens, so a listener detached (or a cleanup performed) during
//!    dispatch takes effect from the next edge on.
//!
//! 4. `cleanup()` drops every listener and, for conditions driven by a
//!    background poller, raises the stop signal that ends the poller.
//!
//! # Thread Safety
//!
//! A `Condition` is a handle around `Arc`-shared state. Clones observe the
//! same cell. No lock is held while listeners run, so a listener may freely
//! read or mutate the condition it is attached to.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::watch;

use super::listener::{self, Detach, Listener, Registry, SharedRegistry};

/// Counter for generating unique condition IDs.
static CONDITION_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_condition_id() -> u64 {
    CONDITION_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

struct Inner {
    id: u64,

    /// Current activation state.
    activated: Mutex<bool>,

    /// Fired on false -> true.
    on_activated: SharedRegistry,

    /// Fired on true -> false.
    on_deactivated: SharedRegistry,

    /// Stop signal for a background poller, if one is attached.
    stop: Mutex<Option<watch::Sender<bool>>>,
}

/// An edge-triggered boolean state.
///
/// # Example
///
/// ```rust
/// use latch_core::Condition;
///
/// let door_open = Condition::new();
/// let handle = door_open.on_activated(|| println!("door opened"));
///
/// door_open.activate(); // prints once
/// door_open.activate(); // already active: nothing happens
///
/// handle.detach();
/// door_open.cleanup();
/// ```
#[derive(Clone)]
pub struct Condition {
    inner: Arc<Inner>,
}

impl Condition {
    /// Create a new, deactivated condition.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                id: next_condition_id(),
                activated: Mutex::new(false),
                on_activated: Arc::new(Mutex::new(Registry::new())),
                on_deactivated: Arc::new(Mutex::new(Registry::new())),
                stop: Mutex::new(None),
            }),
        }
    }

    /// Get the condition's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Set the state to `true`, firing activation listeners on a change.
    pub fn activate(&self) {
        self.set_activated(true);
    }

    /// Set the state to `false`, firing deactivation listeners on a change.
    pub fn deactivate(&self) {
        self.set_activated(false);
    }

    /// Set the state, firing the matching listeners if it changed.
    pub fn set_activated(&self, target: bool) {
        let listeners = {
            let mut activated = self.inner.activated.lock();
            if *activated == target {
                return;
            }
            *activated = target;

            let registry = if target {
                &self.inner.on_activated
            } else {
                &self.inner.on_deactivated
            };
            registry.lock().snapshot()
        };

        let edge = if target { "activated" } else { "deactivated" };
        tracing::trace!(condition = self.inner.id, edge, listeners = listeners.len(), "edge");
        listener::dispatch(&listeners, edge);
    }

    /// Current state.
    pub fn is_activated(&self) -> bool {
        *self.inner.activated.lock()
    }

    /// Register a callback for false -> true edges.
    pub fn on_activated<F>(&self, callback: F) -> Detach
    where
        F: Fn() + Send + Sync + 'static,
    {
        listener::attach(&self.inner.on_activated, Arc::new(callback) as Listener)
    }

    /// Register a callback for true -> false edges.
    pub fn on_deactivated<F>(&self, callback: F) -> Detach
    where
        F: Fn() + Send + Sync + 'static,
    {
        listener::attach(&self.inner.on_deactivated, Arc::new(callback) as Listener)
    }

    /// Drop every listener and stop any attached poller.
    ///
    /// Cleanup is global to the condition: it removes listeners registered
    /// by every observer, not only the caller's. Calling it again is a no-op.
    pub fn cleanup(&self) {
        self.inner.on_activated.lock().clear();
        self.inner.on_deactivated.lock().clear();

        if let Some(stop) = self.inner.stop.lock().as_ref() {
            if !stop.send_replace(true) {
                tracing::debug!(condition = self.inner.id, "poller stop requested");
            }
        }
    }

    /// Number of registered listeners, both edges combined.
    pub fn listener_count(&self) -> usize {
        self.inner.on_activated.lock().len() + self.inner.on_deactivated.lock().len()
    }

    /// Returns true if both handles point at the same condition.
    pub fn ptr_eq(&self, other: &Condition) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Create a non-owning handle.
    pub fn downgrade(&self) -> WeakCondition {
        WeakCondition {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Subscribe to this condition's stop signal, creating it on first use.
    ///
    /// The receiver reads `true` once `cleanup()` has been called.
    pub(crate) fn stop_signal(&self) -> watch::Receiver<bool> {
        let mut stop = self.inner.stop.lock();
        match stop.as_ref() {
            Some(sender) => sender.subscribe(),
            None => {
                let (sender, receiver) = watch::channel(false);
                *stop = Some(sender);
                receiver
            }
        }
    }
}

impl Default for Condition {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Condition")
            .field("id", &self.inner.id)
            .field("activated", &self.is_activated())
            .field("listener_count", &self.listener_count())
            .finish()
    }
}

/// A non-owning [`Condition`] handle.
///
/// Background pollers hold one of these so that dropping every user handle
/// lets the condition go away.
#[derive(Clone, Debug)]
pub struct WeakCondition {
    inner: Weak<Inner>,
}

impl WeakCondition {
    /// Recover a strong handle if the condition is still alive.
    pub fn upgrade(&self) -> Option<Condition> {
        self.inner.upgrade().map(|inner| Condition { inner })
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
