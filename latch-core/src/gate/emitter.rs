//! Emitter Implementation
//!
//! An Emitter is the continuous counterpart of an [`Action`](super::Action):
//! it tracks whether all of its conditions are active together and notifies
//! subscribers on every change of that aggregate.
//!
//! The aggregate is re-read from the conditions on every activation AND
//! deactivation edge of any of them. Subscribers only see aggregate edges,
//! so a condition that is re-confirmed on every poll tick produces a single
//! notification.
//!
//! An emitter never terminates on its own. Its owner must call
//! [`Emitter::cleanup`] once it is no longer needed.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::action::ActionOptions;
use crate::condition::listener::{self, Detach, Listener, Registry, SharedRegistry};
use crate::condition::Condition;

struct EmitterShared {
    conditions: Vec<Condition>,

    /// Aggregate state as of the last check.
    active: Mutex<bool>,

    on_active: SharedRegistry,
    on_inactive: SharedRegistry,
}

impl EmitterShared {
    fn all_active(&self) -> bool {
        self.conditions.iter().all(Condition::is_activated)
    }

    fn check(&self) {
        let (subscribers, edge) = {
            let mut active = self.active.lock();
            let now = self.all_active();
            if *active == now {
                return;
            }
            *active = now;

            if now {
                (self.on_active.lock().snapshot(), "active")
            } else {
                (self.on_inactive.lock().snapshot(), "inactive")
            }
        };

        tracing::trace!(edge, subscribers = subscribers.len(), "emitter edge");
        listener::dispatch(&subscribers, edge);
    }
}

/// Continuous AND gate over a set of conditions.
///
/// Cloning an emitter yields another handle to the same gate.
#[derive(Clone)]
pub struct Emitter {
    shared: Arc<EmitterShared>,
}

impl Emitter {
    /// Subscribe to the aggregate becoming active.
    pub fn on_active<F>(&self, callback: F) -> Detach
    where
        F: Fn() + Send + Sync + 'static,
    {
        listener::attach(&self.shared.on_active, Arc::new(callback) as Listener)
    }

    /// Subscribe to the aggregate becoming inactive.
    pub fn on_inactive<F>(&self, callback: F) -> Detach
    where
        F: Fn() + Send + Sync + 'static,
    {
        listener::attach(&self.shared.on_inactive, Arc::new(callback) as Listener)
    }

    /// Aggregate state as of the last edge.
    pub fn is_active(&self) -> bool {
        *self.shared.active.lock()
    }

    /// The conditions this emitter watches.
    pub fn conditions(&self) -> &[Condition] {
        &self.shared.conditions
    }

    /// Clean up every condition and drop every subscriber. Idempotent.
    pub fn cleanup(&self) {
        for condition in &self.shared.conditions {
            condition.cleanup();
        }
        self.shared.on_active.lock().clear();
        self.shared.on_inactive.lock().clear();
    }
}

impl std::fmt::Debug for Emitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("conditions", &self.shared.conditions.len())
            .field("active", &self.is_active())
            .finish()
    }
}

/// Create an emitter over `options`.
///
/// The aggregate of the conditions at this moment is recorded without
/// notifying anyone: subscribers only hear about later edges. On a
/// multi-thread runtime a reaction's poller may already have activated its
/// condition by the time this runs, and `on_active` then never fires for
/// that edge. Build emitters on a current-thread runtime, or read
/// [`Emitter::is_active`] after subscribing.
pub fn create_emitter(options: impl Into<ActionOptions>) -> Emitter {
    let ActionOptions { conditions } = options.into();
    let shared = Arc::new(EmitterShared {
        conditions,
        active: Mutex::new(false),
        on_active: Arc::new(Mutex::new(Registry::new())),
        on_inactive: Arc::new(Mutex::new(Registry::new())),
    });
    *shared.active.lock() = shared.all_active();

    for condition in &shared.conditions {
        let weak: Weak<EmitterShared> = Arc::downgrade(&shared);
        condition.on_activated(move || {
            if let Some(shared) = weak.upgrade() {
                shared.check();
            }
        });

        let weak: Weak<EmitterShared> = Arc::downgrade(&shared);
        condition.on_deactivated(move || {
            if let Some(shared) = weak.upgrade() {
                shared.check();
            }
        });
    }

    Emitter { shared }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
