//! Action Implementation
//!
//! An Action is a one-shot AND gate: a future that resolves the first time
//! every one of its conditions is active at the same moment.
//!
//! # How Actions Work
//!
//! 1. The action registers an activation listener on each condition.
//!
//! 2. Whenever any of them activates, the action re-reads the current state
//!    of ALL conditions. The edge itself only triggers the check.
//!
//! 3. The first time the AND holds, the action is marked validated, the
//!    awaiting task is woken and every condition is cleaned up. Pollers stop,
//!    listeners are dropped, and nothing is ever checked again.
//!
//! The AND is also evaluated once at construction, so conditions that are
//! already active (or an empty set) resolve immediately.
//!
//! # Ownership
//!
//! The action owns its conditions. Dropping an action that has not resolved
//! yet cleans its conditions up as well.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll, Waker};

use parking_lot::Mutex;

use crate::condition::Condition;

/// Inputs of an [`Action`] or [`Emitter`](super::Emitter).
///
/// Usually built from a `Vec` or array of conditions.
#[derive(Debug, Clone, Default)]
pub struct ActionOptions {
    /// The conditions to AND together.
    pub conditions: Vec<Condition>,
}

impl From<Vec<Condition>> for ActionOptions {
    fn from(conditions: Vec<Condition>) -> Self {
        Self { conditions }
    }
}

impl<const N: usize> From<[Condition; N]> for ActionOptions {
    fn from(conditions: [Condition; N]) -> Self {
        Self {
            conditions: conditions.into(),
        }
    }
}

struct ActionShared {
    conditions: Vec<Condition>,
    validated: AtomicBool,
    waker: Mutex<Option<Waker>>,
}

impl ActionShared {
    fn check(&self) {
        if self.validated.load(Ordering::SeqCst) {
            return;
        }
        if !self.conditions.iter().all(Condition::is_activated) {
            return;
        }
        if self.validated.swap(true, Ordering::SeqCst) {
            return;
        }

        tracing::debug!(conditions = self.conditions.len(), "action validated");
        if let Some(waker) = self.waker.lock().take() {
            waker.wake();
        }
        for condition in &self.conditions {
            condition.cleanup();
        }
    }
}

impl Drop for ActionShared {
    fn drop(&mut self) {
        if !*self.validated.get_mut() {
            tracing::debug!(conditions = self.conditions.len(), "action dropped before validation");
            for condition in &self.conditions {
                condition.cleanup();
            }
        }
    }
}

/// A future that resolves once all of its conditions are active together.
///
/// # Example
///
/// ```rust,ignore
/// let action = create_action(vec![
///     when_truthy(move || Probe::ready(server.is_up()), PollingConfig::default()),
///     while_falsy(move || Probe::ready(queue.len()), PollingConfig::default()),
/// ]);
/// action.await;
/// ```
pub struct Action {
    shared: Arc<ActionShared>,
}

impl Action {
    /// Returns true once the action has resolved.
    pub fn is_validated(&self) -> bool {
        self.shared.validated.load(Ordering::SeqCst)
    }

    /// The conditions this action watches.
    pub fn conditions(&self) -> &[Condition] {
        &self.shared.conditions
    }
}

impl Future for Action {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.is_validated() {
            return Poll::Ready(());
        }

        *self.shared.waker.lock() = Some(cx.waker().clone());

        // Validation may have raced with storing the waker.
        if self.is_validated() {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Action")
            .field("conditions", &self.shared.conditions.len())
            .field("validated", &self.is_validated())
            .finish()
    }
}

/// Create an action over `options`.
///
/// Accepts anything convertible into [`ActionOptions`], such as a
/// `Vec<Condition>` or an array of conditions.
pub fn create_action(options: impl Into<ActionOptions>) -> Action {
    let ActionOptions { conditions } = options.into();
    let shared = Arc::new(ActionShared {
        conditions,
        validated: AtomicBool::new(false),
        waker: Mutex::new(None),
    });

    for condition in &shared.conditions {
        let weak: Weak<ActionShared> = Arc::downgrade(&shared);
        condition.on_activated(move || {
            if let Some(shared) = weak.upgrade() {
                shared.check();
            }
        });
    }
    shared.check();

    Action { shared }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;

    #[test]
    fn action_waits_for_all_conditions() {
        let a = Condition::new();
        let b = Condition::new();
        let mut action = create_action(vec![a.clone(), b.clone()]);

        a.activate();
        assert!(!action.is_validated());
        assert!((&mut action).now_or_never().is_none());

        b.activate();
        assert!(action.is_validated());
        assert!((&mut action).now_or_never().is_some());
    }

    #[test]
    fn and_is_over_current_state_not_edges() {
        let a = Condition::new();
        let b = Condition::new();
        let action = create_action([a.clone(), b.clone()]);

        a.activate();
        a.deactivate();
        b.activate();
        assert!(!action.is_validated());

        a.activate();
        assert!(action.is_validated());
    }

    #[test]
    fn validation_cleans_up_conditions() {
        let a = Condition::new();
        let b = Condition::new();
        b.on_deactivated(|| {});
        let action = create_action(vec![a.clone(), b.clone()]);

        b.activate();
        a.activate();

        assert!(action.is_validated());
        assert_eq!(a.listener_count(), 0);
        assert_eq!(b.listener_count(), 0);

        // Later edges cannot be observed.
        a.deactivate();
        a.activate();
        assert!(action.is_validated());
    }

    #[test]
    fn already_active_conditions_resolve_immediately() {
        let a = Condition::new();
        a.activate();

        let action = create_action(vec![a]);
        assert!(action.is_validated());
    }

    #[test]
    fn empty_action_resolves_immediately() {
        let action = create_action(ActionOptions::default());
        assert!(action.is_validated());
        assert!(action.now_or_never().is_some());
    }

    #[test]
    fn dropping_unresolved_action_cleans_up() {
        let a = Condition::new();
        a.on_activated(|| {});
        let action = create_action(vec![a.clone()]);
        assert_eq!(a.listener_count(), 2);

        drop(action);
        assert_eq!(a.listener_count(), 0);
    }

    #[tokio::test]
    async fn action_wakes_awaiting_task() {
        let a = Condition::new();
        let action = create_action(vec![a.clone()]);

        let waiter = tokio::spawn(action);
        tokio::task::yield_now().await;
        a.activate();

        waiter.await.unwrap();
    }
}
