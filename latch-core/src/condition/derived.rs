//! Derived condition constructors.
//!
//! Thin wrappers over reactions for the common cases:
//!
//! - `while_truthy` / `while_falsy`: poll forever, track the result.
//! - `when_truthy` / `when_falsy`: poll until the result matches once,
//!   then fire, clean up and stop.
//! - `when_finished`: activate when a single deferred computation settles.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures_util::{FutureExt, TryFutureExt};

use super::cell::Condition;
use super::listener::panic_message;
use super::reaction::{self, Probe, ProbeFuture, ReactionOptions};
use super::truthy::Truthy;
use crate::config::PollingConfig;
use crate::error::{BoxError, ConditionError, Result};

/// Condition that is active while `poll` returns a truthy value.
pub fn while_truthy<T, F>(poll: F, config: PollingConfig) -> Condition
where
    T: Truthy + Send + 'static,
    F: FnMut() -> Probe<T> + Send + 'static,
{
    reaction::create_reaction(poll, ReactionOptions::truthy().with_config(config))
}

/// Condition that is active while `poll` returns a falsy value.
pub fn while_falsy<T, F>(poll: F, config: PollingConfig) -> Condition
where
    T: Truthy + Send + 'static,
    F: FnMut() -> Probe<T> + Send + 'static,
{
    reaction::create_reaction(poll, ReactionOptions::falsy().with_config(config))
}

/// Poll until `poll` returns a truthy value, then fire once and stop.
///
/// Listeners registered after the condition has fired never run.
pub fn when_truthy<T, F>(poll: F, config: PollingConfig) -> Condition
where
    T: Truthy + Send + 'static,
    F: FnMut() -> Probe<T> + Send + 'static,
{
    let condition = Condition::new();
    cleanup_on_activation(&condition);
    reaction::spawn_poller(&condition, poll, ReactionOptions::truthy().with_config(config));
    condition
}

/// Poll until `poll` returns a falsy value, then fire once and stop.
pub fn when_falsy<T, F>(poll: F, config: PollingConfig) -> Condition
where
    T: Truthy + Send + 'static,
    F: FnMut() -> Probe<T> + Send + 'static,
{
    let condition = Condition::new();
    cleanup_on_activation(&condition);
    reaction::spawn_poller(&condition, poll, ReactionOptions::falsy().with_config(config));
    condition
}

/// Registered before the poller starts, so it is always the first listener
/// to see the activation edge.
fn cleanup_on_activation(condition: &Condition) {
    let weak = condition.downgrade();
    condition.on_activated(move || {
        if let Some(condition) = weak.upgrade() {
            condition.cleanup();
        }
    });
}

/// Source of the computation watched by [`when_finished`].
pub enum Completion<T> {
    /// An already-running computation.
    Future(ProbeFuture<T>),

    /// A callback invoked once, at construction, that must return
    /// [`Probe::Deferred`].
    Callback(Box<dyn FnOnce() -> Probe<T> + Send>),
}

impl<T> Completion<T> {
    /// Watch `future`.
    pub fn future<Fut, E>(future: Fut) -> Self
    where
        T: 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        Completion::Future(future.map_err(|err: E| -> BoxError { err.into() }).boxed())
    }

    /// Watch whatever `callback` starts.
    pub fn callback<F>(callback: F) -> Self
    where
        F: FnOnce() -> Probe<T> + Send + 'static,
    {
        Completion::Callback(Box::new(callback))
    }
}

impl<T> std::fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Completion::Future(_) => f.write_str("Completion::Future(..)"),
            Completion::Callback(_) => f.write_str("Completion::Callback(..)"),
        }
    }
}

/// Condition that activates once `source` settles.
///
/// Success activates. Failure activates too, unless `must_resolve` is set,
/// in which case the condition is deactivated. The condition never changes
/// again after that.
///
/// # Errors
///
/// A [`Completion::Callback`] that returns a ready value yields
/// [`ConditionError::NotDeferred`]; one that fails yields
/// [`ConditionError::SourceFailed`].
///
/// # Panics
///
/// Must be called from within a Tokio runtime.
pub fn when_finished<T>(source: Completion<T>, must_resolve: bool) -> Result<Condition>
where
    T: Send + 'static,
{
    let future = match source {
        Completion::Future(future) => future,
        Completion::Callback(callback) => match callback() {
            Probe::Deferred(future) => future,
            Probe::Ready(_) => return Err(ConditionError::NotDeferred),
            Probe::Failed(err) => return Err(ConditionError::SourceFailed(err)),
        },
    };

    let condition = Condition::new();
    let weak = condition.downgrade();
    let stop = condition.stop_signal();

    tokio::spawn(async move {
        let succeeded = match AssertUnwindSafe(future).catch_unwind().await {
            Ok(Ok(_)) => true,
            Ok(Err(err)) => {
                tracing::debug!(error = %err, must_resolve, "watched computation failed");
                false
            }
            Err(payload) => {
                tracing::debug!(reason = panic_message(&*payload), must_resolve, "watched computation panicked");
                false
            }
        };

        if *stop.borrow() {
            return;
        }
        if let Some(condition) = weak.upgrade() {
            condition.set_activated(succeeded || !must_resolve);
        }
    });

    Ok(condition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::sleep;

    fn fast() -> PollingConfig {
        PollingConfig::with_delay(Duration::from_millis(20))
    }

    #[tokio::test(start_paused = true)]
    async fn while_truthy_follows_the_value() {
        let flag = Arc::new(AtomicBool::new(false));
        let flag_clone = flag.clone();
        let condition = while_truthy(move || Probe::ready(flag_clone.load(Ordering::SeqCst)), fast());

        sleep(Duration::from_millis(30)).await;
        assert!(!condition.is_activated());

        flag.store(true, Ordering::SeqCst);
        sleep(Duration::from_millis(30)).await;
        assert!(condition.is_activated());

        flag.store(false, Ordering::SeqCst);
        sleep(Duration::from_millis(30)).await;
        assert!(!condition.is_activated());
        condition.cleanup();
    }

    #[tokio::test(start_paused = true)]
    async fn while_falsy_inverts_the_value() {
        let condition = while_falsy(|| Probe::ready(String::new()), fast());

        sleep(Duration::from_millis(10)).await;
        assert!(condition.is_activated());
        condition.cleanup();
    }

    #[tokio::test(start_paused = true)]
    async fn when_truthy_fires_once_and_stops() {
        let polls = Arc::new(AtomicUsize::new(0));
        let polls_clone = polls.clone();
        let condition = when_truthy(
            move || Probe::ready(polls_clone.fetch_add(1, Ordering::SeqCst) >= 2),
            fast(),
        );

        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        condition.on_activated(move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        sleep(Duration::from_millis(500)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(polls.load(Ordering::SeqCst), 3);
        assert!(condition.is_activated());
        assert_eq!(condition.listener_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn when_falsy_fires_once_and_stops() {
        let polls = Arc::new(AtomicUsize::new(0));
        let polls_clone = polls.clone();
        let condition = when_falsy(
            move || Probe::ready(3usize.saturating_sub(polls_clone.fetch_add(1, Ordering::SeqCst))),
            fast(),
        );

        sleep(Duration::from_millis(500)).await;

        assert!(condition.is_activated());
        assert_eq!(polls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn when_truthy_cleaned_up_before_first_poll_never_polls() {
        let polls = Arc::new(AtomicUsize::new(0));
        let polls_clone = polls.clone();
        let condition = when_truthy(
            move || {
                polls_clone.fetch_add(1, Ordering::SeqCst);
                Probe::ready(true)
            },
            fast(),
        );
        condition.cleanup();

        sleep(Duration::from_secs(1)).await;
        assert_eq!(polls.load(Ordering::SeqCst), 0);
        assert!(!condition.is_activated());
    }

    #[tokio::test]
    async fn when_finished_activates_on_success() {
        let condition = when_finished(Completion::future(async { Ok::<_, BoxError>(()) }), false).unwrap();

        sleep(Duration::from_millis(10)).await;
        assert!(condition.is_activated());
    }

    #[tokio::test]
    async fn when_finished_rejection_depends_on_must_resolve() {
        let lenient = when_finished(Completion::future(async { Err::<(), _>("refused") }), false).unwrap();
        let strict = when_finished(Completion::future(async { Err::<(), _>("refused") }), true).unwrap();

        sleep(Duration::from_millis(10)).await;
        assert!(lenient.is_activated());
        assert!(!strict.is_activated());
    }

    #[tokio::test]
    async fn when_finished_accepts_a_callback() {
        let condition = when_finished(
            Completion::callback(|| Probe::deferred(async { Ok::<_, BoxError>(42) })),
            true,
        )
        .unwrap();

        sleep(Duration::from_millis(10)).await;
        assert!(condition.is_activated());
    }

    #[tokio::test]
    async fn when_finished_rejects_non_deferred_callback() {
        let err = when_finished(Completion::callback(|| Probe::ready(1)), false).unwrap_err();
        assert!(matches!(err, ConditionError::NotDeferred));

        let err = when_finished(Completion::callback(|| Probe::<()>::failed("no socket")), false).unwrap_err();
        assert!(matches!(err, ConditionError::SourceFailed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn when_finished_result_is_discarded_after_cleanup() {
        let condition = when_finished(
            Completion::future(async {
                sleep(Duration::from_millis(100)).await;
                Ok::<_, BoxError>(())
            }),
            false,
        )
        .unwrap();

        condition.cleanup();
        sleep(Duration::from_millis(200)).await;
        assert!(!condition.is_activated());
    }
}
