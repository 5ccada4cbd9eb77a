//! Reaction Implementation
//!
//! A Reaction is a [`Condition`] driven by a polled callback.
//!
//! # How Reactions Work
//!
//! 1. On creation, a background task is spawned and polls immediately.
//!
//! 2. Each poll produces a [`Probe`]. A ready value is validated on the spot.
//!    A deferred value suspends the task until it settles; no timer is armed
//!    in the meantime, so the same callback is never polled twice at once.
//!
//! 3. The validator's verdict activates or deactivates the condition. A
//!    failed poll (error, rejected future or panic) deactivates it.
//!
//! 4. After the poll has fully settled, the task sleeps for the configured
//!    delay and starts over.
//!
//! # Cancellation
//!
//! `cleanup()` on the condition raises its stop signal. A sleeping task wakes
//! and exits at once. A task awaiting a deferred result is not interrupted;
//! when the result finally arrives it is discarded without touching the
//! condition, and nothing is rescheduled.

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::{FutureExt, TryFutureExt};
use tokio::sync::watch;

use super::cell::{Condition, WeakCondition};
use super::listener::panic_message;
use super::truthy::Truthy;
use crate::config::PollingConfig;
use crate::error::BoxError;

/// A deferred poll result.
pub type ProbeFuture<T> = BoxFuture<'static, Result<T, BoxError>>;

/// Decides whether a poll result activates the condition.
pub type Validator<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Outcome of a single poll.
///
/// # Example
///
/// ```rust
/// use latch_core::Probe;
///
/// let now: Probe<u32> = Probe::ready(3);
/// let later: Probe<u32> = Probe::deferred(async { Ok::<_, std::io::Error>(3) });
/// assert!(!now.is_deferred());
/// assert!(later.is_deferred());
/// ```
pub enum Probe<T> {
    /// The callback produced its result synchronously.
    Ready(T),

    /// The callback failed synchronously.
    Failed(BoxError),

    /// The result will be produced by a future.
    Deferred(ProbeFuture<T>),
}

impl<T> Probe<T> {
    /// A synchronous result.
    pub fn ready(value: T) -> Self {
        Probe::Ready(value)
    }

    /// A synchronous failure.
    pub fn failed(err: impl Into<BoxError>) -> Self {
        Probe::Failed(err.into())
    }

    /// A result produced by `future`.
    pub fn deferred<Fut, E>(future: Fut) -> Self
    where
        T: 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        Probe::Deferred(future.map_err(|err: E| -> BoxError { err.into() }).boxed())
    }

    /// Returns true for [`Probe::Deferred`].
    pub fn is_deferred(&self) -> bool {
        matches!(self, Probe::Deferred(_))
    }
}

impl<T, E: Into<BoxError>> From<Result<T, E>> for Probe<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Probe::Ready(value),
            Err(err) => Probe::Failed(err.into()),
        }
    }
}

impl<T> std::fmt::Debug for Probe<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Probe::Ready(_) => f.write_str("Probe::Ready(..)"),
            Probe::Failed(err) => write!(f, "Probe::Failed({err})"),
            Probe::Deferred(_) => f.write_str("Probe::Deferred(..)"),
        }
    }
}

/// How a reaction validates and paces its polls.
pub struct ReactionOptions<T> {
    /// Timing.
    pub config: PollingConfig,

    validate: Validator<T>,
}

impl<T> ReactionOptions<T> {
    /// Options with a custom validator and the default delay.
    pub fn new<V>(validate: V) -> Self
    where
        V: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self {
            config: PollingConfig::default(),
            validate: Arc::new(validate),
        }
    }

    /// Replace the polling configuration.
    pub fn with_config(mut self, config: PollingConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the delay between polls.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.config = PollingConfig::with_delay(delay);
        self
    }
}

impl<T: Truthy + 'static> ReactionOptions<T> {
    /// Activate on truthy results.
    pub fn truthy() -> Self {
        Self::new(|value: &T| value.is_truthy())
    }

    /// Activate on falsy results.
    pub fn falsy() -> Self {
        Self::new(|value: &T| !value.is_truthy())
    }
}

impl<T: Truthy + 'static> Default for ReactionOptions<T> {
    fn default() -> Self {
        Self::truthy()
    }
}

impl<T> Clone for ReactionOptions<T> {
    fn clone(&self) -> Self {
        Self {
            config: self.config,
            validate: Arc::clone(&self.validate),
        }
    }
}

impl<T> std::fmt::Debug for ReactionOptions<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactionOptions")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Create a condition that tracks the validated result of `poll`.
///
/// # Panics
///
/// Must be called from within a Tokio runtime.
///
/// # Example
///
/// ```rust,ignore
/// let ready = create_reaction(
///     move || Probe::ready(queue.len()),
///     ReactionOptions::new(|len: &usize| *len >= 10),
/// );
/// ```
pub fn create_reaction<T, F>(poll: F, options: ReactionOptions<T>) -> Condition
where
    T: Send + 'static,
    F: FnMut() -> Probe<T> + Send + 'static,
{
    let condition = Condition::new();
    spawn_poller(&condition, poll, options);
    condition
}

/// Drive `condition` from `poll` on a background task.
pub(crate) fn spawn_poller<T, F>(condition: &Condition, poll: F, options: ReactionOptions<T>)
where
    T: Send + 'static,
    F: FnMut() -> Probe<T> + Send + 'static,
{
    let poller = Poller {
        condition: condition.downgrade(),
        stop: condition.stop_signal(),
        poll,
        validate: options.validate,
        delay: options.config.delay(),
        polls: 0,
    };

    tokio::spawn(poller.run());
}

/// The background half of a reaction.
struct Poller<T, F> {
    condition: WeakCondition,
    stop: watch::Receiver<bool>,
    poll: F,
    validate: Validator<T>,
    delay: Duration,
    polls: u64,
}

impl<T, F> Poller<T, F>
where
    T: Send + 'static,
    F: FnMut() -> Probe<T> + Send + 'static,
{
    async fn run(mut self) {
        loop {
            // Cleanup may land before the task first runs.
            if self.is_stopped() {
                tracing::debug!(polls = self.polls, "reaction stopped before polling");
                return;
            }
            let verdict = self.poll_once().await;

            if self.is_stopped() {
                tracing::debug!(polls = self.polls, "reaction stopped, discarding poll result");
                return;
            }
            let Some(condition) = self.condition.upgrade() else {
                return;
            };
            tracing::trace!(condition = condition.id(), verdict, polls = self.polls, "poll settled");
            condition.set_activated(verdict);
            drop(condition);

            // Listeners may have cleaned the condition up.
            if self.is_stopped() {
                return;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.delay) => {}
                _ = wait_for_stop(&mut self.stop) => return,
            }
        }
    }

    /// Run the callback once and reduce its outcome to a verdict.
    async fn poll_once(&mut self) -> bool {
        self.polls += 1;

        let probe = match panic::catch_unwind(AssertUnwindSafe(|| (self.poll)())) {
            Ok(probe) => probe,
            Err(payload) => {
                tracing::debug!(reason = panic_message(&*payload), "poll callback panicked");
                return false;
            }
        };

        match probe {
            Probe::Ready(value) => self.validate(&value),
            Probe::Failed(err) => {
                tracing::debug!(error = %err, "poll failed");
                false
            }
            Probe::Deferred(future) => match AssertUnwindSafe(future).catch_unwind().await {
                Ok(Ok(value)) => self.validate(&value),
                Ok(Err(err)) => {
                    tracing::debug!(error = %err, "deferred poll rejected");
                    false
                }
                Err(payload) => {
                    tracing::debug!(reason = panic_message(&*payload), "deferred poll panicked");
                    false
                }
            },
        }
    }

    fn validate(&self, value: &T) -> bool {
        panic::catch_unwind(AssertUnwindSafe(|| (self.validate)(value))).unwrap_or_else(|payload| {
            tracing::debug!(reason = panic_message(&*payload), "validator panicked");
            false
        })
    }

    fn is_stopped(&self) -> bool {
        *self.stop.borrow()
    }
}

/// Resolve once the stop signal is raised or its sender is gone.
async fn wait_for_stop(stop: &mut watch::Receiver<bool>) {
    while !*stop.borrow_and_update() {
        if stop.changed().await.is_err() {
            return;
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
