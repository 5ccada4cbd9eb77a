//! Conditions
//!
//! This module implements the edge-triggered boolean cell and everything
//! that drives one.
//!
//! # Concepts
//!
//! ## Conditions
//!
//! A [`Condition`] holds a boolean and notifies listeners when it flips.
//! Re-asserting the current state is silent, so observers see edges, not
//! levels.
//!
//! ## Reactions
//!
//! A reaction is a condition fed by a polled callback. The callback returns a
//! [`Probe`]: a ready value, a synchronous failure, or a future. A validator
//! turns the value into the condition's state. Polls never overlap; the
//! delay between them only starts once the previous poll has settled.
//!
//! ## Derived conditions
//!
//! `while_*` track a callback forever, `when_*` stop after the first match,
//! and `when_finished` follows a single deferred computation.

mod cell;
mod derived;
pub(crate) mod listener;
mod reaction;
mod truthy;

pub use cell::{Condition, WeakCondition};
pub use derived::{when_falsy, when_finished, when_truthy, while_falsy, while_truthy, Completion};
pub use listener::{Detach, Listener, ListenerId};
pub use reaction::{create_reaction, Probe, ProbeFuture, ReactionOptions, Validator};
pub use truthy::Truthy;

/// Create a new, deactivated condition.
pub fn create_condition() -> Condition {
    Condition::new()
}
