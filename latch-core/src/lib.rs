//! Latch Core
//!
//! This crate provides edge-triggered boolean conditions and the waiting
//! primitives built on top of them. It implements:
//!
//! - Conditions (a boolean cell with activation/deactivation listeners)
//! - Reactions (conditions driven by a polled, possibly async, callback)
//! - One-shot and continuous derived conditions
//! - Actions (futures that resolve once all conditions hold together)
//! - Emitters (continuous notification while all conditions hold)
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `condition`: the Condition cell, listener registries, the polling engine
//! - `gate`: Action and Emitter, the AND combinators
//! - `config`: polling configuration
//! - `error`: construction errors
//!
//! # Scheduling
//!
//! Pollers run as Tokio tasks, so reactions and `when_finished` must be
//! created inside a Tokio runtime. Listeners run synchronously on whatever
//! thread caused the edge. On a current-thread runtime a freshly created
//! reaction does not poll before the creating task yields, so listeners
//! registered right after creation never miss the first edge.
//!
//! # Example
//!
//! ```rust,ignore
//! use latch_core::{create_action, when_truthy, while_falsy, PollingConfig, Probe};
//!
//! let action = create_action(vec![
//!     when_truthy(move || Probe::ready(server.is_up()), PollingConfig::default()),
//!     while_falsy(move || Probe::ready(queue.len()), PollingConfig::default()),
//! ]);
//!
//! // Resolves once the server is up while the queue is empty.
//! action.await;
//! ```

pub mod condition;
pub mod config;
pub mod error;
pub mod gate;

pub use condition::{
    create_condition, create_reaction, when_falsy, when_finished, when_truthy, while_falsy,
    while_truthy, Completion, Condition, Detach, Probe, ReactionOptions, Truthy, WeakCondition,
};
pub use config::PollingConfig;
pub use error::{BoxError, ConditionError, Result};
pub use gate::{create_action, create_emitter, Action, ActionOptions, Emitter};
