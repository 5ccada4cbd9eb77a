//! AND Gates
//!
//! Gates combine several conditions into one aggregate:
//!
//! - An [`Action`] resolves once, the first time every condition is active
//!   at the same moment, then releases all of them.
//! - An [`Emitter`] keeps watching and notifies subscribers every time the
//!   aggregate turns active or inactive.
//!
//! Both re-read the state of every condition whenever one of them changes,
//! synchronously, inside the triggering condition's listener dispatch.

mod action;
mod emitter;

pub use action::{create_action, Action, ActionOptions};
pub use emitter::{create_emitter, Emitter};
