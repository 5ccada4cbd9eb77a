//! Error types.
//!
//! Almost nothing in this crate fails loudly. Poll failures and misbehaving
//! listeners degrade to "condition considered false" and are only logged.
//! The errors below are the exceptions: they signal misuse at construction
//! time and are returned straight to the caller.

use thiserror::Error;

/// Boxed error produced by user callbacks and deferred computations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias for fallible constructors in this crate.
pub type Result<T> = std::result::Result<T, ConditionError>;

/// Construction-time errors.
#[derive(Debug, Error)]
pub enum ConditionError {
    /// A completion callback returned a plain value instead of a deferred
    /// computation.
    #[error("failed creating completion condition: resulting value is not deferred")]
    NotDeferred,

    /// A completion callback failed before producing a deferred computation.
    #[error("failed creating completion condition: {0}")]
    SourceFailed(#[source] BoxError),
}
