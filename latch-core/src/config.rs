//! Polling Configuration
//!
//! Reactions sleep a fixed delay between the settlement of one poll and the
//! start of the next. The delay is the only tunable, and it is exposed as a
//! serde-friendly struct so host applications can keep it in their own
//! configuration files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default wait between poll completions, in milliseconds.
pub const DEFAULT_DELAY_MS: u64 = 200;

/// Timing options shared by every polling condition.
///
/// # Example
///
/// ```rust
/// use latch_core::PollingConfig;
///
/// let config: PollingConfig = serde_json::from_str(r#"{ "delay_ms": 50 }"#).unwrap();
/// assert_eq!(config.delay().as_millis(), 50);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Milliseconds to wait after a poll settles before polling again.
    pub delay_ms: u64,
}

impl PollingConfig {
    /// Build a config with the given delay.
    ///
    /// Sub-millisecond precision is truncated.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// The delay as a [`Duration`].
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            delay_ms: DEFAULT_DELAY_MS,
        }
    }
}
