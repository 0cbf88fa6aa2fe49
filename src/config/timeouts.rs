use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Fallback deadlines applied when a caller does not pass one explicitly.
///
/// A value of `0` disables the fallback, so a `None` timeout means "wait
/// forever". Callers can always opt out per call with `Some(Duration::ZERO)`.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TimeoutConfig {
    /// Deadline (milliseconds) for `watch_children`, `watch_descendants` and
    /// `watch_any_descendant`
    #[serde(default = "default_watch_timeout_ms")]
    pub default_watch_timeout_ms: u64,

    /// Deadline (milliseconds) bounding a whole `watch_chain` invocation
    #[serde(default = "default_chain_timeout_ms")]
    pub default_chain_timeout_ms: u64,

    /// Upper bound (milliseconds) for any configured fallback deadline
    #[serde(default = "default_max_timeout_ms")]
    pub max_timeout_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default_watch_timeout_ms: default_watch_timeout_ms(),
            default_chain_timeout_ms: default_chain_timeout_ms(),
            max_timeout_ms: default_max_timeout_ms(),
        }
    }
}

impl TimeoutConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "max_timeout_ms must be greater than 0".into(),
            )));
        }

        if self.default_watch_timeout_ms > self.max_timeout_ms {
            return Err(Error::Config(ConfigError::Message(format!(
                "default_watch_timeout_ms ({}) exceeds max_timeout_ms ({})",
                self.default_watch_timeout_ms, self.max_timeout_ms
            ))));
        }

        if self.default_chain_timeout_ms > self.max_timeout_ms {
            return Err(Error::Config(ConfigError::Message(format!(
                "default_chain_timeout_ms ({}) exceeds max_timeout_ms ({})",
                self.default_chain_timeout_ms, self.max_timeout_ms
            ))));
        }

        Ok(())
    }

    pub fn watch_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.default_watch_timeout_ms)
    }

    pub fn chain_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.default_chain_timeout_ms)
    }
}

fn non_zero_millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

fn default_watch_timeout_ms() -> u64 {
    0
}
fn default_chain_timeout_ms() -> u64 {
    0
}
fn default_max_timeout_ms() -> u64 {
    // one hour
    3_600_000
}
