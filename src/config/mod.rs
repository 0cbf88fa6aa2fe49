//! Configuration management for the element watcher.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support
//! - Environment variable overrides
//! - Component-wise validation
mod chain;
mod timeouts;
pub use chain::*;
pub use timeouts::*;
#[cfg(test)]
mod config_test;

use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::CONFIG_ENV_PREFIX;
use crate::constants::CONFIG_PATH_ENV;
use crate::Result;

/// Main configuration container for the watcher
///
/// Sources are layered with later ones taking priority:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables prefixed with `WATCHER__`
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct WatcherConfig {
    /// Fallback deadlines for watches and chains
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Chain resolution limits
    #[serde(default)]
    pub chain: ChainConfig,
}

impl WatcherConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// # Example
    /// ```ignore
    /// std::env::set_var("WATCHER__TIMEOUTS__DEFAULT_CHAIN_TIMEOUT_MS", "5000");
    /// let cfg = WatcherConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var(CONFIG_PATH_ENV) {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies overrides from `path` on top of the current values. Environment
    /// variables are re-applied last so they keep the highest priority.
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates every section and returns the validated instance.
    pub fn validate(self) -> Result<Self> {
        self.timeouts.validate()?;
        self.chain.validate()?;
        Ok(self)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(CONFIG_ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}
