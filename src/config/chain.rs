use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_MAX_CHAIN_LENGTH;
use crate::Error;
use crate::Result;

/// Limits applied to `watch_chain`
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ChainConfig {
    /// Longest selector chain a single invocation may resolve
    #[serde(default = "default_max_chain_length")]
    pub max_chain_length: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            max_chain_length: default_max_chain_length(),
        }
    }
}

impl ChainConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_chain_length == 0 {
            return Err(Error::Config(ConfigError::Message(
                "max_chain_length must be at least 1".into(),
            )));
        }
        Ok(())
    }

    pub(crate) fn check_length(
        &self,
        len: usize,
    ) -> Result<()> {
        if len > self.max_chain_length {
            return Err(Error::Config(ConfigError::Message(format!(
                "selector chain of length {} exceeds max_chain_length {}",
                len, self.max_chain_length
            ))));
        }
        Ok(())
    }
}

fn default_max_chain_length() -> usize {
    DEFAULT_MAX_CHAIN_LENGTH
}
