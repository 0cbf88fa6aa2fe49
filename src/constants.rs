// -
// Configuration

/// Environment variable prefix for watcher configuration overrides
pub(crate) const CONFIG_ENV_PREFIX: &str = "WATCHER";

/// Environment variable naming an extra configuration file
pub(crate) const CONFIG_PATH_ENV: &str = "CONFIG_PATH";

/// Longest selector chain accepted by default
pub(crate) const DEFAULT_MAX_CHAIN_LENGTH: usize = 64;
