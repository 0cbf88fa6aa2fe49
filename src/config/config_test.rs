use std::time::Duration;

use serial_test::serial;
use temp_env::with_vars;

use super::*;
use crate::Error;

fn cleanup_all_watcher_env_vars() {
    for (key, _) in std::env::vars() {
        if key.starts_with("WATCHER__") || key == "CONFIG_PATH" {
            std::env::remove_var(&key);
        }
    }
}

#[test]
#[serial]
fn default_config_should_disable_fallback_timeouts() {
    let config = WatcherConfig::default();

    assert_eq!(config.timeouts.default_watch_timeout_ms, 0);
    assert_eq!(config.timeouts.default_chain_timeout_ms, 0);
    assert_eq!(config.timeouts.watch_timeout(), None);
    assert_eq!(config.timeouts.chain_timeout(), None);
    assert_eq!(config.chain.max_chain_length, 64);
}

#[test]
#[serial]
fn new_should_merge_environment_overrides() {
    cleanup_all_watcher_env_vars();
    with_vars(
        vec![
            ("WATCHER__TIMEOUTS__DEFAULT_CHAIN_TIMEOUT_MS", Some("2500")),
            ("WATCHER__CHAIN__MAX_CHAIN_LENGTH", Some("8")),
        ],
        || {
            let config = WatcherConfig::new().unwrap().validate().unwrap();

            assert_eq!(config.timeouts.chain_timeout(), Some(Duration::from_millis(2500)));
            assert_eq!(config.chain.max_chain_length, 8);
        },
    );
}

#[test]
#[serial]
fn with_override_config_should_merge_file_settings() {
    cleanup_all_watcher_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("watcher.toml");

    std::fs::write(
        &config_path,
        r#"
        [timeouts]
        default_watch_timeout_ms = 750

        [chain]
        max_chain_length = 3
        "#,
    )
    .unwrap();

    let empty_vars: Vec<(&str, Option<&str>)> = vec![];
    with_vars(empty_vars, || {
        let base_config = WatcherConfig::new().expect("success");
        let config = base_config
            .with_override_config(config_path.to_str().unwrap())
            .unwrap();

        assert_eq!(config.timeouts.watch_timeout(), Some(Duration::from_millis(750)));
        assert_eq!(config.timeouts.chain_timeout(), None);
        assert_eq!(config.chain.max_chain_length, 3);
    });
}

#[test]
#[serial]
fn environment_should_win_over_override_file() {
    cleanup_all_watcher_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("watcher.toml");
    std::fs::write(&config_path, "[chain]\nmax_chain_length = 3\n").unwrap();

    with_vars(vec![("WATCHER__CHAIN__MAX_CHAIN_LENGTH", Some("5"))], || {
        let config = WatcherConfig::default()
            .with_override_config(config_path.to_str().unwrap())
            .unwrap();

        assert_eq!(config.chain.max_chain_length, 5);
    });
}

#[test]
#[serial]
fn config_path_env_should_be_required_when_set() {
    cleanup_all_watcher_env_vars();
    with_vars(vec![("CONFIG_PATH", Some("/definitely/not/here.toml"))], || {
        assert!(WatcherConfig::new().is_err());
    });
}

#[test]
fn validation_should_reject_zero_chain_length() {
    let mut config = WatcherConfig::default();
    config.chain.max_chain_length = 0;

    assert!(matches!(config.validate(), Err(Error::Config(_))));
}

#[test]
fn validation_should_reject_defaults_above_the_cap() {
    let mut config = WatcherConfig::default();
    config.timeouts.max_timeout_ms = 1000;
    config.timeouts.default_chain_timeout_ms = 1001;

    assert!(matches!(config.validate(), Err(Error::Config(_))));
}

#[test]
fn check_length_should_reject_long_chains() {
    let chain = ChainConfig { max_chain_length: 2 };

    assert!(chain.check_length(2).is_ok());
    assert!(matches!(chain.check_length(3), Err(Error::Config(_))));
}
