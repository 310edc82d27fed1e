//! Integration tests for configuration loading and validation

#![allow(clippy::expect_used, clippy::unwrap_used)]

use blaze_protocol::config::{BlazeConfig, LoggingConfig, ServerConfig, MAX_PACKET_SIZE};
use std::time::Duration;
use tracing::Level;

#[test]
fn test_default_config_validates() {
    let config = BlazeConfig::default();
    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Default config should be valid, but got errors: {:?}",
        errors
    );
    assert!(config.validate_strict().is_ok());
}

#[test]
fn test_invalid_server_address() {
    let mut config = BlazeConfig::default();
    config.server.address = "blaze.example".to_string();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Invalid server address")));
}

#[test]
fn test_empty_server_address() {
    let mut config = BlazeConfig::default();
    config.server.address = String::new();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("cannot be empty")));
}

#[test]
fn test_zero_max_connections() {
    let mut config = BlazeConfig::default();
    config.server.max_connections = 0;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Max connections must be greater than 0")));
}

#[test]
fn test_zero_handler_workers() {
    let config = BlazeConfig::default_with_overrides(|c| c.server.handler_workers = 0);
    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Handler workers must be greater than 0")));
}

#[test]
fn test_packet_size_must_cover_plain_frames() {
    let config = BlazeConfig::default_with_overrides(|c| c.server.max_packet_size = 1024);
    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Max packet size too small")));
}

#[test]
fn test_shutdown_timeout_bounds() {
    let mut config = BlazeConfig::default();
    config.server.shutdown_timeout = Duration::from_millis(200);
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("Shutdown timeout too short")));

    config.server.shutdown_timeout = Duration::from_secs(120);
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("Shutdown timeout too long")));
}

#[test]
fn test_empty_app_name() {
    let mut config = BlazeConfig::default();
    config.logging.app_name = String::new();

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Application name cannot be empty")));
}

#[test]
fn test_strict_validation_lists_every_problem() {
    let config = BlazeConfig {
        server: ServerConfig {
            address: String::new(),
            max_connections: 0,
            ..ServerConfig::default()
        },
        logging: LoggingConfig::default(),
    };

    let err = config.validate_strict().unwrap_err().to_string();
    assert!(err.contains("cannot be empty"));
    assert!(err.contains("Max connections"));
}

#[test]
fn test_example_config_parses_back() {
    let text = BlazeConfig::example_config();
    let parsed = BlazeConfig::from_toml(&text).expect("example config should parse");
    assert_eq!(parsed.server.max_packet_size, MAX_PACKET_SIZE);
    assert_eq!(parsed.server.shutdown_timeout, Duration::from_secs(10));
    assert_eq!(parsed.logging.log_level, Level::INFO);
}

#[test]
fn test_toml_overrides() {
    let text = r#"
        [server]
        address = "127.0.0.1:42127"
        max_connections = 64
        handler_workers = 4
        max_packet_size = 1048576
        shutdown_timeout = 2500

        [logging]
        app_name = "blaze-test"
        log_level = "debug"
        log_to_console = true
        json_format = true
    "#;
    let config = BlazeConfig::from_toml(text).unwrap();
    assert_eq!(config.server.address, "127.0.0.1:42127");
    assert_eq!(config.server.handler_workers, 4);
    assert_eq!(config.server.shutdown_timeout, Duration::from_millis(2500));
    assert_eq!(config.logging.log_level, Level::DEBUG);
    assert!(config.logging.json_format);
    assert!(config.validate().is_empty());
}

#[test]
fn test_bad_log_level_is_rejected() {
    let text = r#"
        [logging]
        app_name = "blaze"
        log_level = "loud"
        log_to_console = true
        json_format = false
    "#;
    assert!(BlazeConfig::from_toml(text).is_err());
}

#[test]
fn test_save_and_reload() {
    let path = std::env::temp_dir().join(format!("blaze-config-{}.toml", std::process::id()));
    let config = BlazeConfig::default_with_overrides(|c| c.server.max_connections = 12);
    config.save_to_file(&path).unwrap();

    let loaded = BlazeConfig::from_file(&path).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(loaded.server.max_connections, 12);
}

#[test]
fn test_console_logging_can_be_disabled() {
    let config = BlazeConfig {
        logging: LoggingConfig {
            log_to_console: false,
            ..LoggingConfig::default()
        },
        ..BlazeConfig::default()
    };
    assert!(config.validate().is_empty());
}
