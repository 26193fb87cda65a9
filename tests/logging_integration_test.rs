//! Integration tests for logging functionality
//!
//! A process can install only one global subscriber, so a single test does
//! the initialization and the rest exercise configuration.

use shopvault::config::LoggingConfig;
use shopvault::logging::init_logging;
use tempfile::TempDir;

#[test]
fn test_logging_config_default() {
    let config = LoggingConfig::default();
    assert!(config.local_enabled);
    assert_eq!(config.local_rotation, "daily");
    assert_eq!(config.local_path, "./logs");
}

#[test]
fn test_init_logging_writes_json_file() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("logs");

    let config = LoggingConfig {
        local_enabled: true,
        local_path: log_path.to_string_lossy().to_string(),
        local_rotation: "never".to_string(),
        local_max_size_mb: 100,
    };

    let guard = init_logging("info", &config).unwrap();
    tracing::info!(target: "shopvault", data_type = "products", "Starting export");
    drop(guard);

    assert!(log_path.exists());
    let log_file = log_path.join("shopvault.log");
    let contents = std::fs::read_to_string(log_file).unwrap();
    assert!(contents.contains("Starting export"));
    assert!(contents.lines().all(|line| serde_json::from_str::<serde_json::Value>(line).is_ok()));

    // a second subscriber is refused, not a panic
    let again = init_logging("info", &LoggingConfig {
        local_enabled: false,
        ..LoggingConfig::default()
    });
    assert!(again.is_err());
}

#[test]
fn test_invalid_level_is_rejected_before_install() {
    let config = LoggingConfig {
        local_enabled: false,
        ..LoggingConfig::default()
    };
    assert!(init_logging("chatty", &config).is_err());
}
