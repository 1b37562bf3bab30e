//! Integration tests for logging functionality
//!
//! A global subscriber can only be installed once per process, so everything
//! that initializes logging lives in a single test.

use std::time::Duration;
use strand::config::LoggingConfig;
use strand::domain::StrandError;
use strand::logging::init_logging;
use tempfile::TempDir;

#[test]
fn test_logging_config_default() {
    let config = LoggingConfig::default();
    assert!(!config.local_enabled);
    assert_eq!(config.local_path, "./logs");
    assert_eq!(config.local_rotation, "daily");
}

#[test]
fn test_file_logging_writes_json_lines() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("logs");
    let config = LoggingConfig {
        local_enabled: true,
        local_path: log_path.to_string_lossy().to_string(),
        local_rotation: "never".to_string(),
    };

    // Events below are emitted from this crate's target, not `strand`
    std::env::set_var("RUST_LOG", "debug");
    let guard = init_logging("debug", &config).expect("Failed to initialize logging");
    assert!(log_path.exists());

    strand::log_ingest_start!("SD_ME0WME0W", "etl");
    strand::log_ingest_complete!(1, 42, Duration::from_secs(3));
    let error = StrandError::Configuration("bad value".to_string());
    strand::log_error_with_context!(error, "study_id=SD_ME0WME0W");

    // Flushes the non-blocking writer
    drop(guard);

    let contents: String = std::fs::read_dir(&log_path)
        .unwrap()
        .map(|entry| std::fs::read_to_string(entry.unwrap().path()).unwrap())
        .collect();
    assert!(contents.contains("Starting ingest"));
    assert!(contents.contains("\"submitted\":42"));
    assert!(contents.contains("bad value"));
    for line in contents.lines() {
        serde_json::from_str::<serde_json::Value>(line).expect("log line is JSON");
    }

    // A second subscriber is refused instead of panicking
    let second = init_logging("info", &LoggingConfig::default());
    assert!(matches!(second, Err(StrandError::Configuration(_))));
}
