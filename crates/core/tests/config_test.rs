use dagsched_core::config::*;
use dagsched_core::{LogFormat, LogLevel};
use std::env;
use std::fs;
use tempfile::NamedTempFile;

#[test]
fn test_default_config() {
    let config = AppConfig::default();
    assert!(config.validate().is_ok());

    assert_eq!(config.dispatcher.poll_interval_ms, 1000);
    assert_eq!(config.dispatcher.schedule_timeout_seconds, 60);
    assert_eq!(config.store.definitions_path, "config/jobs.toml");
    assert_eq!(config.observability.log_level, "info");
}

#[test]
fn test_config_load_from_file() {
    let toml_content = r#"
[dispatcher]
poll_interval_ms = 200
selection_strategy = "random"

[[workers]]
id = "file-worker"
worker_group = "reports"
max_concurrent_tasks = 3
"#;

    let temp_file = NamedTempFile::new().unwrap();
    fs::write(temp_file.path(), toml_content).unwrap();

    let config = AppConfig::load(Some(temp_file.path().to_str().unwrap())).unwrap();

    assert_eq!(config.dispatcher.poll_interval_ms, 200);
    assert_eq!(config.dispatcher.selection_strategy, "random");
    assert_eq!(config.workers.len(), 1);
    assert_eq!(config.workers[0].worker_group, "reports");
    // 文件中未出现的项使用默认值
    assert_eq!(config.store.definitions_path, "config/jobs.toml");
}

#[test]
fn test_config_load_nonexistent_file() {
    let result = AppConfig::load(Some("/nonexistent/scheduler.toml"));
    assert!(result.is_err());
}

#[test]
fn test_config_rejects_invalid_file() {
    let temp_file = NamedTempFile::new().unwrap();
    fs::write(
        temp_file.path(),
        "[dispatcher]\nselection_strategy = \"fastest\"\n",
    )
    .unwrap();

    let result = AppConfig::load(Some(temp_file.path().to_str().unwrap()));
    assert!(result.is_err());
}

#[test]
fn test_config_environment_override() {
    env::set_var("DAGSCHED_OBSERVABILITY__LOG_FORMAT", "json");

    let config = AppConfig::load(None);
    env::remove_var("DAGSCHED_OBSERVABILITY__LOG_FORMAT");

    let config = config.unwrap();
    assert_eq!(config.observability.log_format, "json");
    assert!(config.validate().is_ok());
}

#[test]
fn test_observability_values_parse() {
    let config = AppConfig::from_toml(
        r#"
[observability]
log_level = "warn"
log_format = "pretty"
"#,
    )
    .unwrap();

    let level: LogLevel = config.observability.log_level.parse().unwrap();
    let format: LogFormat = config.observability.log_format.parse().unwrap();
    assert_eq!(level, LogLevel::Warn);
    assert_eq!(format, LogFormat::Pretty);
}
