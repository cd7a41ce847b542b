use careplus_ingest::config::{generate::generate_starter_config, load_config, ConfigError};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_generated_config_is_valid() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yml");
    fs::write(&config_path, generate_starter_config()).unwrap();

    let config = load_config(&config_path).expect("Generated config should be valid");

    assert_eq!(config.object_store.url, "s3://careplus-pipeline");
    assert_eq!(config.logs.prefix, "logs/");
    assert_eq!(config.logs.local_file_prefix, "support_logs_");
    assert_eq!(config.tickets.source.table, "support_tickets");
    assert_eq!(config.workflow.retries, 1);
    assert_eq!(config.workflow.retry_delay, Duration::from_secs(300));
}

#[test]
fn test_env_vars_and_tilde_expanded() {
    std::env::set_var("CAREPLUS_TEST_BUCKET", "careplus-test");
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yml");
    fs::write(
        &config_path,
        r#"
object_store:
  url: s3://$env{CAREPLUS_TEST_BUCKET}/raw
logs:
  local_dir: ~/support-logs
tickets:
  source:
    path: ~/support.duckdb
warehouse:
  path: /tmp/warehouse.duckdb
workflow:
  retries: 2
  retry_delay: 30s
  stages:
    silver: dbt run --select silver
"#,
    )
    .unwrap();

    let config = load_config(&config_path).unwrap();

    assert_eq!(config.object_store.url, "s3://careplus-test/raw");
    if let Some(home) = dirs::home_dir() {
        assert_eq!(config.tickets.source.path, home.join("support.duckdb"));
        assert_eq!(config.logs.local_dir, Some(home.join("support-logs")));
    }
    assert_eq!(config.workflow.retries, 2);
    assert_eq!(config.workflow.retry_delay, Duration::from_secs(30));
    assert_eq!(
        config.workflow.stages.silver.as_deref(),
        Some("dbt run --select silver")
    );
    assert!(config.workflow.stages.gold.is_none());
}

#[test]
fn test_missing_file_is_io_error() {
    let temp_dir = TempDir::new().unwrap();
    let err = load_config(&temp_dir.path().join("absent.yml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
fn test_missing_section_is_parse_error() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yml");
    fs::write(&config_path, "object_store:\n  url: memory://\n").unwrap();

    let err = load_config(&config_path).unwrap_err();
    assert!(matches!(err, ConfigError::YamlParse { .. }));
}
