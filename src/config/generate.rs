pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# CAREPLUS INGEST CONFIGURATION
# =============================================================================
# Batch ingestion of support tickets and service logs into the bronze layer.
#
# Values may reference environment variables with $env{NAME}.
#
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/careplus/config.yml
#   3. /etc/careplus/config.yml

# =============================================================================
# OBJECT STORE
# =============================================================================
# Where raw log files live and where ticket extracts are staged.
# Supported URLs: s3://bucket[/base], file:///absolute/dir, memory://
# S3 credentials are read from the standard AWS environment variables.

object_store:
  url: s3://careplus-pipeline
  # Keys fetched per listing request
  list_page_size: 1000

# =============================================================================
# LOGS
# =============================================================================

logs:
  # Key prefix scanned by load-logs
  prefix: logs/
  # Only keys ending with this suffix are parsed
  suffix: .log
  # Local directory uploaded by upload-logs (optional)
  local_dir: ~/careplus/support-logs
  # Only local files starting with this prefix are uploaded
  local_file_prefix: support_logs_

# =============================================================================
# TICKETS
# =============================================================================

tickets:
  source:
    # DuckDB database holding the operational ticket table
    path: /var/lib/careplus/support.duckdb
    table: support_tickets
  # Fixed staging key, rewritten on every run
  staging_key: tickets/support_tickets.csv

# =============================================================================
# WAREHOUSE
# =============================================================================

warehouse:
  # DuckDB database holding the bronze schema
  path: /var/lib/careplus/warehouse.duckdb

# =============================================================================
# WORKFLOW
# =============================================================================
# Used by `careplus run`: load_tickets and load_logs, then silver, then gold.

workflow:
  retries: 1
  retry_delay: 5m
  stages:
    silver: dbt run --select silver --project-dir /opt/careplus/dbt --profiles-dir /opt/careplus/dbt
    gold: dbt run --select gold --project-dir /opt/careplus/dbt --profiles-dir /opt/careplus/dbt
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse::parse_config;

    #[test]
    fn test_starter_config_parses() {
        let config = parse_config(&generate_starter_config(), "starter").unwrap();
        assert_eq!(config.object_store.url, "s3://careplus-pipeline");
        assert_eq!(config.logs.local_file_prefix, "support_logs_");
        assert!(config.workflow.stages.gold.is_some());
    }
}
