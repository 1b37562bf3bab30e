//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "strand.toml")]
    pub output: String,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing Strand configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2);
        }

        match fs::write(&self.output, config_template()) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your settings", self.output);
                println!("  2. Create a .env file with your credentials:");
                println!("     - Set STRAND_DATASERVICE_URL");
                println!("     - Set STRAND_FHIR_USERNAME and STRAND_FHIR_PASSWORD");
                println!("  3. Validate configuration: strand validate-config");
                println!("  4. Try a study without writing: strand ingest SD_XXXXXXXX --dry-run");
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {e}");
                Ok(5)
            }
        }
    }
}

/// Commented template with every section and its defaults
pub fn config_template() -> &'static str {
    r#"# Strand Configuration File
# Dataservice to FHIR ETL
#
# Values of the form ${VAR} are read from the environment when the file is
# loaded. Any key can also be overridden with STRAND_<SECTION>_<KEY>, for
# example STRAND_LOAD_MAX_CONCURRENCY=16.

# Runtime environment: development | staging | production
environment = "development"

# ============================================================================
# Application Settings
# ============================================================================
[application]
# Log level (trace, debug, info, warn, error)
log_level = "info"

# Dry run mode: resolve and build resources, never submit them
dry_run = false

# ============================================================================
# Source of record
# ============================================================================
[dataservice]
# PostgreSQL connection string of the dataservice database
connection_string = "${STRAND_DATASERVICE_URL}"
max_connections = 10
connection_timeout_seconds = 30
statement_timeout_seconds = 60

# TLS mode: disable | prefer | require
ssl_mode = "prefer"

# Optional: dataservice REST API used to enrich genomic files
# api_url = "https://kf-api-dataservice.kidsfirstdrc.org"

# Optional: read <snapshot_dir>/<study_id>/<table>.json instead of PostgreSQL
# snapshot_dir = "./snapshots"

# ============================================================================
# FHIR Server
# ============================================================================
[fhir]
base_url = "http://localhost:8000"

# Basic authentication (optional)
username = "${STRAND_FHIR_USERNAME}"
password = "${STRAND_FHIR_PASSWORD}"

# Session cookie, sent instead of or in addition to basic auth (optional)
# cookie = "${STRAND_FHIR_COOKIE}"

# Host the server writes into pagination links instead of its public URL
placeholder_host = "http://localhost:8000"

timeout_seconds = 30

# TLS certificate verification (cannot be disabled in production)
tls_verify = true

[fhir.retry]
max_retries = 3
initial_delay_ms = 1000
max_delay_ms = 30000
backoff_multiplier = 2.0

# ============================================================================
# File metadata (DRS)
# ============================================================================
[files]
# Authority used in drs:// locators of locally hosted files
default_drs_host = "data.kidsfirstdrc.org"

# Federated metadata service
federated_base_url = "https://nci-crdc.datacommons.io"
federated_endpoint = "index/index"
# federated_host = "nci-crdc.datacommons.io"

# ============================================================================
# Load stage
# ============================================================================
[load]
# Records submitted concurrently per resource type (1-64)
max_concurrency = 8

# Entity builders to run (empty = all, in dependency order)
entity_builders = []

# Stages to run: any combination of e (extract), t (transform), l (load)
stages = "etl"

# Directory for --write-output dumps
output_dir = "./output"

# Seconds to wait for in-flight submissions after Ctrl+C
shutdown_timeout_secs = 30

# ============================================================================
# Logging
# ============================================================================
[logging]
# JSON log files in addition to console output
local_enabled = false
local_path = "./logs"

# Rotation: daily | hourly | never
local_rotation = "daily"
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StrandConfig;
    use tempfile::TempDir;

    #[test]
    fn test_template_parses() {
        let config: StrandConfig = toml::from_str(config_template()).unwrap();
        assert_eq!(config.load.stages, "etl");
        assert_eq!(config.load.max_concurrency, 8);
        assert_eq!(config.files.default_drs_host, "data.kidsfirstdrc.org");
        assert!(config.fhir.tls_verify);
    }

    #[tokio::test]
    async fn test_init_writes_file() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("strand.toml");
        let args = InitArgs {
            output: output.to_string_lossy().to_string(),
            force: false,
        };

        assert_eq!(args.execute().await.unwrap(), 0);
        let written = fs::read_to_string(&output).unwrap();
        assert!(written.contains("[fhir]"));
    }

    #[tokio::test]
    async fn test_init_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("strand.toml");
        fs::write(&output, "keep me").unwrap();

        let args = InitArgs {
            output: output.to_string_lossy().to_string(),
            force: false,
        };
        assert_eq!(args.execute().await.unwrap(), 2);
        assert_eq!(fs::read_to_string(&output).unwrap(), "keep me");

        let forced = InitArgs {
            output: output.to_string_lossy().to_string(),
            force: true,
        };
        assert_eq!(forced.execute().await.unwrap(), 0);
        assert!(fs::read_to_string(&output).unwrap().contains("[load]"));
    }
}
