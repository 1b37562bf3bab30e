//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for Strand using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Strand - Dataservice to FHIR ETL
#[derive(Parser, Debug)]
#[command(name = "strand")]
#[command(version, about, long_about = None)]
#[command(author = "Strand Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "strand.toml", env = "STRAND_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "STRAND_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract, transform and load studies into the FHIR server
    Ingest(commands::ingest::IngestArgs),

    /// Delete a study's resources of one endpoint from the FHIR server
    Delete(commands::delete::DeleteArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ingest::Stages;
    use crate::domain::ResourceType;

    #[test]
    fn test_cli_parse_ingest() {
        let cli = Cli::parse_from(["strand", "ingest", "SD_ME0WME0W"]);
        assert_eq!(cli.config, "strand.toml");
        match cli.command {
            Commands::Ingest(args) => {
                assert_eq!(args.study_ids, vec!["SD_ME0WME0W".to_string()]);
                assert!(args.stages.is_none());
                assert!(args.entity_builders.is_none());
                assert!(!args.dry_run);
                assert!(!args.yes);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_ingest_options() {
        let cli = Cli::parse_from([
            "strand",
            "ingest",
            "SD_ME0WME0W",
            "SD_BHJXBDQK",
            "--stages",
            "et",
            "--entity-builders",
            "patient;specimen",
            "--write-output",
            "--dry-run",
            "-y",
        ]);
        let Commands::Ingest(args) = cli.command else {
            panic!("expected ingest");
        };
        assert_eq!(args.study_ids.len(), 2);
        assert_eq!(
            args.stages,
            Some(Stages {
                extract: true,
                transform: true,
                load: false
            })
        );
        assert_eq!(
            args.entity_builders.unwrap().0,
            vec![ResourceType::Patient, ResourceType::Specimen]
        );
        assert!(args.write_output);
        assert!(args.dry_run);
        assert!(args.yes);
    }

    #[test]
    fn test_cli_ingest_requires_study() {
        assert!(Cli::try_parse_from(["strand", "ingest"]).is_err());
    }

    #[test]
    fn test_cli_rejects_invalid_stages() {
        assert!(Cli::try_parse_from(["strand", "ingest", "SD_1", "--stages", "el"]).is_err());
        assert!(Cli::try_parse_from(["strand", "ingest", "SD_1", "--stages", "x"]).is_err());
    }

    #[test]
    fn test_cli_rejects_unknown_builder() {
        let result = Cli::try_parse_from([
            "strand",
            "ingest",
            "SD_1",
            "--entity-builders",
            "patient,unicorn",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parse_delete() {
        let cli = Cli::parse_from([
            "strand",
            "delete",
            "Patient",
            "SD_ME0WME0W",
            "--params",
            "gender=female&_count=50",
            "--yes",
        ]);
        let Commands::Delete(args) = cli.command else {
            panic!("expected delete");
        };
        assert_eq!(args.endpoint, "Patient");
        assert_eq!(args.study_id.as_str(), "SD_ME0WME0W");
        assert_eq!(
            args.params.unwrap().0,
            vec![
                ("gender".to_string(), "female".to_string()),
                ("_count".to_string(), "50".to_string())
            ]
        );
        assert!(args.yes);
    }

    #[test]
    fn test_cli_delete_rejects_bad_arguments() {
        assert!(Cli::try_parse_from(["strand", "delete", "Patient"]).is_err());
        assert!(Cli::try_parse_from(["strand", "delete", "Patient", "SD 1"]).is_err());
        let tagged = ["strand", "delete", "Patient", "SD_1", "--params", "_tag=SD_2"];
        assert!(Cli::try_parse_from(tagged).is_err());
    }

    #[test]
    fn test_cli_parse_with_config() {
        let cli = Cli::parse_from(["strand", "--config", "custom.toml", "validate-config"]);
        assert_eq!(cli.config, "custom.toml");
        assert!(matches!(cli.command, Commands::ValidateConfig(_)));
    }

    #[test]
    fn test_cli_parse_with_log_level() {
        let cli = Cli::parse_from(["strand", "--log-level", "debug", "init"]);
        assert_eq!(cli.log_level, Some("debug".to_string()));
        assert!(matches!(cli.command, Commands::Init(_)));
    }
}
