//! Ingest command implementation
//!
//! This module implements the `ingest` command for loading studies from the
//! dataservice into the FHIR server.

use crate::config::load_config;
use crate::core::ingest::{IngestCoordinator, IngestOptions, Stages};
use crate::core::load::IngestSummary;
use crate::domain::{ResourceType, StudyId};
use clap::Args;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::watch;

/// Entity builders selected on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuilderSelection(pub Vec<ResourceType>);

/// Parses a comma or semicolon separated list of builder names
pub fn parse_entity_builders(value: &str) -> Result<BuilderSelection, String> {
    let mut selected = Vec::new();
    for name in value.split([',', ';']).map(str::trim).filter(|n| !n.is_empty()) {
        let resource_type = ResourceType::from_str(name)?;
        if !selected.contains(&resource_type) {
            selected.push(resource_type);
        }
    }
    if selected.is_empty() {
        return Err("no entity builder named".to_string());
    }
    Ok(BuilderSelection(selected))
}

/// Arguments for the ingest command
#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Study ids to ingest (e.g. SD_BHJXBDQK)
    #[arg(required = true, value_name = "STUDY_IDS")]
    pub study_ids: Vec<String>,

    /// Entity builders to run, comma or semicolon separated (default: all)
    #[arg(long, value_name = "BUILDERS", value_parser = parse_entity_builders)]
    pub entity_builders: Option<BuilderSelection>,

    /// Stages to run: e (extract), t (transform), l (load)
    #[arg(long, value_parser = Stages::from_str)]
    pub stages: Option<Stages>,

    /// Write each merged study under the configured output directory
    #[arg(long)]
    pub write_output: bool,

    /// Dry run mode - resolve and build payloads without submitting them
    #[arg(long)]
    pub dry_run: bool,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

impl IngestArgs {
    /// Execute the ingest command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting ingest command");

        let mut config = match load_config(config_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load configuration");
                eprintln!("Failed to load configuration: {e}");
                return Ok(2);
            }
        };

        if let Some(stages) = &self.stages {
            tracing::info!(stages = %stages, "Overriding stages from CLI");
            config.load.stages = stages.to_string();
        }

        if let Some(BuilderSelection(builders)) = &self.entity_builders {
            let names: Vec<String> = builders.iter().map(|b| b.name().to_string()).collect();
            tracing::info!(entity_builders = ?names, "Overriding entity builders from CLI");
            config.load.entity_builders = names;
        }

        if self.dry_run {
            tracing::info!("Enabling dry-run mode from CLI");
            config.application.dry_run = true;
        }

        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Configuration validation failed");
            eprintln!("Configuration validation failed: {e}");
            return Ok(2);
        }

        let study_ids = match self
            .study_ids
            .iter()
            .map(|id| StudyId::from_str(id))
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(ids) => ids,
            Err(e) => {
                eprintln!("Invalid study id: {e}");
                return Ok(2);
            }
        };

        // Both values were checked by validate()
        let stages = Stages::from_str(&config.load.stages).unwrap_or(Stages::ALL);
        let entity_builders = config
            .load
            .entity_builders
            .iter()
            .filter_map(|name| ResourceType::from_str(name).ok())
            .collect::<Vec<_>>();
        let dry_run = config.application.dry_run;

        if dry_run {
            tracing::info!("Dry run mode enabled - nothing will be submitted");
            println!("🔍 DRY RUN MODE - No resources will be written to the FHIR server");
            println!();
        }

        if !self.yes && !dry_run && stages.load {
            println!("Ingest Configuration:");
            println!("  Studies: {}", self.study_ids.join(", "));
            println!("  Stages: {stages}");
            println!("  FHIR server: {}", config.fhir.base_url);
            println!(
                "  Entity builders: {}",
                if entity_builders.is_empty() {
                    "All".to_string()
                } else {
                    config.load.entity_builders.join(", ")
                }
            );
            println!("  Max concurrency: {}", config.load.max_concurrency);
            println!();
            print!("Proceed with ingest? [y/N]: ");
            use std::io::{self, Write};
            io::stdout().flush()?;

            let mut input = String::new();
            io::stdin().read_line(&mut input)?;

            if !input.trim().eq_ignore_ascii_case("y") {
                println!("Ingest cancelled.");
                return Ok(0);
            }
        }

        let shutdown_timeout = Duration::from_secs(config.load.shutdown_timeout_secs);
        let options = IngestOptions {
            stages,
            entity_builders,
            write_output: self.write_output,
            dry_run,
        };

        tracing::info!("Creating ingest coordinator");
        let coordinator = match IngestCoordinator::new(config, shutdown_signal.clone()) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to create ingest coordinator");
                eprintln!("Failed to initialize ingest: {e}");
                return Ok(4);
            }
        };

        if let Err(e) = coordinator.test_connection().await {
            tracing::error!(error = %e, "Source of record is not reachable");
            eprintln!("Failed to connect to the dataservice: {e}");
            return Ok(4);
        }

        println!("🚀 Starting ingest...");
        println!();

        let run = coordinator.execute(&study_ids, &options);
        tokio::pin!(run);
        let mut shutdown = shutdown_signal;
        let result = tokio::select! {
            result = &mut run => result,
            _ = shutdown_deadline(&mut shutdown, shutdown_timeout) => {
                tracing::warn!(
                    timeout_secs = shutdown_timeout.as_secs(),
                    "Shutdown timeout elapsed, abandoning in-flight submissions"
                );
                eprintln!("⚠️  Shutdown timeout elapsed, exiting");
                return Ok(130);
            }
        };

        let summary = match result {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "Ingest failed");
                eprintln!("Ingest failed: {e}");
                return Ok(5);
            }
        };

        print_summary(&summary);
        Ok(exit_code(&summary))
    }
}

/// Resolves once a shutdown was requested and `timeout` has passed since
async fn shutdown_deadline(shutdown: &mut watch::Receiver<bool>, timeout: Duration) {
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
    tokio::time::sleep(timeout).await;
}

fn print_summary(summary: &IngestSummary) {
    println!();
    println!("📊 Ingest Summary:");
    println!(
        "  Started: {}",
        summary.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("  Studies: {}", summary.studies_processed);
    for (resource_type, counts) in &summary.counts {
        println!(
            "  {:<24} created {:>6}  updated {:>6}  failed {:>5}  skipped {:>5}  dry-run {:>5}",
            resource_type.name(),
            counts.created,
            counts.updated,
            counts.failed,
            counts.skipped,
            counts.dry_run
        );
    }
    println!("  Duration: {:.2}s", summary.duration.as_secs_f64());
    println!();

    if !summary.errors.is_empty() {
        println!("⚠️  Errors encountered:");
        for error in &summary.errors {
            println!("  - {:?}: {}", error.error_type, error.message);
            if let Some(context) = &error.context {
                println!("    Context: {context}");
            }
        }
        println!();
    }
}

/// Exit code of a finished run
pub fn exit_code(summary: &IngestSummary) -> i32 {
    if summary.interrupted {
        println!("⚠️  Ingest interrupted. Resources already submitted are kept.");
        println!("   Run the same command again to continue; existing resources are updated.");
        tracing::info!("Ingest interrupted by user signal");
        130
    } else if summary.is_successful() {
        println!("✅ Ingest completed successfully!");
        0
    } else {
        println!("⚠️  Ingest completed with failures");
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::load::{IngestError, IngestErrorType};
    use test_case::test_case;

    #[test_case("patient", vec![ResourceType::Patient] ; "single")]
    #[test_case("patient,specimen", vec![ResourceType::Patient, ResourceType::Specimen] ; "comma")]
    #[test_case("patient; disease ;", vec![ResourceType::Patient, ResourceType::Disease] ; "semicolon")]
    #[test_case("patient,patient", vec![ResourceType::Patient] ; "duplicates")]
    fn test_parse_entity_builders(input: &str, expected: Vec<ResourceType>) {
        assert_eq!(parse_entity_builders(input).unwrap(), BuilderSelection(expected));
    }

    #[test_case("" ; "empty")]
    #[test_case("patient,unicorn" ; "unknown name")]
    fn test_parse_entity_builders_rejected(input: &str) {
        assert!(parse_entity_builders(input).is_err());
    }

    #[test]
    fn test_exit_codes() {
        let mut summary = IngestSummary::new();
        assert_eq!(exit_code(&summary), 0);

        summary.add_error(IngestError::new(IngestErrorType::Rejected, "nope".to_string()));
        assert_eq!(exit_code(&summary), 1);

        summary.interrupted = true;
        assert_eq!(exit_code(&summary), 130);
    }

    #[tokio::test]
    async fn test_shutdown_deadline_waits_for_signal() {
        let (tx, mut rx) = watch::channel(false);
        let deadline = shutdown_deadline(&mut rx, Duration::from_millis(1));
        tokio::pin!(deadline);

        let early = tokio::time::timeout(Duration::from_millis(20), &mut deadline).await;
        assert!(early.is_err());

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), deadline)
            .await
            .unwrap();
    }
}
