//! Delete command implementation
//!
//! This module implements the `delete` command for removing one endpoint's
//! resources of a study from the FHIR server.

use crate::adapters::fhir::FhirClient;
use crate::config::load_config;
use crate::core::delete::{delete_study_resources, parse_search_params, DeleteSummary};
use crate::domain::StudyId;
use clap::Args;
use std::str::FromStr;

/// Extra search parameters given on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParams(pub Vec<(String, String)>);

fn parse_params(value: &str) -> Result<SearchParams, String> {
    parse_search_params(value).map(SearchParams)
}

/// Arguments for the delete command
#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// FHIR endpoint to delete from (e.g. Patient, Observation)
    #[arg(value_name = "ENDPOINT")]
    pub endpoint: String,

    /// Study whose tagged resources are deleted
    #[arg(value_name = "STUDY_ID", value_parser = StudyId::from_str)]
    pub study_id: StudyId,

    /// Extra search parameters, e.g. "code=1234&gender=female"
    #[arg(long, value_name = "PARAMS", value_parser = parse_params)]
    pub params: Option<SearchParams>,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

impl DeleteArgs {
    /// Execute the delete command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(
            endpoint = %self.endpoint,
            study_id = %self.study_id,
            "Starting delete command"
        );

        let config = match load_config(config_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load configuration");
                eprintln!("Failed to load configuration: {e}");
                return Ok(2);
            }
        };

        let endpoint = self.endpoint.trim_matches('/');
        if endpoint.is_empty() {
            eprintln!("Endpoint cannot be empty");
            return Ok(2);
        }
        let extra = self.params.as_ref().map(|p| p.0.as_slice()).unwrap_or_default();

        if !self.yes {
            println!("Delete Configuration:");
            println!("  Endpoint: {endpoint}");
            println!("  Study: {}", self.study_id);
            if !extra.is_empty() {
                let rendered: Vec<String> = extra.iter().map(|(k, v)| format!("{k}={v}")).collect();
                println!("  Search parameters: {}", rendered.join("&"));
            }
            println!("  FHIR server: {}", config.fhir.base_url);
            println!();
            print!("Delete every matching resource? [y/N]: ");
            use std::io::{self, Write};
            io::stdout().flush()?;

            let mut input = String::new();
            io::stdin().read_line(&mut input)?;

            if !input.trim().eq_ignore_ascii_case("y") {
                println!("Delete cancelled.");
                return Ok(0);
            }
        }

        let max_concurrency = config.load.max_concurrency;
        let client = match FhirClient::new(config.fhir) {
            Ok(client) => client,
            Err(e) => {
                tracing::error!(error = %e, "Failed to create FHIR client");
                eprintln!("Failed to initialize delete: {e}");
                return Ok(4);
            }
        };

        let summary = match delete_study_resources(
            &client,
            endpoint,
            &self.study_id,
            extra,
            max_concurrency,
        )
        .await
        {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!(error = %e, "Delete failed");
                eprintln!("Delete failed: {e}");
                return Ok(5);
            }
        };

        print_summary(&summary);
        Ok(if summary.is_success() { 0 } else { 1 })
    }
}

fn print_summary(summary: &DeleteSummary) {
    println!();
    println!("🗑️  Delete Summary:");
    println!("  Endpoint: {}", summary.endpoint);
    println!("  Matched: {}", summary.matched);
    println!("  Deleted: {}", summary.deleted);
    println!("  Failed: {}", summary.failures.len());
    println!("  Duration: {:.2}s", summary.duration.as_secs_f64());
    println!();

    if !summary.failures.is_empty() {
        println!("⚠️  Errors encountered:");
        for failure in &summary.failures {
            println!("  - {}: {}", failure.id, failure.message);
        }
        println!();
    }
}
