//! Ingest coordinator - main orchestrator for a run
//!
//! Extracts every requested study, merges each snapshot into its denormalized
//! table and loads the result into the FHIR server, honouring the selected
//! stages, builders and shutdown signal.

use crate::adapters::dataservice::{create_snapshot_source, DataserviceApi, SnapshotSource};
use crate::adapters::drs::{FileMetadataResolver, HttpFederatedSource};
use crate::adapters::fhir::FhirClient;
use crate::config::StrandConfig;
use crate::core::extract::SnapshotExtractor;
use crate::core::load::{registry, IdCache, IngestError, IngestSummary, LoadStage};
use crate::core::load::{EntityBuilder, IngestErrorType};
use crate::core::transform::merge_study;
use crate::domain::{MergedStudy, ResourceType, Result, StrandError, StudyId};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

/// Stages of a run, parsed from a string of `e`, `t` and `l`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stages {
    pub extract: bool,
    pub transform: bool,
    pub load: bool,
}

impl Stages {
    pub const ALL: Stages = Stages {
        extract: true,
        transform: true,
        load: true,
    };
}

impl FromStr for Stages {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("at least one of the stages e, t, l is required".to_string());
        }

        let mut stages = Stages {
            extract: false,
            transform: false,
            load: false,
        };
        for c in s.chars() {
            match c.to_ascii_lowercase() {
                'e' => stages.extract = true,
                't' => stages.transform = true,
                'l' => stages.load = true,
                other => return Err(format!("unknown stage '{other}' in '{s}', expected e, t or l")),
            }
        }

        if stages.transform && !stages.extract {
            return Err(format!("stage t requires e, got '{s}'"));
        }
        if stages.load && !stages.transform {
            return Err(format!("stage l requires t, got '{s}'"));
        }
        Ok(stages)
    }
}

impl fmt::Display for Stages {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (enabled, c) in [(self.extract, 'e'), (self.transform, 't'), (self.load, 'l')] {
            if enabled {
                write!(f, "{c}")?;
            }
        }
        Ok(())
    }
}

/// Per-run options coming from the command line
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub stages: Stages,
    /// Builders to run, in any order (empty = all)
    pub entity_builders: Vec<ResourceType>,
    /// Dump each denormalized table under the output directory
    pub write_output: bool,
    pub dry_run: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            stages: Stages::ALL,
            entity_builders: Vec::new(),
            write_output: false,
            dry_run: false,
        }
    }
}

/// Ingest coordinator
pub struct IngestCoordinator {
    config: StrandConfig,
    source: Arc<dyn SnapshotSource>,
    shutdown_signal: watch::Receiver<bool>,
}

impl IngestCoordinator {
    /// Create a coordinator reading from the configured source of record
    pub fn new(config: StrandConfig, shutdown_signal: watch::Receiver<bool>) -> Result<Self> {
        let source = create_snapshot_source(&config.dataservice)?;
        Ok(Self::with_source(config, source, shutdown_signal))
    }

    /// Create a coordinator over an explicit snapshot source
    pub fn with_source(
        config: StrandConfig,
        source: Arc<dyn SnapshotSource>,
        shutdown_signal: watch::Receiver<bool>,
    ) -> Self {
        Self {
            config,
            source,
            shutdown_signal,
        }
    }

    /// Checks that the source of record is reachable
    pub async fn test_connection(&self) -> Result<()> {
        self.source.test_connection().await
    }

    /// Execute a run over `study_ids`
    ///
    /// 1. Extracts every study (all-or-nothing)
    /// 2. Merges each snapshot and optionally dumps the result
    /// 3. Loads each merged study with the selected builders
    ///
    /// # Errors
    ///
    /// Returns fatal errors only: source inconsistencies, pagination
    /// integrity violations and client construction failures. Everything
    /// else is recorded in the summary.
    pub async fn execute(
        &self,
        study_ids: &[StudyId],
        options: &IngestOptions,
    ) -> Result<IngestSummary> {
        let start_time = Instant::now();
        let mut summary = IngestSummary::new();
        let joined_ids = study_ids
            .iter()
            .map(StudyId::as_str)
            .collect::<Vec<_>>()
            .join(",");
        crate::log_ingest_start!(joined_ids, options.stages);

        let extractor = SnapshotExtractor::new(self.source.clone());
        let snapshots = extractor.extract(study_ids).await?;
        summary.studies_processed = snapshots.len();

        if !options.stages.transform {
            for snapshot in &snapshots {
                for (table, rows) in snapshot.table_sizes() {
                    tracing::info!(study_id = %snapshot.study_id, table = %table, rows, "Table size");
                }
            }
            return Ok(self.finish(summary, start_time));
        }

        let merged: Vec<MergedStudy> = snapshots.iter().map(merge_study).collect();

        if options.write_output {
            let output_dir = Path::new(&self.config.load.output_dir);
            for study in &merged {
                if let Err(e) = write_output(output_dir, study).await {
                    crate::log_error_with_context!(e, study.study_id);
                    summary.add_error(
                        IngestError::new(IngestErrorType::Output, e.to_string())
                            .with_context(format!("study_id={}", study.study_id)),
                    );
                }
            }
        }

        if !options.stages.load {
            return Ok(self.finish(summary, start_time));
        }

        let stage = self.load_stage(options.dry_run)?;
        let builders = select_builders(&options.entity_builders);

        for study in &merged {
            if *self.shutdown_signal.borrow() {
                tracing::warn!(study_id = %study.study_id, "Shutdown requested, not loading study");
                summary.interrupted = true;
                break;
            }

            tracing::info!(study_id = %study.study_id, "Loading study");
            let study_summary = stage.run(study, &builders).await?;
            summary.merge(study_summary);
            if summary.interrupted {
                break;
            }
        }

        Ok(self.finish(summary, start_time))
    }

    fn finish(&self, summary: IngestSummary, start_time: Instant) -> IngestSummary {
        let summary = summary.with_duration(start_time.elapsed());
        summary.log_summary();
        crate::log_ingest_complete!(
            summary.studies_processed,
            summary.total_submitted(),
            summary.duration
        );
        summary
    }

    /// Wires the FHIR client, file resolver and id cache for one run
    fn load_stage(&self, dry_run: bool) -> Result<LoadStage> {
        let fhir = &self.config.fhir;
        let client = Arc::new(FhirClient::new(fhir.clone())?);
        let federated = Arc::new(HttpFederatedSource::new(
            &self.config.files,
            fhir.retry.clone(),
            fhir.timeout_seconds,
        )?);
        let files = Arc::new(FileMetadataResolver::new(&self.config.files, federated)?);
        let dataservice = match &self.config.dataservice.api_url {
            Some(api_url) => Some(Arc::new(DataserviceApi::new(
                api_url,
                fhir.retry.clone(),
                fhir.timeout_seconds,
            )?)),
            None => None,
        };

        Ok(LoadStage::new(
            client,
            Arc::new(IdCache::new()),
            files,
            dataservice,
            self.config.load.max_concurrency,
            dry_run || self.config.application.dry_run,
            self.shutdown_signal.clone(),
        ))
    }
}

/// Registry entries for the selected types, kept in dependency order
pub fn select_builders(selected: &[ResourceType]) -> Vec<Arc<dyn EntityBuilder>> {
    registry()
        .into_iter()
        .filter(|b| selected.is_empty() || selected.contains(&b.resource_type()))
        .collect()
}

/// Writes `denormalized.json` and `family_relationships.json` for one study
pub async fn write_output(output_dir: &Path, study: &MergedStudy) -> Result<()> {
    let dir = output_dir.join(study.study_id.as_str());
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| StrandError::Io(format!("Failed to create {}: {e}", dir.display())))?;

    let files = [
        ("denormalized.json", serde_json::to_string_pretty(&study.rows)?),
        (
            "family_relationships.json",
            serde_json::to_string_pretty(&study.family_relationships)?,
        ),
    ];
    for (name, content) in files {
        let path = dir.join(name);
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| StrandError::Io(format!("Failed to write {}: {e}", path.display())))?;
    }

    tracing::info!(study_id = %study.study_id, path = %dir.display(), "Wrote merged output");
    Ok(())
}
