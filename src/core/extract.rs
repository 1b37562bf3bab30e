//! Snapshot extraction
//!
//! Pulls each requested study and all its descendant tables from the source
//! of record and parses them into typed records. Extraction is read-only and
//! all-or-nothing: a missing study or a study count mismatch fails the whole
//! run before anything is written anywhere.

use crate::adapters::dataservice::SnapshotSource;
use crate::domain::records::{InvestigatorRecord, StudyRecord};
use crate::domain::snapshot::parse_rows;
use crate::domain::{Result, SourceError, StudyId, StudySnapshot, TableName};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Builds [`StudySnapshot`]s from a [`SnapshotSource`]
pub struct SnapshotExtractor {
    source: Arc<dyn SnapshotSource>,
}

impl SnapshotExtractor {
    pub fn new(source: Arc<dyn SnapshotSource>) -> Self {
        Self { source }
    }

    /// Extracts one snapshot per requested study id
    ///
    /// # Errors
    ///
    /// Fails with [`SourceError::StudyNotFound`] for the first unknown id and
    /// with [`SourceError::StudyCountMismatch`] when the number of distinct
    /// studies found differs from the number requested. Source errors
    /// propagate unchanged.
    pub async fn extract(&self, study_ids: &[StudyId]) -> Result<Vec<StudySnapshot>> {
        let expected: BTreeSet<&str> = study_ids.iter().map(StudyId::as_str).collect();
        let mut found: BTreeSet<String> = BTreeSet::new();
        let mut snapshots = Vec::with_capacity(expected.len());

        for study_id in study_ids {
            if found.contains(study_id.as_str()) {
                continue;
            }

            tracing::info!(study_id = %study_id, source = self.source.name(), "Extracting study");
            let snapshot = self.extract_study(study_id).await?;

            if snapshot.study.kf_id == study_id.as_str() {
                found.insert(snapshot.study.kf_id.clone());
            }

            for (table, rows) in snapshot.table_sizes() {
                tracing::debug!(study_id = %study_id, table = %table, rows, "Extracted table");
            }
            tracing::info!(
                study_id = %study_id,
                rows = snapshot.total_rows(),
                "Extracted study"
            );
            snapshots.push(snapshot);
        }

        if found.len() != expected.len() {
            return Err(SourceError::StudyCountMismatch {
                expected: expected.len(),
                found: found.len(),
            }
            .into());
        }

        Ok(snapshots)
    }

    async fn extract_study(&self, study_id: &StudyId) -> Result<StudySnapshot> {
        let study_row = self
            .source
            .fetch_study(study_id)
            .await?
            .ok_or_else(|| SourceError::StudyNotFound(study_id.to_string()))?;
        let study: StudyRecord = parse_rows(TableName::Study, vec![study_row])?
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::StudyNotFound(study_id.to_string()))?;

        let mut snapshot = StudySnapshot::new(study_id.clone(), study);

        if let Some(investigator_id) = snapshot.study.investigator_id.clone() {
            if let Some(row) = self
                .source
                .fetch_investigator(study_id, &investigator_id)
                .await?
            {
                let investigator: Vec<InvestigatorRecord> =
                    parse_rows(TableName::Investigator, vec![row])?;
                snapshot.investigator = investigator.into_iter().next();
            }
        }

        for table in TableName::DESCENDANTS {
            let rows = self.source.fetch_table(study_id, table).await?;
            match table {
                TableName::Participant => snapshot.participants = parse_rows(table, rows)?,
                TableName::Family => snapshot.families = parse_rows(table, rows)?,
                TableName::FamilyRelationship => {
                    snapshot.family_relationships = parse_rows(table, rows)?
                }
                TableName::Diagnosis => snapshot.diagnoses = parse_rows(table, rows)?,
                TableName::Phenotype => snapshot.phenotypes = parse_rows(table, rows)?,
                TableName::Outcome => snapshot.outcomes = parse_rows(table, rows)?,
                TableName::Biospecimen => snapshot.biospecimens = parse_rows(table, rows)?,
                TableName::BiospecimenDiagnosis => {
                    snapshot.biospecimen_diagnoses = parse_rows(table, rows)?
                }
                TableName::BiospecimenGenomicFile => {
                    snapshot.biospecimen_genomic_files = parse_rows(table, rows)?
                }
                TableName::GenomicFile => snapshot.genomic_files = parse_rows(table, rows)?,
                TableName::SequencingExperiment => {
                    snapshot.sequencing_experiments = parse_rows(table, rows)?
                }
                TableName::SequencingExperimentGenomicFile => {
                    snapshot.sequencing_experiment_genomic_files = parse_rows(table, rows)?
                }
                TableName::Study | TableName::Investigator => {}
            }
        }

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StrandError;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemorySource {
        studies: HashMap<String, Value>,
        tables: HashMap<(String, TableName), Vec<Value>>,
    }

    #[async_trait]
    impl SnapshotSource for MemorySource {
        fn name(&self) -> &str {
            "memory"
        }

        async fn test_connection(&self) -> Result<()> {
            Ok(())
        }

        async fn fetch_study(&self, study_id: &StudyId) -> Result<Option<Value>> {
            Ok(self.studies.get(study_id.as_str()).cloned())
        }

        async fn fetch_investigator(
            &self,
            study_id: &StudyId,
            investigator_id: &str,
        ) -> Result<Option<Value>> {
            Ok(self
                .tables
                .get(&(study_id.to_string(), TableName::Investigator))
                .and_then(|rows| {
                    rows.iter()
                        .find(|r| r["kf_id"] == investigator_id)
                        .cloned()
                }))
        }

        async fn fetch_table(&self, study_id: &StudyId, table: TableName) -> Result<Vec<Value>> {
            Ok(self
                .tables
                .get(&(study_id.to_string(), table))
                .cloned()
                .unwrap_or_default())
        }
    }

    fn source() -> MemorySource {
        let mut source = MemorySource::default();
        source.studies.insert(
            "SD_1".into(),
            json!({"kf_id": "SD_1", "visible": true, "investigator_id": "IG_1",
                   "uuid": "x", "created_at": "2020-01-01", "modified_at": "2020-01-02"}),
        );
        source.tables.insert(
            ("SD_1".into(), TableName::Investigator),
            vec![json!({"kf_id": "IG_1", "visible": true, "name": "Jane Doe"})],
        );
        source.tables.insert(
            ("SD_1".into(), TableName::Participant),
            vec![
                json!({"kf_id": "PT_1", "visible": true, "study_id": "SD_1"}),
                json!({"kf_id": "PT_2", "visible": false, "study_id": "SD_1"}),
            ],
        );
        source
    }

    #[tokio::test]
    async fn test_extract_builds_snapshot() {
        let extractor = SnapshotExtractor::new(Arc::new(source()));
        let snapshots = extractor
            .extract(&[StudyId::new("SD_1").unwrap()])
            .await
            .unwrap();

        assert_eq!(snapshots.len(), 1);
        let snapshot = &snapshots[0];
        assert_eq!(snapshot.participants.len(), 2);
        assert_eq!(
            snapshot.investigator.as_ref().and_then(|i| i.name.as_deref()),
            Some("Jane Doe")
        );
        assert!(snapshot.diagnoses.is_empty());
    }

    #[tokio::test]
    async fn test_missing_study_is_fatal() {
        let extractor = SnapshotExtractor::new(Arc::new(source()));
        let err = extractor
            .extract(&[StudyId::new("SD_1").unwrap(), StudyId::new("SD_2").unwrap()])
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Source error: SD_2 not found");
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_mismatched_study_row_fails_count_check() {
        let mut source = source();
        source.studies.insert(
            "SD_3".into(),
            json!({"kf_id": "SD_OTHER", "visible": true}),
        );
        let extractor = SnapshotExtractor::new(Arc::new(source));

        let err = extractor
            .extract(&[StudyId::new("SD_1").unwrap(), StudyId::new("SD_3").unwrap()])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StrandError::Source(SourceError::StudyCountMismatch {
                expected: 2,
                found: 1
            })
        ));
    }

    #[tokio::test]
    async fn test_invalid_row_names_table() {
        let mut source = source();
        source.tables.insert(
            ("SD_1".into(), TableName::Outcome),
            vec![json!({"kf_id": "OC_1", "visible": "maybe"})],
        );
        let extractor = SnapshotExtractor::new(Arc::new(source));

        let err = extractor
            .extract(&[StudyId::new("SD_1").unwrap()])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("'outcome'"));
    }
}
