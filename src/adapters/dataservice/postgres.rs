//! PostgreSQL snapshot source
//!
//! Reads a study and its descendants straight from the dataservice database.
//! Descendant tables are scoped through `participant.study_id`; each row is
//! returned as a JSON object via `row_to_json`.

use super::client::PostgresClient;
use super::traits::SnapshotSource;
use crate::config::DataserviceConfig;
use crate::domain::{Result, StudyId, TableName};
use async_trait::async_trait;
use serde_json::Value;

const PARTICIPANTS: &str = "SELECT kf_id FROM participant WHERE study_id = $1";

/// [`SnapshotSource`] backed by the dataservice database
pub struct PostgresSource {
    client: PostgresClient,
}

impl PostgresSource {
    pub fn new(config: DataserviceConfig) -> Result<Self> {
        Ok(Self {
            client: PostgresClient::new(config)?,
        })
    }

    async fn query_rows(&self, inner: &str, id: &str) -> Result<Vec<Value>> {
        let query = format!("SELECT row_to_json(t) FROM ({inner}) t");
        self.client.query_json(&query, &[&id]).await
    }
}

#[async_trait]
impl SnapshotSource for PostgresSource {
    fn name(&self) -> &str {
        "postgresql"
    }

    async fn test_connection(&self) -> Result<()> {
        self.client.test_connection().await
    }

    async fn fetch_study(&self, study_id: &StudyId) -> Result<Option<Value>> {
        let rows = self
            .query_rows("SELECT * FROM study WHERE kf_id = $1", study_id.as_str())
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn fetch_investigator(
        &self,
        _study_id: &StudyId,
        investigator_id: &str,
    ) -> Result<Option<Value>> {
        let rows = self
            .query_rows("SELECT * FROM investigator WHERE kf_id = $1", investigator_id)
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn fetch_table(&self, study_id: &StudyId, table: TableName) -> Result<Vec<Value>> {
        match descendant_query(table) {
            Some(inner) => {
                let rows = self.query_rows(&inner, study_id.as_str()).await?;
                tracing::debug!(
                    study_id = %study_id,
                    table = %table,
                    rows = rows.len(),
                    "Fetched table"
                );
                Ok(rows)
            }
            None => Ok(Vec::new()),
        }
    }
}

/// Query selecting the rows of `table` that belong to the study bound to `$1`
///
/// Subqueries keep rows unique; json columns rule out `DISTINCT`.
pub(crate) fn descendant_query(table: TableName) -> Option<String> {
    let biospecimens = format!("SELECT kf_id FROM biospecimen WHERE participant_id IN ({PARTICIPANTS})");
    let genomic_files = format!(
        "SELECT genomic_file_id FROM biospecimen_genomic_file WHERE biospecimen_id IN ({biospecimens})"
    );

    let query = match table {
        TableName::Study | TableName::Investigator => return None,
        TableName::Participant => "SELECT * FROM participant WHERE study_id = $1".to_string(),
        TableName::Family => "SELECT * FROM family WHERE kf_id IN \
             (SELECT family_id FROM participant WHERE study_id = $1)"
            .to_string(),
        TableName::FamilyRelationship => format!(
            "SELECT * FROM family_relationship WHERE participant1_id IN ({PARTICIPANTS}) \
             OR participant2_id IN ({PARTICIPANTS})"
        ),
        TableName::Diagnosis | TableName::Phenotype | TableName::Outcome | TableName::Biospecimen => {
            format!(
                "SELECT * FROM {} WHERE participant_id IN ({PARTICIPANTS})",
                table.as_str()
            )
        }
        TableName::BiospecimenDiagnosis | TableName::BiospecimenGenomicFile => format!(
            "SELECT * FROM {} WHERE biospecimen_id IN ({biospecimens})",
            table.as_str()
        ),
        TableName::GenomicFile => {
            format!("SELECT * FROM genomic_file WHERE kf_id IN ({genomic_files})")
        }
        TableName::SequencingExperimentGenomicFile => format!(
            "SELECT * FROM sequencing_experiment_genomic_file WHERE genomic_file_id IN ({genomic_files})"
        ),
        TableName::SequencingExperiment => format!(
            "SELECT * FROM sequencing_experiment WHERE kf_id IN \
             (SELECT sequencing_experiment_id FROM sequencing_experiment_genomic_file \
             WHERE genomic_file_id IN ({genomic_files}))"
        ),
    };
    Some(query)
}
