//! Study snapshot types
//!
//! A [`StudySnapshot`] holds the typed source tables of exactly one study.

use super::errors::SourceError;
use super::ids::StudyId;
use super::records::*;
use super::result::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Relations read from the source of record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TableName {
    Study,
    Investigator,
    Participant,
    Family,
    FamilyRelationship,
    Diagnosis,
    Phenotype,
    Outcome,
    Biospecimen,
    BiospecimenDiagnosis,
    BiospecimenGenomicFile,
    GenomicFile,
    SequencingExperiment,
    SequencingExperimentGenomicFile,
}

impl TableName {
    /// All tables, in extraction order
    pub const ALL: [TableName; 14] = [
        TableName::Study,
        TableName::Investigator,
        TableName::Participant,
        TableName::Family,
        TableName::FamilyRelationship,
        TableName::Diagnosis,
        TableName::Phenotype,
        TableName::Outcome,
        TableName::Biospecimen,
        TableName::BiospecimenDiagnosis,
        TableName::BiospecimenGenomicFile,
        TableName::GenomicFile,
        TableName::SequencingExperiment,
        TableName::SequencingExperimentGenomicFile,
    ];

    /// Tables fetched through the study's participants
    pub const DESCENDANTS: [TableName; 12] = [
        TableName::Participant,
        TableName::Family,
        TableName::FamilyRelationship,
        TableName::Diagnosis,
        TableName::Phenotype,
        TableName::Outcome,
        TableName::Biospecimen,
        TableName::BiospecimenDiagnosis,
        TableName::BiospecimenGenomicFile,
        TableName::GenomicFile,
        TableName::SequencingExperiment,
        TableName::SequencingExperimentGenomicFile,
    ];

    /// Relational table name in the source database
    pub fn as_str(&self) -> &'static str {
        match self {
            TableName::Study => "study",
            TableName::Investigator => "investigator",
            TableName::Participant => "participant",
            TableName::Family => "family",
            TableName::FamilyRelationship => "family_relationship",
            TableName::Diagnosis => "diagnosis",
            TableName::Phenotype => "phenotype",
            TableName::Outcome => "outcome",
            TableName::Biospecimen => "biospecimen",
            TableName::BiospecimenDiagnosis => "biospecimen_diagnosis",
            TableName::BiospecimenGenomicFile => "biospecimen_genomic_file",
            TableName::GenomicFile => "genomic_file",
            TableName::SequencingExperiment => "sequencing_experiment",
            TableName::SequencingExperimentGenomicFile => "sequencing_experiment_genomic_file",
        }
    }

    /// Logical (endpoint) name of the relation, e.g. `biospecimen-diagnoses`
    pub fn endpoint(&self) -> &'static str {
        match self {
            TableName::Study => "studies",
            TableName::Investigator => "investigators",
            TableName::Participant => "participants",
            TableName::Family => "families",
            TableName::FamilyRelationship => "family-relationships",
            TableName::Diagnosis => "diagnoses",
            TableName::Phenotype => "phenotypes",
            TableName::Outcome => "outcomes",
            TableName::Biospecimen => "biospecimens",
            TableName::BiospecimenDiagnosis => "biospecimen-diagnoses",
            TableName::BiospecimenGenomicFile => "biospecimen-genomic-files",
            TableName::GenomicFile => "genomic-files",
            TableName::SequencingExperiment => "sequencing-experiments",
            TableName::SequencingExperimentGenomicFile => "sequencing-experiment-genomic-files",
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableName {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        TableName::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s || t.endpoint() == s)
            .ok_or_else(|| format!("Unknown table '{s}'"))
    }
}

/// Parses raw JSON rows of one table into typed records
///
/// The first row that fails to parse aborts with an error naming the table
/// and the row position.
pub fn parse_rows<T: DeserializeOwned>(table: TableName, rows: Vec<Value>) -> Result<Vec<T>> {
    rows.into_iter()
        .enumerate()
        .map(|(index, row)| {
            serde_json::from_value(row).map_err(|e| {
                SourceError::InvalidRow {
                    table: table.to_string(),
                    message: format!("row {index}: {e}"),
                }
                .into()
            })
        })
        .collect()
}

/// Typed tables of exactly one study
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudySnapshot {
    pub study_id: StudyId,
    pub study: StudyRecord,
    pub investigator: Option<InvestigatorRecord>,
    pub participants: Vec<ParticipantRecord>,
    pub families: Vec<FamilyRecord>,
    pub family_relationships: Vec<FamilyRelationshipRecord>,
    pub diagnoses: Vec<DiagnosisRecord>,
    pub phenotypes: Vec<PhenotypeRecord>,
    pub outcomes: Vec<OutcomeRecord>,
    pub biospecimens: Vec<BiospecimenRecord>,
    pub biospecimen_diagnoses: Vec<BiospecimenDiagnosisRecord>,
    pub biospecimen_genomic_files: Vec<BiospecimenGenomicFileRecord>,
    pub genomic_files: Vec<GenomicFileRecord>,
    pub sequencing_experiments: Vec<SequencingExperimentRecord>,
    pub sequencing_experiment_genomic_files: Vec<SequencingExperimentGenomicFileRecord>,
}

impl StudySnapshot {
    /// Creates a snapshot holding only the study row
    pub fn new(study_id: StudyId, study: StudyRecord) -> Self {
        Self {
            study_id,
            study,
            investigator: None,
            participants: Vec::new(),
            families: Vec::new(),
            family_relationships: Vec::new(),
            diagnoses: Vec::new(),
            phenotypes: Vec::new(),
            outcomes: Vec::new(),
            biospecimens: Vec::new(),
            biospecimen_diagnoses: Vec::new(),
            biospecimen_genomic_files: Vec::new(),
            genomic_files: Vec::new(),
            sequencing_experiments: Vec::new(),
            sequencing_experiment_genomic_files: Vec::new(),
        }
    }

    /// Row count per table, in extraction order
    pub fn table_sizes(&self) -> Vec<(TableName, usize)> {
        vec![
            (TableName::Study, 1),
            (TableName::Investigator, usize::from(self.investigator.is_some())),
            (TableName::Participant, self.participants.len()),
            (TableName::Family, self.families.len()),
            (TableName::FamilyRelationship, self.family_relationships.len()),
            (TableName::Diagnosis, self.diagnoses.len()),
            (TableName::Phenotype, self.phenotypes.len()),
            (TableName::Outcome, self.outcomes.len()),
            (TableName::Biospecimen, self.biospecimens.len()),
            (TableName::BiospecimenDiagnosis, self.biospecimen_diagnoses.len()),
            (TableName::BiospecimenGenomicFile, self.biospecimen_genomic_files.len()),
            (TableName::GenomicFile, self.genomic_files.len()),
            (TableName::SequencingExperiment, self.sequencing_experiments.len()),
            (
                TableName::SequencingExperimentGenomicFile,
                self.sequencing_experiment_genomic_files.len(),
            ),
        ]
    }

    /// Total number of rows across all tables
    pub fn total_rows(&self) -> usize {
        self.table_sizes().iter().map(|(_, n)| n).sum()
    }
}
