//! Denormalized rows and merge output

use super::ids::StudyId;
use super::records::*;
use super::resource::ResourceType;
use serde::Serialize;
use std::collections::BTreeSet;

/// One row of the denormalized study table
///
/// Every filled slot was taken from a visible source row.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DenormalizedRow {
    pub study: Option<StudyRecord>,
    pub investigator: Option<InvestigatorRecord>,
    pub participant: Option<ParticipantRecord>,
    pub family: Option<FamilyRecord>,
    pub diagnosis: Option<DiagnosisRecord>,
    pub phenotype: Option<PhenotypeRecord>,
    pub outcome: Option<OutcomeRecord>,
    pub biospecimen: Option<BiospecimenRecord>,
    pub biospecimen_diagnosis: Option<BiospecimenDiagnosisRecord>,
    pub biospecimen_genomic_file: Option<BiospecimenGenomicFileRecord>,
    pub genomic_file: Option<GenomicFileRecord>,
    pub sequencing_experiment_genomic_file: Option<SequencingExperimentGenomicFileRecord>,
    pub sequencing_experiment: Option<SequencingExperimentRecord>,
}

impl DenormalizedRow {
    pub fn study_id(&self) -> Option<&str> {
        self.study.as_ref().map(|s| s.kf_id.as_str())
    }

    pub fn investigator_id(&self) -> Option<&str> {
        self.investigator.as_ref().map(|r| r.kf_id.as_str())
    }

    pub fn participant_id(&self) -> Option<&str> {
        self.participant.as_ref().map(|r| r.kf_id.as_str())
    }

    pub fn family_id(&self) -> Option<&str> {
        self.family.as_ref().map(|r| r.kf_id.as_str())
    }

    pub fn diagnosis_id(&self) -> Option<&str> {
        self.diagnosis.as_ref().map(|r| r.kf_id.as_str())
    }

    pub fn biospecimen_id(&self) -> Option<&str> {
        self.biospecimen.as_ref().map(|r| r.kf_id.as_str())
    }

    pub fn genomic_file_id(&self) -> Option<&str> {
        self.genomic_file.as_ref().map(|r| r.kf_id.as_str())
    }

    pub fn sequencing_experiment_id(&self) -> Option<&str> {
        self.sequencing_experiment.as_ref().map(|r| r.kf_id.as_str())
    }

    /// Iterates over every filled slot's visibility flag
    pub fn visibilities(&self) -> Vec<bool> {
        fn flag<T: SourceRecord>(slot: &Option<T>) -> Option<bool> {
            slot.as_ref().map(SourceRecord::is_visible)
        }

        [
            flag(&self.study),
            flag(&self.investigator),
            flag(&self.participant),
            flag(&self.family),
            flag(&self.diagnosis),
            flag(&self.phenotype),
            flag(&self.outcome),
            flag(&self.biospecimen),
            flag(&self.biospecimen_diagnosis),
            flag(&self.biospecimen_genomic_file),
            flag(&self.genomic_file),
            flag(&self.sequencing_experiment_genomic_file),
            flag(&self.sequencing_experiment),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// Output of the join/merge engine for one study
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedStudy {
    pub study_id: StudyId,
    pub rows: Vec<DenormalizedRow>,
    pub family_relationships: Vec<FamilyRelationshipRecord>,
    pub targets: BTreeSet<ResourceType>,
}

impl MergedStudy {
    /// Empty result for a study whose row is not visible
    pub fn empty(study_id: StudyId) -> Self {
        Self {
            study_id,
            rows: Vec::new(),
            family_relationships: Vec::new(),
            targets: BTreeSet::new(),
        }
    }

    /// Returns true if the load stage should run the given resource type
    pub fn applies(&self, resource_type: ResourceType) -> bool {
        self.targets.contains(&resource_type)
    }
}
