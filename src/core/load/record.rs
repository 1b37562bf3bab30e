//! Builder input records
//!
//! Most builders consume denormalized rows directly. Family groups, file
//! groups and family relationships are aggregated from the merged study
//! first so that one record maps to one output resource.

use crate::domain::records::{
    FamilyRecord, FamilyRelationshipRecord, GenomicFileRecord, SequencingExperimentRecord,
    StudyRecord,
};
use crate::domain::{DenormalizedRow, MergedStudy};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Specimen linked to a genomic file through one of the merged rows
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct LinkedSpecimen {
    pub participant_id: String,
    pub biospecimen_id: String,
}

/// Genomic file with everything its document reference points at
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileGroup {
    pub study: StudyRecord,
    pub genomic_file: GenomicFileRecord,
    pub sequencing_experiment: Option<SequencingExperimentRecord>,
    pub specimens: Vec<LinkedSpecimen>,
}

impl FileGroup {
    /// Distinct participants linked to the file
    pub fn participant_ids(&self) -> BTreeSet<&str> {
        self.specimens
            .iter()
            .map(|s| s.participant_id.as_str())
            .collect()
    }
}

/// One input record of an entity builder
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BuilderRecord {
    Row(Box<DenormalizedRow>),
    FamilyGroup {
        study: StudyRecord,
        family: FamilyRecord,
        participant_ids: Vec<String>,
    },
    FileGroup(Box<FileGroup>),
    FamilyRelationship {
        study: StudyRecord,
        relationship: FamilyRelationshipRecord,
    },
}

impl BuilderRecord {
    /// Denormalized row behind a row record
    pub fn row(&self) -> Option<&DenormalizedRow> {
        match self {
            BuilderRecord::Row(row) => Some(row),
            _ => None,
        }
    }

    /// Study this record belongs to
    pub fn study(&self) -> Option<&StudyRecord> {
        match self {
            BuilderRecord::Row(row) => row.study.as_ref(),
            BuilderRecord::FamilyGroup { study, .. }
            | BuilderRecord::FamilyRelationship { study, .. } => Some(study),
            BuilderRecord::FileGroup(group) => Some(&group.study),
        }
    }
}

/// Rows whose projection is present, one per distinct projection
///
/// Keeps the first row seen for each projected value, in table order.
pub fn distinct_rows<K, F>(merged: &MergedStudy, project: F) -> Vec<BuilderRecord>
where
    K: Ord,
    F: Fn(&DenormalizedRow) -> Option<K>,
{
    let mut seen = BTreeSet::new();
    merged
        .rows
        .iter()
        .filter(|row| project(row).is_some_and(|key| seen.insert(key)))
        .map(|row| BuilderRecord::Row(Box::new(row.clone())))
        .collect()
}

/// Groups visible participants per family
pub fn family_groups(merged: &MergedStudy) -> Vec<BuilderRecord> {
    let mut groups: BTreeMap<String, (StudyRecord, FamilyRecord, BTreeSet<String>)> =
        BTreeMap::new();

    for row in &merged.rows {
        let (Some(study), Some(family), Some(participant)) =
            (&row.study, &row.family, &row.participant)
        else {
            continue;
        };
        groups
            .entry(family.kf_id.clone())
            .or_insert_with(|| (study.clone(), family.clone(), BTreeSet::new()))
            .2
            .insert(participant.kf_id.clone());
    }

    groups
        .into_values()
        .map(|(study, family, participants)| BuilderRecord::FamilyGroup {
            study,
            family,
            participant_ids: participants.into_iter().collect(),
        })
        .collect()
}

/// Groups rows per (genomic file, sequencing experiment)
pub fn file_groups(merged: &MergedStudy) -> Vec<BuilderRecord> {
    let mut groups: BTreeMap<(String, Option<String>), FileGroup> = BTreeMap::new();

    for row in &merged.rows {
        let (Some(study), Some(genomic_file)) = (&row.study, &row.genomic_file) else {
            continue;
        };
        let key = (
            genomic_file.kf_id.clone(),
            row.sequencing_experiment_id().map(str::to_string),
        );
        let group = groups.entry(key).or_insert_with(|| FileGroup {
            study: study.clone(),
            genomic_file: genomic_file.clone(),
            sequencing_experiment: row.sequencing_experiment.clone(),
            specimens: Vec::new(),
        });

        if let (Some(participant_id), Some(biospecimen_id)) =
            (row.participant_id(), row.biospecimen_id())
        {
            let specimen = LinkedSpecimen {
                participant_id: participant_id.to_string(),
                biospecimen_id: biospecimen_id.to_string(),
            };
            if !group.specimens.contains(&specimen) {
                group.specimens.push(specimen);
            }
        }
    }

    groups
        .into_values()
        .map(|mut group| {
            group.specimens.sort();
            BuilderRecord::FileGroup(Box::new(group))
        })
        .collect()
}

/// One record per family relationship in the side table
pub fn family_relationships(merged: &MergedStudy) -> Vec<BuilderRecord> {
    let Some(study) = merged.rows.iter().find_map(|row| row.study.clone()) else {
        return Vec::new();
    };
    merged
        .family_relationships
        .iter()
        .map(|relationship| BuilderRecord::FamilyRelationship {
            study: study.clone(),
            relationship: relationship.clone(),
        })
        .collect()
}
