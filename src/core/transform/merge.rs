//! Join/merge engine
//!
//! Folds a [`StudySnapshot`] into one denormalized table. Every step filters
//! its right-hand table to visible rows, joins it onto the accumulated rows
//! and reports which resource types it made applicable. Steps are pure: they
//! take the accumulated rows and return new ones.
//!
//! Cardinality: participants join inner from the participant side; every
//! later table joins left outer onto the accumulated rows, and right-hand
//! rows that match nothing are dropped.

use crate::domain::records::*;
use crate::domain::{DenormalizedRow, MergedStudy, ResourceType, StudySnapshot};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::hash::Hash;

/// Output of one join step: the new rows and the types it contributed
pub type StepOutput = (Vec<DenormalizedRow>, Vec<ResourceType>);

/// Merges one study snapshot into its denormalized table
///
/// Returns an empty result when the study row itself is not visible.
pub fn merge_study(snapshot: &StudySnapshot) -> MergedStudy {
    if !snapshot.study.visible {
        tracing::warn!(study_id = %snapshot.study_id, "Study is not visible, nothing to load");
        return MergedStudy::empty(snapshot.study_id.clone());
    }

    let mut targets: BTreeSet<ResourceType> = BTreeSet::new();
    let mut rows = vec![DenormalizedRow {
        study: Some(snapshot.study.clone()),
        ..Default::default()
    }];
    targets.insert(ResourceType::ResearchStudy);

    let steps: [&dyn Fn(Vec<DenormalizedRow>) -> StepOutput; 12] = [
        &|rows| join_investigator(rows, snapshot.investigator.as_ref()),
        &|rows| join_participants(rows, &snapshot.participants),
        &|rows| join_families(rows, &snapshot.families),
        &|rows| join_diagnoses(rows, &snapshot.diagnoses),
        &|rows| join_phenotypes(rows, &snapshot.phenotypes),
        &|rows| join_outcomes(rows, &snapshot.outcomes),
        &|rows| join_biospecimens(rows, &snapshot.biospecimens),
        &|rows| join_biospecimen_diagnoses(rows, &snapshot.biospecimen_diagnoses),
        &|rows| join_biospecimen_genomic_files(rows, &snapshot.biospecimen_genomic_files),
        &|rows| join_genomic_files(rows, &snapshot.genomic_files),
        &|rows| {
            join_sequencing_experiment_genomic_files(
                rows,
                &snapshot.sequencing_experiment_genomic_files,
            )
        },
        &|rows| join_sequencing_experiments(rows, &snapshot.sequencing_experiments),
    ];

    for step in steps {
        let (next, contributed) = step(rows);
        rows = next;
        targets.extend(contributed);
    }

    let rows = dedupe_rows(rows);
    let family_relationships = filter_family_relationships(snapshot);
    if !family_relationships.is_empty() {
        targets.insert(ResourceType::FamilyRelationship);
    }

    tracing::info!(
        study_id = %snapshot.study_id,
        rows = rows.len(),
        family_relationships = family_relationships.len(),
        targets = targets.len(),
        "Merged study"
    );

    MergedStudy {
        study_id: snapshot.study_id.clone(),
        rows,
        family_relationships,
        targets,
    }
}

/// Left outer join of visible `right` rows onto `rows`
///
/// Each accumulated row is repeated once per matching right row, or kept
/// unchanged when nothing matches. Returns whether anything matched.
fn left_join<R, K>(
    rows: Vec<DenormalizedRow>,
    right: &[R],
    left_key: impl Fn(&DenormalizedRow) -> Option<K>,
    right_key: impl Fn(&R) -> Option<K>,
    assign: impl Fn(&mut DenormalizedRow, R),
) -> (Vec<DenormalizedRow>, bool)
where
    R: SourceRecord + Clone,
    K: Hash + Eq,
{
    let mut index: HashMap<K, Vec<&R>> = HashMap::new();
    for record in right.iter().filter(|r| r.is_visible()) {
        if let Some(key) = right_key(record) {
            index.entry(key).or_default().push(record);
        }
    }
    if index.is_empty() {
        return (rows, false);
    }

    let mut matched = false;
    let mut joined = Vec::with_capacity(rows.len());
    for row in rows {
        let matches = left_key(&row).and_then(|key| index.get(&key));
        match matches {
            Some(records) => {
                matched = true;
                for record in records {
                    let mut next = row.clone();
                    assign(&mut next, (*record).clone());
                    joined.push(next);
                }
            }
            None => joined.push(row),
        }
    }
    (joined, matched)
}

fn contributes(matched: bool, types: &[ResourceType]) -> Vec<ResourceType> {
    if matched {
        types.to_vec()
    } else {
        Vec::new()
    }
}

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_string)
}

pub fn join_investigator(
    rows: Vec<DenormalizedRow>,
    investigator: Option<&InvestigatorRecord>,
) -> StepOutput {
    let investigators: Vec<InvestigatorRecord> = investigator.into_iter().cloned().collect();
    let (rows, matched) = left_join(
        rows,
        &investigators,
        |row| row.study.as_ref().and_then(|s| s.investigator_id.clone()),
        |inv| Some(inv.kf_id.clone()),
        |row, inv| row.investigator = Some(inv),
    );
    (
        rows,
        contributes(
            matched,
            &[
                ResourceType::Practitioner,
                ResourceType::Organization,
                ResourceType::PractitionerRole,
            ],
        ),
    )
}

/// Inner join from the participant side
///
/// Participants that do not belong to the visible study row are dropped. If
/// none remain, the accumulated rows are returned untouched.
pub fn join_participants(
    rows: Vec<DenormalizedRow>,
    participants: &[ParticipantRecord],
) -> StepOutput {
    let (rows, matched) = left_join(
        rows,
        participants,
        |row| owned(row.study_id()),
        |p| p.study_id.clone(),
        |row, p| row.participant = Some(p),
    );
    (
        rows,
        contributes(
            matched,
            &[
                ResourceType::Patient,
                ResourceType::ProbandStatus,
                ResourceType::ResearchSubject,
            ],
        ),
    )
}

pub fn join_families(rows: Vec<DenormalizedRow>, families: &[FamilyRecord]) -> StepOutput {
    let (rows, matched) = left_join(
        rows,
        families,
        |row| row.participant.as_ref().and_then(|p| p.family_id.clone()),
        |f| Some(f.kf_id.clone()),
        |row, f| row.family = Some(f),
    );
    (rows, contributes(matched, &[ResourceType::Family]))
}

pub fn join_diagnoses(rows: Vec<DenormalizedRow>, diagnoses: &[DiagnosisRecord]) -> StepOutput {
    let (rows, matched) = left_join(
        rows,
        diagnoses,
        |row| owned(row.participant_id()),
        |d| d.participant_id.clone(),
        |row, d| row.diagnosis = Some(d),
    );
    (rows, contributes(matched, &[ResourceType::Disease]))
}

pub fn join_phenotypes(rows: Vec<DenormalizedRow>, phenotypes: &[PhenotypeRecord]) -> StepOutput {
    let (rows, matched) = left_join(
        rows,
        phenotypes,
        |row| owned(row.participant_id()),
        |p| p.participant_id.clone(),
        |row, p| row.phenotype = Some(p),
    );
    (rows, contributes(matched, &[ResourceType::Phenotype]))
}

pub fn join_outcomes(rows: Vec<DenormalizedRow>, outcomes: &[OutcomeRecord]) -> StepOutput {
    let (rows, matched) = left_join(
        rows,
        outcomes,
        |row| owned(row.participant_id()),
        |o| o.participant_id.clone(),
        |row, o| row.outcome = Some(o),
    );
    (rows, contributes(matched, &[ResourceType::VitalStatus]))
}

pub fn join_biospecimens(
    rows: Vec<DenormalizedRow>,
    biospecimens: &[BiospecimenRecord],
) -> StepOutput {
    let (rows, matched) = left_join(
        rows,
        biospecimens,
        |row| owned(row.participant_id()),
        |b| b.participant_id.clone(),
        |row, b| row.biospecimen = Some(b),
    );
    (
        rows,
        contributes(
            matched,
            &[ResourceType::SequencingCenter, ResourceType::Specimen],
        ),
    )
}

/// Joins on the composite (biospecimen id, diagnosis id)
pub fn join_biospecimen_diagnoses(
    rows: Vec<DenormalizedRow>,
    links: &[BiospecimenDiagnosisRecord],
) -> StepOutput {
    let (rows, matched) = left_join(
        rows,
        links,
        |row| Some((owned(row.biospecimen_id())?, owned(row.diagnosis_id())?)),
        |l| Some((l.biospecimen_id.clone()?, l.diagnosis_id.clone()?)),
        |row, l| row.biospecimen_diagnosis = Some(l),
    );
    (rows, contributes(matched, &[ResourceType::Histopathology]))
}

pub fn join_biospecimen_genomic_files(
    rows: Vec<DenormalizedRow>,
    links: &[BiospecimenGenomicFileRecord],
) -> StepOutput {
    let (rows, _) = left_join(
        rows,
        links,
        |row| owned(row.biospecimen_id()),
        |l| l.biospecimen_id.clone(),
        |row, l| row.biospecimen_genomic_file = Some(l),
    );
    (rows, Vec::new())
}

pub fn join_genomic_files(
    rows: Vec<DenormalizedRow>,
    genomic_files: &[GenomicFileRecord],
) -> StepOutput {
    let (rows, matched) = left_join(
        rows,
        genomic_files,
        |row| {
            row.biospecimen_genomic_file
                .as_ref()
                .and_then(|l| l.genomic_file_id.clone())
        },
        |g| Some(g.kf_id.clone()),
        |row, g| row.genomic_file = Some(g),
    );
    (
        rows,
        contributes(matched, &[ResourceType::DrsDocumentReference]),
    )
}

pub fn join_sequencing_experiment_genomic_files(
    rows: Vec<DenormalizedRow>,
    links: &[SequencingExperimentGenomicFileRecord],
) -> StepOutput {
    let (rows, _) = left_join(
        rows,
        links,
        |row| owned(row.genomic_file_id()),
        |l| l.genomic_file_id.clone(),
        |row, l| row.sequencing_experiment_genomic_file = Some(l),
    );
    (rows, Vec::new())
}

/// Skipped entirely when no row carries a sequencing experiment link
pub fn join_sequencing_experiments(
    rows: Vec<DenormalizedRow>,
    experiments: &[SequencingExperimentRecord],
) -> StepOutput {
    if rows
        .iter()
        .all(|row| row.sequencing_experiment_genomic_file.is_none())
    {
        return (rows, Vec::new());
    }
    let (rows, _) = left_join(
        rows,
        experiments,
        |row| {
            row.sequencing_experiment_genomic_file
                .as_ref()
                .and_then(|l| l.sequencing_experiment_id.clone())
        },
        |e| Some(e.kf_id.clone()),
        |row, e| row.sequencing_experiment = Some(e),
    );
    (rows, Vec::new())
}

/// Visible family relationships between visible participants of the study
///
/// When the study has visible families, both participants must belong to one.
pub fn filter_family_relationships(snapshot: &StudySnapshot) -> Vec<FamilyRelationshipRecord> {
    let visible_families: HashSet<&str> = snapshot
        .families
        .iter()
        .filter(|f| f.visible)
        .map(|f| f.kf_id.as_str())
        .collect();

    let participants: HashMap<&str, &ParticipantRecord> = snapshot
        .participants
        .iter()
        .filter(|p| p.visible && p.study_id.as_deref() == Some(snapshot.study.kf_id.as_str()))
        .map(|p| (p.kf_id.as_str(), p))
        .collect();

    let eligible = |id: Option<&str>| -> bool {
        let Some(participant) = id.and_then(|id| participants.get(id)) else {
            return false;
        };
        visible_families.is_empty()
            || participant
                .family_id
                .as_deref()
                .is_some_and(|f| visible_families.contains(f))
    };

    snapshot
        .family_relationships
        .iter()
        .filter(|r| r.visible)
        .filter(|r| eligible(r.participant1_id.as_deref()) && eligible(r.participant2_id.as_deref()))
        .cloned()
        .collect()
}

/// Removes identical rows, keeping first occurrences in order
fn dedupe_rows(rows: Vec<DenormalizedRow>) -> Vec<DenormalizedRow> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| match serde_json::to_string(row) {
            Ok(key) => seen.insert(key),
            Err(_) => true,
        })
        .collect()
}
