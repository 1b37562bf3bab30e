//! Output resource types
//!
//! Each variant corresponds to one entity builder. The declaration order is
//! the dependency order in which the load stage runs them: a type only
//! references types that come before it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Output resource type produced by an entity builder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Practitioner,
    Organization,
    PractitionerRole,
    Patient,
    ProbandStatus,
    FamilyRelationship,
    Family,
    ResearchStudy,
    ResearchSubject,
    Disease,
    Phenotype,
    VitalStatus,
    SequencingCenter,
    Specimen,
    Histopathology,
    DrsDocumentReference,
}

impl ResourceType {
    /// All resource types in dependency order
    pub const ALL: [ResourceType; 16] = [
        ResourceType::Practitioner,
        ResourceType::Organization,
        ResourceType::PractitionerRole,
        ResourceType::Patient,
        ResourceType::ProbandStatus,
        ResourceType::FamilyRelationship,
        ResourceType::Family,
        ResourceType::ResearchStudy,
        ResourceType::ResearchSubject,
        ResourceType::Disease,
        ResourceType::Phenotype,
        ResourceType::VitalStatus,
        ResourceType::SequencingCenter,
        ResourceType::Specimen,
        ResourceType::Histopathology,
        ResourceType::DrsDocumentReference,
    ];

    /// FHIR resource path the builder submits to
    pub fn api_path(&self) -> &'static str {
        match self {
            ResourceType::Practitioner => "Practitioner",
            ResourceType::Organization | ResourceType::SequencingCenter => "Organization",
            ResourceType::PractitionerRole => "PractitionerRole",
            ResourceType::Patient => "Patient",
            ResourceType::ProbandStatus
            | ResourceType::FamilyRelationship
            | ResourceType::VitalStatus
            | ResourceType::Histopathology => "Observation",
            ResourceType::Family => "Group",
            ResourceType::ResearchStudy => "ResearchStudy",
            ResourceType::ResearchSubject => "ResearchSubject",
            ResourceType::Disease | ResourceType::Phenotype => "Condition",
            ResourceType::Specimen => "Specimen",
            ResourceType::DrsDocumentReference => "DocumentReference",
        }
    }

    /// Builder name, as accepted by `--entity-builders`
    pub fn name(&self) -> &'static str {
        match self {
            ResourceType::Practitioner => "practitioner",
            ResourceType::Organization => "organization",
            ResourceType::PractitionerRole => "practitioner_role",
            ResourceType::Patient => "patient",
            ResourceType::ProbandStatus => "proband_status",
            ResourceType::FamilyRelationship => "family_relationship",
            ResourceType::Family => "family",
            ResourceType::ResearchStudy => "research_study",
            ResourceType::ResearchSubject => "research_subject",
            ResourceType::Disease => "disease",
            ResourceType::Phenotype => "phenotype",
            ResourceType::VitalStatus => "vital_status",
            ResourceType::SequencingCenter => "sequencing_center",
            ResourceType::Specimen => "specimen",
            ResourceType::Histopathology => "histopathology",
            ResourceType::DrsDocumentReference => "drs_document_reference",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ResourceType::ALL
            .iter()
            .copied()
            .find(|t| t.name() == wanted)
            .ok_or_else(|| {
                let names: Vec<&str> = ResourceType::ALL.iter().map(|t| t.name()).collect();
                format!(
                    "Unknown entity builder '{}'. Expected one of: {}",
                    s.trim(),
                    names.join(", ")
                )
            })
    }
}
