//! Patient, ProbandStatus and ResearchSubject from study participants

use super::payload::{self, keys, SNOMED_SYSTEM};
use super::EntityBuilder;
use crate::core::load::context::BuildContext;
use crate::core::load::record::{distinct_rows, BuilderRecord};
use crate::domain::records::ParticipantRecord;
use crate::domain::{MergedStudy, NaturalKey, ResourceType, Result, TableName};
use async_trait::async_trait;
use serde_json::{json, Value};

const PROBAND_CODE: &str = "85900004";
const US_CORE: &str = "http://hl7.org/fhir/us/core/StructureDefinition";

fn participant(record: &BuilderRecord, resource_type: ResourceType) -> Result<&ParticipantRecord> {
    let row = payload::expect_row(record, resource_type)?;
    payload::require(row.participant.as_ref(), resource_type, "participant")
}

fn participant_rows(merged: &MergedStudy) -> Vec<BuilderRecord> {
    distinct_rows(merged, |row| row.participant_id().map(str::to_string))
}

async fn patient_reference(
    owner: ResourceType,
    participant_id: &str,
    ctx: &BuildContext,
) -> Result<String> {
    ctx.reference(
        owner,
        ResourceType::Patient,
        &keys::patient(participant_id),
        "patient id",
    )
    .await
}

/// FHIR administrative gender of a source gender value
fn administrative_gender(gender: &str) -> Option<&'static str> {
    match gender.trim().to_ascii_lowercase().as_str() {
        "male" => Some("male"),
        "female" => Some("female"),
        "unknown" | "not reported" | "not available" => Some("unknown"),
        "other" => Some("other"),
        _ => None,
    }
}

fn text_extension(profile: &str, text: &str) -> Value {
    json!({
        "url": format!("{US_CORE}/{profile}"),
        "extension": [{"url": "text", "valueString": text}],
    })
}

pub struct PatientBuilder;

#[async_trait]
impl EntityBuilder for PatientBuilder {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Patient
    }

    fn records(&self, merged: &MergedStudy) -> Vec<BuilderRecord> {
        participant_rows(merged)
    }

    async fn key_components(&self, record: &BuilderRecord, _ctx: &BuildContext) -> Result<NaturalKey> {
        let participant = participant(record, self.resource_type())?;
        Ok(keys::patient(&participant.kf_id))
    }

    async fn build_entity(&self, record: &BuilderRecord, ctx: &BuildContext) -> Result<Value> {
        let participant = participant(record, self.resource_type())?;
        let mut entity = json!({
            "resourceType": self.resource_type().api_path(),
            "meta": payload::meta(
                Some("http://hl7.org/fhir/us/core/StructureDefinition/us-core-patient"),
                ctx.study_id().as_str(),
            ),
            "identifier": payload::identifiers(
                TableName::Participant,
                &participant.kf_id,
                participant.external_id.as_deref(),
            ),
        });

        let mut extensions = Vec::new();
        if let Some(race) = &participant.race {
            extensions.push(text_extension("us-core-race", race));
        }
        if let Some(ethnicity) = &participant.ethnicity {
            extensions.push(text_extension("us-core-ethnicity", ethnicity));
        }
        if !extensions.is_empty() {
            entity["extension"] = Value::Array(extensions);
        }

        if let Some(gender) = participant.gender.as_deref().and_then(administrative_gender) {
            entity["gender"] = json!(gender);
        }
        Ok(entity)
    }
}

pub struct ProbandStatusBuilder;

#[async_trait]
impl EntityBuilder for ProbandStatusBuilder {
    fn resource_type(&self) -> ResourceType {
        ResourceType::ProbandStatus
    }

    fn records(&self, merged: &MergedStudy) -> Vec<BuilderRecord> {
        participant_rows(merged)
    }

    async fn key_components(&self, record: &BuilderRecord, ctx: &BuildContext) -> Result<NaturalKey> {
        let participant = participant(record, self.resource_type())?;
        payload::require(participant.is_proband.as_ref(), self.resource_type(), "is_proband")?;
        let subject = patient_reference(self.resource_type(), &participant.kf_id, ctx).await?;
        Ok(NaturalKey::from_components([
            ("code", Some(format!("{SNOMED_SYSTEM}|{PROBAND_CODE}"))),
            ("subject", Some(subject)),
        ]))
    }

    async fn build_entity(&self, record: &BuilderRecord, ctx: &BuildContext) -> Result<Value> {
        let participant = participant(record, self.resource_type())?;
        let is_proband =
            *payload::require(participant.is_proband.as_ref(), self.resource_type(), "is_proband")?;
        let subject = patient_reference(self.resource_type(), &participant.kf_id, ctx).await?;

        let (code, display, text) = if is_proband {
            ("Y", "Yes", "True")
        } else {
            ("N", "No", "False")
        };

        Ok(json!({
            "resourceType": self.resource_type().api_path(),
            "meta": payload::meta(None, ctx.study_id().as_str()),
            "identifier": [{
                "use": "official",
                "system": format!("{}/participants?is_proband=", payload::DATASERVICE_SYSTEM),
                "value": participant.kf_id,
            }],
            "status": "final",
            "code": {
                "coding": [{
                    "system": SNOMED_SYSTEM,
                    "code": PROBAND_CODE,
                    "display": "Proband (finding)",
                }],
                "text": "Proband status",
            },
            "subject": {"reference": subject},
            "valueCodeableConcept": {
                "coding": [{
                    "system": "http://terminology.hl7.org/CodeSystem/v2-0136",
                    "code": code,
                    "display": display,
                }],
                "text": text,
            },
        }))
    }
}

pub struct ResearchSubjectBuilder;

impl ResearchSubjectBuilder {
    async fn references(
        &self,
        record: &BuilderRecord,
        ctx: &BuildContext,
    ) -> Result<(String, String)> {
        let participant = participant(record, self.resource_type())?;
        let study = payload::expect_study(record, self.resource_type())?;
        let study_ref = ctx
            .reference(
                self.resource_type(),
                ResourceType::ResearchStudy,
                &keys::research_study(&study.kf_id),
                "research study id",
            )
            .await?;
        let patient_ref = patient_reference(self.resource_type(), &participant.kf_id, ctx).await?;
        Ok((study_ref, patient_ref))
    }
}

#[async_trait]
impl EntityBuilder for ResearchSubjectBuilder {
    fn resource_type(&self) -> ResourceType {
        ResourceType::ResearchSubject
    }

    fn records(&self, merged: &MergedStudy) -> Vec<BuilderRecord> {
        participant_rows(merged)
    }

    async fn key_components(&self, record: &BuilderRecord, ctx: &BuildContext) -> Result<NaturalKey> {
        let (study, individual) = self.references(record, ctx).await?;
        Ok(NaturalKey::from_components([
            ("study", Some(study)),
            ("individual", Some(individual)),
        ]))
    }

    async fn build_entity(&self, record: &BuilderRecord, ctx: &BuildContext) -> Result<Value> {
        let participant = participant(record, self.resource_type())?;
        let (study, individual) = self.references(record, ctx).await?;
        Ok(json!({
            "resourceType": self.resource_type().api_path(),
            "meta": payload::meta(
                Some("http://hl7.org/fhir/StructureDefinition/ResearchSubject"),
                ctx.study_id().as_str(),
            ),
            "identifier": [payload::official_identifier(TableName::Participant, &participant.kf_id)],
            "status": "off-study",
            "study": {"reference": study},
            "individual": {"reference": individual},
        }))
    }
}
