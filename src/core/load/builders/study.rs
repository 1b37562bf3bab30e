//! ResearchStudy

use super::investigator::practitioner_role_key;
use super::payload::{self, keys, SNOMED_SYSTEM};
use super::EntityBuilder;
use crate::core::load::context::BuildContext;
use crate::core::load::record::{distinct_rows, BuilderRecord};
use crate::domain::records::StudyRecord;
use crate::domain::{MergedStudy, NaturalKey, ResourceType, Result, TableName};
use async_trait::async_trait;
use serde_json::{json, Value};

const DBGAP_SYSTEM: &str = "https://www.ncbi.nlm.nih.gov/projects/gap/cgi-bin/study.cgi?study_id=";

/// dbGaP accession of a study: `phs` prefix plus the `v` version, if any
pub fn phs_accession(external_id: Option<&str>, version: Option<&str>) -> Option<String> {
    let external_id = external_id?.trim();
    if !external_id.starts_with("phs") {
        return None;
    }
    let prefix = external_id.split('.').next().unwrap_or(external_id).trim();
    Some(match version.map(str::trim) {
        Some(version) if version.starts_with('v') => format!("{prefix}.{version}"),
        _ => prefix.to_string(),
    })
}

fn domain_codings(domain: &str) -> Vec<Value> {
    let coding = |code: &str, display: &str| {
        json!({"system": SNOMED_SYSTEM, "code": code, "display": display})
    };
    let birth_defect = || coding("276720006", "Dysmorphism (disorder)");
    let cancer = || coding("86049000", "Malignant neoplasm, primary (morphologic abnormality)");
    match domain {
        "BIRTHDEFECT" => vec![birth_defect()],
        "CANCER" => vec![cancer()],
        "COVID19" => vec![coding(
            "840539006",
            "Disease caused by Severe acute respiratory syndrome coronavirus 2",
        )],
        "CANCERANDBIRTHDEFECT" => vec![cancer(), birth_defect()],
        _ => Vec::new(),
    }
}

pub struct ResearchStudyBuilder;

fn study(record: &BuilderRecord) -> Result<&StudyRecord> {
    payload::expect_study(record, ResourceType::ResearchStudy)
}

#[async_trait]
impl EntityBuilder for ResearchStudyBuilder {
    fn resource_type(&self) -> ResourceType {
        ResourceType::ResearchStudy
    }

    fn records(&self, merged: &MergedStudy) -> Vec<BuilderRecord> {
        distinct_rows(merged, |row| row.study_id().map(str::to_string))
    }

    async fn key_components(&self, record: &BuilderRecord, _ctx: &BuildContext) -> Result<NaturalKey> {
        Ok(keys::research_study(&study(record)?.kf_id))
    }

    async fn build_entity(&self, record: &BuilderRecord, ctx: &BuildContext) -> Result<Value> {
        let study = study(record)?;
        let mut identifiers = vec![payload::official_identifier(TableName::Study, &study.kf_id)];
        if let Some(accession) = phs_accession(study.external_id.as_deref(), study.version.as_deref())
        {
            identifiers.push(json!({
                "use": "secondary",
                "system": DBGAP_SYSTEM,
                "value": accession,
            }));
        }

        let mut entity = json!({
            "resourceType": self.resource_type().api_path(),
            "meta": payload::meta(
                Some("http://hl7.org/fhir/StructureDefinition/ResearchStudy"),
                &study.kf_id,
            ),
            "identifier": identifiers,
            "status": "completed",
        });

        if let Some(name) = &study.name {
            entity["title"] = json!(name);
        }

        if let Some(domain) = &study.domain {
            let mut category = json!({"text": domain});
            let codings = domain_codings(domain);
            if !codings.is_empty() {
                category["coding"] = Value::Array(codings);
            }
            entity["category"] = json!([category]);
        }

        let keywords: Vec<Value> = [&study.program, &study.short_code]
            .into_iter()
            .flatten()
            .map(|code| json!({"coding": [{"code": code}]}))
            .collect();
        if !keywords.is_empty() {
            entity["keyword"] = Value::Array(keywords);
        }

        if let Some(investigator) = record.row().and_then(|row| row.investigator.as_ref()) {
            let role_key =
                practitioner_role_key(self.resource_type(), &investigator.kf_id, ctx).await?;
            let role = ctx
                .reference(
                    self.resource_type(),
                    ResourceType::PractitionerRole,
                    &role_key,
                    "practitioner role id",
                )
                .await?;
            entity["principalInvestigator"] = json!({"reference": role});
        }

        Ok(entity)
    }
}
