//! Payload fragments shared by the entity builders

use crate::core::load::record::BuilderRecord;
use crate::domain::records::StudyRecord;
use crate::domain::{DenormalizedRow, NaturalKey, ResourceType, Result, StrandError, TableName};
use serde_json::{json, Value};

/// Base of every identifier system minted from the dataservice
pub const DATASERVICE_SYSTEM: &str = "https://kf-api-dataservice.kidsfirstdrc.org";

pub const SNOMED_SYSTEM: &str = "http://snomed.info/sct";
pub const UCUM_SYSTEM: &str = "http://unitsofmeasure.org";
pub const NCIT_SYSTEM: &str = "http://purl.obolibrary.org/obo/ncit.owl";
pub const UBERON_SYSTEM: &str = "http://purl.obolibrary.org/obo/uberon.owl";

/// `<dataservice>/<endpoint>/`
pub fn system(table: TableName) -> String {
    format!("{DATASERVICE_SYSTEM}/{}/", table.endpoint())
}

/// `meta` with an optional profile and the study tag
pub fn meta(profile: Option<&str>, study_id: &str) -> Value {
    let mut meta = json!({
        "tag": [{
            "system": system(TableName::Study),
            "code": study_id,
        }],
    });
    if let Some(profile) = profile {
        meta["profile"] = json!([profile]);
    }
    meta
}

/// Official identifier of a source row
pub fn official_identifier(table: TableName, value: &str) -> Value {
    json!({
        "use": "official",
        "system": system(table),
        "value": value,
    })
}

/// Secondary identifier carrying the row's external id
pub fn secondary_identifier(table: TableName, external_id: Option<&str>) -> Option<Value> {
    external_id.map(|value| {
        json!({
            "use": "secondary",
            "system": format!("{DATASERVICE_SYSTEM}/{}?external_id=", table.endpoint()),
            "value": value,
        })
    })
}

/// Official identifier followed by the secondary one, when present
pub fn identifiers(table: TableName, kf_id: &str, external_id: Option<&str>) -> Value {
    let mut list = vec![official_identifier(table, kf_id)];
    list.extend(secondary_identifier(table, external_id));
    Value::Array(list)
}

/// Relative-date extension placing an event `age_days` after birth
pub fn relative_date(age_days: Option<i64>) -> Option<Value> {
    age_days.map(|days| {
        json!({
            "extension": [{
                "url": "http://hl7.org/fhir/StructureDefinition/relative-date",
                "extension": [
                    {
                        "url": "event",
                        "valueCodeableConcept": {
                            "coding": [{
                                "system": SNOMED_SYSTEM,
                                "code": "3950001",
                                "display": "Birth",
                            }],
                        },
                    },
                    {"url": "relationship", "valueCode": "after"},
                    {
                        "url": "offset",
                        "valueDuration": {
                            "value": days,
                            "unit": "day",
                            "system": UCUM_SYSTEM,
                            "code": "d",
                        },
                    },
                ],
            }],
        })
    })
}

/// Codeable concept with free text and any codings that are present
pub fn concept(text: Option<&str>, codings: Vec<Option<Value>>) -> Option<Value> {
    let codings: Vec<Value> = codings.into_iter().flatten().collect();
    if text.is_none() && codings.is_empty() {
        return None;
    }
    let mut concept = json!({});
    if let Some(text) = text {
        concept["text"] = json!(text);
    }
    if !codings.is_empty() {
        concept["coding"] = Value::Array(codings);
    }
    Some(concept)
}

/// Coding in `system` when the code is present
pub fn coding(system: &str, code: Option<&str>) -> Option<Value> {
    code.map(|code| json!({"system": system, "code": code}))
}

/// Sets `field` only when a value is present
pub fn set_opt(entity: &mut Value, field: &str, value: Option<Value>) {
    if let Some(value) = value {
        entity[field] = value;
    }
}

/// Value of a required field, or a missing-field error
pub fn require<'a, T: ?Sized>(
    value: Option<&'a T>,
    resource_type: ResourceType,
    field: &str,
) -> Result<&'a T> {
    value.ok_or_else(|| StrandError::missing_field(resource_type.to_string(), field))
}

/// Denormalized row behind a row record
pub fn expect_row(record: &BuilderRecord, resource_type: ResourceType) -> Result<&DenormalizedRow> {
    record.row().ok_or_else(|| {
        StrandError::Validation(format!("{resource_type} builder expects a row record"))
    })
}

/// Study of a record, required by every payload
pub fn expect_study(record: &BuilderRecord, resource_type: ResourceType) -> Result<&StudyRecord> {
    require(record.study(), resource_type, "study")
}

/// Natural keys of types other builders reference
pub mod keys {
    use super::*;

    pub fn practitioner(investigator_id: &str) -> NaturalKey {
        NaturalKey::identifier(investigator_id)
    }

    pub fn organization(investigator_id: &str) -> NaturalKey {
        NaturalKey::identifier(investigator_id)
    }

    pub fn practitioner_role(practitioner: String, organization: String) -> NaturalKey {
        NaturalKey::from_components([
            ("practitioner", Some(practitioner)),
            ("organization", Some(organization)),
        ])
    }

    pub fn patient(participant_id: &str) -> NaturalKey {
        NaturalKey::identifier(participant_id)
    }

    pub fn research_study(study_id: &str) -> NaturalKey {
        NaturalKey::identifier(study_id)
    }

    pub fn disease(diagnosis_id: &str) -> NaturalKey {
        NaturalKey::identifier(diagnosis_id)
    }

    pub fn specimen(biospecimen_id: &str) -> NaturalKey {
        NaturalKey::identifier(biospecimen_id)
    }

    /// Key scoped to the study tag
    pub fn tagged(study_id: &str, kf_id: &str) -> NaturalKey {
        NaturalKey::from_components([
            ("_tag", Some(study_id.to_string())),
            ("identifier", Some(kf_id.to_string())),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers_include_secondary_when_present() {
        let ids = identifiers(TableName::Participant, "PT_1", Some("P-001"));
        assert_eq!(ids[0]["system"], "https://kf-api-dataservice.kidsfirstdrc.org/participants/");
        assert_eq!(ids[0]["value"], "PT_1");
        assert_eq!(
            ids[1]["system"],
            "https://kf-api-dataservice.kidsfirstdrc.org/participants?external_id="
        );
        assert_eq!(identifiers(TableName::Participant, "PT_1", None).as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_relative_date_offset() {
        let ext = relative_date(Some(365)).unwrap();
        let offset = &ext["extension"][0]["extension"][2];
        assert_eq!(offset["url"], "offset");
        assert_eq!(offset["valueDuration"]["value"], 365);
        assert!(relative_date(None).is_none());
    }

    #[test]
    fn test_concept_drops_absent_parts() {
        assert!(concept(None, vec![None]).is_none());
        let c = concept(Some("Brain"), vec![coding(UBERON_SYSTEM, Some("UBERON:0000955")), None])
            .unwrap();
        assert_eq!(c["text"], "Brain");
        assert_eq!(c["coding"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_meta_carries_study_tag() {
        let meta = meta(Some("http://example.org/profile"), "SD_1");
        assert_eq!(meta["tag"][0]["code"], "SD_1");
        assert_eq!(meta["profile"][0], "http://example.org/profile");
    }

    #[test]
    fn test_require_reports_field() {
        let err = require::<str>(None, ResourceType::Specimen, "biospecimen").unwrap_err();
        assert_eq!(err.to_string(), "specimen is missing required field 'biospecimen'");
    }
}
