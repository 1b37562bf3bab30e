//! Typed source records
//!
//! One record type per dataservice relation. Rows arrive from the source of
//! record as JSON objects and are parsed into these types at the snapshot
//! boundary, so a missing `kf_id`/`visible` column or a wrongly typed value
//! fails extraction instead of surfacing later inside a builder.
//!
//! Optional string columns go through [`clean`] deserializers which trim
//! values and normalize placeholders (`""`, `"NaN"`, `"None"`, `"null"`) to
//! `None`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Deserializers that normalize loosely typed source values
pub mod clean {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;
    use std::collections::BTreeMap;

    const PLACEHOLDERS: [&str; 3] = ["nan", "none", "null"];

    /// Normalizes a scalar to a trimmed string, mapping placeholders to `None`
    pub fn normalize(value: &Value) -> Option<String> {
        let text = match value {
            Value::Null => return None,
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Array(_) | Value::Object(_) => return None,
        };
        if text.is_empty() || PLACEHOLDERS.contains(&text.to_ascii_lowercase().as_str()) {
            None
        } else {
            Some(text)
        }
    }

    pub fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.as_ref().and_then(normalize))
    }

    pub fn opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Some(other) => normalize(&other).and_then(|s| {
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
            }),
            None => None,
        })
    }

    pub fn opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::Number(n)) => n.as_f64(),
            Some(other) => normalize(&other).and_then(|s| s.parse::<f64>().ok()),
            None => None,
        })
    }

    pub fn opt_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::Bool(b)) => Some(b),
            Some(other) => match normalize(&other).map(|s| s.to_ascii_lowercase()) {
                Some(s) if s == "true" => Some(true),
                Some(s) if s == "false" => Some(false),
                _ => None,
            },
            None => None,
        })
    }

    pub fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::Array(items)) => items.iter().filter_map(normalize).collect(),
            Some(other) => normalize(&other).into_iter().collect(),
            None => Vec::new(),
        })
    }

    pub fn string_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::Object(map)) => map
                .iter()
                .filter_map(|(k, v)| normalize(v).map(|v| (k.clone(), v)))
                .collect(),
            _ => BTreeMap::new(),
        })
    }
}

/// `study` row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyRecord {
    pub kf_id: String,
    pub visible: bool,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub external_id: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub investigator_id: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub attribution: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub data_access_authority: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub domain: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub program: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub release_status: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub short_code: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub short_name: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub version: Option<String>,
}

/// `investigator` row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestigatorRecord {
    pub kf_id: String,
    pub visible: bool,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub external_id: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub institution: Option<String>,
}

/// `participant` row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    pub kf_id: String,
    pub visible: bool,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub study_id: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub family_id: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub external_id: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub affected_status: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub diagnosis_category: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub ethnicity: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub gender: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_bool")]
    pub is_proband: Option<bool>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub race: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub species: Option<String>,
}

/// `family` row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyRecord {
    pub kf_id: String,
    pub visible: bool,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub external_id: Option<String>,
}

/// `family_relationship` row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyRelationshipRecord {
    pub kf_id: String,
    pub visible: bool,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub external_id: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub participant1_id: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub participant2_id: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub participant1_to_participant2_relation: Option<String>,
}

/// `diagnosis` row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisRecord {
    pub kf_id: String,
    pub visible: bool,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub participant_id: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub external_id: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_i64")]
    pub age_at_event_days: Option<i64>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub diagnosis_category: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub icd_id_diagnosis: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub mondo_id_diagnosis: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub ncit_id_diagnosis: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub source_text_diagnosis: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub source_text_tumor_location: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub uberon_id_tumor_location: Option<String>,
}

/// `phenotype` row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhenotypeRecord {
    pub kf_id: String,
    pub visible: bool,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub participant_id: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub external_id: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_i64")]
    pub age_at_event_days: Option<i64>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub hpo_id_phenotype: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub snomed_id_phenotype: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub observed: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub source_text_phenotype: Option<String>,
}

/// `outcome` row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub kf_id: String,
    pub visible: bool,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub participant_id: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub external_id: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_i64")]
    pub age_at_event_days: Option<i64>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub vital_status: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub disease_related: Option<String>,
}

/// `biospecimen` row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiospecimenRecord {
    pub kf_id: String,
    pub visible: bool,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub participant_id: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub sequencing_center_id: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_i64")]
    pub age_at_event_days: Option<i64>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub analyte_type: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub composition: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub consent_type: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub dbgap_consent_code: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub external_aliquot_id: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub external_sample_id: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub method_of_sample_procurement: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub ncit_id_anatomical_site: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub ncit_id_tissue_type: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub source_text_anatomical_site: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub source_text_tissue_type: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub source_text_tumor_descriptor: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub spatial_descriptor: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub uberon_id_anatomical_site: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_f64")]
    pub volume_ul: Option<f64>,
}

/// `biospecimen_diagnosis` link row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiospecimenDiagnosisRecord {
    pub kf_id: String,
    pub visible: bool,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub external_id: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub biospecimen_id: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub diagnosis_id: Option<String>,
}

/// `biospecimen_genomic_file` link row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiospecimenGenomicFileRecord {
    pub kf_id: String,
    pub visible: bool,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub external_id: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub biospecimen_id: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub genomic_file_id: Option<String>,
}

/// `genomic_file` row
///
/// The file-store fields (`urls`, `acl`, `authz`, `hashes`, `size`,
/// `file_name`, `latest_did`) are the locally known metadata; the file
/// metadata resolver may replace them with federated values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenomicFileRecord {
    pub kf_id: String,
    pub visible: bool,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub external_id: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub availability: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_bool")]
    pub controlled_access: Option<bool>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub data_type: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub file_format: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_bool")]
    pub is_harmonized: Option<bool>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub latest_did: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub reference_genome: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub file_name: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_i64")]
    pub size: Option<i64>,
    #[serde(default, deserialize_with = "clean::string_map")]
    pub hashes: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "clean::string_list")]
    pub urls: Vec<String>,
    #[serde(default, deserialize_with = "clean::string_list")]
    pub acl: Vec<String>,
    #[serde(default, deserialize_with = "clean::string_list")]
    pub authz: Vec<String>,
}

/// `sequencing_experiment` row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencingExperimentRecord {
    pub kf_id: String,
    pub visible: bool,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub external_id: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub experiment_strategy: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub sequencing_center_id: Option<String>,
}

/// `sequencing_experiment_genomic_file` link row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencingExperimentGenomicFileRecord {
    pub kf_id: String,
    pub visible: bool,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub external_id: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub sequencing_experiment_id: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub genomic_file_id: Option<String>,
}

/// Common accessors shared by every source record
pub trait SourceRecord {
    /// Source-system id
    fn kf_id(&self) -> &str;

    /// Visibility flag
    fn is_visible(&self) -> bool;
}

macro_rules! impl_source_record {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl SourceRecord for $ty {
                fn kf_id(&self) -> &str {
                    &self.kf_id
                }

                fn is_visible(&self) -> bool {
                    self.visible
                }
            }
        )+
    };
}

impl_source_record!(
    StudyRecord,
    InvestigatorRecord,
    ParticipantRecord,
    FamilyRecord,
    FamilyRelationshipRecord,
    DiagnosisRecord,
    PhenotypeRecord,
    OutcomeRecord,
    BiospecimenRecord,
    BiospecimenDiagnosisRecord,
    BiospecimenGenomicFileRecord,
    GenomicFileRecord,
    SequencingExperimentRecord,
    SequencingExperimentGenomicFileRecord,
);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_participant_parses_loose_values() {
        let participant: ParticipantRecord = serde_json::from_value(json!({
            "kf_id": "PT_00000001",
            "visible": true,
            "study_id": "SD_00000001",
            "family_id": "",
            "gender": "  Female ",
            "is_proband": "True",
            "race": "NaN",
            "uuid": "ignored",
            "created_at": "2020-01-01T00:00:00Z"
        }))
        .unwrap();

        assert_eq!(participant.family_id, None);
        assert_eq!(participant.gender.as_deref(), Some("Female"));
        assert_eq!(participant.is_proband, Some(true));
        assert_eq!(participant.race, None);
    }

    #[test]
    fn test_only_listed_placeholders_are_absent() {
        for value in ["", "   ", "NaN", "None", "null"] {
            assert_eq!(clean::normalize(&json!(value)), None, "{value:?}");
        }
        for value in ["NA", "n/a", "Unknown"] {
            assert_eq!(clean::normalize(&json!(value)).as_deref(), Some(value));
        }

        let participant: ParticipantRecord = serde_json::from_value(json!({
            "kf_id": "PT_1",
            "visible": true,
            "race": "NA",
            "ethnicity": "n/a"
        }))
        .unwrap();
        assert_eq!(participant.race.as_deref(), Some("NA"));
        assert_eq!(participant.ethnicity.as_deref(), Some("n/a"));
    }

    #[test]
    fn test_missing_visible_is_rejected() {
        let result = serde_json::from_value::<StudyRecord>(json!({ "kf_id": "SD_1" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_kf_id_is_rejected() {
        let result = serde_json::from_value::<FamilyRecord>(json!({ "visible": true }));
        assert!(result.is_err());
    }

    #[test]
    fn test_numeric_coercion() {
        let diagnosis: DiagnosisRecord = serde_json::from_value(json!({
            "kf_id": "DG_1",
            "visible": true,
            "age_at_event_days": "365.0"
        }))
        .unwrap();
        assert_eq!(diagnosis.age_at_event_days, Some(365));

        let biospecimen: BiospecimenRecord = serde_json::from_value(json!({
            "kf_id": "BS_1",
            "visible": true,
            "volume_ul": 12.5,
            "age_at_event_days": null
        }))
        .unwrap();
        assert_eq!(biospecimen.volume_ul, Some(12.5));
        assert_eq!(biospecimen.age_at_event_days, None);
    }

    #[test]
    fn test_genomic_file_collections() {
        let gf: GenomicFileRecord = serde_json::from_value(json!({
            "kf_id": "GF_1",
            "visible": true,
            "urls": ["s3://bucket/file.bam", ""],
            "acl": null,
            "hashes": {"md5": "abc", "etag": null}
        }))
        .unwrap();
        assert_eq!(gf.urls, vec!["s3://bucket/file.bam".to_string()]);
        assert!(gf.acl.is_empty());
        assert_eq!(gf.hashes.len(), 1);
        assert_eq!(gf.hashes.get("md5").map(String::as_str), Some("abc"));
    }

    #[test]
    fn test_source_record_trait() {
        let family = FamilyRecord {
            kf_id: "FM_1".into(),
            visible: false,
            external_id: None,
        };
        assert_eq!(family.kf_id(), "FM_1");
        assert!(!family.is_visible());
    }
}
