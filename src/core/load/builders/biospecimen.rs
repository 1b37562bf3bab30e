//! SequencingCenter, Specimen and Histopathology from biospecimens

use super::payload::{self, concept, keys, set_opt, NCIT_SYSTEM, SNOMED_SYSTEM, UBERON_SYSTEM, UCUM_SYSTEM};
use super::EntityBuilder;
use crate::core::load::context::BuildContext;
use crate::core::load::record::{distinct_rows, BuilderRecord};
use crate::domain::records::BiospecimenRecord;
use crate::domain::{DenormalizedRow, MergedStudy, NaturalKey, ResourceType, Result, TableName};
use async_trait::async_trait;
use serde_json::{json, Value};

const EFO_SYSTEM: &str = "http://www.ebi.ac.uk/efo/efo.owl";

fn biospecimen(row: &DenormalizedRow, resource_type: ResourceType) -> Result<&BiospecimenRecord> {
    payload::require(row.biospecimen.as_ref(), resource_type, "biospecimen")
}

/// Coding of an ontology term, keeping the system only for known prefixes
fn prefixed_coding(code: Option<&str>, prefix: &str, system: &str) -> Option<Value> {
    code.filter(|c| c.starts_with(prefix))
        .map(|c| json!({"system": system, "code": c}))
}

/// UBERON or EFO term of an anatomical site
fn anatomical_coding(code: Option<&str>) -> Option<Value> {
    prefixed_coding(code, "UBERON:", UBERON_SYSTEM)
        .or_else(|| prefixed_coding(code, "EFO:", EFO_SYSTEM))
}

async fn patient_reference(
    owner: ResourceType,
    row: &DenormalizedRow,
    ctx: &BuildContext,
) -> Result<String> {
    let participant_id = payload::require(row.participant_id(), owner, "participant")?;
    ctx.reference(
        owner,
        ResourceType::Patient,
        &keys::patient(participant_id),
        "patient id",
    )
    .await
}

pub struct SequencingCenterBuilder;

#[async_trait]
impl EntityBuilder for SequencingCenterBuilder {
    fn resource_type(&self) -> ResourceType {
        ResourceType::SequencingCenter
    }

    fn records(&self, merged: &MergedStudy) -> Vec<BuilderRecord> {
        distinct_rows(merged, |row| {
            row.biospecimen
                .as_ref()
                .and_then(|b| b.sequencing_center_id.clone())
        })
    }

    async fn key_components(&self, record: &BuilderRecord, _ctx: &BuildContext) -> Result<NaturalKey> {
        let row = payload::expect_row(record, self.resource_type())?;
        let center = payload::require(
            biospecimen(row, self.resource_type())?.sequencing_center_id.as_deref(),
            self.resource_type(),
            "sequencing_center_id",
        )?;
        Ok(NaturalKey::identifier(center))
    }

    async fn build_entity(&self, record: &BuilderRecord, ctx: &BuildContext) -> Result<Value> {
        let row = payload::expect_row(record, self.resource_type())?;
        let center = payload::require(
            biospecimen(row, self.resource_type())?.sequencing_center_id.as_deref(),
            self.resource_type(),
            "sequencing_center_id",
        )?;
        Ok(json!({
            "resourceType": self.resource_type().api_path(),
            "meta": payload::meta(
                Some("http://hl7.org/fhir/StructureDefinition/Organization"),
                ctx.study_id().as_str(),
            ),
            "identifier": [{
                "use": "official",
                "system": format!("{}/sequencing-centers/", payload::DATASERVICE_SYSTEM),
                "value": center,
            }],
        }))
    }
}

pub struct SpecimenBuilder;

#[async_trait]
impl EntityBuilder for SpecimenBuilder {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Specimen
    }

    fn records(&self, merged: &MergedStudy) -> Vec<BuilderRecord> {
        distinct_rows(merged, |row| row.biospecimen_id().map(str::to_string))
    }

    async fn key_components(&self, record: &BuilderRecord, ctx: &BuildContext) -> Result<NaturalKey> {
        let row = payload::expect_row(record, self.resource_type())?;
        let biospecimen = biospecimen(row, self.resource_type())?;
        patient_reference(self.resource_type(), row, ctx).await?;
        Ok(keys::specimen(&biospecimen.kf_id))
    }

    async fn build_entity(&self, record: &BuilderRecord, ctx: &BuildContext) -> Result<Value> {
        let row = payload::expect_row(record, self.resource_type())?;
        let biospecimen = biospecimen(row, self.resource_type())?;
        let subject = patient_reference(self.resource_type(), row, ctx).await?;

        let mut identifiers = vec![payload::official_identifier(
            TableName::Biospecimen,
            &biospecimen.kf_id,
        )];
        if let Some(aliquot) = &biospecimen.external_aliquot_id {
            identifiers.push(json!({"use": "secondary", "value": aliquot}));
        }

        let mut entity = json!({
            "resourceType": self.resource_type().api_path(),
            "meta": payload::meta(
                Some("http://hl7.org/fhir/StructureDefinition/Specimen"),
                ctx.study_id().as_str(),
            ),
            "identifier": identifiers,
            "status": "available",
            "subject": {"reference": subject},
        });

        set_opt(
            &mut entity,
            "type",
            concept(
                biospecimen.source_text_tissue_type.as_deref(),
                vec![prefixed_coding(
                    biospecimen.ncit_id_tissue_type.as_deref(),
                    "NCIT:",
                    NCIT_SYSTEM,
                )],
            ),
        );

        let mut collection = json!({});
        set_opt(
            &mut collection,
            "_collectedDateTime",
            payload::relative_date(biospecimen.age_at_event_days),
        );
        if let Some(volume) = biospecimen.volume_ul {
            collection["quantity"] = json!({
                "value": volume,
                "unit": "microliters",
                "system": UCUM_SYSTEM,
                "code": "uL",
            });
        }
        set_opt(
            &mut collection,
            "method",
            concept(biospecimen.method_of_sample_procurement.as_deref(), vec![]),
        );
        set_opt(
            &mut collection,
            "bodySite",
            concept(
                biospecimen.source_text_anatomical_site.as_deref(),
                vec![
                    anatomical_coding(biospecimen.uberon_id_anatomical_site.as_deref()),
                    prefixed_coding(
                        biospecimen.ncit_id_anatomical_site.as_deref(),
                        "NCIT:",
                        NCIT_SYSTEM,
                    ),
                ],
            ),
        );
        if collection.as_object().is_some_and(|c| !c.is_empty()) {
            entity["collection"] = collection;
        }
        Ok(entity)
    }
}

pub struct HistopathologyBuilder;

impl HistopathologyBuilder {
    /// Patient, disease and specimen references of a biospecimen-diagnosis row
    async fn references(
        &self,
        row: &DenormalizedRow,
        ctx: &BuildContext,
    ) -> Result<(String, String, String)> {
        let owner = self.resource_type();
        let diagnosis_id = payload::require(row.diagnosis_id(), owner, "diagnosis")?;
        let biospecimen_id = payload::require(row.biospecimen_id(), owner, "biospecimen")?;
        let patient = patient_reference(owner, row, ctx).await?;
        let disease = ctx
            .reference(owner, ResourceType::Disease, &keys::disease(diagnosis_id), "disease id")
            .await?;
        let specimen = ctx
            .reference(
                owner,
                ResourceType::Specimen,
                &keys::specimen(biospecimen_id),
                "specimen id",
            )
            .await?;
        Ok((patient, disease, specimen))
    }
}

#[async_trait]
impl EntityBuilder for HistopathologyBuilder {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Histopathology
    }

    fn records(&self, merged: &MergedStudy) -> Vec<BuilderRecord> {
        distinct_rows(merged, |row| {
            row.biospecimen_diagnosis.as_ref().map(|bd| bd.kf_id.clone())
        })
    }

    async fn key_components(&self, record: &BuilderRecord, ctx: &BuildContext) -> Result<NaturalKey> {
        let row = payload::expect_row(record, self.resource_type())?;
        let link = payload::require(
            row.biospecimen_diagnosis.as_ref(),
            self.resource_type(),
            "biospecimen_diagnosis",
        )?;
        self.references(row, ctx).await?;
        Ok(NaturalKey::identifier(&link.kf_id))
    }

    async fn build_entity(&self, record: &BuilderRecord, ctx: &BuildContext) -> Result<Value> {
        let row = payload::expect_row(record, self.resource_type())?;
        let link = payload::require(
            row.biospecimen_diagnosis.as_ref(),
            self.resource_type(),
            "biospecimen_diagnosis",
        )?;
        let (patient, disease, specimen) = self.references(row, ctx).await?;

        let mut entity = json!({
            "resourceType": self.resource_type().api_path(),
            "meta": payload::meta(None, ctx.study_id().as_str()),
            "identifier": payload::identifiers(
                TableName::BiospecimenDiagnosis,
                &link.kf_id,
                link.external_id.as_deref(),
            ),
            "status": "final",
            "category": [{
                "coding": [{
                    "system": "http://terminology.hl7.org/CodeSystem/observation-category",
                    "code": "laboratory",
                    "display": "Laboratory",
                }],
                "text": "Histopathology",
            }],
            "code": {
                "coding": [{
                    "system": SNOMED_SYSTEM,
                    "code": "250537006",
                    "display": "Histopathology finding (finding)",
                }],
                "text": "Histopathology",
            },
            "subject": {"reference": patient},
            "focus": [{"reference": disease}],
            "specimen": {"reference": specimen},
        });
        set_opt(
            &mut entity,
            "_effectiveDateTime",
            payload::relative_date(row.diagnosis.as_ref().and_then(|d| d.age_at_event_days)),
        );
        Ok(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{context_with, row};
    use super::*;
    use crate::domain::StrandError;

    fn specimen_row() -> DenormalizedRow {
        row(json!({
            "participant": {"kf_id": "PT_1"},
            "biospecimen": {
                "kf_id": "BS_1",
                "sequencing_center_id": "SC_1",
                "external_aliquot_id": "A-1",
                "source_text_tissue_type": "Tumor",
                "ncit_id_tissue_type": "NCIT:C18009",
                "volume_ul": 12.5,
                "uberon_id_anatomical_site": "EFO:0000001",
                "ncit_id_anatomical_site": "C12434",
                "source_text_anatomical_site": "Blood",
            },
            "diagnosis": {"kf_id": "DG_1", "age_at_event_days": 10},
            "biospecimen_diagnosis": {"kf_id": "BD_1"},
        }))
    }

    #[tokio::test]
    async fn test_sequencing_center_key() {
        let ctx = context_with(&[]).await;
        let record = BuilderRecord::Row(Box::new(specimen_row()));
        let key = SequencingCenterBuilder.key_components(&record, &ctx).await.unwrap();
        assert_eq!(key, NaturalKey::identifier("SC_1"));
    }

    #[tokio::test]
    async fn test_specimen_payload() {
        let ctx = context_with(&[(ResourceType::Patient, NaturalKey::identifier("PT_1"), "5")]).await;
        let record = BuilderRecord::Row(Box::new(specimen_row()));

        let entity = SpecimenBuilder.build_entity(&record, &ctx).await.unwrap();
        assert_eq!(entity["identifier"][1]["value"], "A-1");
        assert_eq!(entity["type"]["coding"][0]["code"], "NCIT:C18009");
        assert_eq!(entity["collection"]["quantity"]["value"], 12.5);
        let body_site = &entity["collection"]["bodySite"];
        assert_eq!(body_site["text"], "Blood");
        assert_eq!(body_site["coding"].as_array().unwrap().len(), 1);
        assert_eq!(body_site["coding"][0]["system"], "http://www.ebi.ac.uk/efo/efo.owl");
    }

    #[tokio::test]
    async fn test_histopathology_links_disease_and_specimen() {
        let ctx = context_with(&[
            (ResourceType::Patient, NaturalKey::identifier("PT_1"), "5"),
            (ResourceType::Disease, NaturalKey::identifier("DG_1"), "6"),
            (ResourceType::Specimen, NaturalKey::identifier("BS_1"), "7"),
        ])
        .await;
        let record = BuilderRecord::Row(Box::new(specimen_row()));

        let key = HistopathologyBuilder.key_components(&record, &ctx).await.unwrap();
        assert_eq!(key, NaturalKey::identifier("BD_1"));

        let entity = HistopathologyBuilder.build_entity(&record, &ctx).await.unwrap();
        assert_eq!(entity["focus"][0]["reference"], "Condition/6");
        assert_eq!(entity["specimen"]["reference"], "Specimen/7");
        assert_eq!(entity["subject"]["reference"], "Patient/5");
    }

    #[tokio::test]
    async fn test_sequencing_center_requires_id() {
        let ctx = context_with(&[]).await;
        let record = BuilderRecord::Row(Box::new(row(json!({
            "biospecimen": {"kf_id": "BS_1"},
        }))));
        let err = SequencingCenterBuilder
            .key_components(&record, &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, StrandError::MissingField { .. }));
    }
}
