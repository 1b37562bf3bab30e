//! Practitioner, Organization and PractitionerRole from the study investigator

use super::payload::{self, keys};
use super::EntityBuilder;
use crate::core::load::context::BuildContext;
use crate::core::load::record::{distinct_rows, BuilderRecord};
use crate::domain::records::InvestigatorRecord;
use crate::domain::{MergedStudy, NaturalKey, ResourceType, Result, TableName};
use async_trait::async_trait;
use serde_json::{json, Value};

fn investigator(record: &BuilderRecord, resource_type: ResourceType) -> Result<&InvestigatorRecord> {
    let row = payload::expect_row(record, resource_type)?;
    payload::require(row.investigator.as_ref(), resource_type, "investigator")
}

fn investigator_rows(merged: &MergedStudy) -> Vec<BuilderRecord> {
    distinct_rows(merged, |row| row.investigator_id().map(str::to_string))
}

/// Key of the role linking an investigator's practitioner and organization
pub(crate) async fn practitioner_role_key(
    owner: ResourceType,
    investigator_id: &str,
    ctx: &BuildContext,
) -> Result<NaturalKey> {
    let practitioner = ctx
        .reference(
            owner,
            ResourceType::Practitioner,
            &keys::practitioner(investigator_id),
            "practitioner id",
        )
        .await?;
    let organization = ctx
        .reference(
            owner,
            ResourceType::Organization,
            &keys::organization(investigator_id),
            "organization id",
        )
        .await?;
    Ok(keys::practitioner_role(practitioner, organization))
}

pub struct PractitionerBuilder;

#[async_trait]
impl EntityBuilder for PractitionerBuilder {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Practitioner
    }

    fn records(&self, merged: &MergedStudy) -> Vec<BuilderRecord> {
        investigator_rows(merged)
    }

    async fn key_components(&self, record: &BuilderRecord, _ctx: &BuildContext) -> Result<NaturalKey> {
        let investigator = investigator(record, self.resource_type())?;
        Ok(keys::practitioner(&investigator.kf_id))
    }

    async fn build_entity(&self, record: &BuilderRecord, ctx: &BuildContext) -> Result<Value> {
        let investigator = investigator(record, self.resource_type())?;
        let mut entity = json!({
            "resourceType": self.resource_type().api_path(),
            "meta": payload::meta(
                Some("http://hl7.org/fhir/StructureDefinition/Practitioner"),
                ctx.study_id().as_str(),
            ),
            "identifier": payload::identifiers(
                TableName::Investigator,
                &investigator.kf_id,
                investigator.external_id.as_deref(),
            ),
            "active": true,
        });
        if let Some(name) = &investigator.name {
            entity["name"] = json!([{"text": name}]);
        }
        Ok(entity)
    }
}

pub struct OrganizationBuilder;

#[async_trait]
impl EntityBuilder for OrganizationBuilder {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Organization
    }

    fn records(&self, merged: &MergedStudy) -> Vec<BuilderRecord> {
        investigator_rows(merged)
    }

    async fn key_components(&self, record: &BuilderRecord, _ctx: &BuildContext) -> Result<NaturalKey> {
        let investigator = investigator(record, self.resource_type())?;
        Ok(keys::organization(&investigator.kf_id))
    }

    async fn build_entity(&self, record: &BuilderRecord, ctx: &BuildContext) -> Result<Value> {
        let investigator = investigator(record, self.resource_type())?;
        let mut entity = json!({
            "resourceType": self.resource_type().api_path(),
            "meta": payload::meta(
                Some("http://hl7.org/fhir/StructureDefinition/Organization"),
                ctx.study_id().as_str(),
            ),
            "identifier": payload::identifiers(
                TableName::Investigator,
                &investigator.kf_id,
                investigator.external_id.as_deref(),
            ),
            "active": true,
        });
        if let Some(institution) = &investigator.institution {
            entity["name"] = json!(institution);
        }
        Ok(entity)
    }
}

pub struct PractitionerRoleBuilder;

#[async_trait]
impl EntityBuilder for PractitionerRoleBuilder {
    fn resource_type(&self) -> ResourceType {
        ResourceType::PractitionerRole
    }

    fn records(&self, merged: &MergedStudy) -> Vec<BuilderRecord> {
        investigator_rows(merged)
    }

    async fn key_components(&self, record: &BuilderRecord, ctx: &BuildContext) -> Result<NaturalKey> {
        let investigator = investigator(record, self.resource_type())?;
        practitioner_role_key(self.resource_type(), &investigator.kf_id, ctx).await
    }

    async fn build_entity(&self, record: &BuilderRecord, ctx: &BuildContext) -> Result<Value> {
        let investigator = investigator(record, self.resource_type())?;
        let key = practitioner_role_key(self.resource_type(), &investigator.kf_id, ctx).await?;

        let mut identifiers = vec![payload::official_identifier(
            TableName::Investigator,
            &investigator.kf_id,
        )];
        if let Some(external_id) = &investigator.external_id {
            identifiers.push(json!({"use": "secondary", "value": external_id}));
        }

        Ok(json!({
            "resourceType": self.resource_type().api_path(),
            "meta": payload::meta(
                Some("http://hl7.org/fhir/StructureDefinition/PractitionerRole"),
                ctx.study_id().as_str(),
            ),
            "identifier": identifiers,
            "active": true,
            "practitioner": {"reference": key.get("practitioner")},
            "organization": {"reference": key.get("organization")},
            "code": [{
                "coding": [{
                    "system": "http://terminology.hl7.org/CodeSystem/practitioner-role",
                    "code": "researcher",
                    "display": "Researcher",
                }],
            }],
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{context_with, row};
    use super::*;
    use crate::domain::StrandError;

    fn record() -> BuilderRecord {
        BuilderRecord::Row(Box::new(row(json!({
            "investigator": {"kf_id": "IG_1", "name": "Jane Doe", "institution": "CHOP"},
        }))))
    }

    #[tokio::test]
    async fn test_practitioner_payload() {
        let ctx = context_with(&[]).await;
        let builder = PractitionerBuilder;
        let key = builder.key_components(&record(), &ctx).await.unwrap();
        assert_eq!(key, NaturalKey::identifier("IG_1"));

        let entity = builder.build_entity(&record(), &ctx).await.unwrap();
        assert_eq!(entity["resourceType"], "Practitioner");
        assert_eq!(entity["name"][0]["text"], "Jane Doe");
        assert_eq!(entity["identifier"][0]["value"], "IG_1");
    }

    #[tokio::test]
    async fn test_organization_named_after_institution() {
        let ctx = context_with(&[]).await;
        let entity = OrganizationBuilder.build_entity(&record(), &ctx).await.unwrap();
        assert_eq!(entity["name"], "CHOP");
    }

    #[tokio::test]
    async fn test_role_references_both_resources() {
        let ctx = context_with(&[
            (ResourceType::Practitioner, NaturalKey::identifier("IG_1"), "11"),
            (ResourceType::Organization, NaturalKey::identifier("IG_1"), "22"),
        ])
        .await;
        let builder = PractitionerRoleBuilder;

        let key = builder.key_components(&record(), &ctx).await.unwrap();
        assert_eq!(key.get("practitioner"), Some("Practitioner/11"));
        assert_eq!(key.get("organization"), Some("Organization/22"));

        let entity = builder.build_entity(&record(), &ctx).await.unwrap();
        assert_eq!(entity["practitioner"]["reference"], "Practitioner/11");
        assert_eq!(entity["code"][0]["coding"][0]["code"], "researcher");
    }

    #[tokio::test]
    async fn test_row_without_investigator_is_missing_field() {
        let ctx = context_with(&[]).await;
        let record = BuilderRecord::Row(Box::new(row(json!({}))));
        let err = PractitionerBuilder
            .key_components(&record, &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, StrandError::MissingField { .. }));
    }
}
