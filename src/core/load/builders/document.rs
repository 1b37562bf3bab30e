//! DRS DocumentReference from genomic files
//!
//! One document per (study, genomic file, sequencing experiment) group. The
//! first `content` entry carries the canonical `drs://` locator together with
//! the size and hash extensions; every declared storage url follows as its
//! own attachment.

use super::payload::{self, keys};
use super::EntityBuilder;
use crate::adapters::drs::ResolvedFile;
use crate::core::load::context::BuildContext;
use crate::core::load::record::{file_groups, BuilderRecord, FileGroup};
use crate::domain::{MergedStudy, NaturalKey, ResourceType, Result, StrandError, TableName};
use async_trait::async_trait;
use serde_json::{json, Value};

const NCPI_IG: &str = "https://nih-ncpi.github.io/ncpi-fhir-ig/StructureDefinition";
const DATA_TYPES_SYSTEM: &str = "https://includedcc.org/fhir/code-systems/data_types";
const STRATEGIES_SYSTEM: &str = "https://includedcc.org/fhir/code-systems/experimental_strategies";
const DATA_ACCESS_SYSTEM: &str = "https://includedcc.org/fhir/code-systems/data_access_types";

/// Source values that stand for "no value"
const MISSING_VALUES: [&str; 8] = [
    "Not Applicable",
    "Not Available",
    "Not Reported",
    "Not Able to Provide",
    "Cannot Collect",
    "No Match",
    "Other",
    "Unknown",
];

/// Data types that are only published with a tabix index variant
const INDEXED_WITH_TBI: [&str; 2] = ["Simple Nucleotide Variations", "Somatic Structural Variations"];

fn data_type_coding(data_type: &str) -> Option<Value> {
    let (code, display) = match data_type {
        "Aligned Reads" | "Aligned Read" | "Genome Aligned Read" | "Transcriptome Aligned Read" => {
            ("Aligned-Reads", "Aligned Reads")
        }
        "Aligned Reads Index" | "Genome Aligned Read Index" => {
            ("Aligned-Reads-Index", "Aligned Reads Index")
        }
        "Unaligned Reads" => ("Unaligned-Reads", "Unaligned Reads"),
        "gVCF" | "Genomic Variant" => ("gVCF", "gVCF"),
        "gVCF Index" | "Genomic Variant Index" => ("gVCF-Index", "gVCF Index"),
        "Variant Calls" => ("Variant-Calls", "Variant Calls"),
        "Variant Calls Index" => ("Variant-Calls-Index", "Variant Calls Index"),
        "Gene Expression" | "Gene Expression Quantification" | "Expression" => (
            "Gene-Expression-Quantifications",
            "Gene Expression Quantifications",
        ),
        "Gene Fusions" => ("Gene-Fusions", "Gene Fusions"),
        "Simple Nucleotide Variations" | "Masked Somatic Mutation" => (
            "Somatic-Simple-Nucleotide-Variations",
            "Somatic Simple Nucleotide Variations",
        ),
        "Simple Nucleotide Variations Index" | "Masked Somatic Mutation Index" => (
            "Somatic-Simple-Nucleotide-Variations-Index",
            "Somatic Simple Nucleotide Variations Index",
        ),
        "Somatic Copy Number Variations" | "Somatic Copy Number Variation" => (
            "Somatic-Copy-Number-Variations",
            "Somatic Copy Number Variations",
        ),
        "Somatic Structural Variations" | "Somatic Structural Variation" => (
            "Somatic-Structural-Variations",
            "Somatic Structural Variations",
        ),
        "Somatic Structural Variations Index" => (
            "Somatic-Structural-Variations-Index",
            "Somatic Structural Variations Index",
        ),
        _ => return None,
    };
    Some(json!({"system": DATA_TYPES_SYSTEM, "code": code, "display": display}))
}

fn strategy_coding(strategy: &str) -> Option<Value> {
    let (code, display) = match strategy {
        "WGS" => ("WGS", "Whole Genome Sequencing"),
        "WXS" => ("WXS", "Whole Exome Sequencing"),
        "RNA-Seq" => ("RNA-Seq", "RNA Sequencing"),
        "miRNA-Seq" => ("miRNA-Seq", "MicroRNA Sequencing"),
        "Linked-Read WGS (10x Chromium)" => ("Linked-Read-WGS", "Linked-Read WGS"),
        "Methylation" => ("Methylation", "Methylation"),
        "Targeted Sequencing" => ("Targeted-Sequencing", "Targeted Sequencing"),
        "scRNA-Seq" => ("scRNA-Seq", "Single-Cell RNA Sequencing"),
        "snRNA-Seq" => ("snRNA-Seq", "Single-Nucleus RNA Sequencing"),
        _ => return None,
    };
    Some(json!({"system": STRATEGIES_SYSTEM, "code": code, "display": display}))
}

/// Data type as published, with the index suffix imputed for tabix files
fn effective_data_type(data_type: Option<&str>, file_format: Option<&str>) -> Option<String> {
    let data_type = data_type?;
    if INDEXED_WITH_TBI.contains(&data_type) && file_format == Some("tbi") {
        Some(format!("{data_type} Index"))
    } else {
        Some(data_type.to_string())
    }
}

fn is_index(data_type: Option<&str>) -> bool {
    data_type.is_some_and(|t| t.ends_with(" Index"))
}

/// Security labels: the access level first, then one per access code
fn security_labels(controlled_access: Option<bool>, access: &[String]) -> Vec<Value> {
    let mut labels = Vec::with_capacity(access.len() + 1);
    if let Some(controlled) = controlled_access {
        let (code, display) = if controlled {
            ("controlled", "Controlled")
        } else {
            ("registered", "Registered")
        };
        labels.push(json!({
            "text": display,
            "coding": [{"system": DATA_ACCESS_SYSTEM, "code": code, "display": display}],
        }));
    }
    for code in access {
        let mut label = json!({"text": code});
        if let Some((_, consent)) = code.split_once('.') {
            let consent = consent.split('.').next().unwrap_or(consent);
            label["coding"] = json!([{"code": consent}]);
        }
        labels.push(label);
    }
    labels
}

/// Locator attachment plus one attachment per storage url
fn content(file: &ResolvedFile, locator: &str) -> Vec<Value> {
    let record = &file.record;
    let mut extensions = Vec::new();
    if let Some(size) = record.size {
        extensions.push(json!({
            "url": format!("{NCPI_IG}/file-size"),
            "valueDecimal": size,
        }));
    }
    for (algorithm, hash) in &record.hashes {
        extensions.push(json!({
            "url": format!("{NCPI_IG}/hashes"),
            "valueCodeableConcept": {
                "coding": [{"display": algorithm}],
                "text": hash,
            },
        }));
    }

    let mut attachment = json!({"url": locator});
    if !extensions.is_empty() {
        attachment["extension"] = Value::Array(extensions);
    }
    if let Some(title) = record
        .file_name
        .as_deref()
        .and_then(|name| name.rsplit('/').next())
        .filter(|title| !title.is_empty())
    {
        attachment["title"] = json!(title);
    }

    let mut primary = json!({"attachment": attachment});
    if let Some(format) = record
        .file_format
        .as_deref()
        .filter(|f| !MISSING_VALUES.contains(f))
    {
        primary["format"] = json!({"display": format});
    }

    let mut entries = vec![primary];
    entries.extend(record.urls.iter().map(|url| json!({"attachment": {"url": url}})));
    entries
}

pub struct DrsDocumentReferenceBuilder;

impl DrsDocumentReferenceBuilder {
    fn group<'a>(&self, record: &'a BuilderRecord) -> Result<&'a FileGroup> {
        match record {
            BuilderRecord::FileGroup(group) => Ok(group),
            _ => Err(StrandError::Validation(
                "drs_document_reference builder expects a file group record".to_string(),
            )),
        }
    }

    /// Patient reference when the file belongs to exactly one participant
    async fn subject(&self, group: &FileGroup, ctx: &BuildContext) -> Result<Option<String>> {
        let participants = group.participant_ids();
        match participants.iter().next() {
            Some(participant_id) if participants.len() == 1 => {
                ctx.optional_reference(ResourceType::Patient, &keys::patient(participant_id))
                    .await
            }
            _ => Ok(None),
        }
    }

    async fn related(&self, group: &FileGroup, ctx: &BuildContext) -> Result<Vec<Value>> {
        let mut related = Vec::new();
        for specimen in &group.specimens {
            if let Some(reference) = ctx
                .optional_reference(
                    ResourceType::Specimen,
                    &keys::specimen(&specimen.biospecimen_id),
                )
                .await?
            {
                related.push(json!({"reference": reference}));
            }
        }
        Ok(related)
    }
}

#[async_trait]
impl EntityBuilder for DrsDocumentReferenceBuilder {
    fn resource_type(&self) -> ResourceType {
        ResourceType::DrsDocumentReference
    }

    fn records(&self, merged: &MergedStudy) -> Vec<BuilderRecord> {
        file_groups(merged)
    }

    async fn key_components(&self, record: &BuilderRecord, _ctx: &BuildContext) -> Result<NaturalKey> {
        let group = self.group(record)?;
        Ok(keys::tagged(&group.study.kf_id, &group.genomic_file.kf_id))
    }

    async fn build_entity(&self, record: &BuilderRecord, ctx: &BuildContext) -> Result<Value> {
        let group = self.group(record)?;
        let file = ctx.resolve_file(&group.genomic_file).await?;
        let locator = payload::require(file.locator.as_deref(), self.resource_type(), "locator")?;
        let genomic_file = &file.record;

        let mut entity = json!({
            "resourceType": self.resource_type().api_path(),
            "meta": payload::meta(
                Some("https://ncpi-fhir.github.io/ncpi-fhir-ig/StructureDefinition/ncpi-drs-document-reference"),
                &group.study.kf_id,
            ),
            "identifier": [payload::official_identifier(TableName::GenomicFile, &genomic_file.kf_id)],
            "status": "current",
            "docStatus": "final",
        });

        let data_type = effective_data_type(
            genomic_file.data_type.as_deref(),
            genomic_file.file_format.as_deref(),
        );
        payload::set_opt(
            &mut entity,
            "type",
            payload::concept(
                data_type.as_deref(),
                vec![data_type.as_deref().and_then(data_type_coding)],
            ),
        );

        if let Some(strategy) = group
            .sequencing_experiment
            .as_ref()
            .and_then(|se| se.experiment_strategy.as_deref())
        {
            let category = payload::concept(Some(strategy), vec![strategy_coding(strategy)]);
            entity["category"] = json!([category]);
        }

        if let Some(subject) = self.subject(group, ctx).await? {
            entity["subject"] = json!({"reference": subject});
        }

        let labels = security_labels(genomic_file.controlled_access, &file.access);
        if !labels.is_empty() {
            entity["securityLabel"] = Value::Array(labels);
        }

        entity["content"] = Value::Array(content(&file, locator));

        if !is_index(data_type.as_deref()) {
            let related = self.related(group, ctx).await?;
            if !related.is_empty() {
                entity["context"] = json!({"related": related});
            }
        }
        Ok(entity)
    }
}
