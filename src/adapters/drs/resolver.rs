//! File-metadata resolver
//!
//! Classifies a genomic file by its declared urls. A file is FEDERATED when
//! one of its urls points at the federated host with an object path
//! (`/ga4gh/drs/v1/objects/<id>` or `/index/index/<id>`); its metadata is then
//! fetched and replaces the local values. Every other file is LOCAL and keeps
//! its snapshot metadata.

use super::federated::FederatedMetadataSource;
use crate::config::FilesConfig;
use crate::domain::records::GenomicFileRecord;
use crate::domain::{Result, StrandError};
use regex::Regex;
use std::sync::Arc;
use url::Url;

const OBJECT_PATH_PATTERN: &str = r"^/(?:ga4gh/drs/v1/objects|index/index)/([^/]+)/?$";

/// Where a genomic file's metadata lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileLocation {
    Local,
    Federated { object_id: String },
}

/// Genomic file with normalized metadata and its canonical locator
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFile {
    pub record: GenomicFileRecord,
    pub location: FileLocation,
    /// Normalized access-control list
    pub access: Vec<String>,
    /// `drs://<authority>/<object id>`; absent for a LOCAL file without `latest_did`
    pub locator: Option<String>,
}

/// Resolves genomic file metadata against the local and federated stores
pub struct FileMetadataResolver {
    default_host: String,
    federated_authority: String,
    object_path: Regex,
    federated: Arc<dyn FederatedMetadataSource>,
}

impl FileMetadataResolver {
    pub fn new(config: &FilesConfig, federated: Arc<dyn FederatedMetadataSource>) -> Result<Self> {
        let federated_authority = config.federated_authority().ok_or_else(|| {
            StrandError::Configuration(
                "files.federated_host could not be derived from federated_base_url".to_string(),
            )
        })?;
        let object_path = Regex::new(OBJECT_PATH_PATTERN)
            .map_err(|e| StrandError::Configuration(format!("Invalid object path pattern: {e}")))?;

        Ok(Self {
            default_host: config.default_drs_host.trim().to_string(),
            federated_authority,
            object_path,
            federated,
        })
    }

    /// Classifies a file by its declared urls
    pub fn classify(&self, urls: &[String]) -> FileLocation {
        urls.iter()
            .find_map(|raw| {
                let url = Url::parse(raw).ok()?;
                if authority(&url)? != self.federated_authority {
                    return None;
                }
                self.object_path
                    .captures(url.path())
                    .and_then(|c| c.get(1))
                    .map(|m| m.as_str().to_string())
            })
            .map(|object_id| FileLocation::Federated { object_id })
            .unwrap_or(FileLocation::Local)
    }

    /// Normalizes a genomic file's metadata and computes its locator
    pub async fn resolve(&self, record: &GenomicFileRecord) -> Result<ResolvedFile> {
        let mut record = record.clone();
        let location = self.classify(&record.urls);

        let locator = match &location {
            FileLocation::Federated { object_id } => {
                let metadata = self.federated.fetch(object_id).await?;
                let reported = metadata.object_id().filter(|id| *id != object_id.as_str());
                if let Some(reported) = reported {
                    tracing::debug!(
                        genomic_file = %record.kf_id,
                        object_id = %object_id,
                        reported = %reported,
                        "Federated service reports a different object id, keeping the url's"
                    );
                }

                record.size = metadata.size;
                record.hashes = metadata.hashes;
                record.file_name = metadata.file_name;
                record.acl = metadata.acl;
                record.authz = metadata.authz;
                record.urls = metadata.urls;

                tracing::debug!(
                    genomic_file = %record.kf_id,
                    object_id = %object_id,
                    "Resolved federated file metadata"
                );
                Some(format!("drs://{}/{}", self.federated_authority, object_id))
            }
            FileLocation::Local => record
                .latest_did
                .as_ref()
                .map(|did| format!("drs://{}/{}", self.default_host, did)),
        };

        let access = normalize_access(&record.authz, &record.acl);
        Ok(ResolvedFile {
            record,
            location,
            access,
            locator,
        })
    }
}

/// Reduces access control to the flat consent-code form
///
/// `authz` wins over `acl`: each entry keeps its last `/` segment, trimmed,
/// with `open` mapped to `*`.
pub fn normalize_access(authz: &[String], acl: &[String]) -> Vec<String> {
    if authz.is_empty() {
        return acl.to_vec();
    }
    authz
        .iter()
        .map(|code| {
            let code = code.rsplit('/').next().unwrap_or(code).trim();
            if code == "open" {
                "*".to_string()
            } else {
                code.to_string()
            }
        })
        .collect()
}

fn authority(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}
