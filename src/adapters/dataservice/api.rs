//! Dataservice REST API
//!
//! The file-store fields of a genomic file (urls, access control, hashes)
//! can be newer in the dataservice API than in the database. When an API url
//! is configured they are fetched per file and merged onto the snapshot
//! record before metadata resolution.

use crate::adapters::fhir::client::send_with_retry;
use crate::config::RetryConfig;
use crate::domain::records::{clean, GenomicFileRecord};
use crate::domain::{FileMetadataError, Result, StrandError};
use reqwest::{Client, ClientBuilder};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// File-store fields of a `genomic-files` API response
#[derive(Debug, Clone, Default, Deserialize)]
struct FileStoreFields {
    #[serde(default, deserialize_with = "clean::string_list")]
    urls: Vec<String>,
    #[serde(default, deserialize_with = "clean::string_list")]
    acl: Vec<String>,
    #[serde(default, deserialize_with = "clean::string_list")]
    authz: Vec<String>,
    #[serde(default, deserialize_with = "clean::string_map")]
    hashes: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "clean::opt_i64")]
    size: Option<i64>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    file_name: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    latest_did: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    results: FileStoreFields,
}

/// Client for `GET <api_url>/genomic-files/<kf_id>`
pub struct DataserviceApi {
    client: Client,
    base_url: String,
    retry: RetryConfig,
}

impl DataserviceApi {
    pub fn new(api_url: &str, retry: RetryConfig, timeout_seconds: u64) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| {
                StrandError::Configuration(format!("Failed to build dataservice HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            base_url: api_url.trim_end_matches('/').to_string(),
            retry,
        })
    }

    /// Returns the record with file-store fields replaced by the API's values
    ///
    /// Fields the API leaves empty keep their snapshot value.
    pub async fn enrich(&self, record: &GenomicFileRecord) -> Result<GenomicFileRecord> {
        let fields = self.fetch_file_store_fields(&record.kf_id).await?;
        let mut record = record.clone();

        if !fields.urls.is_empty() {
            record.urls = fields.urls;
        }
        if !fields.acl.is_empty() {
            record.acl = fields.acl;
        }
        if !fields.authz.is_empty() {
            record.authz = fields.authz;
        }
        if !fields.hashes.is_empty() {
            record.hashes = fields.hashes;
        }
        if fields.size.is_some() {
            record.size = fields.size;
        }
        if fields.file_name.is_some() {
            record.file_name = fields.file_name;
        }
        if fields.latest_did.is_some() {
            record.latest_did = fields.latest_did;
        }

        Ok(record)
    }

    async fn fetch_file_store_fields(&self, kf_id: &str) -> Result<FileStoreFields> {
        let url = format!("{}/genomic-files/{}", self.base_url, kf_id);
        let response = send_with_retry(&self.retry, true, || {
            self.client
                .get(&url)
                .header("Content-Type", "application/json")
        })
        .await
        .map_err(|e| FileMetadataError::FetchFailed {
            object_id: kf_id.to_string(),
            message: e.to_string(),
        })?;

        if !(200..300).contains(&response.status) {
            return Err(FileMetadataError::FetchFailed {
                object_id: kf_id.to_string(),
                message: format!("dataservice status {}: {}", response.status, response.body),
            }
            .into());
        }

        let envelope: ApiEnvelope = serde_json::from_str(&response.body).map_err(|e| {
            FileMetadataError::InvalidResponse {
                object_id: kf_id.to_string(),
                message: e.to_string(),
            }
        })?;
        Ok(envelope.results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn api(base_url: &str) -> DataserviceApi {
        let retry = RetryConfig {
            max_retries: 0,
            initial_delay_ms: 1,
            max_delay_ms: 1,
            backoff_multiplier: 1.0,
        };
        DataserviceApi::new(base_url, retry, 5).unwrap()
    }

    fn record() -> GenomicFileRecord {
        serde_json::from_value(json!({
            "kf_id": "GF_1",
            "visible": true,
            "urls": ["s3://old/file.bam"],
            "latest_did": "old-did",
            "file_name": "file.bam",
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_enrich_overwrites_present_fields() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/genomic-files/GF_1")
            .with_status(200)
            .with_body(
                json!({
                    "results": {
                        "kf_id": "GF_1",
                        "urls": ["s3://new/file.bam"],
                        "acl": ["phs000001.c1"],
                        "latest_did": "new-did",
                        "file_name": null
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let enriched = api(&server.url()).enrich(&record()).await.unwrap();
        assert_eq!(enriched.urls, vec!["s3://new/file.bam".to_string()]);
        assert_eq!(enriched.acl, vec!["phs000001.c1".to_string()]);
        assert_eq!(enriched.latest_did.as_deref(), Some("new-did"));
        assert_eq!(enriched.file_name.as_deref(), Some("file.bam"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_enrich_fails_on_missing_file() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/genomic-files/GF_1")
            .with_status(404)
            .with_body(r#"{"_status":{"code":404}}"#)
            .create_async()
            .await;

        let err = api(&server.url()).enrich(&record()).await.unwrap_err();
        assert!(err.to_string().contains("GF_1"));
    }
}
