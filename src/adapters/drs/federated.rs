//! Federated file-metadata service
//!
//! Fetches object metadata (`GET <base>/<endpoint>/<object id>`) for files
//! hosted outside the local file store.

use crate::adapters::fhir::client::send_with_retry;
use crate::config::{FilesConfig, RetryConfig};
use crate::domain::records::clean;
use crate::domain::{FileMetadataError, Result, StrandError};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Metadata of one federated object
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FederatedMetadata {
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub did: Option<String>,
    #[serde(default, deserialize_with = "clean::opt_i64")]
    pub size: Option<i64>,
    #[serde(default, deserialize_with = "clean::string_map")]
    pub hashes: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "clean::opt_string")]
    pub file_name: Option<String>,
    #[serde(default, deserialize_with = "clean::string_list")]
    pub acl: Vec<String>,
    #[serde(default, deserialize_with = "clean::string_list")]
    pub authz: Vec<String>,
    #[serde(default, deserialize_with = "clean::string_list")]
    pub urls: Vec<String>,
}

impl FederatedMetadata {
    /// Object id reported by the service (DRS `id` or indexd `did`)
    pub fn object_id(&self) -> Option<&str> {
        self.id.as_deref().or(self.did.as_deref())
    }
}

/// Source of federated object metadata
#[async_trait]
pub trait FederatedMetadataSource: Send + Sync {
    async fn fetch(&self, object_id: &str) -> Result<FederatedMetadata>;
}

/// HTTP implementation of [`FederatedMetadataSource`]
pub struct HttpFederatedSource {
    client: Client,
    base_url: String,
    endpoint: String,
    retry: RetryConfig,
}

impl HttpFederatedSource {
    pub fn new(config: &FilesConfig, retry: RetryConfig, timeout_seconds: u64) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| {
                StrandError::Configuration(format!("Failed to build metadata HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            base_url: config.federated_base_url.trim_end_matches('/').to_string(),
            endpoint: config.federated_endpoint.trim_matches('/').to_string(),
            retry,
        })
    }

    fn object_url(&self, object_id: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.endpoint, object_id)
    }
}

#[async_trait]
impl FederatedMetadataSource for HttpFederatedSource {
    async fn fetch(&self, object_id: &str) -> Result<FederatedMetadata> {
        let url = self.object_url(object_id);
        let response = send_with_retry(&self.retry, true, || {
            self.client
                .get(&url)
                .header("Content-Type", "application/json")
        })
        .await
        .map_err(|e| FileMetadataError::FetchFailed {
            object_id: object_id.to_string(),
            message: e.to_string(),
        })?;

        if !(200..300).contains(&response.status) {
            return Err(FileMetadataError::FetchFailed {
                object_id: object_id.to_string(),
                message: format!("status {}: {}", response.status, response.body),
            }
            .into());
        }

        serde_json::from_str(&response.body).map_err(|e| {
            FileMetadataError::InvalidResponse {
                object_id: object_id.to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }
}
