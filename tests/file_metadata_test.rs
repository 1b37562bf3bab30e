//! Integration tests for genomic file metadata resolution over HTTP

use mockito::Matcher;
use serde_json::json;
use std::sync::Arc;
use strand::adapters::drs::{FileLocation, FileMetadataResolver, HttpFederatedSource};
use strand::config::{FilesConfig, RetryConfig};
use strand::domain::records::GenomicFileRecord;
use strand::domain::{FileMetadataError, StrandError};

fn resolver(federated_base_url: &str) -> FileMetadataResolver {
    let config = FilesConfig {
        default_drs_host: "data.example".to_string(),
        federated_base_url: federated_base_url.to_string(),
        federated_host: Some("federated.example".to_string()),
        federated_endpoint: "index/index".to_string(),
    };
    let retry = RetryConfig {
        max_retries: 0,
        ..RetryConfig::default()
    };
    let source = HttpFederatedSource::new(&config, retry, 5).unwrap();
    FileMetadataResolver::new(&config, Arc::new(source)).unwrap()
}

fn genomic_file(value: serde_json::Value) -> GenomicFileRecord {
    serde_json::from_value(value).unwrap()
}

#[tokio::test]
async fn test_federated_file_takes_remote_metadata() {
    let mut server = mockito::Server::new_async().await;
    let fetch = server
        .mock("GET", "/index/index/ABC123")
        .with_status(200)
        .with_body(
            json!({
                "did": "ABC123",
                "size": 1024,
                "hashes": {"md5": "d41d8cd98f00b204e9800998ecf8427e"},
                "file_name": "sample.cram",
                "acl": ["phs001"],
                "authz": ["/programs/phs001.c1"],
                "urls": ["s3://federated-bucket/sample.cram"]
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let record = genomic_file(json!({
        "kf_id": "GF_1",
        "visible": true,
        "size": 1,
        "file_name": "local.cram",
        "latest_did": "LOCAL1",
        "urls": [
            "s3://kf-bucket/local.cram",
            "https://federated.example/ga4gh/drs/v1/objects/ABC123"
        ]
    }));

    let resolved = resolver(&server.url()).resolve(&record).await.unwrap();

    assert_eq!(
        resolved.location,
        FileLocation::Federated {
            object_id: "ABC123".to_string()
        }
    );
    assert_eq!(
        resolved.locator.as_deref(),
        Some("drs://federated.example/ABC123")
    );
    assert_eq!(resolved.record.size, Some(1024));
    assert_eq!(resolved.record.file_name.as_deref(), Some("sample.cram"));
    assert_eq!(resolved.record.urls, vec!["s3://federated-bucket/sample.cram"]);
    assert_eq!(resolved.access, vec!["phs001.c1"]);
    fetch.assert_async().await;
}

#[tokio::test]
async fn test_local_file_never_calls_federated_service() {
    let mut server = mockito::Server::new_async().await;
    let any = server
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let record = genomic_file(json!({
        "kf_id": "GF_2",
        "visible": true,
        "latest_did": "XYZ789",
        "acl": ["*"],
        "urls": ["s3://kf-bucket/reads.bam"]
    }));

    let resolved = resolver(&server.url()).resolve(&record).await.unwrap();

    assert_eq!(resolved.location, FileLocation::Local);
    assert_eq!(resolved.locator.as_deref(), Some("drs://data.example/XYZ789"));
    assert_eq!(resolved.access, vec!["*"]);
    any.assert_async().await;
}

#[tokio::test]
async fn test_federated_fetch_failure_is_file_metadata_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/index/index/GONE1")
        .with_status(404)
        .with_body("not found")
        .create_async()
        .await;

    let record = genomic_file(json!({
        "kf_id": "GF_3",
        "visible": true,
        "urls": ["https://federated.example/index/index/GONE1"]
    }));

    let err = resolver(&server.url()).resolve(&record).await.unwrap_err();
    assert!(matches!(
        err,
        StrandError::FileMetadata(FileMetadataError::FetchFailed { .. })
    ));
    assert!(!err.is_fatal());
}
