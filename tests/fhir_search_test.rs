//! Integration tests for paginated search and natural-key resolution

use futures::StreamExt;
use mockito::Matcher;
use serde_json::json;
use strand::adapters::fhir::{query_target_ids, scan_resource_ids, scan_resources, FhirClient};
use strand::config::{FhirConfig, RetryConfig};
use strand::domain::{FhirError, NaturalKey, ResourceType, StrandError};

const PLACEHOLDER: &str = "http://localhost:8000";

fn client(base_url: &str) -> FhirClient {
    FhirClient::new(FhirConfig {
        base_url: base_url.to_string(),
        username: None,
        password: None,
        cookie: None,
        placeholder_host: PLACEHOLDER.to_string(),
        timeout_seconds: 5,
        tls_verify: true,
        retry: RetryConfig {
            max_retries: 0,
            ..RetryConfig::default()
        },
    })
    .unwrap()
}

fn bundle(total: usize, ids: &[&str], next: Option<&str>) -> String {
    let entry: Vec<_> = ids
        .iter()
        .map(|id| json!({"resource": {"resourceType": "Patient", "id": id}}))
        .collect();
    let link: Vec<_> = next
        .map(|url| json!({"relation": "next", "url": url}))
        .into_iter()
        .collect();
    json!({"resourceType": "Bundle", "total": total, "link": link, "entry": entry}).to_string()
}

#[tokio::test]
async fn test_scan_follows_placeholder_links_and_dedupes() {
    let mut server = mockito::Server::new_async().await;
    let first = server
        .mock("GET", "/Patient")
        .match_query(Matcher::UrlEncoded("_tag".into(), "SD_1".into()))
        .with_status(200)
        .with_body(bundle(
            3,
            &["1", "2"],
            Some(&format!("{PLACEHOLDER}/Patient?_getpages=abc&_getpagesoffset=2")),
        ))
        .expect(1)
        .create_async()
        .await;
    // The boundary item reappears on the second page
    let second = server
        .mock("GET", "/Patient")
        .match_query(Matcher::UrlEncoded("_getpages".into(), "abc".into()))
        .with_status(200)
        .with_body(bundle(3, &["2", "3"], None))
        .expect(1)
        .create_async()
        .await;

    let client = client(&server.url());
    let ids = scan_resource_ids(
        &client,
        "Patient",
        vec![("_tag".to_string(), "SD_1".to_string())],
    )
    .await
    .unwrap();

    assert_eq!(ids, vec!["1", "2", "3"]);
    first.assert_async().await;
    second.assert_async().await;
}

#[tokio::test]
async fn test_scan_count_mismatch_is_integrity_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/Specimen")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(bundle(5, &["1", "2", "3"], None))
        .create_async()
        .await;

    let client = client(&server.url());
    let err = scan_resource_ids(&client, "Specimen", Vec::new())
        .await
        .unwrap_err();

    match err {
        StrandError::Fhir(FhirError::PaginationIntegrity {
            expected, found, ..
        }) => {
            assert_eq!(expected, 5);
            assert_eq!(found, 3);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn test_scan_yields_resources_before_failing() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/Patient")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(bundle(2, &["1"], None))
        .create_async()
        .await;

    let client = client(&server.url());
    let results: Vec<_> = scan_resources(&client, "Patient", Vec::new()).collect().await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].as_ref().unwrap()["id"], "1");
    assert!(results[1].is_err());
}

#[tokio::test]
async fn test_scan_http_error_is_query_failure() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/Patient")
        .match_query(Matcher::Any)
        .with_status(400)
        .with_body(r#"{"resourceType":"OperationOutcome"}"#)
        .create_async()
        .await;

    let client = client(&server.url());
    let err = scan_resource_ids(&client, "Patient", Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StrandError::Fhir(FhirError::QueryFailed { status: 400, .. })
    ));
}

#[tokio::test]
async fn test_resolver_sends_key_as_filter() {
    let mut server = mockito::Server::new_async().await;
    let search = server
        .mock("GET", "/Condition")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("_tag".into(), "SD_1".into()),
            Matcher::UrlEncoded("identifier".into(), "DG_1".into()),
        ]))
        .with_status(200)
        .with_body(bundle(1, &["77"], None))
        .expect(1)
        .create_async()
        .await;

    let client = client(&server.url());
    let key = NaturalKey::from_components([
        ("_tag", Some("SD_1".to_string())),
        ("identifier", Some("DG_1".to_string())),
    ]);
    let ids = query_target_ids(&client, ResourceType::Disease, &key)
        .await
        .unwrap();

    assert_eq!(ids.len(), 1);
    assert_eq!(ids[0].as_str(), "77");
    search.assert_async().await;
}

#[tokio::test]
async fn test_resolver_empty_result() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/Patient")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(bundle(0, &[], None))
        .create_async()
        .await;

    let client = client(&server.url());
    let ids = query_target_ids(&client, ResourceType::Patient, &NaturalKey::identifier("PT_1"))
        .await
        .unwrap();
    assert!(ids.is_empty());
}
