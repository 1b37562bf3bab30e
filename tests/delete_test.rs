//! Integration tests for study-scoped deletion

use mockito::Matcher;
use serde_json::json;
use strand::adapters::fhir::FhirClient;
use strand::config::{FhirConfig, RetryConfig};
use strand::core::delete::{delete_study_resources, DeleteFailure};
use strand::domain::{FhirError, StrandError, StudyId};

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

fn study() -> StudyId {
    StudyId::new("SD_1").unwrap()
}

#[tokio::test]
async fn test_delete_walks_every_page_then_deletes_each_id() {
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
    let second = server
        .mock("GET", "/Patient")
        .match_query(Matcher::UrlEncoded("_getpages".into(), "abc".into()))
        .with_status(200)
        .with_body(bundle(3, &["3"], None))
        .expect(1)
        .create_async()
        .await;
    let mut deletes = Vec::new();
    for id in ["1", "2", "3"] {
        deletes.push(
            server
                .mock("DELETE", format!("/Patient/{id}").as_str())
                .with_status(200)
                .expect(1)
                .create_async()
                .await,
        );
    }

    let client = client(&server.url());
    let summary = delete_study_resources(&client, "Patient", &study(), &[], 2)
        .await
        .unwrap();

    assert_eq!(summary.endpoint, "Patient");
    assert_eq!(summary.matched, 3);
    assert_eq!(summary.deleted, 3);
    assert!(summary.is_success());
    first.assert_async().await;
    second.assert_async().await;
    for mock in deletes {
        mock.assert_async().await;
    }
}

#[tokio::test]
async fn test_delete_records_failures_and_continues() {
    let mut server = mockito::Server::new_async().await;
    let _search = server
        .mock("GET", "/Patient")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("_tag".into(), "SD_1".into()),
            Matcher::UrlEncoded("gender".into(), "female".into()),
        ]))
        .with_status(200)
        .with_body(bundle(3, &["1", "2", "3"], None))
        .create_async()
        .await;
    let ok = server
        .mock("DELETE", Matcher::Regex(r"^/Patient/[13]$".into()))
        .with_status(204)
        .expect(2)
        .create_async()
        .await;
    let conflict = server
        .mock("DELETE", "/Patient/2")
        .with_status(409)
        .with_body("referenced by Observation/9")
        .expect(1)
        .create_async()
        .await;

    let client = client(&server.url());
    let extra = vec![("gender".to_string(), "female".to_string())];
    let summary = delete_study_resources(&client, "Patient", &study(), &extra, 4)
        .await
        .unwrap();

    assert_eq!(summary.deleted, 2);
    assert_eq!(
        summary.failures,
        vec![DeleteFailure {
            id: "2".to_string(),
            message: "status 409: referenced by Observation/9".to_string(),
        }]
    );
    assert!(!summary.is_success());
    ok.assert_async().await;
    conflict.assert_async().await;
}

#[tokio::test]
async fn test_delete_sends_nothing_when_the_scan_is_incomplete() {
    let mut server = mockito::Server::new_async().await;
    let _search = server
        .mock("GET", "/Patient")
        .match_query(Matcher::UrlEncoded("_tag".into(), "SD_1".into()))
        .with_status(200)
        .with_body(bundle(5, &["1", "2"], None))
        .create_async()
        .await;
    let deletes = server
        .mock("DELETE", Matcher::Regex(r"^/Patient/".into()))
        .expect(0)
        .create_async()
        .await;

    let client = client(&server.url());
    let err = delete_study_resources(&client, "Patient", &study(), &[], 2)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        StrandError::Fhir(FhirError::PaginationIntegrity {
            expected: 5,
            found: 2,
            ..
        })
    ));
    deletes.assert_async().await;
}
