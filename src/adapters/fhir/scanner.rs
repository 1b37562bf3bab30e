//! Paginated resource scanner
//!
//! Walks a search result set page by page, following the server's `next`
//! links, and yields each distinct resource once. When the walk ends, the
//! number of distinct resource ids must equal the `total` the server declared
//! on the first page; otherwise the stream ends with
//! [`FhirError::PaginationIntegrity`].
//!
//! Every call starts again from page one. Nothing is cached.

use super::client::FhirClient;
use super::models::Bundle;
use crate::domain::{FhirError, Result, StrandError};
use async_stream::stream;
use futures::stream::Stream;
use serde_json::Value;
use std::collections::HashSet;

/// Lazily scans `<base>/<endpoint>?<filter>` and yields matching resources
///
/// The filter is sent with the first request only; `next` links are
/// followed verbatim after the placeholder host is rewritten.
///
/// # Example
///
/// ```no_run
/// use futures::StreamExt;
/// use strand::adapters::fhir::{scan_resources, FhirClient};
///
/// # async fn example(client: &FhirClient) -> strand::domain::Result<()> {
/// let filter = vec![("_tag".to_string(), "SD_BHJXBDQK".to_string())];
/// let mut resources = Box::pin(scan_resources(client, "Patient", filter));
/// while let Some(resource) = resources.next().await {
///     println!("{}", resource?["id"]);
/// }
/// # Ok(())
/// # }
/// ```
pub fn scan_resources<'a>(
    client: &'a FhirClient,
    endpoint: &'a str,
    filter: Vec<(String, String)>,
) -> impl Stream<Item = Result<Value>> + 'a {
    stream! {
        let mut url = client.endpoint_url(endpoint);
        let mut query = filter;
        let mut expected: Option<usize> = None;
        let mut found: HashSet<String> = HashSet::new();
        let mut pages = 0usize;

        loop {
            let response = match client.get(&url, &query).await {
                Ok(response) => response,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            pages += 1;

            if response.status != 200 {
                yield Err(StrandError::from(FhirError::QueryFailed {
                    endpoint: endpoint.to_string(),
                    status: response.status,
                    body: response.body,
                }));
                return;
            }

            let bundle: Bundle = match serde_json::from_str(&response.body) {
                Ok(bundle) => bundle,
                Err(e) => {
                    yield Err(StrandError::from(FhirError::InvalidResponse(format!(
                        "{endpoint} search page {pages} is not a Bundle: {e}"
                    ))));
                    return;
                }
            };

            if expected.is_none() {
                match bundle.total {
                    Some(total) => expected = Some(total),
                    None => {
                        yield Err(StrandError::from(FhirError::InvalidResponse(format!(
                            "{endpoint} search bundle has no total"
                        ))));
                        return;
                    }
                }
            }

            let next = bundle.next_link().map(|link| client.resolve_link(link));

            for entry in bundle.entry {
                let Some(resource) = entry.resource else {
                    continue;
                };
                let id = match resource.get("id").and_then(Value::as_str) {
                    Some(id) => id.to_string(),
                    None => {
                        yield Err(StrandError::from(FhirError::InvalidResponse(format!(
                            "{endpoint} search returned a resource without an id"
                        ))));
                        return;
                    }
                };
                if found.insert(id) {
                    yield Ok(resource);
                }
            }

            match next {
                Some(link) => {
                    url = link;
                    query = Vec::new();
                }
                None => break,
            }
        }

        let expected = expected.unwrap_or_default();
        tracing::debug!(
            endpoint,
            pages,
            expected,
            found = found.len(),
            "Scan complete"
        );

        if found.len() != expected {
            yield Err(StrandError::from(FhirError::PaginationIntegrity {
                endpoint: endpoint.to_string(),
                expected,
                found: found.len(),
            }));
        }
    }
}

/// Collects the ids of every resource the scan yields
pub async fn scan_resource_ids(
    client: &FhirClient,
    endpoint: &str,
    filter: Vec<(String, String)>,
) -> Result<Vec<String>> {
    use futures::StreamExt;

    let mut ids = Vec::new();
    let resources = scan_resources(client, endpoint, filter);
    futures::pin_mut!(resources);
    while let Some(resource) = resources.next().await {
        let resource = resource?;
        if let Some(id) = resource.get("id").and_then(Value::as_str) {
            ids.push(id.to_string());
        }
    }
    Ok(ids)
}
