//! Submission protocol
//!
//! Update-if-exists-else-create: a payload carrying an `id` is PUT to
//! `<type>/<id>`; if the server reports that no resource with that id exists,
//! or the payload has no id, the `id` is removed and the payload is POSTed to
//! `<type>`. 200 and 201 are success; anything else is a
//! [`FhirError::Rejected`] carrying both bodies.

use super::client::FhirClient;
use super::models::{OperationOutcome, RawResponse};
use crate::domain::{FhirError, RemoteId, Result, StrandError};
use serde_json::Value;

/// Diagnostics fragment the server uses for an unknown resource id
pub const STALE_ID_DIAGNOSTIC: &str = "no resource with this ID exists";

/// How the server accepted a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Created,
    Updated,
}

/// Submits a payload and returns the id the server assigned or kept
pub async fn submit(
    client: &FhirClient,
    api_path: &str,
    mut body: Value,
) -> Result<(RemoteId, SubmitOutcome)> {
    let resource_id = body
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string);

    if let Some(id) = resource_id {
        let response = client.put(&client.resource_url(api_path, &id), &body).await?;
        if response.is_success() {
            return Ok((returned_id(api_path, &body, &response)?, SubmitOutcome::Updated));
        }

        let outcome = OperationOutcome::parse(&response.body);
        let stale = outcome
            .first_diagnostics()
            .is_some_and(|d| d.contains(STALE_ID_DIAGNOSTIC));
        if !stale {
            return Err(rejected(api_path, &body, &response));
        }

        tracing::debug!(api_path, id = %id, "Stale id, falling back to create");
    }

    if let Some(object) = body.as_object_mut() {
        object.remove("id");
    }

    let response = client.post(&client.endpoint_url(api_path), &body).await?;
    if response.is_success() {
        Ok((returned_id(api_path, &body, &response)?, SubmitOutcome::Created))
    } else {
        Err(rejected(api_path, &body, &response))
    }
}

fn returned_id(api_path: &str, request: &Value, response: &RawResponse) -> Result<RemoteId> {
    serde_json::from_str::<Value>(&response.body)
        .ok()
        .and_then(|v| v.get("id").and_then(Value::as_str).map(str::to_string))
        .and_then(|id| RemoteId::new(id).ok())
        .ok_or_else(|| {
            StrandError::from(FhirError::Rejected {
                api_path: api_path.to_string(),
                status: response.status,
                request: request.to_string(),
                response: format!("response has no resource id: {}", response.body),
            })
        })
}

fn rejected(api_path: &str, request: &Value, response: &RawResponse) -> StrandError {
    FhirError::Rejected {
        api_path: api_path.to_string(),
        status: response.status,
        request: request.to_string(),
        response: response.body.clone(),
    }
    .into()
}
