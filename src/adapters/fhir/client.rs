//! FHIR HTTP client
//!
//! Thin transport over reqwest: shared headers, basic auth and session
//! cookie, placeholder-host rewriting for pagination links, and retries with
//! exponential backoff for idempotent requests.

use super::models::RawResponse;
use crate::config::{FhirConfig, RetryConfig};
use crate::domain::{FhirError, Result, StrandError};
use crate::log_retry_attempt;
use base64::{engine::general_purpose, Engine as _};
use reqwest::{Client, ClientBuilder, RequestBuilder};
use secrecy::ExposeSecret;
use serde_json::Value;
use std::time::Duration;

/// Content type sent with every FHIR request
pub const FHIR_CONTENT_TYPE: &str = "application/fhir+json;charset=utf-8";

/// FHIR server client
///
/// # Example
///
/// ```no_run
/// use strand::adapters::fhir::FhirClient;
/// use strand::config::load_config;
///
/// # async fn example() -> strand::domain::Result<()> {
/// let config = load_config("strand.toml")?;
/// let client = FhirClient::new(config.fhir)?;
/// let response = client.get(&client.endpoint_url("Patient"), &[]).await?;
/// println!("status {}", response.status);
/// # Ok(())
/// # }
/// ```
pub struct FhirClient {
    base_url: String,
    client: Client,
    config: FhirConfig,
}

impl FhirClient {
    /// Creates a client from configuration
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built.
    pub fn new(config: FhirConfig) -> Result<Self> {
        let mut client_builder = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(30));

        if !config.tls_verify {
            client_builder = client_builder.danger_accept_invalid_certs(true);
        }

        let client = client_builder.build().map_err(|e| {
            StrandError::Configuration(format!("Failed to build FHIR HTTP client: {e}"))
        })?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            config,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of a resource collection, e.g. `<base>/Patient`
    pub fn endpoint_url(&self, api_path: &str) -> String {
        format!("{}/{}", self.base_url, api_path.trim_matches('/'))
    }

    /// URL of a single resource, e.g. `<base>/Patient/123`
    pub fn resource_url(&self, api_path: &str, id: &str) -> String {
        format!("{}/{}", self.endpoint_url(api_path), id.trim_matches('/'))
    }

    /// Rewrites the server's placeholder host in a pagination link
    pub fn resolve_link(&self, link: &str) -> String {
        let placeholder = self.config.placeholder_host.trim_end_matches('/');
        match link.strip_prefix(placeholder) {
            Some(rest) => format!("{}{}", self.base_url, rest),
            None => link.to_string(),
        }
    }

    fn auth_header_value(&self) -> Option<String> {
        match (&self.config.username, &self.config.password) {
            (Some(username), Some(password)) => {
                let credentials = format!("{username}:{}", password.expose_secret().as_str());
                let encoded = general_purpose::STANDARD.encode(credentials.as_bytes());
                Some(format!("Basic {encoded}"))
            }
            _ => None,
        }
    }

    fn with_headers(&self, request: RequestBuilder) -> RequestBuilder {
        let mut request = request.header("Content-Type", FHIR_CONTENT_TYPE);
        if let Some(auth) = self.auth_header_value() {
            request = request.header("Authorization", auth);
        }
        if let Some(cookie) = &self.config.cookie {
            request = request.header("Cookie", cookie.expose_secret().as_str());
        }
        request
    }

    /// `GET url?query`, retried on transport errors, 5xx and 429
    pub async fn get(&self, url: &str, query: &[(String, String)]) -> Result<RawResponse> {
        send_with_retry(&self.config.retry, true, || {
            self.with_headers(self.client.get(url).query(query))
        })
        .await
    }

    /// `PUT url` with a JSON body, retried on transport errors, 5xx and 429
    pub async fn put(&self, url: &str, body: &Value) -> Result<RawResponse> {
        send_with_retry(&self.config.retry, true, || {
            self.with_headers(self.client.put(url).json(body))
        })
        .await
    }

    /// `DELETE url`, retried on transport errors, 5xx and 429
    pub async fn delete(&self, url: &str) -> Result<RawResponse> {
        send_with_retry(&self.config.retry, true, || {
            self.with_headers(self.client.delete(url))
        })
        .await
    }

    /// `POST url` with a JSON body; never retried
    pub async fn post(&self, url: &str, body: &Value) -> Result<RawResponse> {
        send_with_retry(&self.config.retry, false, || {
            self.with_headers(self.client.post(url).json(body))
        })
        .await
    }
}

/// Delay before retry number `attempt` (1-based)
pub(crate) fn backoff_delay(retry: &RetryConfig, attempt: usize) -> Duration {
    let exponent = attempt.saturating_sub(1) as i32;
    let delay_ms = retry.initial_delay_ms as f64 * retry.backoff_multiplier.powi(exponent);
    Duration::from_millis((delay_ms as u64).min(retry.max_delay_ms))
}

fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

/// Sends a request, retrying with exponential backoff when allowed
///
/// Transport failures map to [`FhirError::ConnectionFailed`] or
/// [`FhirError::Timeout`]. Any HTTP response is returned as-is once retries
/// are exhausted; callers decide what a status means.
pub(crate) async fn send_with_retry<F>(
    retry: &RetryConfig,
    retryable: bool,
    build: F,
) -> Result<RawResponse>
where
    F: Fn() -> RequestBuilder,
{
    let max_retries = if retryable { retry.max_retries } else { 0 };
    let mut attempt = 0;

    loop {
        let outcome = match build().send().await {
            Ok(resp) => {
                let status = resp.status().as_u16();
                match resp.text().await {
                    Ok(body) => Ok(RawResponse { status, body }),
                    Err(e) => Err(FhirError::ConnectionFailed(format!(
                        "Failed to read {status} response body: {e}"
                    ))),
                }
            }
            Err(e) if e.is_timeout() => Err(FhirError::Timeout(e.to_string())),
            Err(e) => Err(FhirError::ConnectionFailed(e.to_string())),
        };

        let reason = match &outcome {
            Ok(response) if is_retryable_status(response.status) => {
                format!("status {}", response.status)
            }
            Ok(_) => return outcome.map_err(StrandError::from),
            Err(e) => e.to_string(),
        };

        if attempt >= max_retries {
            return outcome.map_err(StrandError::from);
        }

        attempt += 1;
        let delay = backoff_delay(retry, attempt);
        log_retry_attempt!(attempt, max_retries, reason);
        tokio::time::sleep(delay).await;
    }
}
