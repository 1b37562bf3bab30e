//! FHIR wire models
//!
//! Only the parts of the FHIR JSON the scanner and submission protocol read
//! are modelled; resources themselves stay as `serde_json::Value`.

use serde::Deserialize;
use serde_json::Value;

/// Search result bundle
#[derive(Debug, Clone, Deserialize)]
pub struct Bundle {
    /// Server-declared number of matches across all pages
    #[serde(default)]
    pub total: Option<usize>,

    #[serde(default)]
    pub link: Vec<BundleLink>,

    #[serde(default)]
    pub entry: Vec<BundleEntry>,
}

impl Bundle {
    /// URL of the next page, if any
    pub fn next_link(&self) -> Option<&str> {
        self.link
            .iter()
            .find(|l| l.relation == "next")
            .map(|l| l.url.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BundleLink {
    pub relation: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BundleEntry {
    #[serde(default)]
    pub resource: Option<Value>,
}

/// Error body returned by the server
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OperationOutcome {
    #[serde(default)]
    pub issue: Vec<OperationIssue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OperationIssue {
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub diagnostics: Option<String>,
}

impl OperationOutcome {
    /// Parses an OperationOutcome, tolerating non-JSON bodies
    pub fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }

    /// Diagnostics text of the first issue
    pub fn first_diagnostics(&self) -> Option<&str> {
        self.issue.first().and_then(|i| i.diagnostics.as_deref())
    }
}

/// Raw HTTP response: status and body text
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    /// 200 and 201 are the only success codes the server uses
    pub fn is_success(&self) -> bool {
        self.status == 200 || self.status == 201
    }
}
