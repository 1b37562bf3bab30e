//! FHIR server adapter
//!
//! - [`client`] - HTTP transport with auth, cookie and retries
//! - [`scanner`] - paginated search with an exact-count guarantee
//! - [`resolver`] - natural key to remote id lookup
//! - [`submit`] - update-if-exists-else-create

pub mod client;
pub mod models;
pub mod resolver;
pub mod scanner;
pub mod submit;

pub use client::FhirClient;
pub use resolver::query_target_ids;
pub use scanner::{scan_resource_ids, scan_resources};
pub use submit::{submit, SubmitOutcome};
