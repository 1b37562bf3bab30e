//! Domain error types
//!
//! This module defines the error hierarchy for Strand. All errors are
//! domain-specific and don't expose third-party types.

use thiserror::Error;

/// Main Strand error type
///
/// This is the primary error type used throughout the application.
/// It wraps specific error types and provides context for error handling.
#[derive(Debug, Error)]
pub enum StrandError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Source of record errors
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// FHIR server errors
    #[error("FHIR error: {0}")]
    Fhir(#[from] FhirError),

    /// File metadata resolution errors
    #[error("File metadata error: {0}")]
    FileMetadata(#[from] FileMetadataError),

    /// A record lacks a value a builder treats as mandatory
    #[error("{resource_type} is missing required field '{field}'")]
    MissingField {
        resource_type: String,
        field: String,
    },

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Network/connection errors
    #[error("Connection error: {0}")]
    Connection(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl StrandError {
    /// Creates a missing-field error for a resource type
    pub fn missing_field(resource_type: impl Into<String>, field: impl Into<String>) -> Self {
        StrandError::MissingField {
            resource_type: resource_type.into(),
            field: field.into(),
        }
    }

    /// Returns true if the error must halt the whole run
    ///
    /// Source inconsistencies and pagination integrity violations are fatal.
    /// Everything else is isolated to the record that produced it.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StrandError::Source(SourceError::StudyNotFound(_))
                | StrandError::Source(SourceError::StudyCountMismatch { .. })
                | StrandError::Fhir(FhirError::PaginationIntegrity { .. })
        )
    }
}

/// Source of record errors
///
/// Errors raised while pulling a study snapshot out of the dataservice.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Failed to connect to the source database
    #[error("Failed to connect to source: {0}")]
    ConnectionFailed(String),

    /// Query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Requested study does not exist
    #[error("{0} not found")]
    StudyNotFound(String),

    /// Number of resolved studies differs from the number requested
    #[error("Found {found} study(ies) but expected {expected}")]
    StudyCountMismatch { expected: usize, found: usize },

    /// A source row could not be parsed into its typed record
    #[error("Invalid row in table '{table}': {message}")]
    InvalidRow { table: String, message: String },
}

/// FHIR server errors
///
/// Errors that occur when interacting with the FHIR server.
/// These errors don't expose third-party HTTP client types.
#[derive(Debug, Error)]
pub enum FhirError {
    /// Failed to connect to the FHIR server
    #[error("Failed to connect to FHIR server: {0}")]
    ConnectionFailed(String),

    /// Invalid response from server
    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),

    /// Search request failed
    #[error("Search on {endpoint} failed with status {status}: {body}")]
    QueryFailed {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// Scanned item count differs from the server-declared total
    #[error("Found {found} resources but expected {expected} at {endpoint}")]
    PaginationIntegrity {
        endpoint: String,
        expected: usize,
        found: usize,
    },

    /// More than one remote resource matches a natural key
    #[error("{resource_type} natural key {key} matched {} resources: {}", .ids.len(), .ids.join(", "))]
    AmbiguousMatch {
        resource_type: String,
        key: String,
        ids: Vec<String>,
    },

    /// The server refused a create or update
    #[error("Sent to /{api_path} (status {status}):\n{request}\nGot:\n{response}")]
    Rejected {
        api_path: String,
        status: u16,
        request: String,
        response: String,
    },

    /// Timeout
    #[error("Request timeout: {0}")]
    Timeout(String),
}

/// File metadata resolution errors
#[derive(Debug, Error)]
pub enum FileMetadataError {
    /// The federated metadata service could not be reached
    #[error("Failed to fetch metadata for object {object_id}: {message}")]
    FetchFailed { object_id: String, message: String },

    /// The federated metadata service returned an unusable body
    #[error("Invalid metadata for object {object_id}: {message}")]
    InvalidResponse { object_id: String, message: String },

    /// A declared locator could not be parsed
    #[error("Invalid file locator '{0}'")]
    InvalidLocator(String),
}

// Conversion from std::io::Error
impl From<std::io::Error> for StrandError {
    fn from(err: std::io::Error) -> Self {
        StrandError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for StrandError {
    fn from(err: serde_json::Error) -> Self {
        StrandError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for StrandError {
    fn from(err: toml::de::Error) -> Self {
        StrandError::Configuration(format!("TOML parse error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strand_error_display() {
        let err = StrandError::Configuration("Invalid config".to_string());
        assert_eq!(err.to_string(), "Configuration error: Invalid config");
    }

    #[test]
    fn test_source_error_conversion() {
        let source_err = SourceError::StudyNotFound("SD_00000000".to_string());
        let err: StrandError = source_err.into();
        assert!(matches!(err, StrandError::Source(_)));
        assert_eq!(err.to_string(), "Source error: SD_00000000 not found");
    }

    #[test]
    fn test_count_mismatch_message() {
        let err = SourceError::StudyCountMismatch {
            expected: 2,
            found: 1,
        };
        assert_eq!(err.to_string(), "Found 1 study(ies) but expected 2");
    }

    #[test]
    fn test_fatal_classification() {
        assert!(StrandError::from(SourceError::StudyNotFound("SD_1".into())).is_fatal());
        assert!(StrandError::from(FhirError::PaginationIntegrity {
            endpoint: "Patient".into(),
            expected: 3,
            found: 2,
        })
        .is_fatal());
        assert!(!StrandError::missing_field("Patient", "participant").is_fatal());
        assert!(!StrandError::from(FhirError::Rejected {
            api_path: "Patient".into(),
            status: 422,
            request: "{}".into(),
            response: "{}".into(),
        })
        .is_fatal());
    }

    #[test]
    fn test_ambiguous_match_lists_ids() {
        let err = FhirError::AmbiguousMatch {
            resource_type: "Patient".into(),
            key: "identifier=PT_1".into(),
            ids: vec!["1".into(), "2".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("matched 2 resources"));
        assert!(msg.contains("1, 2"));
    }

    #[test]
    fn test_rejected_carries_bodies() {
        let err = FhirError::Rejected {
            api_path: "Specimen".into(),
            status: 400,
            request: r#"{"resourceType":"Specimen"}"#.into(),
            response: r#"{"issue":[]}"#.into(),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Sent to /Specimen"));
        assert!(msg.contains(r#"{"resourceType":"Specimen"}"#));
        assert!(msg.contains(r#"{"issue":[]}"#));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: StrandError = io_err.into();
        assert!(matches!(err, StrandError::Io(_)));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: StrandError = json_err.into();
        assert!(matches!(err, StrandError::Serialization(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let err: StrandError = toml_err.into();
        assert!(matches!(err, StrandError::Configuration(_)));
        assert!(err.to_string().contains("TOML parse error"));
    }
}
