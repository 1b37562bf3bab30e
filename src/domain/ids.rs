//! Domain identifier types with validation
//!
//! Newtype wrappers for the two identifier spaces Strand deals with: source
//! system ids of studies in the dataservice, and ids assigned by the FHIR
//! server.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Study identifier newtype wrapper
///
/// Represents the source-system id of a study (e.g. `SD_BHJXBDQK`).
///
/// # Examples
///
/// ```
/// use strand::domain::ids::StudyId;
/// use std::str::FromStr;
///
/// let study_id = StudyId::from_str("SD_BHJXBDQK").unwrap();
/// assert_eq!(study_id.as_str(), "SD_BHJXBDQK");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StudyId(String);

impl StudyId {
    /// Creates a new StudyId from a string
    ///
    /// # Arguments
    ///
    /// * `id` - The study identifier string
    ///
    /// # Returns
    ///
    /// Returns `Ok(StudyId)` if the ID is valid, `Err` otherwise
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err("Study ID cannot be empty".to_string());
        }

        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(format!(
                "Invalid study ID '{trimmed}'. Only letters, digits, '_' and '-' are allowed"
            ));
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Returns the study ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for StudyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StudyId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for StudyId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Id assigned to a resource by the FHIR server
///
/// Never assumed durable across runs; it is re-resolved every run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteId(String);

impl RemoteId {
    /// Creates a new RemoteId from a string
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Remote resource ID cannot be empty".to_string());
        }
        Ok(Self(id))
    }

    /// Returns the remote ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RemoteId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for RemoteId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_study_id_valid() {
        let id = StudyId::new("SD_BHJXBDQK").unwrap();
        assert_eq!(id.as_str(), "SD_BHJXBDQK");
        assert_eq!(id.to_string(), "SD_BHJXBDQK");
    }

    #[test]
    fn test_study_id_trims_whitespace() {
        let id = StudyId::new("  SD_M3DBXD12 ").unwrap();
        assert_eq!(id.as_str(), "SD_M3DBXD12");
    }

    #[test]
    fn test_study_id_rejects_empty() {
        assert!(StudyId::new("").is_err());
        assert!(StudyId::new("   ").is_err());
    }

    #[test]
    fn test_study_id_rejects_quotes() {
        assert!(StudyId::new("SD_1' OR '1'='1").is_err());
    }

    #[test]
    fn test_remote_id() {
        let id = RemoteId::from_str("12345").unwrap();
        assert_eq!(id.as_ref(), "12345");
        assert!(RemoteId::new("").is_err());
    }
}
