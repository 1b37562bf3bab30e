//! Secure credential handling using the secrecy crate
//!
//! Database connection strings, FHIR passwords and session cookies are held as
//! [`SecretString`]: zeroed on drop, redacted in `Debug` output, and only
//! readable through `expose_secret()`.
//!
//! # Example
//!
//! ```rust
//! use strand::config::secret_string;
//! use secrecy::ExposeSecret;
//!
//! let cookie = secret_string("AWSELB=abc123".to_string());
//! assert_eq!(cookie.expose_secret().as_str(), "AWSELB=abc123");
//! assert!(!format!("{cookie:?}").contains("abc123"));
//! ```

use secrecy::{CloneableSecret, DebugSecret, Secret};
use serde::{Deserialize, Deserializer};
use zeroize::Zeroize;

/// String newtype satisfying the `Secret` trait bounds
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SecretValue(String);

impl CloneableSecret for SecretValue {}
impl DebugSecret for SecretValue {}

impl From<String> for SecretValue {
    fn from(s: String) -> Self {
        SecretValue(s)
    }
}

impl PartialEq<str> for SecretValue {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl AsRef<str> for SecretValue {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl SecretValue {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl<'de> Deserialize<'de> for SecretValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretValue)
    }
}

/// Secret string: zeroed on drop, redacted in `Debug`
pub type SecretString = Secret<SecretValue>;

/// Wraps a String as a [`SecretString`]
#[inline]
pub fn secret_string(value: String) -> SecretString {
    Secret::new(SecretValue::from(value))
}

/// Wraps an optional String, treating blank values as absent
///
/// ```rust
/// use strand::config::secret_string_opt;
///
/// assert!(secret_string_opt(Some("token".to_string())).is_some());
/// assert!(secret_string_opt(Some("  ".to_string())).is_none());
/// assert!(secret_string_opt(None).is_none());
/// ```
#[inline]
pub fn secret_string_opt(value: Option<String>) -> Option<SecretString> {
    value
        .filter(|s| !s.trim().is_empty())
        .map(|s| Secret::new(SecretValue::from(s)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_secret_string_creation() {
        let secret = secret_string("fhir-password".to_string());
        assert_eq!(secret.expose_secret().as_str(), "fhir-password");
    }

    #[test]
    fn test_blank_optional_secret_is_none() {
        assert!(secret_string_opt(Some(String::new())).is_none());
    }

    #[test]
    fn test_secret_debug_redacted() {
        let secret = secret_string("postgres://u:hunter2@db/ds".to_string());
        let debug_output = format!("{secret:?}");
        assert!(!debug_output.contains("hunter2"));
    }

    #[test]
    fn test_secret_deserializes_from_toml() {
        #[derive(Deserialize)]
        struct Section {
            cookie: SecretString,
        }

        let section: Section = toml::from_str(r#"cookie = "session=1""#).unwrap();
        assert_eq!(section.cookie.expose_secret().as_str(), "session=1");
    }
}
