//! Natural keys
//!
//! A natural key is the ordered set of search parameters that identifies a
//! resource on the FHIR server independently of its server-assigned id.

use serde::Serialize;
use std::fmt;

/// Ordered list of `(search parameter, value)` pairs
///
/// Components whose value is absent are dropped on construction, so a key
/// only ever carries parameters that can be sent as a filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct NaturalKey(Vec<(String, String)>);

impl NaturalKey {
    /// Builds a key from optional components, dropping absent values
    pub fn from_components<I, K>(components: I) -> Self
    where
        I: IntoIterator<Item = (K, Option<String>)>,
        K: Into<String>,
    {
        Self(
            components
                .into_iter()
                .filter_map(|(param, value)| value.map(|v| (param.into(), v)))
                .collect(),
        )
    }

    /// Key with a single `identifier` component
    pub fn identifier(value: impl Into<String>) -> Self {
        Self(vec![("identifier".to_string(), value.into())])
    }

    /// Search parameters as query pairs
    pub fn params(&self) -> &[(String, String)] {
        &self.0
    }

    /// Value of the given parameter, if present
    pub fn get(&self, param: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(p, _)| p == param)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.0.iter().map(|(p, v)| format!("{p}={v}")).collect();
        write!(f, "{{{}}}", rendered.join(", "))
    }
}
