//! Source of record abstraction
//!
//! A snapshot source hands out the raw JSON rows of one study and its
//! descendant tables. Parsing into typed records happens in the extractor.

use crate::domain::{Result, StudyId, TableName};
use async_trait::async_trait;
use serde_json::Value;

/// Read-only access to the dataservice tables of a study
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Test the connection to the source
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be reached.
    async fn test_connection(&self) -> Result<()>;

    /// Fetch the `study` row, or `None` if the study does not exist
    async fn fetch_study(&self, study_id: &StudyId) -> Result<Option<Value>>;

    /// Fetch an `investigator` row by its id
    async fn fetch_investigator(
        &self,
        study_id: &StudyId,
        investigator_id: &str,
    ) -> Result<Option<Value>>;

    /// Fetch all rows of a descendant table that belong to the study
    ///
    /// `table` is never [`TableName::Study`] or [`TableName::Investigator`].
    async fn fetch_table(&self, study_id: &StudyId, table: TableName) -> Result<Vec<Value>>;
}
