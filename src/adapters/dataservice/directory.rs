//! JSON directory snapshot source
//!
//! Offline source laid out as `<root>/<study_id>/<table>.json`, each file
//! holding a JSON array of row objects (the study file may hold a single
//! object). A missing table file is an empty table; a missing study
//! directory is a study that does not exist.

use super::traits::SnapshotSource;
use crate::domain::{Result, SourceError, StudyId, TableName};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// [`SnapshotSource`] reading exported tables from disk
pub struct JsonDirectorySource {
    root: PathBuf,
}

impl JsonDirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn table_path(&self, study_id: &StudyId, table: TableName) -> PathBuf {
        self.root
            .join(study_id.as_str())
            .join(format!("{}.json", table.as_str()))
    }

    async fn read_rows(&self, path: &Path, table: TableName) -> Result<Vec<Value>> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(SourceError::QueryFailed(format!(
                    "Failed to read {}: {e}",
                    path.display()
                ))
                .into())
            }
        };

        let value: Value = serde_json::from_str(&content).map_err(|e| SourceError::InvalidRow {
            table: table.to_string(),
            message: format!("{} is not valid JSON: {e}", path.display()),
        })?;

        match value {
            Value::Array(rows) => Ok(rows),
            Value::Object(_) => Ok(vec![value]),
            _ => Err(SourceError::InvalidRow {
                table: table.to_string(),
                message: format!("{} must hold an array of objects", path.display()),
            }
            .into()),
        }
    }
}

#[async_trait]
impl SnapshotSource for JsonDirectorySource {
    fn name(&self) -> &str {
        "json-directory"
    }

    async fn test_connection(&self) -> Result<()> {
        if tokio::fs::metadata(&self.root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            Ok(())
        } else {
            Err(SourceError::ConnectionFailed(format!(
                "Snapshot directory {} does not exist",
                self.root.display()
            ))
            .into())
        }
    }

    async fn fetch_study(&self, study_id: &StudyId) -> Result<Option<Value>> {
        let path = self.table_path(study_id, TableName::Study);
        let rows = self.read_rows(&path, TableName::Study).await?;
        Ok(rows
            .into_iter()
            .find(|row| row.get("kf_id").and_then(Value::as_str) == Some(study_id.as_str())))
    }

    async fn fetch_investigator(
        &self,
        study_id: &StudyId,
        investigator_id: &str,
    ) -> Result<Option<Value>> {
        let path = self.table_path(study_id, TableName::Investigator);
        let rows = self.read_rows(&path, TableName::Investigator).await?;
        Ok(rows
            .into_iter()
            .find(|row| row.get("kf_id").and_then(Value::as_str) == Some(investigator_id)))
    }

    async fn fetch_table(&self, study_id: &StudyId, table: TableName) -> Result<Vec<Value>> {
        let path = self.table_path(study_id, table);
        self.read_rows(&path, table).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(dir: &Path, study: &str, table: &str, value: Value) {
        let study_dir = dir.join(study);
        std::fs::create_dir_all(&study_dir).unwrap();
        std::fs::write(study_dir.join(format!("{table}.json")), value.to_string()).unwrap();
    }

    #[tokio::test]
    async fn test_fetch_study_from_object_file() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "SD_1",
            "study",
            json!({"kf_id": "SD_1", "visible": true}),
        );
        let source = JsonDirectorySource::new(dir.path());

        let study = source
            .fetch_study(&StudyId::new("SD_1").unwrap())
            .await
            .unwrap();
        assert!(study.is_some());

        let missing = source
            .fetch_study(&StudyId::new("SD_2").unwrap())
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_missing_table_is_empty() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "SD_1", "participant", json!([{"kf_id": "PT_1"}]));
        let source = JsonDirectorySource::new(dir.path());
        let study_id = StudyId::new("SD_1").unwrap();

        let participants = source
            .fetch_table(&study_id, TableName::Participant)
            .await
            .unwrap();
        assert_eq!(participants.len(), 1);

        let outcomes = source
            .fetch_table(&study_id, TableName::Outcome)
            .await
            .unwrap();
        assert!(outcomes.is_empty());
    }

    #[tokio::test]
    async fn test_scalar_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "SD_1", "family", json!(42));
        let source = JsonDirectorySource::new(dir.path());

        let err = source
            .fetch_table(&StudyId::new("SD_1").unwrap(), TableName::Family)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("'family'"));
    }

    #[tokio::test]
    async fn test_connection_requires_directory() {
        let source = JsonDirectorySource::new("/nonexistent/strand/snapshots");
        assert!(source.test_connection().await.is_err());
    }
}
