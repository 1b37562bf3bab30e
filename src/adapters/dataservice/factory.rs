//! Snapshot source factory

use super::directory::JsonDirectorySource;
use super::postgres::PostgresSource;
use super::traits::SnapshotSource;
use crate::config::DataserviceConfig;
use crate::domain::Result;
use std::sync::Arc;

/// Create the snapshot source selected by the configuration
///
/// A configured `snapshot_dir` selects the JSON directory source; otherwise
/// the dataservice database is used.
///
/// # Errors
///
/// Returns an error if the PostgreSQL pool cannot be created.
pub fn create_snapshot_source(config: &DataserviceConfig) -> Result<Arc<dyn SnapshotSource>> {
    match &config.snapshot_dir {
        Some(dir) => {
            tracing::info!(snapshot_dir = %dir, "Creating JSON directory snapshot source");
            Ok(Arc::new(JsonDirectorySource::new(dir)))
        }
        None => {
            tracing::info!("Creating PostgreSQL snapshot source");
            Ok(Arc::new(PostgresSource::new(config.clone())?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::secret_string;

    #[test]
    fn test_snapshot_dir_selects_directory_source() {
        let config = DataserviceConfig {
            connection_string: secret_string(String::new()),
            max_connections: 1,
            connection_timeout_seconds: 5,
            statement_timeout_seconds: 5,
            ssl_mode: "disable".to_string(),
            api_url: None,
            snapshot_dir: Some("./fixtures".to_string()),
        };
        let source = create_snapshot_source(&config).unwrap();
        assert_eq!(source.name(), "json-directory");
    }
}
