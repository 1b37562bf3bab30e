//! Dataservice (source of record) adapters
//!
//! - [`traits`] - the [`SnapshotSource`] abstraction
//! - [`postgres`] - dataservice database via deadpool-postgres
//! - [`directory`] - exported JSON tables on disk
//! - [`api`] - REST API enrichment of genomic files

pub mod api;
pub mod client;
pub mod directory;
pub mod factory;
pub mod postgres;
pub mod traits;

pub use api::DataserviceApi;
pub use directory::JsonDirectorySource;
pub use factory::create_snapshot_source;
pub use postgres::PostgresSource;
pub use traits::SnapshotSource;
