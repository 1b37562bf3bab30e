//! Genomic file metadata
//!
//! - [`federated`] - client for the federated metadata service
//! - [`resolver`] - LOCAL/FEDERATED classification and canonical locators

pub mod federated;
pub mod resolver;

pub use federated::{FederatedMetadata, FederatedMetadataSource, HttpFederatedSource};
pub use resolver::{normalize_access, FileLocation, FileMetadataResolver, ResolvedFile};
