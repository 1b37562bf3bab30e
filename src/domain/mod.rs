//! Domain models and types for Strand.
//!
//! This module contains the core domain types shared by every stage of an
//! ingest: typed source records, study snapshots, denormalized rows, output
//! resource types and natural keys.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`StudyId`], [`RemoteId`])
//! - **Source records** ([`records`]) parsed at the snapshot boundary
//! - **Merge output** ([`DenormalizedRow`], [`MergedStudy`])
//! - **Error types** ([`StrandError`], [`SourceError`], [`FhirError`], [`FileMetadataError`])
//! - **Result type alias** ([`Result`])
//!
//! # Type Safety
//!
//! Study ids are validated on construction:
//!
//! ```rust
//! use strand::domain::StudyId;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let study_id = StudyId::new("SD_BHJXBDQK")?;
//! assert!(StudyId::new("").is_err());
//! # Ok(())
//! # }
//! ```
//!
//! # Natural Keys
//!
//! ```rust
//! use strand::domain::NaturalKey;
//!
//! let key = NaturalKey::from_components([
//!     ("_tag", Some("SD_BHJXBDQK".to_string())),
//!     ("identifier", None),
//! ]);
//! assert_eq!(key.params().len(), 1);
//! ```

pub mod errors;
pub mod ids;
pub mod natural_key;
pub mod records;
pub mod resource;
pub mod result;
pub mod row;
pub mod snapshot;

// Re-export commonly used types for convenience
pub use errors::{FhirError, FileMetadataError, SourceError, StrandError};
pub use ids::{RemoteId, StudyId};
pub use natural_key::NaturalKey;
pub use resource::ResourceType;
pub use result::Result;
pub use row::{DenormalizedRow, MergedStudy};
pub use snapshot::{StudySnapshot, TableName};
