//! Core business logic for Strand.
//!
//! # Modules
//!
//! - [`extract`] - Study snapshot extraction from the source of record
//! - [`transform`] - Join/merge of snapshots into denormalized tables
//! - [`load`] - Entity builders, id cache and submission to the FHIR server
//! - [`ingest`] - Run orchestration across the three stages
//! - [`delete`] - Removal of a study's resources from the FHIR server
//!
//! # Ingest Workflow
//!
//! 1. **Extract**: Read each study and its descendant tables (all-or-nothing)
//! 2. **Transform**: Merge each snapshot and compute the resource types to run
//! 3. **Load**: Per resource type in dependency order, resolve natural keys,
//!    build payloads and submit them
//! 4. **Report**: Produce an ingest summary
//!
//! # Example
//!
//! ```rust,no_run
//! use strand::config::load_config;
//! use strand::core::ingest::{IngestCoordinator, IngestOptions};
//! use strand::domain::StudyId;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("strand.toml")?;
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!
//! let coordinator = IngestCoordinator::new(config, shutdown_rx)?;
//! let study_ids = vec![StudyId::new("SD_BHJXBDQK")?];
//! let summary = coordinator
//!     .execute(&study_ids, &IngestOptions::default())
//!     .await?;
//!
//! println!("Submitted: {}", summary.total_submitted());
//! println!("Failed: {}", summary.total_failed());
//! # Ok(())
//! # }
//! ```

pub mod delete;
pub mod extract;
pub mod ingest;
pub mod load;
pub mod transform;
