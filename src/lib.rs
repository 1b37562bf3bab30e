// Strand - Dataservice to FHIR ETL Tool
// Copyright (c) 2025 Strand Contributors
// Licensed under the MIT License

//! # Strand - Dataservice to FHIR ETL
//!
//! Strand reads research studies from the dataservice (the relational source
//! of record), joins each study into one denormalized table and loads it into
//! a FHIR server as an idempotent set of resources.
//!
//! ## Overview
//!
//! - **Extract** a study and all its descendant tables (all-or-nothing)
//! - **Transform** the snapshot into merged rows plus family relationships
//! - **Load** one resource type at a time in dependency order, resolving each
//!   record's natural key to an existing server id so re-runs update instead
//!   of duplicating
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Extract, transform, load and run orchestration
//! - [`adapters`] - External integrations (dataservice, FHIR server, DRS)
//! - [`domain`] - Records, resource types, identifiers and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use strand::config::load_config;
//! use strand::core::ingest::{IngestCoordinator, IngestOptions};
//! use strand::domain::StudyId;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("strand.toml")?;
//!     let (_tx, shutdown) = tokio::sync::watch::channel(false);
//!
//!     let coordinator = IngestCoordinator::new(config, shutdown)?;
//!     let summary = coordinator
//!         .execute(&[StudyId::new("SD_BHJXBDQK")?], &IngestOptions::default())
//!         .await?;
//!
//!     println!("Submitted {} resources", summary.total_submitted());
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Library code returns [`domain::StrandError`]. Per-record failures are
//! collected in the run summary; errors that make the whole run untrustworthy
//! (inconsistent pagination, unreadable source) abort it.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
