//! CLI command implementations
//!
//! This module contains all CLI command implementations.

pub mod delete;
pub mod ingest;
pub mod init;
pub mod validate;
