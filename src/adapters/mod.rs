//! External system integrations for Strand.
//!
//! - [`dataservice`] - source of record (PostgreSQL or JSON directory) and REST API
//! - [`fhir`] - FHIR server: search, natural-key resolution, submission
//! - [`drs`] - genomic file metadata and canonical locators
//!
//! Adapters isolate third-party clients behind Strand's own types and error
//! enums; the core only sees traits and domain records.

pub mod dataservice;
pub mod drs;
pub mod fhir;
