//! Configuration management for Strand.
//!
//! This module provides TOML-based configuration loading, parsing, and
//! validation.
//!
//! # Overview
//!
//! Strand uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `STRAND_<SECTION>_<KEY>` environment overrides
//! - Default values for optional settings
//! - Validation of every section on load
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use strand::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("strand.toml")?;
//!
//! println!("FHIR server: {}", config.fhir.base_url);
//! println!("Concurrency: {}", config.load.max_concurrency);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level and dry run
//! - [`DataserviceConfig`] - Source of record connection
//! - [`FhirConfig`] - FHIR server connection, authentication and retries
//! - [`FilesConfig`] - DRS hosts and the federated metadata service
//! - [`LoadConfig`] - Concurrency, builders, stages and dump directory
//! - [`LoggingConfig`] - Logging configuration
//!
//! # Example Configuration
//!
//! ```toml
//! environment = "production"
//!
//! [dataservice]
//! connection_string = "${STRAND_DATASERVICE_URL}"
//!
//! [fhir]
//! base_url = "https://kf-api-fhir-service.kidsfirstdrc.org"
//! username = "etl"
//! password = "${STRAND_FHIR_PASSWORD}"
//!
//! [load]
//! max_concurrency = 8
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::load_config;
pub use schema::{
    ApplicationConfig, DataserviceConfig, Environment, FhirConfig, FilesConfig, LoadConfig,
    LoggingConfig, RetryConfig, StrandConfig,
};
pub use secret::{secret_string, secret_string_opt, SecretString, SecretValue};
