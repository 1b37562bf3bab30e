//! Logging and observability
//!
//! Structured logging built on `tracing`, with a console layer and an
//! optional JSON rolling file.
//!
//! # Example
//!
//! ```no_run
//! use strand::logging::init_logging;
//! use strand::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!(study_id = "SD_BHJXBDQK", "Extracting study");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log the start of an ingest run
///
/// # Example
///
/// ```no_run
/// use strand::log_ingest_start;
///
/// let studies = vec!["SD_BHJXBDQK".to_string()];
/// log_ingest_start!(studies.join(","), "etl");
/// ```
#[macro_export]
macro_rules! log_ingest_start {
    ($study_ids:expr, $stages:expr) => {
        tracing::info!(
            study_ids = %$study_ids,
            stages = %$stages,
            "Starting ingest"
        );
    };
}

/// Log the completion of an ingest run
///
/// # Example
///
/// ```no_run
/// use strand::log_ingest_complete;
/// use std::time::Duration;
///
/// log_ingest_complete!(2, 1800, Duration::from_secs(95));
/// ```
#[macro_export]
macro_rules! log_ingest_complete {
    ($studies:expr, $submitted:expr, $duration:expr) => {
        tracing::info!(
            studies = $studies,
            submitted = $submitted,
            duration_ms = $duration.as_millis() as u64,
            "Ingest completed"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use strand::log_error_with_context;
/// use strand::domain::StrandError;
///
/// let error = StrandError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = %$context,
            "Error occurred"
        );
    };
}

/// Log a retry attempt
///
/// # Example
///
/// ```no_run
/// use strand::log_retry_attempt;
///
/// log_retry_attempt!(2, 3, "status 503");
/// ```
#[macro_export]
macro_rules! log_retry_attempt {
    ($attempt:expr, $max_attempts:expr, $reason:expr) => {
        tracing::warn!(
            attempt = $attempt,
            max_attempts = $max_attempts,
            reason = %$reason,
            "Retrying request"
        );
    };
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    #[test]
    fn test_macros_expand_without_subscriber() {
        crate::log_ingest_start!("SD_1,SD_2", "etl");
        crate::log_ingest_complete!(2usize, 10usize, Duration::from_millis(5));
        crate::log_error_with_context!("boom", "while testing");
        crate::log_retry_attempt!(1usize, 3usize, "status 503");
    }
}
