//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::StrandConfig;
use super::secret::{secret_string, secret_string_opt};
use crate::domain::errors::StrandError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into StrandConfig
/// 4. Applies environment variable overrides (STRAND_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns [`StrandError::Configuration`] if the file is missing or
/// unreadable, a referenced variable is unset, parsing fails, or validation
/// fails.
///
/// # Examples
///
/// ```no_run
/// use strand::config::loader::load_config;
///
/// let config = load_config("strand.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<StrandConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(StrandError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        StrandError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    let contents = substitute_env_vars(&contents)?;

    let mut config: StrandConfig = toml::from_str(&contents)
        .map_err(|e| StrandError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        StrandError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are copied untouched. Every unset variable is collected so
/// the error lists all of them at once.
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| StrandError::Configuration(format!("Invalid substitution pattern: {e}")))?;
    let mut lines = Vec::new();
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            lines.push(line.to_string());
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    processed_line = processed_line.replace(&format!("${{{var_name}}}"), &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        lines.push(processed_line);
    }

    if !missing_vars.is_empty() {
        return Err(StrandError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(lines.join("\n"))
}

fn parse_override<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        StrandError::Configuration(format!("Invalid value '{value}' for environment variable {name}"))
    })
}

/// Applies environment variable overrides using the STRAND_* prefix
///
/// Variables follow the pattern `STRAND_<SECTION>_<KEY>`, for example
/// `STRAND_FHIR_BASE_URL` or `STRAND_LOAD_MAX_CONCURRENCY`.
fn apply_env_overrides(config: &mut StrandConfig) -> Result<()> {
    let var = |name: &str| std::env::var(name).ok();

    // Application overrides
    if let Some(val) = var("STRAND_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Some(val) = var("STRAND_APPLICATION_DRY_RUN") {
        config.application.dry_run = parse_override("STRAND_APPLICATION_DRY_RUN", &val)?;
    }

    // Dataservice overrides
    if let Some(val) = var("STRAND_DATASERVICE_CONNECTION_STRING") {
        config.dataservice.connection_string = secret_string(val);
    }
    if let Some(val) = var("STRAND_DATASERVICE_MAX_CONNECTIONS") {
        config.dataservice.max_connections =
            parse_override("STRAND_DATASERVICE_MAX_CONNECTIONS", &val)?;
    }
    if let Some(val) = var("STRAND_DATASERVICE_SSL_MODE") {
        config.dataservice.ssl_mode = val;
    }
    if let Some(val) = var("STRAND_DATASERVICE_API_URL") {
        config.dataservice.api_url = Some(val).filter(|v| !v.trim().is_empty());
    }
    if let Some(val) = var("STRAND_DATASERVICE_SNAPSHOT_DIR") {
        config.dataservice.snapshot_dir = Some(val).filter(|v| !v.trim().is_empty());
    }

    // FHIR overrides
    if let Some(val) = var("STRAND_FHIR_BASE_URL") {
        config.fhir.base_url = val;
    }
    if let Some(val) = var("STRAND_FHIR_USERNAME") {
        config.fhir.username = Some(val);
    }
    if let Some(val) = var("STRAND_FHIR_PASSWORD") {
        config.fhir.password = secret_string_opt(Some(val));
    }
    if let Some(val) = var("STRAND_FHIR_COOKIE") {
        config.fhir.cookie = secret_string_opt(Some(val));
    }
    if let Some(val) = var("STRAND_FHIR_PLACEHOLDER_HOST") {
        config.fhir.placeholder_host = val;
    }
    if let Some(val) = var("STRAND_FHIR_TIMEOUT_SECONDS") {
        config.fhir.timeout_seconds = parse_override("STRAND_FHIR_TIMEOUT_SECONDS", &val)?;
    }
    if let Some(val) = var("STRAND_FHIR_TLS_VERIFY") {
        config.fhir.tls_verify = parse_override("STRAND_FHIR_TLS_VERIFY", &val)?;
    }

    // File metadata overrides
    if let Some(val) = var("STRAND_FILES_DEFAULT_DRS_HOST") {
        config.files.default_drs_host = val;
    }
    if let Some(val) = var("STRAND_FILES_FEDERATED_BASE_URL") {
        config.files.federated_base_url = val;
    }
    if let Some(val) = var("STRAND_FILES_FEDERATED_HOST") {
        config.files.federated_host = Some(val);
    }

    // Load overrides
    if let Some(val) = var("STRAND_LOAD_MAX_CONCURRENCY") {
        config.load.max_concurrency = parse_override("STRAND_LOAD_MAX_CONCURRENCY", &val)?;
    }
    if let Some(val) = var("STRAND_LOAD_OUTPUT_DIR") {
        config.load.output_dir = val;
    }

    // Logging overrides
    if let Some(val) = var("STRAND_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = parse_override("STRAND_LOGGING_LOCAL_ENABLED", &val)?;
    }
    if let Some(val) = var("STRAND_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_substitute_env_vars() {
        std::env::set_var("STRAND_LOADER_TEST_VAR", "test_value");
        let input = "password = \"${STRAND_LOADER_TEST_VAR}\"";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, "password = \"test_value\"");
        std::env::remove_var("STRAND_LOADER_TEST_VAR");
    }

    #[test]
    fn test_substitute_env_vars_lists_all_missing() {
        std::env::remove_var("STRAND_MISSING_ONE");
        std::env::remove_var("STRAND_MISSING_TWO");
        let input = "a = \"${STRAND_MISSING_ONE}\"\nb = \"${STRAND_MISSING_TWO}\"";
        let err = substitute_env_vars(input).unwrap_err().to_string();
        assert!(err.contains("STRAND_MISSING_ONE"));
        assert!(err.contains("STRAND_MISSING_TWO"));
    }

    #[test]
    fn test_substitute_env_vars_skips_comments() {
        std::env::remove_var("STRAND_COMMENTED_OUT");
        let input = "# cookie = \"${STRAND_COMMENTED_OUT}\"\nx = 1";
        let result = substitute_env_vars(input).unwrap();
        assert!(result.contains("${STRAND_COMMENTED_OUT}"));
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("nonexistent.toml");
        assert!(matches!(result, Err(StrandError::Configuration(_))));
    }

    #[test]
    fn test_load_config_valid() {
        let toml_content = r#"
environment = "development"

[application]
log_level = "info"

[dataservice]
connection_string = "postgresql://etl:pw@localhost:5432/dataservice"

[fhir]
base_url = "https://fhir.example.org"
username = "etl"
password = "pw"

[load]
max_concurrency = 4
entity_builders = ["patient", "specimen"]
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.fhir.base_url, "https://fhir.example.org");
        assert_eq!(config.fhir.placeholder_host, "http://localhost:8000");
        assert_eq!(config.load.max_concurrency, 4);
        assert_eq!(config.load.stages, "etl");
        assert_eq!(config.files.federated_endpoint, "index/index");
    }
}
