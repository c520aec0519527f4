//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_storage(config)?;
    validate_wasm(config)?;
    validate_host(config)?;
    validate_logging(config)?;
    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_owned(),
        message: message.into(),
    }
}

fn validate_storage(config: &Config) -> ConfigResult<()> {
    let s = &config.storage;

    if s.dir_name.is_empty() || s.dir_name.contains(['/', '\\']) || s.dir_name == ".." {
        return Err(invalid(
            "storage.dir_name",
            format!("'{}' must be a single directory name", s.dir_name),
        ));
    }

    let extension = s.bundle_extension.trim_start_matches('.');
    if extension.is_empty() || !extension.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(invalid(
            "storage.bundle_extension",
            format!("'{}' is not a valid file extension", s.bundle_extension),
        ));
    }

    if s.root.as_deref().is_some_and(str::is_empty) {
        return Err(invalid("storage.root", "must not be empty when set"));
    }

    Ok(())
}

/// Upper bound on the guest memory limit (4 GB, the wasm32 address space).
const MAX_MEMORY_LIMIT_MB: u64 = 4096;

fn validate_wasm(config: &Config) -> ConfigResult<()> {
    let w = &config.wasm;

    if w.memory_limit_mb == 0 || w.memory_limit_mb > MAX_MEMORY_LIMIT_MB {
        return Err(invalid(
            "wasm.memory_limit_mb",
            format!("must be between 1 and {MAX_MEMORY_LIMIT_MB}"),
        ));
    }

    if w.timeout_secs == 0 {
        return Err(invalid("wasm.timeout_secs", "must be greater than 0"));
    }

    Ok(())
}

fn validate_host(config: &Config) -> ConfigResult<()> {
    let h = &config.host;

    if h.locale.trim().is_empty() {
        return Err(invalid("host.locale", "must not be empty"));
    }

    if !matches!(h.orientation.as_str(), "portrait" | "landscape") {
        return Err(invalid(
            "host.orientation",
            format!(
                "unsupported orientation '{}'; expected portrait or landscape",
                h.orientation
            ),
        ));
    }

    if h.density_dpi == 0 || h.width_px == 0 || h.height_px == 0 {
        return Err(invalid(
            "host",
            "density_dpi, width_px and height_px must be greater than 0",
        ));
    }

    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let l = &config.logging;

    if !matches!(
        l.level.to_lowercase().as_str(),
        "trace" | "debug" | "info" | "warn" | "error"
    ) {
        return Err(invalid(
            "logging.level",
            format!("unknown log level '{}'", l.level),
        ));
    }

    if !matches!(l.format.as_str(), "pretty" | "compact" | "json" | "full") {
        return Err(invalid(
            "logging.format",
            format!(
                "unknown log format '{}'; expected pretty, compact, json or full",
                l.format
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn storage_dir_must_be_a_name() {
        let mut config = Config::default();
        config.storage.dir_name = "../escape".to_owned();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("storage.dir_name"));
    }

    #[test]
    fn bundle_extension_must_be_alphanumeric() {
        let mut config = Config::default();
        config.storage.bundle_extension = ".m h".to_owned();
        assert!(validate(&config).is_err());
        config.storage.bundle_extension = ".plug".to_owned();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn wasm_limits_are_bounded() {
        let mut config = Config::default();
        config.wasm.memory_limit_mb = 0;
        assert!(validate(&config).is_err());
        config.wasm.memory_limit_mb = 64;
        config.wasm.timeout_secs = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn host_orientation_is_checked() {
        let mut config = Config::default();
        config.host.orientation = "sideways".to_owned();
        let err = validate(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { ref field, .. } if field == "host.orientation"));
    }

    #[test]
    fn logging_format_is_checked() {
        let mut config = Config::default();
        config.logging.format = "xml".to_owned();
        assert!(validate(&config).is_err());
        config.logging.format = "json".to_owned();
        config.logging.level = "LOUD".to_owned();
        assert!(validate(&config).is_err());
    }
}
