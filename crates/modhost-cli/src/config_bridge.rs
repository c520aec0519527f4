//! Bridge from `modhost_config::Config` to runtime and telemetry types.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, anyhow};
use modhost_config::{Config, VerifierKind};
use modhost_runtime::code::WasmCodeBackend;
use modhost_runtime::namespace::resources::{Configuration, DisplayMetrics, Orientation};
use modhost_runtime::storage::{ContentHashVerifier, FreshnessVerifier, SizeVerifier};
use modhost_runtime::{Host, PluginManager, PluginManagerBuilder};
use modhost_telemetry::{FileRotation, LogConfig, LogFormat};

const BYTES_PER_MB: u64 = 1_048_576;

/// Convert the logging section to a [`LogConfig`].
pub(crate) fn to_log_config(cfg: &Config) -> LogConfig {
    let format = cfg
        .logging
        .format
        .parse::<LogFormat>()
        .unwrap_or(LogFormat::Compact);

    let log_config = LogConfig::new(&cfg.logging.level)
        .with_format(format)
        .with_directives(&cfg.logging.directives);

    match &cfg.logging.log_dir {
        Some(dir) => log_config.with_file_logging(dir, FileRotation::Daily),
        None => log_config,
    }
}

/// Directory the host's private directories are created in.
pub(crate) fn storage_root(cfg: &Config) -> anyhow::Result<PathBuf> {
    match &cfg.storage.root {
        Some(root) => Ok(PathBuf::from(root)),
        None => modhost_config::loader::default_data_dir()
            .context("no storage.root configured and no platform data directory"),
    }
}

/// Display metrics and configuration of the console host.
pub(crate) fn to_display(cfg: &Config) -> anyhow::Result<(DisplayMetrics, Configuration)> {
    let orientation = cfg
        .host
        .orientation
        .parse::<Orientation>()
        .map_err(|e| anyhow!(e))?;
    let metrics = DisplayMetrics {
        density_dpi: cfg.host.density_dpi,
        width_px: cfg.host.width_px,
        height_px: cfg.host.height_px,
    };
    let configuration = Configuration {
        locale: cfg.host.locale.clone(),
        orientation,
    };
    Ok((metrics, configuration))
}

/// Freshness check selected by `storage.verifier`.
pub(crate) fn to_verifier(cfg: &Config) -> Arc<dyn FreshnessVerifier> {
    match cfg.storage.verifier {
        VerifierKind::Size => Arc::new(SizeVerifier),
        VerifierKind::Blake3 => Arc::new(ContentHashVerifier),
    }
}

/// WASM backend with the configured limits.
pub(crate) fn to_code_backend(cfg: &Config) -> WasmCodeBackend {
    WasmCodeBackend::new()
        .with_memory_limit(cfg.wasm.memory_limit_mb.saturating_mul(BYTES_PER_MB))
        .with_timeout(Duration::from_secs(cfg.wasm.timeout_secs))
        .with_require_hash(cfg.wasm.require_hash)
}

/// A manager builder for `host` configured from `cfg`.
pub(crate) fn to_builder(cfg: &Config, host: Arc<dyn Host>) -> PluginManagerBuilder {
    PluginManager::builder(host)
        .with_storage_dir(&cfg.storage.dir_name)
        .with_bundle_extension(cfg.storage.bundle_extension.trim_start_matches('.'))
        .with_verifier(to_verifier(cfg))
        .with_code_backend(Arc::new(to_code_backend(cfg)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use modhost_telemetry::LogTarget;

    #[test]
    fn log_config_follows_logging_section() {
        let mut cfg = Config::default();
        cfg.logging.level = "debug".to_owned();
        cfg.logging.format = "json".to_owned();
        cfg.logging.directives = vec!["modhost_runtime=trace".to_owned()];

        let log = to_log_config(&cfg);
        assert_eq!(log.level, "debug");
        assert_eq!(log.format, LogFormat::Json);
        assert_eq!(log.directives, vec!["modhost_runtime=trace"]);
        assert_eq!(log.target, LogTarget::Stderr);

        cfg.logging.log_dir = Some("/var/log/modhost".to_owned());
        let log = to_log_config(&cfg);
        assert_eq!(log.target, LogTarget::File(PathBuf::from("/var/log/modhost")));
        assert!(!log.ansi);
    }

    #[test]
    fn explicit_storage_root_wins() {
        let mut cfg = Config::default();
        cfg.storage.root = Some("/srv/modhost".to_owned());
        assert_eq!(storage_root(&cfg).unwrap(), PathBuf::from("/srv/modhost"));
    }

    #[test]
    fn display_from_host_section() {
        let mut cfg = Config::default();
        cfg.host.locale = "fr-CA".to_owned();
        cfg.host.orientation = "landscape".to_owned();
        cfg.host.density_dpi = 320;

        let (metrics, configuration) = to_display(&cfg).unwrap();
        assert_eq!(metrics.density_dpi, 320);
        assert_eq!(configuration.locale, "fr-CA");
        assert_eq!(configuration.orientation, Orientation::Landscape);

        cfg.host.orientation = "diagonal".to_owned();
        assert!(to_display(&cfg).is_err());
    }

    #[test]
    fn wasm_limits_are_converted() {
        let mut cfg = Config::default();
        cfg.wasm.memory_limit_mb = 16;
        cfg.wasm.timeout_secs = 5;
        let backend = to_code_backend(&cfg);
        assert_eq!(backend.max_memory_bytes(), 16_777_216);
        assert_eq!(backend.max_execution_time(), Duration::from_secs(5));
    }
}
