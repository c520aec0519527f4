//! Configuration struct definitions.
//!
//! Every section uses `#[serde(default)]`, so a partial file only overrides
//! what it names.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bundle staging.
    pub storage: StorageSection,
    /// WASM code modules.
    pub wasm: WasmSection,
    /// The console host used by the CLI.
    pub host: HostSection,
    /// Logging level, format, and per-crate directives.
    pub logging: LoggingSection,
}

// ---------------------------------------------------------------------------
// StorageSection
// ---------------------------------------------------------------------------

/// How staged bundle copies are checked before reuse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifierKind {
    /// Same size means fresh.
    #[default]
    Size,
    /// Same blake3 digest means fresh.
    Blake3,
}

/// Where and how bundles are staged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Root for host private directories. `None` uses the platform data
    /// directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
    /// Name of the private directory bundles are copied into.
    pub dir_name: String,
    /// Extension picked up by directory installs, without the dot.
    pub bundle_extension: String,
    /// Freshness check for existing private copies.
    pub verifier: VerifierKind,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            root: None,
            dir_name: "plugins".to_owned(),
            bundle_extension: "mhb".to_owned(),
            verifier: VerifierKind::Size,
        }
    }
}

// ---------------------------------------------------------------------------
// WasmSection
// ---------------------------------------------------------------------------

/// Limits for WASM code modules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WasmSection {
    /// Guest memory limit in megabytes.
    pub memory_limit_mb: u64,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
    /// Refuse modules whose manifest carries no hash.
    pub require_hash: bool,
}

impl Default for WasmSection {
    fn default() -> Self {
        Self {
            memory_limit_mb: 64,
            timeout_secs: 30,
            require_hash: false,
        }
    }
}

// ---------------------------------------------------------------------------
// HostSection
// ---------------------------------------------------------------------------

/// Display and locale of the console host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostSection {
    /// Locale such as `en-US`.
    pub locale: String,
    /// `portrait` or `landscape`.
    pub orientation: String,
    /// Screen density in dots per inch.
    pub density_dpi: u32,
    /// Screen width in pixels.
    pub width_px: u32,
    /// Screen height in pixels.
    pub height_px: u32,
}

impl Default for HostSection {
    fn default() -> Self {
        Self {
            locale: "en-US".to_owned(),
            orientation: "portrait".to_owned(),
            density_dpi: 160,
            width_px: 1080,
            height_px: 1920,
        }
    }
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging and tracing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"`, `"compact"`, `"json"` or `"full"`.
    pub format: String,
    /// Per-crate tracing directives (e.g. `["modhost_runtime=debug"]`).
    pub directives: Vec<String>,
    /// Write rolling log files here instead of stderr.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
            log_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_sections_keep_defaults() {
        let config: Config = toml::from_str(
            r#"
            [storage]
            verifier = "blake3"

            [host]
            locale = "fr-FR"
        "#,
        )
        .unwrap();
        assert_eq!(config.storage.verifier, VerifierKind::Blake3);
        assert_eq!(config.storage.dir_name, "plugins");
        assert_eq!(config.host.locale, "fr-FR");
        assert_eq!(config.host.density_dpi, 160);
        assert_eq!(config.wasm, WasmSection::default());
    }
}
