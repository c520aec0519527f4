//! Config file discovery and layered loading.
//!
//! Implements the `Config::load()` algorithm:
//! 1. Parse `defaults.toml` → base
//! 2. Merge `~/.modhost/config.toml` (or `$MODHOST_HOME/config.toml`)
//! 3. Merge `{workspace}/.modhost/config.toml`
//! 4. Apply env var fallbacks for fields no file set
//! 5. Deserialize merged tree → `Config`
//! 6. Validate
//! 7. Return `ResolvedConfig`

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::env::{apply_env_fallbacks, collect_env_vars};
use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ConfigLayer, FieldSources, deep_merge_tracking, record_leaves};
use crate::show::ResolvedConfig;
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Name of the per-user and per-workspace config directory.
pub const CONFIG_DIR_NAME: &str = ".modhost";

/// Name of the config file inside [`CONFIG_DIR_NAME`].
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

const USER_ORIGIN: &str = "user config";
const WORKSPACE_ORIGIN: &str = "workspace config";
const FILE_ORIGIN: &str = "config file";

/// Load the configuration with layered file precedence.
///
/// `workspace_root` is the root of the current project. If `None`, the
/// workspace layer is skipped. `home_override` is used as the user config
/// directory itself, bypassing `~/.modhost` and `MODHOST_HOME`.
///
/// # Errors
///
/// Returns a [`ConfigError`] if any config file is malformed, or if the
/// final merged configuration fails validation.
pub fn load(workspace_root: Option<&Path>, home_override: Option<&Path>) -> ConfigResult<ResolvedConfig> {
    let env_vars = collect_env_vars();

    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(ConfigError::Defaults)?;
    let mut field_sources = FieldSources::new();
    let mut loaded_files = Vec::new();
    record_leaves(&merged, "", &ConfigLayer::Defaults, &mut field_sources);

    let user_config = if let Some(dir) = home_override {
        let path = dir.join(CONFIG_FILE_NAME);
        try_load_file(&path, USER_ORIGIN)?.map(|overlay| (overlay, path))
    } else {
        let user_path = home_directory()?.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME);
        if let Some(overlay) = try_load_file(&user_path, USER_ORIGIN)? {
            Some((overlay, user_path))
        } else if let Some(modhost_home) = env_vars.get("MODHOST_HOME") {
            let dir = PathBuf::from(modhost_home);
            if dir.is_dir() {
                let path = dir.join(CONFIG_FILE_NAME);
                try_load_file(&path, USER_ORIGIN)?.map(|overlay| (overlay, path))
            } else {
                warn!(path = %modhost_home, "MODHOST_HOME is not a directory; ignoring");
                None
            }
        } else {
            None
        }
    };

    if let Some((overlay, path)) = user_config {
        deep_merge_tracking(&mut merged, &overlay, "", &ConfigLayer::User, &mut field_sources);
        loaded_files.push(path.display().to_string());
        info!(path = %path.display(), "loaded user config");
    }

    if let Some(ws_root) = workspace_root {
        let ws_path = ws_root.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME);
        if let Some(overlay) = try_load_file(&ws_path, WORKSPACE_ORIGIN)? {
            deep_merge_tracking(
                &mut merged,
                &overlay,
                "",
                &ConfigLayer::Workspace,
                &mut field_sources,
            );
            loaded_files.push(ws_path.display().to_string());
            info!(path = %ws_path.display(), "loaded workspace config");
        }
    }

    let env_count = apply_env_fallbacks(&mut merged, &mut field_sources, &env_vars);
    if env_count > 0 {
        debug!(count = env_count, "applied environment variable fallbacks");
    }

    let config: Config = merged
        .try_into()
        .map_err(ConfigError::Schema)?;

    validate::validate(&config)?;

    Ok(ResolvedConfig {
        config,
        field_sources,
        loaded_files,
    })
}

/// Load a config from a specific file path (no layering).
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
/// validation.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let value = try_load_file(path, FILE_ORIGIN)?.ok_or_else(|| ConfigError::ReadError {
        origin: FILE_ORIGIN,
        path: path.to_path_buf(),
        source: std::io::Error::from(std::io::ErrorKind::NotFound),
    })?;
    let config: Config = value
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::ParseError {
            origin: FILE_ORIGIN,
            path: path.to_path_buf(),
            source: e,
        })?;
    validate::validate(&config)?;
    Ok(config)
}

/// Try to load a file, returning `None` if the file doesn't exist.
fn try_load_file(path: &Path, origin: &'static str) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                origin,
                path: path.to_path_buf(),
                source: e,
            });
        },
    };

    let size = content.len() as u64;
    if size > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::TooLarge {
            origin,
            path: path.to_path_buf(),
            size,
            limit: MAX_CONFIG_FILE_SIZE,
        });
    }

    let value: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        origin,
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(Some(value))
}

/// Determine the user's home directory.
///
/// # Errors
///
/// Returns [`ConfigError::NoHomeDir`] if no home directory can be found.
pub fn home_directory() -> ConfigResult<PathBuf> {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .ok_or(ConfigError::NoHomeDir)
}

/// Platform data directory used when `storage.root` is unset.
///
/// # Errors
///
/// Returns [`ConfigError::NoHomeDir`] if no home directory can be found.
pub fn default_data_dir() -> ConfigResult<PathBuf> {
    directories::ProjectDirs::from("", "", "modhost")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or(ConfigError::NoHomeDir)
}
