#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Unified configuration for the modhost tools.
//!
//! # Usage
//!
//! ```rust,no_run
//! use modhost_config::Config;
//!
//! let resolved = Config::load(Some(std::path::Path::new("."))).unwrap();
//! println!("bundle extension: {}", resolved.config.storage.bundle_extension);
//! ```
//!
//! # Configuration Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Workspace** (`{workspace}/.modhost/config.toml`)
//! 2. **User** (`~/.modhost/config.toml`, or `$MODHOST_HOME/config.toml`)
//! 3. **Environment variables** (`MODHOST_*`), fallback only
//! 4. **Embedded defaults** (`defaults.toml` compiled into binary)
//!
//! This crate does not depend on the runtime. The CLI converts config values
//! into runtime settings at startup.

/// Environment variable fallback resolution.
pub mod env;
/// Configuration error types.
pub mod error;
/// Configuration file discovery and loading.
pub mod loader;
/// Layered configuration merging with source tracking.
pub mod merge;
/// Resolved configuration display and serialization.
pub mod show;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use show::{ResolvedConfig, ShowFormat};
pub use types::*;

impl Config {
    /// Load configuration with full precedence chain.
    ///
    /// See [`loader::load`] for the full algorithm.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any config file is malformed or the final
    /// configuration fails validation.
    pub fn load(workspace_root: Option<&std::path::Path>) -> ConfigResult<ResolvedConfig> {
        loader::load(workspace_root, None)
    }

    /// Load configuration with an explicit user config directory.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any config file is malformed or the final
    /// configuration fails validation.
    pub fn load_with_home(
        workspace_root: Option<&std::path::Path>,
        home_dir: &std::path::Path,
    ) -> ConfigResult<ResolvedConfig> {
        loader::load(workspace_root, Some(home_dir))
    }

    /// Load a single config file without layering.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
    /// validation.
    pub fn load_file(path: &std::path::Path) -> ConfigResult<Self> {
        loader::load_file(path)
    }
}
