use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Configuration error type.
///
/// File errors carry an `origin` naming the layer that was being read
/// (`"user config"`, `"workspace config"`, `"config file"`).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file exists but could not be read.
    #[error("cannot read {origin} {}: {source}", path.display())]
    ReadError {
        /// Layer the file belongs to.
        origin: &'static str,
        /// The unreadable file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A config file is not valid TOML.
    #[error("{origin} {} is not valid TOML: {source}", path.display())]
    ParseError {
        /// Layer the file belongs to.
        origin: &'static str,
        /// The malformed file.
        path: PathBuf,
        /// Underlying TOML parse error.
        #[source]
        source: toml::de::Error,
    },

    /// A config file is over the size limit and was not parsed.
    #[error("{origin} {} is {size} bytes, over the {limit} byte limit", path.display())]
    TooLarge {
        /// Layer the file belongs to.
        origin: &'static str,
        /// The oversized file.
        path: PathBuf,
        /// Size of the file.
        size: u64,
        /// Largest accepted size.
        limit: u64,
    },

    /// The layers merged into a table that does not fit the config schema.
    #[error("merged configuration does not match the schema: {0}")]
    Schema(#[source] toml::de::Error),

    /// The embedded `defaults.toml` does not parse.
    #[error("embedded defaults are invalid: {0}")]
    Defaults(#[source] toml::de::Error),

    /// A resolved value is out of range or unknown.
    #[error("invalid value for `{field}`: {message}")]
    ValidationError {
        /// Dotted path of the offending field.
        field: String,
        /// Validation failure description.
        message: String,
    },

    /// No home directory to look for `~/.modhost` in.
    #[error("could not determine home directory for the user config")]
    NoHomeDir,
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
