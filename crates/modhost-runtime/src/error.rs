//! Runtime error types.

use std::fmt;
use std::path::PathBuf;

/// Which half of a bundle namespace failed to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceKind {
    /// The isolated class loader and its code module.
    Code,
    /// The merged resource view.
    Resources,
}

impl fmt::Display for NamespaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code => f.write_str("code"),
            Self::Resources => f.write_str("resource"),
        }
    }
}

/// Errors from plugin manager operations.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Initialization was attempted off the host's control thread.
    #[error("plugin manager must be initialized on the control thread (called from {thread})")]
    WrongThread {
        /// Name or id of the calling thread.
        thread: String,
    },

    /// The default manager instance was requested before `init`.
    #[error("plugin manager has not been initialized")]
    NotInitialized,

    /// The default manager instance already exists.
    #[error("plugin manager is already initialized")]
    AlreadyInitialized,

    /// A source bundle (or any bundle in a directory) could not be found.
    #[error("bundle not found at {}: {reason}", path.display())]
    BundleNotFound {
        /// The path that was searched.
        path: PathBuf,
        /// Why nothing usable was found there.
        reason: String,
    },

    /// No plugin is registered under the package name.
    #[error("plugin not found: {0}")]
    PluginNotFound(String),

    /// The plugin does not declare the requested component.
    #[error("component {class_name} not declared by plugin {package}")]
    ComponentNotFound {
        /// Package of the plugin that was searched.
        package: String,
        /// Requested component class (`<main>` for main-entry requests).
        class_name: String,
    },

    /// The code or resource namespace of a bundle could not be built.
    #[error("failed to build {kind} namespace for {package}: {message}")]
    NamespaceConstructionFailed {
        /// Package whose namespace failed.
        package: String,
        /// Which namespace failed.
        kind: NamespaceKind,
        /// Failure reason.
        message: String,
    },

    /// The entry object could not be loaded, constructed or attached.
    #[error("failed to create entry {class_name} for {package}: {message}")]
    EntryInstantiationFailed {
        /// Package whose entry failed.
        package: String,
        /// Entry class name.
        class_name: String,
        /// Failure reason.
        message: String,
    },

    /// Copying a bundle into private storage failed.
    #[error("storage I/O failed for {}: {source}", path.display())]
    StorageIoFailed {
        /// Path being written or read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The bundle archive or its manifest could not be read.
    #[error("failed to resolve manifest of {}: {message}", path.display())]
    ManifestResolution {
        /// Private path of the bundle.
        path: PathBuf,
        /// Parse or read error message.
        message: String,
    },

    /// The host refused the launch payload.
    #[error("host dispatch failed: {0}")]
    Dispatch(String),
}

/// Result type for plugin manager operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
