//! Test harness helpers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use modhost_runtime::code::StaticCodeBackend;
use modhost_runtime::{PluginManager, PluginManagerBuilder};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

use crate::mocks::MockHost;

/// Create a temporary directory for testing.
///
/// The directory is automatically cleaned up when the returned `TempDir` is dropped.
///
/// # Panics
///
/// Panics if the temporary directory cannot be created.
#[must_use]
pub fn test_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

/// Set up test logging with the given filter.
///
/// # Example
///
/// ```rust,ignore
/// use modhost_test::setup_test_logging;
///
/// #[test]
/// fn my_test() {
///     setup_test_logging("modhost_runtime=debug");
///     // ... test code
/// }
/// ```
pub fn setup_test_logging(filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_test_writer()
        .try_init();
}

/// Set up test logging with default filter (warn level).
pub fn setup_test_logging_default() {
    setup_test_logging("warn");
}

/// A host, an in-process code backend and a directory for bundle sources.
///
/// Managers built from a harness use the [`StaticCodeBackend`], so bundles
/// that declare `[code]` must have their classes registered first.
#[derive(Debug)]
pub struct RuntimeHarness {
    /// The mock host.
    pub host: Arc<MockHost>,
    /// In-process classes, keyed by package.
    pub backend: Arc<StaticCodeBackend>,
    /// Where bundle sources are written.
    pub sources: TempDir,
}

impl RuntimeHarness {
    /// A fresh harness owned by the calling thread.
    #[must_use]
    pub fn new() -> Self {
        setup_test_logging_default();
        Self {
            host: MockHost::new(),
            backend: Arc::new(StaticCodeBackend::new()),
            sources: test_dir(),
        }
    }

    /// Directory bundle sources are written to.
    #[must_use]
    pub fn source_dir(&self) -> &Path {
        self.sources.path()
    }

    /// A sub-directory of the source directory.
    ///
    /// # Panics
    ///
    /// Panics if the directory cannot be created.
    #[must_use]
    pub fn create_subdir(&self, name: &str) -> PathBuf {
        let path = self.sources.path().join(name);
        std::fs::create_dir_all(&path).expect("Failed to create subdirectory");
        path
    }

    /// A manager builder wired to this harness's host and backend.
    #[must_use]
    pub fn builder(&self) -> PluginManagerBuilder {
        PluginManager::builder(self.host.clone()).with_code_backend(self.backend.clone())
    }

    /// Build a manager with default settings.
    ///
    /// # Panics
    ///
    /// Panics if the manager cannot be built.
    #[must_use]
    pub fn manager(&self) -> PluginManager {
        self.builder().build().expect("Failed to build plugin manager")
    }
}

impl Default for RuntimeHarness {
    fn default() -> Self {
        Self::new()
    }
}
