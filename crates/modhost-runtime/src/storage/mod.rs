//! Process-private bundle storage.
//!
//! Layout under the storage root:
//!
//! ```text
//! <root>/
//! ├── <bundle-id>              (private copy of the bundle)
//! └── <bundle-id>-dir/
//!     └── lib/                 (native library search path)
//! ```

pub mod verify;

use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{RuntimeError, RuntimeResult};

pub use verify::{ContentHashVerifier, FreshnessVerifier, SizeVerifier};

/// Outcome of staging a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedBundle {
    /// Absolute path of the private copy.
    pub private_path: PathBuf,
    /// Whether bytes were actually copied during this call.
    pub copied: bool,
}

/// Copies bundles into private storage and derives their per-bundle paths.
#[derive(Clone)]
pub struct BundleStorage {
    root: PathBuf,
    verifier: Arc<dyn FreshnessVerifier>,
}

impl std::fmt::Debug for BundleStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleStorage")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl BundleStorage {
    /// Create storage rooted at `root` using `verifier` to skip redundant copies.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, verifier: Arc<dyn FreshnessVerifier>) -> Self {
        Self {
            root: root.into(),
            verifier,
        }
    }

    /// The storage root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Private path for a staged bundle file name.
    #[must_use]
    pub fn private_path(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    /// Per-bundle working directory: `<root>/<id>-dir`.
    #[must_use]
    pub fn base_dir(&self, bundle_id: &str) -> PathBuf {
        self.root.join(format!("{bundle_id}-dir"))
    }

    /// Native library search path: `<root>/<id>-dir/lib`.
    #[must_use]
    pub fn lib_dir(&self, bundle_id: &str) -> PathBuf {
        self.base_dir(bundle_id).join("lib")
    }

    /// Copy `source` into private storage unless an up-to-date copy exists.
    ///
    /// `target_name` overrides the private file name (defaults to the
    /// source's file name). Staging a file that already lives at its private
    /// path is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::BundleNotFound`] if `source` is not a regular
    /// file and [`RuntimeError::StorageIoFailed`] if the copy fails or the
    /// target name is not a plain file name.
    pub fn stage(&self, source: &Path, target_name: Option<&str>) -> RuntimeResult<StagedBundle> {
        if !source.is_file() {
            return Err(RuntimeError::BundleNotFound {
                path: source.to_path_buf(),
                reason: "not a regular file".into(),
            });
        }

        let file_name = match target_name {
            Some(name) => name.to_owned(),
            None => source
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_owned)
                .ok_or_else(|| storage_err(source, "source has no usable file name"))?,
        };
        validate_file_name(&file_name).map_err(|msg| storage_err(source, msg))?;

        let source_abs = absolute(source)?;
        let private_path = absolute(&self.private_path(&file_name))?;

        if source_abs == private_path {
            debug!(path = %private_path.display(), "bundle already in private storage");
            return Ok(StagedBundle {
                private_path,
                copied: false,
            });
        }

        if private_path.is_file() && self.verifier.is_fresh(&source_abs, &private_path) {
            debug!(path = %private_path.display(), "private copy is fresh, skipping copy");
            return Ok(StagedBundle {
                private_path,
                copied: false,
            });
        }

        copy_atomic(&source_abs, &private_path)?;
        info!(
            source = %source_abs.display(),
            target = %private_path.display(),
            "copied bundle into private storage"
        );
        Ok(StagedBundle {
            private_path,
            copied: true,
        })
    }
}

/// Copy via a temp file in the destination directory, then rename over the
/// target so readers never observe a partially written bundle.
fn copy_atomic(source: &Path, target: &Path) -> RuntimeResult<()> {
    let dir = target
        .parent()
        .ok_or_else(|| storage_err(target, "target has no parent directory"))?;
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let mut input = std::fs::File::open(source).map_err(|e| io_err(source, e))?;
    let mut staging = tempfile::NamedTempFile::new_in(dir).map_err(|e| io_err(dir, e))?;
    io::copy(&mut input, staging.as_file_mut()).map_err(|e| io_err(target, e))?;
    staging
        .as_file()
        .sync_all()
        .map_err(|e| io_err(target, e))?;
    staging
        .persist(target)
        .map_err(|e| io_err(target, e.error))?;
    Ok(())
}

fn validate_file_name(name: &str) -> Result<(), &'static str> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err("bundle file name must be a single path component"),
    }
}

fn absolute(path: &Path) -> RuntimeResult<PathBuf> {
    std::path::absolute(path).map_err(|e| io_err(path, e))
}

fn io_err(path: &Path, source: io::Error) -> RuntimeError {
    RuntimeError::StorageIoFailed {
        path: path.to_path_buf(),
        source,
    }
}

fn storage_err(path: &Path, message: &str) -> RuntimeError {
    io_err(path, io::Error::new(io::ErrorKind::InvalidInput, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(root: &Path) -> BundleStorage {
        BundleStorage::new(root.join("private"), Arc::new(SizeVerifier))
    }

    #[test]
    fn layout_paths() {
        let storage = BundleStorage::new("/data/plugins", Arc::new(SizeVerifier));
        assert_eq!(
            storage.private_path("demo.mhb"),
            PathBuf::from("/data/plugins/demo.mhb")
        );
        assert_eq!(
            storage.lib_dir("demo.mhb"),
            PathBuf::from("/data/plugins/demo.mhb-dir/lib")
        );
    }

    #[test]
    fn stage_copies_then_skips_fresh_copy() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("demo.mhb");
        std::fs::write(&source, b"bundle-bytes").unwrap();
        let storage = storage(tmp.path());

        let first = storage.stage(&source, None).unwrap();
        assert!(first.copied);
        assert_eq!(std::fs::read(&first.private_path).unwrap(), b"bundle-bytes");

        let second = storage.stage(&source, None).unwrap();
        assert!(!second.copied);
        assert_eq!(first.private_path, second.private_path);
    }

    #[test]
    fn stage_recopies_when_size_changes() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("demo.mhb");
        std::fs::write(&source, b"v1").unwrap();
        let storage = storage(tmp.path());
        storage.stage(&source, None).unwrap();

        std::fs::write(&source, b"version-two").unwrap();
        let staged = storage.stage(&source, None).unwrap();
        assert!(staged.copied);
        assert_eq!(std::fs::read(&staged.private_path).unwrap(), b"version-two");
    }

    #[test]
    fn stage_self_referential_is_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = storage(tmp.path());
        std::fs::create_dir_all(storage.root()).unwrap();
        let inside = storage.private_path("inside.mhb");
        std::fs::write(&inside, b"x").unwrap();

        let staged = storage.stage(&inside, None).unwrap();
        assert!(!staged.copied);
    }

    #[test]
    fn stage_honors_target_name() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("demo.mhb");
        std::fs::write(&source, b"x").unwrap();
        let staged = storage(tmp.path())
            .stage(&source, Some("renamed.mhb"))
            .unwrap();
        assert!(staged.private_path.ends_with("renamed.mhb"));
    }

    #[test]
    fn stage_rejects_traversal_target() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("demo.mhb");
        std::fs::write(&source, b"x").unwrap();
        let err = storage(tmp.path())
            .stage(&source, Some("../escape.mhb"))
            .unwrap_err();
        assert!(matches!(err, RuntimeError::StorageIoFailed { .. }));
    }

    #[test]
    fn stage_missing_source() {
        let tmp = tempfile::tempdir().unwrap();
        let err = storage(tmp.path())
            .stage(&tmp.path().join("nope.mhb"), None)
            .unwrap_err();
        assert!(matches!(err, RuntimeError::BundleNotFound { .. }));
    }
}
