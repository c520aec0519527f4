//! Freshness policies for staged bundle copies.
//!
//! A verifier is consulted only when a private copy of a bundle already
//! exists. Returning `true` means the copy still matches its source and the
//! staging step skips the copy entirely.

use std::fs::File;
use std::path::Path;

use tracing::debug;

/// Decides whether a previously staged private copy is still valid.
pub trait FreshnessVerifier: Send + Sync {
    /// Returns `true` when `private_copy` is up to date with `source`.
    ///
    /// Implementations must be side-effect free. Any error while inspecting
    /// either file should be reported as "not fresh" so the bundle is
    /// re-copied.
    fn is_fresh(&self, source: &Path, private_copy: &Path) -> bool;
}

/// Default policy: two files of equal length are considered identical.
#[derive(Debug, Clone, Copy, Default)]
pub struct SizeVerifier;

impl FreshnessVerifier for SizeVerifier {
    fn is_fresh(&self, source: &Path, private_copy: &Path) -> bool {
        match (std::fs::metadata(source), std::fs::metadata(private_copy)) {
            (Ok(src), Ok(dst)) => src.len() == dst.len(),
            _ => false,
        }
    }
}

/// Compares blake3 digests of both files.
///
/// Slower than [`SizeVerifier`] but catches same-length rebuilds.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentHashVerifier;

impl ContentHashVerifier {
    fn digest(path: &Path) -> std::io::Result<blake3::Hash> {
        let file = File::open(path)?;
        let mut hasher = blake3::Hasher::new();
        hasher.update_reader(file)?;
        Ok(hasher.finalize())
    }
}

impl FreshnessVerifier for ContentHashVerifier {
    fn is_fresh(&self, source: &Path, private_copy: &Path) -> bool {
        match (Self::digest(source), Self::digest(private_copy)) {
            (Ok(a), Ok(b)) => a == b,
            (Err(e), _) | (_, Err(e)) => {
                debug!(error = %e, "hash comparison failed, treating copy as stale");
                false
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, data: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, data).unwrap();
        path
    }

    #[test]
    fn size_verifier_matches_equal_lengths() {
        let tmp = tempfile::tempdir().unwrap();
        let a = write(tmp.path(), "a", b"abcd");
        let b = write(tmp.path(), "b", b"wxyz");
        assert!(SizeVerifier.is_fresh(&a, &b));
    }

    #[test]
    fn size_verifier_rejects_different_lengths() {
        let tmp = tempfile::tempdir().unwrap();
        let a = write(tmp.path(), "a", b"abcd");
        let b = write(tmp.path(), "b", b"abc");
        assert!(!SizeVerifier.is_fresh(&a, &b));
    }

    #[test]
    fn size_verifier_missing_file_is_stale() {
        let tmp = tempfile::tempdir().unwrap();
        let a = write(tmp.path(), "a", b"abcd");
        assert!(!SizeVerifier.is_fresh(&a, &tmp.path().join("missing")));
    }

    #[test]
    fn hash_verifier_detects_same_length_change() {
        let tmp = tempfile::tempdir().unwrap();
        let a = write(tmp.path(), "a", b"abcd");
        let b = write(tmp.path(), "b", b"wxyz");
        let c = write(tmp.path(), "c", b"abcd");
        assert!(!ContentHashVerifier.is_fresh(&a, &b));
        assert!(ContentHashVerifier.is_fresh(&a, &c));
    }
}
