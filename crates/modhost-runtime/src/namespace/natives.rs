//! Native library extraction and lookup.
//!
//! Bundles ship native libraries under `lib/<file>` (architecture neutral)
//! or `lib/<arch>/<file>`. Only libraries for the running architecture are
//! extracted into the bundle's private library directory.

use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::archive::BundleArchive;

const LIB_PREFIX: &str = "lib/";

/// Platform file name of a native library: `foo` becomes `libfoo.so` on
/// Linux, `foo.dll` on Windows.
#[must_use]
pub fn map_library_name(name: &str) -> String {
    format!(
        "{}{name}{}",
        std::env::consts::DLL_PREFIX,
        std::env::consts::DLL_SUFFIX
    )
}

/// Resolve `name` inside `lib_dir`, trying the platform-mapped name first.
#[must_use]
pub fn find_library(lib_dir: &Path, name: &str) -> Option<PathBuf> {
    [map_library_name(name), name.to_string()]
        .into_iter()
        .map(|file| lib_dir.join(file))
        .find(|path| path.is_file())
}

/// Extract the bundle's native libraries for this architecture into
/// `lib_dir`. Files already present with the same size are left alone.
///
/// Returns the paths that were written.
///
/// # Errors
///
/// Returns an I/O error if the directory or a library cannot be written.
pub fn extract_native_libraries(archive: &BundleArchive, lib_dir: &Path) -> io::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(lib_dir)?;

    let mut written = Vec::new();
    for (name, data) in archive.entries_under(LIB_PREFIX) {
        let Some(file_name) = native_file_name(name) else {
            continue;
        };
        let target = lib_dir.join(file_name);
        let up_to_date = std::fs::metadata(&target)
            .is_ok_and(|meta| meta.len() == data.len() as u64);
        if up_to_date {
            continue;
        }
        std::fs::write(&target, data)?;
        debug!(library = %target.display(), "extracted native library");
        written.push(target);
    }
    Ok(written)
}

/// The file name to extract for archive entry `name`, or `None` when the
/// entry targets another architecture or is nested too deeply.
fn native_file_name(name: &str) -> Option<&str> {
    let rest = name.strip_prefix(LIB_PREFIX)?;
    match rest.split_once('/') {
        None => Some(rest),
        Some((arch, file)) if arch == std::env::consts::ARCH && !file.contains('/') => Some(file),
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_platform_names() {
        let mapped = map_library_name("codec");
        assert!(mapped.contains("codec"));
        assert!(mapped.ends_with(std::env::consts::DLL_SUFFIX));
    }

    #[test]
    fn selects_current_arch_only() {
        let arch = std::env::consts::ARCH;
        assert_eq!(native_file_name("lib/a.so"), Some("a.so"));
        assert_eq!(
            native_file_name(&format!("lib/{arch}/b.so")),
            Some("b.so")
        );
        assert_eq!(native_file_name("lib/not-an-arch/c.so"), None);
        assert_eq!(native_file_name(&format!("lib/{arch}/deep/d.so")), None);
    }

    #[test]
    fn extracts_and_skips_unchanged() {
        let tmp = tempfile::tempdir().unwrap();
        let lib_dir = tmp.path().join("lib");
        let file = map_library_name("codec");
        let archive = BundleArchive::from_entries(
            "mem",
            [
                (format!("lib/{file}"), b"elf".to_vec()),
                ("lib/other-arch/x.so".to_string(), b"nope".to_vec()),
            ],
        );

        let written = extract_native_libraries(&archive, &lib_dir).unwrap();
        assert_eq!(written, vec![lib_dir.join(&file)]);
        assert_eq!(find_library(&lib_dir, "codec"), Some(lib_dir.join(&file)));
        assert!(find_library(&lib_dir, "x").is_none());

        let again = extract_native_libraries(&archive, &lib_dir).unwrap();
        assert!(again.is_empty());
    }
}
