//! In-memory view of a bundle archive.
//!
//! Bundles are tar archives, optionally gzip-compressed. The whole archive is
//! read once when a bundle is installed; entries are then served from memory
//! to the manifest resolver, the resource table and the code backend.
//!
//! Reading guards against:
//! - Path traversal (`../` components) and absolute paths
//! - Symlinks, hardlinks and device nodes
//! - Excessive entry counts and total sizes

use std::collections::BTreeMap;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::{Archive, EntryType};

/// Maximum number of entries allowed in a bundle.
const MAX_ENTRY_COUNT: usize = 10_000;

/// Maximum total unpacked size (256 MB).
const MAX_TOTAL_SIZE: u64 = 256_000_000;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Read-only, fully loaded bundle archive.
#[derive(Debug, Clone)]
pub struct BundleArchive {
    path: PathBuf,
    entries: BTreeMap<String, Vec<u8>>,
}

impl BundleArchive {
    /// Open and fully read the archive at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, is not a tar archive,
    /// or contains an unsafe entry.
    pub fn open(path: &Path) -> io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let entries = if bytes.starts_with(&GZIP_MAGIC) {
            read_entries(GzDecoder::new(bytes.as_slice()))?
        } else {
            read_entries(bytes.as_slice())?
        };
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    /// Build an archive view from already loaded entries.
    #[must_use]
    pub fn from_entries(
        path: impl Into<PathBuf>,
        entries: impl IntoIterator<Item = (String, Vec<u8>)>,
    ) -> Self {
        Self {
            path: path.into(),
            entries: entries.into_iter().collect(),
        }
    }

    /// Path of the archive on disk.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes of a single entry.
    #[must_use]
    pub fn entry(&self, name: &str) -> Option<&[u8]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    /// Whether the archive contains `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// All entry names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Entries whose name starts with `prefix`, sorted by name.
    pub fn entries_under<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a [u8])> + 'a {
        self.entries
            .range(prefix.to_owned()..)
            .take_while(move |(name, _)| name.starts_with(prefix))
            .map(|(name, data)| (name.as_str(), data.as_slice()))
    }
}

fn read_entries<R: Read>(reader: R) -> io::Result<BTreeMap<String, Vec<u8>>> {
    let mut archive = Archive::new(reader);
    let mut entries = BTreeMap::new();
    let mut entry_count = 0usize;
    let mut total_size: u64 = 0;

    for entry in archive.entries()? {
        let mut entry = entry?;

        entry_count = entry_count.saturating_add(1);
        if entry_count > MAX_ENTRY_COUNT {
            return Err(invalid(format!(
                "archive exceeds maximum entry count ({MAX_ENTRY_COUNT})"
            )));
        }

        let entry_type = entry.header().entry_type();
        if entry_type.is_dir() {
            continue;
        }
        let raw_path = entry.path()?.into_owned();
        if !matches!(entry_type, EntryType::Regular | EntryType::Continuous) {
            return Err(invalid(format!(
                "unsafe entry type {entry_type:?} at {}",
                raw_path.display()
            )));
        }
        let name = normalize_entry_path(&raw_path)?;

        total_size = total_size.saturating_add(entry.header().size()?);
        if total_size > MAX_TOTAL_SIZE {
            return Err(invalid(format!(
                "archive exceeds maximum unpacked size ({MAX_TOTAL_SIZE} bytes)"
            )));
        }

        let mut data = Vec::new();
        entry.read_to_end(&mut data)?;
        entries.insert(name, data);
    }

    Ok(entries)
}

/// Validate an entry path and turn it into a `/`-separated name with any
/// leading `./` removed.
fn normalize_entry_path(path: &Path) -> io::Result<String> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => {
                let part = part
                    .to_str()
                    .ok_or_else(|| invalid(format!("non-UTF-8 entry path {}", path.display())))?;
                parts.push(part);
            },
            Component::CurDir => {},
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(invalid(format!(
                    "path traversal attempt in entry {}",
                    path.display()
                )));
            },
        }
    }
    if parts.is_empty() {
        return Err(invalid("empty entry path".to_string()));
    }
    Ok(parts.join("/"))
}

fn invalid(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn tar_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, data) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    #[test]
    fn reads_plain_tar() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("b.mhb");
        std::fs::write(
            &path,
            tar_bytes(&[("plugin.toml", b"x"), ("./assets/a.txt", b"hello")]),
        )
        .unwrap();

        let archive = BundleArchive::open(&path).unwrap();
        assert!(archive.contains("plugin.toml"));
        assert_eq!(archive.entry("assets/a.txt"), Some(&b"hello"[..]));
        assert_eq!(archive.path(), path);
    }

    #[test]
    fn reads_gzip_tar() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("b.mhb");
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder
            .write_all(&tar_bytes(&[("plugin.toml", b"x")]))
            .unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();

        let archive = BundleArchive::open(&path).unwrap();
        assert_eq!(archive.names().collect::<Vec<_>>(), vec!["plugin.toml"]);
    }

    #[test]
    fn entries_under_prefix() {
        let archive = BundleArchive::from_entries(
            "mem",
            [
                ("lib/a.so".to_string(), vec![1]),
                ("lib/x86_64/b.so".to_string(), vec![2]),
                ("libx".to_string(), vec![3]),
                ("res/values/strings.toml".to_string(), vec![4]),
            ],
        );
        let names: Vec<_> = archive.entries_under("lib/").map(|(n, _)| n).collect();
        assert_eq!(names, vec!["lib/a.so", "lib/x86_64/b.so"]);
    }

    #[test]
    fn rejects_non_archive() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("junk.mhb");
        std::fs::write(&path, vec![0x42; 700]).unwrap();
        assert!(BundleArchive::open(&path).is_err());
    }

    #[test]
    fn rejects_parent_dir_components() {
        assert!(normalize_entry_path(Path::new("../etc/passwd")).is_err());
        assert!(normalize_entry_path(Path::new("/etc/passwd")).is_err());
        assert_eq!(
            normalize_entry_path(Path::new("./res/values/a.toml")).unwrap(),
            "res/values/a.toml"
        );
    }
}
