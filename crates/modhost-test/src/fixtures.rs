//! Test fixtures: bundle files and recording classes.

use std::any::Any;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use flate2::Compression;
use flate2::write::GzEncoder;
use modhost_runtime::manifest::MANIFEST_FILE_NAME;
use modhost_runtime::namespace::loader::Class;
use modhost_runtime::{Component, ComponentDescriptor, Context, EntryObject, LaunchMode, LifecycleEvent};

/// Builds bundle archives the way a packaging tool would.
///
/// # Example
///
/// ```rust,ignore
/// let path = BundleBuilder::new("com.example.notes")
///     .with_application(".NotesApp")
///     .with_main_component(".MainScreen")
///     .with_string("title", "Notes")
///     .write_to(dir.path(), "notes.mhb");
/// ```
#[derive(Debug, Clone)]
pub struct BundleBuilder {
    package: String,
    version: Option<String>,
    application: Option<String>,
    theme: Option<String>,
    code: bool,
    components: Vec<ComponentDescriptor>,
    files: Vec<(String, Vec<u8>)>,
    raw_manifest: Option<String>,
    gzip: bool,
}

impl BundleBuilder {
    /// A bundle for `package` with no code and no components.
    #[must_use]
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            version: Some("1.0.0".to_string()),
            application: None,
            theme: None,
            code: false,
            components: Vec::new(),
            files: Vec::new(),
            raw_manifest: None,
            gzip: false,
        }
    }

    /// Set the package version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Declare the entry class.
    #[must_use]
    pub fn with_application(mut self, class_name: impl Into<String>) -> Self {
        self.application = Some(class_name.into());
        self
    }

    /// Declare the application theme.
    #[must_use]
    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = Some(theme.into());
        self
    }

    /// Declare a `[code]` table.
    ///
    /// No module file is written; pair this with an in-process backend.
    #[must_use]
    pub fn with_code(mut self) -> Self {
        self.code = true;
        self
    }

    /// Declare a standard component.
    #[must_use]
    pub fn with_component(self, class_name: impl Into<String>) -> Self {
        self.with_component_descriptor(ComponentDescriptor::new(class_name))
    }

    /// Declare the main component.
    #[must_use]
    pub fn with_main_component(self, class_name: impl Into<String>) -> Self {
        let mut descriptor = ComponentDescriptor::new(class_name);
        descriptor.main = true;
        self.with_component_descriptor(descriptor)
    }

    /// Declare a component with a launch mode and optional theme.
    #[must_use]
    pub fn with_component_mode(
        self,
        class_name: impl Into<String>,
        launch_mode: LaunchMode,
        theme: Option<&str>,
    ) -> Self {
        let mut descriptor = ComponentDescriptor::new(class_name);
        descriptor.launch_mode = launch_mode;
        descriptor.theme = theme.map(str::to_string);
        self.with_component_descriptor(descriptor)
    }

    /// Declare a fully specified component.
    #[must_use]
    pub fn with_component_descriptor(mut self, descriptor: ComponentDescriptor) -> Self {
        self.components.push(descriptor);
        self
    }

    /// Add an arbitrary archive entry.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        self.files.push((path.into(), contents.into()));
        self
    }

    /// Add a resource file under `res/values[-qualifiers]/`.
    #[must_use]
    pub fn with_resources(self, qualifiers: &str, file_name: &str, toml: &str) -> Self {
        let dir = if qualifiers.is_empty() {
            "values".to_string()
        } else {
            format!("values-{qualifiers}")
        };
        self.with_file(format!("res/{dir}/{file_name}"), toml.as_bytes().to_vec())
    }

    /// Add an unqualified string resource.
    #[must_use]
    pub fn with_string(self, name: &str, value: &str) -> Self {
        let file_name = format!("{name}.toml");
        self.with_resources("", &file_name, &format!("[string]\n{name} = {value:?}\n"))
    }

    /// Add an asset.
    #[must_use]
    pub fn with_asset(self, name: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.with_file(format!("assets/{name}"), contents)
    }

    /// Add a native library under `lib/`.
    #[must_use]
    pub fn with_native_lib(self, file_name: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.with_file(format!("lib/{file_name}"), contents)
    }

    /// Use `manifest` verbatim instead of the generated one.
    #[must_use]
    pub fn with_raw_manifest(mut self, manifest: impl Into<String>) -> Self {
        self.raw_manifest = Some(manifest.into());
        self
    }

    /// Gzip the archive.
    #[must_use]
    pub fn gzip(mut self) -> Self {
        self.gzip = true;
        self
    }

    /// The manifest text that will be written.
    #[must_use]
    pub fn manifest_toml(&self) -> String {
        if let Some(raw) = &self.raw_manifest {
            return raw.clone();
        }

        let mut out = String::new();
        let _ = writeln!(out, "[package]\nname = {:?}", self.package);
        if let Some(version) = &self.version {
            let _ = writeln!(out, "version = {version:?}");
        }
        if self.application.is_some() || self.theme.is_some() {
            out.push_str("\n[application]\n");
            if let Some(class) = &self.application {
                let _ = writeln!(out, "class = {class:?}");
            }
            if let Some(theme) = &self.theme {
                let _ = writeln!(out, "theme = {theme:?}");
            }
        }
        if self.code {
            out.push_str("\n[code]\n");
        }
        for component in &self.components {
            let _ = writeln!(out, "\n[[component]]\nclass = {:?}", component.class_name);
            let mode = match component.launch_mode {
                LaunchMode::Standard => "standard",
                LaunchMode::SingleTop => "single-top",
                LaunchMode::SingleTask => "single-task",
                LaunchMode::SingleInstance => "single-instance",
            };
            let _ = writeln!(out, "launch-mode = {mode:?}");
            if let Some(theme) = &component.theme {
                let _ = writeln!(out, "theme = {theme:?}");
            }
            if let Some(label) = &component.label {
                let _ = writeln!(out, "label = {label:?}");
            }
            if component.main {
                out.push_str("main = true\n");
            }
        }
        out
    }

    /// The archive bytes.
    ///
    /// # Panics
    ///
    /// Panics if the in-memory archive cannot be written.
    #[must_use]
    pub fn bytes(&self) -> Vec<u8> {
        let manifest = self.manifest_toml();
        let entries = std::iter::once((MANIFEST_FILE_NAME, manifest.as_bytes()))
            .chain(self.files.iter().map(|(p, c)| (p.as_str(), c.as_slice())));

        if self.gzip {
            let encoder = GzEncoder::new(Vec::new(), Compression::default());
            let encoder = write_entries(tar::Builder::new(encoder), entries);
            encoder.finish().expect("failed to finish gzip stream")
        } else {
            write_entries(tar::Builder::new(Vec::new()), entries)
        }
    }

    /// Write the archive to `dir/file_name` and return its path.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    pub fn write_to(&self, dir: &Path, file_name: &str) -> PathBuf {
        let path = dir.join(file_name);
        std::fs::write(&path, self.bytes()).expect("failed to write bundle");
        path
    }
}

fn write_entries<'a, W: std::io::Write>(
    mut builder: tar::Builder<W>,
    entries: impl Iterator<Item = (&'a str, &'a [u8])>,
) -> W {
    for (path, contents) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        builder
            .append_data(&mut header, path, contents)
            .expect("failed to append bundle entry");
    }
    builder.into_inner().expect("failed to finish bundle archive")
}

/// Write a file that is not a bundle archive.
///
/// # Panics
///
/// Panics if the file cannot be written.
pub fn write_corrupt_bundle(dir: &Path, file_name: &str) -> PathBuf {
    let path = dir.join(file_name);
    std::fs::write(&path, b"this is not a tar archive").expect("failed to write bundle");
    path
}

/// Shared, ordered record of what test classes observed.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    /// An empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event.
    pub fn record(&self, event: impl Into<String>) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.into());
    }

    /// Snapshot of recorded events.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of recorded events equal to `event`.
    #[must_use]
    pub fn count(&self, event: &str) -> usize {
        self.entries().iter().filter(|e| *e == event).count()
    }
}

/// Entry object that records `create:<package>` and `terminate`.
#[derive(Debug, Clone)]
pub struct RecordingEntry {
    log: EventLog,
}

impl RecordingEntry {
    /// Record into `log`.
    #[must_use]
    pub fn new(log: EventLog) -> Self {
        Self { log }
    }
}

impl EntryObject for RecordingEntry {
    fn on_create(&self, context: &dyn Context) {
        self.log.record(format!("create:{}", context.package_name()));
    }

    fn on_terminate(&self) {
        self.log.record("terminate");
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Component that records `<class>:<event>:<context package>`.
#[derive(Debug, Clone)]
pub struct RecordingComponent {
    class_name: String,
    log: EventLog,
}

impl RecordingComponent {
    /// A component named `class_name` recording into `log`.
    #[must_use]
    pub fn new(class_name: impl Into<String>, log: EventLog) -> Self {
        Self {
            class_name: class_name.into(),
            log,
        }
    }

    /// Class the component was created for.
    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }
}

impl Component for RecordingComponent {
    fn on_lifecycle(&mut self, event: LifecycleEvent, context: &dyn Context) {
        self.log.record(format!(
            "{}:{event}:{}",
            self.class_name,
            context.package_name()
        ));
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// An entry class constructing a [`RecordingEntry`].
#[must_use]
pub fn recording_entry_class(name: impl Into<String>, log: &EventLog) -> Class {
    let log = log.clone();
    Class::entry(name, move || {
        Ok(Box::new(RecordingEntry::new(log.clone())) as Box<dyn EntryObject>)
    })
}

/// A component class constructing a [`RecordingComponent`].
#[must_use]
pub fn recording_component_class(name: impl Into<String>, log: &EventLog) -> Class {
    let name = name.into();
    let log = log.clone();
    Class::component(name.clone(), move || {
        Ok(Box::new(RecordingComponent::new(name.clone(), log.clone())) as Box<dyn Component>)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use modhost_runtime::BundleManifest;
    use modhost_runtime::archive::BundleArchive;

    #[test]
    fn generated_manifest_parses() {
        let builder = BundleBuilder::new("com.example.notes")
            .with_application(".NotesApp")
            .with_theme("Theme.Light")
            .with_code()
            .with_main_component(".Main")
            .with_component_mode(".Popup", LaunchMode::SingleTop, Some("Theme.Dialog"));

        let manifest = BundleManifest::parse(&builder.manifest_toml()).unwrap();
        assert_eq!(manifest.package_name(), "com.example.notes");
        assert_eq!(manifest.entry_class_name(), "com.example.notes.NotesApp");
        assert!(manifest.code.is_some());
        assert_eq!(
            manifest.main_component().unwrap().class_name,
            "com.example.notes.Main"
        );
        let popup = manifest.find_component(".Popup").unwrap();
        assert_eq!(popup.launch_mode, LaunchMode::SingleTop);
        assert_eq!(popup.theme.as_deref(), Some("Theme.Dialog"));
    }

    #[test]
    fn written_bundles_open_as_archives() {
        let dir = tempfile::tempdir().unwrap();
        for (name, builder) in [
            ("plain.mhb", BundleBuilder::new("a.b")),
            ("packed.mhb", BundleBuilder::new("a.b").gzip()),
        ] {
            let path = builder
                .with_asset("readme.txt", b"hi".to_vec())
                .write_to(dir.path(), name);
            let archive = BundleArchive::open(&path).unwrap();
            assert!(archive.contains(MANIFEST_FILE_NAME));
            assert_eq!(archive.entry("assets/readme.txt"), Some(&b"hi"[..]));
        }
    }

    #[test]
    fn event_log_counts() {
        let log = EventLog::new();
        log.record("a");
        log.record("b");
        log.record("a");
        assert_eq!(log.count("a"), 2);
        assert_eq!(log.entries().len(), 3);
    }
}
