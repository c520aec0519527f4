//! Bundle manifest types and resolution.
//!
//! Every bundle carries a `plugin.toml` at the archive root:
//!
//! ```toml
//! [package]
//! name = "com.example.notes"
//! version = "1.2.0"
//!
//! [application]
//! class = ".NotesApp"
//!
//! [code]
//! path = "classes.wasm"
//! hash = "<blake3 hex>"
//!
//! [[component]]
//! class = ".MainScreen"
//! launch-mode = "single-top"
//! main = true
//! ```
//!
//! Class names starting with `.` are relative to the package name.

use serde::{Deserialize, Serialize};

use crate::archive::BundleArchive;
use crate::entry::DEFAULT_ENTRY_CLASS;

/// Manifest file name at the root of every bundle.
pub const MANIFEST_FILE_NAME: &str = "plugin.toml";

/// Code module path used when `[code]` omits `path`.
pub const DEFAULT_CODE_PATH: &str = "classes.wasm";

/// Parsed bundle manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleManifest {
    /// Package identity.
    pub package: PackageDef,
    /// Entry object declaration.
    #[serde(default)]
    pub application: ApplicationDef,
    /// Code module declaration. Bundles without code only carry resources.
    #[serde(default)]
    pub code: Option<CodeDef>,
    /// Declared launchable components.
    #[serde(default, rename = "component")]
    pub components: Vec<ComponentDescriptor>,
}

/// Package identity metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageDef {
    /// Globally unique package name.
    pub name: String,
    /// Version string.
    #[serde(default)]
    pub version: Option<String>,
    /// Human readable label.
    #[serde(default)]
    pub label: Option<String>,
}

/// The `[application]` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationDef {
    /// Entry class; the platform default entry is used when absent.
    #[serde(default, rename = "class")]
    pub class_name: Option<String>,
    /// Default theme for all components.
    #[serde(default)]
    pub theme: Option<String>,
}

/// The `[code]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeDef {
    /// Archive path of the code module.
    #[serde(default = "default_code_path")]
    pub path: String,
    /// Expected blake3 hex digest of the module.
    #[serde(default)]
    pub hash: Option<String>,
}

fn default_code_path() -> String {
    DEFAULT_CODE_PATH.to_string()
}

/// How the host should treat repeated launches of a component.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LaunchMode {
    /// A new instance per launch.
    #[default]
    Standard,
    /// Reuse the instance if it is already on top.
    SingleTop,
    /// At most one instance per task.
    SingleTask,
    /// At most one instance, alone in its task.
    SingleInstance,
}

/// A launchable component declared by a bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ComponentDescriptor {
    /// Fully qualified class name.
    #[serde(rename = "class")]
    pub class_name: String,
    /// Launch mode.
    #[serde(default)]
    pub launch_mode: LaunchMode,
    /// Component theme, overriding the application theme.
    #[serde(default)]
    pub theme: Option<String>,
    /// Human readable label.
    #[serde(default)]
    pub label: Option<String>,
    /// Whether this is the bundle's main entry component.
    #[serde(default)]
    pub main: bool,
}

impl ComponentDescriptor {
    /// A standard-mode component with no theme.
    #[must_use]
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            launch_mode: LaunchMode::Standard,
            theme: None,
            label: None,
            main: false,
        }
    }
}

impl BundleManifest {
    /// Parse and validate a manifest from TOML text.
    ///
    /// Relative class names are expanded and the application theme is
    /// inherited by components that do not set their own.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first syntax or validation problem.
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut manifest: Self = toml::from_str(text).map_err(|e| e.to_string())?;
        manifest.normalize();
        manifest.validate()?;
        Ok(manifest)
    }

    /// The package name.
    #[must_use]
    pub fn package_name(&self) -> &str {
        &self.package.name
    }

    /// Class name of the entry object.
    #[must_use]
    pub fn entry_class_name(&self) -> &str {
        self.application
            .class_name
            .as_deref()
            .unwrap_or(DEFAULT_ENTRY_CLASS)
    }

    /// Look up a declared component by class name.
    ///
    /// Relative names (leading `.`) are accepted.
    #[must_use]
    pub fn find_component(&self, class_name: &str) -> Option<&ComponentDescriptor> {
        let qualified = qualify(&self.package.name, class_name);
        self.components.iter().find(|c| c.class_name == qualified)
    }

    /// The component flagged `main`, if any.
    #[must_use]
    pub fn main_component(&self) -> Option<&ComponentDescriptor> {
        self.components.iter().find(|c| c.main)
    }

    fn normalize(&mut self) {
        let package = self.package.name.clone();
        if let Some(class) = self.application.class_name.as_mut() {
            *class = qualify(&package, class);
        }
        for component in &mut self.components {
            component.class_name = qualify(&package, &component.class_name);
            if component.theme.is_none() {
                component.theme.clone_from(&self.application.theme);
            }
        }
    }

    fn validate(&self) -> Result<(), String> {
        validate_package_name(&self.package.name)?;

        if let Some(class) = &self.application.class_name {
            if class.is_empty() {
                return Err("application class must not be empty".into());
            }
        }

        let mut seen = std::collections::HashSet::new();
        for component in &self.components {
            if component.class_name.is_empty() {
                return Err("component class must not be empty".into());
            }
            if !seen.insert(component.class_name.as_str()) {
                return Err(format!(
                    "component {} is declared more than once",
                    component.class_name
                ));
            }
        }

        let mains = self.components.iter().filter(|c| c.main).count();
        if mains > 1 {
            return Err(format!(
                "{mains} components are flagged main, at most one is allowed"
            ));
        }
        Ok(())
    }
}

fn qualify(package: &str, class_name: &str) -> String {
    if class_name.starts_with('.') {
        format!("{package}{class_name}")
    } else {
        class_name.to_string()
    }
}

fn validate_package_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("package name must not be empty".into());
    }
    if name.starts_with('.') || name.ends_with('.') {
        return Err(format!("invalid package name {name:?}: leading or trailing '.'"));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(format!("invalid package name {name:?}: character {bad:?}"));
    }
    Ok(())
}

/// Turns a bundle archive into a [`BundleManifest`].
pub trait ManifestResolver: Send + Sync {
    /// Resolve the manifest of `archive`.
    ///
    /// # Errors
    ///
    /// Returns a message if the metadata is missing or invalid.
    fn resolve(&self, archive: &BundleArchive) -> Result<BundleManifest, String>;
}

/// Default resolver: reads [`MANIFEST_FILE_NAME`] as TOML.
#[derive(Debug, Clone, Copy, Default)]
pub struct TomlManifestResolver;

impl ManifestResolver for TomlManifestResolver {
    fn resolve(&self, archive: &BundleArchive) -> Result<BundleManifest, String> {
        let bytes = archive
            .entry(MANIFEST_FILE_NAME)
            .ok_or_else(|| format!("{MANIFEST_FILE_NAME} is missing"))?;
        let text = std::str::from_utf8(bytes)
            .map_err(|e| format!("{MANIFEST_FILE_NAME} is not valid UTF-8: {e}"))?;
        BundleManifest::parse(text)
    }
}
