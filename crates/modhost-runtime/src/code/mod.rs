//! Code modules: where a bundle's classes come from.
//!
//! A [`CodeBackend`] turns the code declared in a bundle manifest into a
//! [`CodeModule`] that the bundle's class loader consults. Two backends ship
//! with the runtime:
//!
//! - [`WasmCodeBackend`] loads the bundle's WASM module through extism.
//! - [`StaticCodeBackend`] serves classes registered in-process, per package.

mod static_backend;
mod wasm;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::archive::BundleArchive;
use crate::manifest::BundleManifest;
use crate::namespace::loader::Class;
use crate::namespace::resources::Configuration;

pub use static_backend::StaticCodeBackend;
pub use wasm::WasmCodeBackend;

/// Everything a backend may need to load one bundle's code.
#[derive(Debug, Clone, Copy)]
pub struct ModuleRequest<'a> {
    /// Package being loaded.
    pub package_name: &'a str,
    /// Its resolved manifest.
    pub manifest: &'a BundleManifest,
    /// The bundle archive.
    pub archive: &'a BundleArchive,
    /// Private native library directory.
    pub library_dir: &'a Path,
    /// Host configuration at load time.
    pub configuration: &'a Configuration,
}

/// The classes defined by one bundle.
pub trait CodeModule: Send + Sync {
    /// Look up a class defined by this module.
    fn find_class(&self, name: &str) -> Option<Arc<Class>>;

    /// Names of all classes defined by this module.
    fn class_names(&self) -> Vec<String>;
}

/// Produces code modules for bundles.
pub trait CodeBackend: Send + Sync {
    /// Load the code of the bundle described by `request`.
    ///
    /// # Errors
    ///
    /// Returns a message if the module is missing, corrupt or fails to
    /// initialize.
    fn load(&self, request: &ModuleRequest<'_>) -> Result<Arc<dyn CodeModule>, String>;
}

/// A module over a fixed set of classes.
#[derive(Debug, Default)]
pub struct StaticModule {
    classes: HashMap<String, Arc<Class>>,
}

impl StaticModule {
    /// Define `classes` on behalf of `package`.
    #[must_use]
    pub fn new(package: &str, classes: impl IntoIterator<Item = Class>) -> Self {
        let classes = classes
            .into_iter()
            .map(|class| {
                let class = class.with_definer(package);
                (class.name().to_string(), Arc::new(class))
            })
            .collect();
        Self { classes }
    }

    /// A module without classes.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

impl CodeModule for StaticModule {
    fn find_class(&self, name: &str) -> Option<Arc<Class>> {
        self.classes.get(name).cloned()
    }

    fn class_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.classes.keys().cloned().collect();
        names.sort_unstable();
        names
    }
}
