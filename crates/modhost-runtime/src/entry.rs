//! Bundle entry objects.
//!
//! Every installed bundle gets exactly one entry object, constructed from the
//! manifest's application class (or [`DEFAULT_ENTRY_CLASS`]) through the
//! bundle's own class loader. Its execution context is attached once, right
//! after construction.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};

use crate::context::Context;
use crate::error::{RuntimeError, RuntimeResult};
use crate::manifest::BundleManifest;
use crate::namespace::loader::ClassLoader;

/// Platform entry class used when a manifest names none.
pub const DEFAULT_ENTRY_CLASS: &str = "modhost.app.Application";

/// Behaviour of a bundle's entry object.
pub trait EntryObject: Send + Sync {
    /// Called once the plugin context is attached.
    fn on_create(&self, _context: &dyn Context) {}

    /// Called when the bundle is uninstalled.
    fn on_terminate(&self) {}

    /// Downcast support.
    fn as_any(&self) -> &dyn Any;
}

/// The platform default entry. Does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaseEntry;

impl EntryObject for BaseEntry {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An entry object plus its once-settable execution context.
pub struct PluginEntry {
    class_name: String,
    object: Box<dyn EntryObject>,
    base: OnceLock<Arc<dyn Context>>,
}

impl fmt::Debug for PluginEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginEntry")
            .field("class_name", &self.class_name)
            .field("attached", &self.is_attached())
            .finish_non_exhaustive()
    }
}

impl PluginEntry {
    /// Wrap a constructed entry object.
    #[must_use]
    pub fn new(class_name: impl Into<String>, object: Box<dyn EntryObject>) -> Self {
        Self {
            class_name: class_name.into(),
            object,
            base: OnceLock::new(),
        }
    }

    /// Entry class name.
    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// The entry object.
    #[must_use]
    pub fn object(&self) -> &dyn EntryObject {
        self.object.as_ref()
    }

    /// Attach the execution context.
    ///
    /// # Errors
    ///
    /// Returns a message if a context is already attached.
    pub fn attach_base_context(&self, context: Arc<dyn Context>) -> Result<(), String> {
        self.base
            .set(context)
            .map_err(|_| format!("base context of {} is already attached", self.class_name))
    }

    /// The attached context, if any.
    #[must_use]
    pub fn base_context(&self) -> Option<&Arc<dyn Context>> {
        self.base.get()
    }

    /// Whether a context has been attached.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.base.get().is_some()
    }
}

/// Load and construct the entry object of `package`.
///
/// Constructor panics are caught and reported like any other failure.
///
/// # Errors
///
/// Returns [`RuntimeError::EntryInstantiationFailed`] if the class cannot be
/// found, is not an entry class, or its constructor fails.
pub fn make_entry(
    package: &str,
    manifest: &BundleManifest,
    loader: &dyn ClassLoader,
) -> RuntimeResult<PluginEntry> {
    let class_name = manifest.entry_class_name();
    let failed = |message: String| RuntimeError::EntryInstantiationFailed {
        package: package.to_string(),
        class_name: class_name.to_string(),
        message,
    };

    let class = loader
        .load_class(class_name)
        .ok_or_else(|| failed("class not found".into()))?;

    let object = panic::catch_unwind(AssertUnwindSafe(|| class.new_entry()))
        .map_err(|payload| failed(panic_message("constructor", payload.as_ref())))?
        .map_err(failed)?;

    Ok(PluginEntry::new(class_name, object))
}

/// Describe a caught panic raised while running `stage`.
pub(crate) fn panic_message(stage: &str, payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("{stage} panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("{stage} panicked: {s}")
    } else {
        format!("{stage} panicked")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::loader::{Class, StaticClassLoader, system_class_loader};

    fn manifest(class: Option<&str>) -> BundleManifest {
        let app = class.map_or(String::new(), |c| format!("[application]\nclass = \"{c}\"\n"));
        BundleManifest::parse(&format!("[package]\nname = \"a.b\"\n{app}")).unwrap()
    }

    fn loader() -> StaticClassLoader {
        StaticClassLoader::new("a.b")
            .with_class(Class::entry("a.b.Boom", || panic!("boom")))
            .with_class(Class::entry("a.b.Refuse", || Err("nope".to_string())))
            .with_class(Class::component("a.b.Screen", || Err("unused".to_string())))
            .with_parent(system_class_loader())
    }

    #[test]
    fn default_entry_comes_from_system_loader() {
        let entry = make_entry("a.b", &manifest(None), &loader()).unwrap();
        assert_eq!(entry.class_name(), DEFAULT_ENTRY_CLASS);
        assert!(entry.object().as_any().is::<BaseEntry>());
        assert!(!entry.is_attached());
    }

    #[test]
    fn missing_class_fails() {
        let err = make_entry("a.b", &manifest(Some(".Nope")), &loader()).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::EntryInstantiationFailed { ref class_name, .. } if class_name == "a.b.Nope"
        ));
    }

    #[test]
    fn constructor_panic_is_caught() {
        let err = make_entry("a.b", &manifest(Some(".Boom")), &loader()).unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn constructor_error_and_wrong_kind_fail() {
        assert!(make_entry("a.b", &manifest(Some(".Refuse")), &loader()).is_err());
        assert!(make_entry("a.b", &manifest(Some(".Screen")), &loader()).is_err());
    }
}
