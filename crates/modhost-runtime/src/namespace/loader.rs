//! Class loaders and the classes they define.
//!
//! A [`Class`] is a named constructor. Loaders form a parent chain: a
//! [`BundleClassLoader`] answers from its bundle's code module first and only
//! then asks its parent. The default parent is the [`system_class_loader`],
//! which defines the platform classes and nothing from the host application.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use crate::code::CodeModule;
use crate::component::Component;
use crate::entry::{BaseEntry, DEFAULT_ENTRY_CLASS, EntryObject};

use super::natives;

/// Constructor of an entry object.
pub type EntryConstructor = Arc<dyn Fn() -> Result<Box<dyn EntryObject>, String> + Send + Sync>;

/// Constructor of a launchable component.
pub type ComponentConstructor =
    Arc<dyn Fn() -> Result<Box<dyn Component>, String> + Send + Sync>;

/// What a class constructs.
#[derive(Clone)]
pub enum ClassKind {
    /// A bundle entry object.
    Entry(EntryConstructor),
    /// A launchable component.
    Component(ComponentConstructor),
}

/// A named, constructible class.
#[derive(Clone)]
pub struct Class {
    name: String,
    defined_by: String,
    kind: ClassKind,
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ClassKind::Entry(_) => "entry",
            ClassKind::Component(_) => "component",
        };
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("defined_by", &self.defined_by)
            .field("kind", &kind)
            .finish()
    }
}

impl Class {
    /// An entry class.
    pub fn entry<F>(name: impl Into<String>, ctor: F) -> Self
    where
        F: Fn() -> Result<Box<dyn EntryObject>, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            defined_by: String::new(),
            kind: ClassKind::Entry(Arc::new(ctor)),
        }
    }

    /// A component class.
    pub fn component<F>(name: impl Into<String>, ctor: F) -> Self
    where
        F: Fn() -> Result<Box<dyn Component>, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            defined_by: String::new(),
            kind: ClassKind::Component(Arc::new(ctor)),
        }
    }

    /// Record the loader that defines this class.
    #[must_use]
    pub fn with_definer(mut self, loader_name: impl Into<String>) -> Self {
        self.defined_by = loader_name.into();
        self
    }

    /// Fully qualified class name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the loader that defines this class.
    #[must_use]
    pub fn defining_loader(&self) -> &str {
        &self.defined_by
    }

    /// What this class constructs.
    #[must_use]
    pub fn kind(&self) -> &ClassKind {
        &self.kind
    }

    /// Construct an entry object.
    ///
    /// # Errors
    ///
    /// Fails if this is not an entry class or its constructor fails.
    pub fn new_entry(&self) -> Result<Box<dyn EntryObject>, String> {
        match &self.kind {
            ClassKind::Entry(ctor) => ctor(),
            ClassKind::Component(_) => Err(format!("{} is not an entry class", self.name)),
        }
    }

    /// Construct a component.
    ///
    /// # Errors
    ///
    /// Fails if this is not a component class or its constructor fails.
    pub fn new_component(&self) -> Result<Box<dyn Component>, String> {
        match &self.kind {
            ClassKind::Component(ctor) => ctor(),
            ClassKind::Entry(_) => Err(format!("{} is not a component class", self.name)),
        }
    }
}

/// A namespace that resolves class names and native libraries.
pub trait ClassLoader: Send + Sync {
    /// Loader name, recorded on the classes it defines.
    fn name(&self) -> &str;

    /// Classes defined by this loader itself.
    fn find_class(&self, name: &str) -> Option<Arc<Class>>;

    /// The loader consulted when this one does not define a class.
    fn parent(&self) -> Option<&Arc<dyn ClassLoader>> {
        None
    }

    /// Resolve a native library by its short name.
    fn find_library(&self, _name: &str) -> Option<PathBuf> {
        None
    }

    /// Resolve a class: own definitions first, then the parent chain.
    fn load_class(&self, name: &str) -> Option<Arc<Class>> {
        self.find_class(name)
            .or_else(|| self.parent().and_then(|parent| parent.load_class(name)))
    }
}

/// A loader backed by a fixed class table.
pub struct StaticClassLoader {
    name: String,
    classes: HashMap<String, Arc<Class>>,
    parent: Option<Arc<dyn ClassLoader>>,
}

impl StaticClassLoader {
    /// An empty loader without a parent.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            classes: HashMap::new(),
            parent: None,
        }
    }

    /// Define a class in this loader.
    #[must_use]
    pub fn with_class(mut self, class: Class) -> Self {
        let class = class.with_definer(self.name.clone());
        self.classes.insert(class.name.clone(), Arc::new(class));
        self
    }

    /// Set the parent loader.
    #[must_use]
    pub fn with_parent(mut self, parent: Arc<dyn ClassLoader>) -> Self {
        self.parent = Some(parent);
        self
    }
}

impl ClassLoader for StaticClassLoader {
    fn name(&self) -> &str {
        &self.name
    }

    fn find_class(&self, name: &str) -> Option<Arc<Class>> {
        self.classes.get(name).cloned()
    }

    fn parent(&self) -> Option<&Arc<dyn ClassLoader>> {
        self.parent.as_ref()
    }
}

/// Name of the system class loader.
pub const SYSTEM_LOADER_NAME: &str = "system";

/// The platform loader: defines only the platform classes.
///
/// Host application classes are not visible through it, so bundles whose
/// loader uses it as parent cannot link against host internals.
#[must_use]
pub fn system_class_loader() -> Arc<dyn ClassLoader> {
    static SYSTEM: OnceLock<Arc<dyn ClassLoader>> = OnceLock::new();
    Arc::clone(SYSTEM.get_or_init(|| {
        Arc::new(
            StaticClassLoader::new(SYSTEM_LOADER_NAME).with_class(Class::entry(
                DEFAULT_ENTRY_CLASS,
                || Ok(Box::new(BaseEntry) as Box<dyn EntryObject>),
            )),
        )
    }))
}

/// Isolated loader of one bundle.
pub struct BundleClassLoader {
    package: String,
    module: Arc<dyn CodeModule>,
    parent: Arc<dyn ClassLoader>,
    library_dir: PathBuf,
}

impl fmt::Debug for BundleClassLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BundleClassLoader")
            .field("package", &self.package)
            .field("parent", &self.parent.name())
            .field("library_dir", &self.library_dir)
            .finish_non_exhaustive()
    }
}

impl BundleClassLoader {
    /// Create the loader of `package` over `module`.
    #[must_use]
    pub fn new(
        package: impl Into<String>,
        module: Arc<dyn CodeModule>,
        parent: Arc<dyn ClassLoader>,
        library_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            package: package.into(),
            module,
            parent,
            library_dir: library_dir.into(),
        }
    }

    /// Native library search path.
    #[must_use]
    pub fn library_dir(&self) -> &Path {
        &self.library_dir
    }

    /// Class names defined by the bundle itself.
    #[must_use]
    pub fn class_names(&self) -> Vec<String> {
        self.module.class_names()
    }
}

impl ClassLoader for BundleClassLoader {
    fn name(&self) -> &str {
        &self.package
    }

    fn find_class(&self, name: &str) -> Option<Arc<Class>> {
        self.module.find_class(name)
    }

    fn parent(&self) -> Option<&Arc<dyn ClassLoader>> {
        Some(&self.parent)
    }

    fn find_library(&self, name: &str) -> Option<PathBuf> {
        natives::find_library(&self.library_dir, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::StaticModule;

    fn host_loader() -> Arc<dyn ClassLoader> {
        Arc::new(
            StaticClassLoader::new("host")
                .with_class(Class::entry("host.Secret", || Ok(Box::new(BaseEntry))))
                .with_parent(system_class_loader()),
        )
    }

    fn bundle_loader(parent: Arc<dyn ClassLoader>) -> BundleClassLoader {
        let module = StaticModule::new(
            "com.example",
            vec![Class::entry("com.example.App", || Ok(Box::new(BaseEntry)))],
        );
        BundleClassLoader::new("com.example", Arc::new(module), parent, "/nowhere")
    }

    #[test]
    fn system_loader_defines_default_entry() {
        let system = system_class_loader();
        let class = system.load_class(DEFAULT_ENTRY_CLASS).unwrap();
        assert_eq!(class.defining_loader(), SYSTEM_LOADER_NAME);
        assert!(class.new_entry().is_ok());
        assert!(class.new_component().is_err());
    }

    #[test]
    fn bundle_classes_resolve_first() {
        let loader = bundle_loader(system_class_loader());
        let class = loader.load_class("com.example.App").unwrap();
        assert_eq!(class.defining_loader(), "com.example");
        assert_eq!(loader.class_names(), vec!["com.example.App".to_string()]);
    }

    #[test]
    fn host_classes_hidden_behind_system_parent() {
        let isolated = bundle_loader(system_class_loader());
        assert!(isolated.load_class("host.Secret").is_none());
        assert!(isolated.load_class(DEFAULT_ENTRY_CLASS).is_some());

        let shared = bundle_loader(host_loader());
        let class = shared.load_class("host.Secret").unwrap();
        assert_eq!(class.defining_loader(), "host");
    }
}
