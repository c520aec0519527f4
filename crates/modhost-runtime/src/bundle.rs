//! Installed bundle descriptors.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::context::PluginContext;
use crate::entry::PluginEntry;
use crate::manifest::BundleManifest;
use crate::namespace::loader::BundleClassLoader;
use crate::namespace::resources::Resources;

/// Everything the runtime knows about one installed bundle.
///
/// Descriptors are immutable once registered; a re-install replaces the
/// whole descriptor.
pub struct BundleDescriptor {
    pub(crate) id: String,
    pub(crate) private_path: PathBuf,
    pub(crate) library_dir: PathBuf,
    pub(crate) class_loader: Arc<BundleClassLoader>,
    pub(crate) resources: Arc<Resources>,
    pub(crate) entry: PluginEntry,
    pub(crate) manifest: BundleManifest,
    pub(crate) context: Arc<PluginContext>,
    pub(crate) installed_at: DateTime<Utc>,
}

impl BundleDescriptor {
    /// Bundle id, the private file name.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Registry key.
    #[must_use]
    pub fn package_name(&self) -> &str {
        self.manifest.package_name()
    }

    /// Path of the private copy.
    #[must_use]
    pub fn private_path(&self) -> &Path {
        &self.private_path
    }

    /// Native library search path.
    #[must_use]
    pub fn library_dir(&self) -> &Path {
        &self.library_dir
    }

    /// The bundle's isolated class loader.
    #[must_use]
    pub fn class_loader(&self) -> &Arc<BundleClassLoader> {
        &self.class_loader
    }

    /// The bundle's resource view.
    #[must_use]
    pub fn resources(&self) -> &Arc<Resources> {
        &self.resources
    }

    /// The bundle's entry object.
    #[must_use]
    pub fn entry(&self) -> &PluginEntry {
        &self.entry
    }

    /// The resolved manifest.
    #[must_use]
    pub fn manifest(&self) -> &BundleManifest {
        &self.manifest
    }

    /// The bundle-aware context attached to the entry object.
    #[must_use]
    pub fn context(&self) -> &Arc<PluginContext> {
        &self.context
    }

    /// When this descriptor was created.
    #[must_use]
    pub fn installed_at(&self) -> DateTime<Utc> {
        self.installed_at
    }
}

impl fmt::Debug for BundleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BundleDescriptor")
            .field("id", &self.id)
            .field("package_name", &self.package_name())
            .field("private_path", &self.private_path)
            .field("library_dir", &self.library_dir)
            .field("entry", &self.entry)
            .field("components", &self.manifest.components.len())
            .field("installed_at", &self.installed_at)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use super::BundleDescriptor;
    use crate::code::StaticModule;
    use crate::context::{Context, PluginContext, Service};
    use crate::dispatch::LaunchPayload;
    use crate::entry::{BaseEntry, DEFAULT_ENTRY_CLASS, PluginEntry};
    use crate::host::HostError;
    use crate::manifest::BundleManifest;
    use crate::namespace::loader::{BundleClassLoader, ClassLoader, system_class_loader};
    use crate::namespace::resources::Resources;

    struct NullContext;

    impl Context for NullContext {
        fn package_name(&self) -> &str {
            "host"
        }

        fn application_context(&self) -> Arc<dyn Context> {
            Arc::new(NullContext)
        }

        fn system_service(&self, _name: &str) -> Option<Service> {
            None
        }

        fn resources(&self) -> Arc<Resources> {
            Arc::new(Resources::host(Default::default(), Default::default()))
        }

        fn class_loader(&self) -> Arc<dyn ClassLoader> {
            system_class_loader()
        }

        fn start_component(&self, _payload: LaunchPayload) -> Result<(), HostError> {
            Ok(())
        }
    }

    /// A minimal registered-looking descriptor for `package`.
    pub(crate) fn descriptor(package: &str) -> Arc<BundleDescriptor> {
        let manifest = BundleManifest::parse(&format!("[package]\nname = \"{package}\"")).unwrap();
        let class_loader = Arc::new(BundleClassLoader::new(
            package,
            Arc::new(StaticModule::empty()),
            system_class_loader(),
            "/nowhere",
        ));
        let resources = Arc::new(Resources::host(Default::default(), Default::default()));
        let context = Arc::new(PluginContext::new(
            package,
            Arc::new(NullContext),
            Arc::clone(&resources),
            Arc::clone(&class_loader) as Arc<dyn ClassLoader>,
        ));
        Arc::new(BundleDescriptor {
            id: format!("{package}.mhb"),
            private_path: format!("/nowhere/{package}.mhb").into(),
            library_dir: "/nowhere/lib".into(),
            class_loader,
            resources,
            entry: PluginEntry::new(DEFAULT_ENTRY_CLASS, Box::new(BaseEntry)),
            manifest,
            context,
            installed_at: chrono::Utc::now(),
        })
    }
}
