//! The plugin manager: install pipeline, registry ownership and launches.
//!
//! ```text
//! install(source)
//!   └─ stage ─ open archive ─ resolve manifest ─ build namespace
//!        ─ make entry ─ attach context ─ on_create ─ registry.install
//!
//! launch(from, request)
//!   └─ registry.get ─ resolve component ─ select proxy ─ tag payload
//!        ─ from.start_component
//! ```

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::archive::BundleArchive;
use crate::bundle::BundleDescriptor;
use crate::code::{CodeBackend, WasmCodeBackend};
use crate::context::{Context, PluginContext};
use crate::dispatch::{
    self, ComponentSelector, DefaultSelector, LaunchPayload, LaunchRequest,
};
use crate::entry::{make_entry, panic_message};
use crate::error::{RuntimeError, RuntimeResult};
use crate::host::{Host, current_thread_label};
use crate::instrumentation::{LifecycleCallback, install_hook};
use crate::manifest::{ManifestResolver, TomlManifestResolver};
use crate::namespace::loader::{ClassLoader, system_class_loader};
use crate::namespace::{NamespaceRequest, build_namespace};
use crate::registry::PluginRegistry;
use crate::storage::{BundleStorage, FreshnessVerifier, SizeVerifier};

/// Default name of the private storage directory.
pub const DEFAULT_STORAGE_DIR: &str = "plugins";

/// Default bundle file extension used by directory installs.
pub const DEFAULT_BUNDLE_EXTENSION: &str = "mhb";

static DEFAULT_INSTANCE: OnceLock<Arc<PluginManager>> = OnceLock::new();

/// Configures and builds a [`PluginManager`].
///
/// Every extension point has a default:
///
/// | Setting | Default |
/// |---------|---------|
/// | storage directory | [`DEFAULT_STORAGE_DIR`] |
/// | bundle extension | [`DEFAULT_BUNDLE_EXTENSION`] |
/// | freshness verifier | [`SizeVerifier`] |
/// | parent class loader | [`system_class_loader`] |
/// | component selector | [`DefaultSelector`] |
/// | lifecycle callback | none |
/// | manifest resolver | [`TomlManifestResolver`] |
/// | code backend | [`WasmCodeBackend`] |
pub struct PluginManagerBuilder {
    host: Arc<dyn Host>,
    storage_dir_name: String,
    bundle_extension: String,
    verifier: Arc<dyn FreshnessVerifier>,
    parent_loader: Option<Arc<dyn ClassLoader>>,
    selector: Arc<dyn ComponentSelector>,
    lifecycle_callback: Option<Arc<dyn LifecycleCallback>>,
    manifest_resolver: Arc<dyn ManifestResolver>,
    code_backend: Arc<dyn CodeBackend>,
}

impl fmt::Debug for PluginManagerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginManagerBuilder")
            .field("storage_dir_name", &self.storage_dir_name)
            .field("bundle_extension", &self.bundle_extension)
            .field("has_parent_loader", &self.parent_loader.is_some())
            .field("has_lifecycle_callback", &self.lifecycle_callback.is_some())
            .finish_non_exhaustive()
    }
}

impl PluginManagerBuilder {
    /// Start configuring a manager for `host`.
    #[must_use]
    pub fn new(host: Arc<dyn Host>) -> Self {
        Self {
            host,
            storage_dir_name: DEFAULT_STORAGE_DIR.to_string(),
            bundle_extension: DEFAULT_BUNDLE_EXTENSION.to_string(),
            verifier: Arc::new(SizeVerifier),
            parent_loader: None,
            selector: Arc::new(DefaultSelector),
            lifecycle_callback: None,
            manifest_resolver: Arc::new(TomlManifestResolver),
            code_backend: Arc::new(WasmCodeBackend::new()),
        }
    }

    /// Name of the host private directory bundles are staged into.
    #[must_use]
    pub fn with_storage_dir(mut self, name: impl Into<String>) -> Self {
        self.storage_dir_name = name.into();
        self
    }

    /// File extension (without dot) that directory installs pick up.
    #[must_use]
    pub fn with_bundle_extension(mut self, extension: impl Into<String>) -> Self {
        let extension = extension.into();
        self.bundle_extension = extension.trim_start_matches('.').to_string();
        self
    }

    /// Policy that decides whether a staged copy can be reused.
    #[must_use]
    pub fn with_verifier(mut self, verifier: Arc<dyn FreshnessVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Parent of every bundle class loader.
    #[must_use]
    pub fn with_parent_loader(mut self, parent: Arc<dyn ClassLoader>) -> Self {
        self.parent_loader = Some(parent);
        self
    }

    /// Strategy that maps components to proxies.
    #[must_use]
    pub fn with_selector(mut self, selector: Arc<dyn ComponentSelector>) -> Self {
        self.selector = selector;
        self
    }

    /// Observer of plugin component lifecycle events.
    #[must_use]
    pub fn with_lifecycle_callback(mut self, callback: Arc<dyn LifecycleCallback>) -> Self {
        self.lifecycle_callback = Some(callback);
        self
    }

    /// Parser of bundle metadata.
    #[must_use]
    pub fn with_manifest_resolver(mut self, resolver: Arc<dyn ManifestResolver>) -> Self {
        self.manifest_resolver = resolver;
        self
    }

    /// Loader of bundle code modules.
    #[must_use]
    pub fn with_code_backend(mut self, backend: Arc<dyn CodeBackend>) -> Self {
        self.code_backend = backend;
        self
    }

    /// Build the manager and install the host hook.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::WrongThread`] off the host's control thread,
    /// before anything is touched, and [`RuntimeError::StorageIoFailed`] if
    /// the private storage directory cannot be created.
    pub fn build(self) -> RuntimeResult<PluginManager> {
        if !self.host.is_control_thread() {
            return Err(RuntimeError::WrongThread {
                thread: current_thread_label(),
            });
        }

        let root = self
            .host
            .private_dir(&self.storage_dir_name)
            .map_err(|source| RuntimeError::StorageIoFailed {
                path: PathBuf::from(&self.storage_dir_name),
                source,
            })?;

        let registry = Arc::new(PluginRegistry::new());
        install_hook(self.host.as_ref(), &registry, self.lifecycle_callback.clone());

        info!(
            storage = %root.display(),
            extension = %self.bundle_extension,
            "plugin manager initialized"
        );
        Ok(PluginManager {
            storage: BundleStorage::new(root, self.verifier),
            host: self.host,
            registry,
            bundle_extension: self.bundle_extension,
            parent_loader: self.parent_loader.unwrap_or_else(system_class_loader),
            selector: self.selector,
            manifest_resolver: self.manifest_resolver,
            code_backend: self.code_backend,
        })
    }
}

/// Loads bundles into the host and launches their components.
pub struct PluginManager {
    host: Arc<dyn Host>,
    storage: BundleStorage,
    registry: Arc<PluginRegistry>,
    bundle_extension: String,
    parent_loader: Arc<dyn ClassLoader>,
    selector: Arc<dyn ComponentSelector>,
    manifest_resolver: Arc<dyn ManifestResolver>,
    code_backend: Arc<dyn CodeBackend>,
}

impl fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginManager")
            .field("storage", &self.storage)
            .field("bundle_extension", &self.bundle_extension)
            .field("plugins", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl PluginManager {
    /// Start configuring a manager for `host`.
    #[must_use]
    pub fn builder(host: Arc<dyn Host>) -> PluginManagerBuilder {
        PluginManagerBuilder::new(host)
    }

    /// Build the process-wide default instance.
    ///
    /// A second call on the control thread logs and returns the existing
    /// instance without touching the host again.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::WrongThread`] off the host's control thread,
    /// whether or not an instance exists, and propagates
    /// [`PluginManagerBuilder::build`] failures.
    pub fn init(builder: PluginManagerBuilder) -> RuntimeResult<Arc<Self>> {
        if !builder.host.is_control_thread() {
            return Err(RuntimeError::WrongThread {
                thread: current_thread_label(),
            });
        }
        if let Some(existing) = DEFAULT_INSTANCE.get() {
            info!("plugin manager already initialized, ignoring init");
            return Ok(Arc::clone(existing));
        }
        let manager = Arc::new(builder.build()?);
        match Self::set_instance(Arc::clone(&manager)) {
            Ok(()) => Ok(manager),
            Err(RuntimeError::AlreadyInitialized) => {
                info!("plugin manager initialized concurrently, using existing instance");
                Self::instance()
            },
            Err(e) => Err(e),
        }
    }

    /// Publish `manager` as the default instance.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::AlreadyInitialized`] if a default instance
    /// exists.
    pub fn set_instance(manager: Arc<Self>) -> RuntimeResult<()> {
        DEFAULT_INSTANCE
            .set(manager)
            .map_err(|_| RuntimeError::AlreadyInitialized)
    }

    /// The default instance.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::NotInitialized`] before [`init`](Self::init).
    pub fn instance() -> RuntimeResult<Arc<Self>> {
        DEFAULT_INSTANCE
            .get()
            .cloned()
            .ok_or(RuntimeError::NotInitialized)
    }

    /// The registry of installed plugins.
    #[must_use]
    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// The host this manager serves.
    #[must_use]
    pub fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }

    /// Private storage root.
    #[must_use]
    pub fn storage_root(&self) -> &Path {
        self.storage.root()
    }

    /// Working directory of bundle `id`.
    #[must_use]
    pub fn plugin_base_dir(&self, id: &str) -> PathBuf {
        self.storage.base_dir(id)
    }

    /// Native library directory of bundle `id`.
    #[must_use]
    pub fn plugin_lib_dir(&self, id: &str) -> PathBuf {
        self.storage.lib_dir(id)
    }

    /// Whether a directory install would pick up `path`.
    #[must_use]
    pub fn accepts(&self, path: &Path) -> bool {
        path.is_file()
            && path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == self.bundle_extension)
    }

    /// Install a bundle file, or every bundle in a directory.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::BundleNotFound`] if `path` does not exist or a
    /// directory holds no bundles, and any single-bundle install error for a
    /// file.
    pub fn install(&self, path: &Path) -> RuntimeResult<Vec<Arc<BundleDescriptor>>> {
        if path.is_dir() {
            self.install_dir(path)
        } else if path.is_file() {
            Ok(vec![self.install_bundle(path, None, None)?])
        } else {
            Err(RuntimeError::BundleNotFound {
                path: path.to_path_buf(),
                reason: "no such file or directory".into(),
            })
        }
    }

    /// Install every bundle in `dir`.
    ///
    /// Bundles install one after another. A failing bundle is logged and
    /// skipped; the rest still install. Plugins already registered stay
    /// registered.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::BundleNotFound`] if `dir` cannot be listed or
    /// holds no file with the bundle extension.
    pub fn install_dir(&self, dir: &Path) -> RuntimeResult<Vec<Arc<BundleDescriptor>>> {
        let candidates = self.scan_dir(dir)?;
        if candidates.is_empty() {
            return Err(RuntimeError::BundleNotFound {
                path: dir.to_path_buf(),
                reason: format!("no .{} bundles in directory", self.bundle_extension),
            });
        }

        let total = candidates.len();
        let mut installed = Vec::with_capacity(total);
        for candidate in candidates {
            match self.install_bundle(&candidate, None, None) {
                Ok(descriptor) => installed.push(descriptor),
                Err(e) => warn!(
                    bundle = %candidate.display(),
                    error = %e,
                    "skipping bundle that failed to install"
                ),
            }
        }
        info!(
            dir = %dir.display(),
            installed = installed.len(),
            total,
            "directory install finished"
        );
        Ok(installed)
    }

    fn scan_dir(&self, dir: &Path) -> RuntimeResult<Vec<PathBuf>> {
        let not_found = |reason: String| RuntimeError::BundleNotFound {
            path: dir.to_path_buf(),
            reason,
        };
        let entries = std::fs::read_dir(dir).map_err(|e| not_found(e.to_string()))?;
        let mut candidates: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| self.accepts(path))
            .collect();
        candidates.sort();
        Ok(candidates)
    }

    /// Install one bundle.
    ///
    /// `id` defaults to the source file name and determines the native
    /// library directory. `target_name` is the private file name, also
    /// defaulting to the source file name. Re-installing a package replaces
    /// its registry entry.
    ///
    /// # Errors
    ///
    /// Any pipeline stage failure. A panicking `on_create` is reported as
    /// [`RuntimeError::EntryInstantiationFailed`]. The registry is untouched
    /// on error.
    pub fn install_bundle(
        &self,
        source: &Path,
        id: Option<&str>,
        target_name: Option<&str>,
    ) -> RuntimeResult<Arc<BundleDescriptor>> {
        let staged = self.storage.stage(source, target_name)?;
        let id = match id {
            Some(id) => id.to_string(),
            None => source
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        debug!(bundle = %id, copied = staged.copied, "bundle staged");

        let manifest_err = |message: String| RuntimeError::ManifestResolution {
            path: staged.private_path.clone(),
            message,
        };
        let archive = Arc::new(
            BundleArchive::open(&staged.private_path).map_err(|e| manifest_err(e.to_string()))?,
        );
        let manifest = self
            .manifest_resolver
            .resolve(&archive)
            .map_err(manifest_err)?;
        let package = manifest.package_name().to_string();

        let host_context = self.host.application_context();
        let host_resources = host_context.resources();
        let library_dir = self.storage.lib_dir(&id);
        let namespace = build_namespace(NamespaceRequest {
            manifest: &manifest,
            archive,
            library_dir: library_dir.clone(),
            parent: Arc::clone(&self.parent_loader),
            backend: self.code_backend.as_ref(),
            host_resources: &host_resources,
        })?;

        let entry = make_entry(&package, &manifest, namespace.class_loader.as_ref())?;
        let context = Arc::new(PluginContext::new(
            &package,
            host_context,
            Arc::clone(&namespace.resources),
            Arc::clone(&namespace.class_loader) as Arc<dyn ClassLoader>,
        ));
        entry
            .attach_base_context(Arc::clone(&context) as Arc<dyn Context>)
            .map_err(|message| RuntimeError::EntryInstantiationFailed {
                package: package.clone(),
                class_name: entry.class_name().to_string(),
                message,
            })?;
        panic::catch_unwind(AssertUnwindSafe(|| entry.object().on_create(context.as_ref())))
            .map_err(|payload| RuntimeError::EntryInstantiationFailed {
                package: package.clone(),
                class_name: entry.class_name().to_string(),
                message: panic_message("on_create", payload.as_ref()),
            })?;

        let descriptor = Arc::new(BundleDescriptor {
            id,
            private_path: staged.private_path,
            library_dir,
            class_loader: namespace.class_loader,
            resources: namespace.resources,
            entry,
            manifest,
            context,
            installed_at: Utc::now(),
        });

        if let Some(replaced) = self.registry.install(Arc::clone(&descriptor)) {
            terminate(&replaced);
        }
        info!(
            package = %package,
            bundle = %descriptor.id(),
            components = descriptor.manifest().components.len(),
            "plugin installed"
        );
        Ok(descriptor)
    }

    /// Remove a plugin and terminate its entry object.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::PluginNotFound`] if `package` is not installed.
    pub fn uninstall(&self, package: &str) -> RuntimeResult<Arc<BundleDescriptor>> {
        let removed = self
            .registry
            .remove(package)
            .ok_or_else(|| RuntimeError::PluginNotFound(package.to_string()))?;
        terminate(&removed);
        info!(package, "plugin uninstalled");
        Ok(removed)
    }

    /// Remove every plugin.
    pub fn uninstall_all(&self) -> Vec<Arc<BundleDescriptor>> {
        let removed = self.registry.clear();
        for descriptor in &removed {
            terminate(descriptor);
        }
        info!(count = removed.len(), "all plugins uninstalled");
        removed
    }

    /// Look up an installed plugin.
    #[must_use]
    pub fn find_plugin(&self, package: &str) -> Option<Arc<BundleDescriptor>> {
        self.registry.get(package)
    }

    /// Look up an installed plugin, failing if it is absent.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::PluginNotFound`].
    pub fn try_get_plugin(&self, package: &str) -> RuntimeResult<Arc<BundleDescriptor>> {
        self.find_plugin(package)
            .ok_or_else(|| RuntimeError::PluginNotFound(package.to_string()))
    }

    /// Snapshot of installed plugins, sorted by package name.
    #[must_use]
    pub fn plugins(&self) -> Vec<Arc<BundleDescriptor>> {
        self.registry.list()
    }

    /// Launch a plugin component through a host proxy.
    ///
    /// Returns the payload handed to `from.start_component`.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::PluginNotFound`], [`RuntimeError::ComponentNotFound`],
    /// or [`RuntimeError::Dispatch`] if the host refuses the payload.
    pub fn launch(&self, from: &dyn Context, request: LaunchRequest) -> RuntimeResult<LaunchPayload> {
        let descriptor = self.try_get_plugin(&request.package_name)?;
        let component = dispatch::resolve_component(descriptor.manifest(), &request.target)?;
        let proxy = self.selector.select(component);
        let payload =
            dispatch::build_payload(descriptor.package_name(), component, proxy, request.extras);

        from.start_component(payload.clone())
            .map_err(|e| RuntimeError::Dispatch(e.to_string()))?;
        info!(
            package = %descriptor.package_name(),
            component = %component.class_name,
            proxy = %proxy,
            "launched plugin component"
        );
        Ok(payload)
    }

    /// Launch the main component of `package`.
    ///
    /// # Errors
    ///
    /// See [`launch`](Self::launch).
    pub fn start_main_component(&self, from: &dyn Context, package: &str) -> RuntimeResult<LaunchPayload> {
        self.launch(from, LaunchRequest::main(package))
    }

    /// Launch `class_name` of `package`.
    ///
    /// # Errors
    ///
    /// See [`launch`](Self::launch).
    pub fn start_component(
        &self,
        from: &dyn Context,
        package: &str,
        class_name: &str,
    ) -> RuntimeResult<LaunchPayload> {
        self.launch(from, LaunchRequest::component(package, class_name))
    }

    /// One-line summary of the installed plugins, also logged at info.
    pub fn dump(&self) -> String {
        let names = self.registry.package_names();
        let summary = format!("{} plugins loaded: [{}]", names.len(), names.join(", "));
        info!("{summary}");
        summary
    }
}

/// Run `on_terminate` of a removed bundle. A panic is logged, not propagated.
fn terminate(descriptor: &BundleDescriptor) {
    if let Err(payload) =
        panic::catch_unwind(AssertUnwindSafe(|| descriptor.entry().object().on_terminate()))
    {
        warn!(
            package = %descriptor.package_name(),
            error = %panic_message("on_terminate", payload.as_ref()),
            "plugin entry panicked while terminating"
        );
    }
}
