//! Mock host implementations for testing.

use std::any::Any;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use modhost_runtime::context::Service;
use modhost_runtime::entry::BaseEntry;
use modhost_runtime::host::ControlThread;
use modhost_runtime::instrumentation::LifecycleCallback;
use modhost_runtime::namespace::loader::{Class, ClassLoader, StaticClassLoader, system_class_loader};
use modhost_runtime::namespace::resources::{Configuration, DisplayMetrics, Resources};
use modhost_runtime::{
    Component, Context, EntryObject, Host, HostError, Instrumentation, LaunchPayload,
    LifecycleEvent,
};
use tempfile::TempDir;

/// Package name of the mock host application.
pub const HOST_PACKAGE: &str = "modhost.host";

/// A component class the mock host can create on its own.
pub const HOST_COMPONENT_CLASS: &str = "modhost.host.HomeScreen";

/// An entry class only the host's class loader defines.
pub const HOST_ONLY_CLASS: &str = "modhost.host.Secret";

/// Name of the single system service the mock context offers.
pub const CLOCK_SERVICE: &str = "clock";

/// Class loader of the host application.
///
/// Defines [`HOST_ONLY_CLASS`] and [`HOST_COMPONENT_CLASS`] on top of the
/// system loader. Passing it as the parent loader makes host classes
/// visible to bundles.
#[must_use]
pub fn host_class_loader() -> Arc<dyn ClassLoader> {
    Arc::new(
        StaticClassLoader::new(HOST_PACKAGE)
            .with_class(Class::entry(HOST_ONLY_CLASS, || {
                Ok(Box::new(BaseEntry) as Box<dyn EntryObject>)
            }))
            .with_class(Class::component(HOST_COMPONENT_CLASS, || {
                Ok(Box::new(HostComponent::default()) as Box<dyn Component>)
            }))
            .with_parent(system_class_loader()),
    )
}

/// A host-native component that remembers its lifecycle.
#[derive(Debug, Default)]
pub struct HostComponent {
    events: Vec<LifecycleEvent>,
}

impl HostComponent {
    /// Events received so far.
    #[must_use]
    pub fn events(&self) -> &[LifecycleEvent] {
        &self.events
    }
}

impl Component for HostComponent {
    fn on_lifecycle(&mut self, event: LifecycleEvent, _context: &dyn Context) {
        self.events.push(event);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// The host's own instrumentation: knows only [`HOST_COMPONENT_CLASS`].
#[derive(Debug, Default)]
pub struct MockInstrumentation {
    created: AtomicUsize,
}

impl MockInstrumentation {
    /// Number of components this instrumentation created.
    #[must_use]
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl Instrumentation for MockInstrumentation {
    fn new_component(
        &self,
        class_name: &str,
        _payload: &LaunchPayload,
    ) -> Result<Box<dyn Component>, HostError> {
        if class_name == HOST_COMPONENT_CLASS {
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(HostComponent::default()))
        } else {
            Err(HostError::new(format!("no host component {class_name}")))
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// The host application context.
///
/// Records every payload handed to [`Context::start_component`] and can be
/// told to refuse them.
pub struct MockContext {
    resources: Arc<Resources>,
    class_loader: Arc<dyn ClassLoader>,
    services: HashMap<String, Service>,
    dispatched: Mutex<Vec<LaunchPayload>>,
    refuse: AtomicBool,
    this: Weak<MockContext>,
}

impl std::fmt::Debug for MockContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockContext")
            .field("dispatched", &self.dispatched().len())
            .finish_non_exhaustive()
    }
}

impl MockContext {
    /// A host context with the given display.
    #[must_use]
    pub fn new(metrics: DisplayMetrics, configuration: Configuration) -> Arc<Self> {
        let mut services: HashMap<String, Service> = HashMap::new();
        services.insert(CLOCK_SERVICE.to_string(), Arc::new("mock-clock".to_string()));
        Arc::new_cyclic(|this| Self {
            resources: Arc::new(Resources::host(metrics, configuration)),
            class_loader: host_class_loader(),
            services,
            dispatched: Mutex::new(Vec::new()),
            refuse: AtomicBool::new(false),
            this: this.clone(),
        })
    }

    /// Payloads dispatched so far.
    #[must_use]
    pub fn dispatched(&self) -> Vec<LaunchPayload> {
        self.dispatched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Make [`Context::start_component`] fail.
    pub fn refuse_dispatch(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }
}

impl Context for MockContext {
    fn package_name(&self) -> &str {
        HOST_PACKAGE
    }

    fn application_context(&self) -> Arc<dyn Context> {
        self.this.upgrade().expect("host context dropped")
    }

    fn system_service(&self, name: &str) -> Option<Service> {
        self.services.get(name).cloned()
    }

    fn resources(&self) -> Arc<Resources> {
        Arc::clone(&self.resources)
    }

    fn class_loader(&self) -> Arc<dyn ClassLoader> {
        Arc::clone(&self.class_loader)
    }

    fn start_component(&self, payload: LaunchPayload) -> Result<(), HostError> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(HostError::new(format!(
                "host refused to start {}",
                payload.component
            )));
        }
        self.dispatched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(payload);
        Ok(())
    }
}

/// An in-memory host process.
///
/// The thread that creates the host is its control thread. Private
/// directories live in a temporary directory removed on drop.
pub struct MockHost {
    control: ControlThread,
    storage: TempDir,
    context: Arc<MockContext>,
    base: Arc<MockInstrumentation>,
    instrumentation: RwLock<Arc<dyn Instrumentation>>,
    set_instrumentation_calls: AtomicUsize,
    fail_private_dir: AtomicBool,
}

impl std::fmt::Debug for MockHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockHost")
            .field("storage", &self.storage.path())
            .field("set_instrumentation_calls", &self.set_instrumentation_calls())
            .finish_non_exhaustive()
    }
}

impl MockHost {
    /// A host with the default display.
    ///
    /// # Panics
    ///
    /// Panics if the temporary storage directory cannot be created.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_display(DisplayMetrics::default(), Configuration::default())
    }

    /// A host with a specific display.
    ///
    /// # Panics
    ///
    /// Panics if the temporary storage directory cannot be created.
    #[must_use]
    pub fn with_display(metrics: DisplayMetrics, configuration: Configuration) -> Arc<Self> {
        let base = Arc::new(MockInstrumentation::default());
        Arc::new(Self {
            control: ControlThread::current(),
            storage: TempDir::new().expect("failed to create host storage"),
            context: MockContext::new(metrics, configuration),
            instrumentation: RwLock::new(Arc::clone(&base) as Arc<dyn Instrumentation>),
            base,
            set_instrumentation_calls: AtomicUsize::new(0),
            fail_private_dir: AtomicBool::new(false),
        })
    }

    /// The host application context.
    #[must_use]
    pub fn context(&self) -> &Arc<MockContext> {
        &self.context
    }

    /// The instrumentation the host started with.
    #[must_use]
    pub fn base_instrumentation(&self) -> &Arc<MockInstrumentation> {
        &self.base
    }

    /// Number of times the global instrumentation was replaced.
    #[must_use]
    pub fn set_instrumentation_calls(&self) -> usize {
        self.set_instrumentation_calls.load(Ordering::SeqCst)
    }

    /// Root of the host's private directories.
    #[must_use]
    pub fn storage_path(&self) -> &Path {
        self.storage.path()
    }

    /// Make [`Host::private_dir`] fail.
    pub fn fail_private_dir(&self, fail: bool) {
        self.fail_private_dir.store(fail, Ordering::SeqCst);
    }

    /// Do what the host does with a dispatched payload: create the component
    /// through the installed instrumentation, then drive it through `events`.
    ///
    /// # Errors
    ///
    /// Returns the instrumentation's refusal to create the component.
    pub fn run_component(
        &self,
        payload: &LaunchPayload,
        events: &[LifecycleEvent],
    ) -> Result<Box<dyn Component>, HostError> {
        let instrumentation = self.instrumentation();
        let mut component = instrumentation.new_component(&payload.component, payload)?;
        for event in events {
            instrumentation.call_lifecycle(component.as_mut(), *event, self.context.as_ref());
        }
        Ok(component)
    }
}

impl Host for MockHost {
    fn is_control_thread(&self) -> bool {
        self.control.is_current()
    }

    fn application_context(&self) -> Arc<dyn Context> {
        Arc::clone(&self.context) as Arc<dyn Context>
    }

    fn private_dir(&self, name: &str) -> io::Result<PathBuf> {
        if self.fail_private_dir.load(Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "private storage unavailable",
            ));
        }
        let path = self.storage.path().join(name);
        std::fs::create_dir_all(&path)?;
        Ok(path)
    }

    fn instrumentation(&self) -> Arc<dyn Instrumentation> {
        self.instrumentation
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_instrumentation(&self, instrumentation: Arc<dyn Instrumentation>) {
        self.set_instrumentation_calls.fetch_add(1, Ordering::SeqCst);
        *self
            .instrumentation
            .write()
            .unwrap_or_else(PoisonError::into_inner) = instrumentation;
    }
}

/// One observed lifecycle delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleRecord {
    /// Plugin package.
    pub package: String,
    /// Plugin component class.
    pub class_name: String,
    /// Delivered event.
    pub event: LifecycleEvent,
}

/// Lifecycle callback that records every delivery.
#[derive(Debug, Default)]
pub struct RecordingLifecycle {
    records: Mutex<Vec<LifecycleRecord>>,
}

impl RecordingLifecycle {
    /// An empty recorder.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Everything recorded so far.
    #[must_use]
    pub fn records(&self) -> Vec<LifecycleRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Events recorded for `class_name`, in order.
    #[must_use]
    pub fn events_for(&self, class_name: &str) -> Vec<LifecycleEvent> {
        self.records()
            .into_iter()
            .filter(|r| r.class_name == class_name)
            .map(|r| r.event)
            .collect()
    }
}

impl LifecycleCallback for RecordingLifecycle {
    fn on_lifecycle(&self, package: &str, class_name: &str, event: LifecycleEvent) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(LifecycleRecord {
                package: package.to_string(),
                class_name: class_name.to_string(),
                event,
            });
    }
}
