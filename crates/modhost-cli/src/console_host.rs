//! A terminal-backed host process.
//!
//! The CLI has no real component framework behind it, so this host prints
//! what a real one would act on: every payload handed to native dispatch and
//! every lifecycle event driven through the instrumentation.

use std::any::Any;
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use modhost_runtime::context::Service;
use modhost_runtime::host::ControlThread;
use modhost_runtime::namespace::loader::{ClassLoader, system_class_loader};
use modhost_runtime::namespace::resources::{Configuration, DisplayMetrics, Resources};
use modhost_runtime::{
    Component, Context, Host, HostError, Instrumentation, LaunchPayload, LifecycleEvent,
    ProxyComponentId,
};
use tracing::debug;

/// Package name the console host reports for itself.
pub(crate) const HOST_PACKAGE: &str = "modhost.cli";

/// System service exposing the host's name as a `String`.
pub(crate) const HOST_NAME_SERVICE: &str = "host.name";

struct ContextState {
    resources: Arc<Resources>,
    class_loader: Arc<dyn ClassLoader>,
    services: HashMap<String, Service>,
    dispatched: Mutex<Vec<LaunchPayload>>,
}

/// The host application context.
///
/// Clones share one dispatch queue.
#[derive(Clone)]
pub(crate) struct ConsoleContext {
    state: Arc<ContextState>,
}

impl ConsoleContext {
    fn new(metrics: DisplayMetrics, configuration: Configuration) -> Self {
        let mut services: HashMap<String, Service> = HashMap::new();
        services.insert(
            HOST_NAME_SERVICE.to_string(),
            Arc::new(HOST_PACKAGE.to_string()),
        );
        Self {
            state: Arc::new(ContextState {
                resources: Arc::new(Resources::host(metrics, configuration)),
                class_loader: system_class_loader(),
                services,
                dispatched: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Take every payload dispatched since the last call.
    pub(crate) fn take_dispatched(&self) -> Vec<LaunchPayload> {
        std::mem::take(
            &mut *self
                .state
                .dispatched
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }
}

impl Context for ConsoleContext {
    fn package_name(&self) -> &str {
        HOST_PACKAGE
    }

    fn application_context(&self) -> Arc<dyn Context> {
        Arc::new(self.clone())
    }

    fn system_service(&self, name: &str) -> Option<Service> {
        self.state.services.get(name).cloned()
    }

    fn resources(&self) -> Arc<Resources> {
        Arc::clone(&self.state.resources)
    }

    fn class_loader(&self) -> Arc<dyn ClassLoader> {
        Arc::clone(&self.state.class_loader)
    }

    fn start_component(&self, payload: LaunchPayload) -> Result<(), HostError> {
        if payload.proxy().is_none() {
            return Err(HostError::new(format!(
                "{} is not a component of {HOST_PACKAGE}",
                payload.component
            )));
        }
        debug!(component = %payload.component, "payload accepted");
        self.state
            .dispatched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(payload);
        Ok(())
    }
}

/// Stand-in for a proxy launched without a plugin tag.
#[derive(Debug)]
struct ProxyShell {
    proxy: ProxyComponentId,
}

impl Component for ProxyShell {
    fn on_lifecycle(&mut self, event: LifecycleEvent, _context: &dyn Context) {
        debug!(proxy = %self.proxy, %event, "empty proxy lifecycle");
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// The host's own instrumentation. It knows the proxy components and
/// nothing else.
#[derive(Debug, Default)]
struct ConsoleInstrumentation;

impl Instrumentation for ConsoleInstrumentation {
    fn new_component(
        &self,
        class_name: &str,
        _payload: &LaunchPayload,
    ) -> Result<Box<dyn Component>, HostError> {
        ProxyComponentId::from_class_name(class_name)
            .map(|proxy| Box::new(ProxyShell { proxy }) as Box<dyn Component>)
            .ok_or_else(|| HostError::new(format!("unknown component {class_name}")))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// The CLI process seen as a host.
pub(crate) struct ConsoleHost {
    control: ControlThread,
    storage_root: PathBuf,
    context: ConsoleContext,
    instrumentation: RwLock<Arc<dyn Instrumentation>>,
}

impl ConsoleHost {
    /// A host whose private directories live under `storage_root`.
    pub(crate) fn new(
        storage_root: impl Into<PathBuf>,
        metrics: DisplayMetrics,
        configuration: Configuration,
    ) -> Arc<Self> {
        Arc::new(Self {
            control: ControlThread::current(),
            storage_root: storage_root.into(),
            context: ConsoleContext::new(metrics, configuration),
            instrumentation: RwLock::new(Arc::new(ConsoleInstrumentation) as Arc<dyn Instrumentation>),
        })
    }

    /// The host application context.
    pub(crate) fn context(&self) -> &ConsoleContext {
        &self.context
    }

    /// Create the component `payload` names and drive it through `events`,
    /// the way the host's component framework would.
    ///
    /// # Errors
    ///
    /// Returns the instrumentation's refusal to create the component.
    pub(crate) fn run_component(
        &self,
        payload: &LaunchPayload,
        events: &[LifecycleEvent],
    ) -> Result<Box<dyn Component>, HostError> {
        let instrumentation = self.instrumentation();
        let mut component = instrumentation.new_component(&payload.component, payload)?;
        for event in events {
            instrumentation.call_lifecycle(component.as_mut(), *event, &self.context);
        }
        Ok(component)
    }
}

impl Host for ConsoleHost {
    fn is_control_thread(&self) -> bool {
        self.control.is_current()
    }

    fn application_context(&self) -> Arc<dyn Context> {
        Arc::new(self.context.clone())
    }

    fn private_dir(&self, name: &str) -> io::Result<PathBuf> {
        let path = self.storage_root.join(name);
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
        *self
            .instrumentation
            .write()
            .unwrap_or_else(PoisonError::into_inner) = instrumentation;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> (tempfile::TempDir, Arc<ConsoleHost>) {
        let dir = tempfile::tempdir().unwrap();
        let host = ConsoleHost::new(
            dir.path(),
            DisplayMetrics::default(),
            Configuration::default(),
        );
        (dir, host)
    }

    #[test]
    fn private_dir_is_created_under_root() {
        let (dir, host) = host();
        let path = host.private_dir("plugins").unwrap();
        assert_eq!(path, dir.path().join("plugins"));
        assert!(path.is_dir());
    }

    #[test]
    fn only_proxies_are_dispatched() {
        let (_dir, host) = host();
        let ctx = host.context();
        assert!(ctx.start_component(LaunchPayload::new("some.Other")).is_err());
        ctx.start_component(LaunchPayload::new(ProxyComponentId::SingleTop.class_name()))
            .unwrap();

        let dispatched = ctx.take_dispatched();
        assert_eq!(dispatched.len(), 1);
        assert!(ctx.take_dispatched().is_empty());
    }

    #[test]
    fn untagged_proxy_runs_on_base_instrumentation() {
        let (_dir, host) = host();
        let payload = LaunchPayload::new(ProxyComponentId::Standard.class_name());
        let component = host
            .run_component(&payload, &LifecycleEvent::FULL_CYCLE)
            .unwrap();
        assert!(component.as_any().downcast_ref::<ProxyShell>().is_some());

        assert!(
            host.run_component(&LaunchPayload::new("nope"), &[])
                .is_err()
        );
    }

    #[test]
    fn application_context_shares_state() {
        let (_dir, host) = host();
        let app = Host::application_context(host.as_ref());
        app.start_component(LaunchPayload::new(ProxyComponentId::Translucent.class_name()))
            .unwrap();
        assert_eq!(host.context().take_dispatched().len(), 1);

        let name = app
            .system_service(HOST_NAME_SERVICE)
            .and_then(|s| s.downcast::<String>().ok())
            .unwrap();
        assert_eq!(name.as_str(), HOST_PACKAGE);
    }
}
