//! The host instrumentation hook.
//!
//! The host creates every component and drives its lifecycle through one
//! global [`Instrumentation`]. The plugin manager wraps whatever is installed
//! with a [`PluginInstrumentation`] so that proxy launches carrying a plugin
//! tag are served by the plugin's own class instead of the proxy class.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use tracing::{debug, info};

use crate::component::{Component, LifecycleEvent};
use crate::context::Context;
use crate::dispatch::LaunchPayload;
use crate::entry::panic_message;
use crate::host::{Host, HostError};
use crate::namespace::loader::ClassLoader;
use crate::registry::PluginRegistry;

/// The host's component factory and lifecycle driver.
pub trait Instrumentation: Send + Sync {
    /// Instantiate the component `class_name` for `payload`.
    ///
    /// # Errors
    ///
    /// Returns an error if the class is unknown or fails to construct.
    fn new_component(
        &self,
        class_name: &str,
        payload: &LaunchPayload,
    ) -> Result<Box<dyn Component>, HostError>;

    /// Deliver a lifecycle event to `component`.
    fn call_lifecycle(
        &self,
        component: &mut dyn Component,
        event: LifecycleEvent,
        context: &dyn Context,
    ) {
        component.on_lifecycle(event, context);
    }

    /// Type tag used to detect an already installed hook.
    fn as_any(&self) -> &dyn Any;
}

/// Observer of lifecycle events delivered to plugin components.
pub trait LifecycleCallback: Send + Sync {
    /// `class_name` of `package` received `event`.
    fn on_lifecycle(&self, package: &str, class_name: &str, event: LifecycleEvent);
}

impl<F> LifecycleCallback for F
where
    F: Fn(&str, &str, LifecycleEvent) + Send + Sync,
{
    fn on_lifecycle(&self, package: &str, class_name: &str, event: LifecycleEvent) {
        self(package, class_name, event);
    }
}

struct Binding {
    registry: Weak<PluginRegistry>,
    callback: Option<Arc<dyn LifecycleCallback>>,
}

/// Plugin-aware wrapper around the host's instrumentation.
///
/// One wrapper serves every plugin manager in the process: each manager binds
/// its registry, and tagged payloads are resolved against the bound
/// registries in binding order.
pub struct PluginInstrumentation {
    base: Arc<dyn Instrumentation>,
    bindings: RwLock<Vec<Binding>>,
}

impl fmt::Debug for PluginInstrumentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginInstrumentation")
            .field("bindings", &self.binding_count())
            .finish_non_exhaustive()
    }
}

impl PluginInstrumentation {
    /// Wrap `base`.
    #[must_use]
    pub fn new(base: Arc<dyn Instrumentation>) -> Self {
        Self {
            base,
            bindings: RwLock::new(Vec::new()),
        }
    }

    /// The wrapped host instrumentation.
    #[must_use]
    pub fn base(&self) -> &Arc<dyn Instrumentation> {
        &self.base
    }

    /// Serve plugins from `registry`, notifying `callback` of their
    /// lifecycle. Binding the same registry again replaces its callback.
    pub fn bind(&self, registry: &Arc<PluginRegistry>, callback: Option<Arc<dyn LifecycleCallback>>) {
        let mut bindings = self.bindings.write().unwrap_or_else(PoisonError::into_inner);
        bindings.retain(|b| b.registry.strong_count() > 0);
        let weak = Arc::downgrade(registry);
        if let Some(existing) = bindings.iter_mut().find(|b| b.registry.ptr_eq(&weak)) {
            existing.callback = callback;
        } else {
            bindings.push(Binding {
                registry: weak,
                callback,
            });
        }
    }

    /// Number of live registry bindings.
    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|b| b.registry.strong_count() > 0)
            .count()
    }

    fn new_plugin_component(
        &self,
        proxy_class: &str,
        package: &str,
        class_name: &str,
    ) -> Result<Box<dyn Component>, HostError> {
        let (descriptor, callback) = {
            let bindings = self.bindings.read().unwrap_or_else(PoisonError::into_inner);
            bindings
                .iter()
                .find_map(|b| {
                    let descriptor = b.registry.upgrade()?.get(package)?;
                    Some((descriptor, b.callback.clone()))
                })
                .ok_or_else(|| HostError::new(format!("plugin {package} is not installed")))?
        };

        let class = descriptor
            .class_loader()
            .load_class(class_name)
            .ok_or_else(|| {
                HostError::new(format!("class {class_name} not found in plugin {package}"))
            })?;
        let inner = panic::catch_unwind(AssertUnwindSafe(|| class.new_component()))
            .map_err(|payload| HostError::new(panic_message("constructor", payload.as_ref())))?
            .map_err(|e| HostError::new(format!("failed to create {class_name}: {e}")))?;

        debug!(package, class = class_name, proxy = proxy_class, "created plugin component");
        Ok(Box::new(PluginComponent {
            package: package.to_string(),
            class_name: class_name.to_string(),
            proxy_class: proxy_class.to_string(),
            context: Arc::clone(descriptor.context()) as Arc<dyn Context>,
            inner,
            callback,
        }))
    }
}

impl Instrumentation for PluginInstrumentation {
    fn new_component(
        &self,
        class_name: &str,
        payload: &LaunchPayload,
    ) -> Result<Box<dyn Component>, HostError> {
        match payload.plugin_target() {
            Some(target) => {
                self.new_plugin_component(class_name, &target.package_name, &target.class_name)
            },
            None => self.base.new_component(class_name, payload),
        }
    }

    fn call_lifecycle(
        &self,
        component: &mut dyn Component,
        event: LifecycleEvent,
        context: &dyn Context,
    ) {
        if let Some(plugin) = component.as_any_mut().downcast_mut::<PluginComponent>() {
            plugin.deliver(event);
        } else {
            self.base.call_lifecycle(component, event, context);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A plugin component running inside a host proxy.
///
/// Lifecycle events reach the plugin's class with the plugin's own context,
/// whatever context the host passes.
pub struct PluginComponent {
    package: String,
    class_name: String,
    proxy_class: String,
    context: Arc<dyn Context>,
    inner: Box<dyn Component>,
    callback: Option<Arc<dyn LifecycleCallback>>,
}

impl fmt::Debug for PluginComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginComponent")
            .field("package", &self.package)
            .field("class_name", &self.class_name)
            .field("proxy_class", &self.proxy_class)
            .finish_non_exhaustive()
    }
}

impl PluginComponent {
    /// Owning plugin package.
    #[must_use]
    pub fn package(&self) -> &str {
        &self.package
    }

    /// Plugin class of the component.
    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Host proxy class the component runs in.
    #[must_use]
    pub fn proxy_class(&self) -> &str {
        &self.proxy_class
    }

    /// The plugin context events are delivered with.
    #[must_use]
    pub fn context(&self) -> &Arc<dyn Context> {
        &self.context
    }

    /// The plugin's component object.
    #[must_use]
    pub fn inner(&self) -> &dyn Component {
        self.inner.as_ref()
    }

    fn deliver(&mut self, event: LifecycleEvent) {
        self.inner.on_lifecycle(event, self.context.as_ref());
        if let Some(callback) = &self.callback {
            callback.on_lifecycle(&self.package, &self.class_name, event);
        }
    }
}

impl Component for PluginComponent {
    fn on_lifecycle(&mut self, event: LifecycleEvent, _context: &dyn Context) {
        self.deliver(event);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Make sure the host's instrumentation is a [`PluginInstrumentation`]
/// serving `registry`.
///
/// The host instrumentation is wrapped at most once per process. Returns
/// `true` if this call installed the wrapper.
pub fn install_hook(
    host: &dyn Host,
    registry: &Arc<PluginRegistry>,
    callback: Option<Arc<dyn LifecycleCallback>>,
) -> bool {
    let current = host.instrumentation();
    if let Some(existing) = current.as_any().downcast_ref::<PluginInstrumentation>() {
        existing.bind(registry, callback);
        debug!("plugin instrumentation already installed, bound registry");
        return false;
    }

    let wrapper = PluginInstrumentation::new(current);
    wrapper.bind(registry, callback);
    host.set_instrumentation(Arc::new(wrapper));
    info!("installed plugin instrumentation hook");
    true
}
