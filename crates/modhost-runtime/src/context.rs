//! Execution contexts.
//!
//! A [`Context`] is what host-facing code runs against: it hands out system
//! services, resources, the class loader, and can launch components. The
//! [`PluginContext`] wraps the host's application context for one bundle.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::dispatch::LaunchPayload;
use crate::host::HostError;
use crate::namespace::loader::ClassLoader;
use crate::namespace::resources::Resources;

/// A host-provided service, downcast by the caller.
pub type Service = Arc<dyn Any + Send + Sync>;

/// An execution context.
pub trait Context: Send + Sync {
    /// Package this context belongs to.
    fn package_name(&self) -> &str;

    /// The application-wide context.
    fn application_context(&self) -> Arc<dyn Context>;

    /// Look up a named system service.
    fn system_service(&self, name: &str) -> Option<Service>;

    /// Resources visible from this context.
    fn resources(&self) -> Arc<Resources>;

    /// Class loader used for lookups from this context.
    fn class_loader(&self) -> Arc<dyn ClassLoader>;

    /// Hand a launch payload to the host's native dispatch.
    ///
    /// # Errors
    ///
    /// Returns the host's refusal.
    fn start_component(&self, payload: LaunchPayload) -> Result<(), HostError>;

    /// Raw bytes of an asset, resolved through [`resources`](Self::resources).
    fn open_asset(&self, name: &str) -> Option<Vec<u8>> {
        self.resources().open_asset(name).map(<[u8]>::to_vec)
    }
}

/// A bundle-aware context.
///
/// System services, the application context and component launches go to
/// the host context it wraps. Resources, assets and class lookups are
/// answered from the bundle's own namespace.
pub struct PluginContext {
    package_name: String,
    base: Arc<dyn Context>,
    resources: Arc<Resources>,
    class_loader: Arc<dyn ClassLoader>,
}

impl fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginContext")
            .field("package_name", &self.package_name)
            .field("base", &self.base.package_name())
            .field("class_loader", &self.class_loader.name())
            .finish_non_exhaustive()
    }
}

impl PluginContext {
    /// Wrap `base` for the bundle `package_name`.
    #[must_use]
    pub fn new(
        package_name: impl Into<String>,
        base: Arc<dyn Context>,
        resources: Arc<Resources>,
        class_loader: Arc<dyn ClassLoader>,
    ) -> Self {
        Self {
            package_name: package_name.into(),
            base,
            resources,
            class_loader,
        }
    }

    /// The wrapped host context.
    #[must_use]
    pub fn base(&self) -> &Arc<dyn Context> {
        &self.base
    }
}

impl Context for PluginContext {
    fn package_name(&self) -> &str {
        &self.package_name
    }

    fn application_context(&self) -> Arc<dyn Context> {
        self.base.application_context()
    }

    fn system_service(&self, name: &str) -> Option<Service> {
        self.base.system_service(name)
    }

    fn resources(&self) -> Arc<Resources> {
        Arc::clone(&self.resources)
    }

    fn class_loader(&self) -> Arc<dyn ClassLoader> {
        Arc::clone(&self.class_loader)
    }

    fn start_component(&self, payload: LaunchPayload) -> Result<(), HostError> {
        self.base.start_component(payload)
    }
}
