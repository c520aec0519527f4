//! In-process code backend.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use super::{CodeBackend, CodeModule, ModuleRequest, StaticModule};
use crate::namespace::loader::Class;

/// Serves classes registered ahead of time, keyed by package name.
///
/// Bundles that declare no `[code]` get an empty module. A bundle that
/// declares code but has nothing registered fails to load.
#[derive(Default)]
pub struct StaticCodeBackend {
    packages: RwLock<HashMap<String, Arc<StaticModule>>>,
}

impl std::fmt::Debug for StaticCodeBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let packages = self
            .packages
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("StaticCodeBackend")
            .field("packages", &packages.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl StaticCodeBackend {
    /// An empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the classes of `package`, replacing earlier registrations.
    pub fn register(&self, package: impl Into<String>, classes: impl IntoIterator<Item = Class>) {
        let package = package.into();
        let module = Arc::new(StaticModule::new(&package, classes));
        self.packages
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(package, module);
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with_package(self, package: impl Into<String>, classes: impl IntoIterator<Item = Class>) -> Self {
        self.register(package, classes);
        self
    }
}

impl CodeBackend for StaticCodeBackend {
    fn load(&self, request: &ModuleRequest<'_>) -> Result<Arc<dyn CodeModule>, String> {
        let registered = self
            .packages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(request.package_name)
            .cloned();

        match (registered, &request.manifest.code) {
            (Some(module), _) => {
                debug!(package = request.package_name, "serving registered classes");
                Ok(module)
            },
            (None, None) => Ok(Arc::new(StaticModule::empty())),
            (None, Some(code)) => Err(format!(
                "bundle declares code module {} but no classes are registered for {}",
                code.path, request.package_name
            )),
        }
    }
}
