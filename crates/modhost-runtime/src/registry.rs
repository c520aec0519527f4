//! Plugin registry for tracking installed bundles.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

use crate::bundle::BundleDescriptor;

/// Package name to descriptor map, safe to share between threads.
///
/// Readers always see a whole descriptor: entries are replaced, never
/// mutated in place. Re-installing a package replaces its entry.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugins: RwLock<HashMap<String, Arc<BundleDescriptor>>>,
}

impl PluginRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<BundleDescriptor>>> {
        self.plugins.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<BundleDescriptor>>> {
        self.plugins.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a descriptor, returning the one it replaces.
    pub fn install(&self, descriptor: Arc<BundleDescriptor>) -> Option<Arc<BundleDescriptor>> {
        let package = descriptor.package_name().to_string();
        let replaced = self.write().insert(package.clone(), descriptor);
        if replaced.is_some() {
            info!(package = %package, "replaced plugin");
        } else {
            info!(package = %package, "registered plugin");
        }
        replaced
    }

    /// Look up a plugin by package name.
    #[must_use]
    pub fn get(&self, package: &str) -> Option<Arc<BundleDescriptor>> {
        self.read().get(package).cloned()
    }

    /// Whether `package` is registered.
    #[must_use]
    pub fn contains(&self, package: &str) -> bool {
        self.read().contains_key(package)
    }

    /// Snapshot of all registered plugins, sorted by package name.
    #[must_use]
    pub fn list(&self) -> Vec<Arc<BundleDescriptor>> {
        let mut plugins: Vec<_> = self.read().values().cloned().collect();
        plugins.sort_by(|a, b| a.package_name().cmp(b.package_name()));
        plugins
    }

    /// Sorted package names.
    #[must_use]
    pub fn package_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Unregister a plugin.
    pub fn remove(&self, package: &str) -> Option<Arc<BundleDescriptor>> {
        let removed = self.write().remove(package);
        if removed.is_some() {
            debug!(package, "unregistered plugin");
        }
        removed
    }

    /// Unregister every plugin, returning what was removed.
    pub fn clear(&self) -> Vec<Arc<BundleDescriptor>> {
        let drained: Vec<_> = self.write().drain().map(|(_, d)| d).collect();
        debug!(count = drained.len(), "cleared registry");
        drained
    }

    /// Number of registered plugins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no plugins are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::testing::descriptor;

    #[test]
    fn install_and_get() {
        let registry = PluginRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.install(descriptor("a.b")).is_none());
        assert!(registry.contains("a.b"));
        assert_eq!(registry.get("a.b").unwrap().package_name(), "a.b");
        assert!(registry.get("x.y").is_none());
    }

    #[test]
    fn reinstall_replaces() {
        let registry = PluginRegistry::new();
        let first = descriptor("a.b");
        registry.install(Arc::clone(&first));
        let replaced = registry.install(descriptor("a.b")).unwrap();
        assert!(Arc::ptr_eq(&replaced, &first));
        assert_eq!(registry.len(), 1);
        assert!(!Arc::ptr_eq(&registry.get("a.b").unwrap(), &first));
    }

    #[test]
    fn list_is_sorted_snapshot() {
        let registry = PluginRegistry::new();
        registry.install(descriptor("c.c"));
        registry.install(descriptor("a.a"));
        registry.install(descriptor("b.b"));
        let snapshot = registry.list();
        registry.remove("b.b");

        let names: Vec<_> = snapshot.iter().map(|d| d.package_name().to_string()).collect();
        assert_eq!(names, vec!["a.a", "b.b", "c.c"]);
        assert_eq!(registry.package_names(), vec!["a.a", "c.c"]);
    }

    #[test]
    fn remove_and_clear() {
        let registry = PluginRegistry::new();
        registry.install(descriptor("a.a"));
        registry.install(descriptor("b.b"));
        assert!(registry.remove("a.a").is_some());
        assert!(registry.remove("a.a").is_none());
        assert_eq!(registry.clear().len(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn concurrent_installs_keep_one_entry_per_package() {
        let registry = Arc::new(PluginRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let package = if i < 4 { "low.pkg" } else { "high.pkg" };
                    for _ in 0..25 {
                        registry.install(descriptor(package));
                        assert!(registry.get(package).is_some());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.package_names(), vec!["high.pkg", "low.pkg"]);
    }
}
