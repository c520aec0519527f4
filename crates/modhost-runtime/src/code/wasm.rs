//! WASM code backend built on extism.
//!
//! A bundle's code module is a WASM plugin exporting:
//!
//! - `describe-classes`: returns a JSON array of
//!   `{"name": "<class>", "kind": "entry" | "component"}`.
//! - `entry-event` (optional): receives `{"class", "event", "package"}` for
//!   entry objects, with `event` one of `create` and `terminate`.
//! - `component-lifecycle` (optional): receives `{"class", "event",
//!   "package"}` for components, with the lowercase lifecycle event name.
//!
//! The bundle's native library directory is mounted at `/lib` and the host
//! configuration is exposed as plugin config keys.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use extism::{Manifest, PluginBuilder, Wasm};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{CodeBackend, CodeModule, ModuleRequest, StaticModule};
use crate::component::{Component, LifecycleEvent};
use crate::context::Context;
use crate::entry::EntryObject;
use crate::namespace::loader::Class;

/// Default maximum WASM linear memory: 64 MB.
const DEFAULT_MAX_MEMORY_BYTES: u64 = 64 * 1024 * 1024;

/// Default maximum execution time per call: 30 seconds.
const DEFAULT_MAX_EXECUTION_TIME: Duration = Duration::from_secs(30);

const WASM_PAGE_BYTES: u64 = 64 * 1024;

const DESCRIBE_CLASSES: &str = "describe-classes";
const ENTRY_EVENT: &str = "entry-event";
const COMPONENT_LIFECYCLE: &str = "component-lifecycle";

/// Guest mount point of the bundle's native library directory.
const GUEST_LIB_DIR: &str = "/lib";

type SharedPlugin = Arc<Mutex<extism::Plugin>>;

/// Loads bundle code as extism WASM plugins.
///
/// # Example
///
/// ```rust,no_run
/// use modhost_runtime::code::WasmCodeBackend;
/// use std::time::Duration;
///
/// let backend = WasmCodeBackend::new()
///     .with_memory_limit(32 * 1024 * 1024)
///     .with_timeout(Duration::from_secs(10))
///     .with_require_hash(true);
/// ```
#[derive(Debug, Clone)]
pub struct WasmCodeBackend {
    max_memory_bytes: u64,
    max_execution_time: Duration,
    require_hash: bool,
}

impl Default for WasmCodeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl WasmCodeBackend {
    /// Create a backend with default settings (64 MB memory, 30s timeout).
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_memory_bytes: DEFAULT_MAX_MEMORY_BYTES,
            max_execution_time: DEFAULT_MAX_EXECUTION_TIME,
            require_hash: false,
        }
    }

    /// Set the maximum WASM linear memory in bytes.
    #[must_use]
    pub fn with_memory_limit(mut self, bytes: u64) -> Self {
        self.max_memory_bytes = bytes;
        self
    }

    /// Set the maximum execution time per WASM call.
    #[must_use]
    pub fn with_timeout(mut self, duration: Duration) -> Self {
        self.max_execution_time = duration;
        self
    }

    /// Refuse code modules whose manifest entry carries no hash.
    #[must_use]
    pub fn with_require_hash(mut self, require: bool) -> Self {
        self.require_hash = require;
        self
    }

    /// Get the configured memory limit.
    #[must_use]
    pub fn max_memory_bytes(&self) -> u64 {
        self.max_memory_bytes
    }

    /// Get the configured execution timeout.
    #[must_use]
    pub fn max_execution_time(&self) -> Duration {
        self.max_execution_time
    }

    fn build_plugin(&self, bytes: &[u8], request: &ModuleRequest<'_>) -> Result<extism::Plugin, String> {
        let pages = self.max_memory_bytes / WASM_PAGE_BYTES;
        let max_pages = u32::try_from(pages).unwrap_or(u32::MAX);

        let manifest = Manifest::new([Wasm::data(bytes.to_vec())])
            .with_timeout(self.max_execution_time)
            .with_memory_max(max_pages)
            .with_allowed_path(request.library_dir.display().to_string(), GUEST_LIB_DIR)
            .with_config_key("package", request.package_name)
            .with_config_key("locale", request.configuration.locale.as_str())
            .with_config_key("orientation", request.configuration.orientation.to_string());

        PluginBuilder::new(manifest)
            .with_wasi(true)
            .build()
            .map_err(|e| format!("failed to build WASM plugin: {e}"))
    }
}

impl CodeBackend for WasmCodeBackend {
    fn load(&self, request: &ModuleRequest<'_>) -> Result<Arc<dyn CodeModule>, String> {
        let Some(code) = &request.manifest.code else {
            debug!(package = request.package_name, "bundle declares no code module");
            return Ok(Arc::new(StaticModule::empty()));
        };

        let bytes = request
            .archive
            .entry(&code.path)
            .ok_or_else(|| format!("code module {} is missing from the bundle", code.path))?;
        verify_hash(bytes, code.hash.as_deref(), request.package_name, self.require_hash)?;

        let mut plugin = self.build_plugin(bytes, request)?;
        let descriptions = describe_classes(&mut plugin)?;
        let plugin: SharedPlugin = Arc::new(Mutex::new(plugin));

        let classes = descriptions
            .into_iter()
            .map(|desc| wasm_class(request.package_name, desc, &plugin));
        debug!(package = request.package_name, "loaded WASM code module");
        Ok(Arc::new(StaticModule::new(request.package_name, classes)))
    }
}

/// Verify a module against the blake3 digest from its manifest.
fn verify_hash(
    bytes: &[u8],
    expected: Option<&str>,
    package: &str,
    require_hash: bool,
) -> Result<(), String> {
    match expected {
        Some(expected_hex) => {
            let actual_hex = blake3::hash(bytes).to_hex().to_string();
            if !actual_hex.eq_ignore_ascii_case(expected_hex) {
                return Err(format!(
                    "code module hash mismatch: expected {expected_hex}, got {actual_hex}"
                ));
            }
            debug!(package, "code module hash verified");
        },
        None if require_hash => {
            return Err("code module hash required but not specified in manifest".into());
        },
        None => {
            warn!(package, "code module hash not specified, module integrity not verified");
        },
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum GuestClassKind {
    Entry,
    Component,
}

#[derive(Debug, Clone, Deserialize)]
struct GuestClass {
    name: String,
    kind: GuestClassKind,
}

#[derive(Debug, Serialize)]
struct GuestEvent<'a> {
    class: &'a str,
    event: &'a str,
    package: &'a str,
}

fn describe_classes(plugin: &mut extism::Plugin) -> Result<Vec<GuestClass>, String> {
    let result = plugin
        .call::<&str, String>(DESCRIBE_CLASSES, "")
        .map_err(|e| format!("{DESCRIBE_CLASSES} call failed: {e}"))?;
    serde_json::from_str(&result).map_err(|e| format!("failed to parse {DESCRIBE_CLASSES} output: {e}"))
}

fn wasm_class(package: &str, desc: GuestClass, plugin: &SharedPlugin) -> Class {
    let target = GuestTarget {
        package: package.to_string(),
        class: desc.name.clone(),
        plugin: Arc::clone(plugin),
    };
    match desc.kind {
        GuestClassKind::Entry => Class::entry(desc.name, move || {
            Ok(Box::new(WasmEntry {
                target: target.clone(),
            }) as Box<dyn EntryObject>)
        }),
        GuestClassKind::Component => Class::component(desc.name, move || {
            Ok(Box::new(WasmComponent {
                target: target.clone(),
            }) as Box<dyn Component>)
        }),
    }
}

/// A guest class together with the plugin instance that defines it.
#[derive(Clone)]
struct GuestTarget {
    package: String,
    class: String,
    plugin: SharedPlugin,
}

impl GuestTarget {
    /// Deliver `event` through `export` if the guest provides it.
    fn notify(&self, export: &str, event: &str) {
        let mut plugin = self.plugin.lock().unwrap_or_else(PoisonError::into_inner);
        if !plugin.function_exists(export) {
            return;
        }
        let payload = GuestEvent {
            class: &self.class,
            event,
            package: &self.package,
        };
        let input = match serde_json::to_string(&payload) {
            Ok(input) => input,
            Err(e) => {
                warn!(class = %self.class, error = %e, "failed to encode guest event");
                return;
            },
        };
        if let Err(e) = plugin.call::<&str, String>(export, &input) {
            warn!(
                package = %self.package,
                class = %self.class,
                export,
                event,
                error = %e,
                "guest call failed"
            );
        }
    }
}

struct WasmEntry {
    target: GuestTarget,
}

impl EntryObject for WasmEntry {
    fn on_create(&self, _context: &dyn Context) {
        self.target.notify(ENTRY_EVENT, "create");
    }

    fn on_terminate(&self) {
        self.target.notify(ENTRY_EVENT, "terminate");
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct WasmComponent {
    target: GuestTarget,
}

impl Component for WasmComponent {
    fn on_lifecycle(&mut self, event: LifecycleEvent, _context: &dyn Context) {
        self.target.notify(COMPONENT_LIFECYCLE, event.as_str());
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
