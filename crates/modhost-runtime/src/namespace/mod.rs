//! Per-bundle isolated namespaces.
//!
//! A namespace pairs an isolated class loader with a resource view merged
//! against the host's display configuration. Both live exactly as long as
//! the bundle they belong to.

pub mod loader;
pub mod natives;
pub mod resources;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::archive::BundleArchive;
use crate::code::{CodeBackend, ModuleRequest};
use crate::error::{NamespaceKind, RuntimeError, RuntimeResult};
use crate::manifest::BundleManifest;

use self::loader::{BundleClassLoader, ClassLoader};
use self::resources::{Resources, ResourceTable};

/// The isolated code and resource view of one bundle.
#[derive(Debug, Clone)]
pub struct Namespace {
    /// Bundle-private class loader.
    pub class_loader: Arc<BundleClassLoader>,
    /// Bundle resources resolved against the host configuration.
    pub resources: Arc<Resources>,
}

/// Inputs for [`build_namespace`].
pub(crate) struct NamespaceRequest<'a> {
    pub(crate) manifest: &'a BundleManifest,
    pub(crate) archive: Arc<BundleArchive>,
    pub(crate) library_dir: PathBuf,
    pub(crate) parent: Arc<dyn ClassLoader>,
    pub(crate) backend: &'a dyn CodeBackend,
    pub(crate) host_resources: &'a Resources,
}

/// Build the namespace of one bundle.
///
/// Resources are built first, then native libraries are extracted and the
/// code module is loaded.
pub(crate) fn build_namespace(request: NamespaceRequest<'_>) -> RuntimeResult<Namespace> {
    let package = request.manifest.package_name();
    let failed = |kind: NamespaceKind, message: String| RuntimeError::NamespaceConstructionFailed {
        package: package.to_string(),
        kind,
        message,
    };

    let table = ResourceTable::from_archive(&request.archive)
        .map_err(|e| failed(NamespaceKind::Resources, e))?;
    debug!(package, resources = table.len(), "built resource table");
    let resources = Arc::new(Resources::new(
        table,
        Some(Arc::clone(&request.archive)),
        *request.host_resources.metrics(),
        request.host_resources.configuration().clone(),
    ));

    let extracted = natives::extract_native_libraries(&request.archive, &request.library_dir)
        .map_err(|e| {
            failed(
                NamespaceKind::Code,
                format!(
                    "failed to extract native libraries into {}: {e}",
                    request.library_dir.display()
                ),
            )
        })?;
    if !extracted.is_empty() {
        debug!(package, count = extracted.len(), "extracted native libraries");
    }

    let module = request
        .backend
        .load(&ModuleRequest {
            package_name: package,
            manifest: request.manifest,
            archive: &request.archive,
            library_dir: &request.library_dir,
            configuration: request.host_resources.configuration(),
        })
        .map_err(|e| failed(NamespaceKind::Code, e))?;

    let class_loader = Arc::new(BundleClassLoader::new(
        package,
        module,
        request.parent,
        request.library_dir,
    ));

    Ok(Namespace {
        class_loader,
        resources,
    })
}
