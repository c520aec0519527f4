//! Dynamic bundle runtime for the modhost plugin system.
//!
//! Loads independently built bundles into a running host, isolates each
//! bundle's code and resources, and routes launches of bundle components
//! through generic host proxies:
//!
//! - [`PluginManager`]: install pipeline, registry ownership and launches
//! - [`BundleStorage`](storage::BundleStorage): private copies and per-bundle paths
//! - [`ManifestResolver`](manifest::ManifestResolver): bundle metadata
//! - [`Namespace`](namespace::Namespace): isolated class loader and resources
//! - [`PluginRegistry`]: concurrent package name to descriptor map
//! - [`ComponentSelector`](dispatch::ComponentSelector): proxy selection
//! - [`PluginInstrumentation`](instrumentation::PluginInstrumentation): host hook
//!
//! # Bundle Layout
//!
//! A bundle is a tar archive (optionally gzip-compressed):
//!
//! ```text
//! plugin.toml              manifest
//! classes.wasm             code module (optional)
//! res/values[-quals]/*.toml
//! assets/...
//! lib/[<arch>/]*.so        native libraries
//! ```
//!
//! # Host Integration
//!
//! The host implements [`Host`](host::Host), [`Context`](context::Context) and
//! [`Instrumentation`](instrumentation::Instrumentation), and registers one
//! component per [`ProxyComponentId`](dispatch::ProxyComponentId).

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod archive;
pub mod bundle;
pub mod code;
pub mod component;
pub mod context;
pub mod dispatch;
pub mod entry;
pub mod error;
pub mod host;
pub mod instrumentation;
pub mod manager;
pub mod manifest;
pub mod namespace;
pub mod registry;
pub mod storage;

pub use bundle::BundleDescriptor;
pub use component::{Component, LifecycleEvent};
pub use context::{Context, PluginContext};
pub use dispatch::{LaunchPayload, LaunchRequest, LaunchTarget, PluginTarget, ProxyComponentId};
pub use entry::{DEFAULT_ENTRY_CLASS, EntryObject, PluginEntry};
pub use error::{NamespaceKind, RuntimeError, RuntimeResult};
pub use host::{Host, HostError};
pub use instrumentation::{Instrumentation, LifecycleCallback, PluginInstrumentation};
pub use manager::{PluginManager, PluginManagerBuilder};
pub use manifest::{BundleManifest, ComponentDescriptor, LaunchMode};
pub use registry::PluginRegistry;
