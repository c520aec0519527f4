//! Subcommand implementations.

pub(crate) mod config;
pub(crate) mod inspect;
pub(crate) mod install;
pub(crate) mod launch;
pub(crate) mod list;

use std::sync::Arc;

use anyhow::Context as _;
use modhost_config::Config;
use modhost_runtime::{LifecycleCallback, PluginManager, PluginManagerBuilder};

use crate::config_bridge;
use crate::console_host::ConsoleHost;

/// A console host with a plugin manager bound to it.
pub(crate) struct Session {
    pub(crate) host: Arc<ConsoleHost>,
    pub(crate) manager: PluginManager,
}

impl Session {
    /// Build a host and manager from `cfg`.
    pub(crate) fn start(
        cfg: &Config,
        callback: Option<Arc<dyn LifecycleCallback>>,
    ) -> anyhow::Result<Self> {
        Self::start_with(cfg, callback, |builder| builder)
    }

    /// Like [`start`](Self::start), with a last say over the builder.
    pub(crate) fn start_with(
        cfg: &Config,
        callback: Option<Arc<dyn LifecycleCallback>>,
        customize: impl FnOnce(PluginManagerBuilder) -> PluginManagerBuilder,
    ) -> anyhow::Result<Self> {
        let root = config_bridge::storage_root(cfg)?;
        let (metrics, configuration) = config_bridge::to_display(cfg)?;
        let host = ConsoleHost::new(root, metrics, configuration);

        let mut builder = config_bridge::to_builder(cfg, Arc::clone(&host));
        if let Some(callback) = callback {
            builder = builder.with_lifecycle_callback(callback);
        }
        let manager = customize(builder).build().context("failed to start plugin manager")?;
        Ok(Self { host, manager })
    }
}
