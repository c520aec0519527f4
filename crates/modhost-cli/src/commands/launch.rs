//! `modhost launch`: install bundles, launch a component and replay what the
//! host would do with the dispatched payload.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context as _, anyhow, bail};
use modhost_config::Config;
use modhost_runtime::{LaunchPayload, LaunchRequest, LifecycleCallback, LifecycleEvent};
use serde_json::Value;

use super::Session;
use crate::theme::Theme;

/// Split a `key=value` argument. Values that parse as JSON keep their type,
/// anything else is a string.
pub(crate) fn parse_extra(arg: &str) -> anyhow::Result<(String, Value)> {
    let Some((key, raw)) = arg.split_once('=') else {
        bail!("extra '{arg}' is not of the form key=value");
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("extra '{arg}' has an empty key");
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

/// Build the launch request for `package`.
pub(crate) fn build_request(
    package: &str,
    component: Option<&str>,
    extras: &[String],
) -> anyhow::Result<LaunchRequest> {
    let mut request = match component {
        Some(class_name) => LaunchRequest::component(package, class_name),
        None => LaunchRequest::main(package),
    };
    for arg in extras {
        let (key, value) = parse_extra(arg)?;
        request = request.with_extra(key, value);
    }
    Ok(request)
}

/// Install `path`, launch `request` from the host context and run every
/// dispatched payload through the host's instrumentation.
pub(crate) fn launch_in(
    session: &Session,
    path: &Path,
    request: LaunchRequest,
) -> anyhow::Result<LaunchPayload> {
    session
        .manager
        .install(path)
        .with_context(|| format!("failed to install {}", path.display()))?;

    let context = session.host.context();
    let payload = session.manager.launch(context, request)?;

    for dispatched in context.take_dispatched() {
        session
            .host
            .run_component(&dispatched, &LifecycleEvent::FULL_CYCLE)
            .map_err(|e| anyhow!("host could not run {}: {e}", dispatched.component))?;
    }
    Ok(payload)
}

/// Entry point of the `launch` subcommand.
pub(crate) fn launch(
    cfg: &Config,
    path: &Path,
    package: &str,
    component: Option<&str>,
    extras: &[String],
) -> anyhow::Result<()> {
    let request = build_request(package, component, extras)?;
    let callback: Arc<dyn LifecycleCallback> =
        Arc::new(|package: &str, class_name: &str, event: LifecycleEvent| {
            println!(
                "{}",
                Theme::info(&format!("{package} {class_name}: {event}"))
            );
        });
    let session = Session::start(cfg, Some(callback))?;

    let payload = launch_in(&session, path, request)?;

    println!("{}", Theme::success("Dispatched"));
    println!("{}", Theme::kv("Component", &payload.component));
    if let Some(target) = payload.plugin_target() {
        println!("{}", Theme::kv("Plugin", &target.package_name));
        println!("{}", Theme::kv("Class", &target.class_name));
    }
    println!(
        "{}",
        Theme::kv("Extras", &Value::Object(payload.extras.clone()).to_string())
    );
    Ok(())
}
