//! `modhost inspect`: read a bundle without installing it.

use std::path::Path;

use anyhow::{Context as _, anyhow};
use modhost_runtime::archive::BundleArchive;
use modhost_runtime::dispatch::{ComponentSelector, DefaultSelector, ProxyComponentId};
use modhost_runtime::manifest::{ManifestResolver, TomlManifestResolver};
use modhost_runtime::namespace::resources::ResourceTable;
use modhost_runtime::{BundleManifest, LaunchMode};

use crate::theme::Theme;

/// Everything `inspect` reports about a bundle.
#[derive(Debug)]
pub(crate) struct BundleReport {
    pub(crate) manifest: BundleManifest,
    /// Proxy the default selector picks, per declared component.
    pub(crate) proxies: Vec<(String, ProxyComponentId)>,
    pub(crate) resource_ids: Vec<String>,
    pub(crate) assets: Vec<String>,
    pub(crate) native_libs: Vec<String>,
    pub(crate) code_present: bool,
}

/// Read `path` and collect its report.
pub(crate) fn describe(path: &Path) -> anyhow::Result<BundleReport> {
    let archive = BundleArchive::open(path)
        .with_context(|| format!("failed to read bundle {}", path.display()))?;
    let manifest = TomlManifestResolver
        .resolve(&archive)
        .map_err(|e| anyhow!("invalid manifest in {}: {e}", path.display()))?;
    let resources = ResourceTable::from_archive(&archive)
        .map_err(|e| anyhow!("invalid resources in {}: {e}", path.display()))?;

    let selector = DefaultSelector;
    let proxies = manifest
        .components
        .iter()
        .map(|c| (c.class_name.clone(), selector.select(c)))
        .collect();
    let names_under = |prefix: &str| -> Vec<String> {
        archive
            .entries_under(prefix)
            .map(|(name, _)| name.trim_start_matches(prefix).to_string())
            .filter(|name| !name.is_empty() && !name.ends_with('/'))
            .collect()
    };
    let code_present = manifest
        .code
        .as_ref()
        .is_some_and(|code| archive.contains(&code.path));

    Ok(BundleReport {
        proxies,
        resource_ids: resources.ids().into_iter().map(str::to_string).collect(),
        assets: names_under("assets/"),
        native_libs: names_under("lib/"),
        code_present,
        manifest,
    })
}

fn launch_mode_name(mode: LaunchMode) -> &'static str {
    match mode {
        LaunchMode::Standard => "standard",
        LaunchMode::SingleTop => "single-top",
        LaunchMode::SingleTask => "single-task",
        LaunchMode::SingleInstance => "single-instance",
    }
}

/// Print the report for `path`, as JSON when `json` is set.
pub(crate) fn inspect_bundle(path: &Path, json: bool) -> anyhow::Result<()> {
    let report = describe(path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report.manifest)?);
        return Ok(());
    }

    let manifest = &report.manifest;
    println!(
        "{}",
        Theme::header(&format!("Bundle: {}", manifest.package_name()))
    );
    println!("{}", Theme::kv("File", &path.display().to_string()));
    if let Some(version) = &manifest.package.version {
        println!("{}", Theme::kv("Version", version));
    }
    if let Some(label) = &manifest.package.label {
        println!("{}", Theme::kv("Label", label));
    }
    println!("{}", Theme::kv("Entry", manifest.entry_class_name()));
    match &manifest.code {
        Some(code) => {
            let status = if report.code_present { "" } else { " (missing)" };
            println!("{}", Theme::kv("Code", &format!("{}{status}", code.path)));
            if let Some(hash) = &code.hash {
                println!("{}", Theme::kv("Code Hash", hash));
            }
        },
        None => println!("{}", Theme::kv("Code", "none")),
    }

    println!();
    if manifest.components.is_empty() {
        println!("{}", Theme::info("No components declared"));
    } else {
        println!(
            "  {:<40} {:<16} {}",
            "COMPONENT", "LAUNCH MODE", "PROXY"
        );
        println!("{}", Theme::separator());
        for (component, (_, proxy)) in manifest.components.iter().zip(&report.proxies) {
            let name = if component.main {
                format!("{} *", component.class_name)
            } else {
                component.class_name.clone()
            };
            println!(
                "  {:<40} {:<16} {}",
                name,
                launch_mode_name(component.launch_mode),
                proxy
            );
        }
    }

    println!();
    println!(
        "{}",
        Theme::kv("Resources", &report.resource_ids.len().to_string())
    );
    println!("{}", Theme::kv("Assets", &report.assets.join(", ")));
    println!("{}", Theme::kv("Native Libs", &report.native_libs.join(", ")));
    Ok(())
}
