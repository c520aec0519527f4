//! `modhost install`: stage bundles into private storage.

use std::path::Path;

use anyhow::Context as _;
use modhost_config::Config;
use modhost_runtime::BundleDescriptor;

use super::Session;
use crate::theme::Theme;

/// Install `path` (a bundle or a directory of bundles).
///
/// `id` and `target_name` only apply to single-file installs.
pub(crate) fn install(
    cfg: &Config,
    path: &Path,
    id: Option<&str>,
    target_name: Option<&str>,
) -> anyhow::Result<()> {
    let session = Session::start(cfg, None)?;
    let manager = &session.manager;

    let installed = if path.is_file() && (id.is_some() || target_name.is_some()) {
        vec![manager.install_bundle(path, id, target_name)?]
    } else {
        manager
            .install(path)
            .with_context(|| format!("failed to install {}", path.display()))?
    };

    for descriptor in &installed {
        print_descriptor(descriptor);
    }
    println!("{}", Theme::dimmed(&manager.dump()));
    Ok(())
}

fn print_descriptor(descriptor: &BundleDescriptor) {
    println!(
        "{}",
        Theme::success(&format!("Installed {}", descriptor.package_name()))
    );
    println!("{}", Theme::kv("Id", descriptor.id()));
    println!(
        "{}",
        Theme::kv("Private Copy", &descriptor.private_path().display().to_string())
    );
    println!(
        "{}",
        Theme::kv("Library Dir", &descriptor.library_dir().display().to_string())
    );
    println!("{}", Theme::kv("Entry", descriptor.entry().class_name()));
    println!(
        "{}",
        Theme::kv(
            "Components",
            &descriptor.manifest().components.len().to_string()
        )
    );
}
