//! `modhost list`: install a directory of bundles and tabulate them.

use std::path::Path;

use modhost_config::Config;

use super::Session;
use crate::theme::Theme;

/// Install every bundle in `dir` and print one row per plugin.
pub(crate) fn list(cfg: &Config, dir: &Path) -> anyhow::Result<()> {
    let session = Session::start(cfg, None)?;
    let installed = session.manager.install_dir(dir)?;

    if installed.is_empty() {
        println!("{}", Theme::warning("No bundle in this directory installed cleanly"));
        return Ok(());
    }

    println!("{}", Theme::header(&format!("Plugins in {}", dir.display())));
    println!(
        "  {:<32} {:<10} {:>5}  {}",
        "PACKAGE", "VERSION", "COMP", "MAIN"
    );
    println!("{}", Theme::separator());
    for plugin in session.manager.plugins() {
        let manifest = plugin.manifest();
        println!(
            "  {:<32} {:<10} {:>5}  {}",
            plugin.package_name(),
            manifest.package.version.as_deref().unwrap_or("-"),
            manifest.components.len(),
            manifest
                .main_component()
                .map_or("-", |c| c.class_name.as_str()),
        );
    }
    println!(
        "\n{}",
        Theme::dimmed(&format!("{} plugin(s)", installed.len()))
    );
    Ok(())
}
