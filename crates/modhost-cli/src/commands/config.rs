//! `modhost config`: show and check the resolved configuration.

use std::path::Path;

use anyhow::{anyhow, bail};
use modhost_config::loader::{CONFIG_DIR_NAME, CONFIG_FILE_NAME};
use modhost_config::{ResolvedConfig, ShowFormat};

use crate::theme::Theme;

fn parse_format(format: &str) -> anyhow::Result<ShowFormat> {
    match format {
        "toml" => Ok(ShowFormat::Toml),
        "json" => Ok(ShowFormat::Json),
        other => bail!("unknown format '{other}'; expected toml or json"),
    }
}

/// Print the resolved configuration, optionally one section only.
pub(crate) fn show_config(
    resolved: &ResolvedConfig,
    format: &str,
    section: Option<&str>,
) -> anyhow::Result<()> {
    let format = parse_format(format)?;
    let output = resolved.show(format, section).map_err(|_| match section {
        Some(name) => anyhow!("no config section named '{name}'"),
        None => anyhow!("failed to render configuration"),
    })?;
    print!("{output}");
    Ok(())
}

/// Report that the configuration loaded and validated.
pub(crate) fn validate_config(resolved: &ResolvedConfig) {
    println!("{}", Theme::success("Configuration is valid"));
    if resolved.loaded_files.is_empty() {
        println!("{}", Theme::dimmed("  (defaults only)"));
    }
    for path in &resolved.loaded_files {
        println!("{}", Theme::kv("Loaded", path));
    }
}

/// Print the config file locations that are checked.
pub(crate) fn show_paths(workspace_root: Option<&Path>) {
    println!("{}", Theme::header("Config files (lowest to highest precedence)"));
    println!("{}", Theme::kv("defaults", "<embedded>"));
    match modhost_config::loader::home_directory() {
        Ok(home) => {
            let path = home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME);
            println!("{}", Theme::kv("user", &path.display().to_string()));
        },
        Err(e) => println!("{}", Theme::warning(&e.to_string())),
    }
    if let Some(root) = workspace_root {
        let path = root.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME);
        println!("{}", Theme::kv("workspace", &path.display().to_string()));
    }
    println!("{}", Theme::dimmed("  MODHOST_* environment variables fill unset fields"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats() {
        assert_eq!(parse_format("toml").unwrap(), ShowFormat::Toml);
        assert_eq!(parse_format("json").unwrap(), ShowFormat::Json);
        assert!(parse_format("yaml").is_err());
    }
}
