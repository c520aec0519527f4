//! modhost CLI - inspect, install and launch plugin bundles from a terminal.
//!
//! The CLI runs the plugin runtime against a console host: dispatched
//! payloads and lifecycle events are printed instead of shown on screen.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use modhost_config::Config;
use modhost_telemetry::{LogConfig, LogFormat};

mod commands;
mod config_bridge;
mod console_host;
mod theme;

use commands::{config, inspect, install, launch, list};

/// modhost - dynamic plugin bundles for a running host
#[derive(Parser)]
#[command(name = "modhost")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a bundle's manifest, components and content without installing it
    Inspect {
        /// Bundle file
        bundle: PathBuf,
        /// Print the manifest as JSON
        #[arg(long)]
        json: bool,
    },

    /// Install a bundle or a directory of bundles
    Install {
        /// Bundle file or directory
        path: PathBuf,
        /// Bundle id (single file only; defaults to the file name)
        #[arg(long)]
        id: Option<String>,
        /// Private file name (single file only; defaults to the file name)
        #[arg(long)]
        target_name: Option<String>,
    },

    /// Install every bundle in a directory and list the plugins
    List {
        /// Directory holding bundles
        dir: PathBuf,
    },

    /// Install bundles and launch a plugin component through its proxy
    Launch {
        /// Bundle file or directory
        path: PathBuf,
        /// Package to launch
        package: String,
        /// Component class (defaults to the main component)
        #[arg(short, long)]
        component: Option<String>,
        /// Launch extra, repeatable
        #[arg(short = 'e', long = "extra", value_name = "KEY=VALUE")]
        extras: Vec<String>,
    },

    /// View configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show resolved configuration with source annotations
    Show {
        /// Output format (toml or json)
        #[arg(short, long, default_value = "toml")]
        format: String,
        /// Show only a specific section (e.g. storage, wasm, host)
        #[arg(short, long)]
        section: Option<String>,
    },
    /// Validate the current configuration
    Validate,
    /// Show config file paths being checked
    Paths,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let workspace_root = std::env::current_dir().ok();
    let resolved = Config::load(workspace_root.as_deref());

    // Set up logging from config, with --verbose override.
    let log_config = if let Ok(resolved) = &resolved {
        let mut lc = config_bridge::to_log_config(&resolved.config);
        if cli.verbose {
            "debug".clone_into(&mut lc.level);
        }
        lc
    } else {
        let level = if cli.verbose { "debug" } else { "warn" };
        LogConfig::new(level).with_format(LogFormat::Compact)
    };
    if let Err(e) = modhost_telemetry::setup_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
    }

    if let Commands::Config {
        command: ConfigCommands::Paths,
    } = &cli.command
    {
        config::show_paths(workspace_root.as_deref());
        return Ok(());
    }

    let resolved = resolved.context("failed to load configuration")?;
    let cfg = &resolved.config;

    match cli.command {
        Commands::Inspect { bundle, json } => inspect::inspect_bundle(&bundle, json)?,
        Commands::Install {
            path,
            id,
            target_name,
        } => install::install(cfg, &path, id.as_deref(), target_name.as_deref())?,
        Commands::List { dir } => list::list(cfg, &dir)?,
        Commands::Launch {
            path,
            package,
            component,
            extras,
        } => launch::launch(cfg, &path, &package, component.as_deref(), &extras)?,
        Commands::Config { command } => match command {
            ConfigCommands::Show { format, section } => {
                config::show_config(&resolved, &format, section.as_deref())?;
            },
            ConfigCommands::Validate => config::validate_config(&resolved),
            ConfigCommands::Paths => config::show_paths(workspace_root.as_deref()),
        },
    }

    Ok(())
}
