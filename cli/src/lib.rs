//! `sitebridge` command line.

pub mod maintenance_cmd;
pub mod resolve_cmd;
pub mod serve_cmd;
pub mod supervise_cmd;

use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use clap::Subcommand;
use sitebridge_core::SiteBridgeConfig;
use sitebridge_core::config::DEFAULT_CONFIG_FILE;

#[derive(Debug, Parser)]
#[command(name = "sitebridge", version, about = "Serve pre-built single-page bundles side by side")]
pub struct Cli {
    /// Config file (defaults to $SITEBRIDGE_CONFIG, then ./sitebridge.toml).
    #[arg(long = "config", short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one static server instance.
    Serve(serve_cmd::ServeArgs),
    /// Run every configured instance as a child process.
    Supervise,
    /// Show how a request path would be resolved.
    Resolve(resolve_cmd::ResolveArgs),
    /// Inject the path fixer into entry files on disk.
    Inject(maintenance_cmd::MaintenanceArgs),
    /// Remove every injection from entry files on disk.
    Restore(maintenance_cmd::RestoreArgs),
}

/// A loaded config and the file it came from, if any.
pub struct LoadedConfig {
    pub config: SiteBridgeConfig,
    pub path: Option<PathBuf>,
}

/// Load the config named by `explicit`, `$SITEBRIDGE_CONFIG` or the working
/// directory. Only a missing default file falls back to built-in defaults.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<LoadedConfig> {
    let path = SiteBridgeConfig::config_path(explicit);
    if path == Path::new(DEFAULT_CONFIG_FILE) && !path.exists() {
        tracing::debug!("no {DEFAULT_CONFIG_FILE} in the working directory, using defaults");
        return Ok(LoadedConfig {
            config: SiteBridgeConfig::default(),
            path: None,
        });
    }
    let config = SiteBridgeConfig::load(&path)
        .inspect_err(|err| tracing::error!(category = err.category().as_str(), "{err}"))
        .with_context(|| format!("loading config from {}", path.display()))?;
    let path = path.canonicalize().unwrap_or(path);
    tracing::debug!("loaded config from {}", path.display());
    Ok(LoadedConfig {
        config,
        path: Some(path),
    })
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let loaded = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Serve(args) => serve_cmd::run(&loaded.config, &args).await,
        Command::Supervise => supervise_cmd::run(&loaded).await,
        Command::Resolve(args) => resolve_cmd::run(&loaded.config, &args),
        Command::Inject(args) => maintenance_cmd::inject(&loaded.config, &args),
        Command::Restore(args) => maintenance_cmd::restore(&loaded.config, &args),
    }
}
