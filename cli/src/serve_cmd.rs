//! `sitebridge serve`.

use anyhow::Context;
use clap::Parser;
use sitebridge_core::ConfigError;
use sitebridge_core::SiteBridgeConfig;
use sitebridge_core::Topology;
use sitebridge_server::StaticHandler;
use sitebridge_server::StaticServer;
use sitebridge_supervisor::signal;

#[derive(Debug, Parser)]
pub struct ServeArgs {
    /// Serve only this project, at the root of its own port.
    #[arg(long = "project", short = 'p')]
    pub project: Option<String>,

    /// Listen on this port instead of the configured one (0 picks a free port).
    #[arg(long = "port")]
    pub port: Option<u16>,
}

pub async fn run(config: &SiteBridgeConfig, args: &ServeArgs) -> anyhow::Result<()> {
    let (topology, projects, port) = match &args.project {
        Some(id) => {
            let project = config.project(id)?;
            anyhow::ensure!(
                project.root.is_dir(),
                "root directory {} of project {id} does not exist",
                project.root.display()
            );
            let port = args
                .port
                .or(project.port)
                .ok_or_else(|| ConfigError::MissingPort { id: id.clone() })?;
            (Topology::DedicatedOrigin, vec![project], port)
        }
        None => {
            let topology = match config.topology {
                Topology::DedicatedOrigin => Topology::PathPrefixed,
                other => other,
            };
            let projects = config.available_projects()?;
            (topology, projects, args.port.unwrap_or(config.shared_port))
        }
    };
    if projects.is_empty() {
        tracing::warn!("no projects to serve, every request will 404");
    }
    for project in &projects {
        tracing::info!(
            project = %project.id,
            topology = %topology,
            "serving {} at {}",
            project.root.display(),
            project.base_path
        );
    }

    let handler = StaticHandler::from_config(config, topology, projects);
    let addr = format!("{}:{port}", config.host);
    let server = StaticServer::bind(&addr, handler)
        .inspect_err(|err| tracing::error!(category = err.category().as_str(), "{err}"))
        .with_context(|| format!("starting {topology} instance"))?;
    let (shutdown, join) = server.spawn();

    signal::termination().await;
    shutdown.shutdown();
    tokio::task::spawn_blocking(move || join.join())
        .await?
        .map_err(|_| anyhow::anyhow!("server thread panicked"))?;
    Ok(())
}
