//! `sitebridge supervise`.

use std::ffi::OsString;

use anyhow::Context;
use sitebridge_supervisor::Supervisor;
use sitebridge_supervisor::plan_instances;
use sitebridge_supervisor::signal;

use crate::LoadedConfig;

pub async fn run(loaded: &LoadedConfig) -> anyhow::Result<()> {
    let config = &loaded.config;
    let instances = plan_instances(config);
    anyhow::ensure!(!instances.is_empty(), "configuration calls for no server instances");

    let program = std::env::current_exe().context("locating the sitebridge executable")?;
    let shared_args: Vec<OsString> = match &loaded.path {
        Some(path) => vec!["--config".into(), path.clone().into_os_string()],
        None => Vec::new(),
    };
    let supervisor = Supervisor::new(program, shared_args, &config.supervisor);

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        signal::termination().await;
        let _ = shutdown_tx.send(true);
    });

    let report = supervisor
        .run(instances, shutdown_rx)
        .await
        .inspect_err(|err| tracing::error!(category = err.category().as_str(), "{err}"))?;
    tracing::info!(
        started = report.started.len(),
        failed = report.failed_to_start.len(),
        exited_early = report.exited_early.len(),
        killed = report.killed.len(),
        "supervisor exiting"
    );
    Ok(())
}
