//! Child process lifecycle.
//!
//! Every instance is a separate process so that no two origins share state.
//! Children are started together, given a grace period to fail, watched
//! until shutdown is requested, then asked to stop with SIGTERM and killed
//! if they outlive the shutdown timeout.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::process::Stdio;
use std::time::Duration;

use sitebridge_core::SupervisorConfig;
use tokio::process::Child;
use tokio::process::Command;
use tokio::sync::watch;

use crate::SupervisorError;
use crate::plan::InstanceSpec;

/// How often running children are checked for unexpected exits.
const WATCH_INTERVAL: Duration = Duration::from_millis(250);

struct Instance {
    name: String,
    child: Child,
}

/// What happened to each instance over the supervisor's lifetime.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SupervisorReport {
    pub started: Vec<String>,
    pub failed_to_start: Vec<String>,
    pub exited_early: Vec<String>,
    /// Instances that ignored SIGTERM and had to be killed.
    pub killed: Vec<String>,
}

pub struct Supervisor {
    program: PathBuf,
    shared_args: Vec<OsString>,
    startup_grace: Duration,
    shutdown_timeout: Duration,
}

impl Supervisor {
    /// Children run `program <shared_args> <instance args>`.
    pub fn new(program: impl Into<PathBuf>, shared_args: Vec<OsString>, config: &SupervisorConfig) -> Self {
        Self {
            program: program.into(),
            shared_args,
            startup_grace: Duration::from_millis(config.startup_grace_ms),
            shutdown_timeout: Duration::from_millis(config.shutdown_timeout_ms),
        }
    }

    /// Run `instances` until `shutdown` flips to `true` or every child has
    /// exited.
    ///
    /// Fails only when not a single instance survived startup.
    pub async fn run(
        &self,
        instances: Vec<InstanceSpec>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<SupervisorReport, SupervisorError> {
        let mut report = SupervisorReport::default();
        let mut running = Vec::with_capacity(instances.len());

        for spec in instances {
            match self.spawn(&spec) {
                Ok(child) => running.push(Instance {
                    name: spec.name,
                    child,
                }),
                Err(err) => {
                    tracing::error!(instance = %spec.name, "failed to start: {err}");
                    report.failed_to_start.push(spec.name);
                }
            }
        }

        tokio::time::sleep(self.startup_grace).await;
        running.retain_mut(|instance| match instance.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                tracing::error!(instance = %instance.name, "exited during startup ({status})");
                report.failed_to_start.push(instance.name.clone());
                false
            }
            Err(err) => {
                tracing::error!(instance = %instance.name, "cannot poll child: {err}");
                report.failed_to_start.push(instance.name.clone());
                false
            }
        });
        if running.is_empty() {
            return Err(SupervisorError::NoInstances {
                failed: report.failed_to_start.len(),
            });
        }
        report.started = running.iter().map(|instance| instance.name.clone()).collect();
        tracing::info!("{} instance(s) running", running.len());

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        tracing::debug!("shutdown sender dropped");
                        break;
                    }
                }
                _ = tokio::time::sleep(WATCH_INTERVAL) => {
                    running.retain_mut(|instance| match instance.child.try_wait() {
                        Ok(Some(status)) => {
                            tracing::warn!(instance = %instance.name, "exited unexpectedly ({status})");
                            report.exited_early.push(instance.name.clone());
                            false
                        }
                        Ok(None) | Err(_) => true,
                    });
                    if running.is_empty() {
                        tracing::warn!("every instance has exited");
                        return Ok(report);
                    }
                }
            }
        }

        tracing::info!("stopping {} instance(s)", running.len());
        for instance in &running {
            terminate(instance);
        }
        for mut instance in running {
            match tokio::time::timeout(self.shutdown_timeout, instance.child.wait()).await {
                Ok(status) => log_exit(&instance.name, status),
                Err(_) => {
                    tracing::warn!(
                        instance = %instance.name,
                        "still running after {:?}, killing",
                        self.shutdown_timeout
                    );
                    if let Err(err) = instance.child.kill().await {
                        tracing::error!(instance = %instance.name, "failed to kill: {err}");
                    }
                    report.killed.push(instance.name);
                }
            }
        }
        Ok(report)
    }

    fn spawn(&self, spec: &InstanceSpec) -> std::io::Result<Child> {
        let child = Command::new(&self.program)
            .args(&self.shared_args)
            .args(&spec.args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        tracing::info!(instance = %spec.name, pid = ?child.id(), "started");
        Ok(child)
    }
}

fn terminate(instance: &Instance) {
    let Some(pid) = instance.child.id() else {
        return;
    };
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: `pid` is a child we spawned and have not reaped yet.
    let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
    if rc != 0 {
        tracing::warn!(
            instance = %instance.name,
            "failed to send SIGTERM: {}",
            std::io::Error::last_os_error()
        );
    }
}

fn log_exit(name: &str, status: std::io::Result<ExitStatus>) {
    match status {
        Ok(status) => tracing::info!(instance = %name, "stopped ({status})"),
        Err(err) => tracing::warn!(instance = %name, "failed to reap: {err}"),
    }
}
