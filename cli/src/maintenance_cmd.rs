//! `sitebridge inject` and `sitebridge restore`.
//!
//! One-shot rewrites of entry files on disk, for bundles opened through a
//! local-file protocol instead of a server. Run once per tree, never while
//! another run is touching the same files.

use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use sitebridge_core::ProjectDescriptor;
use sitebridge_core::ServingContext;
use sitebridge_core::SiteBridgeConfig;
use sitebridge_core::Topology;
use sitebridge_core::maintenance;
use sitebridge_core::maintenance::MaintenanceReport;
use sitebridge_core::project::DEFAULT_ENTRY;

#[derive(Debug, Parser)]
pub struct MaintenanceArgs {
    /// Walk this directory instead of every configured project root.
    #[arg(long = "dir", short = 'd')]
    pub dir: Option<PathBuf>,

    /// Entry file name to look for (defaults to each project's entry).
    #[arg(long = "entry")]
    pub entry: Option<String>,
}

#[derive(Debug, Parser)]
pub struct RestoreArgs {
    #[command(flatten)]
    pub targets: MaintenanceArgs,

    /// Also remove marker-less injections written by older tooling. These
    /// are recognized by content alone, so only use this on bundles that
    /// tooling is known to have touched.
    #[arg(long = "legacy", default_value_t = false)]
    pub legacy: bool,
}

struct Target {
    root: PathBuf,
    entry: OsString,
    project: Option<ProjectDescriptor>,
}

fn targets(config: &SiteBridgeConfig, args: &MaintenanceArgs) -> anyhow::Result<Vec<Target>> {
    if let Some(dir) = &args.dir {
        anyhow::ensure!(dir.is_dir(), "{} is not a directory", dir.display());
        return Ok(vec![Target {
            root: dir.clone(),
            entry: args.entry.as_deref().unwrap_or(DEFAULT_ENTRY).into(),
            project: None,
        }]);
    }
    let projects = config.available_projects()?;
    anyhow::ensure!(!projects.is_empty(), "no project roots found; pass --dir");
    Ok(projects
        .into_iter()
        .map(|project| Target {
            root: project.root.clone(),
            entry: args
                .entry
                .as_ref()
                .map_or_else(|| project.entry_file_name().as_os_str().to_owned(), OsString::from),
            project: Some(project),
        })
        .collect())
}

fn summarize(verb: &str, report: &MaintenanceReport) {
    for path in &report.skipped {
        println!("skipped {}", path.display());
    }
    println!("{verb} {} of {} entry files", report.changed.len(), report.scanned);
}

pub fn inject(config: &SiteBridgeConfig, args: &MaintenanceArgs) -> anyhow::Result<()> {
    let mut report = MaintenanceReport::default();
    for target in targets(config, args)? {
        let ctx = match &target.project {
            Some(project) => config.serving_context(Topology::LocalFile, project),
            None => config.runtime_settings(ServingContext::new(Topology::LocalFile, "/")),
        };
        let tree = maintenance::inject_tree(&target.root, &target.entry, &ctx)
            .with_context(|| format!("injecting under {}", target.root.display()))?;
        report.merge(tree);
    }
    summarize("injected", &report);
    Ok(())
}

pub fn restore(config: &SiteBridgeConfig, args: &RestoreArgs) -> anyhow::Result<()> {
    let mut report = MaintenanceReport::default();
    for target in targets(config, &args.targets)? {
        let tree = maintenance::restore_tree(&target.root, &target.entry, args.legacy)
            .with_context(|| format!("restoring under {}", target.root.display()))?;
        report.merge(tree);
    }
    summarize("restored", &report);
    Ok(())
}
