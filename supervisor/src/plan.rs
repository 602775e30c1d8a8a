//! Which server instances a configuration calls for.

use sitebridge_core::SiteBridgeConfig;
use sitebridge_core::Topology;

/// One child process to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceSpec {
    /// Used in logs only.
    pub name: String,
    /// Arguments after the supervisor's shared arguments.
    pub args: Vec<String>,
}

impl InstanceSpec {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// Dedicated-origin configs get one `serve --project <id>` per project with
/// a port; every other topology gets a single shared `serve`.
pub fn plan_instances(config: &SiteBridgeConfig) -> Vec<InstanceSpec> {
    if config.topology != Topology::DedicatedOrigin {
        return vec![InstanceSpec::new("shared", vec!["serve".to_string()])];
    }
    config
        .projects
        .iter()
        .filter(|project| {
            if project.port.is_none() {
                tracing::warn!(project = %project.id, "no port configured, not starting an instance");
            }
            project.port.is_some()
        })
        .map(|project| {
            InstanceSpec::new(
                project.id.clone(),
                vec![
                    "serve".to_string(),
                    "--project".to_string(),
                    project.id.clone(),
                ],
            )
        })
        .collect()
}
