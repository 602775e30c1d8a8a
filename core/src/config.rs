//! Configuration loading.
//!
//! Loads `sitebridge.toml` from `--config`, else `$SITEBRIDGE_CONFIG`, else
//! the current directory. Relative project roots resolve against the
//! directory holding the config file.
//!
//! ```toml
//! topology = "dedicated-origin"
//! shell_origins = ["http://localhost:1420"]
//!
//! [home_button]
//! enabled = true
//!
//! [[projects]]
//! id = "studio"
//! root = "projects/studio/dist"
//! port = 5174
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::error::Result;
use crate::home_button::HomeButton;
use crate::locator::ProbeOrder;
use crate::locator::ResourceLocator;
use crate::project::DEFAULT_ENTRY;
use crate::project::ProjectDescriptor;
use crate::topology::ServingContext;
use crate::topology::Topology;

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "SITEBRIDGE_CONFIG";

/// Config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "sitebridge.toml";

#[derive(Debug, Deserialize, Clone)]
pub struct SiteBridgeConfig {
    /// Interface every instance binds to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port of the shared path-prefixed instance
    #[serde(default = "default_shared_port")]
    pub shared_port: u16,

    #[serde(default)]
    pub topology: Topology,

    #[serde(default)]
    pub probe_order: ProbeOrder,

    /// Host shell origins where the injected runtime must stay inert
    #[serde(default = "default_shell_origins")]
    pub shell_origins: Vec<String>,

    /// Let the injected runtime log to the browser console
    #[serde(default)]
    pub browser_debug: bool,

    #[serde(default)]
    pub home_button: HomeButton,

    #[serde(default)]
    pub supervisor: SupervisorConfig,

    #[serde(default)]
    pub projects: Vec<ProjectConfig>,

    #[serde(skip)]
    config_dir: PathBuf,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_shared_port() -> u16 {
    5174
}

fn default_shell_origins() -> Vec<String> {
    vec!["http://localhost:1420".to_string()]
}

/// `[supervisor]` section.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// A child exiting within this window failed to start
    #[serde(default = "default_startup_grace_ms")]
    pub startup_grace_ms: u64,

    /// How long each child gets to exit after SIGTERM
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

fn default_startup_grace_ms() -> u64 {
    500
}

fn default_shutdown_timeout_ms() -> u64 {
    5000
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            startup_grace_ms: default_startup_grace_ms(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }
}

/// One `[[projects]]` entry.
#[derive(Debug, Deserialize, Clone)]
pub struct ProjectConfig {
    pub id: String,
    pub root: PathBuf,
    #[serde(default = "default_entry")]
    pub entry: PathBuf,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub base_path: Option<String>,
}

fn default_entry() -> PathBuf {
    PathBuf::from(DEFAULT_ENTRY)
}

impl Default for SiteBridgeConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            shared_port: default_shared_port(),
            topology: Topology::default(),
            probe_order: ProbeOrder::default(),
            shell_origins: default_shell_origins(),
            browser_debug: false,
            home_button: HomeButton::default(),
            supervisor: SupervisorConfig::default(),
            projects: Vec::new(),
            config_dir: PathBuf::from("."),
        }
    }
}

impl SiteBridgeConfig {
    /// Where to look for the config file.
    pub fn config_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => PathBuf::from(DEFAULT_CONFIG_FILE),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text, path)
    }

    /// Parse `text` as if it had been read from `origin`.
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self> {
        let mut config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        config.config_dir = origin
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        config.descriptors()?;
        Ok(config)
    }

    /// Every configured project, validated, roots made absolute against the
    /// config directory. Does not touch the filesystem.
    pub fn descriptors(&self) -> Result<Vec<ProjectDescriptor>> {
        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(self.projects.len());
        for project in &self.projects {
            if project.id.is_empty() || project.id.contains('/') || project.id == ".." {
                return Err(ConfigError::InvalidProjectId {
                    id: project.id.clone(),
                });
            }
            if !seen.insert(project.id.as_str()) {
                return Err(ConfigError::DuplicateProject {
                    id: project.id.clone(),
                });
            }

            let mut descriptor = ProjectDescriptor::new(&project.id, self.config_dir.join(&project.root))
                .with_entry(&project.entry);
            if let Some(base_path) = &project.base_path {
                if !base_path.starts_with('/') || !base_path.ends_with('/') || base_path == "/" {
                    return Err(ConfigError::InvalidBasePath {
                        id: project.id.clone(),
                        base_path: base_path.clone(),
                    });
                }
                descriptor = descriptor.with_base_path(base_path);
            }
            if let Some(port) = project.port {
                descriptor = descriptor.with_port(port);
            }
            out.push(descriptor);
        }
        Ok(out)
    }

    /// Projects whose root directory exists. Missing roots are logged and
    /// dropped so the remaining projects still serve.
    pub fn available_projects(&self) -> Result<Vec<ProjectDescriptor>> {
        Ok(self
            .descriptors()?
            .into_iter()
            .filter(|project| {
                let present = project.root.is_dir();
                if !present {
                    tracing::warn!(
                        project = %project.id,
                        "root directory {} does not exist, skipping",
                        project.root.display()
                    );
                }
                present
            })
            .collect())
    }

    pub fn project(&self, id: &str) -> Result<ProjectDescriptor> {
        self.descriptors()?
            .into_iter()
            .find(|project| project.id == id)
            .ok_or_else(|| ConfigError::UnknownProject { id: id.to_string() })
    }

    /// Serving context for documents of `project` under `topology`.
    pub fn serving_context(&self, topology: Topology, project: &ProjectDescriptor) -> ServingContext {
        self.runtime_settings(ServingContext::for_project(topology, project))
    }

    /// Apply the configured shell origins, home button and debug flag.
    pub fn runtime_settings(&self, ctx: ServingContext) -> ServingContext {
        ctx.with_shell_origins(self.shell_origins.clone())
            .with_home_button(Some(self.home_button.clone()).filter(|button| button.enabled))
            .with_debug(self.browser_debug)
    }

    pub fn locator(&self, projects: Vec<ProjectDescriptor>) -> ResourceLocator {
        ResourceLocator::new(projects).with_probe_order(self.probe_order)
    }
}
