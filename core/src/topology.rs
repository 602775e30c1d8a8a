//! Deployment topologies and the per-document serving context.
//!
//! One `Topology` value selects the base declaration and the scope guard of
//! the injected runtime; nothing else branches on the deployment mode.

use serde::Deserialize;
use serde::Serialize;

use crate::home_button::HomeButton;
use crate::project::ProjectDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topology {
    /// Several projects share one origin, each under its own URL prefix.
    #[default]
    PathPrefixed,
    /// Each project owns an origin (usually a port) and lives at `/`.
    DedicatedOrigin,
    /// Documents are loaded through a privileged local-file protocol, or
    /// rewritten on disk ahead of time.
    LocalFile,
}

impl Topology {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PathPrefixed => "path-prefixed",
            Self::DedicatedOrigin => "dedicated-origin",
            Self::LocalFile => "local-file",
        }
    }
}

impl std::fmt::Display for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the transformer needs to know about where a document is served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServingContext {
    pub topology: Topology,
    /// URL path of the project root under the serving origin.
    pub base_path: String,
    /// Origins of the host shell; the runtime stays inert there.
    pub shell_origins: Vec<String>,
    pub home_button: Option<HomeButton>,
    /// Let the runtime write diagnostic lines to the browser console.
    pub debug: bool,
}

impl ServingContext {
    pub fn new(topology: Topology, base_path: impl Into<String>) -> Self {
        Self {
            topology,
            base_path: base_path.into(),
            shell_origins: Vec::new(),
            home_button: None,
            debug: false,
        }
    }

    /// Context for documents of `project` served under `topology`.
    pub fn for_project(topology: Topology, project: &ProjectDescriptor) -> Self {
        let base_path = match topology {
            Topology::DedicatedOrigin => "/".to_string(),
            Topology::PathPrefixed | Topology::LocalFile => project.base_path.clone(),
        };
        Self::new(topology, base_path)
    }

    pub fn with_shell_origins(mut self, origins: Vec<String>) -> Self {
        self.shell_origins = origins;
        self
    }

    pub fn with_home_button(mut self, home_button: Option<HomeButton>) -> Self {
        self.home_button = home_button;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// The `href` of the injected `<base>` element.
    ///
    /// A dedicated origin points at the project's own root; shared origins
    /// and local files use the document's own directory.
    pub fn base_href(&self) -> &str {
        match self.topology {
            Topology::DedicatedOrigin => &self.base_path,
            Topology::PathPrefixed | Topology::LocalFile => "./",
        }
    }
}
