//! Project descriptors.
//!
//! A project is one pre-built single-page bundle: a root directory holding an
//! HTML entry file and its asset subdirectories. Descriptors are built once
//! from configuration and never change for the life of the process.

use std::path::Path;
use std::path::PathBuf;

/// Default entry file inside a project root.
pub const DEFAULT_ENTRY: &str = "index.html";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDescriptor {
    /// Unique identifier, also the default URL segment (`/<id>/`).
    pub id: String,
    /// Directory every resolution for this project stays under.
    pub root: PathBuf,
    /// Entry file relative to `root`.
    pub entry: PathBuf,
    /// Fixed port for the dedicated-origin topology.
    pub port: Option<u16>,
    /// URL prefix under the shared path-prefixed origin. Always starts and
    /// ends with `/`.
    pub base_path: String,
}

impl ProjectDescriptor {
    pub fn new(id: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        let id = id.into();
        let base_path = format!("/{id}/");
        Self {
            id,
            root: root.into(),
            entry: PathBuf::from(DEFAULT_ENTRY),
            port: None,
            base_path,
        }
    }

    pub fn with_entry(mut self, entry: impl Into<PathBuf>) -> Self {
        self.entry = entry.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// Absolute location of the entry file.
    pub fn entry_path(&self) -> PathBuf {
        self.root.join(&self.entry)
    }

    /// File name of the entry, used when a directory is requested.
    pub fn entry_file_name(&self) -> &Path {
        self.entry.file_name().map(Path::new).unwrap_or(&self.entry)
    }

    /// Strip this project's URL prefix from `request_path`.
    ///
    /// `/studio/chunk.js` yields `chunk.js`; the bare prefix without its
    /// trailing slash (`/studio`) yields an empty remainder.
    pub fn strip_prefix<'a>(&self, request_path: &'a str) -> Option<&'a str> {
        if let Some(rest) = request_path.strip_prefix(self.base_path.as_str()) {
            return Some(rest);
        }
        let bare = self.base_path.trim_end_matches('/');
        if !bare.is_empty() && request_path == bare {
            return Some("");
        }
        None
    }

    /// Whether `url_path` mentions this project, either under its prefix or
    /// as a whole path segment.
    pub fn is_named_by(&self, url_path: &str) -> bool {
        if self.strip_prefix(url_path).is_some() {
            return true;
        }
        url_path.split('/').any(|segment| segment == self.id)
    }
}
