//! Error types for sitebridge.
//!
//! Every failure is handled at the layer where it occurs and turned into a
//! response code or a skip decision. The categories below are what ends up in
//! logs so operators can grep for them.

use std::path::PathBuf;

use thiserror::Error;

/// Error category for structured logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Every resolution strategy was exhausted
    ResourceNotFound,
    /// A request path tried to leave its project root
    PathTraversalRejected,
    /// No `<head>`, `</head>` or `</body>` landmark to inject into
    MalformedDocument,
    /// A server instance could not bind its origin or exited during startup
    InstanceStartupFailure,
    /// `sitebridge.toml` missing or invalid
    ConfigError,
    /// Unexpected filesystem failure
    IoError,
}

impl ErrorCategory {
    /// Machine-readable code for logging
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResourceNotFound => "RESOURCE_NOT_FOUND",
            Self::PathTraversalRejected => "PATH_TRAVERSAL_REJECTED",
            Self::MalformedDocument => "MALFORMED_DOCUMENT",
            Self::InstanceStartupFailure => "INSTANCE_STARTUP_FAILURE",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure to map a request onto a file.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocateError {
    #[error("no project contains {request_path}")]
    NotFound { request_path: String },

    #[error("rejected traversal attempt: {request_path}")]
    TraversalRejected { request_path: String },
}

impl LocateError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::ResourceNotFound,
            Self::TraversalRejected { .. } => ErrorCategory::PathTraversalRejected,
        }
    }
}

/// Failure to splice the injection into a document.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HtmlError {
    #[error("document has no <head>, </head> or </body> landmark")]
    MalformedDocument,
}

impl HtmlError {
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::MalformedDocument
    }
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("duplicate project id '{id}'")]
    DuplicateProject { id: String },

    #[error("project '{id}': base_path '{base_path}' must start and end with '/'")]
    InvalidBasePath { id: String, base_path: String },

    #[error("project '{id}': id must be a single non-empty path segment")]
    InvalidProjectId { id: String },

    #[error("unknown project '{id}'")]
    UnknownProject { id: String },

    #[error("project '{id}' has no port for a dedicated origin")]
    MissingPort { id: String },
}

impl ConfigError {
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::ConfigError
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn locate_errors_keep_distinct_categories() {
        let traversal = LocateError::TraversalRejected {
            request_path: "/../etc/passwd".to_string(),
        };
        let missing = LocateError::NotFound {
            request_path: "/nope.js".to_string(),
        };
        assert_eq!(missing.category(), ErrorCategory::ResourceNotFound);
        assert_eq!(traversal.category().as_str(), "PATH_TRAVERSAL_REJECTED");
    }
}
