//! Serve several pre-built single-page bundles from shared infrastructure.
//!
//! Bundles are built with root-absolute asset URLs (`/assets/app.js`). Once
//! they are mounted under a path prefix, opened from disk or embedded in a
//! host shell those URLs point at the wrong place. This crate holds the
//! pieces that make them work anyway:
//! - [`locator`] maps a request path onto a file inside one project root
//! - [`html`] injects a base declaration plus a rewriting runtime into entry
//!   documents, and removes it again
//! - [`path_fixer`] renders that runtime for a [`ServingContext`]
//! - [`maintenance`] applies the transformer to bundles on disk

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod config;
pub mod error;
pub mod home_button;
pub mod html;
pub mod locator;
pub mod maintenance;
pub mod marker;
pub mod mime;
pub mod path_fixer;
pub mod project;
pub mod topology;

pub use config::SiteBridgeConfig;
pub use config::SupervisorConfig;
pub use error::ConfigError;
pub use error::ErrorCategory;
pub use error::HtmlError;
pub use error::LocateError;
pub use home_button::HomeButton;
pub use locator::ProbeOrder;
pub use locator::RequestContext;
pub use locator::Resolved;
pub use locator::ResourceLocator;
pub use locator::Strategy;
pub use marker::InjectionMarker;
pub use project::ProjectDescriptor;
pub use topology::ServingContext;
pub use topology::Topology;

/// Version written into logs and the `--version` output.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
