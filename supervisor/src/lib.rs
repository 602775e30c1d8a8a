//! Server topology manager.
//!
//! Starts one `sitebridge serve` process per dedicated origin (or a single
//! shared one), keeps going when some of them fail to start, and forwards
//! termination to every child before exiting.

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod plan;
pub mod signal;
pub mod supervisor;

pub use plan::InstanceSpec;
pub use plan::plan_instances;
pub use supervisor::Supervisor;
pub use supervisor::SupervisorReport;

use sitebridge_core::ErrorCategory;

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("no instance survived startup ({failed} failed)")]
    NoInstances { failed: usize },
}

impl SupervisorError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NoInstances { .. } => ErrorCategory::InstanceStartupFailure,
        }
    }
}
