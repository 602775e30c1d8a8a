//! Static file server for side-by-side single-page bundles.
//!
//! Requests resolve through the core locator; HTML entry documents are
//! transformed in memory on the way out and never rewritten on disk.

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod handler;
pub mod listener;

pub use handler::Method;
pub use handler::Request;
pub use handler::Response;
pub use handler::StaticHandler;
pub use listener::ShutdownHandle;
pub use listener::StaticServer;

use sitebridge_core::ErrorCategory;

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("failed to bind {addr}: {message}")]
    Bind { addr: String, message: String },
}

impl ServeError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Bind { .. } => ErrorCategory::InstanceStartupFailure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn bind_failures_are_startup_failures() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap_or_else(|e| panic!("bind: {e}"));
        let addr = taken
            .local_addr()
            .unwrap_or_else(|e| panic!("addr: {e}"))
            .to_string();
        let handler = StaticHandler::new(
            sitebridge_core::ResourceLocator::new(Vec::new()),
            std::collections::HashMap::new(),
        );
        let Err(err) = StaticServer::bind(&addr, handler) else {
            panic!("second bind on {addr} should fail");
        };
        assert_eq!(err.category(), ErrorCategory::InstanceStartupFailure);
        assert!(err.to_string().contains(&addr));
    }
}
