//! tiny_http transport for [`StaticHandler`].
//!
//! One thread pulls requests off the listener and answers each to
//! completion before taking the next.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::thread;

use crate::ServeError;
use crate::handler::Method;
use crate::handler::Request;
use crate::handler::Response;
use crate::handler::StaticHandler;

pub struct StaticServer {
    server: Arc<tiny_http::Server>,
    handler: Arc<StaticHandler>,
    local_addr: SocketAddr,
    stopped: Arc<AtomicBool>,
}

/// Stops a running [`StaticServer`] from another thread.
#[derive(Clone)]
pub struct ShutdownHandle {
    server: Arc<tiny_http::Server>,
    stopped: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            self.server.unblock();
        }
    }
}

impl StaticServer {
    /// Bind `addr` (`host:port`, port 0 for any free port).
    pub fn bind(addr: &str, handler: StaticHandler) -> Result<Self, ServeError> {
        let bind_error = |message: String| ServeError::Bind {
            addr: addr.to_string(),
            message,
        };
        let server = tiny_http::Server::http(addr).map_err(|err| bind_error(err.to_string()))?;
        let local_addr = server
            .server_addr()
            .to_ip()
            .ok_or_else(|| bind_error("listener has no IP address".to_string()))?;
        Ok(Self {
            server: Arc::new(server),
            handler: Arc::new(handler),
            local_addr,
            stopped: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            server: Arc::clone(&self.server),
            stopped: Arc::clone(&self.stopped),
        }
    }

    /// Serve until [`ShutdownHandle::shutdown`] is called.
    pub fn run(&self) {
        tracing::info!("listening on http://{}", self.local_addr);
        while !self.stopped.load(Ordering::SeqCst) {
            match self.server.recv() {
                Ok(request) => self.respond(request),
                Err(_) if self.stopped.load(Ordering::SeqCst) => break,
                Err(err) => tracing::warn!("failed to accept request: {err}"),
            }
        }
        tracing::info!("stopped listening on http://{}", self.local_addr);
    }

    /// Run on a background thread.
    pub fn spawn(self) -> (ShutdownHandle, thread::JoinHandle<()>) {
        let handle = self.shutdown_handle();
        let join = thread::spawn(move || self.run());
        (handle, join)
    }

    fn respond(&self, request: tiny_http::Request) {
        let response = {
            let referer = request
                .headers()
                .iter()
                .find(|header| header.field.equiv("Referer"))
                .map(|header| header.value.as_str());
            let incoming = Request {
                method: Method::parse(request.method().as_str()),
                url: request.url(),
                referer,
            };
            self.handler.handle(&incoming)
        };
        if let Err(err) = request.respond(into_tiny_http(response)) {
            tracing::debug!("client went away: {err}");
        }
    }
}

fn into_tiny_http(response: Response) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    let head_only = response.body.len() != response.content_length;
    let mut reply = tiny_http::Response::from_data(response.body)
        .with_status_code(tiny_http::StatusCode(response.status));
    for (name, value) in &response.headers {
        match tiny_http::Header::from_bytes(name.as_bytes(), value.as_bytes()) {
            Ok(header) => reply.add_header(header),
            Err(()) => tracing::warn!("dropping unrepresentable header {name}"),
        }
    }
    if head_only
        && let Ok(header) = tiny_http::Header::from_bytes(
            &b"Content-Length"[..],
            response.content_length.to_string().as_bytes(),
        )
    {
        reply.add_header(header);
    }
    reply
}
