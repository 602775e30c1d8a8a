//! Transport-independent request handling.
//!
//! [`StaticHandler::handle`] turns a [`Request`] into a [`Response`] without
//! knowing how either travelled, so the same code answers the tiny_http
//! listener and any custom protocol an embedding shell registers.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::sync::PoisonError;

use sitebridge_core::ErrorCategory;
use sitebridge_core::ProjectDescriptor;
use sitebridge_core::RequestContext;
use sitebridge_core::ResourceLocator;
use sitebridge_core::ServingContext;
use sitebridge_core::SiteBridgeConfig;
use sitebridge_core::Topology;
use sitebridge_core::html;
use sitebridge_core::mime;

/// Methods this server answers.
pub const ALLOWED_METHODS: &str = "GET, HEAD, OPTIONS";

const CORS_HEADERS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", ALLOWED_METHODS),
    ("Access-Control-Allow-Headers", "Content-Type"),
];

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Options,
    Other,
}

impl Method {
    pub fn parse(method: &str) -> Self {
        match method.to_ascii_uppercase().as_str() {
            "GET" => Self::Get,
            "HEAD" => Self::Head,
            "OPTIONS" => Self::Options,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Request<'a> {
    pub method: Method,
    /// Request target as sent, including any query string.
    pub url: &'a str,
    pub referer: Option<&'a str>,
}

impl<'a> Request<'a> {
    pub fn get(url: &'a str) -> Self {
        Self {
            method: Method::Get,
            url,
            referer: None,
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_referer(mut self, referer: Option<&'a str>) -> Self {
        self.referer = referer;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: Vec<u8>,
    /// Length of the entity. Equals `body.len()` except for `HEAD`.
    pub content_length: usize,
}

impl Response {
    fn new(status: u16, content_type: &str, body: Vec<u8>) -> Self {
        let mut headers: Vec<(&'static str, String)> = CORS_HEADERS
            .iter()
            .map(|&(name, value)| (name, value.to_string()))
            .collect();
        headers.push(("Content-Type", content_type.to_string()));
        Self {
            status,
            headers,
            content_length: body.len(),
            body,
        }
    }

    fn text(status: u16, body: &str) -> Self {
        Self::new(status, TEXT_PLAIN, body.as_bytes().to_vec())
    }

    fn not_found() -> Self {
        Self::text(404, "Not Found")
    }

    fn internal_error() -> Self {
        Self::text(500, "Internal Server Error")
    }

    fn preflight() -> Self {
        let mut response = Self::new(204, TEXT_PLAIN, Vec::new());
        response.headers.push(("Access-Control-Max-Age", "600".to_string()));
        response
    }

    fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    fn without_body(mut self) -> Self {
        self.body.clear();
        self
    }

    /// First value of header `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Answers requests for one server instance.
#[derive(Debug)]
pub struct StaticHandler {
    locator: ResourceLocator,
    contexts: HashMap<String, ServingContext>,
    recent: Mutex<Option<String>>,
}

impl StaticHandler {
    /// `contexts` maps project ids to the context their HTML is transformed
    /// for. Projects without one have their HTML served unmodified.
    pub fn new(locator: ResourceLocator, contexts: HashMap<String, ServingContext>) -> Self {
        Self {
            locator,
            contexts,
            recent: Mutex::new(None),
        }
    }

    /// Handler serving `projects` under `topology` with settings from `config`.
    pub fn from_config(
        config: &SiteBridgeConfig,
        topology: Topology,
        projects: Vec<ProjectDescriptor>,
    ) -> Self {
        let contexts = projects
            .iter()
            .map(|project| (project.id.clone(), config.serving_context(topology, project)))
            .collect();
        Self::new(config.locator(projects), contexts)
    }

    pub fn locator(&self) -> &ResourceLocator {
        &self.locator
    }

    pub fn handle(&self, request: &Request<'_>) -> Response {
        let response = match request.method {
            Method::Options => Response::preflight(),
            Method::Get => self.serve(request),
            Method::Head => self.serve(request).without_body(),
            Method::Other => {
                Response::text(405, "Method Not Allowed").with_header("Allow", ALLOWED_METHODS)
            }
        };
        tracing::info!("{:?} {} -> {}", request.method, request.url, response.status);
        response
    }

    fn serve(&self, request: &Request<'_>) -> Response {
        let recent = self.recent_project();
        let lookup = RequestContext::new(request.url)
            .with_referer(request.referer)
            .with_recent(recent.as_deref());
        let resolved = match self.locator.locate(&lookup) {
            Ok(resolved) => resolved,
            Err(err) => {
                tracing::debug!(category = err.category().as_str(), "{err}");
                return Response::not_found();
            }
        };
        let Some(project) = self.locator.project(&resolved.project_id) else {
            return Response::not_found();
        };
        self.remember(&project.id);

        let mut path = resolved.path;
        if path.is_dir() {
            let url_path = request.url.split(['?', '#']).next().unwrap_or_default();
            if !url_path.ends_with('/') {
                let query = &request.url[url_path.len()..];
                return Response::text(301, "Moved Permanently")
                    .with_header("Location", format!("{url_path}/{query}"));
            }
            path = path.join(project.entry_file_name());
            if !path.is_file() {
                tracing::debug!(project = %project.id, "no entry file at {}", path.display());
                return Response::not_found();
            }
        }

        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::error!(
                    project = %project.id,
                    category = ErrorCategory::IoError.as_str(),
                    "failed to read {}: {err}",
                    path.display()
                );
                return Response::internal_error();
            }
        };
        let body = if mime::is_html(&path) {
            self.transform_document(project, &path, bytes)
        } else {
            bytes
        };
        Response::new(200, &mime::content_type(&path), body)
    }

    fn transform_document(&self, project: &ProjectDescriptor, path: &Path, bytes: Vec<u8>) -> Vec<u8> {
        let Some(ctx) = self.contexts.get(&project.id) else {
            return bytes;
        };
        let document = match String::from_utf8(bytes) {
            Ok(document) => document,
            Err(err) => {
                tracing::warn!(
                    project = %project.id,
                    "{} is not UTF-8, serving unmodified",
                    path.display()
                );
                return err.into_bytes();
            }
        };
        match html::transform(&document, ctx) {
            Ok(transformed) => transformed.into_bytes(),
            Err(err) => {
                tracing::warn!(
                    project = %project.id,
                    category = err.category().as_str(),
                    "{}: {err}, serving unmodified",
                    path.display()
                );
                document.into_bytes()
            }
        }
    }

    fn recent_project(&self) -> Option<String> {
        self.recent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn remember(&self, project_id: &str) {
        let mut recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
        if recent.as_deref() != Some(project_id) {
            *recent = Some(project_id.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sitebridge_core::ProbeOrder;
    use std::fs;
    use tempfile::TempDir;

    const INDEX: &str = r#"<html><head><script src="/chunk.js"></script></head><body></body></html>"#;

    fn fixture() -> (TempDir, StaticHandler) {
        let dir = TempDir::new().unwrap_or_else(|e| panic!("tempdir: {e}"));
        let alpha = dir.path().join("alpha");
        let beta = dir.path().join("beta");
        for root in [&alpha, &beta] {
            fs::create_dir_all(root.join("assets")).unwrap_or_else(|e| panic!("mkdir: {e}"));
            fs::write(root.join("index.html"), INDEX).unwrap_or_else(|e| panic!("write: {e}"));
            fs::write(root.join("common.js"), root.display().to_string())
                .unwrap_or_else(|e| panic!("write: {e}"));
        }
        fs::write(alpha.join("chunk.js"), "alpha()").unwrap_or_else(|e| panic!("write: {e}"));
        fs::write(beta.join("fragment.html"), "<p>no landmarks</p>")
            .unwrap_or_else(|e| panic!("write: {e}"));
        fs::write(beta.join("latin1.html"), b"<head>caf\xe9</head>".as_slice())
            .unwrap_or_else(|e| panic!("write: {e}"));

        let projects = vec![
            ProjectDescriptor::new("alpha", alpha),
            ProjectDescriptor::new("beta", beta),
        ];
        let config = SiteBridgeConfig::default();
        (dir, StaticHandler::from_config(&config, Topology::PathPrefixed, projects))
    }

    #[test]
    fn options_answers_without_touching_disk() {
        let handler = StaticHandler::new(ResourceLocator::new(Vec::new()), HashMap::new());
        let response = handler.handle(&Request::get("/missing").with_method(Method::Options));
        assert_eq!(response.status, 204);
        assert_eq!(response.header("access-control-allow-origin"), Some("*"));
        assert_eq!(response.header("Access-Control-Allow-Methods"), Some(ALLOWED_METHODS));
        assert!(response.body.is_empty());
    }

    #[test]
    fn html_is_transformed_in_memory_only() {
        let (dir, handler) = fixture();
        let response = handler.handle(&Request::get("/alpha/index.html"));
        assert_eq!(response.status, 200);
        assert_eq!(response.header("Content-Type"), Some("text/html; charset=utf-8"));
        let body = String::from_utf8(response.body).unwrap_or_default();
        assert!(html::is_transformed(&body));
        assert!(body.contains(r#"<script src="/chunk.js"></script>"#));

        let on_disk = fs::read_to_string(dir.path().join("alpha/index.html"))
            .unwrap_or_else(|e| panic!("read: {e}"));
        assert_eq!(on_disk, INDEX);
    }

    #[test]
    fn directory_serves_entry_file() {
        let (_dir, handler) = fixture();
        let response = handler.handle(&Request::get("/beta/"));
        assert_eq!(response.status, 200);
        assert!(html::is_transformed(&String::from_utf8_lossy(&response.body)));

        let redirect = handler.handle(&Request::get("/beta?x=1"));
        assert_eq!(redirect.status, 301);
        assert_eq!(redirect.header("Location"), Some("/beta/?x=1"));
    }

    #[test]
    fn assets_are_served_verbatim_with_their_type() {
        let (_dir, handler) = fixture();
        let response = handler.handle(
            &Request::get("/chunk.js?v=3").with_referer(Some("http://localhost:5174/alpha/")),
        );
        assert_eq!(response.status, 200);
        assert_eq!(response.body, b"alpha()".to_vec());
        let content_type = response.header("content-type").unwrap_or_default();
        assert!(content_type.contains("javascript"), "{content_type}");
        assert!(content_type.ends_with("; charset=utf-8"), "{content_type}");
    }

    #[test]
    fn recent_project_bias_applies_when_enabled() {
        let (dir, handler) = fixture();
        let projects = handler.locator().projects().to_vec();
        let handler = StaticHandler::new(
            ResourceLocator::new(projects).with_probe_order(ProbeOrder::RecentFirst),
            HashMap::new(),
        );
        handler.handle(&Request::get("/beta/index.html"));
        let response = handler.handle(&Request::get("/common.js"));
        assert_eq!(
            String::from_utf8_lossy(&response.body),
            dir.path().join("beta").display().to_string()
        );
    }

    #[test]
    fn default_config_resolves_independently_of_history() {
        let (dir, handler) = fixture();
        let alpha = dir.path().join("alpha").display().to_string();
        let before = handler.handle(&Request::get("/common.js"));
        assert_eq!(String::from_utf8_lossy(&before.body), alpha);

        handler.handle(&Request::get("/beta/index.html"));
        let after = handler.handle(&Request::get("/common.js"));
        assert_eq!(after.status, 200);
        assert_eq!(String::from_utf8_lossy(&after.body), alpha);
    }

    #[test]
    fn unresolvable_documents_are_served_unmodified() {
        let (_dir, handler) = fixture();
        let fragment = handler.handle(&Request::get("/beta/fragment.html"));
        assert_eq!(fragment.status, 200);
        assert_eq!(fragment.body, b"<p>no landmarks</p>".to_vec());

        let latin1 = handler.handle(&Request::get("/beta/latin1.html"));
        assert_eq!(latin1.status, 200);
        assert_eq!(latin1.body, b"<head>caf\xe9</head>".to_vec());
    }

    #[test]
    fn misses_and_traversals_are_generic_404s() {
        let (_dir, handler) = fixture();
        for url in ["/nope.js", "/alpha/../../etc/passwd", "/alpha/%2e%2e/beta/index.html"] {
            let response = handler.handle(&Request::get(url));
            assert_eq!(response.status, 404, "{url}");
            assert_eq!(response.body, b"Not Found".to_vec());
        }
    }

    #[test]
    fn head_keeps_length_but_drops_body() {
        let (_dir, handler) = fixture();
        let get = handler.handle(&Request::get("/alpha/chunk.js"));
        let head = handler.handle(&Request::get("/alpha/chunk.js").with_method(Method::Head));
        assert_eq!(head.status, 200);
        assert!(head.body.is_empty());
        assert_eq!(head.content_length, get.body.len());
        assert_eq!(head.headers, get.headers);
    }

    #[test]
    fn other_methods_are_not_allowed() {
        let (_dir, handler) = fixture();
        let response = handler.handle(&Request::get("/alpha/index.html").with_method(Method::parse("post")));
        assert_eq!(response.status, 405);
        assert_eq!(response.header("Allow"), Some(ALLOWED_METHODS));
    }
}
