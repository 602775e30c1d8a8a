//! Resource locator.
//!
//! Maps a root-absolute-looking request path onto a file inside one of the
//! known project roots. There is no manifest saying which asset belongs to
//! which project, so resolution is heuristic, in priority order:
//!
//! 1. the path starts with a project's URL prefix;
//! 2. the referer names a project;
//! 3. every project root is probed in declared order, or with
//!    `ProbeOrder::RecentFirst` the most recently matched project first.
//!
//! Known limitation: when two projects ship a file at the same relative path
//! and neither the prefix nor the referer disambiguates, the first project in
//! probe order wins. Under the default `ProbeOrder::Declared` that is always
//! the first declared project, whatever was requested before.
//!
//! A symlink that leaves its root stops resolution only when the prefix
//! pinned the project. Elsewhere that root is skipped with a security log and
//! the next candidate is tried.

use std::borrow::Cow;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::LocateError;
use crate::project::ProjectDescriptor;

/// Log target for security-relevant rejections.
pub const SECURITY_TARGET: &str = "sitebridge::security";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProbeOrder {
    /// Always probe in declared order.
    #[default]
    Declared,
    /// Try the most recently matched project before the declared order.
    /// Resolution then depends on request history.
    RecentFirst,
}

/// Which step of the algorithm produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Prefix,
    Referer,
    Probe,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prefix => "prefix",
            Self::Referer => "referer",
            Self::Probe => "probe",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Existing file or directory under the project's root.
    pub path: PathBuf,
    pub project_id: String,
    pub strategy: Strategy,
}

/// One lookup. Consumed by the locator and not kept afterwards.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestContext<'a> {
    /// Raw request target, possibly with query string and percent escapes.
    pub path: &'a str,
    pub referer: Option<&'a str>,
    /// Project id that matched most recently on this instance.
    pub recent: Option<&'a str>,
}

impl<'a> RequestContext<'a> {
    pub fn new(path: &'a str) -> Self {
        Self {
            path,
            referer: None,
            recent: None,
        }
    }

    pub fn with_referer(mut self, referer: Option<&'a str>) -> Self {
        self.referer = referer;
        self
    }

    pub fn with_recent(mut self, recent: Option<&'a str>) -> Self {
        self.recent = recent;
        self
    }
}

enum Probe {
    Found(PathBuf),
    Missing,
    Escaped,
}

#[derive(Debug, Clone)]
pub struct ResourceLocator {
    projects: Vec<ProjectDescriptor>,
    probe_order: ProbeOrder,
}

impl ResourceLocator {
    pub fn new(projects: Vec<ProjectDescriptor>) -> Self {
        Self {
            projects,
            probe_order: ProbeOrder::default(),
        }
    }

    pub fn with_probe_order(mut self, probe_order: ProbeOrder) -> Self {
        self.probe_order = probe_order;
        self
    }

    pub fn projects(&self) -> &[ProjectDescriptor] {
        &self.projects
    }

    pub fn project(&self, id: &str) -> Option<&ProjectDescriptor> {
        self.projects.iter().find(|p| p.id == id)
    }

    /// Resolve `request` to an existing path, or explain why not.
    pub fn locate(&self, request: &RequestContext<'_>) -> Result<Resolved, LocateError> {
        let path = match normalize_request_path(request.path) {
            Ok(path) => path,
            Err(err) => {
                tracing::warn!(target: SECURITY_TARGET, "rejected request path {:?}", request.path);
                return Err(err);
            }
        };
        let traversal = || LocateError::TraversalRejected {
            request_path: request.path.to_string(),
        };

        for project in &self.projects {
            let Some(rest) = project.strip_prefix(&path) else {
                continue;
            };
            return match probe(&project.root, rest) {
                Probe::Found(found) => Ok(self.resolved(found, project, Strategy::Prefix)),
                Probe::Escaped => Err(traversal()),
                Probe::Missing => {
                    tracing::debug!(project = %project.id, "prefix matched but {path} is missing");
                    Err(LocateError::NotFound {
                        request_path: request.path.to_string(),
                    })
                }
            };
        }

        if let Some(referer) = request.referer
            && let Some(project) = self.project_from_referer(referer)
        {
            match probe(&project.root, &path) {
                Probe::Found(found) => return Ok(self.resolved(found, project, Strategy::Referer)),
                Probe::Escaped => skip_escaped(project, &path),
                Probe::Missing => {
                    tracing::debug!(
                        project = %project.id,
                        "referer named project but {path} is missing there, probing"
                    );
                }
            }
        }

        for project in self.probe_sequence(request.recent) {
            match probe(&project.root, &path) {
                Probe::Found(found) => return Ok(self.resolved(found, project, Strategy::Probe)),
                Probe::Escaped => skip_escaped(project, &path),
                Probe::Missing => {}
            }
        }

        tracing::debug!("no project contains {path}");
        Err(LocateError::NotFound {
            request_path: request.path.to_string(),
        })
    }

    fn resolved(&self, path: PathBuf, project: &ProjectDescriptor, strategy: Strategy) -> Resolved {
        tracing::debug!(
            project = %project.id,
            strategy = strategy.as_str(),
            "resolved {}",
            path.display()
        );
        Resolved {
            path,
            project_id: project.id.clone(),
            strategy,
        }
    }

    /// First project whose prefix matches the referer path, else the first
    /// one named by a path segment.
    fn project_from_referer(&self, referer: &str) -> Option<&ProjectDescriptor> {
        let referer_path: Cow<'_, str> = match url::Url::parse(referer) {
            Ok(url) => Cow::Owned(url.path().to_string()),
            Err(_) if referer.starts_with('/') => Cow::Borrowed(referer),
            Err(_) => return None,
        };
        self.projects
            .iter()
            .find(|p| p.strip_prefix(&referer_path).is_some())
            .or_else(|| self.projects.iter().find(|p| p.is_named_by(&referer_path)))
    }

    fn probe_sequence<'s>(&'s self, recent: Option<&str>) -> Vec<&'s ProjectDescriptor> {
        let mut order: Vec<&ProjectDescriptor> = self.projects.iter().collect();
        if self.probe_order == ProbeOrder::RecentFirst
            && let Some(recent) = recent
            && let Some(idx) = order.iter().position(|p| p.id == recent)
        {
            let project = order.remove(idx);
            order.insert(0, project);
        }
        order
    }
}

/// Strip query and fragment, percent-decode, and reject anything that could
/// climb out of a root.
pub fn normalize_request_path(raw: &str) -> Result<String, LocateError> {
    let without_query = raw.split(['?', '#']).next().unwrap_or_default();
    let decoded = urlencoding::decode(without_query)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| without_query.to_string());

    let escapes = decoded.contains('\\')
        || decoded.contains('\0')
        || decoded.split('/').any(|segment| segment == "..");
    if escapes {
        return Err(LocateError::TraversalRejected {
            request_path: raw.to_string(),
        });
    }
    Ok(decoded)
}

/// Build a relative path from URL segments, keeping only plain names.
fn relative_path(url_path: &str) -> PathBuf {
    url_path
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .filter(|segment| {
            let mut components = Path::new(segment).components();
            matches!(
                (components.next(), components.next()),
                (Some(Component::Normal(_)), None)
            )
        })
        .collect()
}

fn skip_escaped(project: &ProjectDescriptor, url_path: &str) {
    tracing::debug!(project = %project.id, "skipping escaped {url_path}, trying next root");
}

fn probe(root: &Path, url_path: &str) -> Probe {
    let candidate = root.join(relative_path(url_path));
    if !candidate.exists() {
        return Probe::Missing;
    }
    match (root.canonicalize(), candidate.canonicalize()) {
        (Ok(canonical_root), Ok(canonical)) if canonical.starts_with(&canonical_root) => {
            Probe::Found(candidate)
        }
        (Ok(_), Ok(canonical)) => {
            tracing::warn!(
                target: SECURITY_TARGET,
                "{} resolves outside its root to {}",
                candidate.display(),
                canonical.display()
            );
            Probe::Escaped
        }
        _ => Probe::Missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, Vec<ProjectDescriptor>) {
        let dir = TempDir::new().unwrap_or_else(|e| panic!("tempdir: {e}"));
        let alpha = dir.path().join("alpha");
        let beta = dir.path().join("beta");
        for root in [&alpha, &beta] {
            fs::create_dir_all(root.join("assets")).unwrap_or_else(|e| panic!("mkdir: {e}"));
            fs::write(root.join("index.html"), "<html><head></head></html>")
                .unwrap_or_else(|e| panic!("write: {e}"));
            fs::write(root.join("shared.js"), root.display().to_string())
                .unwrap_or_else(|e| panic!("write: {e}"));
        }
        fs::write(alpha.join("chunk.js"), "alpha").unwrap_or_else(|e| panic!("write: {e}"));
        fs::write(beta.join("assets/logo.png"), "beta").unwrap_or_else(|e| panic!("write: {e}"));
        let projects = vec![
            ProjectDescriptor::new("alpha", alpha),
            ProjectDescriptor::new("beta", beta),
        ];
        (dir, projects)
    }

    #[test]
    fn prefix_match_strips_project_segment() {
        let (_dir, projects) = fixture();
        let locator = ResourceLocator::new(projects.clone());
        let resolved = locator
            .locate(&RequestContext::new("/beta/assets/logo.png?v=3"))
            .unwrap_or_else(|e| panic!("locate: {e}"));
        assert_eq!(resolved.path, projects[1].root.join("assets/logo.png"));
        assert_eq!(resolved.project_id, "beta");
        assert_eq!(resolved.strategy, Strategy::Prefix);
    }

    #[test]
    fn prefix_match_does_not_fall_through() {
        let (_dir, projects) = fixture();
        let locator = ResourceLocator::new(projects);
        let err = locator.locate(&RequestContext::new("/beta/chunk.js"));
        assert!(matches!(err, Err(LocateError::NotFound { .. })));
    }

    #[test]
    fn referer_selects_project() {
        let (_dir, projects) = fixture();
        let locator = ResourceLocator::new(projects.clone());
        let request = RequestContext::new("/chunk.js")
            .with_referer(Some("http://host/alpha/index.html"));
        let resolved = locator
            .locate(&request)
            .unwrap_or_else(|e| panic!("locate: {e}"));
        assert_eq!(resolved.path, projects[0].root.join("chunk.js"));
        assert_eq!(resolved.strategy, Strategy::Referer);
    }

    #[test]
    fn referer_miss_falls_back_to_probing() {
        let (_dir, projects) = fixture();
        let locator = ResourceLocator::new(projects.clone());
        let request = RequestContext::new("/assets/logo.png")
            .with_referer(Some("http://host/alpha/index.html"));
        let resolved = locator
            .locate(&request)
            .unwrap_or_else(|e| panic!("locate: {e}"));
        assert_eq!(resolved.project_id, "beta");
        assert_eq!(resolved.strategy, Strategy::Probe);
    }

    #[test]
    fn probing_is_deterministic_in_declared_order() {
        let (_dir, projects) = fixture();
        let locator = ResourceLocator::new(projects).with_probe_order(ProbeOrder::Declared);
        for recent in [None, Some("beta"), Some("alpha")] {
            let resolved = locator
                .locate(&RequestContext::new("/shared.js").with_recent(recent))
                .unwrap_or_else(|e| panic!("locate: {e}"));
            assert_eq!(resolved.project_id, "alpha");
        }
    }

    #[test]
    fn declared_order_is_the_default() {
        let (_dir, projects) = fixture();
        let locator = ResourceLocator::new(projects);
        let resolved = locator
            .locate(&RequestContext::new("/shared.js").with_recent(Some("beta")))
            .unwrap_or_else(|e| panic!("locate: {e}"));
        assert_eq!(resolved.project_id, "alpha");
    }

    #[test]
    fn recent_project_is_probed_first() {
        let (_dir, projects) = fixture();
        let locator = ResourceLocator::new(projects).with_probe_order(ProbeOrder::RecentFirst);
        let resolved = locator
            .locate(&RequestContext::new("/shared.js").with_recent(Some("beta")))
            .unwrap_or_else(|e| panic!("locate: {e}"));
        assert_eq!(resolved.project_id, "beta");

        let resolved = locator
            .locate(&RequestContext::new("/shared.js"))
            .unwrap_or_else(|e| panic!("locate: {e}"));
        assert_eq!(resolved.project_id, "alpha");
    }

    #[test]
    fn traversal_is_rejected_before_resolution() {
        let (_dir, projects) = fixture();
        let locator = ResourceLocator::new(projects);
        for raw in [
            "/../../etc/passwd",
            "/alpha/../../etc/passwd",
            "/%2e%2e/%2e%2e/etc/passwd",
            "/alpha/..%2fbeta/chunk.js",
            "/alpha\\..\\beta",
        ] {
            let err = locator.locate(&RequestContext::new(raw));
            assert!(
                matches!(err, Err(LocateError::TraversalRejected { .. })),
                "{raw} should be rejected, got {err:?}"
            );
        }
    }

    #[test]
    fn root_request_resolves_to_a_project_directory() {
        let (_dir, projects) = fixture();
        let locator = ResourceLocator::new(projects.clone());
        let resolved = locator
            .locate(&RequestContext::new("/"))
            .unwrap_or_else(|e| panic!("locate: {e}"));
        assert_eq!(resolved.path, projects[0].root);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escape_is_rejected() {
        let (dir, projects) = fixture();
        let outside = dir.path().join("secret.txt");
        fs::write(&outside, "secret").unwrap_or_else(|e| panic!("write: {e}"));
        std::os::unix::fs::symlink(&outside, projects[0].root.join("leak.txt"))
            .unwrap_or_else(|e| panic!("symlink: {e}"));

        let locator = ResourceLocator::new(projects);
        let err = locator.locate(&RequestContext::new("/alpha/leak.txt"));
        assert!(matches!(err, Err(LocateError::TraversalRejected { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn escaping_symlink_does_not_shadow_a_later_root() {
        let (dir, projects) = fixture();
        let outside = dir.path().join("secret.txt");
        fs::write(&outside, "secret").unwrap_or_else(|e| panic!("write: {e}"));
        std::os::unix::fs::symlink(&outside, projects[0].root.join("theme.css"))
            .unwrap_or_else(|e| panic!("symlink: {e}"));
        fs::write(projects[1].root.join("theme.css"), "beta")
            .unwrap_or_else(|e| panic!("write: {e}"));

        let locator = ResourceLocator::new(projects.clone());
        let resolved = locator
            .locate(&RequestContext::new("/theme.css"))
            .unwrap_or_else(|e| panic!("locate: {e}"));
        assert_eq!(resolved.project_id, "beta");
        assert_eq!(resolved.path, projects[1].root.join("theme.css"));
        assert_eq!(resolved.strategy, Strategy::Probe);

        let via_referer = locator
            .locate(
                &RequestContext::new("/theme.css")
                    .with_referer(Some("http://host/alpha/index.html")),
            )
            .unwrap_or_else(|e| panic!("locate: {e}"));
        assert_eq!(via_referer.project_id, "beta");

        fs::remove_file(projects[1].root.join("theme.css"))
            .unwrap_or_else(|e| panic!("remove: {e}"));
        let err = locator.locate(&RequestContext::new("/theme.css"));
        assert!(matches!(err, Err(LocateError::NotFound { .. })), "{err:?}");
    }
}
