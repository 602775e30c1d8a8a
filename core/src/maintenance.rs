//! One-shot, on-disk variants of the transformer and restorer.
//!
//! These rewrite entry files in place and are meant to run once per file
//! from an install or build step, never concurrently and never from the
//! request path.

use std::ffi::OsStr;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use walkdir::WalkDir;

use crate::html;
use crate::topology::ServingContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    Changed,
    Unchanged,
    /// No landmark to inject into, or not UTF-8.
    Skipped,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub scanned: usize,
    pub changed: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

impl MaintenanceReport {
    fn record(&mut self, path: PathBuf, outcome: FileOutcome) {
        self.scanned += 1;
        match outcome {
            FileOutcome::Changed => self.changed.push(path),
            FileOutcome::Skipped => self.skipped.push(path),
            FileOutcome::Unchanged => {}
        }
    }

    pub fn merge(&mut self, other: MaintenanceReport) {
        self.scanned += other.scanned;
        self.changed.extend(other.changed);
        self.skipped.extend(other.skipped);
    }
}

/// Every file named `entry_name` under `root`, in sorted order.
pub fn entry_files(root: &Path, entry_name: &OsStr) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!("skipping unreadable entry under {}: {err}", root.display());
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == entry_name)
        .map(walkdir::DirEntry::into_path)
        .collect()
}

fn read_document(path: &Path) -> io::Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(err) if err.kind() == io::ErrorKind::InvalidData => {
            tracing::warn!("{} is not UTF-8, skipping", path.display());
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Clean legacy injections out of `path` and inject the current one.
pub fn inject_file(path: &Path, ctx: &ServingContext) -> io::Result<FileOutcome> {
    let Some(original) = read_document(path)? else {
        return Ok(FileOutcome::Skipped);
    };
    let cleaned = if html::is_transformed(&original) {
        original.clone()
    } else {
        html::restore_legacy(&original).html
    };
    let transformed = match html::transform(&cleaned, ctx) {
        Ok(transformed) => transformed,
        Err(err) => {
            tracing::warn!("{}: {err}, left untouched", path.display());
            return Ok(FileOutcome::Skipped);
        }
    };
    if transformed == original {
        return Ok(FileOutcome::Unchanged);
    }
    std::fs::write(path, transformed)?;
    tracing::info!("injected {}", path.display());
    Ok(FileOutcome::Changed)
}

/// Strip every injection from `path`. With `legacy`, marker-less injections
/// from older tooling go too.
pub fn restore_file(path: &Path, legacy: bool) -> io::Result<FileOutcome> {
    let Some(original) = read_document(path)? else {
        return Ok(FileOutcome::Skipped);
    };
    let restored = if legacy {
        html::restore_legacy(&original)
    } else {
        html::restore(&original)
    };
    if !restored.changed {
        return Ok(FileOutcome::Unchanged);
    }
    std::fs::write(path, restored.html)?;
    tracing::info!("restored {}", path.display());
    Ok(FileOutcome::Changed)
}

pub fn inject_tree(root: &Path, entry_name: &OsStr, ctx: &ServingContext) -> io::Result<MaintenanceReport> {
    let mut report = MaintenanceReport::default();
    for path in entry_files(root, entry_name) {
        let outcome = inject_file(&path, ctx)?;
        report.record(path, outcome);
    }
    Ok(report)
}

pub fn restore_tree(root: &Path, entry_name: &OsStr, legacy: bool) -> io::Result<MaintenanceReport> {
    let mut report = MaintenanceReport::default();
    for path in entry_files(root, entry_name) {
        let outcome = restore_file(&path, legacy)?;
        report.record(path, outcome);
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::Topology;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    const DOC: &str = "<!doctype html>\n<html><head><title>x</title></head><body></body></html>\n";

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap_or_else(|e| panic!("tempdir: {e}"));
        for sub in ["studio/dist", "project2/dist", "project2/dist/nested"] {
            fs::create_dir_all(dir.path().join(sub)).unwrap_or_else(|e| panic!("mkdir: {e}"));
            fs::write(dir.path().join(sub).join("index.html"), DOC)
                .unwrap_or_else(|e| panic!("write: {e}"));
        }
        fs::write(dir.path().join("studio/dist/about.html"), DOC)
            .unwrap_or_else(|e| panic!("write: {e}"));
        fs::write(dir.path().join("fragment.html"), "<p>x</p>").unwrap_or_else(|e| panic!("write: {e}"));
        dir
    }

    #[test]
    fn inject_then_restore_round_trips_on_disk() {
        let dir = tree();
        let ctx = ServingContext::new(Topology::LocalFile, "/");
        let name = OsStr::new("index.html");

        let first = inject_tree(dir.path(), name, &ctx).unwrap_or_else(|e| panic!("inject: {e}"));
        assert_eq!(first.scanned, 3);
        assert_eq!(first.changed.len(), 3);

        let second = inject_tree(dir.path(), name, &ctx).unwrap_or_else(|e| panic!("inject: {e}"));
        assert_eq!(second.changed.len(), 0);

        let about = fs::read_to_string(dir.path().join("studio/dist/about.html"))
            .unwrap_or_else(|e| panic!("read: {e}"));
        assert_eq!(about, DOC);

        let restored = restore_tree(dir.path(), name, false).unwrap_or_else(|e| panic!("restore: {e}"));
        assert_eq!(restored.changed.len(), 3);
        let index = fs::read_to_string(dir.path().join("studio/dist/index.html"))
            .unwrap_or_else(|e| panic!("read: {e}"));
        assert_eq!(index, DOC);
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let dir = tree();
        let ctx = ServingContext::new(Topology::LocalFile, "/");
        let report = inject_tree(dir.path(), OsStr::new("fragment.html"), &ctx)
            .unwrap_or_else(|e| panic!("inject: {e}"));
        assert_eq!(report.skipped, vec![dir.path().join("fragment.html")]);
        assert!(report.changed.is_empty());
    }

    #[test]
    fn legacy_injection_is_replaced() {
        let dir = TempDir::new().unwrap_or_else(|e| panic!("tempdir: {e}"));
        let path = dir.path().join("index.html");
        fs::write(
            &path,
            "<html><head><base href=\"./\"><script>console.log('[PathFixer] on');</script></head></html>",
        )
        .unwrap_or_else(|e| panic!("write: {e}"));

        let ctx = ServingContext::new(Topology::LocalFile, "/");
        assert_eq!(inject_file(&path, &ctx).ok(), Some(FileOutcome::Changed));
        let text = fs::read_to_string(&path).unwrap_or_else(|e| panic!("read: {e}"));
        assert!(!text.contains("[PathFixer]"));
        assert_eq!(text.matches("<base ").count(), 1);
        assert!(html::is_transformed(&text));
    }

    #[test]
    fn restore_touches_legacy_content_only_when_asked() {
        let dir = TempDir::new().unwrap_or_else(|e| panic!("tempdir: {e}"));
        let path = dir.path().join("index.html");
        let doc = "<html><head><base href=\"./\"><script>PathFixer.boot();</script></head></html>";
        fs::write(&path, doc).unwrap_or_else(|e| panic!("write: {e}"));

        assert_eq!(restore_file(&path, false).ok(), Some(FileOutcome::Unchanged));
        let text = fs::read_to_string(&path).unwrap_or_else(|e| panic!("read: {e}"));
        assert_eq!(text, doc);

        assert_eq!(restore_file(&path, true).ok(), Some(FileOutcome::Changed));
        let text = fs::read_to_string(&path).unwrap_or_else(|e| panic!("read: {e}"));
        assert_eq!(text, "<html><head></head></html>");
    }
}
