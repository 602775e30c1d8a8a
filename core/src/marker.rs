//! Injection markers.
//!
//! A marker is an HTML comment naming the injection and the version that
//! wrote it, e.g. `<!-- sitebridge:path-fixer v1 -->`. A document carries at
//! most one marker per injection kind. Its presence is the only signal the
//! transformer uses to decide "already done", and the only anchor the
//! restorer uses to find what to remove.

use std::ops::Range;

const MARKER_PREFIX: &str = "<!-- sitebridge:";
const MARKER_SUFFIX: &str = " -->";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InjectionMarker {
    kind: &'static str,
    version: u32,
}

/// Marks the base declaration plus path-fixer runtime.
pub const PATH_FIXER: InjectionMarker = InjectionMarker::new("path-fixer", 1);

/// Marks the return-to-host control.
pub const HOME_BUTTON: InjectionMarker = InjectionMarker::new("home-button", 1);

impl InjectionMarker {
    pub const fn new(kind: &'static str, version: u32) -> Self {
        Self { kind, version }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// The comment written by this version.
    pub fn render(&self) -> String {
        format!("{MARKER_PREFIX}{} v{}{MARKER_SUFFIX}", self.kind, self.version)
    }

    /// Byte range of the first marker of this kind, written by any version.
    pub fn find(&self, document: &str) -> Option<Range<usize>> {
        let needle = format!("{MARKER_PREFIX}{} v", self.kind);
        let mut from = 0;
        while let Some(offset) = document[from..].find(&needle) {
            let start = from + offset;
            let digits_start = start + needle.len();
            let digits = document[digits_start..]
                .bytes()
                .take_while(u8::is_ascii_digit)
                .count();
            let tail = digits_start + digits;
            if digits > 0 && document[tail..].starts_with(MARKER_SUFFIX) {
                return Some(start..tail + MARKER_SUFFIX.len());
            }
            from = digits_start;
        }
        None
    }

    pub fn is_present(&self, document: &str) -> bool {
        self.find(document).is_some()
    }
}
