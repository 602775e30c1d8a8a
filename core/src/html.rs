//! HTML transformer and restorer.
//!
//! Documents arrive as raw text from disk, so the injection is a textual
//! splice anchored on structural landmarks rather than a DOM edit:
//!
//! - right after the opening `<head ...>` tag, else
//! - right before `</head>`, else
//! - right before `</body>`.
//!
//! The spliced block is the base declaration, the path-fixer `<script>` and
//! the [`PATH_FIXER`](crate::marker::PATH_FIXER) marker, in that order. The
//! transformer never touches existing attributes; rewriting them is the
//! runtime's job in the browser.

use std::ops::Range;
use std::sync::LazyLock;

use regex_lite::Regex;

use crate::error::HtmlError;
use crate::home_button;
use crate::marker::HOME_BUTTON;
use crate::marker::InjectionMarker;
use crate::marker::PATH_FIXER;
use crate::path_fixer;
use crate::topology::ServingContext;

/// Attribute identifying the injected `<base>` element.
pub const BASE_ATTRIBUTE: &str = r#"data-sitebridge="base""#;

/// Upper bound on the distance between a block's opening tag and its marker.
const MAX_BLOCK_BYTES: usize = 64 * 1024;

/// Legacy injections carried no marker; these strings identify their scripts.
const LEGACY_SIGNATURES: [&str; 2] = ["PathFixer", "isTauriAsset"];

/// Legacy script blocks larger than this are left alone.
const LEGACY_MAX_BYTES: usize = 16 * 1024;

static HEAD_OPEN: LazyLock<Regex> = LazyLock::new(|| compile(r"(?i)<head(?:\s[^>]*)?>"));
static HEAD_CLOSE: LazyLock<Regex> = LazyLock::new(|| compile(r"(?i)</head\s*>"));
static BODY_CLOSE: LazyLock<Regex> = LazyLock::new(|| compile(r"(?i)</body\s*>"));
static INJECTED_BASE: LazyLock<Regex> =
    LazyLock::new(|| compile(r#"<base [^>]*data-sitebridge="base"[^>]*>"#));
static LEGACY_BASE: LazyLock<Regex> =
    LazyLock::new(|| compile(r#"(?i)<base\s+href=["']\./["']\s*/?>"#));
static BLANK_RUNS: LazyLock<Regex> = LazyLock::new(|| compile(r"\n[ \t]*\n[ \t]*\n(?:[ \t]*\n)*"));

#[allow(clippy::expect_used)]
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static pattern compiles")
}

/// Where an injection was spliced in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    AfterHeadOpen,
    BeforeHeadClose,
    BeforeBodyClose,
}

/// Result of [`restore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Restored {
    pub html: String,
    pub changed: bool,
}

/// Whether `document` already carries the path-fixer injection.
pub fn is_transformed(document: &str) -> bool {
    PATH_FIXER.is_present(document)
}

/// The exact text spliced into a document for `ctx`.
pub fn injection_block(ctx: &ServingContext) -> String {
    format!(
        "<base href=\"{}\" {BASE_ATTRIBUTE}>{}{}",
        escape_attribute(ctx.base_href()),
        path_fixer::payload_script(ctx),
        PATH_FIXER.render()
    )
}

/// Inject the base declaration and runtime into `document`.
///
/// Returns the document unchanged when its marker is already present, so
/// `transform(transform(d)) == transform(d)`. Fails with
/// [`HtmlError::MalformedDocument`] when there is no landmark to anchor on.
pub fn transform(document: &str, ctx: &ServingContext) -> Result<String, HtmlError> {
    let home = ctx.home_button.as_ref().filter(|button| button.enabled);
    let needs_fixer = !PATH_FIXER.is_present(document);
    let needs_home = home.is_some() && !HOME_BUTTON.is_present(document);
    if !needs_fixer && !needs_home {
        return Ok(document.to_string());
    }

    let mut html = document.to_string();
    if needs_fixer {
        let (at, anchor) = head_anchor(&html).ok_or(HtmlError::MalformedDocument)?;
        html.insert_str(at, &injection_block(ctx));
        tracing::trace!(?anchor, kind = PATH_FIXER.kind(), topology = %ctx.topology, "spliced");
    }
    if let Some(button) = home
        && needs_home
    {
        match tail_anchor(&html) {
            Some((at, _)) => {
                let block = format!("{}{}", button.render(), HOME_BUTTON.render());
                html.insert_str(at, &block);
            }
            None => tracing::debug!("no </body> or </head> for the home button, skipping"),
        }
    }
    Ok(html)
}

/// Remove every sitebridge injection.
///
/// Only marked blocks and `<base>` elements carrying [`BASE_ATTRIBUTE`] are
/// touched, so a document that was never transformed comes back verbatim
/// with `changed == false`.
pub fn restore(document: &str) -> Restored {
    let mut html = document.to_string();
    remove_marked_blocks(&mut html, PATH_FIXER, path_fixer::SCRIPT_OPEN);
    remove_marked_blocks(&mut html, HOME_BUTTON, home_button::BLOCK_OPEN);
    html = INJECTED_BASE.replace_all(&html, "").into_owned();

    let changed = html != document;
    Restored { html, changed }
}

/// [`restore`], then also drop marker-less injections written by older
/// tooling: small scripts carrying a legacy signature and, when one was
/// found, a bare `<base href="./">`.
///
/// Only for bundles known to have been rewritten by that tooling; a
/// project's own script may match the signatures.
pub fn restore_legacy(document: &str) -> Restored {
    let Restored { mut html, .. } = restore(document);
    let (cleaned, legacy_found) = remove_legacy_scripts(&html);
    if legacy_found {
        tracing::debug!("removed legacy injection");
        html = LEGACY_BASE.replace_all(&cleaned, "").into_owned();
        html = BLANK_RUNS.replace_all(&html, "\n\n").into_owned();
    }
    let changed = html != document;
    Restored { html, changed }
}

fn remove_marked_blocks(html: &mut String, marker: InjectionMarker, open: &str) {
    while let Some(range) = marked_block(html, marker, open) {
        tracing::trace!(
            kind = marker.kind(),
            version = marker.version(),
            "removing {} bytes",
            range.len()
        );
        html.replace_range(range, "");
    }
}

fn head_anchor(html: &str) -> Option<(usize, Anchor)> {
    if let Some(m) = HEAD_OPEN.find(html) {
        return Some((m.end(), Anchor::AfterHeadOpen));
    }
    if let Some(m) = HEAD_CLOSE.find(html) {
        return Some((m.start(), Anchor::BeforeHeadClose));
    }
    BODY_CLOSE
        .find(html)
        .map(|m| (m.start(), Anchor::BeforeBodyClose))
}

fn tail_anchor(html: &str) -> Option<(usize, Anchor)> {
    if let Some(m) = BODY_CLOSE.find(html) {
        return Some((m.start(), Anchor::BeforeBodyClose));
    }
    HEAD_CLOSE
        .find(html)
        .map(|m| (m.start(), Anchor::BeforeHeadClose))
}

/// Range of the block ending in `marker`.
///
/// The block starts at `open` (or at an injected `<base>` immediately before
/// it) no further than [`MAX_BLOCK_BYTES`] back. When
/// no opening is found in that window only the marker itself is removed.
fn marked_block(html: &str, marker: InjectionMarker, open: &str) -> Option<Range<usize>> {
    let marker_range = marker.find(html)?;
    let mut window_start = marker_range.start.saturating_sub(MAX_BLOCK_BYTES);
    while !html.is_char_boundary(window_start) {
        window_start += 1;
    }
    let window = &html[window_start..marker_range.start];

    let Some(open_offset) = window.rfind(open) else {
        return Some(marker_range);
    };
    let mut start = window_start + open_offset;

    let before = &html[window_start..start];
    if let Some(base_offset) = before.rfind("<base ") {
        let base_start = window_start + base_offset;
        let base_tag = &html[base_start..start];
        let single_tag = !base_tag[1..].contains('<');
        if single_tag && base_tag.ends_with('>') && base_tag.contains(BASE_ATTRIBUTE) {
            start = base_start;
        }
    }
    Some(start..marker_range.end)
}

/// Drop `<script>` elements whose body carries a legacy signature.
fn remove_legacy_scripts(html: &str) -> (String, bool) {
    let lower = html.to_ascii_lowercase();
    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;
    let mut found = false;

    while let Some(offset) = lower[cursor..].find("<script") {
        let open_start = cursor + offset;
        let Some(close_offset) = lower[open_start..].find("</script>") else {
            break;
        };
        let close_end = open_start + close_offset + "</script>".len();
        let element = &html[open_start..close_end];

        let is_legacy = element.len() <= LEGACY_MAX_BYTES
            && !element.contains("data-sitebridge")
            && LEGACY_SIGNATURES.iter().any(|sig| element.contains(sig));
        out.push_str(&html[cursor..open_start]);
        if is_legacy {
            found = true;
        } else {
            out.push_str(element);
        }
        cursor = close_end;
    }
    out.push_str(&html[cursor..]);
    (out, found)
}

fn escape_attribute(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
