//! The in-browser path fixer.
//!
//! The payload in `path_fixer.js` runs inside every transformed document. It
//! strips the leading `/` from root-absolute `link[href]`, `script[src]` and
//! `img[src]` values, first in one sweep over the document and then for every
//! element the bundle inserts later, observed through a `MutationObserver`
//! over both `<head>` and `<body>`. `rewrite_root_absolute` is the same rule
//! on the Rust side.

use serde::Serialize;

use crate::topology::ServingContext;

/// Element id of the injected `<script>`, shared by every injection path.
pub const SCRIPT_ID: &str = "sitebridge-path-fixer";

/// Opening tag of the injected script.
pub const SCRIPT_OPEN: &str = r#"<script id="sitebridge-path-fixer" data-sitebridge="path-fixer">"#;

/// Poll interval while waiting for `<head>` and `<body>` to exist.
pub const POLL_INTERVAL_MS: u64 = 10;

/// Attributes the runtime rewrites, keyed by element name.
pub const REWRITTEN_ATTRIBUTES: [(&str, &str); 3] =
    [("link", "href"), ("script", "src"), ("img", "src")];

const TEMPLATE: &str = include_str!("path_fixer.js");
const CONFIG_PLACEHOLDER: &str = "__SITEBRIDGE_CONFIG__";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RuntimeConfig<'a> {
    topology: &'a str,
    base_path: &'a str,
    shell_origins: &'a [String],
    poll_interval_ms: u64,
    debug: bool,
}

/// Strip the leading separator from a root-absolute reference.
///
/// Protocol-relative (`//cdn/x.js`) and relative values are returned as is,
/// so applying the rule twice is the same as applying it once.
pub fn rewrite_root_absolute(value: &str) -> &str {
    match value.strip_prefix('/') {
        Some(rest) if !rest.starts_with('/') => rest,
        _ => value,
    }
}

/// The runtime JavaScript, configured for `ctx`.
pub fn payload_js(ctx: &ServingContext) -> String {
    let config = RuntimeConfig {
        topology: ctx.topology.as_str(),
        base_path: &ctx.base_path,
        shell_origins: &ctx.shell_origins,
        poll_interval_ms: POLL_INTERVAL_MS,
        debug: ctx.debug,
    };
    TEMPLATE.replace(CONFIG_PLACEHOLDER, &script_safe_json(&config))
}

/// The runtime wrapped in its `<script>` element.
pub fn payload_script(ctx: &ServingContext) -> String {
    format!("{SCRIPT_OPEN}\n{}</script>", payload_js(ctx))
}

/// A statement an embedding page can evaluate inside a project document to
/// install the runtime after the fact.
///
/// Does nothing when an element with [`SCRIPT_ID`] is already present, so it
/// is safe to evaluate on every navigation and on server-transformed
/// documents alike.
pub fn embed_snippet(ctx: &ServingContext) -> String {
    let source = script_safe_json(&payload_js(ctx));
    format!(
        "(function(){{try{{if(document.getElementById('{SCRIPT_ID}'))return;\
var s=document.createElement('script');s.id='{SCRIPT_ID}';\
s.setAttribute('data-sitebridge','path-fixer');s.textContent={source};\
(document.head||document.documentElement).appendChild(s);}}catch(e){{}}}})();"
    )
}

/// Serialize `value` so it can sit inside an inline `<script>` without
/// closing it early.
pub(crate) fn script_safe_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| "null".to_string())
        .replace('<', "\\u003c")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::Topology;
    use pretty_assertions::assert_eq;

    #[test]
    fn rewrites_root_absolute_only() {
        assert_eq!(rewrite_root_absolute("/chunk.js"), "chunk.js");
        assert_eq!(rewrite_root_absolute("/_expo/static/app.css"), "_expo/static/app.css");
        assert_eq!(rewrite_root_absolute("//cdn.example.com/x.js"), "//cdn.example.com/x.js");
        assert_eq!(rewrite_root_absolute("chunk.js"), "chunk.js");
        assert_eq!(rewrite_root_absolute("https://example.com/a.js"), "https://example.com/a.js");
        assert_eq!(rewrite_root_absolute(""), "");
    }

    #[test]
    fn rewrite_is_idempotent() {
        for value in ["/a/b.js", "//cdn/x", "/", "x", "///triple", "/ spaced"] {
            let once = rewrite_root_absolute(value);
            assert_eq!(rewrite_root_absolute(once), once, "{value}");
        }
    }

    #[test]
    fn payload_carries_configuration() {
        let ctx = ServingContext::new(Topology::PathPrefixed, "/alpha/")
            .with_shell_origins(vec!["http://localhost:1420".to_string()]);
        let js = payload_js(&ctx);
        assert!(!js.contains(CONFIG_PLACEHOLDER));
        assert!(js.contains(r#""topology":"path-prefixed""#));
        assert!(js.contains(r#""basePath":"/alpha/""#));
        assert!(js.contains(r#""shellOrigins":["http://localhost:1420"]"#));
        for (element, attribute) in REWRITTEN_ATTRIBUTES {
            assert!(js.contains(&format!("{element}[{attribute}]")), "{element}[{attribute}]");
        }
        assert!(js.contains("subtree: true"));
    }

    #[test]
    fn payload_cannot_close_its_script_early() {
        let ctx = ServingContext::new(Topology::PathPrefixed, "/</script><b>/");
        let script = payload_script(&ctx);
        assert_eq!(script.matches("</script>").count(), 1);
        assert!(script.ends_with("</script>"));
    }

    #[test]
    fn embed_snippet_is_guarded_by_script_id() {
        let ctx = ServingContext::new(Topology::LocalFile, "/alpha/");
        let snippet = embed_snippet(&ctx);
        assert!(snippet.starts_with("(function(){try{if(document.getElementById('sitebridge-path-fixer'))return;"));
        assert!(!snippet.contains("</script>"));
        assert!(snippet.contains(r#"\"topology\":\"local-file\""#));
    }
}
