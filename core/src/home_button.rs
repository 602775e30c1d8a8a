//! Return-to-host control injected into project documents.

use serde::Deserialize;
use serde::Serialize;

use crate::path_fixer::script_safe_json;

/// Opening tag of the injected block.
pub const BLOCK_OPEN: &str = r#"<style data-sitebridge="home-button">"#;

const SCRIPT_TEMPLATE: &str = include_str!("home_button.js");
const STYLE: &str = include_str!("home_button.css");
const CONFIG_PLACEHOLDER: &str = "__SITEBRIDGE_HOME__";

/// `[home_button]` section of `sitebridge.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HomeButton {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_label")]
    pub label: String,

    /// Candidate URLs of the host shell, tried in order when there is no
    /// history to go back to.
    #[serde(default = "default_targets")]
    pub targets: Vec<String>,

    /// Pressed together with Alt. No other key is intercepted.
    #[serde(default = "default_shortcut_key")]
    pub shortcut_key: String,
}

fn default_label() -> String {
    "Home".to_string()
}

fn default_targets() -> Vec<String> {
    vec!["http://localhost:1420/".to_string()]
}

fn default_shortcut_key() -> String {
    "h".to_string()
}

impl Default for HomeButton {
    fn default() -> Self {
        Self {
            enabled: false,
            label: default_label(),
            targets: default_targets(),
            shortcut_key: default_shortcut_key(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ButtonConfig<'a> {
    label: &'a str,
    targets: &'a [String],
    shortcut_key: String,
}

impl HomeButton {
    /// The `<style>` and `<script>` pair, without its marker.
    pub fn render(&self) -> String {
        let config = ButtonConfig {
            label: &self.label,
            targets: &self.targets,
            shortcut_key: self.shortcut_key.to_lowercase(),
        };
        let script = SCRIPT_TEMPLATE.replace(CONFIG_PLACEHOLDER, &script_safe_json(&config));
        format!(
            "{BLOCK_OPEN}\n{STYLE}</style><script data-sitebridge=\"home-button\">\n{script}</script>"
        )
    }
}
