//! Declarative window description loaded from YAML.
//!
//! Configuration is loaded from, in order of precedence (highest first):
//! 1. Environment variables prefixed with `BEAMLINE_` (nested keys split on `__`)
//! 2. The YAML document
//!
//! ```text
//! BEAMLINE_APP__TITLE="Hutch B"
//! BEAMLINE_LAYOUT__MODE=grid
//! ```
//!
//! Tab `options` are kept as raw JSON maps here; the resolver validates them
//! against each widget's schema.

use crate::error::{AppResult, GuiError};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Widget keys shown when none are requested on the command line.
pub const DEFAULT_WIDGET_KEYS: [&str; 2] = ["scan_setup", "qserver_monitor"];

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "BEAMLINE_";

/// File looked up in the working directory when no path is given.
pub const LOCAL_CONFIG_FILE: &str = "beamline.yaml";

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigDocument {
    /// Window metadata
    pub app: AppSettings,
    /// Window-level layout
    pub layout: WindowLayout,
    /// Ordered tab sections
    pub tabs: Vec<TabSection>,
}

/// Window title and size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Window title
    pub title: String,
    /// Initial inner size `[width, height]`
    pub window_size: [u32; 2],
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            title: "Beamline Control".to_string(),
            window_size: [1200, 800],
        }
    }
}

/// How tabs are arranged in the window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    /// One tab per widget
    #[default]
    Tabs,
    /// All widgets on one grid, placed by row/column
    Grid,
}

/// Window layout section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowLayout {
    /// Tabs or grid
    pub mode: LayoutMode,
    /// Status bar settings
    pub status_bar: StatusBarSettings,
}

/// Status bar settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusBarSettings {
    /// Named messages; `idle` is shown at startup
    pub messages: BTreeMap<String, String>,
}

impl StatusBarSettings {
    /// Message shown before anything else is reported.
    pub fn idle_message(&self) -> &str {
        self.messages.get("idle").map_or("Ready.", String::as_str)
    }
}

/// One entry of the `tabs` list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TabSection {
    /// Registered widget key
    pub key: String,
    /// Tab title, overriding the descriptor's
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Tooltip, overriding the descriptor's
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Widget options, validated by the resolver
    #[serde(default)]
    pub options: Map<String, Value>,
    /// Grid row
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<u32>,
    /// Grid column
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    /// Rows covered, default 1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_span: Option<u32>,
    /// Columns covered, default 1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_span: Option<u32>,
    /// Sort key for stacking; declaration order breaks ties
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
}

impl TabSection {
    /// Section with no options.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }
}

impl ConfigDocument {
    /// Load a YAML file and apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns `GuiError::Io` when the file does not exist and
    /// `GuiError::ConfigLoad` when it cannot be parsed.
    pub fn load(path: &Path) -> AppResult<Self> {
        if !path.is_file() {
            return Err(GuiError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("configuration file not found: {}", path.display()),
            )));
        }
        let document: Self = Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        info!(path = %path.display(), tabs = document.tabs.len(), "loaded configuration");
        Ok(document)
    }

    /// Parse a YAML string without environment overrides.
    pub fn from_yaml_str(yaml: &str) -> AppResult<Self> {
        Ok(Figment::from(Yaml::string(yaml)).extract()?)
    }

    /// Pick the configuration file to load.
    ///
    /// An explicit path always wins; otherwise `./beamline.yaml`, then
    /// `<config dir>/beamline-gui/widgets.yaml`.
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.is_file() {
            return Some(local);
        }
        let user = dirs::config_dir()?.join("beamline-gui").join("widgets.yaml");
        user.is_file().then_some(user)
    }

    /// Load the located file, or the defaults when there is none.
    ///
    /// Environment overrides apply either way.
    pub fn load_or_default(explicit: Option<&Path>) -> AppResult<Self> {
        match Self::locate(explicit) {
            Some(path) => Self::load(&path),
            None => {
                debug!("no configuration file found, using defaults");
                Self::from_env()
            }
        }
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> AppResult<Self> {
        Ok(Figment::from(Serialized::defaults(Self::default()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?)
    }

    /// First tab section with `key`.
    pub fn tab(&self, key: &str) -> Option<&TabSection> {
        self.tabs.iter().find(|tab| tab.key == key)
    }

    /// Tab sections to show for the requested widget keys.
    ///
    /// Without any tab sections there is one tab per requested key. When the
    /// default keys are requested, the document's tab list is used as written.
    /// Otherwise tabs follow the requested order, reusing sections by key.
    pub fn select_tabs(&self, requested: &[String]) -> Vec<TabSection> {
        let tabs: Vec<&TabSection> = self.tabs.iter().filter(|tab| !tab.key.is_empty()).collect();
        if tabs.is_empty() {
            return requested.iter().map(TabSection::new).collect();
        }
        if requested.iter().map(String::as_str).eq(DEFAULT_WIDGET_KEYS) {
            return tabs.into_iter().cloned().collect();
        }
        requested
            .iter()
            .map(|key| {
                tabs.iter()
                    .find(|tab| &tab.key == key)
                    .map_or_else(|| TabSection::new(key), |tab| (*tab).clone())
            })
            .collect()
    }
}

/// Default widget keys as owned strings.
pub fn default_widget_keys() -> Vec<String> {
    DEFAULT_WIDGET_KEYS.iter().map(|key| key.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
app:
  title: "Hutch A"
  window_size: [1600, 900]
layout:
  status_bar:
    messages:
      idle: "Waiting for beam"
tabs:
  - key: qserver_monitor
    title: Queue
    options:
      poll_interval_ms: 500
  - key: scan_setup
    options:
      loaders:
        ptychography:
          enabled: false
"#;

    fn keys(tabs: &[TabSection]) -> Vec<&str> {
        tabs.iter().map(|t| t.key.as_str()).collect()
    }

    #[test]
    fn test_parse_document() {
        let doc = ConfigDocument::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(doc.app.title, "Hutch A");
        assert_eq!(doc.app.window_size, [1600, 900]);
        assert_eq!(doc.layout.status_bar.idle_message(), "Waiting for beam");
        assert_eq!(doc.tabs.len(), 2);
        assert_eq!(doc.tab("qserver_monitor").unwrap().options["poll_interval_ms"], 500);
    }

    #[test]
    fn test_empty_document_defaults() {
        let doc = ConfigDocument::from_yaml_str("{}").unwrap();
        assert_eq!(doc.app.title, "Beamline Control");
        assert_eq!(doc.layout.mode, LayoutMode::Tabs);
        assert_eq!(doc.layout.status_bar.idle_message(), "Ready.");
    }

    #[test]
    fn test_select_tabs_default_keys_use_document_order() {
        let doc = ConfigDocument::from_yaml_str(SAMPLE).unwrap();
        let tabs = doc.select_tabs(&default_widget_keys());
        assert_eq!(keys(&tabs), vec!["qserver_monitor", "scan_setup"]);
    }

    #[test]
    fn test_select_tabs_follows_request_order() {
        let doc = ConfigDocument::from_yaml_str(SAMPLE).unwrap();
        let requested = vec!["scan_setup".to_string(), "qserver_status".to_string()];
        let tabs = doc.select_tabs(&requested);
        assert_eq!(keys(&tabs), vec!["scan_setup", "qserver_status"]);
        assert!(tabs[0].options.contains_key("loaders"));
        assert!(tabs[1].options.is_empty());
    }

    #[test]
    fn test_select_tabs_without_sections() {
        let doc = ConfigDocument::default();
        let tabs = doc.select_tabs(&default_widget_keys());
        assert_eq!(keys(&tabs), vec!["scan_setup", "qserver_monitor"]);
    }

    #[test]
    fn test_load_missing_file() {
        let err = ConfigDocument::load(Path::new("/nonexistent/beamline.yaml")).unwrap_err();
        assert!(matches!(err, GuiError::Io(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let doc = ConfigDocument::load(file.path()).unwrap();
        assert_eq!(doc.tabs[1].key, "scan_setup");
    }

    #[test]
    fn test_env_overrides_without_file() {
        std::env::set_var("BEAMLINE_APP__TITLE", "Env Hutch");
        std::env::set_var("BEAMLINE_LAYOUT__MODE", "grid");
        let doc = ConfigDocument::from_env();
        std::env::remove_var("BEAMLINE_APP__TITLE");
        std::env::remove_var("BEAMLINE_LAYOUT__MODE");

        let doc = doc.unwrap();
        assert_eq!(doc.app.title, "Env Hutch");
        assert_eq!(doc.layout.mode, LayoutMode::Grid);
        assert_eq!(doc.app.window_size, [1200, 800]);
        assert!(doc.tabs.is_empty());
    }

    #[test]
    fn test_malformed_document() {
        let err = ConfigDocument::from_yaml_str("tabs: 5").unwrap_err();
        assert!(matches!(err, GuiError::ConfigLoad(_)));
    }
}
