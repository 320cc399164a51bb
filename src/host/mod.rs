//! Composition host.
//!
//! [`assemble`] turns a configuration document and a list of requested widget
//! keys into ready-to-render tabs. Every tab is resolved before any factory
//! runs, so a bad option aborts startup without half-built widgets.

pub mod layout;
#[cfg(feature = "standalone")]
pub mod app;

pub use layout::{GridCell, GridLayout};
#[cfg(feature = "standalone")]
pub use app::ControlRoomApp;

use crate::config::{ConfigDocument, ConfigResolver, LayoutMode, Placement, TabSection, WidgetConfig};
use crate::error::{AppResult, GuiError};
use crate::queue::MIN_POLL_INTERVAL;
use crate::registry::{FrozenRegistry, QSERVER_MONITOR, SCAN_SETUP};
use crate::widgets::queue_monitor::DEFAULT_POLL_INTERVAL_MS;
use crate::widgets::{ScanSetupConfig, Widget};
use serde_json::{json, Value};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// One built tab.
pub struct Tab {
    /// Registry key
    pub key: String,
    /// Section title, else the descriptor's
    pub title: String,
    /// Section description, else the descriptor's
    pub description: String,
    /// Grid cell in grid mode
    pub placement: Placement,
    /// Resolved options the widget was built from
    pub config: WidgetConfig,
    /// The built widget
    pub widget: Box<dyn Widget>,
}

impl fmt::Debug for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tab")
            .field("key", &self.key)
            .field("title", &self.title)
            .field("placement", &self.placement)
            .finish()
    }
}

/// Everything the window needs.
#[derive(Debug)]
pub struct Assembly {
    /// Window title
    pub title: String,
    /// Initial window size in pixels
    pub window_size: [u32; 2],
    /// Tabs or grid
    pub mode: LayoutMode,
    /// Status bar text while no message has been posted
    pub idle_message: String,
    /// Tabs in display order
    pub tabs: Vec<Tab>,
    /// Queue poll period: the shortest one any widget asks for
    pub poll_interval: Duration,
}

impl Assembly {
    /// Tab arrangement for grid mode.
    pub fn grid(&self) -> GridLayout {
        GridLayout::arrange(self.tabs.iter().map(|tab| (tab.key.clone(), tab.placement)))
    }

    /// Tab with `key`.
    pub fn tab(&self, key: &str) -> Option<&Tab> {
        self.tabs.iter().find(|tab| tab.key == key)
    }
}

/// Resolve and build the tabs for `requested` widget keys.
///
/// # Errors
///
/// The first `UnknownWidget` or `ConfigValidation` found while resolving, or
/// the first factory error. Nothing is built when resolution fails.
pub fn assemble(
    registry: &FrozenRegistry,
    document: &ConfigDocument,
    requested: &[String],
    data_paths: Vec<PathBuf>,
) -> AppResult<Assembly> {
    let sections = document.select_tabs(requested);
    let resolver = ConfigResolver::new(registry).with_data_paths(data_paths);
    let mut configs = resolver.resolve_tabs(&sections)?;
    inherit_roi_columns(&resolver, document, &sections, &mut configs)?;

    let mut tabs = Vec::with_capacity(sections.len());
    for (section, config) in sections.into_iter().zip(configs) {
        let descriptor = registry.get(&section.key).ok_or_else(|| GuiError::UnknownWidget {
            key: section.key.clone(),
        })?;
        let widget = descriptor.create(&config)?;
        tabs.push(Tab {
            title: section
                .title
                .unwrap_or_else(|| descriptor.title().to_string()),
            description: section
                .description
                .unwrap_or_else(|| descriptor.description().to_string()),
            placement: config.placement,
            key: section.key,
            config,
            widget,
        });
    }

    let poll_interval = tabs
        .iter()
        .filter_map(|tab| tab.widget.poll_interval())
        .min()
        .unwrap_or(Duration::from_millis(DEFAULT_POLL_INTERVAL_MS))
        .max(MIN_POLL_INTERVAL);

    info!(
        tabs = tabs.len(),
        poll_ms = poll_interval.as_millis() as u64,
        "assembled control room"
    );
    Ok(Assembly {
        title: document.app.title.clone(),
        window_size: document.app.window_size,
        mode: document.layout.mode,
        idle_message: document.layout.status_bar.idle_message().to_string(),
        tabs,
        poll_interval,
    })
}

/// Queue monitors that leave `roi_key_map` unset take the ROI columns of the
/// scan setup plan editor, whether or not scan setup is shown itself.
fn inherit_roi_columns(
    resolver: &ConfigResolver<'_>,
    document: &ConfigDocument,
    sections: &[TabSection],
    configs: &mut [WidgetConfig],
) -> AppResult<()> {
    let unset = |section: &TabSection| {
        section.key == QSERVER_MONITOR
            && section.options.get("roi_key_map").map_or(true, Value::is_null)
    };
    if !sections.iter().any(unset) {
        return Ok(());
    }

    let scan_setup = match configs.iter().find(|config| config.widget_key == SCAN_SETUP) {
        Some(config) => config.clone(),
        None => match resolver.resolve(document, SCAN_SETUP) {
            Ok(config) => config,
            Err(err) => {
                debug!("no scan setup ROI columns to inherit: {}", err);
                return Ok(());
            }
        },
    };
    let parsed = ScanSetupConfig::from_options(&scan_setup.widget_key, &scan_setup.options)?;
    let Some(editor) = parsed.plan_editor.filter(|editor| editor.enabled) else {
        return Ok(());
    };
    let roi_key_map = editor.roi_keys(&scan_setup.widget_key)?;
    if roi_key_map.is_empty() {
        return Ok(());
    }

    for (section, config) in sections.iter().zip(configs.iter_mut()) {
        if unset(section) {
            debug!(widget = %section.key, columns = roi_key_map.len(), "inheriting plan editor ROI columns");
            config.options.insert("roi_key_map".to_string(), json!(roi_key_map));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GuiError;
    use crate::registry::{WidgetRegistry, WidgetServices};

    fn registry() -> FrozenRegistry {
        let mut registry = WidgetRegistry::new();
        registry.register_defaults(&WidgetServices::default());
        registry.freeze()
    }

    fn keys(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|key| key.to_string()).collect()
    }

    #[test]
    fn test_assemble_defaults_without_document() {
        let assembly = assemble(
            &registry(),
            &ConfigDocument::default(),
            &keys(&["scan_setup", "qserver_monitor"]),
            Vec::new(),
        )
        .unwrap();
        assert_eq!(assembly.title, "Beamline Control");
        assert_eq!(assembly.window_size, [1200, 800]);
        assert_eq!(assembly.idle_message, "Ready.");
        let titles: Vec<_> = assembly.tabs.iter().map(|tab| tab.title.as_str()).collect();
        assert_eq!(titles, vec!["Microscopy Beamline Data Acquisition", "Queue Monitor"]);
        assert_eq!(assembly.poll_interval, Duration::from_millis(2000));
    }

    #[test]
    fn test_section_overrides_and_poll_interval() {
        let document = ConfigDocument::from_yaml_str(
            r#"
app:
  title: 2-ID Control
tabs:
  - key: qserver_monitor
    title: Queue
    options:
      poll_interval_ms: 500
  - key: qserver_status
    row: 0
    column: 1
"#,
        )
        .unwrap();
        let assembly = assemble(&registry(), &document, &keys(&["qserver_monitor", "qserver_status"]), Vec::new())
            .unwrap();
        assert_eq!(assembly.title, "2-ID Control");
        assert_eq!(assembly.tab("qserver_monitor").unwrap().title, "Queue");
        assert_eq!(assembly.tab("qserver_status").unwrap().title, "Queue Server Status");
        assert_eq!(assembly.poll_interval, Duration::from_millis(500));
        assert_eq!(assembly.grid().cell("qserver_status").unwrap().column, 1);
    }

    #[test]
    fn test_bad_option_builds_nothing() {
        let document = ConfigDocument::from_yaml_str(
            r#"
tabs:
  - key: scan_setup
  - key: qserver_monitor
    options:
      refresh: 10
"#,
        )
        .unwrap();
        let err = assemble(&registry(), &document, &keys(&["scan_setup", "qserver_monitor"]), Vec::new())
            .unwrap_err();
        match err {
            GuiError::ConfigValidation { widget, option, .. } => {
                assert_eq!(widget, "qserver_monitor");
                assert_eq!(option, "refresh");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_widget() {
        let err = assemble(&registry(), &ConfigDocument::default(), &keys(&["plotter"]), Vec::new())
            .unwrap_err();
        assert!(matches!(err, GuiError::UnknownWidget { key } if key == "plotter"));
    }
}
