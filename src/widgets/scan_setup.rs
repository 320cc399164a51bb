//! Scan setup pane: data loaders around a shared canvas, plus the optional
//! plan editor, queue status and console components.
//!
//! # Options
//!
//! | option             | default                      |
//! |--------------------|------------------------------|
//! | `loaders`          | both loaders                 |
//! | `data_paths`       | `--data-path` roots          |
//! | `plan_editor`      | absent (no editor)           |
//! | `queue_status`     | enabled                      |
//! | `console_output`   | absent (no console)          |
//! | `layout`           | loaders on top, canvas below |
//! | `poll_interval_ms` | 2000                         |
//!
//! Sections accept `true`/`false` as shorthand for `{enabled: ...}`.

use super::console::{ConsoleOptions, ConsoleWidget};
use super::loaders::{LoaderKind, LoaderOptions, LoaderPanel, LoaderSpec};
use super::plan_editor::{PlanEditor, PlanEditorOptions};
use super::queue_monitor::DEFAULT_POLL_INTERVAL_MS;
use super::queue_status::{QueueStatusOptions, QueueStatusWidget};
use super::Widget;
use crate::config::{validate_stretch, Placement, ResolveContext, WidgetConfig};
use crate::error::{AppResult, GuiError};
use crate::host::GridLayout;
use crate::registry::WidgetServices;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::any::Any;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Component holding the loaders.
pub const LOADER_PANEL: &str = "loader_panel";
/// Component showing the loaded data.
pub const CANVAS: &str = "canvas";

fn one() -> u32 {
    1
}

/// Cell of one pane component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComponentPlacement {
    /// Top row
    #[serde(default)]
    pub row: u32,
    /// Left column
    #[serde(default)]
    pub column: u32,
    /// Rows covered
    #[serde(default = "one")]
    pub row_span: u32,
    /// Columns covered
    #[serde(default = "one")]
    pub column_span: u32,
}

impl From<ComponentPlacement> for Placement {
    fn from(cell: ComponentPlacement) -> Self {
        Placement {
            row_span: cell.row_span,
            column_span: cell.column_span,
            ..Placement::at(cell.row, cell.column)
        }
    }
}

/// `layout` section: component cells and stretch factors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PaneLayout {
    /// Component name → cell. Unlisted components stack below.
    #[serde(default)]
    pub components: BTreeMap<String, ComponentPlacement>,
    /// Row index → stretch factor
    #[serde(default)]
    pub row_stretch: BTreeMap<u32, u32>,
    /// Column index → stretch factor
    #[serde(default)]
    pub column_stretch: BTreeMap<u32, u32>,
}

/// Typed options of the `scan_setup` widget.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanSetupConfig {
    /// Configured loaders; empty means both with defaults
    pub loaders: BTreeMap<LoaderKind, LoaderOptions>,
    /// Roots for loaders that declare none
    pub data_paths: Vec<PathBuf>,
    /// Plan editor pane, absent when not configured
    pub plan_editor: Option<PlanEditorOptions>,
    /// Queue status pane
    pub queue_status: QueueStatusOptions,
    /// Console pane, absent when not configured
    pub console_output: Option<ConsoleOptions>,
    /// Pane placement and stretch
    pub layout: PaneLayout,
    /// Queue poll period
    pub poll_interval_ms: u64,
}

impl Default for ScanSetupConfig {
    fn default() -> Self {
        Self {
            loaders: BTreeMap::new(),
            data_paths: Vec::new(),
            plan_editor: None,
            queue_status: QueueStatusOptions::default(),
            console_output: None,
            layout: PaneLayout::default(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

/// Parse a section that may be absent, a bool, or a mapping.
fn section<T: DeserializeOwned>(widget: &str, option: &str, value: Option<&Value>) -> AppResult<Option<T>> {
    let value = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Bool(enabled)) => json!({ "enabled": enabled }),
        Some(value @ Value::Object(_)) => value.clone(),
        Some(_) => return Err(GuiError::config(widget, option, "expected true, false or a mapping")),
    };
    serde_json::from_value(value)
        .map(Some)
        .map_err(|err| GuiError::config(widget, option, err.to_string()))
}

impl ScanSetupConfig {
    /// Parse merged options, checking every nested section.
    pub fn from_options(widget: &str, options: &Map<String, Value>) -> AppResult<Self> {
        let mut config = Self::default();

        match options.get("loaders") {
            None | Some(Value::Null) => {}
            Some(Value::Object(entries)) => {
                for (name, value) in entries {
                    let kind = LoaderKind::parse(name).ok_or_else(|| {
                        GuiError::config(
                            widget,
                            format!("loaders.{}", name),
                            "unknown loader (known: xrf, ptychography)",
                        )
                    })?;
                    if config.loaders.contains_key(&kind) {
                        return Err(GuiError::config(
                            widget,
                            format!("loaders.{}", name),
                            format!("loader '{}' is configured twice", kind),
                        ));
                    }
                    config
                        .loaders
                        .insert(kind, LoaderOptions::parse(widget, kind, value.clone())?);
                }
            }
            Some(_) => return Err(GuiError::config(widget, "loaders", "expected a mapping")),
        }

        if let Some(paths) = options.get("data_paths").filter(|value| !value.is_null()) {
            config.data_paths = serde_json::from_value(paths.clone())
                .map_err(|err| GuiError::config(widget, "data_paths", err.to_string()))?;
        }

        config.plan_editor = section::<PlanEditorOptions>(widget, "plan_editor", options.get("plan_editor"))?;
        if let Some(editor) = &config.plan_editor {
            editor.validate(widget)?;
        }
        config.queue_status = section(widget, "queue_status", options.get("queue_status"))?.unwrap_or_default();
        config.queue_status.validate(widget, "queue_status")?;
        config.console_output = section::<ConsoleOptions>(widget, "console_output", options.get("console_output"))?;
        if let Some(console) = &config.console_output {
            console.validate(widget)?;
        }

        if let Some(layout) = options.get("layout").filter(|value| !value.is_null()) {
            config.layout = serde_json::from_value(layout.clone())
                .map_err(|err| GuiError::config(widget, "layout", err.to_string()))?;
        }

        if let Some(value) = options.get("poll_interval_ms").filter(|value| !value.is_null()) {
            config.poll_interval_ms = value
                .as_u64()
                .filter(|ms| *ms > 0)
                .ok_or_else(|| GuiError::config(widget, "poll_interval_ms", "expected a positive integer"))?;
        }

        config.check_components(widget)?;
        Ok(config)
    }

    /// Normalize merged options: `--data-path` roots fill an empty `data_paths`.
    pub fn normalize(widget: &str, options: Map<String, Value>, context: &ResolveContext) -> AppResult<Map<String, Value>> {
        let mut config = Self::from_options(widget, &options)?;
        if config.data_paths.is_empty() {
            config.data_paths = context.data_paths.clone();
        }
        Ok(config.to_options())
    }

    /// Option map in canonical form. Parsing it gives back an equal config.
    pub fn to_options(&self) -> Map<String, Value> {
        let loaders: Map<String, Value> = self
            .loaders
            .iter()
            .map(|(kind, options)| (kind.name().to_string(), json!(options)))
            .collect();
        let mut map = Map::new();
        map.insert("loaders".into(), Value::Object(loaders));
        map.insert("data_paths".into(), json!(self.data_paths));
        map.insert("plan_editor".into(), json!(self.plan_editor));
        map.insert("queue_status".into(), json!(self.queue_status));
        map.insert("console_output".into(), json!(self.console_output));
        map.insert("layout".into(), json!(self.layout));
        map.insert("poll_interval_ms".into(), json!(self.poll_interval_ms));
        map
    }

    /// Loaders that will be built, with defaults applied.
    ///
    /// No configured loaders means both; all disabled means a fallback XRF
    /// loader.
    pub fn effective_loaders(&self) -> Vec<LoaderSpec> {
        let mut specs: Vec<LoaderSpec> = if self.loaders.is_empty() {
            LoaderKind::ALL
                .iter()
                .map(|kind| LoaderSpec::from_options(*kind, &LoaderOptions::default(), &self.data_paths))
                .collect()
        } else {
            self.loaders
                .iter()
                .filter(|(_, options)| options.enabled)
                .map(|(kind, options)| LoaderSpec::from_options(*kind, options, &self.data_paths))
                .collect()
        };
        if specs.is_empty() {
            specs.push(LoaderSpec::from_options(
                LoaderKind::Xrf,
                &LoaderOptions::default(),
                &self.data_paths,
            ));
        }
        specs
    }

    /// Enabled components in declaration order.
    pub fn components(&self) -> Vec<String> {
        let mut names = vec![LOADER_PANEL.to_string(), CANVAS.to_string()];
        if let Some(editor) = self.plan_editor.as_ref().filter(|editor| editor.enabled) {
            names.push(editor.layout_slot.clone());
        }
        if self.queue_status.enabled {
            names.push(self.queue_status.layout_slot.clone());
        }
        if let Some(console) = self.console_output.as_ref().filter(|console| console.enabled) {
            names.push(console.layout_slot.clone());
        }
        names
    }

    /// Arrange the enabled components.
    pub fn grid(&self) -> GridLayout {
        let components = &self.layout.components;
        let entries = self.components().into_iter().map(|name| {
            let placement = match components.get(&name) {
                Some(cell) => Placement::from(*cell),
                None if components.is_empty() && name == LOADER_PANEL => Placement {
                    column_span: 2,
                    ..Placement::at(0, 0)
                },
                None if components.is_empty() && name == CANVAS => Placement {
                    column_span: 2,
                    ..Placement::at(1, 0)
                },
                None => Placement::default(),
            };
            (name, placement)
        });
        let row_stretch = if components.is_empty() && self.layout.row_stretch.is_empty() {
            BTreeMap::from([(0, 1), (1, 2)])
        } else {
            self.layout.row_stretch.clone()
        };
        GridLayout::arrange(entries)
            .with_row_stretch(row_stretch)
            .with_column_stretch(self.layout.column_stretch.clone())
    }

    fn check_components(&self, widget: &str) -> AppResult<()> {
        let mut slots: Vec<(&str, &str)> = vec![("", LOADER_PANEL), ("", CANVAS)];
        if let Some(editor) = &self.plan_editor {
            slots.push(("plan_editor", editor.layout_slot.as_str()));
        }
        slots.push(("queue_status", self.queue_status.layout_slot.as_str()));
        if let Some(console) = &self.console_output {
            slots.push(("console_output", console.layout_slot.as_str()));
        }
        for (index, (section, slot)) in slots.iter().enumerate() {
            if slots[..index].iter().any(|(_, earlier)| earlier == slot) {
                return Err(GuiError::config(
                    widget,
                    format!("{}.layout_slot", section),
                    format!("component '{}' is already in use", slot),
                ));
            }
        }
        for (name, cell) in &self.layout.components {
            if !slots.iter().any(|(_, slot)| slot == name) {
                return Err(GuiError::config(
                    widget,
                    format!("layout.components.{}", name),
                    "unknown component",
                ));
            }
            Placement::from(*cell).validate(widget, &format!("layout.components.{}", name))?;
        }
        validate_stretch(widget, "layout.row_stretch", &self.layout.row_stretch)?;
        validate_stretch(widget, "layout.column_stretch", &self.layout.column_stretch)?;
        Ok(())
    }
}

/// The scan setup pane.
pub struct ScanSetupWidget {
    key: String,
    config: ScanSetupConfig,
    loaders: Vec<LoaderPanel>,
    selection: Option<(LoaderKind, PathBuf)>,
    plan_editor: Option<PlanEditor>,
    queue_status: Option<QueueStatusWidget>,
    console: Option<ConsoleWidget>,
    grid: GridLayout,
}

impl ScanSetupWidget {
    /// Build every enabled component.
    pub fn new(key: impl Into<String>, config: ScanSetupConfig, services: &WidgetServices) -> Self {
        let key = key.into();
        let loaders = config.effective_loaders().into_iter().map(LoaderPanel::new).collect();
        let plan_editor = config
            .plan_editor
            .as_ref()
            .filter(|options| options.enabled)
            .map(|options| PlanEditor::new(options, services.queue_client.clone(), services.runtime.clone()));
        let queue_status = config.queue_status.enabled.then(|| {
            QueueStatusWidget::new(
                key.clone(),
                config.queue_status.clone(),
                services.queue_model.clone(),
                services.queue_client.clone(),
                services.runtime.clone(),
            )
        });
        let console = config
            .console_output
            .as_ref()
            .filter(|options| options.enabled)
            .map(|options| {
                ConsoleWidget::new(
                    options.clone(),
                    services.console_bus.clone(),
                    services.status_bus.clone(),
                )
            });
        let grid = config.grid();
        Self {
            key,
            config,
            loaders,
            selection: None,
            plan_editor,
            queue_status,
            console,
            grid,
        }
    }

    /// Build from a resolved config.
    pub fn from_config(config: &WidgetConfig, services: &WidgetServices) -> AppResult<Self> {
        let parsed = ScanSetupConfig::from_options(&config.widget_key, &config.options)?;
        Ok(Self::new(config.widget_key.clone(), parsed, services))
    }

    /// Kinds of the built loaders, in panel order.
    pub fn loader_kinds(&self) -> Vec<LoaderKind> {
        self.loaders.iter().map(LoaderPanel::kind).collect()
    }

    /// Loader panels in display order.
    pub fn loaders(&self) -> &[LoaderPanel] {
        &self.loaders
    }

    /// Normalized configuration.
    pub fn config(&self) -> &ScanSetupConfig {
        &self.config
    }

    /// Component arrangement.
    pub fn grid(&self) -> &GridLayout {
        &self.grid
    }

    /// Plan editor pane, if enabled.
    pub fn plan_editor(&self) -> Option<&PlanEditor> {
        self.plan_editor.as_ref()
    }

    fn loader_panel_ui(&mut self, ui: &mut egui::Ui) {
        let cells = GridLayout::arrange(
            self.loaders
                .iter()
                .map(|panel| (panel.kind().name(), panel.spec().placement.unwrap_or_default())),
        );
        let mut row = None;
        let mut loaded = None;
        for cell in cells.cells() {
            if row.is_some_and(|current| current != cell.row) {
                ui.add_space(4.0);
            }
            row = Some(cell.row);
            if let Some(panel) = self.loaders.get_mut(cell.index) {
                if let Some(path) = panel.ui(ui) {
                    loaded = Some((panel.kind(), path));
                }
            }
        }
        if loaded.is_some() {
            self.selection = loaded;
        }
    }

    fn canvas_ui(&self, ui: &mut egui::Ui) {
        ui.group(|ui| {
            ui.set_min_size(ui.available_size());
            ui.centered_and_justified(|ui| match &self.selection {
                Some((kind, path)) => {
                    ui.label(format!("{} data: {}", kind.label(), path.display()));
                }
                None => {
                    ui.weak("No file selected");
                }
            });
        });
    }

    fn component_ui(&mut self, ui: &mut egui::Ui, name: &str) {
        match name {
            LOADER_PANEL => self.loader_panel_ui(ui),
            CANVAS => self.canvas_ui(ui),
            _ => {
                if let Some(editor) = self.plan_editor.as_mut() {
                    if self.config.plan_editor.as_ref().is_some_and(|o| o.layout_slot == name) {
                        editor.ui(ui);
                        return;
                    }
                }
                if let Some(status) = self.queue_status.as_mut() {
                    if self.config.queue_status.layout_slot == name {
                        status.ui(ui);
                        return;
                    }
                }
                if let Some(console) = self.console.as_mut() {
                    if console.options().layout_slot == name {
                        console.ui(ui);
                    }
                }
            }
        }
    }
}

impl Widget for ScanSetupWidget {
    fn key(&self) -> &str {
        &self.key
    }

    fn ui(&mut self, ui: &mut egui::Ui) {
        let grid = self.grid.clone();
        grid.show(ui, |ui, cell| self.component_ui(ui, &cell.name));
    }

    fn summary(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .loaders
            .iter()
            .map(|panel| {
                let spec = panel.spec();
                format!(
                    "loader {}: {} in {}",
                    spec.kind,
                    spec.file_patterns.join(", "),
                    spec.search_paths
                        .iter()
                        .map(|path| path.display().to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })
            .collect();
        lines.extend(self.grid.cells().iter().map(|cell| {
            format!(
                "component {} at row {}, column {} ({}x{})",
                cell.name, cell.row, cell.column, cell.row_span, cell.column_span
            )
        }));
        lines
    }

    fn poll_interval(&self) -> Option<Duration> {
        self.config.queue_status.enabled.then(|| {
            Duration::from_millis(
                self.config
                    .queue_status
                    .poll_interval_ms
                    .unwrap_or(self.config.poll_interval_ms),
            )
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(value: Value) -> AppResult<ScanSetupConfig> {
        match value {
            Value::Object(map) => ScanSetupConfig::from_options("scan_setup", &map),
            _ => ScanSetupConfig::from_options("scan_setup", &Map::new()),
        }
    }

    #[test]
    fn test_defaults_build_both_loaders() {
        let config = parse(json!({})).unwrap();
        let kinds: Vec<_> = config.effective_loaders().iter().map(|spec| spec.kind).collect();
        assert_eq!(kinds, vec![LoaderKind::Xrf, LoaderKind::Ptychography]);
        assert_eq!(config.components(), vec!["loader_panel", "canvas", "queue_status"]);
    }

    #[test]
    fn test_disabled_loader_skipped() {
        let config = parse(json!({
            "loaders": {"xrf": {"enabled": true}, "ptycho": {"enabled": false}}
        }))
        .unwrap();
        let kinds: Vec<_> = config.effective_loaders().iter().map(|spec| spec.kind).collect();
        assert_eq!(kinds, vec![LoaderKind::Xrf]);
    }

    #[test]
    fn test_all_disabled_falls_back_to_xrf() {
        let config = parse(json!({"loaders": {"xrf": false, "ptychography": false}})).unwrap();
        let specs = config.effective_loaders();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].kind, LoaderKind::Xrf);
    }

    #[test]
    fn test_unknown_loader_and_duplicates() {
        let err = parse(json!({"loaders": {"saxs": true}})).unwrap_err();
        assert!(err.to_string().contains("loaders.saxs"));

        let err = parse(json!({"loaders": {"ptycho": true, "ptychography": false}})).unwrap_err();
        assert!(matches!(err, GuiError::ConfigValidation { .. }));
    }

    #[test]
    fn test_section_shorthand() {
        let config = parse(json!({"plan_editor": true, "queue_status": false, "console_output": {}})).unwrap();
        assert!(config.plan_editor.unwrap().enabled);
        assert!(!config.queue_status.enabled);
        assert!(config.console_output.unwrap().enabled);

        let err = parse(json!({"plan_editor": "yes"})).unwrap_err();
        assert!(matches!(err, GuiError::ConfigValidation { option, .. } if option == "plan_editor"));
    }

    #[test]
    fn test_normalize_fills_data_paths() {
        let context = ResolveContext {
            data_paths: vec![PathBuf::from("/beamline/data")],
        };
        let normalized = ScanSetupConfig::normalize("scan_setup", Map::new(), &context).unwrap();
        let config = ScanSetupConfig::from_options("scan_setup", &normalized).unwrap();
        assert_eq!(config.data_paths, vec![PathBuf::from("/beamline/data")]);
        assert_eq!(
            config.effective_loaders()[0].search_paths,
            vec![PathBuf::from("/beamline/data")]
        );

        let explicit = parse(json!({"data_paths": ["/own"]})).unwrap().to_options();
        let normalized = ScanSetupConfig::normalize("scan_setup", explicit, &context).unwrap();
        assert_eq!(normalized["data_paths"], json!(["/own"]));
    }

    #[test]
    fn test_default_grid() {
        let config = parse(json!({"plan_editor": {"plans": []}})).unwrap();
        let grid = config.grid();
        let loader = grid.cell("loader_panel").unwrap();
        assert_eq!((loader.row, loader.column, loader.column_span), (0, 0, 2));
        assert_eq!(grid.cell("canvas").unwrap().row, 1);
        assert_eq!(grid.cell("plan_editor").unwrap().row, 2);
        assert_eq!(grid.cell("queue_status").unwrap().row, 3);
    }

    #[test]
    fn test_configured_layout() {
        let config = parse(json!({
            "plan_editor": {},
            "layout": {
                "components": {
                    "loader_panel": {"row": 0, "column": 0},
                    "canvas": {"row": 0, "column": 1, "row_span": 2},
                    "plan_editor": {"row": 1, "column": 0}
                },
                "column_stretch": {"0": 1, "1": 3}
            }
        }))
        .unwrap();
        let grid = config.grid();
        assert_eq!(grid.cell("canvas").unwrap().row_span, 2);
        assert_eq!(grid.cell("queue_status").unwrap().row, 2);
        assert_eq!(grid.column_weight(1), 3);

        let err = parse(json!({"layout": {"components": {"plot": {"row": 0}}}})).unwrap_err();
        assert!(err.to_string().contains("layout.components.plot"));

        let err = parse(json!({"layout": {"row_stretch": {"top": 1}}})).unwrap_err();
        assert!(matches!(err, GuiError::ConfigValidation { option, .. } if option == "layout"));
    }

    #[test]
    fn test_out_of_range_layout_rejected() {
        let err = parse(json!({"layout": {"components": {"canvas": {"row": 4294967295u64}}}})).unwrap_err();
        assert!(matches!(err, GuiError::ConfigValidation { ref option, .. } if option == "layout.components.canvas.row"));

        let err = parse(json!({"layout": {"components": {"canvas": {"column_span": 0}}}})).unwrap_err();
        assert!(matches!(err, GuiError::ConfigValidation { ref option, .. } if option == "layout.components.canvas.column_span"));

        let err = parse(json!({"layout": {"row_stretch": {"0": 4294967295u64, "1": 1}}})).unwrap_err();
        assert!(matches!(err, GuiError::ConfigValidation { ref option, .. } if option == "layout.row_stretch.0"));

        let err = parse(json!({"layout": {"column_stretch": {"100000000": 1}}})).unwrap_err();
        assert!(matches!(err, GuiError::ConfigValidation { ref option, .. } if option == "layout.column_stretch.100000000"));
    }

    #[test]
    fn test_slot_collision() {
        let err = parse(json!({"console_output": {"enabled": true, "layout_slot": "queue_status"}})).unwrap_err();
        assert!(err.to_string().contains("console_output.layout_slot"));
    }

    #[test]
    fn test_canonical_options_round_trip() {
        let config = parse(json!({
            "loaders": {"ptycho": {"roi_types": ["fine"], "reader": "tiff"}},
            "queue_status": {"labels": {"queue": "Queue:"}, "poll_interval_ms": 500},
            "poll_interval_ms": 1000
        }))
        .unwrap();
        assert_eq!(parse(Value::Object(config.to_options())).unwrap(), config);
    }

    #[test]
    fn test_widget_builds_components() {
        let config = parse(json!({
            "loaders": {"ptycho": {"enabled": false}, "xrf": {}},
            "plan_editor": {},
            "console_output": true,
            "queue_status": {"poll_interval_ms": 750}
        }))
        .unwrap();
        let widget = ScanSetupWidget::new("scan_setup", config, &WidgetServices::default());
        assert_eq!(widget.loader_kinds(), vec![LoaderKind::Xrf]);
        assert!(widget.plan_editor().is_some());
        assert_eq!(widget.grid().cells().len(), 5);
        assert_eq!(widget.poll_interval(), Some(Duration::from_millis(750)));
    }
}
