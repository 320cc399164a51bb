//! Console output panel.
//!
//! Shows the history of one of two status buses: lines streamed from the queue
//! server console, or the application's own log. Both render as a time-stamped,
//! color-coded, scrollable list with a text filter, an auto-scroll toggle and a
//! clear button.

use crate::error::{AppResult, GuiError};
use crate::status::{StatusBus, StatusMessage};
use egui::{Color32, ScrollArea};
use serde::{Deserialize, Serialize};

fn default_title() -> String {
    "QServer Console".to_string()
}

fn default_max_entries() -> usize {
    500
}

fn default_true() -> bool {
    true
}

fn default_slot() -> String {
    "console_output".to_string()
}

/// `console_output` section of the scan setup options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConsoleOptions {
    /// Defaults to on once the section is present
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Panel heading
    #[serde(default = "default_title")]
    pub title: String,
    /// Rows shown, newest kept
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Initial state of the auto-scroll toggle
    #[serde(default = "default_true")]
    pub auto_scroll: bool,
    /// Component name in the pane layout
    #[serde(default = "default_slot")]
    pub layout_slot: String,
}

impl Default for ConsoleOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            title: default_title(),
            max_entries: default_max_entries(),
            auto_scroll: true,
            layout_slot: default_slot(),
        }
    }
}

impl ConsoleOptions {
    /// Reject a zero row limit.
    pub fn validate(&self, widget: &str) -> AppResult<()> {
        if self.max_entries == 0 {
            return Err(GuiError::config(
                widget,
                "console_output.max_entries",
                "expected a positive integer",
            ));
        }
        Ok(())
    }
}

/// Which history the console shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsoleSource {
    /// Queue server console output
    #[default]
    Server,
    /// Messages logged by this application
    Application,
}

impl ConsoleSource {
    fn label(self) -> &'static str {
        match self {
            ConsoleSource::Server => "Server",
            ConsoleSource::Application => "Application",
        }
    }
}

/// Console panel over the server console and application log buses.
#[derive(Debug)]
pub struct ConsoleWidget {
    options: ConsoleOptions,
    server: StatusBus,
    application: StatusBus,
    source: ConsoleSource,
    filter: String,
    auto_scroll: bool,
}

impl ConsoleWidget {
    /// Console showing `server` lines until another source is picked.
    pub fn new(options: ConsoleOptions, server: StatusBus, application: StatusBus) -> Self {
        let auto_scroll = options.auto_scroll;
        Self {
            options,
            server,
            application,
            source: ConsoleSource::default(),
            filter: String::new(),
            auto_scroll,
        }
    }

    /// Parsed options.
    pub fn options(&self) -> &ConsoleOptions {
        &self.options
    }

    /// History currently shown.
    pub fn source(&self) -> ConsoleSource {
        self.source
    }

    /// Switch the history shown.
    pub fn set_source(&mut self, source: ConsoleSource) {
        self.source = source;
    }

    fn bus(&self) -> &StatusBus {
        match self.source {
            ConsoleSource::Server => &self.server,
            ConsoleSource::Application => &self.application,
        }
    }

    /// Empty the history currently shown.
    pub fn clear(&self) {
        self.bus().clear();
    }

    /// Messages to show: the last `max_entries` matching the filter, oldest first.
    pub fn visible(&self) -> Vec<StatusMessage> {
        let matching: Vec<StatusMessage> = self
            .bus()
            .history()
            .into_iter()
            .filter(|message| {
                self.filter.is_empty()
                    || message.text.contains(&self.filter)
                    || message.target.contains(&self.filter)
            })
            .collect();
        let skip = matching.len().saturating_sub(self.options.max_entries);
        matching.into_iter().skip(skip).collect()
    }

    /// Set the text filter.
    pub fn set_filter(&mut self, filter: impl Into<String>) {
        self.filter = filter.into();
    }

    /// Draw the panel.
    pub fn ui(&mut self, ui: &mut egui::Ui) {
        ui.heading(&self.options.title);

        ui.horizontal(|ui| {
            for source in [ConsoleSource::Server, ConsoleSource::Application] {
                ui.selectable_value(&mut self.source, source, source.label());
            }
            ui.separator();
            ui.label("Filter:");
            let _ = ui.text_edit_singleline(&mut self.filter);
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("Clear").clicked() {
                    self.clear();
                }
                ui.toggle_value(&mut self.auto_scroll, "Auto-scroll");
            });
        });

        ui.separator();

        let messages = self.visible();
        let row_height = ui.text_style_height(&egui::TextStyle::Monospace);
        ScrollArea::vertical()
            .id_salt(("console", self.options.layout_slot.as_str()))
            .auto_shrink([false; 2])
            .stick_to_bottom(self.auto_scroll)
            .show_rows(ui, row_height, messages.len(), |ui, rows| {
                for message in &messages[rows] {
                    ui.horizontal(|ui| {
                        ui.colored_label(message.color(), format!("[{:<5}]", message.level));
                        ui.label(message.timestamp.format("%H:%M:%S%.3f").to_string());
                        ui.colored_label(Color32::from_gray(150), &message.target);
                        ui.label(&message.text);
                    });
                }
            });
    }
}
