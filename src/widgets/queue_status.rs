//! Queue server status indicators.

use super::Widget;
use crate::error::{AppResult, GuiError};
use crate::queue::{poll_once, QueueClient, QueueStateModel, ServerStatus};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::warn;

/// Indicator keys, in display order.
pub const INDICATORS: [&str; 3] = ["connected", "queue", "run_engine"];

fn enabled() -> bool {
    true
}

fn default_slot() -> String {
    "queue_status".to_string()
}

/// Options of the status indicators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueueStatusOptions {
    /// Hidden when `false`
    #[serde(default = "enabled")]
    pub enabled: bool,
    /// Indicator key → title override
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Component name in the pane layout
    #[serde(default = "default_slot")]
    pub layout_slot: String,
    /// Poll period override for the queue server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,
}

impl Default for QueueStatusOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            labels: BTreeMap::new(),
            layout_slot: default_slot(),
            poll_interval_ms: None,
        }
    }
}

impl QueueStatusOptions {
    /// Reject labels for unknown indicators.
    pub fn validate(&self, widget: &str, option: &str) -> AppResult<()> {
        if let Some(unknown) = self.labels.keys().find(|key| !INDICATORS.contains(&key.as_str())) {
            return Err(GuiError::config(
                widget,
                format!("{}.labels.{}", option, unknown),
                format!("unknown indicator (known: {})", INDICATORS.join(", ")),
            ));
        }
        if self.poll_interval_ms == Some(0) {
            return Err(GuiError::config(
                widget,
                format!("{}.poll_interval_ms", option),
                "expected a positive integer",
            ));
        }
        Ok(())
    }

    /// Title of an indicator.
    pub fn title(&self, indicator: &str) -> String {
        if let Some(label) = self.labels.get(indicator) {
            return label.clone();
        }
        match indicator {
            "connected" => "QServer Connected:",
            "queue" => "Queue Status:",
            "run_engine" => "RunEngine Status:",
            other => other,
        }
        .to_string()
    }
}

/// Connection, queue and run engine state with a manual refresh button.
pub struct QueueStatusWidget {
    key: String,
    options: QueueStatusOptions,
    model: Arc<QueueStateModel>,
    client: Arc<dyn QueueClient>,
    runtime: Option<Handle>,
}

impl QueueStatusWidget {
    /// Indicators for `model`. `runtime` is needed for the connect button.
    pub fn new(
        key: impl Into<String>,
        options: QueueStatusOptions,
        model: Arc<QueueStateModel>,
        client: Arc<dyn QueueClient>,
        runtime: Option<Handle>,
    ) -> Self {
        Self {
            key: key.into(),
            options,
            model,
            client,
            runtime,
        }
    }

    /// Indicator values for a status, keyed like [`INDICATORS`].
    pub fn indicator_values(status: &ServerStatus) -> [(&'static str, String); 3] {
        [
            (
                "connected",
                if status.connected { "Connected" } else { "Disconnected" }.to_string(),
            ),
            ("queue", status.queue_state.clone()),
            ("run_engine", status.re_state.clone()),
        ]
    }

    fn request_poll(&self) {
        let Some(runtime) = &self.runtime else {
            warn!("no async runtime, cannot contact the queue server");
            return;
        };
        let client = self.client.clone();
        let model = self.model.clone();
        runtime.spawn(async move {
            if let Err(err) = poll_once(client.as_ref(), &model).await {
                warn!("queue server unreachable: {}", err);
            }
        });
    }
}

impl Widget for QueueStatusWidget {
    fn key(&self) -> &str {
        &self.key
    }

    fn ui(&mut self, ui: &mut egui::Ui) {
        let status = self.model.status();
        if ui.button("Connect to QServer").clicked() {
            self.request_poll();
        }
        egui::Grid::new(("queue_status", self.key.as_str()))
            .num_columns(2)
            .show(ui, |ui| {
                for (indicator, value) in Self::indicator_values(&status) {
                    ui.label(self.options.title(indicator));
                    if indicator == "connected" {
                        let color = if status.connected {
                            egui::Color32::from_rgb(46, 125, 50)
                        } else {
                            egui::Color32::from_rgb(198, 40, 40)
                        };
                        ui.colored_label(color, egui::RichText::new(value).strong());
                    } else {
                        ui.label(value);
                    }
                    ui.end_row();
                }
            });

        let snapshot = self.model.snapshot();
        ui.small(format!(
            "{} pending, {} running, {} completed",
            snapshot.pending.len(),
            usize::from(snapshot.active.is_some()),
            snapshot.completed.len()
        ));
    }

    fn summary(&self) -> Vec<String> {
        INDICATORS
            .iter()
            .map(|indicator| self.options.title(indicator))
            .collect()
    }

    fn poll_interval(&self) -> Option<Duration> {
        self.options.poll_interval_ms.map(Duration::from_millis)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_overrides() {
        let options = QueueStatusOptions {
            labels: BTreeMap::from([("queue".to_string(), "Queue:".to_string())]),
            ..QueueStatusOptions::default()
        };
        assert_eq!(options.title("queue"), "Queue:");
        assert_eq!(options.title("run_engine"), "RunEngine Status:");
        assert!(options.validate("qserver_status", "options").is_ok());
    }

    #[test]
    fn test_unknown_indicator_rejected() {
        let options = QueueStatusOptions {
            labels: BTreeMap::from([("beam".to_string(), "Beam:".to_string())]),
            ..QueueStatusOptions::default()
        };
        let err = options.validate("scan_setup", "queue_status").unwrap_err();
        assert!(err.to_string().contains("queue_status.labels.beam"));
    }

    #[test]
    fn test_indicator_values() {
        let values = QueueStatusWidget::indicator_values(&ServerStatus::connected("running", "executing"));
        assert_eq!(values[0].1, "Connected");
        assert_eq!(values[2].1, "executing");
    }
}
