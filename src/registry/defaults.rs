//! Built-in widget set.

use super::{WidgetDescriptor, WidgetRegistry};
use crate::config::{ConfigSchema, WidgetConfig};
use crate::error::{AppResult, GuiError};
use crate::queue::{NullQueueClient, QueueClient, QueueStateModel};
use crate::status::StatusBus;
use crate::widgets::{
    QueueMonitorOptions, QueueMonitorWidget, QueueStatusOptions, QueueStatusWidget, ScanSetupConfig,
    ScanSetupWidget, Widget,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::debug;

/// Loaders, canvas and plan preparation.
pub const SCAN_SETUP: &str = "scan_setup";
/// Queue table.
pub const QSERVER_MONITOR: &str = "qserver_monitor";
/// Connection and state indicators on their own.
pub const QSERVER_STATUS: &str = "qserver_status";

/// Shared services captured by the built-in factories.
#[derive(Debug, Clone)]
pub struct WidgetServices {
    /// Queue state shown by every queue widget
    pub queue_model: Arc<QueueStateModel>,
    /// Client used for connect requests and plan submission
    pub queue_client: Arc<dyn QueueClient>,
    /// Status bar and application log messages
    pub status_bus: StatusBus,
    /// Lines streamed from the queue server console
    pub console_bus: StatusBus,
    /// Runtime for client calls made from the UI thread
    pub runtime: Option<Handle>,
}

impl Default for WidgetServices {
    fn default() -> Self {
        Self {
            queue_model: Arc::new(QueueStateModel::new()),
            queue_client: Arc::new(NullQueueClient),
            status_bus: StatusBus::default(),
            console_bus: StatusBus::default(),
            runtime: Handle::try_current().ok(),
        }
    }
}

impl WidgetServices {
    /// Services around an existing client.
    pub fn with_client(mut self, client: Arc<dyn QueueClient>) -> Self {
        self.queue_client = client;
        self
    }

    /// Spawn client calls on `runtime`.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }
}

fn boxed<W: Widget + 'static>(widget: W) -> AppResult<Box<dyn Widget>> {
    Ok(Box::new(widget))
}

fn parse_status_options(widget: &str, options: &Map<String, Value>) -> AppResult<QueueStatusOptions> {
    let present: Map<String, Value> = options
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    let parsed: QueueStatusOptions = serde_json::from_value(Value::Object(present))
        .map_err(|err| GuiError::config(widget, "options", err.to_string()))?;
    parsed.validate(widget, "options")?;
    Ok(parsed)
}

fn scan_setup(services: &WidgetServices) -> WidgetDescriptor {
    let services = services.clone();
    WidgetDescriptor::new(SCAN_SETUP, "Microscopy Beamline Data Acquisition", move |config: &WidgetConfig| {
        boxed(ScanSetupWidget::from_config(config, &services)?)
    })
    .with_description("Load X-ray data and prepare data acquisition bluesky plans.")
    .with_schema(
        ConfigSchema::new()
            .option("loaders", json!({}))
            .option("data_paths", json!([]))
            .optional("plan_editor")
            .option("queue_status", json!({}))
            .optional("console_output")
            .option("layout", json!({}))
            .option("poll_interval_ms", json!(2000)),
    )
    .with_config_hook(|options, context| ScanSetupConfig::normalize(SCAN_SETUP, options, context))
}

fn qserver_monitor(services: &WidgetServices) -> WidgetDescriptor {
    let services = services.clone();
    WidgetDescriptor::new(QSERVER_MONITOR, "Queue Monitor", move |config: &WidgetConfig| {
        boxed(QueueMonitorWidget::from_config(config, &services)?)
    })
    .with_description("View Bluesky QServer queue, active plan, and history.")
    .with_schema(
        ConfigSchema::new()
            .option("poll_interval_ms", json!(2000))
            .option("roi_key_map", json!({}))
            .option("columns", json!([])),
    )
    .with_config_hook(|options, _| {
        QueueMonitorOptions::from_options(QSERVER_MONITOR, &options).map(|parsed| parsed.to_options())
    })
}

fn qserver_status(services: &WidgetServices) -> WidgetDescriptor {
    let services = services.clone();
    WidgetDescriptor::new(QSERVER_STATUS, "Queue Server Status", move |config: &WidgetConfig| {
        let options = parse_status_options(&config.widget_key, &config.options)?;
        boxed(QueueStatusWidget::new(
            config.widget_key.clone(),
            options,
            services.queue_model.clone(),
            services.queue_client.clone(),
            services.runtime.clone(),
        ))
    })
    .with_description("Connection, queue and RunEngine state of the Bluesky QServer.")
    .with_schema(
        ConfigSchema::new()
            .option("labels", json!({}))
            .optional("poll_interval_ms"),
    )
    .with_config_hook(|options, _| {
        parse_status_options(QSERVER_STATUS, &options)?;
        Ok(options)
    })
}

impl WidgetRegistry {
    /// Ensure the built-in widgets are registered.
    ///
    /// Keys that are already present keep their descriptor, so calling this
    /// any number of times leaves the same entry set. Returns the number of
    /// keys added by this call.
    pub fn register_defaults(&mut self, services: &WidgetServices) -> usize {
        let mut added = 0;
        for descriptor in [scan_setup(services), qserver_monitor(services), qserver_status(services)] {
            let key = descriptor.key().to_string();
            if self.contains(&key) {
                continue;
            }
            self.entries.insert(key.clone(), descriptor);
            self.order.push(key.clone());
            debug!(widget = %key, "registered built-in widget");
            added += 1;
        }
        added
    }
}
