//! Control-room widgets.
//!
//! Every widget is built by a registry factory from its resolved
//! [`WidgetConfig`](crate::config::WidgetConfig) and rendered by the host
//! through the [`Widget`] trait.

pub mod console;
pub mod loaders;
pub mod plan_editor;
pub mod queue_monitor;
pub mod queue_status;
pub mod scan_setup;

pub use console::{ConsoleOptions, ConsoleSource, ConsoleWidget};
pub use loaders::{LoaderKind, LoaderOptions, LoaderPanel, LoaderSpec, ReaderKind};
pub use crate::queue::{ParamKind, PlanDefinition, PlanParameter};
pub use plan_editor::{PlanEditor, PlanEditorOptions};
pub use queue_monitor::{QueueControl, QueueMonitorOptions, QueueMonitorWidget};
pub use queue_status::{QueueStatusOptions, QueueStatusWidget};
pub use scan_setup::{ScanSetupConfig, ScanSetupWidget};

use std::any::Any;
use std::time::Duration;

/// A widget the composition host can place and render.
pub trait Widget {
    /// Registry key the widget was built from.
    fn key(&self) -> &str;

    /// Draw the widget.
    fn ui(&mut self, ui: &mut egui::Ui);

    /// One line per notable setting, used by `--dry-run`.
    fn summary(&self) -> Vec<String> {
        Vec::new()
    }

    /// Queue poll period the widget wants, if it shows queue data.
    fn poll_interval(&self) -> Option<Duration> {
        None
    }

    /// Downcasting support for hosts and tests.
    fn as_any(&self) -> &dyn Any;
}
