//! Core library for the beamline control room.
//!
//! Widgets are declared in a [`registry::WidgetRegistry`], configured from a
//! YAML document through the [`config::ConfigResolver`], and assembled into a
//! window by the [`host`]. Queue widgets read a shared
//! [`queue::QueueStateModel`] that a host-owned poller keeps in sync with the
//! queue server.

pub mod cli;
pub mod config;
pub mod error;
pub mod host;
pub mod logging;
pub mod queue;
pub mod registry;
pub mod status;
pub mod widgets;

pub use error::{AppResult, GuiError};
pub use registry::{FrozenRegistry, WidgetRegistry, WidgetServices};
pub use widgets::Widget;
