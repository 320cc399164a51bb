//! Status bar message bus.
//!
//! [`StatusLayer`] forwards INFO and higher tracing events to a [`StatusBus`].
//! The window's status bar shows the latest message and the console panel shows
//! the bounded history.

use chrono::{DateTime, Local};
use egui::Color32;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// History length kept when no capacity is given.
pub const DEFAULT_HISTORY: usize = 500;

/// One status message.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusMessage {
    /// When the message was posted
    pub timestamp: DateTime<Local>,
    /// Severity
    pub level: Level,
    /// Module path of the emitting code
    pub target: String,
    /// Message text
    pub text: String,
}

impl StatusMessage {
    /// Color for the message level.
    pub fn color(&self) -> Color32 {
        match self.level {
            Level::ERROR => Color32::from_rgb(255, 100, 100),
            Level::WARN => Color32::from_rgb(255, 255, 100),
            Level::INFO => Color32::from_rgb(100, 200, 255),
            _ => Color32::GRAY,
        }
    }
}

struct Inner {
    history: Mutex<VecDeque<StatusMessage>>,
    capacity: usize,
    latest: watch::Sender<Option<StatusMessage>>,
}

/// Shared sink for status messages. Clones share the same history.
#[derive(Clone)]
pub struct StatusBus {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for StatusBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusBus")
            .field("capacity", &self.inner.capacity)
            .field("len", &self.len())
            .finish()
    }
}

impl Default for StatusBus {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY)
    }
}

impl StatusBus {
    /// Bus keeping at most `capacity` messages (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (latest, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                history: Mutex::new(VecDeque::with_capacity(capacity)),
                capacity,
                latest,
            }),
        }
    }

    /// Publish a message. Empty text is ignored.
    pub fn emit(&self, level: Level, target: impl Into<String>, text: impl Into<String>) {
        let text = text.into();
        if text.is_empty() {
            return;
        }
        let message = StatusMessage {
            timestamp: Local::now(),
            level,
            target: target.into(),
            text,
        };
        {
            let mut history = self.inner.history.lock();
            if history.len() >= self.inner.capacity {
                history.pop_front();
            }
            history.push_back(message.clone());
        }
        self.inner.latest.send_replace(Some(message));
    }

    /// Publish an INFO message from the application itself.
    pub fn info(&self, text: impl Into<String>) {
        self.emit(Level::INFO, "beamline_gui", text);
    }

    /// Most recent message.
    pub fn latest(&self) -> Option<StatusMessage> {
        self.inner.latest.borrow().clone()
    }

    /// Receiver notified on every message.
    pub fn subscribe(&self) -> watch::Receiver<Option<StatusMessage>> {
        self.inner.latest.subscribe()
    }

    /// Copy of the history, oldest first.
    pub fn history(&self) -> Vec<StatusMessage> {
        self.inner.history.lock().iter().cloned().collect()
    }

    /// Messages currently held
    pub fn len(&self) -> usize {
        self.inner.history.lock().len()
    }

    /// Whether no message is held
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop the history. The latest message stays.
    pub fn clear(&self) {
        self.inner.history.lock().clear();
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<String>,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }
}

impl MessageVisitor {
    fn into_text(self) -> String {
        match (self.message.is_empty(), self.fields.is_empty()) {
            (true, _) => self.fields.join(" "),
            (false, true) => self.message,
            (false, false) => format!("{} ({})", self.message, self.fields.join(", ")),
        }
    }
}

/// Tracing layer that forwards events at or above a level to a [`StatusBus`].
#[derive(Debug, Clone)]
pub struct StatusLayer {
    bus: StatusBus,
    min_level: Level,
}

impl StatusLayer {
    /// Forward INFO and above.
    pub fn new(bus: StatusBus) -> Self {
        Self {
            bus,
            min_level: Level::INFO,
        }
    }

    /// Change the lowest forwarded level.
    pub fn with_min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }
}

impl<S> Layer<S> for StatusLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        // more verbose levels compare greater
        if *metadata.level() > self.min_level {
            return;
        }
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.bus
            .emit(*metadata.level(), metadata.target(), visitor.into_text());
    }
}
