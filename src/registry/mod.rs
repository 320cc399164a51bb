//! Widget Registry
//!
//! Maps widget keys to [`WidgetDescriptor`]s and builds requested widgets from
//! resolved configuration.
//!
//! # Lifecycle
//!
//! The registry is an explicit value, not a process-wide singleton:
//!
//! 1. **create**: [`WidgetRegistry::new`]
//! 2. **populate**: [`WidgetRegistry::register_defaults`] and
//!    [`WidgetRegistry::register`] for host-specific widgets
//! 3. **freeze**: [`WidgetRegistry::freeze`] returns a cheaply cloneable,
//!    read-only [`FrozenRegistry`] for the composition host
//!
//! A host that wants to extend a frozen registry calls [`FrozenRegistry::thaw`]
//! to get a new mutable copy; the frozen one never changes.
//!
//! # Duplicates
//!
//! [`WidgetRegistry::register`] fails with `DuplicateKey`. Overwriting must be
//! requested with [`DuplicatePolicy::Replace`]; the later descriptor wins.

mod defaults;
mod descriptor;

pub use defaults::{WidgetServices, QSERVER_MONITOR, QSERVER_STATUS, SCAN_SETUP};
pub use descriptor::{ConfigHook, WidgetDescriptor, WidgetFactory};

use crate::config::WidgetConfig;
use crate::error::{AppResult, GuiError};
use crate::widgets::Widget;
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use tracing::{debug, warn};

/// What `register_with` does when the key already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Fail with `DuplicateKey`
    #[default]
    Reject,
    /// Replace the existing descriptor, keeping its position
    Replace,
    /// Keep the existing descriptor and report success
    KeepExisting,
}

/// Whether `build` stops at the first error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildMode {
    /// Build every key that can be built and collect the errors
    #[default]
    Collect,
    /// Return the first error
    FailFast,
}

/// A built widget with the key it was requested under.
pub struct BuiltWidget {
    /// Registry key
    pub key: String,
    /// The built widget
    pub widget: Box<dyn Widget>,
}

impl fmt::Debug for BuiltWidget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltWidget").field("key", &self.key).finish()
    }
}

/// Outcome of [`WidgetRegistry::build`].
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Built widgets in request order
    pub widgets: Vec<BuiltWidget>,
    /// Errors for keys that could not be built, in request order
    pub errors: Vec<GuiError>,
}

impl BuildReport {
    /// True when every requested key was built.
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    /// Keys of the built widgets.
    pub fn keys(&self) -> Vec<&str> {
        self.widgets.iter().map(|built| built.key.as_str()).collect()
    }
}

/// Mutable key → descriptor map, used while populating.
#[derive(Default, Clone)]
pub struct WidgetRegistry {
    entries: HashMap<String, WidgetDescriptor>,
    order: Vec<String>,
}

impl fmt::Debug for WidgetRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetRegistry")
            .field("keys", &self.order)
            .finish()
    }
}

impl WidgetRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor; fails if the key is taken.
    pub fn register(&mut self, descriptor: WidgetDescriptor) -> AppResult<()> {
        self.register_with(descriptor, DuplicatePolicy::Reject)
    }

    /// Add a descriptor with an explicit duplicate policy.
    pub fn register_with(
        &mut self,
        descriptor: WidgetDescriptor,
        policy: DuplicatePolicy,
    ) -> AppResult<()> {
        let key = descriptor.key().to_string();
        if self.entries.contains_key(&key) {
            match policy {
                DuplicatePolicy::Reject => return Err(GuiError::DuplicateKey { key }),
                DuplicatePolicy::KeepExisting => return Ok(()),
                DuplicatePolicy::Replace => {
                    debug!(widget = %key, "replacing widget descriptor");
                }
            }
        } else {
            self.order.push(key.clone());
        }
        self.entries.insert(key, descriptor);
        Ok(())
    }

    /// Descriptor for `key`.
    pub fn get(&self, key: &str) -> Option<&WidgetDescriptor> {
        self.entries.get(key)
    }

    /// Whether `key` is registered.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Registered keys in registration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Descriptors in registration order.
    pub fn descriptors(&self) -> impl Iterator<Item = &WidgetDescriptor> {
        self.order.iter().filter_map(|key| self.entries.get(key))
    }

    /// Number of registered widgets
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build one widget.
    ///
    /// Uses `config` when given, otherwise the descriptor's schema defaults.
    pub fn create(&self, key: &str, config: Option<&WidgetConfig>) -> AppResult<Box<dyn Widget>> {
        let descriptor = self.get(key).ok_or_else(|| GuiError::UnknownWidget {
            key: key.to_string(),
        })?;
        match config {
            Some(config) => descriptor.create(config),
            None => descriptor.create(&descriptor.default_config()?),
        }
    }

    /// Build the requested widgets in order.
    ///
    /// In [`BuildMode::Collect`] a failing key is recorded in the report and the
    /// remaining keys still build. In [`BuildMode::FailFast`] the first error is
    /// returned.
    pub fn build(
        &self,
        keys: &[String],
        configs: &HashMap<String, WidgetConfig>,
        mode: BuildMode,
    ) -> AppResult<BuildReport> {
        let mut report = BuildReport::default();
        for key in keys {
            match self.create(key, configs.get(key)) {
                Ok(widget) => report.widgets.push(BuiltWidget {
                    key: key.clone(),
                    widget,
                }),
                Err(err) if mode == BuildMode::FailFast => return Err(err),
                Err(err) => {
                    warn!(widget = %key, "failed to build widget: {}", err);
                    report.errors.push(err);
                }
            }
        }
        Ok(report)
    }

    /// Make the registry read-only.
    pub fn freeze(self) -> FrozenRegistry {
        FrozenRegistry {
            inner: Arc::new(self),
        }
    }
}

/// Shared, read-only registry handed to the composition host.
#[derive(Debug, Clone)]
pub struct FrozenRegistry {
    inner: Arc<WidgetRegistry>,
}

impl Deref for FrozenRegistry {
    type Target = WidgetRegistry;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl FrozenRegistry {
    /// Mutable copy for further registration.
    pub fn thaw(&self) -> WidgetRegistry {
        self.inner.as_ref().clone()
    }
}
