//! Custom error types for the application.
//!
//! This module defines the primary error type, `GuiError`, shared by the widget
//! registry, the configuration resolver, and the queue state model.
//!
//! ## Error Hierarchy
//!
//! - **`DuplicateKey`**: a descriptor was registered under a key that already exists
//!   and the caller did not ask for replacement.
//! - **`UnknownWidget`**: a requested widget key has no registered descriptor.
//! - **`ConfigValidation`**: a configuration section is malformed. Always names the
//!   widget key and the offending option so the message is actionable at startup.
//! - **`ConfigLoad`**: the configuration document could not be read or parsed.
//! - **`SnapshotInconsistency`**: a queue update would place one item in two
//!   partitions. The model rejects such updates and keeps its last good snapshot.
//! - **`QueueClient`**: the queue-server client failed to deliver data.
//!
//! Registry and configuration errors abort startup. Queue errors are reported and
//! the application keeps running with a stale display.

use crate::queue::Partition;
use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, GuiError>;

/// Errors raised while building and running the control room.
#[derive(Error, Debug)]
pub enum GuiError {
    /// A descriptor was registered under a key already taken
    #[error("Widget '{key}' is already registered")]
    DuplicateKey {
        /// The contested key
        key: String,
    },

    /// A requested widget key has no descriptor
    #[error("Widget '{key}' is not registered")]
    UnknownWidget {
        /// The requested key
        key: String,
    },

    /// An option failed validation
    #[error("Invalid configuration for widget '{widget}', option '{option}': {reason}")]
    ConfigValidation {
        /// Widget the option belongs to
        widget: String,
        /// Dotted option path
        option: String,
        /// What was expected
        reason: String,
    },

    /// The configuration file could not be read or parsed
    #[error("Configuration load error: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// An update would place one item in two partitions
    #[error("Queue item '{uid}' would appear in both {first} and {second}")]
    SnapshotInconsistency {
        /// Item listed twice
        uid: String,
        /// First partition it appears in
        first: Partition,
        /// Second partition it appears in
        second: Partition,
    },

    /// The queue server refused or could not be reached
    #[error("Queue client error: {0}")]
    QueueClient(String),

    /// A plan draft or edit is invalid
    #[error("Plan error: {0}")]
    Plan(String),

    /// Window or rendering failure
    #[error("GUI error: {0}")]
    Gui(String),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for GuiError {
    fn from(err: figment::Error) -> Self {
        GuiError::ConfigLoad(Box::new(err))
    }
}

impl GuiError {
    /// Build a `ConfigValidation` error.
    pub fn config(
        widget: impl Into<String>,
        option: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        GuiError::ConfigValidation {
            widget: widget.into(),
            option: option.into(),
            reason: reason.into(),
        }
    }

    /// True for errors raised while assembling the window from configuration.
    pub fn is_startup_error(&self) -> bool {
        matches!(
            self,
            GuiError::DuplicateKey { .. }
                | GuiError::UnknownWidget { .. }
                | GuiError::ConfigValidation { .. }
                | GuiError::ConfigLoad(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GuiError::config("scan_setup", "loaders.xrf", "expected a mapping");
        assert_eq!(
            err.to_string(),
            "Invalid configuration for widget 'scan_setup', option 'loaders.xrf': expected a mapping"
        );
    }

    #[test]
    fn test_snapshot_inconsistency_names_partitions() {
        let err = GuiError::SnapshotInconsistency {
            uid: "abc".into(),
            first: Partition::Pending,
            second: Partition::Active,
        };
        assert_eq!(
            err.to_string(),
            "Queue item 'abc' would appear in both pending and active"
        );
        assert!(!err.is_startup_error());
    }

    #[test]
    fn test_startup_errors() {
        assert!(GuiError::UnknownWidget { key: "x".into() }.is_startup_error());
        assert!(GuiError::DuplicateKey { key: "x".into() }.is_startup_error());
        assert!(!GuiError::QueueClient("down".into()).is_startup_error());
    }
}
