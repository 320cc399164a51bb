//! Validated per-widget configuration handed to factories.

use crate::error::{AppResult, GuiError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Highest row or column index a placement may name.
pub const MAX_GRID_INDEX: u32 = 63;
/// Longest row or column span.
pub const MAX_GRID_SPAN: u32 = 64;
/// Largest row or column stretch weight.
pub const MAX_STRETCH: u32 = 1000;

/// Grid placement of a tab or component.
///
/// Unset `row`/`column` means "stack below the previous entry".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Placement {
    /// Top row, if pinned
    pub row: Option<u32>,
    /// Left column, if pinned
    pub column: Option<u32>,
    /// Rows covered, at least 1
    pub row_span: u32,
    /// Columns covered, at least 1
    pub column_span: u32,
    /// Explicit ordering key
    pub order: Option<i32>,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            row: None,
            column: None,
            row_span: 1,
            column_span: 1,
            order: None,
        }
    }
}

impl Placement {
    /// Placement at a fixed cell.
    pub fn at(row: u32, column: u32) -> Self {
        Self {
            row: Some(row),
            column: Some(column),
            ..Self::default()
        }
    }

    /// Whether row or column was given explicitly.
    pub fn is_explicit(&self) -> bool {
        self.row.is_some() || self.column.is_some()
    }

    /// Check indices and spans against the grid bounds.
    ///
    /// Option names in errors are `row`, `column`, `row_span` and
    /// `column_span`, behind `prefix` when it is not empty.
    pub fn validate(&self, widget: &str, prefix: &str) -> AppResult<()> {
        let option = |name: &str| {
            if prefix.is_empty() {
                name.to_string()
            } else {
                format!("{}.{}", prefix, name)
            }
        };
        for (name, index) in [("row", self.row), ("column", self.column)] {
            if index.is_some_and(|index| index > MAX_GRID_INDEX) {
                return Err(GuiError::config(
                    widget,
                    option(name),
                    format!("must be at most {}", MAX_GRID_INDEX),
                ));
            }
        }
        for (name, span) in [("row_span", self.row_span), ("column_span", self.column_span)] {
            if !(1..=MAX_GRID_SPAN).contains(&span) {
                return Err(GuiError::config(
                    widget,
                    option(name),
                    format!("span must be between 1 and {}", MAX_GRID_SPAN),
                ));
            }
        }
        Ok(())
    }
}

/// Check a `row_stretch`/`column_stretch` map: track index → weight.
pub fn validate_stretch(widget: &str, option: &str, stretch: &BTreeMap<u32, u32>) -> AppResult<()> {
    for (&track, &weight) in stretch {
        if track > MAX_GRID_INDEX {
            return Err(GuiError::config(
                widget,
                format!("{}.{}", option, track),
                format!("track index must be at most {}", MAX_GRID_INDEX),
            ));
        }
        if weight > MAX_STRETCH {
            return Err(GuiError::config(
                widget,
                format!("{}.{}", option, track),
                format!("weight must be at most {}", MAX_STRETCH),
            ));
        }
    }
    Ok(())
}

/// Options of one widget after schema defaults and validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WidgetConfig {
    /// Registered widget key
    pub widget_key: String,
    /// Every schema option with a value, explicit or default
    pub options: Map<String, Value>,
    /// Where the widget goes in the window
    pub placement: Placement,
}

impl WidgetConfig {
    /// Config with default placement.
    pub fn new(widget_key: impl Into<String>, options: Map<String, Value>) -> Self {
        Self {
            widget_key: widget_key.into(),
            options,
            placement: Placement::default(),
        }
    }

    /// Raw value of one option.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.options.get(name)
    }

    /// Deserialize the options into a typed struct.
    ///
    /// # Errors
    ///
    /// `ConfigValidation` naming this widget when the options do not fit `T`.
    pub fn typed<T: DeserializeOwned>(&self) -> AppResult<T> {
        serde_json::from_value(Value::Object(self.options.clone()))
            .map_err(|err| GuiError::config(&self.widget_key, "options", err.to_string()))
    }

    /// Deserialize a single option.
    pub fn option<T: DeserializeOwned>(&self, name: &str) -> AppResult<Option<T>> {
        match self.options.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|err| GuiError::config(&self.widget_key, name, err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Options {
        poll_interval_ms: u64,
    }

    fn config(value: Value) -> WidgetConfig {
        match value {
            Value::Object(map) => WidgetConfig::new("qserver_monitor", map),
            _ => WidgetConfig::new("qserver_monitor", Map::new()),
        }
    }

    #[test]
    fn test_typed_options() {
        let options: Options = config(json!({"poll_interval_ms": 250})).typed().unwrap();
        assert_eq!(options.poll_interval_ms, 250);
    }

    #[test]
    fn test_wrong_shape_names_widget() {
        let err = config(json!({"poll_interval_ms": "soon"}))
            .option::<u64>("poll_interval_ms")
            .unwrap_err();
        match err {
            GuiError::ConfigValidation { widget, option, .. } => {
                assert_eq!(widget, "qserver_monitor");
                assert_eq!(option, "poll_interval_ms");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_default_placement_stacks() {
        let placement = Placement::default();
        assert!(!placement.is_explicit());
        assert_eq!(placement.row_span, 1);
        assert!(Placement::at(0, 1).is_explicit());
    }
}
