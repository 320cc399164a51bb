//! Per-widget option schemas.
//!
//! A schema lists every top-level option a widget understands, with its
//! default. Options outside the schema are rejected rather than ignored.

use crate::error::{AppResult, GuiError};
use serde::Serialize;
use serde_json::{Map, Value};

/// One recognized option.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionSpec {
    /// Option key
    pub name: String,
    /// Value used when the document omits the option
    pub default: Option<Value>,
    /// Whether the document must supply a value when there is no default
    pub required: bool,
}

/// Ordered set of options for one widget.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConfigSchema {
    options: Vec<OptionSpec>,
}

impl ConfigSchema {
    /// Schema with no options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an option with a default value.
    pub fn option(self, name: impl Into<String>, default: Value) -> Self {
        self.push(OptionSpec {
            name: name.into(),
            default: Some(default),
            required: false,
        })
    }

    /// Add an option that may be left out entirely.
    pub fn optional(self, name: impl Into<String>) -> Self {
        self.push(OptionSpec {
            name: name.into(),
            default: None,
            required: false,
        })
    }

    /// Add an option the document must supply.
    pub fn required(self, name: impl Into<String>) -> Self {
        self.push(OptionSpec {
            name: name.into(),
            default: None,
            required: true,
        })
    }

    fn push(mut self, spec: OptionSpec) -> Self {
        self.options.retain(|existing| existing.name != spec.name);
        self.options.push(spec);
        self
    }

    /// Spec for `name`.
    pub fn get(&self, name: &str) -> Option<&OptionSpec> {
        self.options.iter().find(|spec| spec.name == name)
    }

    /// Whether `name` is a recognized option.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Option names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.options.iter().map(|spec| spec.name.as_str())
    }

    /// Options that have defaults.
    pub fn defaults(&self) -> Map<String, Value> {
        self.options
            .iter()
            .filter_map(|spec| Some((spec.name.clone(), spec.default.clone()?)))
            .collect()
    }

    /// Merge `options` over the defaults.
    ///
    /// # Errors
    ///
    /// `ConfigValidation` for an option key outside the schema, or for a
    /// required option that is absent (or null).
    pub fn apply(&self, widget: &str, options: &Map<String, Value>) -> AppResult<Map<String, Value>> {
        if let Some(unknown) = options.keys().find(|key| !self.contains(key)) {
            let known: Vec<&str> = self.names().collect();
            return Err(GuiError::config(
                widget,
                unknown.as_str(),
                format!("unrecognized option (known: {})", known.join(", ")),
            ));
        }

        let mut merged = self.defaults();
        for (key, value) in options {
            merged.insert(key.clone(), value.clone());
        }

        for spec in self.options.iter().filter(|spec| spec.required) {
            if merged.get(&spec.name).map_or(true, Value::is_null) {
                return Err(GuiError::config(
                    widget,
                    spec.name.as_str(),
                    "required option is missing",
                ));
            }
        }
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> ConfigSchema {
        ConfigSchema::new()
            .option("poll_interval_ms", json!(2000))
            .optional("columns")
            .required("endpoint")
    }

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_explicit_overrides_default() {
        let merged = schema()
            .apply("w", &map(json!({"endpoint": "tcp://x", "poll_interval_ms": 10})))
            .unwrap();
        assert_eq!(merged["poll_interval_ms"], json!(10));
        assert!(!merged.contains_key("columns"));
    }

    #[test]
    fn test_missing_required() {
        let err = schema().apply("w", &Map::new()).unwrap_err();
        match err {
            GuiError::ConfigValidation { widget, option, .. } => {
                assert_eq!(widget, "w");
                assert_eq!(option, "endpoint");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_option_rejected() {
        let err = schema()
            .apply("w", &map(json!({"endpoint": "x", "colour": "red"})))
            .unwrap_err();
        assert!(err.to_string().contains("'colour'"));
    }

    #[test]
    fn test_redeclared_option_replaces() {
        let schema = ConfigSchema::new().option("a", json!(1)).option("a", json!(2));
        assert_eq!(schema.names().count(), 1);
        assert_eq!(schema.defaults()["a"], json!(2));
    }
}
