//! Plan definitions and parameter coercion.
//!
//! Definitions come from the configuration or from the queue server's plan
//! catalog. They turn the text typed into the plan editor or the queue table
//! into typed keyword arguments.

use super::item::QueueItem;
use crate::error::{AppResult, GuiError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// How parameter text is converted to a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    /// Integer, float, bool or JSON if the text parses as one, else a string
    #[default]
    Auto,
    /// Whole number
    Int,
    /// Floating-point number
    Float,
    /// `true`/`false`, also `yes`/`no` and `1`/`0`
    Bool,
    /// Comma-separated values, each converted like `Auto`
    List,
    /// Text kept as typed
    String,
}

/// One parameter of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanParameter {
    /// Keyword argument name
    pub name: String,
    /// Value used when the field is left blank
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Drafts fail while this is blank
    #[serde(default)]
    pub required: bool,
    /// Hover text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// How edited text is converted
    #[serde(default, alias = "type")]
    pub kind: ParamKind,
}

impl PlanParameter {
    /// Parameter without a default.
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            default: None,
            required: false,
            description: None,
            kind,
        }
    }

    /// Text shown in the value cell before editing.
    pub fn default_text(&self) -> String {
        match &self.default {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(text)) => text.clone(),
            Some(Value::Array(values)) => values
                .iter()
                .map(|value| match value {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(", "),
            Some(other) => other.to_string(),
        }
    }

    /// Convert edited text into a value of this parameter's kind.
    pub fn coerce(&self, text: &str) -> AppResult<Value> {
        let text = text.trim();
        let invalid = |expected: &str| {
            GuiError::Plan(format!(
                "parameter '{}': expected {}, got '{}'",
                self.name, expected, text
            ))
        };
        match self.kind {
            ParamKind::Auto => Ok(auto_value(text)),
            ParamKind::String => Ok(Value::String(text.to_string())),
            ParamKind::Int => text
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| invalid("an integer")),
            ParamKind::Float => text
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| invalid("a number")),
            ParamKind::Bool => match text.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" | "on" => Ok(Value::Bool(true)),
                "false" | "no" | "0" | "off" => Ok(Value::Bool(false)),
                _ => Err(invalid("true or false")),
            },
            ParamKind::List => {
                let inner = text.trim_start_matches('[').trim_end_matches(']');
                Ok(Value::Array(
                    inner
                        .split(',')
                        .map(str::trim)
                        .filter(|part| !part.is_empty())
                        .map(auto_value)
                        .collect(),
                ))
            }
        }
    }
}

fn auto_value(text: &str) -> Value {
    if let Ok(int) = text.parse::<i64>() {
        return Value::from(int);
    }
    if let Some(number) = text.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
        return Value::Number(number);
    }
    match text {
        "true" | "True" => return Value::Bool(true),
        "false" | "False" => return Value::Bool(false),
        "None" | "null" => return Value::Null,
        _ => {}
    }
    if text.starts_with('[') || text.starts_with('{') {
        if let Ok(value) = serde_json::from_str(text) {
            return value;
        }
    }
    Value::String(text.trim_matches(|c| c == '"' || c == '\'').to_string())
}

fn default_kind() -> String {
    "plan".to_string()
}

/// A plan or instruction the editor can draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanDefinition {
    /// Plan name sent to the server
    pub name: String,
    /// Kind tag, matched against the editor's kinds
    #[serde(default = "default_kind")]
    pub kind: String,
    /// Parameters in display order
    #[serde(default)]
    pub parameters: Vec<PlanParameter>,
    /// Shown next to the name in the plan list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PlanDefinition {
    /// Definition without parameters.
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            parameters: Vec::new(),
            description: None,
        }
    }

    /// Append a parameter.
    pub fn with_parameter(mut self, parameter: PlanParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Parameter called `name`.
    pub fn parameter(&self, name: &str) -> Option<&PlanParameter> {
        self.parameters.iter().find(|parameter| parameter.name == name)
    }

    /// Build a queue item from parameter texts keyed by name.
    ///
    /// Blank values are left out; a blank required parameter is an error.
    pub fn draft(&self, values: &BTreeMap<String, String>) -> AppResult<QueueItem> {
        let mut kwargs = Map::new();
        for parameter in &self.parameters {
            let text = values.get(&parameter.name).map(String::as_str).unwrap_or("");
            if text.trim().is_empty() {
                if parameter.required {
                    return Err(GuiError::Plan(format!(
                        "plan '{}': required parameter '{}' is empty",
                        self.name, parameter.name
                    )));
                }
                continue;
            }
            kwargs.insert(parameter.name.clone(), parameter.coerce(text)?);
        }
        let payload = serde_json::json!({ "args": [], "kwargs": Value::Object(kwargs) });
        Ok(QueueItem::new(uuid::Uuid::new_v4().to_string(), self.kind.clone(), self.name.clone())
            .with_payload(payload))
    }
}

/// Plan definitions by plan name.
pub type PlanCatalog = BTreeMap<String, PlanDefinition>;

/// Index definitions by name; a later definition replaces an earlier one.
pub fn catalog(definitions: impl IntoIterator<Item = PlanDefinition>) -> PlanCatalog {
    definitions
        .into_iter()
        .map(|definition| (definition.name.clone(), definition))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn count_plan() -> PlanDefinition {
        let mut num = PlanParameter::new("num", ParamKind::Int);
        num.required = true;
        let mut delay = PlanParameter::new("delay", ParamKind::Float);
        delay.default = Some(json!(0.5));
        PlanDefinition::new("count", "plan")
            .with_parameter(PlanParameter::new("detectors", ParamKind::List))
            .with_parameter(num)
            .with_parameter(delay)
    }

    #[test]
    fn test_coercion() {
        assert_eq!(PlanParameter::new("n", ParamKind::Int).coerce(" 7 ").unwrap(), json!(7));
        assert!(PlanParameter::new("n", ParamKind::Int).coerce("seven").is_err());
        assert_eq!(PlanParameter::new("b", ParamKind::Bool).coerce("Yes").unwrap(), json!(true));
        assert_eq!(
            PlanParameter::new("l", ParamKind::List).coerce("[det1, 2, 0.5]").unwrap(),
            json!(["det1", 2, 0.5])
        );
        assert_eq!(PlanParameter::new("a", ParamKind::Auto).coerce("'xs3'").unwrap(), json!("xs3"));
        assert_eq!(PlanParameter::new("s", ParamKind::String).coerce("12").unwrap(), json!("12"));
    }

    #[test]
    fn test_draft_builds_kwargs() {
        let values = BTreeMap::from([
            ("detectors".to_string(), "det1, det2".to_string()),
            ("num".to_string(), "5".to_string()),
            ("delay".to_string(), String::new()),
        ]);
        let item = count_plan().draft(&values).unwrap();
        assert_eq!(item.name, "count");
        assert_eq!(item.kind, "plan");
        assert!(!item.uid.is_empty());
        let kwargs = item.kwargs().unwrap();
        assert_eq!(kwargs["num"], json!(5));
        assert_eq!(kwargs["detectors"], json!(["det1", "det2"]));
        assert!(!kwargs.contains_key("delay"));
    }

    #[test]
    fn test_draft_requires_required() {
        let err = count_plan().draft(&BTreeMap::new()).unwrap_err();
        assert!(err.to_string().contains("'num'"));
    }

    #[test]
    fn test_definition_from_yaml_shape() {
        let definition: PlanDefinition = serde_json::from_value(json!({
            "name": "fly2d",
            "parameters": [
                {"name": "dwell", "type": "float", "default": 0.01},
                {"name": "roi_num", "required": true}
            ]
        }))
        .unwrap();
        assert_eq!(definition.kind, "plan");
        assert_eq!(definition.parameters[0].kind, ParamKind::Float);
        assert_eq!(definition.parameters[0].default_text(), "0.01");
        assert!(definition.parameter("roi_num").unwrap().required);
        assert!(definition.parameter("missing").is_none());
    }

    #[test]
    fn test_catalog_by_name() {
        let plans = catalog([count_plan(), PlanDefinition::new("queue_stop", "instruction")]);
        assert_eq!(plans.keys().collect::<Vec<_>>(), vec!["count", "queue_stop"]);
    }
}
