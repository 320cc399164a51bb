//! Configuration Resolver
//!
//! Turns tab sections of a [`ConfigDocument`] into validated [`WidgetConfig`]s.
//! For each section the resolver
//!
//! 1. looks up the widget's descriptor (unknown key → `UnknownWidget`),
//! 2. merges the section's `options` over the schema defaults, rejecting keys
//!    outside the schema and missing required options,
//! 3. runs the descriptor's config hook, which checks nested shapes and fills
//!    host-supplied values such as `--data-path` roots,
//! 4. resolves the placement overrides.
//!
//! Resolution is a pure function of the document, the registry and the
//! [`ResolveContext`]: resolving the same document twice gives equal configs.

use super::document::{ConfigDocument, TabSection};
use super::resolved::{Placement, WidgetConfig};
use crate::error::{AppResult, GuiError};
use crate::registry::WidgetRegistry;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

/// Host-supplied values available to config hooks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveContext {
    /// Roots given with `--data-path`, in command-line order
    pub data_paths: Vec<PathBuf>,
}

/// Resolves tab sections against a registry.
#[derive(Debug)]
pub struct ConfigResolver<'r> {
    registry: &'r WidgetRegistry,
    context: ResolveContext,
}

impl<'r> ConfigResolver<'r> {
    /// Resolver with an empty context.
    pub fn new(registry: &'r WidgetRegistry) -> Self {
        Self {
            registry,
            context: ResolveContext::default(),
        }
    }

    /// Use these data roots for loaders that declare none.
    pub fn with_data_paths(mut self, data_paths: Vec<PathBuf>) -> Self {
        self.context.data_paths = data_paths;
        self
    }

    /// Context passed to config hooks.
    pub fn context(&self) -> &ResolveContext {
        &self.context
    }

    /// Resolve the section for `widget_key`, or the schema defaults when the
    /// document has none.
    pub fn resolve(&self, document: &ConfigDocument, widget_key: &str) -> AppResult<WidgetConfig> {
        match document.tab(widget_key) {
            Some(section) => self.resolve_section(section),
            None => self.resolve_section(&TabSection::new(widget_key)),
        }
    }

    /// Resolve one tab section.
    pub fn resolve_section(&self, section: &TabSection) -> AppResult<WidgetConfig> {
        let descriptor = self
            .registry
            .get(&section.key)
            .ok_or_else(|| GuiError::UnknownWidget {
                key: section.key.clone(),
            })?;
        let options = descriptor.resolve_options(&section.options, &self.context)?;
        let placement = resolve_placement(section)?;
        debug!(widget = %section.key, options = options.len(), "resolved widget config");
        Ok(WidgetConfig {
            widget_key: section.key.clone(),
            options,
            placement,
        })
    }

    /// Resolve every requested key before anything is built.
    ///
    /// Stops at the first invalid section.
    pub fn resolve_all(
        &self,
        document: &ConfigDocument,
        keys: &[String],
    ) -> AppResult<HashMap<String, WidgetConfig>> {
        keys.iter()
            .map(|key| Ok((key.clone(), self.resolve(document, key)?)))
            .collect()
    }

    /// Resolve a list of sections, keeping their order.
    pub fn resolve_tabs(&self, sections: &[TabSection]) -> AppResult<Vec<WidgetConfig>> {
        sections
            .iter()
            .map(|section| self.resolve_section(section))
            .collect()
    }
}

fn resolve_placement(section: &TabSection) -> AppResult<Placement> {
    let placement = Placement {
        row: section.row,
        column: section.column,
        row_span: section.row_span.unwrap_or(1),
        column_span: section.column_span.unwrap_or(1),
        order: section.order,
    };
    placement.validate(&section.key, "")?;
    Ok(placement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigSchema;
    use crate::registry::WidgetDescriptor;
    use crate::widgets::Widget;
    use serde_json::{json, Value};
    use std::any::Any;

    struct Blank(String);

    impl Widget for Blank {
        fn key(&self) -> &str {
            &self.0
        }

        fn ui(&mut self, ui: &mut egui::Ui) {
            ui.label(&self.0);
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn registry() -> WidgetRegistry {
        let mut registry = WidgetRegistry::new();
        registry
            .register(
                WidgetDescriptor::new("monitor", "Monitor", |config| {
                    Ok(Box::new(Blank(config.widget_key.clone())) as Box<dyn Widget>)
                })
                .with_schema(
                    ConfigSchema::new()
                        .option("poll_interval_ms", json!(2000))
                        .optional("columns"),
                ),
            )
            .unwrap();
        registry
    }

    const DOC: &str = r#"
tabs:
  - key: monitor
    row: 1
    column: 0
    options:
      poll_interval_ms: 250
"#;

    #[test]
    fn test_resolve_merges_defaults() {
        let registry = registry();
        let doc = ConfigDocument::from_yaml_str(DOC).unwrap();
        let config = ConfigResolver::new(&registry).resolve(&doc, "monitor").unwrap();
        assert_eq!(config.options["poll_interval_ms"], json!(250));
        assert_eq!(config.placement, Placement::at(1, 0));

        let defaults = ConfigResolver::new(&registry)
            .resolve(&ConfigDocument::default(), "monitor")
            .unwrap();
        assert_eq!(defaults.options["poll_interval_ms"], json!(2000));
        assert!(!defaults.options.contains_key("columns"));
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let registry = registry();
        let doc = ConfigDocument::from_yaml_str(DOC).unwrap();
        let resolver = ConfigResolver::new(&registry);
        let keys = vec!["monitor".to_string()];
        assert_eq!(
            resolver.resolve_all(&doc, &keys).unwrap(),
            resolver.resolve_all(&doc, &keys).unwrap()
        );
    }

    #[test]
    fn test_unknown_widget() {
        let registry = registry();
        let err = ConfigResolver::new(&registry)
            .resolve(&ConfigDocument::default(), "nope")
            .unwrap_err();
        assert!(matches!(err, GuiError::UnknownWidget { key } if key == "nope"));
    }

    #[test]
    fn test_unknown_option_names_widget_and_option() {
        let registry = registry();
        let mut section = TabSection::new("monitor");
        section.options.insert("colour".into(), Value::from("red"));
        let err = ConfigResolver::new(&registry)
            .resolve_section(&section)
            .unwrap_err();
        match err {
            GuiError::ConfigValidation { widget, option, .. } => {
                assert_eq!(widget, "monitor");
                assert_eq!(option, "colour");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_zero_span_rejected() {
        let registry = registry();
        let mut section = TabSection::new("monitor");
        section.row_span = Some(0);
        assert!(ConfigResolver::new(&registry).resolve_section(&section).is_err());
    }

    #[test]
    fn test_out_of_range_placement_rejected() {
        let registry = registry();
        let mut section = TabSection::new("monitor");
        section.row = Some(u32::MAX);
        section.row_span = Some(u32::MAX);
        let err = ConfigResolver::new(&registry)
            .resolve_section(&section)
            .unwrap_err();
        assert!(matches!(err, GuiError::ConfigValidation { ref option, .. } if option == "row"));

        let mut section = TabSection::new("monitor");
        section.column_span = Some(1_000_000);
        let err = ConfigResolver::new(&registry)
            .resolve_section(&section)
            .unwrap_err();
        assert!(matches!(err, GuiError::ConfigValidation { ref option, .. } if option == "column_span"));
    }
}
