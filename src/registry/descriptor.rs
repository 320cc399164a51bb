use crate::config::{ConfigSchema, ResolveContext, WidgetConfig};
use crate::error::AppResult;
use crate::widgets::Widget;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Builds a widget from its resolved configuration.
pub type WidgetFactory = Arc<dyn Fn(&WidgetConfig) -> AppResult<Box<dyn Widget>> + Send + Sync>;

/// Validates and normalizes merged options before any factory runs.
pub type ConfigHook =
    Arc<dyn Fn(Map<String, Value>, &ResolveContext) -> AppResult<Map<String, Value>> + Send + Sync>;

/// Immutable description of one widget kind.
#[derive(Clone)]
pub struct WidgetDescriptor {
    key: String,
    title: String,
    description: String,
    schema: ConfigSchema,
    factory: WidgetFactory,
    hook: Option<ConfigHook>,
}

impl fmt::Debug for WidgetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetDescriptor")
            .field("key", &self.key)
            .field("title", &self.title)
            .field("options", &self.schema.names().collect::<Vec<_>>())
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

impl WidgetDescriptor {
    /// Descriptor with an empty schema.
    pub fn new<F>(key: impl Into<String>, title: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&WidgetConfig) -> AppResult<Box<dyn Widget>> + Send + Sync + 'static,
    {
        Self {
            key: key.into(),
            title: title.into(),
            description: String::new(),
            schema: ConfigSchema::new(),
            factory: Arc::new(factory),
            hook: None,
        }
    }

    /// Set the tooltip text.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the option schema.
    pub fn with_schema(mut self, schema: ConfigSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Set the config hook.
    pub fn with_config_hook<H>(mut self, hook: H) -> Self
    where
        H: Fn(Map<String, Value>, &ResolveContext) -> AppResult<Map<String, Value>>
            + Send
            + Sync
            + 'static,
    {
        self.hook = Some(Arc::new(hook));
        self
    }

    /// Registry key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Default tab title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Default tab description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Options the widget accepts.
    pub fn schema(&self) -> &ConfigSchema {
        &self.schema
    }

    /// Merge `options` over the schema defaults and run the config hook.
    pub fn resolve_options(
        &self,
        options: &Map<String, Value>,
        context: &ResolveContext,
    ) -> AppResult<Map<String, Value>> {
        let merged = self.schema.apply(&self.key, options)?;
        match &self.hook {
            Some(hook) => hook(merged, context),
            None => Ok(merged),
        }
    }

    /// Config built from the schema defaults alone.
    pub fn default_config(&self) -> AppResult<WidgetConfig> {
        let options = self.resolve_options(&Map::new(), &ResolveContext::default())?;
        Ok(WidgetConfig::new(self.key.clone(), options))
    }

    /// Run the factory.
    pub fn create(&self, config: &WidgetConfig) -> AppResult<Box<dyn Widget>> {
        (self.factory)(config)
    }
}
