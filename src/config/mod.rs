//! Configuration: the YAML document, per-widget schemas, and the resolver that
//! turns one into validated widget configs.

pub mod document;
pub mod resolved;
pub mod resolver;
pub mod schema;

pub use document::{
    default_widget_keys, AppSettings, ConfigDocument, LayoutMode, StatusBarSettings, TabSection,
    WindowLayout, DEFAULT_WIDGET_KEYS,
};
pub use resolved::{
    validate_stretch, Placement, WidgetConfig, MAX_GRID_INDEX, MAX_GRID_SPAN, MAX_STRETCH,
};
pub use resolver::{ConfigResolver, ResolveContext};
pub use schema::{ConfigSchema, OptionSpec};
