//! Builder-side configuration tree.
//!
//! A [`Component`] is plain data: a plugin type name, string attributes, an
//! optional value and ordered children. Nothing is resolved or validated
//! until the tree is handed to [`BuiltConfiguration`](super::BuiltConfiguration).

use super::{BuiltConfiguration, PluginRegistry};
use crate::core::{FilterResult, Level};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    #[serde(rename = "type")]
    pub plugin_type: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<Component>,
}

impl Component {
    pub fn new(plugin_type: impl Into<String>) -> Self {
        Self {
            plugin_type: plugin_type.into(),
            ..Self::default()
        }
    }

    /// Case-insensitive attribute lookup
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// First direct child of the given plugin type
    pub fn child(&self, plugin_type: &str) -> Option<&Component> {
        self.components
            .iter()
            .find(|c| c.plugin_type.eq_ignore_ascii_case(plugin_type))
    }
}

/// Fluent builder for one [`Component`].
#[must_use]
#[derive(Debug, Clone)]
pub struct ComponentBuilder {
    component: Component,
}

impl ComponentBuilder {
    pub fn new(plugin_type: impl Into<String>) -> Self {
        Self {
            component: Component::new(plugin_type),
        }
    }

    pub fn add_attribute(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.component
            .attributes
            .insert(key.into(), value.to_string());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.component.value = Some(value.into());
        self
    }

    pub fn add_component(mut self, child: ComponentBuilder) -> Self {
        self.component.components.push(child.build());
        self
    }

    pub fn build(self) -> Component {
        self.component
    }
}

impl From<ComponentBuilder> for Component {
    fn from(builder: ComponentBuilder) -> Self {
        builder.build()
    }
}

/// Assembles a complete configuration tree.
///
/// # Example
///
/// ```
/// use rust_logging_core::config::{ConfigurationBuilder, PluginRegistry};
/// use rust_logging_core::Level;
/// use std::sync::Arc;
///
/// let builder = ConfigurationBuilder::new().name("example");
/// let console = builder
///     .new_appender("Stdout", "Console")
///     .add_component(builder.new_layout("TextLayout"));
/// let root = builder
///     .new_root_logger(Level::INFO)
///     .add_component(builder.new_appender_ref("Stdout"));
///
/// let mut config = builder
///     .add_appender(console)
///     .add_root_logger(root)
///     .build(Arc::new(PluginRegistry::with_core_plugins()));
/// config.setup().unwrap();
/// assert!(config.root_component().is_none());
/// ```
#[must_use]
#[derive(Debug, Clone)]
pub struct ConfigurationBuilder {
    attributes: BTreeMap<String, String>,
    properties: Component,
    custom_levels: Component,
    filters: Component,
    appenders: Component,
    loggers: Component,
}

impl Default for ConfigurationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigurationBuilder {
    pub fn new() -> Self {
        Self {
            attributes: BTreeMap::new(),
            properties: Component::new("Properties"),
            custom_levels: Component::new("CustomLevels"),
            filters: Component::new("Filters"),
            appenders: Component::new("Appenders"),
            loggers: Component::new("Loggers"),
        }
    }

    pub fn name(self, name: impl Into<String>) -> Self {
        self.attribute("name", name.into())
    }

    /// Level of the framework's own diagnostics
    pub fn status(self, level: Level) -> Self {
        self.attribute("status", level.name())
    }

    pub fn shutdown_timeout(self, timeout: Duration) -> Self {
        self.attribute("shutdownTimeout", timeout.as_millis())
    }

    /// Sets any root attribute
    pub fn attribute(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.attributes.insert(key.into(), value.to_string());
        self
    }

    pub fn new_appender(&self, name: &str, plugin_type: &str) -> ComponentBuilder {
        ComponentBuilder::new(plugin_type).add_attribute("name", name)
    }

    pub fn new_layout(&self, plugin_type: &str) -> ComponentBuilder {
        ComponentBuilder::new(plugin_type)
    }

    pub fn new_filter(
        &self,
        plugin_type: &str,
        on_match: FilterResult,
        on_mismatch: FilterResult,
    ) -> ComponentBuilder {
        ComponentBuilder::new(plugin_type)
            .add_attribute("onMatch", on_match)
            .add_attribute("onMismatch", on_mismatch)
    }

    pub fn new_logger(&self, name: &str, level: Level) -> ComponentBuilder {
        ComponentBuilder::new("Logger")
            .add_attribute("name", name)
            .add_attribute("level", level.name())
    }

    pub fn new_root_logger(&self, level: Level) -> ComponentBuilder {
        ComponentBuilder::new("Root").add_attribute("level", level.name())
    }

    pub fn new_appender_ref(&self, reference: &str) -> ComponentBuilder {
        ComponentBuilder::new("AppenderRef").add_attribute("ref", reference)
    }

    pub fn new_property(&self, name: &str, value: &str) -> ComponentBuilder {
        ComponentBuilder::new("Property")
            .add_attribute("name", name)
            .with_value(value)
    }

    pub fn new_custom_level(&self, name: &str, int_level: u32) -> ComponentBuilder {
        ComponentBuilder::new("CustomLevel")
            .add_attribute("name", name)
            .add_attribute("intLevel", int_level)
    }

    pub fn add_property(mut self, name: &str, value: &str) -> Self {
        let property = self.new_property(name, value).build();
        self.properties.components.push(property);
        self
    }

    pub fn add_custom_level(mut self, name: &str, int_level: u32) -> Self {
        let level = self.new_custom_level(name, int_level).build();
        self.custom_levels.components.push(level);
        self
    }

    pub fn add_filter(mut self, filter: ComponentBuilder) -> Self {
        self.filters.components.push(filter.build());
        self
    }

    pub fn add_appender(mut self, appender: ComponentBuilder) -> Self {
        self.appenders.components.push(appender.build());
        self
    }

    pub fn add_logger(mut self, logger: ComponentBuilder) -> Self {
        self.loggers.components.push(logger.build());
        self
    }

    pub fn add_root_logger(self, root: ComponentBuilder) -> Self {
        self.add_logger(root)
    }

    /// The raw tree: a `Configuration` component whose children are the
    /// Properties, CustomLevels, Filters, Appenders and Loggers sections,
    /// present even when empty.
    pub fn build_component(self) -> Component {
        Component {
            plugin_type: "Configuration".to_string(),
            attributes: self.attributes,
            value: None,
            components: vec![
                self.properties,
                self.custom_levels,
                self.filters,
                self.appenders,
                self.loggers,
            ],
        }
    }

    pub fn build(self, plugins: Arc<PluginRegistry>) -> BuiltConfiguration {
        BuiltConfiguration::new(self.build_component(), plugins)
    }
}
