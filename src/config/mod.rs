//! Configuration: the declarative component tree, the plugin catalog that
//! materializes it, and the live routing it produces.

pub mod built;
pub mod component;
pub mod configuration;
pub mod logger_config;
pub mod node;
pub mod plugin;
pub mod plugins;

pub use built::BuiltConfiguration;
pub use component::{Component, ComponentBuilder, ConfigurationBuilder};
pub use configuration::{Configuration, DEFAULT_CONFIGURATION_NAME};
pub use logger_config::{AppenderRef, LoggerConfig, LoggerDefinition};
pub use node::Node;
pub use plugin::{BuildContext, PluginCategory, PluginDescriptor, PluginObject, PluginRegistry};
pub use plugins::register_core_plugins;
