//! Turns a builder-produced [`Component`] tree into a running
//! [`Configuration`].
//!
//! Two phases:
//!
//! 1. [`BuiltConfiguration::setup`] resolves every component against the
//!    plugin catalog and produces the [`Node`] tree. Empty Properties and
//!    CustomLevels sections are omitted; a Filters section holding exactly
//!    one filter is replaced by that filter. The component tree is dropped
//!    afterwards.
//! 2. [`BuiltConfiguration::initialize`] builds the nodes bottom-up, in
//!    declaration order, and wires loggers to appenders.
//!
//! Any error aborts the attempt; appenders already built are stopped and
//! nothing partial is returned.

use super::component::Component;
use super::configuration::{Configuration, ConfigurationParts};
use super::logger_config::LoggerDefinition;
use super::node::Node;
use super::plugin::{BuildContext, PluginObject, PluginRegistry};
use crate::core::{Filter, Level, LoggerError, Result};
use crate::manager::{ManagerRegistry, DEFAULT_SHUTDOWN_TIMEOUT};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

const ROOT_ELEMENT: &str = "Configuration";

pub struct BuiltConfiguration {
    root_component: Option<Component>,
    root_node: Option<Node>,
    plugins: Arc<PluginRegistry>,
    attributes: BTreeMap<String, String>,
    name: Option<String>,
    shutdown_timeout: Duration,
    status: Option<Level>,
    packages: Vec<String>,
    monitor_interval: Option<Duration>,
    shutdown_hook: bool,
}

impl BuiltConfiguration {
    /// Reads the root attributes. Malformed values are reported and ignored.
    pub fn new(root: Component, plugins: Arc<PluginRegistry>) -> Self {
        let mut config = Self {
            root_component: None,
            root_node: None,
            plugins,
            attributes: BTreeMap::new(),
            name: None,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            status: None,
            packages: Vec::new(),
            monitor_interval: None,
            shutdown_hook: true,
        };

        for (key, value) in &root.attributes {
            let key = key.trim();
            config.attributes.insert(key.to_string(), value.clone());
            match key.to_ascii_lowercase().as_str() {
                "name" => config.name = Some(value.clone()),
                "status" => match value.parse::<Level>() {
                    Ok(level) => config.status = Some(level),
                    Err(e) => tracing::error!(value = %value, error = %e, "Invalid status level"),
                },
                "shutdowntimeout" => match value.trim().parse::<u64>() {
                    Ok(millis) => config.shutdown_timeout = Duration::from_millis(millis),
                    Err(e) => tracing::error!(value = %value, error = %e, "Invalid shutdown timeout"),
                },
                "monitorinterval" => match value.trim().parse::<u64>() {
                    Ok(secs) if secs > 0 => {
                        config.monitor_interval = Some(Duration::from_secs(secs));
                    }
                    Ok(_) => {}
                    Err(e) => tracing::error!(value = %value, error = %e, "Invalid monitor interval"),
                },
                "packages" => {
                    // Plugins are registered, not scanned; recorded only.
                    config.packages.extend(
                        value
                            .split(',')
                            .map(str::trim)
                            .filter(|p| !p.is_empty())
                            .map(str::to_string),
                    );
                }
                "shutdownhook" => config.shutdown_hook = !value.eq_ignore_ascii_case("disable"),
                _ => {}
            }
        }

        config.root_component = Some(root);
        config
    }

    /// The builder tree. `None` once [`setup`](Self::setup) has run.
    pub fn root_component(&self) -> Option<&Component> {
        self.root_component.as_ref()
    }

    /// The resolved tree. `None` until [`setup`](Self::setup) has run.
    pub fn root_node(&self) -> Option<&Node> {
        self.root_node.as_ref()
    }

    pub fn plugins(&self) -> &Arc<PluginRegistry> {
        &self.plugins
    }

    /// Root attributes as given, keys trimmed
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    pub fn status(&self) -> Option<Level> {
        self.status
    }

    pub fn packages(&self) -> &[String] {
        &self.packages
    }

    pub fn monitor_interval(&self) -> Option<Duration> {
        self.monitor_interval
    }

    pub fn is_shutdown_hook_enabled(&self) -> bool {
        self.shutdown_hook
    }

    fn convert_to_node(&self, parent: &str, component: &Component) -> Result<Node> {
        let plugin = self
            .plugins
            .resolve(&component.plugin_type)
            .ok_or_else(|| LoggerError::unknown_plugin(parent, &component.plugin_type))?;

        let mut node = Node::new(component.plugin_type.clone(), plugin);
        node.attributes_mut().extend(
            component
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        node.set_value(component.value.clone());
        for child in &component.components {
            node.add_child(self.convert_to_node(&component.plugin_type, child)?);
        }
        Ok(node)
    }

    /// Resolves the component tree into the node tree. Runs once; later
    /// calls are no-ops. On error the component tree is kept so the caller
    /// can inspect it.
    pub fn setup(&mut self) -> Result<()> {
        let Some(root) = self.root_component.as_ref() else {
            return Ok(());
        };

        let plugin = self
            .plugins
            .resolve(ROOT_ELEMENT)
            .ok_or_else(|| LoggerError::unknown_plugin(ROOT_ELEMENT, ROOT_ELEMENT))?;
        let mut root_node = Node::new(ROOT_ELEMENT, plugin);
        root_node
            .attributes_mut()
            .extend(self.attributes.iter().map(|(k, v)| (k.clone(), v.clone())));

        let non_empty = |c: &&Component| !c.components.is_empty();

        for section in ["Properties", "CustomLevels"] {
            if let Some(component) = root.child(section).filter(non_empty) {
                root_node.add_child(self.convert_to_node(ROOT_ELEMENT, component)?);
            }
        }

        for section in ["Loggers", "Appenders"] {
            let node = match root.child(section) {
                Some(component) => self.convert_to_node(ROOT_ELEMENT, component)?,
                None => self.convert_to_node(ROOT_ELEMENT, &Component::new(section))?,
            };
            root_node.add_child(node);
        }

        if let Some(filters) = root.child("Filters").filter(non_empty) {
            let node = match filters.components.as_slice() {
                [single] => self.convert_to_node(ROOT_ELEMENT, single)?,
                _ => self.convert_to_node(ROOT_ELEMENT, filters)?,
            };
            root_node.add_child(node);
        }

        let unknown: Vec<&str> = root
            .components
            .iter()
            .map(|c| c.plugin_type.as_str())
            .filter(|t| {
                !["Properties", "CustomLevels", "Loggers", "Appenders", "Filters"]
                    .iter()
                    .any(|s| s.eq_ignore_ascii_case(t))
            })
            .collect();
        if !unknown.is_empty() {
            tracing::warn!(sections = ?unknown, "Ignoring unrecognized configuration sections");
        }

        self.root_node = Some(root_node);
        self.root_component = None;
        Ok(())
    }

    /// Builds the runtime configuration, running [`setup`](Self::setup)
    /// first if needed.
    ///
    /// The node tree is kept, so a configuration can be initialized again
    /// (e.g. with a different manager registry).
    pub fn initialize(&mut self, managers: &ManagerRegistry) -> Result<Configuration> {
        self.setup()?;
        let Some(root) = self.root_node.as_ref() else {
            return Err(LoggerError::config(ROOT_ELEMENT, "configuration has no root node"));
        };

        let mut ctx = BuildContext::new(managers.clone());
        let mut filter: Option<Arc<dyn Filter>> = None;
        let mut loggers: Vec<LoggerDefinition> = Vec::new();
        let mut custom_levels: Vec<Level> = Vec::new();

        for section in root.children() {
            let built = match build_node(section, &mut ctx) {
                Ok(built) => built,
                Err(e) => {
                    ctx.abandon(self.shutdown_timeout);
                    return Err(e);
                }
            };
            match built {
                PluginObject::Filter(f) => filter = Some(f),
                PluginObject::List(items) => {
                    for item in items {
                        match item {
                            PluginObject::Logger(definition) => loggers.push(definition),
                            PluginObject::CustomLevel(level) => custom_levels.push(level),
                            // Appenders and properties are already in the context.
                            _ => {}
                        }
                    }
                }
                other => {
                    tracing::warn!(
                        element = section.name(),
                        kind = other.kind(),
                        "Unexpected top-level element ignored"
                    );
                }
            }
        }

        let (properties, appenders) = ctx.into_parts();
        let name = self
            .name
            .clone()
            .unwrap_or_else(|| format!("BuiltConfiguration@{:p}", self));

        let configuration = Configuration::assemble(ConfigurationParts {
            name,
            filter,
            appenders,
            loggers,
            properties,
            custom_levels,
            shutdown_timeout: self.shutdown_timeout,
        });
        tracing::debug!(configuration = configuration.name(), "Configuration initialized");
        Ok(configuration)
    }
}

/// Builds `node` after its children, depth first. Appenders become visible
/// to the context as soon as they are built.
fn build_node(node: &Node, ctx: &mut BuildContext) -> Result<PluginObject> {
    let mut children = Vec::with_capacity(node.children().len());
    for child in node.children() {
        children.push(build_node(child, ctx)?);
    }

    let built = node.plugin().build(node, children, ctx)?;
    if let PluginObject::Appender(ref appender) = built {
        if !ctx.register_appender(Arc::clone(appender)) {
            appender.stop(Duration::ZERO);
        }
    }
    Ok(built)
}

impl std::fmt::Debug for BuiltConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltConfiguration")
            .field("name", &self.name)
            .field("set_up", &self.root_node.is_some())
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("status", &self.status)
            .finish()
    }
}
