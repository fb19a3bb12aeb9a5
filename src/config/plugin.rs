//! Plugin catalog and the context plugins are built in.
//!
//! Plugins are registered explicitly: each [`PluginDescriptor`] pairs a
//! configuration element name with a builder closure. Lookups are
//! case-insensitive, matching how element names are written in
//! configurations.

use super::logger_config::{AppenderRef, LoggerDefinition};
use super::node::Node;
use crate::core::{Appender, Filter, Layout, Level, LoggerError, Result};
use crate::manager::ManagerRegistry;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginCategory {
    /// Structural elements: sections, loggers, properties
    Core,
    Appender,
    Filter,
    Layout,
}

/// What a plugin produced for one node
pub enum PluginObject {
    Appender(Arc<dyn Appender>),
    AppenderRef(AppenderRef),
    Filter(Arc<dyn Filter>),
    Layout(Arc<dyn Layout>),
    Logger(LoggerDefinition),
    Property(String, String),
    CustomLevel(Level),
    /// Container sections
    List(Vec<PluginObject>),
}

impl PluginObject {
    pub fn kind(&self) -> &'static str {
        match self {
            PluginObject::Appender(_) => "appender",
            PluginObject::AppenderRef(_) => "appender reference",
            PluginObject::Filter(_) => "filter",
            PluginObject::Layout(_) => "layout",
            PluginObject::Logger(_) => "logger",
            PluginObject::Property(..) => "property",
            PluginObject::CustomLevel(_) => "custom level",
            PluginObject::List(_) => "list",
        }
    }
}

impl fmt::Debug for PluginObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginObject::Appender(a) => f.debug_tuple("Appender").field(&a.name()).finish(),
            PluginObject::AppenderRef(r) => f.debug_tuple("AppenderRef").field(r).finish(),
            PluginObject::Filter(x) => f.debug_tuple("Filter").field(&x.name()).finish(),
            PluginObject::Layout(l) => f.debug_tuple("Layout").field(&l.name()).finish(),
            PluginObject::Logger(d) => f.debug_tuple("Logger").field(&d.name).finish(),
            PluginObject::Property(k, v) => f.debug_tuple("Property").field(k).field(v).finish(),
            PluginObject::CustomLevel(l) => f.debug_tuple("CustomLevel").field(l).finish(),
            PluginObject::List(items) => f.debug_tuple("List").field(items).finish(),
        }
    }
}

/// Builds the runtime object for a node from its already-built children.
pub type PluginBuilder =
    dyn Fn(&Node, Vec<PluginObject>, &mut BuildContext) -> Result<PluginObject> + Send + Sync;

pub struct PluginDescriptor {
    name: String,
    category: PluginCategory,
    builder: Box<PluginBuilder>,
}

impl PluginDescriptor {
    pub fn new<F>(name: impl Into<String>, category: PluginCategory, builder: F) -> Self
    where
        F: Fn(&Node, Vec<PluginObject>, &mut BuildContext) -> Result<PluginObject>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            category,
            builder: Box::new(builder),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> PluginCategory {
        self.category
    }

    pub fn build(
        &self,
        node: &Node,
        children: Vec<PluginObject>,
        ctx: &mut BuildContext,
    ) -> Result<PluginObject> {
        (self.builder)(node, children, ctx)
    }
}

impl fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("name", &self.name)
            .field("category", &self.category)
            .finish()
    }
}

/// Registration table mapping element names to plugins.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: RwLock<HashMap<String, Arc<PluginDescriptor>>>,
}

impl PluginRegistry {
    /// An empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog holding every plugin this crate ships
    pub fn with_core_plugins() -> Self {
        let registry = Self::new();
        super::plugins::register_core_plugins(&registry);
        registry
    }

    /// Adds or replaces a plugin. Returns the descriptor it replaced.
    pub fn register(&self, descriptor: PluginDescriptor) -> Option<Arc<PluginDescriptor>> {
        let key = descriptor.name.to_ascii_lowercase();
        self.plugins.write().insert(key, Arc::new(descriptor))
    }

    pub fn register_fn<F>(&self, name: &str, category: PluginCategory, builder: F)
    where
        F: Fn(&Node, Vec<PluginObject>, &mut BuildContext) -> Result<PluginObject>
            + Send
            + Sync
            + 'static,
    {
        self.register(PluginDescriptor::new(name, category, builder));
    }

    pub fn resolve(&self, plugin_type: &str) -> Option<Arc<PluginDescriptor>> {
        self.plugins
            .read()
            .get(&plugin_type.to_ascii_lowercase())
            .cloned()
    }

    pub fn contains(&self, plugin_type: &str) -> bool {
        self.resolve(plugin_type).is_some()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .plugins
            .read()
            .values()
            .map(|p| p.name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.plugins.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.read().is_empty()
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.names())
            .finish()
    }
}

/// State threaded through one materialization pass.
pub struct BuildContext {
    properties: HashMap<String, String>,
    appenders: Vec<Arc<dyn Appender>>,
    managers: ManagerRegistry,
}

impl BuildContext {
    pub fn new(managers: ManagerRegistry) -> Self {
        Self {
            properties: HashMap::new(),
            appenders: Vec::new(),
            managers,
        }
    }

    pub fn managers(&self) -> &ManagerRegistry {
        &self.managers
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(name.into(), value.into());
    }

    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }

    /// Expands `${name}`, `${env:VAR}` and `${name:-default}` references.
    /// Unresolvable references are left as written.
    pub fn substitute(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                out.push_str(&rest[start..]);
                return out;
            };
            let key = &after[..end];
            match self.lookup(key) {
                Some(value) => out.push_str(&value),
                None => {
                    out.push_str("${");
                    out.push_str(key);
                    out.push('}');
                }
            }
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        out
    }

    fn lookup(&self, key: &str) -> Option<String> {
        let (key, default) = match key.split_once(":-") {
            Some((key, default)) => (key, Some(default)),
            None => (key, None),
        };
        let value = match key.strip_prefix("env:") {
            Some(var) => std::env::var(var).ok(),
            None => self.properties.get(key).cloned(),
        };
        value.or_else(|| default.map(str::to_string))
    }

    /// Attribute value with references expanded
    pub fn attr(&self, node: &Node, key: &str) -> Option<String> {
        node.attribute(key).map(|value| self.substitute(value))
    }

    pub fn required_attr(&self, node: &Node, key: &str) -> Result<String> {
        self.attr(node, key)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| {
                LoggerError::config(
                    node.name(),
                    format!("missing required attribute '{}'", key),
                )
            })
    }

    pub fn parse_attr<T>(&self, node: &Node, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.attr(node, key) {
            None => Ok(None),
            Some(raw) => raw.trim().parse().map(Some).map_err(|e| {
                LoggerError::config(
                    node.name(),
                    format!("invalid value '{}' for attribute '{}': {}", raw, key, e),
                )
            }),
        }
    }

    pub fn bool_attr(&self, node: &Node, key: &str, default: bool) -> Result<bool> {
        Ok(self.parse_attr(node, key)?.unwrap_or(default))
    }

    pub fn level_attr(&self, node: &Node, key: &str) -> Result<Option<Level>> {
        self.parse_attr(node, key)
    }

    pub fn millis_attr(&self, node: &Node, key: &str) -> Result<Option<Duration>> {
        Ok(self.parse_attr::<u64>(node, key)?.map(Duration::from_millis))
    }

    /// Makes a built appender visible to later siblings and to logger
    /// wiring. The first appender registered under a name wins.
    pub fn register_appender(&mut self, appender: Arc<dyn Appender>) -> bool {
        if self.appender(appender.name()).is_some() {
            tracing::warn!(
                appender = appender.name(),
                "Duplicate appender name, keeping the first definition"
            );
            return false;
        }
        self.appenders.push(appender);
        true
    }

    pub fn appender(&self, name: &str) -> Option<Arc<dyn Appender>> {
        self.appenders.iter().find(|a| a.name() == name).cloned()
    }

    pub fn appenders(&self) -> &[Arc<dyn Appender>] {
        &self.appenders
    }

    pub(crate) fn into_parts(self) -> (HashMap<String, String>, Vec<Arc<dyn Appender>>) {
        (self.properties, self.appenders)
    }

    /// Stops everything built so far after a failed pass.
    pub(crate) fn abandon(self, timeout: Duration) {
        for appender in self.appenders.iter().rev() {
            appender.stop(timeout);
        }
    }
}

impl fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildContext")
            .field("properties", &self.properties)
            .field(
                "appenders",
                &self.appenders.iter().map(|a| a.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
