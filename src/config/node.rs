//! Resolved configuration tree

use super::plugin::PluginDescriptor;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A configuration element bound to the plugin that will build it.
#[derive(Clone)]
pub struct Node {
    name: String,
    plugin: Arc<PluginDescriptor>,
    attributes: BTreeMap<String, String>,
    value: Option<String>,
    children: Vec<Node>,
}

impl Node {
    pub fn new(name: impl Into<String>, plugin: Arc<PluginDescriptor>) -> Self {
        Self {
            name: name.into(),
            plugin,
            attributes: BTreeMap::new(),
            value: None,
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn plugin(&self) -> &Arc<PluginDescriptor> {
        &self.plugin
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut BTreeMap<String, String> {
        &mut self.attributes
    }

    /// Raw (unsubstituted) attribute, matched case-insensitively
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn set_value(&mut self, value: Option<String>) {
        self.value = value;
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn add_child(&mut self, child: Node) {
        self.children.push(child);
    }

    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("plugin", &self.plugin.name())
            .field("attributes", &self.attributes)
            .field("value", &self.value)
            .field("children", &self.children)
            .finish()
    }
}
