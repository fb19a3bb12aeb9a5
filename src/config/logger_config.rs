//! Per-logger routing: level, filter, appenders and the parent link.

use crate::core::{AppenderControl, Filter, FilterResult, Level, LogEvent};
use std::fmt;
use std::sync::Arc;

/// Reference from a logger to an appender by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppenderRef {
    pub reference: String,
    pub level: Option<Level>,
}

impl AppenderRef {
    pub fn new(reference: impl Into<String>, level: Option<Level>) -> Self {
        Self {
            reference: reference.into(),
            level,
        }
    }
}

/// A logger as declared, before appender names are resolved.
#[derive(Clone)]
pub struct LoggerDefinition {
    /// Empty for the root logger
    pub name: String,
    pub level: Option<Level>,
    pub additive: bool,
    pub filter: Option<Arc<dyn Filter>>,
    pub appender_refs: Vec<AppenderRef>,
    pub root: bool,
}

impl LoggerDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            level: None,
            additive: true,
            filter: None,
            appender_refs: Vec::new(),
            root: false,
        }
    }

    pub fn root(level: Option<Level>) -> Self {
        Self {
            level,
            root: true,
            ..Self::new("")
        }
    }
}

impl fmt::Debug for LoggerDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerDefinition")
            .field("name", &self.name)
            .field("level", &self.level)
            .field("additive", &self.additive)
            .field("appender_refs", &self.appender_refs)
            .field("root", &self.root)
            .finish()
    }
}

/// Routing for one logger name in a live configuration.
pub struct LoggerConfig {
    name: String,
    level: Level,
    additive: bool,
    filter: Option<Arc<dyn Filter>>,
    appenders: Vec<AppenderControl>,
    parent: Option<Arc<LoggerConfig>>,
}

impl LoggerConfig {
    pub const ROOT_NAME: &'static str = "";

    pub fn new(
        name: impl Into<String>,
        level: Level,
        additive: bool,
        filter: Option<Arc<dyn Filter>>,
        appenders: Vec<AppenderControl>,
        parent: Option<Arc<LoggerConfig>>,
    ) -> Self {
        Self {
            name: name.into(),
            level,
            additive,
            filter,
            appenders,
            parent,
        }
    }

    pub fn root(level: Level, appenders: Vec<AppenderControl>) -> Self {
        Self::new(Self::ROOT_NAME, level, true, None, appenders, None)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn is_additive(&self) -> bool {
        self.additive
    }

    pub fn filter(&self) -> Option<&Arc<dyn Filter>> {
        self.filter.as_ref()
    }

    pub fn parent(&self) -> Option<&Arc<LoggerConfig>> {
        self.parent.as_ref()
    }

    pub fn appender_controls(&self) -> &[AppenderControl] {
        &self.appenders
    }

    /// Names of the appenders attached directly to this logger
    pub fn appender_names(&self) -> Vec<&str> {
        self.appenders.iter().map(|c| c.appender_name()).collect()
    }

    pub fn is_enabled(&self, level: Level) -> bool {
        level != Level::OFF && level.is_more_specific_than(self.level)
    }

    /// Delivers to this logger's appenders, then to the parent's if
    /// additive. Appender failures are reported and do not stop delivery.
    pub fn log(&self, event: &LogEvent) {
        let mut current = Some(self);
        while let Some(config) = current {
            if config
                .filter
                .as_ref()
                .is_some_and(|f| f.filter(event) == FilterResult::Deny)
            {
                return;
            }
            for control in &config.appenders {
                if let Err(e) = control.call(event) {
                    tracing::error!(
                        appender = control.appender_name(),
                        logger = %event.logger_name,
                        error = %e,
                        "Appender failed to handle event"
                    );
                }
            }
            current = if config.additive {
                config.parent.as_deref()
            } else {
                None
            };
        }
    }
}

impl fmt::Debug for LoggerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerConfig")
            .field("name", &self.name)
            .field("level", &self.level)
            .field("additive", &self.additive)
            .field("appenders", &self.appender_names())
            .field("parent", &self.parent.as_ref().map(|p| p.name()))
            .finish()
    }
}
