//! Logger handles
//!
//! A [`Logger`] is a named, cheap-to-share front end. It owns no appenders:
//! every call routes through the configuration currently installed in its
//! [`LoggerContext`](super::context::LoggerContext), so reconfiguring the
//! context retargets existing loggers without touching them.

use super::{
    context::ContextShared,
    event::LogEvent,
    level::Level,
    logger_registry::RegisteredLogger,
    message::MessageFactory,
};
use crate::config::{Configuration, LoggerConfig};
use parking_lot::RwLock;
use std::fmt::{self, Display};
use std::sync::Arc;

pub struct Logger {
    name: String,
    factory: Arc<dyn MessageFactory>,
    shared: Arc<ContextShared>,
    /// Routing resolved against the configuration it was computed for
    resolved: RwLock<Option<(Arc<Configuration>, Arc<LoggerConfig>)>>,
}

impl Logger {
    pub(crate) fn new(
        name: impl Into<String>,
        factory: Arc<dyn MessageFactory>,
        shared: Arc<ContextShared>,
    ) -> Self {
        Self {
            name: name.into(),
            factory,
            shared,
            resolved: RwLock::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn message_factory(&self) -> &Arc<dyn MessageFactory> {
        &self.factory
    }

    fn resolve(&self) -> (Arc<Configuration>, Arc<LoggerConfig>) {
        let current = self.shared.configuration();
        if let Some((ref config, ref logger)) = *self.resolved.read() {
            if Arc::ptr_eq(config, &current) {
                return (current, Arc::clone(logger));
            }
        }

        let logger = current.logger_config(&self.name);
        *self.resolved.write() = Some((Arc::clone(&current), Arc::clone(&logger)));
        (current, logger)
    }

    /// The routing this logger currently uses
    pub fn logger_config(&self) -> Arc<LoggerConfig> {
        self.resolve().1
    }

    /// Effective level: the level of the closest configured ancestor.
    pub fn level(&self) -> Level {
        self.resolve().1.level()
    }

    pub fn is_enabled(&self, level: Level) -> bool {
        self.resolve().1.is_enabled(level)
    }

    pub fn log(&self, level: Level, message: impl AsRef<str>) {
        let (config, logger) = self.resolve();
        if !logger.is_enabled(level) {
            return;
        }
        let event = LogEvent::new(self.name.as_str(), level, message);
        self.deliver(config, logger, &event);
    }

    /// Formats through this logger's message factory. Parameters are only
    /// rendered when the level is enabled.
    pub fn log_params(&self, level: Level, format: &str, params: &[&dyn Display]) {
        let (config, logger) = self.resolve();
        if !logger.is_enabled(level) {
            return;
        }
        let message = self.factory.new_message(format, params);
        let event = LogEvent::new(self.name.as_str(), level, message);
        self.deliver(config, logger, &event);
    }

    /// Routes a prepared event, e.g. one carrying a source location. The
    /// event's level is still checked against this logger's.
    pub fn log_event(&self, event: LogEvent) {
        let (config, logger) = self.resolve();
        if logger.is_enabled(event.level) {
            self.deliver(config, logger, &event);
        }
    }

    /// An event that reaches a configuration stopped by a concurrent
    /// reconfigure goes to the replacement instead.
    fn deliver(
        &self,
        mut config: Arc<Configuration>,
        mut logger: Arc<LoggerConfig>,
        event: &LogEvent,
    ) {
        while !config.log(&logger, event) {
            let (current, resolved) = self.resolve();
            if Arc::ptr_eq(&current, &config) {
                // Stopped with nothing installed in its place
                return;
            }
            if !resolved.is_enabled(event.level) {
                return;
            }
            config = current;
            logger = resolved;
        }
    }

    #[inline]
    pub fn trace(&self, message: impl AsRef<str>) {
        self.log(Level::TRACE, message);
    }

    #[inline]
    pub fn debug(&self, message: impl AsRef<str>) {
        self.log(Level::DEBUG, message);
    }

    #[inline]
    pub fn info(&self, message: impl AsRef<str>) {
        self.log(Level::INFO, message);
    }

    #[inline]
    pub fn warn(&self, message: impl AsRef<str>) {
        self.log(Level::WARN, message);
    }

    #[inline]
    pub fn error(&self, message: impl AsRef<str>) {
        self.log(Level::ERROR, message);
    }

    #[inline]
    pub fn fatal(&self, message: impl AsRef<str>) {
        self.log(Level::FATAL, message);
    }
}

impl RegisteredLogger for Logger {
    fn name(&self) -> &str {
        &self.name
    }

    fn message_factory(&self) -> &Arc<dyn MessageFactory> {
        &self.factory
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("message_factory", &self.factory.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigurationBuilder;
    use crate::core::context::LoggerContext;
    use crate::core::message::SimpleMessageFactory;

    #[test]
    fn test_default_configuration_routing() {
        let context = LoggerContext::new("test");
        let logger = context.get_logger("app.db");

        assert_eq!(logger.level(), Level::ERROR);
        assert!(logger.is_enabled(Level::FATAL));
        assert!(!logger.is_enabled(Level::WARN));
        assert!(logger.logger_config().is_root());
    }

    #[test]
    fn test_level_follows_reconfiguration() {
        let context = LoggerContext::new("test");
        let logger = context.get_logger("app.db");
        assert!(!logger.is_enabled(Level::DEBUG));

        let builder = ConfigurationBuilder::new();
        let app = builder.new_logger("app", Level::DEBUG);
        let component = builder.add_logger(app).build_component();
        context.reconfigure(component).unwrap();

        assert!(logger.is_enabled(Level::DEBUG));
        assert_eq!(logger.logger_config().name(), "app");
    }

    #[test]
    fn test_factory_is_part_of_identity() {
        let context = LoggerContext::new("test");
        let simple: Arc<dyn MessageFactory> = Arc::new(SimpleMessageFactory);

        let plain = context.get_logger("svc");
        let custom = context.get_logger_with_factory("svc", &simple);
        assert!(!Arc::ptr_eq(&plain, &custom));
        assert_eq!(custom.message_factory().name(), "SimpleMessageFactory");
        assert!(Arc::ptr_eq(&custom, &context.get_logger_with_factory("svc", &simple)));
    }
}
