//! Logger context: the registry of loggers plus the configuration they
//! route through.

use super::{
    error::Result,
    logger::Logger,
    logger_registry::LoggerRegistry,
    message::{MessageFactory, ParameterizedMessageFactory},
};
use crate::config::{BuiltConfiguration, Component, Configuration, PluginRegistry};
use crate::manager::{ManagerRegistry, DEFAULT_SHUTDOWN_TIMEOUT};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Configuration slot shared between a context and its loggers
pub(crate) struct ContextShared {
    configuration: RwLock<Arc<Configuration>>,
}

impl ContextShared {
    pub(crate) fn configuration(&self) -> Arc<Configuration> {
        Arc::clone(&self.configuration.read())
    }
}

/// Owns the loggers, the active configuration and the managers
/// configurations acquire.
///
/// # Example
///
/// ```
/// use rust_logging_core::config::ConfigurationBuilder;
/// use rust_logging_core::{Level, LoggerContext};
///
/// let context = LoggerContext::new("app");
/// let builder = ConfigurationBuilder::new();
/// let stdout = builder.new_appender("Stdout", "Console");
/// let root = builder
///     .new_root_logger(Level::INFO)
///     .add_component(builder.new_appender_ref("Stdout"));
/// let component = builder
///     .add_appender(stdout)
///     .add_root_logger(root)
///     .build_component();
/// context.reconfigure(component).unwrap();
///
/// let logger = context.get_logger("app.http");
/// logger.info("listening");
/// context.stop(std::time::Duration::from_secs(1));
/// ```
pub struct LoggerContext {
    name: String,
    registry: LoggerRegistry<Logger>,
    shared: Arc<ContextShared>,
    managers: ManagerRegistry,
    plugins: Arc<PluginRegistry>,
}

impl LoggerContext {
    /// A context running the default configuration: errors to the console.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_plugins(name, Arc::new(PluginRegistry::with_core_plugins()))
    }

    /// Like [`new`](Self::new) with a caller-supplied plugin catalog
    pub fn with_plugins(name: impl Into<String>, plugins: Arc<PluginRegistry>) -> Self {
        Self {
            name: name.into(),
            registry: LoggerRegistry::new(Arc::new(ParameterizedMessageFactory)),
            shared: Arc::new(ContextShared {
                configuration: RwLock::new(Arc::new(Configuration::default_configuration())),
            }),
            managers: ManagerRegistry::new(),
            plugins,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the logger for `name` with the default message factory.
    pub fn get_logger(&self, name: &str) -> Arc<Logger> {
        self.logger_for(name, None)
    }

    pub fn get_logger_with_factory(&self, name: &str, factory: &Arc<dyn MessageFactory>) -> Arc<Logger> {
        self.logger_for(name, Some(factory))
    }

    fn logger_for(&self, name: &str, factory: Option<&Arc<dyn MessageFactory>>) -> Arc<Logger> {
        self.registry.compute_if_absent(name, factory, |name, factory| {
            Arc::new(Logger::new(name, Arc::clone(factory), Arc::clone(&self.shared)))
        })
    }

    pub fn has_logger(&self, name: &str) -> bool {
        self.registry.has_logger(name, None)
    }

    pub fn has_logger_with_factory(&self, name: &str, factory: &Arc<dyn MessageFactory>) -> bool {
        self.registry.has_logger(name, Some(factory))
    }

    /// Live loggers
    pub fn loggers(&self) -> Vec<Arc<Logger>> {
        self.registry.get_loggers()
    }

    pub fn registry(&self) -> &LoggerRegistry<Logger> {
        &self.registry
    }

    pub fn configuration(&self) -> Arc<Configuration> {
        self.shared.configuration()
    }

    pub fn managers(&self) -> &ManagerRegistry {
        &self.managers
    }

    pub fn plugins(&self) -> &Arc<PluginRegistry> {
        &self.plugins
    }

    /// Builds `component` with this context's plugins and managers and
    /// installs it. On failure the running configuration stays in place.
    pub fn reconfigure(&self, component: Component) -> Result<()> {
        let mut built = BuiltConfiguration::new(component, Arc::clone(&self.plugins));
        self.start(&mut built)
    }

    /// Initializes an already built configuration and installs it.
    pub fn start(&self, built: &mut BuiltConfiguration) -> Result<()> {
        let configuration = built.initialize(&self.managers)?;
        self.set_configuration(configuration);
        Ok(())
    }

    /// Installs `configuration` and stops the one it replaces.
    ///
    /// The new configuration acquires its managers before the old one
    /// releases them, so shared connections survive the switch.
    pub fn set_configuration(&self, configuration: Configuration) -> Arc<Configuration> {
        let configuration = Arc::new(configuration);
        let previous = std::mem::replace(
            &mut *self.shared.configuration.write(),
            Arc::clone(&configuration),
        );
        tracing::debug!(
            context = %self.name,
            previous = previous.name(),
            current = configuration.name(),
            "Configuration replaced"
        );
        if !previous.stop(previous.shutdown_timeout()) {
            tracing::warn!(
                configuration = previous.name(),
                "Previous configuration did not stop cleanly"
            );
        }
        previous
    }

    /// Stops the active configuration. Loggers stay usable but deliver
    /// nothing until a new configuration is installed.
    pub fn stop(&self, timeout: Duration) -> bool {
        self.configuration().stop(timeout)
    }

    pub fn is_stopped(&self) -> bool {
        self.configuration().is_stopped()
    }
}

impl Drop for LoggerContext {
    fn drop(&mut self) {
        if !self.stop(DEFAULT_SHUTDOWN_TIMEOUT) {
            tracing::warn!(context = %self.name, "Logger context did not stop within timeout");
        }
    }
}

impl fmt::Debug for LoggerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerContext")
            .field("name", &self.name)
            .field("loggers", &self.registry.len())
            .field("configuration", &self.configuration().name())
            .field("managers", &self.managers.manager_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigurationBuilder;
    use crate::core::Level;

    #[test]
    fn test_weak_loggers_are_rebuilt() {
        let context = LoggerContext::new("test");
        let first = context.get_logger("a.b");
        assert!(context.has_logger("a.b"));
        assert!(Arc::ptr_eq(&first, &context.get_logger("a.b")));

        drop(first);
        assert!(!context.has_logger("a.b"));
        assert_eq!(context.registry().purge(), 1);
        assert!(context.loggers().is_empty());
    }

    #[test]
    fn test_failed_reconfigure_keeps_running_configuration() {
        let context = LoggerContext::new("test");
        let before = context.configuration();

        let builder = ConfigurationBuilder::new();
        let kafka = builder.new_appender("X", "Kafka");
        let component = builder.add_appender(kafka).build_component();
        assert!(context.reconfigure(component).is_err());

        assert!(Arc::ptr_eq(&before, &context.configuration()));
        assert!(!context.is_stopped());
    }

    #[test]
    fn test_set_configuration_stops_previous() {
        let context = LoggerContext::new("test");
        let builder = ConfigurationBuilder::new().name("second");
        let root = builder.new_root_logger(Level::INFO);
        let mut built = builder
            .add_root_logger(root)
            .build(Arc::clone(context.plugins()));

        let previous = context.configuration();
        context.start(&mut built).unwrap();

        assert!(previous.is_stopped());
        assert_eq!(context.configuration().name(), "second");
        assert!(context.stop(Duration::from_secs(1)));
        assert!(context.is_stopped());
    }
}
