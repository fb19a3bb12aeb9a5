//! The live configuration loggers route through.

use super::logger_config::{LoggerConfig, LoggerDefinition};
use crate::appenders::ConsoleAppender;
use crate::core::{Appender, AppenderControl, Filter, FilterResult, Level, LogEvent};
use crate::manager::DEFAULT_SHUTDOWN_TIMEOUT;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub const DEFAULT_CONFIGURATION_NAME: &str = "Default";

pub struct Configuration {
    name: String,
    filter: Option<Arc<dyn Filter>>,
    appenders: Vec<Arc<dyn Appender>>,
    loggers: HashMap<String, Arc<LoggerConfig>>,
    root: Arc<LoggerConfig>,
    properties: HashMap<String, String>,
    custom_levels: Vec<Level>,
    shutdown_timeout: Duration,
    stopped: AtomicBool,
    /// Calls to `log` that passed the stopped check and have not returned
    in_flight: AtomicUsize,
}

/// Everything materialization produces, ready to be wired.
pub(crate) struct ConfigurationParts {
    pub name: String,
    pub filter: Option<Arc<dyn Filter>>,
    pub appenders: Vec<Arc<dyn Appender>>,
    pub loggers: Vec<LoggerDefinition>,
    pub properties: HashMap<String, String>,
    pub custom_levels: Vec<Level>,
    pub shutdown_timeout: Duration,
}

/// Counts a `log` call for as long as it is alive
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn parent_name(name: &str) -> Option<&str> {
    name.rfind('.').map(|i| &name[..i])
}

impl Configuration {
    /// Root at ERROR writing to the console. Used until a configuration is
    /// installed.
    pub fn default_configuration() -> Self {
        let console: Arc<dyn Appender> = Arc::new(ConsoleAppender::new("DefaultConsole"));
        let root = LoggerConfig::root(
            Level::ERROR,
            vec![AppenderControl::new(Arc::clone(&console), None)],
        );
        Self {
            name: DEFAULT_CONFIGURATION_NAME.to_string(),
            filter: None,
            appenders: vec![console],
            loggers: HashMap::new(),
            root: Arc::new(root),
            properties: HashMap::new(),
            custom_levels: Vec::new(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            stopped: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Resolves appender references and parent links.
    ///
    /// Loggers are linked shallowest first, so every parent exists before
    /// its children. A logger without a level takes its parent's.
    pub(crate) fn assemble(parts: ConfigurationParts) -> Self {
        let ConfigurationParts {
            name,
            filter,
            appenders,
            loggers: definitions,
            properties,
            custom_levels,
            shutdown_timeout,
        } = parts;

        let controls_for = |definition: &LoggerDefinition| -> Vec<AppenderControl> {
            definition
                .appender_refs
                .iter()
                .filter_map(|r| {
                    let found = appenders.iter().find(|a| a.name() == r.reference);
                    if found.is_none() {
                        tracing::error!(
                            logger = %definition.name,
                            appender = %r.reference,
                            "Unable to locate appender for logger"
                        );
                    }
                    found.map(|a| AppenderControl::new(Arc::clone(a), r.level))
                })
                .collect()
        };

        let (roots, mut named): (Vec<_>, Vec<_>) =
            definitions.into_iter().partition(|d| d.root);

        let root = match roots.into_iter().next() {
            Some(definition) => LoggerConfig::new(
                LoggerConfig::ROOT_NAME,
                definition.level.unwrap_or(Level::ERROR),
                true,
                definition.filter.clone(),
                controls_for(&definition),
                None,
            ),
            None => {
                tracing::warn!(
                    configuration = %name,
                    "No Root logger was configured, using an ERROR root without appenders"
                );
                LoggerConfig::root(Level::ERROR, Vec::new())
            }
        };
        let root = Arc::new(root);

        named.sort_by_key(|d| d.name.matches('.').count());
        let mut loggers: HashMap<String, Arc<LoggerConfig>> = HashMap::new();
        for definition in named {
            if loggers.contains_key(&definition.name) {
                tracing::warn!(logger = %definition.name, "Duplicate logger definition ignored");
                continue;
            }
            let mut ancestor = parent_name(&definition.name);
            let parent = loop {
                match ancestor {
                    Some(candidate) => match loggers.get(candidate) {
                        Some(found) => break Arc::clone(found),
                        None => ancestor = parent_name(candidate),
                    },
                    None => break Arc::clone(&root),
                }
            };
            let config = LoggerConfig::new(
                definition.name.clone(),
                definition.level.unwrap_or_else(|| parent.level()),
                definition.additive,
                definition.filter.clone(),
                controls_for(&definition),
                Some(parent),
            );
            loggers.insert(definition.name, Arc::new(config));
        }

        Self {
            name,
            filter,
            appenders,
            loggers,
            root,
            properties,
            custom_levels,
            shutdown_timeout,
            stopped: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configuration-wide filter, consulted before any logger's
    pub fn filter(&self) -> Option<&Arc<dyn Filter>> {
        self.filter.as_ref()
    }

    pub fn appender(&self, name: &str) -> Option<&Arc<dyn Appender>> {
        self.appenders.iter().find(|a| a.name() == name)
    }

    pub fn appenders(&self) -> &[Arc<dyn Appender>] {
        &self.appenders
    }

    pub fn root_logger(&self) -> &Arc<LoggerConfig> {
        &self.root
    }

    /// Declared loggers, not including the root
    pub fn logger_configs(&self) -> &HashMap<String, Arc<LoggerConfig>> {
        &self.loggers
    }

    /// The closest declared ancestor of `name`, the root if none
    pub fn logger_config(&self, name: &str) -> Arc<LoggerConfig> {
        let mut candidate = Some(name);
        while let Some(current) = candidate {
            if let Some(config) = self.loggers.get(current) {
                return Arc::clone(config);
            }
            candidate = parent_name(current);
        }
        Arc::clone(&self.root)
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }

    pub fn custom_levels(&self) -> &[Level] {
        &self.custom_levels
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Routes an event through the configuration filter, then `logger`.
    ///
    /// Returns `false` without delivering when this configuration has been
    /// stopped; the caller should retry against its replacement.
    pub fn log(&self, logger: &LoggerConfig, event: &LogEvent) -> bool {
        let _call = InFlight::enter(&self.in_flight);
        if self.stopped.load(Ordering::SeqCst) {
            return false;
        }
        if self
            .filter
            .as_ref()
            .is_some_and(|f| f.filter(event) == FilterResult::Deny)
        {
            return true;
        }
        logger.log(event);
        true
    }

    /// Flushes every appender, reporting failures.
    pub fn flush(&self) {
        for appender in &self.appenders {
            if let Err(e) = appender.flush() {
                tracing::error!(appender = appender.name(), error = %e, "Flush failed");
            }
        }
    }

    /// Stops appenders in reverse declaration order so wrappers such as
    /// async appenders drain before their targets stop. Idempotent.
    pub fn stop(&self, timeout: Duration) -> bool {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return true;
        }
        let mut all_stopped = self.await_in_flight(timeout);
        for appender in self.appenders.iter().rev() {
            if !appender.stop(timeout) {
                tracing::warn!(appender = appender.name(), "Appender did not stop in time");
                all_stopped = false;
            }
        }
        tracing::debug!(configuration = %self.name, "Configuration stopped");
        all_stopped
    }

    /// Waits for `log` calls already past the stopped check to finish
    fn await_in_flight(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.in_flight.load(Ordering::SeqCst) > 0 {
            if Instant::now() >= deadline {
                tracing::warn!(
                    configuration = %self.name,
                    pending = self.in_flight.load(Ordering::SeqCst),
                    "Stopping configuration with events still in flight"
                );
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
        true
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("name", &self.name)
            .field(
                "appenders",
                &self.appenders.iter().map(|a| a.name()).collect::<Vec<_>>(),
            )
            .field("root", &self.root)
            .field("loggers", &self.loggers.keys().collect::<Vec<_>>())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
