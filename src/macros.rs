//! Logging macros for ergonomic log message formatting.
//!
//! The macros check the level before formatting, so disabled statements
//! cost one level comparison, and they record the call site.
//!
//! # Examples
//!
//! ```
//! use rust_logging_core::{info, LoggerContext};
//!
//! let context = LoggerContext::new("doc");
//! let logger = context.get_logger("server");
//!
//! // Basic logging
//! info!(logger, "Server started");
//!
//! // With format arguments
//! let port = 8080;
//! info!(logger, "Server listening on port {}", port);
//! ```

/// Log a message at any level.
///
/// # Examples
///
/// ```
/// # use rust_logging_core::{Level, LoggerContext};
/// # let context = LoggerContext::new("doc");
/// # let logger = context.get_logger("app");
/// use rust_logging_core::log;
/// log!(logger, Level::INFO, "Simple message");
/// log!(logger, Level::ERROR, "Error code: {}", 500);
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $($arg:tt)+) => {{
        let logger = &$logger;
        let level: $crate::Level = $level;
        if logger.is_enabled(level) {
            logger.log_event(
                $crate::LogEvent::new(logger.name(), level, format!($($arg)+))
                    .with_location(file!(), line!(), module_path!()),
            );
        }
    }};
}

/// Log a trace-level message.
#[macro_export]
macro_rules! trace {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::Level::TRACE, $($arg)+)
    };
}

/// Log a debug-level message.
///
/// # Examples
///
/// ```
/// # use rust_logging_core::LoggerContext;
/// # let context = LoggerContext::new("doc");
/// # let logger = context.get_logger("app");
/// use rust_logging_core::debug;
/// debug!(logger, "Counter value: {}", 10);
/// ```
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::Level::DEBUG, $($arg)+)
    };
}

/// Log an info-level message.
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::Level::INFO, $($arg)+)
    };
}

/// Log a warning-level message.
#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::Level::WARN, $($arg)+)
    };
}

/// Log an error-level message.
///
/// # Examples
///
/// ```
/// # use rust_logging_core::LoggerContext;
/// # let context = LoggerContext::new("doc");
/// # let logger = context.get_logger("app");
/// use rust_logging_core::error;
/// error!(logger, "Error code: {}, message: {}", 500, "Internal error");
/// ```
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::Level::ERROR, $($arg)+)
    };
}

/// Log a fatal-level message.
#[macro_export]
macro_rules! fatal {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::Level::FATAL, $($arg)+)
    };
}

#[cfg(test)]
mod tests {
    use crate::config::configuration::ConfigurationParts;
    use crate::config::{Configuration, LoggerDefinition};
    use crate::core::{Appender, Level, LogEvent, LoggerContext, Result};
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::fmt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<LogEvent>>,
    }

    impl Appender for Recorder {
        fn append(&self, event: &LogEvent) -> Result<()> {
            self.events.lock().push(event.clone());
            Ok(())
        }

        fn name(&self) -> &str {
            "recorder"
        }
    }

    fn context_with(level: Level) -> (LoggerContext, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let mut root = LoggerDefinition::root(Some(level));
        root.appender_refs
            .push(crate::config::AppenderRef::new("recorder", None));
        let configuration = Configuration::assemble(ConfigurationParts {
            name: "macros".to_string(),
            filter: None,
            appenders: vec![recorder.clone() as Arc<dyn Appender>],
            loggers: vec![root],
            properties: HashMap::new(),
            custom_levels: Vec::new(),
            shutdown_timeout: Duration::from_secs(1),
        });
        let context = LoggerContext::new("macros");
        context.set_configuration(configuration);
        (context, recorder)
    }

    #[test]
    fn test_macros_record_call_site() {
        let (context, recorder) = context_with(Level::TRACE);
        let logger = context.get_logger("app");

        trace!(logger, "t");
        debug!(logger, "d {}", 1);
        info!(logger, "i {}", 2);
        warn!(logger, "w");
        error!(logger, "e");
        fatal!(logger, "f");
        log!(logger, Level::INFO, "Formatted: {}", 42);

        let events = recorder.events.lock();
        assert_eq!(events.len(), 7);
        assert_eq!(events[1].message, "d 1");
        assert_eq!(events[6].message, "Formatted: 42");
        let location = events[0].location.as_ref().unwrap();
        assert!(location.file.ends_with("macros.rs"));
        assert!(location.module_path.ends_with("macros::tests"));
    }

    #[test]
    fn test_disabled_level_skips_formatting() {
        struct Counting<'a>(&'a AtomicUsize);

        impl fmt::Display for Counting<'_> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fetch_add(1, Ordering::SeqCst);
                f.write_str("x")
            }
        }

        let (context, recorder) = context_with(Level::WARN);
        let logger = context.get_logger("app");
        let formatted = AtomicUsize::new(0);

        debug!(logger, "{}", Counting(&formatted));
        assert_eq!(formatted.load(Ordering::SeqCst), 0);

        warn!(logger, "{}", Counting(&formatted));
        assert_eq!(formatted.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.events.lock().len(), 1);
    }
}
