//! Log event structure

use super::level::Level;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;

// Thread-local caches for thread information to avoid repeated allocations
thread_local! {
    static THREAD_ID_CACHE: RefCell<Option<String>> = const { RefCell::new(None) };
    static THREAD_NAME_CACHE: RefCell<Option<Option<String>>> = const { RefCell::new(None) };
}

fn current_thread_id() -> String {
    THREAD_ID_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .get_or_insert_with(|| format!("{:?}", std::thread::current().id()))
            .clone()
    })
}

fn current_thread_name() -> Option<String> {
    THREAD_NAME_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .get_or_insert_with(|| std::thread::current().name().map(String::from))
            .clone()
    })
}

/// Source location captured by the logging macros
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: u32,
    pub module_path: String,
}

/// A single log event, immutable once handed to the appenders
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub level: Level,
    pub logger_name: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub thread_id: String,
    pub thread_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl LogEvent {
    /// Sanitize log message to prevent log injection attacks
    ///
    /// Replaces newlines, carriage returns, and tabs with escape sequences
    /// so one event always renders as one line.
    fn sanitize_message(message: &str) -> String {
        message
            .replace('\n', "\\n")
            .replace('\r', "\\r")
            .replace('\t', "\\t")
    }

    pub fn new(logger_name: impl Into<String>, level: Level, message: impl AsRef<str>) -> Self {
        Self {
            level,
            logger_name: logger_name.into(),
            message: Self::sanitize_message(message.as_ref()),
            timestamp: Utc::now(),
            thread_id: current_thread_id(),
            thread_name: current_thread_name(),
            location: None,
        }
    }

    pub fn with_location(mut self, file: &str, line: u32, module_path: &str) -> Self {
        self.location = Some(Location {
            file: file.to_string(),
            line,
            module_path: module_path.to_string(),
        });
        self
    }

    /// Thread name when the producing thread had one, its id otherwise
    pub fn thread(&self) -> &str {
        self.thread_name.as_deref().unwrap_or(&self.thread_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_is_sanitized() {
        let event = LogEvent::new("app", Level::INFO, "line one\nline two\ttab");
        assert_eq!(event.message, "line one\\nline two\\ttab");
        assert_eq!(event.logger_name, "app");
    }

    #[test]
    fn test_thread_falls_back_to_id() {
        let handle = std::thread::spawn(|| LogEvent::new("app", Level::DEBUG, "x"));
        let event = handle.join().unwrap();
        assert!(event.thread_name.is_none());
        assert_eq!(event.thread(), event.thread_id);
    }

    #[test]
    fn test_location() {
        let event = LogEvent::new("app", Level::WARN, "x").with_location("main.rs", 7, "app::main");
        let location = event.location.unwrap();
        assert_eq!(location.line, 7);
        assert_eq!(location.module_path, "app::main");
    }
}
