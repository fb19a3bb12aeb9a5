//! Layouts serialize events into the bytes an appender writes.

use super::{error::Result, event::LogEvent};

pub trait Layout: Send + Sync {
    fn encode(&self, event: &LogEvent) -> Result<Vec<u8>>;

    fn content_type(&self) -> &str {
        "text/plain"
    }

    fn header(&self) -> Option<Vec<u8>> {
        None
    }

    fn footer(&self) -> Option<Vec<u8>> {
        None
    }

    fn name(&self) -> &str;
}

/// `[timestamp] [LEVEL] [thread] logger - message`, one line per event
#[derive(Debug, Clone)]
pub struct TextLayout {
    timestamp_format: String,
}

impl TextLayout {
    pub const DEFAULT_TIMESTAMP_FORMAT: &'static str = "%Y-%m-%d %H:%M:%S%.3f";

    pub fn new() -> Self {
        Self {
            timestamp_format: Self::DEFAULT_TIMESTAMP_FORMAT.to_string(),
        }
    }

    /// Use a strftime-compatible timestamp format
    #[must_use]
    pub fn with_timestamp_format(mut self, format: impl Into<String>) -> Self {
        self.timestamp_format = format.into();
        self
    }

    pub fn format(&self, event: &LogEvent) -> String {
        let mut line = format!(
            "[{}] [{:5}] [{}] {} - {}",
            event.timestamp.format(&self.timestamp_format),
            event.level.name(),
            event.thread(),
            event.logger_name,
            event.message
        );
        if let Some(ref location) = event.location {
            line.push_str(&format!(" ({}:{})", location.file, location.line));
        }
        line
    }
}

impl Default for TextLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl Layout for TextLayout {
    fn encode(&self, event: &LogEvent) -> Result<Vec<u8>> {
        let mut line = self.format(event);
        line.push('\n');
        Ok(line.into_bytes())
    }

    fn name(&self) -> &str {
        "TextLayout"
    }
}

/// One JSON object per line (JSONL)
#[derive(Debug, Clone, Default)]
pub struct JsonLayout {
    pretty: bool,
}

impl JsonLayout {
    pub fn new() -> Self {
        Self { pretty: false }
    }

    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl Layout for JsonLayout {
    fn encode(&self, event: &LogEvent) -> Result<Vec<u8>> {
        let mut bytes = if self.pretty {
            serde_json::to_vec_pretty(event)?
        } else {
            serde_json::to_vec(event)?
        };
        bytes.push(b'\n');
        Ok(bytes)
    }

    fn content_type(&self) -> &str {
        "application/json"
    }

    fn name(&self) -> &str {
        "JsonLayout"
    }
}
