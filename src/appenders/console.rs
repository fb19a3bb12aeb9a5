//! Console appender implementation

use crate::core::{Appender, AppenderBase, Filter, Layout, LogEvent, LoggerError, Result, TextLayout};
#[cfg(feature = "console")]
use colored::Colorize;
use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsoleTarget {
    #[default]
    SystemOut,
    SystemErr,
}

impl FromStr for ConsoleTarget {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SYSTEM_OUT" | "STDOUT" => Ok(ConsoleTarget::SystemOut),
            "SYSTEM_ERR" | "STDERR" => Ok(ConsoleTarget::SystemErr),
            _ => Err(format!("Invalid console target: '{}'", s)),
        }
    }
}

pub struct ConsoleAppender {
    base: AppenderBase,
    target: ConsoleTarget,
    layout: Option<Arc<dyn Layout>>,
    text: TextLayout,
    use_colors: bool,
}

impl ConsoleAppender {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: AppenderBase::new(name, None),
            target: ConsoleTarget::default(),
            layout: None,
            text: TextLayout::new(),
            use_colors: cfg!(feature = "console"),
        }
    }

    #[must_use]
    pub fn with_target(mut self, target: ConsoleTarget) -> Self {
        self.target = target;
        self
    }

    /// Replaces the built-in colored text line with `layout`'s output
    #[must_use]
    pub fn with_layout(mut self, layout: Arc<dyn Layout>) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Colors only apply to the built-in text line and need the `console`
    /// feature.
    #[must_use]
    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors && cfg!(feature = "console");
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.base.set_filter(Some(filter));
        self
    }

    pub fn target(&self) -> ConsoleTarget {
        self.target
    }

    pub fn uses_colors(&self) -> bool {
        self.use_colors
    }

    /// Format as text with optional colors
    fn format_text(&self, event: &LogEvent) -> String {
        #[cfg(feature = "console")]
        if self.use_colors {
            let level = format!("{:5}", event.level.name())
                .color(event.level.color_code())
                .to_string();
            let line = self.text.format(event);
            // The plain level tag appears once, right after the timestamp.
            return line.replacen(&format!("[{:5}]", event.level.name()), &format!("[{}]", level), 1);
        }
        self.text.format(event)
    }

    fn write_bytes(&self, bytes: &[u8]) -> std::io::Result<()> {
        match self.target {
            ConsoleTarget::SystemOut => std::io::stdout().lock().write_all(bytes),
            ConsoleTarget::SystemErr => std::io::stderr().lock().write_all(bytes),
        }
    }
}

impl Appender for ConsoleAppender {
    fn append(&self, event: &LogEvent) -> Result<()> {
        self.base.ensure_started()?;
        let bytes = match self.layout {
            Some(ref layout) => layout.encode(event)?,
            None => {
                let mut line = self.format_text(event);
                line.push('\n');
                line.into_bytes()
            }
        };
        self.write_bytes(&bytes)
            .map_err(|e| LoggerError::io_operation("writing to console", self.base.name(), e))
    }

    fn flush(&self) -> Result<()> {
        match self.target {
            ConsoleTarget::SystemOut => std::io::stdout().flush()?,
            ConsoleTarget::SystemErr => std::io::stderr().flush()?,
        }
        Ok(())
    }

    fn name(&self) -> &str {
        self.base.name()
    }

    fn filter(&self) -> Option<&Arc<dyn Filter>> {
        self.base.filter()
    }

    fn stop(&self, _timeout: Duration) -> bool {
        if self.base.mark_stopped() {
            let _ = Appender::flush(self);
        }
        true
    }

    fn is_started(&self) -> bool {
        self.base.is_started()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Level;

    #[test]
    fn test_target_parse() {
        assert_eq!("system_err".parse(), Ok(ConsoleTarget::SystemErr));
        assert_eq!("SYSTEM_OUT".parse(), Ok(ConsoleTarget::SystemOut));
        assert!("printer".parse::<ConsoleTarget>().is_err());
    }

    #[test]
    fn test_plain_line_without_colors() {
        let appender = ConsoleAppender::new("console").with_colors(false);
        let line = appender.format_text(&LogEvent::new("app", Level::INFO, "hello"));
        assert!(line.contains("[INFO ]"));
        assert!(line.ends_with("app - hello"));
    }

    #[test]
    fn test_append_after_stop_fails() {
        let appender = ConsoleAppender::new("console").with_colors(false);
        appender
            .append(&LogEvent::new("app", Level::INFO, "visible in test output"))
            .unwrap();
        assert!(appender.stop(Duration::from_secs(1)));
        assert!(!appender.is_started());
        assert!(appender
            .append(&LogEvent::new("app", Level::INFO, "dropped"))
            .is_err());
    }
}
