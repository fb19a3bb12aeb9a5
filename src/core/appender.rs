//! Appender trait for log output destinations

use super::{
    error::{LoggerError, Result},
    event::LogEvent,
    filter::{Filter, FilterResult},
    level::Level,
};
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A sink for log events.
///
/// Appenders are shared between every logger configuration that references
/// them, so all methods take `&self` and implementations guard their own
/// mutable state.
pub trait Appender: Send + Sync {
    fn append(&self, event: &LogEvent) -> Result<()>;

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str;

    /// Filter attached to this appender by its configuration
    fn filter(&self) -> Option<&Arc<dyn Filter>> {
        None
    }

    /// Stops the appender and releases the managers it holds.
    /// Idempotent; returns false if resources could not be released in time.
    fn stop(&self, _timeout: Duration) -> bool {
        true
    }

    fn is_started(&self) -> bool {
        true
    }
}

/// Name, filter and started flag shared by the built-in appenders.
pub struct AppenderBase {
    name: String,
    filter: Option<Arc<dyn Filter>>,
    stopped: AtomicBool,
}

impl AppenderBase {
    pub fn new(name: impl Into<String>, filter: Option<Arc<dyn Filter>>) -> Self {
        Self {
            name: name.into(),
            filter,
            stopped: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn filter(&self) -> Option<&Arc<dyn Filter>> {
        self.filter.as_ref()
    }

    pub fn set_filter(&mut self, filter: Option<Arc<dyn Filter>>) {
        self.filter = filter;
    }

    pub fn is_started(&self) -> bool {
        !self.stopped.load(Ordering::Acquire)
    }

    pub fn ensure_started(&self) -> Result<()> {
        if self.is_started() {
            Ok(())
        } else {
            Err(LoggerError::appender_stopped(&self.name))
        }
    }

    /// Marks the appender stopped. Returns true only for the first caller.
    pub fn mark_stopped(&self) -> bool {
        !self.stopped.swap(true, Ordering::AcqRel)
    }
}

/// An appender as referenced from a logger configuration, with the optional
/// level of the reference.
#[derive(Clone)]
pub struct AppenderControl {
    appender: Arc<dyn Appender>,
    level: Option<Level>,
}

impl AppenderControl {
    pub fn new(appender: Arc<dyn Appender>, level: Option<Level>) -> Self {
        Self { appender, level }
    }

    pub fn appender(&self) -> &Arc<dyn Appender> {
        &self.appender
    }

    pub fn appender_name(&self) -> &str {
        self.appender.name()
    }

    pub fn level(&self) -> Option<Level> {
        self.level
    }

    fn is_filtered(&self, event: &LogEvent) -> bool {
        if let Some(level) = self.level {
            if !event.level.is_more_specific_than(level) {
                return true;
            }
        }
        self.appender
            .filter()
            .is_some_and(|f| f.filter(event) == FilterResult::Deny)
    }

    /// Delivers the event unless the reference level or the appender's filter
    /// rejects it. A panicking appender is reported as an error so the
    /// remaining appenders still run.
    pub fn call(&self, event: &LogEvent) -> Result<()> {
        if self.is_filtered(event) {
            return Ok(());
        }

        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.appender.append(event)
        })) {
            Ok(result) => result,
            Err(payload) => Err(LoggerError::other(format!(
                "Appender '{}' panicked: {}",
                self.appender.name(),
                panic_message(payload.as_ref())
            ))),
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
