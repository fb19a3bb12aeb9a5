//! Overflow policies for the async appender queue
//!
//! When the async appender's queue is full, these policies determine how
//! to handle new log events to prevent silent log loss.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Policy for handling queue overflow in the async appender
///
/// # Example
///
/// ```
/// use rust_logging_core::OverflowPolicy;
/// use std::time::Duration;
///
/// // Default behavior: alert and drop
/// let policy = OverflowPolicy::default();
///
/// // Block with timeout
/// let policy = OverflowPolicy::BlockWithTimeout(Duration::from_millis(100));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Drop new events when the queue is full
    ///
    /// Events are silently dropped but metrics are tracked.
    DropNewest,

    /// Evict the oldest queued event to make room for the new one
    DropOldest,

    /// Block until space is available
    ///
    /// Warning: This can cause backpressure in the application.
    Block,

    /// Block with timeout, then drop
    BlockWithTimeout(Duration),

    /// Drop but alert via callback and the diagnostics channel
    #[default]
    AlertAndDrop,
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::DropNewest => write!(f, "DropNewest"),
            OverflowPolicy::DropOldest => write!(f, "DropOldest"),
            OverflowPolicy::Block => write!(f, "Block"),
            OverflowPolicy::BlockWithTimeout(d) => write!(f, "BlockWithTimeout({:?})", d),
            OverflowPolicy::AlertAndDrop => write!(f, "AlertAndDrop"),
        }
    }
}

/// Parses the configuration attribute form. `BlockWithTimeout` takes a
/// millisecond count: `BlockWithTimeout(250)`.
impl FromStr for OverflowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(rest) = s
            .strip_prefix("BlockWithTimeout(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let millis: u64 = rest
                .trim()
                .trim_end_matches("ms")
                .parse()
                .map_err(|_| format!("Invalid timeout in overflow policy: '{}'", s))?;
            return Ok(OverflowPolicy::BlockWithTimeout(Duration::from_millis(millis)));
        }
        match s.to_ascii_lowercase().as_str() {
            "dropnewest" => Ok(OverflowPolicy::DropNewest),
            "dropoldest" => Ok(OverflowPolicy::DropOldest),
            "block" => Ok(OverflowPolicy::Block),
            "alertanddrop" => Ok(OverflowPolicy::AlertAndDrop),
            _ => Err(format!("Invalid overflow policy: '{}'", s)),
        }
    }
}

/// Priority level for event preservation during overflow
///
/// Higher priority events are preserved over lower priority ones
/// when the queue is full.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub enum LogPriority {
    /// Normal priority (Trace, Debug, Info)
    #[default]
    Normal = 0,
    /// High priority (Warn)
    High = 1,
    /// Critical priority (Error, Fatal) - never dropped
    Critical = 2,
}

impl fmt::Display for LogPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogPriority::Normal => write!(f, "Normal"),
            LogPriority::High => write!(f, "High"),
            LogPriority::Critical => write!(f, "Critical"),
        }
    }
}

/// Callback type for overflow notifications
///
/// Called when events are dropped due to queue overflow.
/// The parameter is the total count of dropped events so far.
pub type OverflowCallback = Arc<dyn Fn(u64) + Send + Sync>;
