//! Event filters

use super::{event::LogEvent, level::Level};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterResult {
    /// Deliver without consulting further filters
    Accept,
    /// No opinion; continue evaluation
    Neutral,
    /// Drop the event
    Deny,
}

impl FromStr for FilterResult {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACCEPT" => Ok(FilterResult::Accept),
            "NEUTRAL" => Ok(FilterResult::Neutral),
            "DENY" => Ok(FilterResult::Deny),
            _ => Err(format!("Invalid filter result: '{}'", s)),
        }
    }
}

impl fmt::Display for FilterResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FilterResult::Accept => "ACCEPT",
            FilterResult::Neutral => "NEUTRAL",
            FilterResult::Deny => "DENY",
        };
        f.write_str(s)
    }
}

pub trait Filter: Send + Sync {
    fn filter(&self, event: &LogEvent) -> FilterResult;

    fn name(&self) -> &str;

    /// Wrapped filters, in evaluation order. Empty for leaf filters.
    fn filters(&self) -> &[Arc<dyn Filter>] {
        &[]
    }
}

/// Matches events at or above a level.
#[derive(Debug, Clone)]
pub struct ThresholdFilter {
    level: Level,
    on_match: FilterResult,
    on_mismatch: FilterResult,
}

impl ThresholdFilter {
    pub fn new(level: Level, on_match: FilterResult, on_mismatch: FilterResult) -> Self {
        Self {
            level,
            on_match,
            on_mismatch,
        }
    }

    pub fn level(&self) -> Level {
        self.level
    }
}

impl Filter for ThresholdFilter {
    fn filter(&self, event: &LogEvent) -> FilterResult {
        if event.level.is_more_specific_than(self.level) {
            self.on_match
        } else {
            self.on_mismatch
        }
    }

    fn name(&self) -> &str {
        "ThresholdFilter"
    }
}

/// Matches events whose message contains a literal string.
#[derive(Debug, Clone)]
pub struct StringMatchFilter {
    text: String,
    on_match: FilterResult,
    on_mismatch: FilterResult,
}

impl StringMatchFilter {
    pub fn new(text: impl Into<String>, on_match: FilterResult, on_mismatch: FilterResult) -> Self {
        Self {
            text: text.into(),
            on_match,
            on_mismatch,
        }
    }
}

impl Filter for StringMatchFilter {
    fn filter(&self, event: &LogEvent) -> FilterResult {
        if event.message.contains(&self.text) {
            self.on_match
        } else {
            self.on_mismatch
        }
    }

    fn name(&self) -> &str {
        "StringMatchFilter"
    }
}

/// Evaluates filters in declaration order; the first non-neutral result wins.
#[derive(Clone, Default)]
pub struct CompositeFilter {
    filters: Vec<Arc<dyn Filter>>,
}

impl CompositeFilter {
    pub fn new(filters: Vec<Arc<dyn Filter>>) -> Self {
        Self { filters }
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl Filter for CompositeFilter {
    fn filter(&self, event: &LogEvent) -> FilterResult {
        self.filters
            .iter()
            .map(|f| f.filter(event))
            .find(|result| *result != FilterResult::Neutral)
            .unwrap_or(FilterResult::Neutral)
    }

    fn name(&self) -> &str {
        "CompositeFilter"
    }

    fn filters(&self) -> &[Arc<dyn Filter>] {
        &self.filters
    }
}
