//! Level definitions
//!
//! Levels carry an integer severity where a smaller value is more severe
//! (`FATAL` = 100, `TRACE` = 600). Custom levels declared by a configuration
//! are interned in a process-wide table so they compare like the built-in ones.

use super::overflow_policy::LogPriority;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Level {
    name: &'static str,
    int_level: u32,
}

static LEVELS: Lazy<RwLock<HashMap<String, Level>>> = Lazy::new(|| {
    let map = Level::STANDARD
        .iter()
        .map(|level| (level.name.to_string(), *level))
        .collect();
    RwLock::new(map)
});

impl Level {
    pub const OFF: Level = Level::standard("OFF", 0);
    pub const FATAL: Level = Level::standard("FATAL", 100);
    pub const ERROR: Level = Level::standard("ERROR", 200);
    pub const WARN: Level = Level::standard("WARN", 300);
    pub const INFO: Level = Level::standard("INFO", 400);
    pub const DEBUG: Level = Level::standard("DEBUG", 500);
    pub const TRACE: Level = Level::standard("TRACE", 600);
    pub const ALL: Level = Level::standard("ALL", u32::MAX);

    const STANDARD: [Level; 8] = [
        Level::OFF,
        Level::FATAL,
        Level::ERROR,
        Level::WARN,
        Level::INFO,
        Level::DEBUG,
        Level::TRACE,
        Level::ALL,
    ];

    const fn standard(name: &'static str, int_level: u32) -> Self {
        Self { name, int_level }
    }

    /// Returns the level registered under `name`, registering it with
    /// `int_level` if it does not exist yet.
    ///
    /// Names are case-insensitive. An existing registration always wins, so
    /// re-declaring a custom level with a different severity keeps the first.
    pub fn for_name(name: &str, int_level: u32) -> Level {
        let key = name.trim().to_uppercase();
        if let Some(level) = LEVELS.read().get(&key) {
            return *level;
        }

        let mut levels = LEVELS.write();
        *levels.entry(key).or_insert_with_key(|key| Level {
            // Interned once per distinct name for the life of the process.
            name: Box::leak(key.clone().into_boxed_str()),
            int_level,
        })
    }

    /// Looks up a standard or previously registered custom level.
    pub fn get(name: &str) -> Option<Level> {
        LEVELS.read().get(&name.trim().to_uppercase()).copied()
    }

    /// All known levels, most severe first.
    pub fn values() -> Vec<Level> {
        let mut levels: Vec<Level> = LEVELS.read().values().copied().collect();
        levels.sort_by(|a, b| b.cmp(a));
        levels
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn to_str(&self) -> &'static str {
        self.name
    }

    pub fn int_level(&self) -> u32 {
        self.int_level
    }

    pub fn is_standard(&self) -> bool {
        Self::STANDARD.contains(self)
    }

    /// True when this level is at least as severe as `other`.
    pub fn is_more_specific_than(&self, other: Level) -> bool {
        self.int_level <= other.int_level
    }

    pub fn priority(&self) -> LogPriority {
        if self.int_level <= Level::ERROR.int_level {
            LogPriority::Critical
        } else if self.int_level <= Level::WARN.int_level {
            LogPriority::High
        } else {
            LogPriority::Normal
        }
    }

    #[cfg(feature = "console")]
    pub fn color_code(&self) -> colored::Color {
        use colored::Color::*;
        match self.int_level {
            0..=100 => BrightRed,
            101..=200 => Red,
            201..=300 => Yellow,
            301..=400 => Green,
            401..=500 => Blue,
            _ => BrightBlack,
        }
    }
}

impl Default for Level {
    fn default() -> Self {
        Level::INFO
    }
}

// Less severe levels sort first: TRACE < DEBUG < ... < FATAL < OFF.
impl Ord for Level {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .int_level
            .cmp(&self.int_level)
            .then_with(|| self.name.cmp(other.name))
    }
}

impl PartialOrd for Level {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("WARNING") {
            return Ok(Level::WARN);
        }
        Level::get(s).ok_or_else(|| format!("Invalid log level: '{}'", s))
    }
}

impl Serialize for Level {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name)
    }
}

impl<'de> Deserialize<'de> for Level {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}
