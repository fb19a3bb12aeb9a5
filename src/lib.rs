//! # Rust Logging Core
//!
//! The concurrent runtime underneath a hierarchical logging framework.
//!
//! ## Features
//!
//! - **Logger registry**: loggers keyed by name and message factory, held
//!   weakly so unused loggers are reclaimed
//! - **Shared managers**: reference-counted resources (sockets, files, mail
//!   sessions) shared between appenders and carried across reconfiguration
//! - **Reconnecting transports**: a failed TCP stream is re-established in
//!   the background while writers fail fast
//! - **Plugin configuration**: a component tree resolved against a plugin
//!   catalog and materialized into appenders, filters and loggers
//! - **Async appender**: batched delivery with configurable overflow
//!   policies that never drop error events
//!
//! ## Example
//!
//! ```
//! use rust_logging_core::config::ConfigurationBuilder;
//! use rust_logging_core::{info, Level, LoggerContext};
//!
//! let context = LoggerContext::new("app");
//! let builder = ConfigurationBuilder::new().name("example");
//! let console = builder.new_appender("Stdout", "Console");
//! let root = builder
//!     .new_root_logger(Level::INFO)
//!     .add_component(builder.new_appender_ref("Stdout"));
//! context
//!     .reconfigure(builder.add_appender(console).add_root_logger(root).build_component())
//!     .unwrap();
//!
//! let logger = context.get_logger("app.http");
//! info!(logger, "listening on {}", 8080);
//! ```

pub mod appenders;
pub mod config;
pub mod core;
pub mod macros;
pub mod manager;

pub mod prelude {
    pub use crate::appenders::{AsyncAppender, ConsoleAppender, FileAppender};
    pub use crate::config::{ConfigurationBuilder, PluginRegistry};
    pub use crate::core::{
        Appender, CyclicBuffer, Filter, FilterResult, Layout, Level, LogEvent, Logger,
        LoggerContext, LoggerError, MessageFactory, OverflowPolicy, Result,
    };
    pub use crate::manager::{ManagerRegistry, DEFAULT_SHUTDOWN_TIMEOUT};
}

pub use appenders::{AsyncAppender, ConsoleAppender, FileAppender};
pub use core::{
    Appender, AppenderBase, AppenderControl, CompositeFilter, CyclicBuffer, DeliveryMetrics,
    Filter, FilterResult, JsonLayout, Layout, Level, Location, LogEvent, LogPriority, Logger,
    LoggerContext, LoggerError, LoggerRegistry, MessageFactory, OverflowCallback, OverflowPolicy,
    ParameterizedMessageFactory, RegisteredLogger, Result, SimpleMessageFactory,
    StringMatchFilter, TextLayout, ThresholdFilter, TransportMetrics,
};
pub use manager::{Manager, ManagerFactory, ManagerHandle, ManagerRegistry, DEFAULT_SHUTDOWN_TIMEOUT};
