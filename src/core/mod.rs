//! Core logging types and traits

pub mod appender;
pub mod context;
pub mod cyclic_buffer;
pub mod error;
pub mod event;
pub mod filter;
pub mod layout;
pub mod level;
pub mod logger;
pub mod logger_registry;
pub mod message;
pub mod metrics;
pub mod overflow_policy;

pub use appender::{Appender, AppenderBase, AppenderControl};
pub use context::LoggerContext;
pub use cyclic_buffer::CyclicBuffer;
pub use error::{LoggerError, Result};
pub use event::{Location, LogEvent};
pub use filter::{CompositeFilter, Filter, FilterResult, StringMatchFilter, ThresholdFilter};
pub use layout::{JsonLayout, Layout, TextLayout};
pub use level::Level;
pub use logger::Logger;
pub use logger_registry::{LoggerRegistry, RegisteredLogger};
pub use message::{same_factory, MessageFactory, ParameterizedMessageFactory, SimpleMessageFactory};
pub use metrics::{DeliveryMetrics, TransportMetrics};
pub use overflow_policy::{LogPriority, OverflowCallback, OverflowPolicy};
