//! Appender implementations

pub mod async_appender;
pub mod console;
pub mod file;
#[cfg(feature = "smtp")]
pub mod smtp;
#[cfg(feature = "network")]
pub mod socket;

pub use async_appender::{AsyncAppender, AsyncAppenderBuilder, DEFAULT_QUEUE_SIZE};
pub use console::{ConsoleAppender, ConsoleTarget};
pub use file::FileAppender;
#[cfg(feature = "smtp")]
pub use smtp::SmtpAppender;
#[cfg(feature = "network")]
pub use socket::{Protocol, SocketAppender};

pub use crate::core::Appender;
