//! Socket appender for remote logging
//!
//! Sends each encoded event to a remote collector through a shared TCP or
//! UDP manager. Several appenders pointing at the same host and port share
//! one connection.

use crate::core::{Appender, AppenderBase, Filter, JsonLayout, Layout, LogEvent, LoggerError, Result};
use crate::manager::datagram::{get_datagram_manager, DatagramManagerData, DatagramSocketManager};
use crate::manager::tcp::{get_socket_manager, TcpManagerData, TcpSocketManager};
use crate::manager::{ManagerHandle, ManagerRegistry};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TCP" => Ok(Protocol::Tcp),
            "UDP" => Ok(Protocol::Udp),
            _ => Err(format!("Invalid protocol: '{}'", s)),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => f.write_str("TCP"),
            Protocol::Udp => f.write_str("UDP"),
        }
    }
}

enum Transport {
    Tcp(ManagerHandle<TcpSocketManager>),
    Udp(ManagerHandle<DatagramSocketManager>),
}

impl Transport {
    fn write(&self, bytes: &[u8]) -> Result<()> {
        match self {
            Transport::Tcp(manager) => manager.write(bytes),
            Transport::Udp(manager) => manager.write(bytes),
        }
    }

    fn close(&self, timeout: Duration) -> bool {
        match self {
            Transport::Tcp(manager) => manager.close(timeout),
            Transport::Udp(manager) => manager.close(timeout),
        }
    }

    fn key(&self) -> &str {
        match self {
            Transport::Tcp(manager) => manager.key(),
            Transport::Udp(manager) => manager.key(),
        }
    }
}

/// Socket appender that sends logs to a remote collector
///
/// # Example
///
/// ```no_run
/// use rust_logging_core::appenders::SocketAppender;
/// use rust_logging_core::manager::tcp::TcpManagerData;
/// use rust_logging_core::manager::ManagerRegistry;
///
/// let managers = ManagerRegistry::new();
/// let appender = SocketAppender::tcp("remote", &managers, TcpManagerData::new("127.0.0.1", 4560))
///     .expect("log collector unavailable");
/// ```
pub struct SocketAppender {
    base: AppenderBase,
    transport: Transport,
    layout: Arc<dyn Layout>,
}

impl SocketAppender {
    /// Fails with [`LoggerError::ManagerUnavailable`] when the manager
    /// cannot be created.
    pub fn tcp(name: impl Into<String>, managers: &ManagerRegistry, data: TcpManagerData) -> Result<Self> {
        let key = data.key();
        let manager = get_socket_manager(managers, data)
            .ok_or_else(|| LoggerError::manager_unavailable(key))?;
        Ok(Self::with_transport(name, Transport::Tcp(manager)))
    }

    pub fn udp(
        name: impl Into<String>,
        managers: &ManagerRegistry,
        data: DatagramManagerData,
    ) -> Result<Self> {
        let key = data.key();
        let manager = get_datagram_manager(managers, data)
            .ok_or_else(|| LoggerError::manager_unavailable(key))?;
        Ok(Self::with_transport(name, Transport::Udp(manager)))
    }

    fn with_transport(name: impl Into<String>, transport: Transport) -> Self {
        Self {
            base: AppenderBase::new(name, None),
            transport,
            layout: Arc::new(JsonLayout::new()),
        }
    }

    #[must_use]
    pub fn with_layout(mut self, layout: Arc<dyn Layout>) -> Self {
        self.layout = layout;
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.base.set_filter(Some(filter));
        self
    }

    pub fn protocol(&self) -> Protocol {
        match self.transport {
            Transport::Tcp(_) => Protocol::Tcp,
            Transport::Udp(_) => Protocol::Udp,
        }
    }

    /// Key of the shared manager, e.g. `TCP:host:port`
    pub fn manager_key(&self) -> &str {
        self.transport.key()
    }

    /// The TCP manager, for inspecting connection state
    pub fn tcp_manager(&self) -> Option<&TcpSocketManager> {
        match self.transport {
            Transport::Tcp(ref manager) => Some(manager),
            Transport::Udp(_) => None,
        }
    }
}

impl Appender for SocketAppender {
    fn append(&self, event: &LogEvent) -> Result<()> {
        self.base.ensure_started()?;
        let bytes = self.layout.encode(event)?;
        self.transport.write(&bytes)
    }

    fn name(&self) -> &str {
        self.base.name()
    }

    fn filter(&self) -> Option<&Arc<dyn Filter>> {
        self.base.filter()
    }

    fn stop(&self, timeout: Duration) -> bool {
        if !self.base.mark_stopped() {
            return true;
        }
        self.transport.close(timeout)
    }

    fn is_started(&self) -> bool {
        self.base.is_started()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Level;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;

    #[test]
    fn test_tcp_appender_sends_json_lines() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let managers = ManagerRegistry::new();

        let appender =
            SocketAppender::tcp("remote", &managers, TcpManagerData::new("127.0.0.1", port))
                .unwrap();
        assert_eq!(appender.protocol(), Protocol::Tcp);
        assert!(appender.tcp_manager().unwrap().is_connected());

        let (peer, _) = listener.accept().unwrap();
        appender
            .append(&LogEvent::new("app", Level::WARN, "over the wire"))
            .unwrap();

        let mut line = String::new();
        BufReader::new(peer).read_line(&mut line).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["message"], "over the wire");

        assert!(appender.stop(Duration::from_secs(1)));
        assert_eq!(managers.manager_count(), 0);
    }

    #[test]
    fn test_unavailable_manager_fails_construction() {
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let managers = ManagerRegistry::new();
        let data = TcpManagerData::new("127.0.0.1", port).with_reconnect_delay(Duration::ZERO);

        let err = SocketAppender::tcp("remote", &managers, data).err().unwrap();
        assert!(matches!(err, LoggerError::ManagerUnavailable { .. }));
    }
}
