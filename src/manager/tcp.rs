//! TCP stream manager keyed by `TCP:host:port`

use super::reconnect::{Connector, ReconnectingManager};
use super::{ManagerFactory, ManagerHandle, ManagerRegistry};
use crate::core::{LoggerError, Result};
use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 4560;
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(30_000);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Bounds how long a writer can be stuck on an unresponsive peer
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

pub type TcpSocketManager = ReconnectingManager<TcpConnector>;

#[derive(Debug, Clone)]
pub struct TcpConnector {
    host: String,
    port: u16,
    connect_timeout: Duration,
}

impl TcpConnector {
    pub fn new(host: impl Into<String>, port: u16, connect_timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Connector for TcpConnector {
    type Transport = TcpStream;

    fn connect(&self) -> io::Result<TcpStream> {
        let mut last_err = None;
        for addr in (self.host.as_str(), self.port).to_socket_addrs()? {
            let attempt = if self.connect_timeout.is_zero() {
                TcpStream::connect(addr)
            } else {
                TcpStream::connect_timeout(&addr, self.connect_timeout)
            };
            match attempt {
                Ok(stream) => {
                    stream.set_write_timeout(Some(DEFAULT_WRITE_TIMEOUT))?;
                    stream.set_nodelay(true)?;
                    return Ok(stream);
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("no addresses for {}:{}", self.host, self.port),
            )
        }))
    }

    fn describe(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parameters for a TCP manager
#[derive(Debug, Clone)]
pub struct TcpManagerData {
    pub host: String,
    pub port: u16,
    pub reconnect_delay: Duration,
    pub connect_timeout: Duration,
}

impl TcpManagerData {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn key(&self) -> String {
        manager_key(&self.host, self.port)
    }
}

pub fn manager_key(host: &str, port: u16) -> String {
    format!("TCP:{}:{}", host, port)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TcpManagerFactory;

impl ManagerFactory<TcpSocketManager, TcpManagerData> for TcpManagerFactory {
    fn create_manager(&self, name: &str, data: TcpManagerData) -> Result<TcpSocketManager> {
        if data.host.is_empty() {
            return Err(LoggerError::config("Socket", "A host name is required"));
        }
        let connector = TcpConnector::new(data.host, data.port, data.connect_timeout);
        ReconnectingManager::new(name, connector, data.reconnect_delay)
            .map_err(|e| LoggerError::io_operation("connecting", name, e))
    }
}

/// Returns the shared TCP manager for the data's host and port.
pub fn get_socket_manager(
    registry: &ManagerRegistry,
    data: TcpManagerData,
) -> Option<ManagerHandle<TcpSocketManager>> {
    let key = data.key();
    registry.get_manager(&key, data, &TcpManagerFactory)
}
