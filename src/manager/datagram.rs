//! Connectionless UDP manager keyed by `UDP:host:port`

use super::{Manager, ManagerFactory, ManagerHandle, ManagerRegistry};
use crate::core::{metrics::TransportMetrics, LoggerError, Result};
use parking_lot::Mutex;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

/// Binds a local socket of the target's address family and connects it to
/// the first resolved address that accepts.
fn connect_udp(host: &str, port: u16) -> io::Result<UdpSocket> {
    let mut last_error = None;
    for target in (host, port).to_socket_addrs()? {
        let local: SocketAddr = match target {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        match UdpSocket::bind(local).and_then(|socket| socket.connect(target).map(|_| socket)) {
            Ok(socket) => return Ok(socket),
            Err(e) => last_error = Some(e),
        }
    }
    Err(last_error.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("{}:{} did not resolve to any address", host, port),
        )
    }))
}

/// Sends each write as one datagram. There is no connection to lose, so
/// there is no reconnect loop; a failed send is reported and the next write
/// tries again.
#[derive(Debug)]
pub struct DatagramSocketManager {
    name: String,
    host: String,
    port: u16,
    socket: Mutex<Option<UdpSocket>>,
    metrics: TransportMetrics,
}

impl DatagramSocketManager {
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Result<Self> {
        let name = name.into();
        let host = host.into();
        let socket = connect_udp(&host, port)
            .map_err(|e| LoggerError::io_operation("binding datagram socket", &name, e))?;

        Ok(Self {
            name,
            host,
            port,
            socket: Mutex::new(Some(socket)),
            metrics: TransportMetrics::new(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn metrics(&self) -> &TransportMetrics {
        &self.metrics
    }

    pub fn write(&self, bytes: &[u8]) -> Result<()> {
        let socket = self.socket.lock();
        let Some(socket) = socket.as_ref() else {
            return Err(LoggerError::transport_unavailable(&self.name));
        };
        match socket.send(bytes) {
            Ok(_) => {
                self.metrics.record_write();
                Ok(())
            }
            Err(e) => {
                self.metrics.record_failed_write();
                Err(LoggerError::transport(&self.name, e))
            }
        }
    }
}

impl Manager for DatagramSocketManager {
    fn name(&self) -> &str {
        &self.name
    }

    fn release(&self, _timeout: Duration) -> bool {
        self.socket.lock().take();
        true
    }
}

#[derive(Debug, Clone)]
pub struct DatagramManagerData {
    pub host: String,
    pub port: u16,
}

impl DatagramManagerData {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn key(&self) -> String {
        manager_key(&self.host, self.port)
    }
}

pub fn manager_key(host: &str, port: u16) -> String {
    format!("UDP:{}:{}", host, port)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DatagramManagerFactory;

impl ManagerFactory<DatagramSocketManager, DatagramManagerData> for DatagramManagerFactory {
    fn create_manager(&self, name: &str, data: DatagramManagerData) -> Result<DatagramSocketManager> {
        if data.host.is_empty() {
            return Err(LoggerError::config("Socket", "A host name is required"));
        }
        DatagramSocketManager::new(name, data.host, data.port)
    }
}

pub fn get_datagram_manager(
    registry: &ManagerRegistry,
    data: DatagramManagerData,
) -> Option<ManagerHandle<DatagramSocketManager>> {
    let key = data.key();
    registry.get_manager(&key, data, &DatagramManagerFactory)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datagram_delivery() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let port = receiver.local_addr().unwrap().port();

        let registry = ManagerRegistry::new();
        let manager =
            get_datagram_manager(&registry, DatagramManagerData::new("127.0.0.1", port)).unwrap();
        assert_eq!(manager.key(), format!("UDP:127.0.0.1:{}", port));

        manager.write(b"datagram").unwrap();
        let mut buf = [0u8; 64];
        let n = receiver.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"datagram");
        assert_eq!(manager.metrics().writes(), 1);
    }

    #[test]
    fn test_ipv6_target() {
        // Hosts without IPv6 loopback have nothing to test against
        let Ok(receiver) = UdpSocket::bind("[::1]:0") else {
            return;
        };
        receiver
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let port = receiver.local_addr().unwrap().port();

        let manager = DatagramSocketManager::new("UDP:::1", "::1", port).unwrap();
        manager.write(b"over v6").unwrap();
        let mut buf = [0u8; 64];
        let n = receiver.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"over v6");
    }

    #[test]
    fn test_unresolvable_host_fails_creation() {
        let result = DatagramSocketManager::new("UDP:bad", "host.invalid", 9);
        assert!(matches!(result, Err(LoggerError::IoOperation { .. })));
    }

    #[test]
    fn test_write_after_release_is_unavailable() {
        let manager = DatagramSocketManager::new("UDP:127.0.0.1:9", "127.0.0.1", 9).unwrap();
        assert!(manager.release(Duration::from_secs(1)));
        assert!(matches!(
            manager.write(b"x"),
            Err(LoggerError::TransportUnavailable { .. })
        ));
    }
}
