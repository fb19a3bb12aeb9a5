//! Stream transport that repairs itself in the background.
//!
//! A [`ReconnectingManager`] owns one transport produced by a [`Connector`].
//! Writers share it under a mutex. When a write fails the transport is
//! dropped and a single reconnector thread is started; the failing writer
//! gets its error back immediately and later writers get
//! [`LoggerError::TransportUnavailable`] until the reconnector swaps a fresh
//! transport in. Producers never wait on a connect.

use super::Manager;
use crate::core::{metrics::TransportMetrics, LoggerError, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Opens transports to a fixed target.
pub trait Connector: Send + Sync + 'static {
    type Transport: Write + Send + 'static;

    fn connect(&self) -> io::Result<Self::Transport>;

    /// Human readable target, used in diagnostics
    fn describe(&self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Connected = 0,
    Reconnecting = 1,
    Closed = 2,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Connected,
            1 => ConnectionState::Reconnecting,
            _ => ConnectionState::Closed,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Connected => "CONNECTED",
            ConnectionState::Reconnecting => "RECONNECTING",
            ConnectionState::Closed => "CLOSED",
        };
        f.write_str(s)
    }
}

struct Shared<C: Connector> {
    name: String,
    connector: C,
    reconnect_delay: Duration,
    transport: Mutex<Option<C::Transport>>,
    state: AtomicU8,
    closed: AtomicBool,
    // Held by at most one reconnector at a time.
    reconnecting: AtomicBool,
    shutdown_tx: Mutex<Option<Sender<()>>>,
    shutdown_rx: Receiver<()>,
    reconnector: Mutex<Option<JoinHandle<()>>>,
    metrics: TransportMetrics,
}

impl<C: Connector> Shared<C> {
    fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn spawn_reconnector(self: &Arc<Self>) {
        if self.reconnect_delay.is_zero() || self.is_closed() {
            return;
        }
        if self
            .reconnecting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let worker = Arc::clone(self);
        let shutdown = self.shutdown_rx.clone();
        let spawned = thread::Builder::new()
            .name(format!("{}-reconnector", self.name))
            .spawn(move || worker.reconnect_loop(shutdown));

        match spawned {
            Ok(handle) => {
                // A previous reconnector, if any, has already finished.
                *self.reconnector.lock() = Some(handle);
            }
            Err(e) => {
                tracing::error!(manager = %self.name, error = %e, "Unable to start reconnector");
                self.reconnecting.store(false, Ordering::Release);
            }
        }
    }

    fn reconnect_loop(&self, shutdown: Receiver<()>) {
        loop {
            match shutdown.recv_timeout(self.reconnect_delay) {
                Err(RecvTimeoutError::Timeout) => {}
                _ => break,
            }
            if self.is_closed() {
                break;
            }

            self.metrics.record_reconnect_attempt();
            match self.connector.connect() {
                Ok(transport) => {
                    let mut current = self.transport.lock();
                    if self.is_closed() {
                        break;
                    }
                    *current = Some(transport);
                    self.set_state(ConnectionState::Connected);
                    drop(current);

                    self.metrics.record_reconnect();
                    tracing::debug!(
                        manager = %self.name,
                        target = %self.connector.describe(),
                        "Connection re-established"
                    );
                    break;
                }
                Err(e) => {
                    tracing::debug!(
                        manager = %self.name,
                        target = %self.connector.describe(),
                        error = %e,
                        "Reconnect attempt failed"
                    );
                }
            }
        }
        self.reconnecting.store(false, Ordering::Release);
    }
}

/// A shared transport with a background reconnect loop.
pub struct ReconnectingManager<C: Connector> {
    shared: Arc<Shared<C>>,
}

impl<C: Connector> ReconnectingManager<C> {
    /// Connects immediately.
    ///
    /// A zero `reconnect_delay` disables retry, so an unreachable target
    /// fails creation. Otherwise the manager starts in
    /// [`ConnectionState::Reconnecting`] with a reconnector running.
    pub fn new(name: impl Into<String>, connector: C, reconnect_delay: Duration) -> io::Result<Self> {
        let name = name.into();
        let (initial, state) = match connector.connect() {
            Ok(transport) => (Some(transport), ConnectionState::Connected),
            Err(e) if reconnect_delay.is_zero() => return Err(e),
            Err(e) => {
                tracing::warn!(
                    manager = %name,
                    target = %connector.describe(),
                    error = %e,
                    "Initial connection failed, will retry"
                );
                (None, ConnectionState::Reconnecting)
            }
        };

        let (shutdown_tx, shutdown_rx) = bounded(0);
        let shared = Arc::new(Shared {
            name,
            connector,
            reconnect_delay,
            transport: Mutex::new(initial),
            state: AtomicU8::new(state as u8),
            closed: AtomicBool::new(false),
            reconnecting: AtomicBool::new(false),
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            shutdown_rx,
            reconnector: Mutex::new(None),
            metrics: TransportMetrics::new(),
        });

        if state == ConnectionState::Reconnecting {
            shared.spawn_reconnector();
        }
        Ok(Self { shared })
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn connector(&self) -> &C {
        &self.shared.connector
    }

    pub fn reconnect_delay(&self) -> Duration {
        self.shared.reconnect_delay
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// True while a reconnector thread is alive
    pub fn is_reconnecting(&self) -> bool {
        self.shared.reconnecting.load(Ordering::Acquire)
    }

    pub fn metrics(&self) -> &TransportMetrics {
        &self.shared.metrics
    }

    /// Writes and flushes `bytes` on the current transport.
    ///
    /// Never waits for a reconnect. A failed write drops the transport,
    /// starts the reconnector and returns [`LoggerError::TransportWrite`].
    pub fn write(&self, bytes: &[u8]) -> Result<()> {
        if self.shared.is_closed() {
            return Err(LoggerError::transport_unavailable(&self.shared.name));
        }

        let mut current = self.shared.transport.lock();
        let Some(transport) = current.as_mut() else {
            drop(current);
            self.shared.spawn_reconnector();
            return Err(LoggerError::transport_unavailable(&self.shared.name));
        };

        match transport.write_all(bytes).and_then(|_| transport.flush()) {
            Ok(()) => {
                self.shared.metrics.record_write();
                Ok(())
            }
            Err(e) => {
                *current = None;
                self.shared.set_state(ConnectionState::Reconnecting);
                drop(current);

                self.shared.metrics.record_failed_write();
                self.shared.spawn_reconnector();
                Err(LoggerError::transport(&self.shared.name, e))
            }
        }
    }

    /// Stops the reconnector, then drops the transport. Idempotent.
    /// Returns false if the reconnector did not exit within `timeout`.
    pub fn close(&self, timeout: Duration) -> bool {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return true;
        }

        // Dropping the only sender wakes a sleeping reconnector.
        self.shared.shutdown_tx.lock().take();
        let joined = match self.shared.reconnector.lock().take() {
            Some(handle) => join_with_timeout(handle, timeout),
            None => true,
        };

        if let Some(mut transport) = self.shared.transport.lock().take() {
            let _ = transport.flush();
        }
        self.shared.set_state(ConnectionState::Closed);

        if !joined {
            tracing::warn!(manager = %self.shared.name, "Reconnector did not stop in time");
        }
        joined
    }
}

pub(crate) fn join_with_timeout(handle: JoinHandle<()>, timeout: Duration) -> bool {
    let start = Instant::now();
    while !handle.is_finished() {
        if start.elapsed() >= timeout {
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
    handle.join().is_ok()
}

impl<C: Connector> Manager for ReconnectingManager<C> {
    fn name(&self) -> &str {
        &self.shared.name
    }

    fn release(&self, timeout: Duration) -> bool {
        self.close(timeout)
    }
}

impl<C: Connector> Drop for ReconnectingManager<C> {
    fn drop(&mut self) {
        self.close(super::DEFAULT_SHUTDOWN_TIMEOUT);
    }
}

impl<C: Connector> fmt::Debug for ReconnectingManager<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconnectingManager")
            .field("name", &self.shared.name)
            .field("target", &self.shared.connector.describe())
            .field("state", &self.state())
            .field("reconnect_delay", &self.shared.reconnect_delay)
            .finish()
    }
}
