//! Counters for observing delivery and transport health
//!
//! `DeliveryMetrics` tracks what happened to events handed to a queueing
//! appender; `TransportMetrics` tracks writes and reconnects on a shared
//! transport manager.

use std::sync::atomic::{AtomicU64, Ordering};

/// Event delivery counters
///
/// # Example
///
/// ```
/// use rust_logging_core::DeliveryMetrics;
///
/// let metrics = DeliveryMetrics::new();
/// metrics.record_dropped();
/// metrics.record_delivered();
///
/// assert_eq!(metrics.dropped_count(), 1);
/// assert_eq!(metrics.delivered_count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct DeliveryMetrics {
    /// Events dropped due to queue overflow or failing appenders
    dropped_count: AtomicU64,

    /// Events every target appender accepted
    delivered_count: AtomicU64,

    /// Number of times the queue was found full
    queue_full_events: AtomicU64,

    /// Number of times a producer blocked waiting for queue space
    block_events: AtomicU64,

    /// Critical events written synchronously instead of being dropped
    critical_preserved: AtomicU64,
}

impl DeliveryMetrics {
    pub const fn new() -> Self {
        Self {
            dropped_count: AtomicU64::new(0),
            delivered_count: AtomicU64::new(0),
            queue_full_events: AtomicU64::new(0),
            block_events: AtomicU64::new(0),
            critical_preserved: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn delivered_count(&self) -> u64 {
        self.delivered_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn queue_full_events(&self) -> u64 {
        self.queue_full_events.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn block_events(&self) -> u64 {
        self.block_events.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn critical_preserved(&self) -> u64 {
        self.critical_preserved.load(Ordering::Relaxed)
    }

    /// Record a dropped event, returning the previous count
    #[inline]
    pub fn record_dropped(&self) -> u64 {
        self.dropped_count.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_delivered(&self) -> u64 {
        self.delivered_count.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_queue_full(&self) -> u64 {
        self.queue_full_events.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_block(&self) -> u64 {
        self.block_events.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_critical_preserved(&self) -> u64 {
        self.critical_preserved.fetch_add(1, Ordering::Relaxed)
    }

    /// Drop rate as a percentage (0.0 - 100.0)
    ///
    /// Returns 0.0 if nothing has been processed.
    pub fn drop_rate(&self) -> f64 {
        let dropped = self.dropped_count() as f64;
        let total = self.delivered_count() as f64 + dropped;
        if total == 0.0 {
            0.0
        } else {
            (dropped / total) * 100.0
        }
    }
}

/// Transport counters kept by a reconnecting manager
#[derive(Debug, Default)]
pub struct TransportMetrics {
    writes: AtomicU64,
    failed_writes: AtomicU64,
    reconnect_attempts: AtomicU64,
    reconnects: AtomicU64,
}

impl TransportMetrics {
    pub const fn new() -> Self {
        Self {
            writes: AtomicU64::new(0),
            failed_writes: AtomicU64::new(0),
            reconnect_attempts: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn failed_writes(&self) -> u64 {
        self.failed_writes.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn reconnect_attempts(&self) -> u64 {
        self.reconnect_attempts.load(Ordering::Relaxed)
    }

    /// Successful reconnections
    #[inline]
    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn record_write(&self) -> u64 {
        self.writes.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_failed_write(&self) -> u64 {
        self.failed_writes.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_reconnect_attempt(&self) -> u64 {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_reconnect(&self) -> u64 {
        self.reconnects.fetch_add(1, Ordering::Relaxed)
    }
}
