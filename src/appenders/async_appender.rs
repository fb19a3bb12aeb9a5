//! Asynchronous appender
//!
//! Queues events on a bounded channel and hands them to the referenced
//! appenders from a single worker thread. What happens when the queue is
//! full is decided by the [`OverflowPolicy`]; error and fatal events are
//! never dropped and are written on the caller's thread instead.

use crate::core::{
    Appender, AppenderBase, AppenderControl, DeliveryMetrics, Filter, LogEvent, LogPriority,
    LoggerError, OverflowCallback, OverflowPolicy, Result,
};
use crate::manager::reconnect::join_with_timeout;
use crate::manager::DEFAULT_SHUTDOWN_TIMEOUT;
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const DEFAULT_QUEUE_SIZE: usize = 1024;

const BATCH_SIZE: usize = 50;
const BATCH_TIMEOUT: Duration = Duration::from_millis(10);
const DROP_ALERT_INTERVAL: u64 = 1000;
/// Attempts to make room under `DropOldest` before giving up on the event
const MAX_EVICTIONS: usize = 3;

enum Command {
    Event(LogEvent),
    Flush(Sender<()>),
}

pub struct AsyncAppender {
    base: AppenderBase,
    sender: RwLock<Option<Sender<Command>>>,
    // Second receiver used by the caller side to evict under DropOldest
    evictor: Receiver<Command>,
    worker: Mutex<Option<JoinHandle<()>>>,
    targets: Arc<Vec<AppenderControl>>,
    queue_size: usize,
    policy: OverflowPolicy,
    on_overflow: Option<OverflowCallback>,
    metrics: Arc<DeliveryMetrics>,
}

impl AsyncAppender {
    pub fn builder(name: impl Into<String>) -> AsyncAppenderBuilder {
        AsyncAppenderBuilder::new(name)
    }

    pub fn queue_size(&self) -> usize {
        self.queue_size
    }

    pub fn overflow_policy(&self) -> &OverflowPolicy {
        &self.policy
    }

    /// Names of the appenders events are forwarded to
    pub fn appender_names(&self) -> Vec<&str> {
        self.targets.iter().map(AppenderControl::appender_name).collect()
    }

    /// Events currently waiting for the worker
    pub fn queued(&self) -> usize {
        self.evictor.len()
    }

    pub fn metrics(&self) -> &DeliveryMetrics {
        &self.metrics
    }

    fn run_worker(receiver: Receiver<Command>, targets: Arc<Vec<AppenderControl>>, metrics: Arc<DeliveryMetrics>) {
        let mut batch = Vec::with_capacity(BATCH_SIZE);

        loop {
            match receiver.recv() {
                Ok(command) => batch.push(command),
                // All senders gone and the queue drained
                Err(_) => break,
            }

            while batch.len() < BATCH_SIZE {
                match receiver.try_recv() {
                    Ok(command) => batch.push(command),
                    Err(_) => break,
                }
            }

            // Small batch: wait a bit for more before writing
            if batch.len() < BATCH_SIZE && !has_flush(&batch) {
                thread::sleep(BATCH_TIMEOUT);
                while batch.len() < BATCH_SIZE {
                    match receiver.try_recv() {
                        Ok(command) => batch.push(command),
                        Err(_) => break,
                    }
                }
            }

            Self::process_batch(&targets, batch.drain(..), &metrics);
        }
    }

    fn process_batch(
        targets: &[AppenderControl],
        batch: impl Iterator<Item = Command>,
        metrics: &DeliveryMetrics,
    ) {
        for command in batch {
            match command {
                Command::Event(event) => {
                    deliver(targets, &event, metrics);
                }
                Command::Flush(ack) => {
                    flush_targets(targets);
                    let _ = ack.send(());
                }
            }
        }
        flush_targets(targets);
    }

    fn handle_overflow(&self, sender: &Sender<Command>, event: LogEvent) -> Result<()> {
        self.metrics.record_queue_full();

        if event.level.priority() == LogPriority::Critical {
            self.force_write(&event);
            return Ok(());
        }

        match self.policy {
            OverflowPolicy::DropNewest => {
                self.metrics.record_dropped();
                Ok(())
            }
            OverflowPolicy::DropOldest => self.drop_oldest(sender, event),
            OverflowPolicy::Block => {
                self.metrics.record_block();
                sender
                    .send(Command::Event(event))
                    .map_err(|_| LoggerError::appender_stopped(self.base.name()))
            }
            OverflowPolicy::BlockWithTimeout(timeout) => {
                self.metrics.record_block();
                match sender.send_timeout(Command::Event(event), timeout) {
                    Ok(()) => Ok(()),
                    Err(SendTimeoutError::Timeout(_)) => {
                        self.alert_and_drop();
                        Ok(())
                    }
                    Err(SendTimeoutError::Disconnected(_)) => {
                        Err(LoggerError::appender_stopped(self.base.name()))
                    }
                }
            }
            OverflowPolicy::AlertAndDrop => {
                self.alert_and_drop();
                Ok(())
            }
        }
    }

    /// Evicts queued events from the head until the new one fits.
    fn drop_oldest(&self, sender: &Sender<Command>, event: LogEvent) -> Result<()> {
        let mut command = Command::Event(event);
        for _ in 0..MAX_EVICTIONS {
            match self.evictor.try_recv() {
                Ok(Command::Event(evicted)) => {
                    if evicted.level.priority() == LogPriority::Critical {
                        self.force_write(&evicted);
                    } else {
                        self.metrics.record_dropped();
                    }
                }
                Ok(Command::Flush(ack)) => {
                    flush_targets(&self.targets);
                    let _ = ack.send(());
                }
                Err(_) => {}
            }

            match sender.try_send(command) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Full(returned)) => command = returned,
                Err(TrySendError::Disconnected(_)) => {
                    return Err(LoggerError::appender_stopped(self.base.name()))
                }
            }
        }
        self.alert_and_drop();
        Ok(())
    }

    fn force_write(&self, event: &LogEvent) {
        self.metrics.record_critical_preserved();
        deliver(&self.targets, event, &self.metrics);
    }

    fn alert_and_drop(&self) {
        let dropped = self.metrics.record_dropped() + 1;
        if dropped == 1 || dropped % DROP_ALERT_INTERVAL == 0 {
            tracing::warn!(
                appender = %self.base.name(),
                dropped,
                "Async queue full, events dropped. Consider a larger queue or another overflow policy"
            );
            if let Some(ref callback) = self.on_overflow {
                callback(dropped);
            }
        }
    }
}

fn has_flush(batch: &[Command]) -> bool {
    batch.iter().any(|c| matches!(c, Command::Flush(_)))
}

fn deliver(targets: &[AppenderControl], event: &LogEvent, metrics: &DeliveryMetrics) {
    let mut failed = false;
    for control in targets {
        if let Err(e) = control.call(event) {
            tracing::error!(appender = %control.appender_name(), error = %e, "Async delivery failed");
            failed = true;
        }
    }
    if failed {
        metrics.record_dropped();
    } else {
        metrics.record_delivered();
    }
}

fn flush_targets(targets: &[AppenderControl]) {
    for control in targets {
        if let Err(e) = control.appender().flush() {
            tracing::error!(appender = %control.appender_name(), error = %e, "Flush failed");
        }
    }
}

impl Appender for AsyncAppender {
    fn append(&self, event: &LogEvent) -> Result<()> {
        let guard = self.sender.read();
        let sender = guard
            .as_ref()
            .ok_or_else(|| LoggerError::appender_stopped(self.base.name()))?;

        match sender.try_send(Command::Event(event.clone())) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(Command::Event(event))) => self.handle_overflow(sender, event),
            Err(TrySendError::Full(Command::Flush(_))) => Ok(()),
            Err(TrySendError::Disconnected(_)) => Err(LoggerError::appender_stopped(self.base.name())),
        }
    }

    /// Waits until everything queued before this call has been written.
    fn flush(&self) -> Result<()> {
        let (ack_tx, ack_rx) = bounded(1);
        {
            let guard = self.sender.read();
            match guard.as_ref() {
                Some(sender) => sender
                    .send(Command::Flush(ack_tx))
                    .map_err(|_| LoggerError::appender_stopped(self.base.name()))?,
                None => {
                    flush_targets(&self.targets);
                    return Ok(());
                }
            }
        }
        ack_rx
            .recv_timeout(DEFAULT_SHUTDOWN_TIMEOUT)
            .map_err(|_| LoggerError::other(format!("Flush of '{}' timed out", self.base.name())))
    }

    fn name(&self) -> &str {
        self.base.name()
    }

    fn filter(&self) -> Option<&Arc<dyn Filter>> {
        self.base.filter()
    }

    /// Drains the queue into the referenced appenders. The referenced
    /// appenders themselves are left running.
    fn stop(&self, timeout: Duration) -> bool {
        if !self.base.mark_stopped() {
            return true;
        }
        drop(self.sender.write().take());

        let joined = match self.worker.lock().take() {
            Some(handle) => join_with_timeout(handle, timeout),
            None => true,
        };
        if !joined {
            tracing::warn!(
                appender = %self.base.name(),
                queued = self.evictor.len(),
                "Async worker did not finish within timeout, some events may be lost"
            );
        }
        joined
    }

    fn is_started(&self) -> bool {
        self.base.is_started()
    }
}

impl Drop for AsyncAppender {
    fn drop(&mut self) {
        Appender::stop(self, DEFAULT_SHUTDOWN_TIMEOUT);
    }
}

/// Builder for [`AsyncAppender`]
pub struct AsyncAppenderBuilder {
    name: String,
    targets: Vec<AppenderControl>,
    queue_size: usize,
    policy: OverflowPolicy,
    on_overflow: Option<OverflowCallback>,
    filter: Option<Arc<dyn Filter>>,
}

impl AsyncAppenderBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            targets: Vec::new(),
            queue_size: DEFAULT_QUEUE_SIZE,
            policy: OverflowPolicy::default(),
            on_overflow: None,
            filter: None,
        }
    }

    #[must_use]
    pub fn appender(self, appender: Arc<dyn Appender>) -> Self {
        self.control(AppenderControl::new(appender, None))
    }

    #[must_use]
    pub fn control(mut self, control: AppenderControl) -> Self {
        self.targets.push(control);
        self
    }

    #[must_use]
    pub fn queue_size(mut self, queue_size: usize) -> Self {
        self.queue_size = queue_size;
        self
    }

    #[must_use]
    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Called with the running drop count on the first drop and every
    /// thousandth after that
    #[must_use]
    pub fn on_overflow(mut self, callback: OverflowCallback) -> Self {
        self.on_overflow = Some(callback);
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn build(self) -> Result<AsyncAppender> {
        if self.queue_size == 0 {
            return Err(LoggerError::config("Async", "bufferSize must be greater than zero"));
        }
        if self.targets.is_empty() {
            return Err(LoggerError::config(
                "Async",
                format!("Appender '{}' references no appenders", self.name),
            ));
        }

        let (sender, receiver) = bounded(self.queue_size);
        let targets = Arc::new(self.targets);
        let metrics = Arc::new(DeliveryMetrics::new());

        let worker = {
            let receiver = receiver.clone();
            let targets = Arc::clone(&targets);
            let metrics = Arc::clone(&metrics);
            thread::Builder::new()
                .name(format!("{}-async", self.name))
                .spawn(move || AsyncAppender::run_worker(receiver, targets, metrics))
                .map_err(|e| LoggerError::io_operation("spawning async worker", &self.name, e))?
        };

        Ok(AsyncAppender {
            base: AppenderBase::new(self.name, self.filter),
            sender: RwLock::new(Some(sender)),
            evictor: receiver,
            worker: Mutex::new(Some(worker)),
            targets,
            queue_size: self.queue_size,
            policy: self.policy,
            on_overflow: self.on_overflow,
            metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Level;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Records messages; while `gate` is held, appends block.
    struct Gated {
        gate: Arc<Mutex<()>>,
        seen: Mutex<Vec<String>>,
    }

    impl Gated {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                gate: Arc::new(Mutex::new(())),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn messages(&self) -> Vec<String> {
            self.seen.lock().clone()
        }
    }

    impl Appender for Gated {
        fn append(&self, event: &LogEvent) -> Result<()> {
            let _open = self.gate.lock();
            self.seen.lock().push(event.message.clone());
            Ok(())
        }

        fn name(&self) -> &str {
            "gated"
        }
    }

    fn event(level: Level, message: &str) -> LogEvent {
        LogEvent::new("async", level, message)
    }

    /// Parks the worker inside the target so the queue fills up
    /// deterministically.
    fn park_worker(appender: &AsyncAppender, target: &Gated) {
        appender.append(&event(Level::INFO, "parked")).unwrap();
        while appender.queued() > 0 {
            thread::sleep(Duration::from_millis(1));
        }
        // The worker now either sleeps in the batch window or waits on the gate.
        thread::sleep(BATCH_TIMEOUT * 3);
        assert!(target.messages().is_empty());
    }

    #[test]
    fn test_delivers_in_order_and_flushes() {
        let target = Gated::new();
        let appender = AsyncAppender::builder("async")
            .appender(target.clone())
            .build()
            .unwrap();

        for i in 0..120 {
            appender.append(&event(Level::INFO, &format!("m{}", i))).unwrap();
        }
        appender.flush().unwrap();

        let seen = target.messages();
        assert_eq!(seen.len(), 120);
        assert_eq!(seen[0], "m0");
        assert_eq!(seen[119], "m119");
        assert_eq!(appender.metrics().delivered_count(), 120);
    }

    #[test]
    fn test_drop_newest_keeps_queue_head() {
        let target = Gated::new();
        let appender = AsyncAppender::builder("async")
            .appender(target.clone())
            .queue_size(2)
            .overflow_policy(OverflowPolicy::DropNewest)
            .build()
            .unwrap();

        let gate = target.gate.lock();
        park_worker(&appender, &target);
        for i in 0..5 {
            appender.append(&event(Level::DEBUG, &format!("m{}", i))).unwrap();
        }
        drop(gate);
        appender.flush().unwrap();

        assert_eq!(target.messages(), vec!["parked", "m0", "m1"]);
        assert_eq!(appender.metrics().dropped_count(), 3);
        assert_eq!(appender.metrics().queue_full_events(), 3);
    }

    #[test]
    fn test_drop_oldest_keeps_queue_tail() {
        let target = Gated::new();
        let appender = AsyncAppender::builder("async")
            .appender(target.clone())
            .queue_size(2)
            .overflow_policy(OverflowPolicy::DropOldest)
            .build()
            .unwrap();

        let gate = target.gate.lock();
        park_worker(&appender, &target);
        for i in 0..5 {
            appender.append(&event(Level::DEBUG, &format!("m{}", i))).unwrap();
        }
        drop(gate);
        appender.flush().unwrap();

        assert_eq!(target.messages(), vec!["parked", "m3", "m4"]);
        assert_eq!(appender.metrics().dropped_count(), 3);
    }

    #[test]
    fn test_critical_events_survive_overflow() {
        let target = Gated::new();
        let appender = Arc::new(
            AsyncAppender::builder("async")
                .appender(target.clone())
                .queue_size(1)
                .overflow_policy(OverflowPolicy::DropNewest)
                .build()
                .unwrap(),
        );

        let gate = target.gate.lock();
        park_worker(&appender, &target);
        appender.append(&event(Level::DEBUG, "queued")).unwrap();
        appender.append(&event(Level::DEBUG, "dropped")).unwrap();

        // Written on the caller's thread, so it waits for the gate too.
        let writer = {
            let appender = Arc::clone(&appender);
            thread::spawn(move || appender.append(&event(Level::ERROR, "critical")).unwrap())
        };
        drop(gate);
        writer.join().unwrap();
        appender.flush().unwrap();

        let seen = target.messages();
        assert!(seen.contains(&"critical".to_string()));
        assert!(!seen.contains(&"dropped".to_string()));
        assert_eq!(appender.metrics().critical_preserved(), 1);
    }

    #[test]
    fn test_alert_callback_on_first_drop() {
        let target = Gated::new();
        let alerts = Arc::new(AtomicU64::new(0));
        let appender = {
            let alerts = Arc::clone(&alerts);
            AsyncAppender::builder("async")
                .appender(target.clone())
                .queue_size(1)
                .on_overflow(Arc::new(move |count| {
                    alerts.store(count, Ordering::SeqCst);
                }))
                .build()
                .unwrap()
        };

        let gate = target.gate.lock();
        park_worker(&appender, &target);
        appender.append(&event(Level::INFO, "queued")).unwrap();
        appender.append(&event(Level::INFO, "dropped")).unwrap();
        drop(gate);

        assert_eq!(alerts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_block_waits_for_space() {
        let target = Gated::new();
        let appender = AsyncAppender::builder("async")
            .appender(target.clone())
            .queue_size(1)
            .overflow_policy(OverflowPolicy::Block)
            .build()
            .unwrap();

        for i in 0..20 {
            appender.append(&event(Level::INFO, &format!("m{}", i))).unwrap();
        }
        appender.flush().unwrap();

        assert_eq!(target.messages().len(), 20);
        assert_eq!(appender.metrics().dropped_count(), 0);
    }

    #[test]
    fn test_stop_drains_queue() {
        let target = Gated::new();
        let appender = AsyncAppender::builder("async")
            .appender(target.clone())
            .build()
            .unwrap();

        for i in 0..10 {
            appender.append(&event(Level::INFO, &format!("m{}", i))).unwrap();
        }
        assert!(appender.stop(Duration::from_secs(2)));
        assert_eq!(target.messages().len(), 10);
        assert!(matches!(
            appender.append(&event(Level::INFO, "late")),
            Err(LoggerError::AppenderStopped { .. })
        ));
        assert!(appender.stop(Duration::from_secs(2)));
    }

    #[test]
    fn test_build_requires_targets() {
        assert!(AsyncAppender::builder("async").build().is_err());
        assert!(AsyncAppender::builder("async")
            .appender(Gated::new())
            .queue_size(0)
            .build()
            .is_err());
    }
}
