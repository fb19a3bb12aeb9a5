//! Stress tests for concurrent delivery and shared resources
//!
//! These tests verify:
//! - Error events are never dropped by the async appender under heavy load
//! - Every event is delivered exactly once when the queue blocks
//! - Logger lookups stay consistent while loggers are reclaimed
//! - Manager reference counts survive concurrent acquire/release
//! - No event is lost while the context is reconfigured under load

use parking_lot::Mutex;
use rust_logging_core::config::{
    BuildContext, Component, ConfigurationBuilder, Node, PluginCategory, PluginObject,
    PluginRegistry,
};
use rust_logging_core::{
    Appender, AsyncAppender, Level, LogEvent, LoggerContext, LoggerError, Manager,
    ManagerRegistry, OverflowPolicy, Result,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Collects messages, optionally slowly, to force queue overflow
struct SlowCollector {
    delay: Duration,
    messages: Mutex<Vec<(Level, String)>>,
}

impl SlowCollector {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            messages: Mutex::new(Vec::new()),
        })
    }

    fn count_at(&self, level: Level) -> usize {
        self.messages.lock().iter().filter(|(l, _)| *l == level).count()
    }
}

impl Appender for SlowCollector {
    fn append(&self, event: &LogEvent) -> Result<()> {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        self.messages.lock().push((event.level, event.message.clone()));
        Ok(())
    }

    fn name(&self) -> &str {
        "collector"
    }
}

/// Test that critical events (ERROR, FATAL) are never dropped under heavy load
#[test]
fn test_critical_events_never_dropped() {
    let collector = SlowCollector::new(Duration::from_micros(200));
    let appender = AsyncAppender::builder("stress")
        .appender(collector.clone())
        .queue_size(4)
        .overflow_policy(OverflowPolicy::DropNewest)
        .build()
        .unwrap();

    for i in 0..200 {
        appender.append(&LogEvent::new("stress", Level::DEBUG, format!("Debug {}", i))).unwrap();
        if i % 20 == 0 {
            appender.append(&LogEvent::new("stress", Level::ERROR, format!("Error {}", i))).unwrap();
        }
    }
    appender.append(&LogEvent::new("stress", Level::FATAL, "Fatal")).unwrap();

    assert!(appender.stop(Duration::from_secs(10)));

    assert_eq!(collector.count_at(Level::ERROR), 10, "All errors must be preserved");
    assert_eq!(collector.count_at(Level::FATAL), 1);
    assert!(appender.metrics().dropped_count() > 0, "Queue should have overflowed");
    assert_eq!(
        collector.count_at(Level::DEBUG) as u64 + appender.metrics().dropped_count(),
        200
    );
}

/// Test that DropOldest never evicts a critical event
#[test]
fn test_drop_oldest_preserves_critical_events() {
    let collector = SlowCollector::new(Duration::from_micros(100));
    let appender = AsyncAppender::builder("evict")
        .appender(collector.clone())
        .queue_size(2)
        .overflow_policy(OverflowPolicy::DropOldest)
        .build()
        .unwrap();

    for i in 0..100 {
        let level = if i % 10 == 0 { Level::ERROR } else { Level::INFO };
        appender.append(&LogEvent::new("evict", level, format!("Event {}", i))).unwrap();
    }
    assert!(appender.stop(Duration::from_secs(10)));

    assert_eq!(collector.count_at(Level::ERROR), 10);
}

/// Test that the blocking policy delivers every event from many threads
#[test]
fn test_concurrent_blocking_delivery() {
    let collector = SlowCollector::new(Duration::ZERO);
    let appender = Arc::new(
        AsyncAppender::builder("block")
            .appender(collector.clone())
            .queue_size(8)
            .overflow_policy(OverflowPolicy::Block)
            .build()
            .unwrap(),
    );

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let appender = Arc::clone(&appender);
            thread::spawn(move || {
                for i in 0..250 {
                    let event = LogEvent::new("block", Level::INFO, format!("t{}-{}", t, i));
                    appender.append(&event).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    appender.flush().unwrap();
    assert_eq!(collector.messages.lock().len(), 2000);
    assert_eq!(appender.metrics().dropped_count(), 0);

    // Per-thread order is preserved
    let messages = collector.messages.lock();
    for t in 0..8 {
        let prefix = format!("t{}-", t);
        let seq: Vec<usize> = messages
            .iter()
            .filter_map(|(_, m)| m.strip_prefix(&prefix))
            .map(|n| n.parse().unwrap())
            .collect();
        assert_eq!(seq, (0..250).collect::<Vec<_>>());
    }
}

/// Test logger lookups racing with reclamation of unused loggers
#[test]
fn test_logger_churn() {
    let context = Arc::new(LoggerContext::new("churn"));
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let context = Arc::clone(&context);
            thread::spawn(move || {
                for i in 0..500 {
                    let name = format!("svc.{}", (i + t) % 16);
                    let logger = context.get_logger(&name);
                    assert_eq!(logger.name(), name);
                    // Dropped at the end of each iteration; may be reclaimed
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let held = context.get_logger("svc.3");
    assert!(Arc::ptr_eq(&held, &context.get_logger("svc.3")));
    assert!(context.has_logger("svc.3"));
}

struct CountingManager {
    name: String,
    released: Arc<AtomicUsize>,
}

impl Manager for CountingManager {
    fn name(&self) -> &str {
        &self.name
    }

    fn release(&self, _timeout: Duration) -> bool {
        self.released.fetch_add(1, Ordering::SeqCst);
        true
    }
}

/// Test that concurrent acquire/release creates and releases each manager
/// generation exactly once
#[test]
fn test_manager_registry_concurrency() {
    let registry = ManagerRegistry::new();
    let created = Arc::new(AtomicUsize::new(0));
    let released = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = registry.clone();
            let created = Arc::clone(&created);
            let released = Arc::clone(&released);
            thread::spawn(move || {
                let factory = |name: &str, _: ()| -> Result<CountingManager> {
                    created.fetch_add(1, Ordering::SeqCst);
                    Ok(CountingManager {
                        name: name.to_string(),
                        released: Arc::clone(&released),
                    })
                };
                for _ in 0..200 {
                    let handle = registry
                        .get_manager("shared", (), &factory)
                        .ok_or_else(|| LoggerError::manager_unavailable("shared"))
                        .unwrap();
                    assert_eq!(handle.name(), "shared");
                    assert!(handle.close(Duration::from_secs(1)));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert!(!registry.has_manager("shared"));
    assert_eq!(registry.reference_count("shared"), 0);
    assert!(created.load(Ordering::SeqCst) >= 1);
    assert_eq!(
        created.load(Ordering::SeqCst),
        released.load(Ordering::SeqCst),
        "every created manager is released exactly once"
    );
}

/// Counts into a total shared by every instance; refuses events once stopped
struct CountingAppender {
    name: String,
    total: Arc<AtomicUsize>,
    stopped: AtomicBool,
}

impl Appender for CountingAppender {
    fn append(&self, _event: &LogEvent) -> Result<()> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(LoggerError::appender_stopped(&self.name));
        }
        self.total.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn stop(&self, _timeout: Duration) -> bool {
        self.stopped.store(true, Ordering::SeqCst);
        true
    }

    fn is_started(&self) -> bool {
        !self.stopped.load(Ordering::SeqCst)
    }
}

fn counting_plugins(total: &Arc<AtomicUsize>) -> Arc<PluginRegistry> {
    let plugins = PluginRegistry::with_core_plugins();
    let total = Arc::clone(total);
    plugins.register_fn(
        "Counting",
        PluginCategory::Appender,
        move |node: &Node, _children: Vec<PluginObject>, ctx: &mut BuildContext| {
            let name = ctx.required_attr(node, "name")?;
            Ok(PluginObject::Appender(Arc::new(CountingAppender {
                name,
                total: Arc::clone(&total),
                stopped: AtomicBool::new(false),
            })))
        },
    );
    Arc::new(plugins)
}

fn counting_component() -> Component {
    let builder = ConfigurationBuilder::new().name("counting");
    let counter = builder.new_appender("Counter", "Counting");
    let root = builder
        .new_root_logger(Level::INFO)
        .add_component(builder.new_appender_ref("Counter"));
    builder.add_appender(counter).add_root_logger(root).build_component()
}

/// Test that events logged while the configuration is being replaced reach
/// either the old or the new configuration
#[test]
fn test_reconfigure_under_load_loses_nothing() {
    let total = Arc::new(AtomicUsize::new(0));
    let context = Arc::new(LoggerContext::with_plugins("reload", counting_plugins(&total)));
    context.reconfigure(counting_component()).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let context = Arc::clone(&context);
            thread::spawn(move || {
                let logger = context.get_logger(&format!("reload.t{}", t));
                for i in 0..5000 {
                    logger.info(format!("event {}", i));
                }
            })
        })
        .collect();

    for _ in 0..200 {
        context.reconfigure(counting_component()).unwrap();
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(total.load(Ordering::SeqCst), 20_000);
}
