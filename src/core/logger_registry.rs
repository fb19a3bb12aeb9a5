//! Registry of loggers keyed by name and message factory.
//!
//! Entries hold [`Weak`] references: the registry never keeps a logger alive
//! by itself. A logger nobody holds is treated as absent and is rebuilt on the
//! next lookup. Dead entries for a name are purged whenever that name is
//! written, and [`LoggerRegistry::purge`] sweeps the whole map.

use super::message::{same_factory, MessageFactory};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// What the registry needs to know about the loggers it stores.
pub trait RegisteredLogger: Send + Sync {
    fn name(&self) -> &str;

    fn message_factory(&self) -> &Arc<dyn MessageFactory>;
}

struct Entry<T> {
    factory: Arc<dyn MessageFactory>,
    logger: Weak<T>,
}

pub struct LoggerRegistry<T: RegisteredLogger> {
    loggers: RwLock<HashMap<String, Vec<Entry<T>>>>,
    default_factory: Arc<dyn MessageFactory>,
}

impl<T: RegisteredLogger> LoggerRegistry<T> {
    /// `default_factory` is used whenever a lookup passes no factory.
    pub fn new(default_factory: Arc<dyn MessageFactory>) -> Self {
        Self {
            loggers: RwLock::new(HashMap::new()),
            default_factory,
        }
    }

    pub fn default_factory(&self) -> &Arc<dyn MessageFactory> {
        &self.default_factory
    }

    fn effective<'a>(
        &'a self,
        factory: Option<&'a Arc<dyn MessageFactory>>,
    ) -> &'a Arc<dyn MessageFactory> {
        factory.unwrap_or(&self.default_factory)
    }

    fn find_live(
        map: &HashMap<String, Vec<Entry<T>>>,
        name: &str,
        factory: &Arc<dyn MessageFactory>,
    ) -> Option<Arc<T>> {
        map.get(name)?
            .iter()
            .filter(|entry| same_factory(&entry.factory, factory))
            .find_map(|entry| entry.logger.upgrade())
    }

    /// Returns the live logger registered for `(name, factory)`.
    pub fn get_logger(
        &self,
        name: &str,
        factory: Option<&Arc<dyn MessageFactory>>,
    ) -> Option<Arc<T>> {
        let factory = self.effective(factory);
        Self::find_live(&self.loggers.read(), name, factory)
    }

    pub fn has_logger(&self, name: &str, factory: Option<&Arc<dyn MessageFactory>>) -> bool {
        self.get_logger(name, factory).is_some()
    }

    /// True if any live logger with this name uses a factory whose
    /// [`MessageFactory::name`] equals `factory_name`.
    pub fn has_logger_with_factory_named(&self, name: &str, factory_name: &str) -> bool {
        self.loggers.read().get(name).is_some_and(|entries| {
            entries
                .iter()
                .any(|e| e.factory.name() == factory_name && e.logger.strong_count() > 0)
        })
    }

    /// Snapshot of all live loggers. Safe to iterate while other threads
    /// keep registering.
    pub fn get_loggers(&self) -> Vec<Arc<T>> {
        self.loggers
            .read()
            .values()
            .flat_map(|entries| entries.iter().filter_map(|e| e.logger.upgrade()))
            .collect()
    }

    /// Returns the registered logger for `(name, factory)`, building one with
    /// `supplier` if none is alive.
    ///
    /// The supplier runs without any registry lock held, so it may itself
    /// look up other loggers. When several threads race, the first insert
    /// wins; losers get the winner's instance and their own is dropped.
    pub fn compute_if_absent<F>(
        &self,
        name: &str,
        factory: Option<&Arc<dyn MessageFactory>>,
        supplier: F,
    ) -> Arc<T>
    where
        F: FnOnce(&str, &Arc<dyn MessageFactory>) -> Arc<T>,
    {
        let factory = self.effective(factory).clone();

        if let Some(logger) = Self::find_live(&self.loggers.read(), name, &factory) {
            return logger;
        }

        let logger = supplier(name, &factory);

        let logger_name = logger.name().to_string();
        let logger_factory = Arc::clone(logger.message_factory());
        if logger_name != name || !same_factory(&logger_factory, &factory) {
            tracing::warn!(
                requested_name = name,
                requested_factory = factory.name(),
                logger_name = %logger_name,
                logger_factory = logger_factory.name(),
                "Newly built logger reports a different identity than requested; \
                 registering it under the requested name"
            );
        }

        let mut map = self.loggers.write();
        if let Some(existing) = Self::find_live(&map, name, &logger_factory) {
            return existing;
        }

        let entries = map.entry(name.to_string()).or_default();
        entries.retain(|e| e.logger.strong_count() > 0);
        entries.push(Entry {
            factory: logger_factory,
            logger: Arc::downgrade(&logger),
        });
        logger
    }

    /// Removes entries whose loggers have been dropped.
    pub fn purge(&self) -> usize {
        let mut map = self.loggers.write();
        let mut removed = 0;
        map.retain(|_, entries| {
            let before = entries.len();
            entries.retain(|e| e.logger.strong_count() > 0);
            removed += before - entries.len();
            !entries.is_empty()
        });
        removed
    }

    /// Number of registered entries, live or not yet purged.
    pub fn len(&self) -> usize {
        self.loggers.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::{ParameterizedMessageFactory, SimpleMessageFactory};
    use parking_lot::Mutex;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TestLogger {
        name: String,
        factory: Arc<dyn MessageFactory>,
    }

    impl RegisteredLogger for TestLogger {
        fn name(&self) -> &str {
            &self.name
        }

        fn message_factory(&self) -> &Arc<dyn MessageFactory> {
            &self.factory
        }
    }

    fn registry() -> LoggerRegistry<TestLogger> {
        LoggerRegistry::new(Arc::new(ParameterizedMessageFactory))
    }

    fn build(name: &str, factory: &Arc<dyn MessageFactory>) -> Arc<TestLogger> {
        Arc::new(TestLogger {
            name: name.to_string(),
            factory: Arc::clone(factory),
        })
    }

    #[test]
    fn test_compute_if_absent_caches() {
        let registry = registry();
        let calls = AtomicUsize::new(0);

        let first = registry.compute_if_absent("app", None, |n, f| {
            calls.fetch_add(1, Ordering::SeqCst);
            build(n, f)
        });
        let second = registry.compute_if_absent("app", None, |n, f| {
            calls.fetch_add(1, Ordering::SeqCst);
            build(n, f)
        });

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(registry.has_logger("app", None));
    }

    #[test]
    fn test_factory_is_part_of_identity() {
        let registry = registry();
        let simple: Arc<dyn MessageFactory> = Arc::new(SimpleMessageFactory);

        let default = registry.compute_if_absent("app", None, build);
        let other = registry.compute_if_absent("app", Some(&simple), build);

        assert!(!Arc::ptr_eq(&default, &other));
        assert_eq!(registry.get_loggers().len(), 2);
        assert!(registry.has_logger_with_factory_named("app", "SimpleMessageFactory"));
    }

    #[test]
    fn test_dropped_logger_is_rebuilt() {
        let registry = registry();
        drop(registry.compute_if_absent("app", None, build));

        assert!(registry.get_logger("app", None).is_none());
        assert!(registry.get_loggers().is_empty());

        let rebuilt = registry.compute_if_absent("app", None, build);
        assert_eq!(rebuilt.name(), "app");
        // The dead entry was purged on insert
        assert_eq!(registry.len(), 1);
    }

    /// Buffer shared with a test subscriber
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    #[test]
    fn test_mismatched_identity_registered_under_requested_name() {
        let registry = registry();
        let calls = AtomicUsize::new(0);
        let mismatched = |_: &str, f: &Arc<dyn MessageFactory>| {
            calls.fetch_add(1, Ordering::SeqCst);
            build("actual", f)
        };

        let first = registry.compute_if_absent("requested", None, mismatched);
        let second = registry.compute_if_absent("requested", None, mismatched);

        assert_eq!(first.name(), "actual");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(registry.has_logger("requested", None));
        assert!(!registry.has_logger("actual", None));
    }

    #[test]
    fn test_mismatched_identity_is_warned() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let registry = registry();
        tracing::subscriber::with_default(subscriber, || {
            registry.compute_if_absent("requested", None, |_, f| build("actual", f));
            registry.compute_if_absent("other", None, build);
        });

        let output = captured.contents();
        assert!(output.contains("WARN"), "{}", output);
        assert!(output.contains("different identity than requested"), "{}", output);
        assert!(output.contains("logger_name=actual"), "{}", output);
        assert_eq!(output.lines().count(), 1, "a matching logger is not warned about");
    }

    #[test]
    fn test_purge() {
        let registry = registry();
        let keep = registry.compute_if_absent("keep", None, build);
        drop(registry.compute_if_absent("gone", None, build));

        assert_eq!(registry.purge(), 1);
        assert_eq!(registry.len(), 1);
        drop(keep);
    }
}
