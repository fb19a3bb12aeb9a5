//! Reference-counted registry of shared I/O managers.
//!
//! Appenders never own sockets or mail sessions directly. They ask the
//! [`ManagerRegistry`] for a manager under a key derived from the connection
//! parameters (`"TCP:host:port"`), and every appender asking for the same key
//! shares one instance. Each successful lookup returns a [`ManagerHandle`]
//! and bumps the key's reference count; closing (or dropping) the handle
//! decrements it, and the last close removes the entry and calls
//! [`Manager::release`] exactly once.
//!
//! Creation runs under a per-key lock, never under the registry lock, so a
//! slow connect for one key does not stall lookups of another, and the
//! factory runs at most once per live entry.

pub mod reconnect;

#[cfg(feature = "network")]
pub mod datagram;
#[cfg(feature = "smtp")]
pub mod smtp;
#[cfg(feature = "network")]
pub mod tcp;

use crate::core::Result;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Timeout used when a handle is released by `Drop` rather than an explicit
/// `close`.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// A shared resource that can be handed out by the registry.
pub trait Manager: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Releases the underlying resource. Called once, after the last handle
    /// has been closed. Returns false if release did not finish in time.
    fn release(&self, timeout: Duration) -> bool;
}

/// Builds a manager for a key the first time it is requested.
pub trait ManagerFactory<M, D> {
    fn create_manager(&self, name: &str, data: D) -> Result<M>;
}

impl<M, D, F> ManagerFactory<M, D> for F
where
    F: Fn(&str, D) -> Result<M>,
{
    fn create_manager(&self, name: &str, data: D) -> Result<M> {
        self(name, data)
    }
}

#[derive(Default)]
struct SlotState {
    manager: Option<Arc<dyn Any + Send + Sync>>,
    release: Option<Arc<dyn Manager>>,
    count: usize,
    // Set once the slot has been removed from the map; lookups that still
    // hold it must start over.
    retired: bool,
}

#[derive(Default)]
struct Slot {
    state: Mutex<SlotState>,
}

#[derive(Default)]
struct RegistryInner {
    slots: RwLock<HashMap<String, Arc<Slot>>>,
}

/// Explicit, shareable registry of managers. Clones share the same map.
#[derive(Clone, Default)]
pub struct ManagerRegistry {
    inner: Arc<RegistryInner>,
}

impl ManagerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, name: &str) -> Arc<Slot> {
        if let Some(slot) = self.inner.slots.read().get(name) {
            return Arc::clone(slot);
        }
        let mut slots = self.inner.slots.write();
        Arc::clone(slots.entry(name.to_string()).or_default())
    }

    fn remove_slot(&self, name: &str, slot: &Arc<Slot>) {
        let mut slots = self.inner.slots.write();
        if slots.get(name).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            slots.remove(name);
        }
    }

    /// Returns a handle to the manager registered under `name`, creating it
    /// with `factory` if there is none.
    ///
    /// Returns `None` when creation fails or when the existing manager is of
    /// a different type; both are logged. Callers treat `None` as "resource
    /// unavailable" and do not retry at this layer.
    pub fn get_manager<M, D, F>(&self, name: &str, data: D, factory: &F) -> Option<ManagerHandle<M>>
    where
        M: Manager,
        F: ManagerFactory<M, D> + ?Sized,
    {
        let mut data = Some(data);
        loop {
            let slot = self.slot(name);
            let mut state = slot.state.lock();
            if state.retired {
                continue;
            }

            if state.manager.is_none() {
                let data = data.take()?;
                match factory.create_manager(name, data) {
                    Ok(manager) => {
                        let manager = Arc::new(manager);
                        state.manager = Some(manager.clone() as Arc<dyn Any + Send + Sync>);
                        state.release = Some(manager as Arc<dyn Manager>);
                    }
                    Err(e) => {
                        tracing::error!(manager = name, error = %e, "Unable to create manager");
                        state.retired = true;
                        drop(state);
                        self.remove_slot(name, &slot);
                        return None;
                    }
                }
            }

            let any = state.manager.clone()?;
            return match any.downcast::<M>() {
                Ok(manager) => {
                    state.count += 1;
                    drop(state);
                    Some(ManagerHandle {
                        manager,
                        name: name.to_string(),
                        slot,
                        registry: self.clone(),
                        closed: AtomicBool::new(false),
                    })
                }
                Err(_) => {
                    tracing::error!(
                        manager = name,
                        requested = std::any::type_name::<M>(),
                        "Existing manager is of a different type"
                    );
                    None
                }
            };
        }
    }

    fn release_slot(&self, name: &str, slot: &Arc<Slot>, timeout: Duration) -> bool {
        let mut state = slot.state.lock();
        state.count = state.count.saturating_sub(1);
        if state.count > 0 || state.retired {
            return true;
        }

        state.retired = true;
        state.manager = None;
        let manager = state.release.take();
        drop(state);

        self.remove_slot(name, slot);
        tracing::debug!(manager = name, "Releasing manager");
        manager.map_or(true, |m| m.release(timeout))
    }

    pub fn has_manager(&self, name: &str) -> bool {
        self.reference_count(name) > 0
    }

    /// Open handles for `name`, zero if it is not registered.
    pub fn reference_count(&self, name: &str) -> usize {
        self.inner
            .slots
            .read()
            .get(name)
            .map_or(0, |slot| slot.state.lock().count)
    }

    /// Keys with a live manager.
    pub fn manager_names(&self) -> Vec<String> {
        self.inner
            .slots
            .read()
            .iter()
            .filter(|(_, slot)| slot.state.lock().manager.is_some())
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn manager_count(&self) -> usize {
        self.manager_names().len()
    }
}

impl fmt::Debug for ManagerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerRegistry")
            .field("managers", &self.manager_names())
            .finish()
    }
}

/// A counted reference to a shared manager.
///
/// Dereferences to the manager. `close` is idempotent and also runs on drop.
pub struct ManagerHandle<M: Manager> {
    manager: Arc<M>,
    name: String,
    slot: Arc<Slot>,
    registry: ManagerRegistry,
    closed: AtomicBool,
}

impl<M: Manager> ManagerHandle<M> {
    /// The registry key this handle was obtained with
    pub fn key(&self) -> &str {
        &self.name
    }

    pub fn manager(&self) -> &Arc<M> {
        &self.manager
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Gives up this reference. Returns false only when this was the last
    /// reference and the manager failed to release within `timeout`.
    pub fn close(&self, timeout: Duration) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return true;
        }
        self.registry.release_slot(&self.name, &self.slot, timeout)
    }
}

impl<M: Manager> Deref for ManagerHandle<M> {
    type Target = M;

    fn deref(&self) -> &M {
        &self.manager
    }
}

impl<M: Manager> Drop for ManagerHandle<M> {
    fn drop(&mut self) {
        self.close(DEFAULT_SHUTDOWN_TIMEOUT);
    }
}

impl<M: Manager> fmt::Debug for ManagerHandle<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerHandle")
            .field("key", &self.name)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LoggerError;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;
    use std::thread;

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

    struct OtherManager;

    impl Manager for OtherManager {
        fn name(&self) -> &str {
            "other"
        }

        fn release(&self, _timeout: Duration) -> bool {
            true
        }
    }

    fn counting_factory(
        created: Arc<AtomicUsize>,
        released: Arc<AtomicUsize>,
    ) -> impl Fn(&str, ()) -> Result<CountingManager> {
        move |name: &str, _: ()| {
            created.fetch_add(1, Ordering::SeqCst);
            Ok(CountingManager {
                name: name.to_string(),
                released: Arc::clone(&released),
            })
        }
    }

    #[test]
    fn test_same_key_shares_instance() {
        let registry = ManagerRegistry::new();
        let created = Arc::new(AtomicUsize::new(0));
        let released = Arc::new(AtomicUsize::new(0));
        let factory = counting_factory(created.clone(), released.clone());

        let a = registry.get_manager("TCP:h:1", (), &factory).unwrap();
        let b = registry.get_manager("TCP:h:1", (), &factory).unwrap();

        assert!(Arc::ptr_eq(a.manager(), b.manager()));
        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert_eq!(registry.reference_count("TCP:h:1"), 2);

        assert!(a.close(DEFAULT_SHUTDOWN_TIMEOUT));
        assert!(a.close(DEFAULT_SHUTDOWN_TIMEOUT));
        assert_eq!(released.load(Ordering::SeqCst), 0);
        assert_eq!(registry.reference_count("TCP:h:1"), 1);

        drop(b);
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert!(!registry.has_manager("TCP:h:1"));
        assert_eq!(registry.manager_count(), 0);
    }

    #[test]
    fn test_distinct_keys_are_independent() {
        let registry = ManagerRegistry::new();
        let created = Arc::new(AtomicUsize::new(0));
        let released = Arc::new(AtomicUsize::new(0));
        let factory = counting_factory(created.clone(), released.clone());

        let a = registry.get_manager("TCP:h:1", (), &factory).unwrap();
        let b = registry.get_manager("TCP:h:2", (), &factory).unwrap();

        assert!(!Arc::ptr_eq(a.manager(), b.manager()));
        assert_eq!(created.load(Ordering::SeqCst), 2);
        assert_eq!(registry.manager_count(), 2);
    }

    #[test]
    fn test_recreated_after_last_close() {
        let registry = ManagerRegistry::new();
        let created = Arc::new(AtomicUsize::new(0));
        let released = Arc::new(AtomicUsize::new(0));
        let factory = counting_factory(created.clone(), released.clone());

        drop(registry.get_manager("k", (), &factory).unwrap());
        let again = registry.get_manager("k", (), &factory).unwrap();

        assert_eq!(created.load(Ordering::SeqCst), 2);
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert_eq!(again.key(), "k");
    }

    #[test]
    fn test_creation_failure_returns_none() {
        let registry = ManagerRegistry::new();
        let failing = |_: &str, _: ()| -> Result<CountingManager> {
            Err(LoggerError::other("host unreachable"))
        };

        assert!(registry.get_manager("TCP:nowhere:1", (), &failing).is_none());
        assert!(!registry.has_manager("TCP:nowhere:1"));
        assert_eq!(registry.manager_count(), 0);
    }

    #[test]
    fn test_type_mismatch_returns_none() {
        let registry = ManagerRegistry::new();
        let created = Arc::new(AtomicUsize::new(0));
        let released = Arc::new(AtomicUsize::new(0));
        let factory = counting_factory(created, released);
        let _held = registry.get_manager("k", (), &factory).unwrap();

        let other = |_: &str, _: ()| -> Result<OtherManager> { Ok(OtherManager) };
        assert!(registry.get_manager("k", (), &other).is_none());
        assert_eq!(registry.reference_count("k"), 1);
    }

    #[test]
    fn test_concurrent_first_access_creates_once() {
        let registry = ManagerRegistry::new();
        let created = Arc::new(AtomicUsize::new(0));
        let released = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                let barrier = Arc::clone(&barrier);
                let factory = counting_factory(created.clone(), released.clone());
                thread::spawn(move || {
                    barrier.wait();
                    registry.get_manager("TCP:shared:4560", (), &factory).unwrap()
                })
            })
            .collect();

        let managers: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert_eq!(registry.reference_count("TCP:shared:4560"), 8);
        assert!(managers
            .windows(2)
            .all(|w| Arc::ptr_eq(w[0].manager(), w[1].manager())));

        drop(managers);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
