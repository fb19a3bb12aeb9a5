//! Fixed-capacity ring buffer used to batch events for deferred delivery.

use parking_lot::Mutex;
use std::collections::VecDeque;

/// Bounded FIFO that overwrites its oldest element when full.
///
/// `add` and `remove_all` serialize on one lock, so a drain sees every add
/// that completed before it and none that started after it. Two concurrent
/// drains never return the same element; the later one observes whatever
/// was added in between, which may be nothing.
///
/// # Example
///
/// ```
/// use rust_logging_core::CyclicBuffer;
///
/// let buffer = CyclicBuffer::new(2);
/// buffer.add(1);
/// buffer.add(2);
/// buffer.add(3);
///
/// assert_eq!(buffer.remove_all(), vec![2, 3]);
/// assert!(buffer.is_empty());
/// ```
#[derive(Debug)]
pub struct CyclicBuffer<T> {
    items: Mutex<VecDeque<T>>,
    capacity: usize,
}

impl<T> CyclicBuffer<T> {
    /// A capacity of zero yields a buffer that discards everything.
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends `item`, evicting the oldest element if the buffer is full.
    /// Returns the evicted element.
    pub fn add(&self, item: T) -> Option<T> {
        if self.capacity == 0 {
            return Some(item);
        }
        let mut items = self.items.lock();
        let evicted = if items.len() == self.capacity {
            items.pop_front()
        } else {
            None
        };
        items.push_back(item);
        evicted
    }

    /// Empties the buffer, returning its contents oldest first.
    pub fn remove_all(&self) -> Vec<T> {
        let drained = std::mem::replace(
            &mut *self.items.lock(),
            VecDeque::with_capacity(self.capacity),
        );
        drained.into()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}
