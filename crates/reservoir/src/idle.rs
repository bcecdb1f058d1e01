//! Bounded container of idle connections.
//!
//! A `VecDeque` behind a mutex holds the items; a semaphore counts them so
//! that takers can wait without holding the lock. Permits are only added
//! after an item is pushed, so a taker holding a permit always finds an
//! item unless the container was closed and drained in between.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Semaphore;

struct Slots<T> {
    items: VecDeque<T>,
    closed: bool,
}

pub(crate) struct IdleQueue<T> {
    slots: Mutex<Slots<T>>,
    /// One permit per item in `slots.items`.
    available: Semaphore,
    capacity: usize,
}

impl<T> IdleQueue<T> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Mutex::new(Slots {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            available: Semaphore::new(0),
            capacity,
        }
    }

    /// Wait for an item and remove it.
    ///
    /// Returns `None` once the queue is closed. Cancel-safe: the item is
    /// removed in the same poll that obtains the permit.
    pub(crate) async fn take(&self) -> Option<T> {
        let permit = self.available.acquire().await.ok()?;
        permit.forget();
        self.slots.lock().items.pop_front()
    }

    /// Insert without waiting, handing the item back if full or closed.
    pub(crate) fn offer(&self, item: T) -> Result<(), T> {
        {
            let mut slots = self.slots.lock();
            if slots.closed || slots.items.len() >= self.capacity {
                return Err(item);
            }
            slots.items.push_back(item);
        }
        self.available.add_permits(1);
        Ok(())
    }

    /// Close the queue, wake every waiter and drain what is left.
    pub(crate) fn close(&self) -> Vec<T> {
        let mut slots = self.slots.lock();
        slots.closed = true;
        self.available.close();
        slots.items.drain(..).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.lock().items.len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }
}
