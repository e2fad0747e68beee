//! Bounded replay broadcast.
//!
//! An append-only in-memory log: every new subscriber first receives the
//! retained history from its oldest entry, then live entries as they are
//! published. Only the newest `capacity` entries are retained; a
//! subscriber that falls behind the eviction point skips forward and
//! records how many entries it missed.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

pub const DEFAULT_REPLAY_CAPACITY: usize = 256;

struct Log<T> {
    entries: VecDeque<T>,
    /// Absolute offset of `entries[0]`.
    first_offset: u64,
}

impl<T> Log<T> {
    fn end_offset(&self) -> u64 {
        self.first_offset + self.entries.len() as u64
    }
}

struct Shared<T> {
    log: Mutex<Log<T>>,
    published: Notify,
    capacity: usize,
}

/// Shared handle to the log; clones publish into the same history.
pub struct ReplayLog<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for ReplayLog<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone> Default for ReplayLog<T> {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_REPLAY_CAPACITY)
    }
}

impl<T: Clone> ReplayLog<T> {
    /// A log retaining at most `capacity` entries (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            shared: Arc::new(Shared {
                log: Mutex::new(Log {
                    entries: VecDeque::with_capacity(capacity),
                    first_offset: 0,
                }),
                published: Notify::new(),
                capacity,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append `item`, evicting the oldest entry when full.
    pub fn publish(&self, item: T) {
        {
            let mut log = self.lock();
            if log.entries.len() == self.shared.capacity {
                log.entries.pop_front();
                log.first_offset += 1;
            }
            log.entries.push_back(item);
        }
        self.shared.published.notify_waiters();
    }

    /// A subscription that replays from the oldest retained entry.
    pub fn subscribe(&self) -> Subscription<T> {
        let first_offset = self.lock().first_offset;
        Subscription {
            log: self.clone(),
            next_offset: first_offset,
            lagged: 0,
        }
    }

    /// Retained entries, oldest first.
    pub fn snapshot(&self) -> Vec<T> {
        self.lock().entries.iter().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, Log<T>> {
        self.shared.log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cursor into a [`ReplayLog`].
pub struct Subscription<T> {
    log: ReplayLog<T>,
    next_offset: u64,
    lagged: u64,
}

impl<T: Clone> Subscription<T> {
    /// Next entry if one is already available.
    pub fn try_recv(&mut self) -> Option<T> {
        let log = self.log.lock();
        if self.next_offset < log.first_offset {
            self.lagged += log.first_offset - self.next_offset;
            self.next_offset = log.first_offset;
        }
        if self.next_offset >= log.end_offset() {
            return None;
        }

        let index = (self.next_offset - log.first_offset) as usize;
        let item = log.entries.get(index).cloned();
        if item.is_some() {
            self.next_offset += 1;
        }
        item
    }

    /// Wait for the next entry.
    pub async fn recv(&mut self) -> T {
        let shared = Arc::clone(&self.log.shared);
        loop {
            let notified = shared.published.notified();
            tokio::pin!(notified);
            // Register before checking so a publish in between is not lost
            notified.as_mut().enable();

            if let Some(item) = self.try_recv() {
                return item;
            }
            notified.await;
        }
    }

    /// Entries evicted before this subscription could read them.
    pub fn lagged(&self) -> u64 {
        self.lagged
    }
}
