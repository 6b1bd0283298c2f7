//! Keyed trailing-edge debouncer.
//!
//! Each key owns at most one pending timer. Scheduling again for the same key
//! aborts the previous timer, so only the last scheduled action runs, once the
//! key has been quiet for the configured delay. A timer that has fired removes
//! itself before running its action, so a later schedule never aborts work
//! that is already in flight.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

struct PendingTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Timers {
    next_generation: u64,
    pending: HashMap<String, PendingTimer>,
}

pub struct Debouncer {
    delay: Duration,
    timers: Arc<Mutex<Timers>>,
}

fn lock(timers: &Mutex<Timers>) -> MutexGuard<'_, Timers> {
    timers.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            timers: Arc::new(Mutex::new(Timers::default())),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `action` after the key has been quiet for `delay`, replacing any
    /// timer already pending for `key`. Must be called inside a tokio runtime.
    pub fn schedule<F>(&self, key: &str, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut timers = lock(&self.timers);
        timers.next_generation += 1;
        let generation = timers.next_generation;

        let delay = self.delay;
        let shared = Arc::clone(&self.timers);
        let owned_key = key.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut timers = lock(&shared);
                let current = timers.pending.get(&owned_key).map(|t| t.generation);
                // Superseded between waking up and taking the lock.
                if current != Some(generation) {
                    return;
                }
                timers.pending.remove(&owned_key);
            }
            action.await;
        });

        if let Some(previous) = timers
            .pending
            .insert(key.to_string(), PendingTimer { generation, handle })
        {
            previous.handle.abort();
        }
    }

    /// Drop the pending timer for `key`. Returns whether one was pending.
    pub fn cancel(&self, key: &str) -> bool {
        match lock(&self.timers).pending.remove(key) {
            Some(timer) => {
                timer.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel every pending timer and return their keys, so the caller can
    /// run the work right away instead.
    pub fn take_pending(&self) -> Vec<String> {
        let mut timers = lock(&self.timers);
        let mut keys = Vec::with_capacity(timers.pending.len());
        for (key, timer) in timers.pending.drain() {
            timer.handle.abort();
            keys.push(key);
        }
        keys.sort();
        keys
    }

    pub fn is_pending(&self, key: &str) -> bool {
        lock(&self.timers).pending.contains_key(key)
    }

    pub fn abort_all(&self) {
        for (_, timer) in lock(&self.timers).pending.drain() {
            timer.handle.abort();
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.abort_all();
    }
}
