//! Observable counter of outstanding service calls.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::observable::{Observable, Published};
use crate::registry::{Registry, Subscription};

#[derive(Debug)]
struct Count {
    value: usize,
    version: u64,
    /// Bumped by `reset`; guards from an earlier epoch no longer count.
    epoch: u64,
}

#[derive(Debug)]
struct Inner {
    count: Mutex<Count>,
    listeners: Registry<Published<usize>>,
}

/// Number of requests currently in flight.
///
/// Cloning is cheap and every clone observes the same count.
#[derive(Debug, Clone)]
pub struct InflightCounter {
    inner: Arc<Inner>,
}

impl InflightCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark one request as started. The count drops again when the guard is
    /// dropped, including on early return or unwinding.
    pub fn begin(&self) -> InflightGuard {
        let mut epoch = 0;
        self.update(|c| {
            epoch = c.epoch;
            c.value += 1;
            true
        });
        InflightGuard {
            counter: Some(self.clone()),
            epoch,
        }
    }

    pub fn count(&self) -> usize {
        self.inner
            .count
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .value
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&usize) + Send + Sync + 'static,
    {
        self.inner
            .listeners
            .subscribe(move |p: &Published<usize>| listener(&p.value))
    }

    /// Force the count back to zero. Guards taken before the reset are
    /// disowned: dropping them later leaves the count alone.
    pub fn reset(&self) {
        self.update(|c| {
            c.value = 0;
            c.epoch += 1;
            true
        });
    }

    fn finish(&self, epoch: u64) {
        let counted = self.update(|c| {
            if c.epoch != epoch {
                return false;
            }
            c.value = c.value.saturating_sub(1);
            true
        });
        if !counted {
            debug!(epoch, "guard from before reset released; count unchanged");
        }
    }

    /// Apply `f` under the lock; publish if it reports a change.
    fn update(&self, f: impl FnOnce(&mut Count) -> bool) -> bool {
        let published = {
            let mut count = self.inner.count.lock().unwrap_or_else(PoisonError::into_inner);
            if !f(&mut count) {
                return false;
            }
            count.version += 1;
            Published::new(count.version, count.value)
        };
        debug!(inflight = published.value, version = published.version, "inflight count changed");
        self.inner.listeners.notify(&published);
        true
    }
}

impl Default for InflightCounter {
    fn default() -> Self {
        Self {
            inner: Arc::new(Inner {
                count: Mutex::new(Count {
                    value: 0,
                    version: 0,
                    epoch: 0,
                }),
                listeners: Registry::new("inflight"),
            }),
        }
    }
}

impl Observable for InflightCounter {
    type Snapshot = usize;

    fn published(&self) -> Published<usize> {
        let count = self.inner.count.lock().unwrap_or_else(PoisonError::into_inner);
        Published::new(count.version, count.value)
    }

    fn subscribe_boxed(
        &self,
        listener: Box<dyn Fn(&Published<usize>) + Send + Sync>,
    ) -> Subscription {
        self.inner
            .listeners
            .subscribe(move |p: &Published<usize>| listener(p))
    }

    fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }
}

/// Decrements the inflight count on drop.
#[derive(Debug)]
#[must_use = "the request counts as finished as soon as the guard is dropped"]
pub struct InflightGuard {
    counter: Option<InflightCounter>,
    epoch: u64,
}

impl InflightGuard {
    /// Finish explicitly (same as dropping the guard).
    pub fn finish(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(counter) = self.counter.take() {
            counter.finish(self.epoch);
        }
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.release();
    }
}
