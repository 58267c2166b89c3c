//! Subscription registry (listener fan-out mechanics).
//!
//! - Listeners run in registration order.
//! - The listener set for one notification round is fixed before the first
//!   listener runs; subscribing during a round takes effect next round.
//! - No lock is held while listeners run, so a listener may subscribe,
//!   unsubscribe or publish again.
//! - A panicking listener is isolated: it is logged and the remaining
//!   listeners still run.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tracing::warn;

/// A registered listener callback.
pub type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Slots<T> {
    next_id: u64,
    listeners: Vec<(u64, Listener<T>)>,
}

/// Set of listeners for one observable value.
pub struct Registry<T> {
    name: &'static str,
    slots: Arc<Mutex<Slots<T>>>,
}

impl<T: 'static> Registry<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slots: Arc::new(Mutex::new(Slots {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Register a listener; it stays registered until the returned
    /// [`Subscription`] is unsubscribed.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            let id = slots.next_id;
            slots.next_id += 1;
            slots.listeners.push((id, Arc::new(listener)));
            id
        };

        let weak: Weak<Mutex<Slots<T>>> = Arc::downgrade(&self.slots);
        Subscription::new(move || {
            if let Some(slots) = weak.upgrade() {
                let mut slots = slots.lock().unwrap_or_else(PoisonError::into_inner);
                slots.listeners.retain(|(lid, _)| *lid != id);
            }
        })
    }

    /// Invoke every listener registered at call time with `value`.
    ///
    /// Returns the number of listeners that panicked.
    pub fn notify(&self, value: &T) -> usize {
        let round: Vec<Listener<T>> = {
            let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
        };

        let mut failures = 0;
        for (position, listener) in round.iter().enumerate() {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| listener(value))) {
                failures += 1;
                warn!(
                    registry = self.name,
                    position,
                    panic = panic_message(payload.as_ref()),
                    "listener panicked during notification; continuing"
                );
            }
        }
        failures
    }

    /// Number of active listeners.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .listeners
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> core::fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let count = self
            .slots
            .lock()
            .map(|s| s.listeners.len())
            .unwrap_or_default();
        f.debug_struct("Registry")
            .field("name", &self.name)
            .field("listeners", &count)
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Handle returned by `subscribe`.
///
/// `unsubscribe` may be called any number of times; only the first call has
/// an effect. Dropping the handle does **not** unsubscribe; owners that want
/// scope-bound subscriptions (see the console's mirrors) unsubscribe in their
/// own `Drop`.
#[must_use = "a dropped Subscription can no longer be unsubscribed"]
pub struct Subscription {
    remove: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Subscription {
    fn new(remove: impl FnOnce() + Send + 'static) -> Self {
        Self {
            remove: Mutex::new(Some(Box::new(remove))),
        }
    }

    /// Remove the listener. Idempotent.
    pub fn unsubscribe(&self) {
        let remove = self
            .remove
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(remove) = remove {
            remove();
        }
    }

    /// Whether `unsubscribe` has not been called yet.
    pub fn is_active(&self) -> bool {
        self.remove
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl core::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
