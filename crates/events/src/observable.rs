//! Observable value abstraction (read + subscribe, no write path).
//!
//! Stores expose their own write operations (`record`/`clear`,
//! `begin`); this trait is the read side every mirror needs: take the current
//! value, then follow changes.
//!
//! Every write bumps the source's version and the new value is published
//! together with it. Fan-out rounds of different writes can overlap (a
//! listener that writes re-entrantly, or writers on other threads), so a
//! listener may receive an older value after a newer one; comparing versions
//! tells them apart.

use std::sync::Arc;

use crate::registry::Subscription;

/// A value stamped with the version of the write that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published<S> {
    /// Strictly increases with every write to the source.
    pub version: u64,
    pub value: S,
}

impl<S> Published<S> {
    pub fn new(version: u64, value: S) -> Self {
        Self { version, value }
    }

    /// `true` if `self` was produced by a later write than `other`.
    pub fn supersedes<T>(&self, other: &Published<T>) -> bool {
        self.version > other.version
    }
}

/// A value that can be snapshotted and observed for changes.
///
/// Notification is synchronous: a listener registered before a write sees
/// that write before the write call returns.
pub trait Observable: Send + Sync {
    type Snapshot: Clone + Send + Sync + 'static;

    /// Current value and its version, read atomically.
    fn published(&self) -> Published<Self::Snapshot>;

    /// Current value, without side effects.
    fn snapshot(&self) -> Self::Snapshot {
        self.published().value
    }

    /// Register a boxed listener receiving versioned values.
    fn subscribe_boxed(
        &self,
        listener: Box<dyn Fn(&Published<Self::Snapshot>) + Send + Sync>,
    ) -> Subscription;

    /// Number of active listeners.
    fn listener_count(&self) -> usize;

    /// Register a listener that only cares about the value.
    fn watch<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Self::Snapshot) + Send + Sync + 'static,
        Self: Sized,
    {
        self.subscribe_boxed(Box::new(move |p: &Published<Self::Snapshot>| {
            listener(&p.value)
        }))
    }
}

impl<O> Observable for Arc<O>
where
    O: Observable + ?Sized,
{
    type Snapshot = O::Snapshot;

    fn published(&self) -> Published<Self::Snapshot> {
        (**self).published()
    }

    fn subscribe_boxed(
        &self,
        listener: Box<dyn Fn(&Published<Self::Snapshot>) + Send + Sync>,
    ) -> Subscription {
        (**self).subscribe_boxed(listener)
    }

    fn listener_count(&self) -> usize {
        (**self).listener_count()
    }
}
