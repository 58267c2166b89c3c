//! In-memory event store + publisher for one console domain.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use ocean_core::EventId;
use tracing::debug;

use crate::event::{EventRecord, NewEvent};
use crate::observable::{Observable, Published};
use crate::registry::{Registry, Subscription};

/// Immutable view of a store's contents at one point in time.
pub type Snapshot = Arc<Vec<EventRecord>>;

#[derive(Debug)]
struct Entries {
    next_id: u64,
    version: u64,
    records: Snapshot,
}

/// Ordered, optionally bounded event store with synchronous fan-out.
///
/// - insertion order is chronological order
/// - ids are strictly increasing and never reused, also across `clear`
/// - when a capacity is set, the oldest records are evicted first
/// - `record` and `clear` are the only write paths; both notify every
///   listener before returning
///
/// Snapshots share storage with the store until the next write
/// (copy-on-write through `Arc::make_mut`). Each write also bumps a version
/// that travels with the snapshot to versioned listeners.
#[derive(Debug)]
pub struct EventLog {
    domain: &'static str,
    capacity: Option<usize>,
    entries: Mutex<Entries>,
    listeners: Registry<Published<Snapshot>>,
}

impl EventLog {
    /// Create an unbounded store.
    pub fn new(domain: &'static str) -> Self {
        Self::with_capacity(domain, None)
    }

    /// Create a store holding at most `capacity` records (`None` = unbounded).
    pub fn with_capacity(domain: &'static str, capacity: Option<usize>) -> Self {
        Self {
            domain,
            capacity,
            entries: Mutex::new(Entries {
                next_id: 1,
                version: 0,
                records: Arc::new(Vec::new()),
            }),
            listeners: Registry::new(domain),
        }
    }

    /// Create a store from a configured capacity where `0` means unbounded.
    pub fn bounded(domain: &'static str, capacity: usize) -> Self {
        Self::with_capacity(domain, (capacity > 0).then_some(capacity))
    }

    pub fn domain(&self) -> &'static str {
        self.domain
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Append an event, trim to capacity and notify listeners.
    pub fn record(&self, event: impl Into<NewEvent>) -> EventRecord {
        let event = event.into();
        let (record, published, evicted) = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

            let id = EventId::new(entries.next_id);
            entries.next_id += 1;
            let record = EventRecord::new(id, Utc::now(), event);

            let records = Arc::make_mut(&mut entries.records);
            records.push(record.clone());

            let mut evicted = 0;
            if let Some(cap) = self.capacity {
                if records.len() > cap {
                    evicted = records.len() - cap;
                    records.drain(..evicted);
                }
            }

            entries.version += 1;
            let published = Published::new(entries.version, Arc::clone(&entries.records));
            (record, published, evicted)
        };

        debug!(
            domain = self.domain,
            id = %record.id(),
            kind = %record.kind(),
            version = published.version,
            len = published.value.len(),
            evicted,
            "event recorded"
        );

        self.listeners.notify(&published);
        record
    }

    /// Drop every record and notify listeners with an empty snapshot.
    pub fn clear(&self) {
        let published = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries.records = Arc::new(Vec::new());
            entries.version += 1;
            Published::new(entries.version, Arc::clone(&entries.records))
        };

        debug!(domain = self.domain, version = published.version, "store cleared");
        self.listeners.notify(&published);
    }

    /// Current contents; no side effects.
    pub fn snapshot(&self) -> Snapshot {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&entries.records)
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Snapshot) + Send + Sync + 'static,
    {
        self.listeners
            .subscribe(move |p: &Published<Snapshot>| listener(&p.value))
    }

    /// Number of writes (`record` or `clear`) so far.
    pub fn version(&self) -> u64 {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .version
    }

    pub fn latest(&self) -> Option<EventRecord> {
        self.snapshot().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Observable for EventLog {
    type Snapshot = Snapshot;

    fn published(&self) -> Published<Snapshot> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Published::new(entries.version, Arc::clone(&entries.records))
    }

    fn snapshot(&self) -> Snapshot {
        EventLog::snapshot(self)
    }

    fn subscribe_boxed(
        &self,
        listener: Box<dyn Fn(&Published<Snapshot>) + Send + Sync>,
    ) -> Subscription {
        self.listeners.subscribe(move |p: &Published<Snapshot>| listener(p))
    }

    fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}
