//! `ocean-events`
//!
//! Polling subscription cache mechanics.
//!
//! - [`EventLog`]: ordered, optionally bounded store of immutable
//!   [`EventRecord`]s whose `record`/`clear` are the only write paths
//! - [`Registry`]: listener fan-out with isolated failures
//! - [`InflightCounter`]: observable count of outstanding requests
//! - [`Observable`]: the read/subscribe seam mirrors are built on, with
//!   every write [`Published`] under a strictly increasing version
//!
//! Nothing here performs IO or spawns tasks; notification is synchronous.

pub mod event;
pub mod inflight;
pub mod observable;
pub mod registry;
pub mod store;

pub use event::{EventKind, EventRecord, Metadata, NewEvent};
pub use inflight::{InflightCounter, InflightGuard};
pub use observable::{Observable, Published};
pub use registry::{Listener, Registry, Subscription};
pub use store::{EventLog, Snapshot};
