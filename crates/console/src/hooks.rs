//! Hook adapters: mirror an observable store into component-local state.
//!
//! A [`Mirror`] is what a UI component holds while mounted. It starts from
//! the store's snapshot, replaces its state on every newer notification and
//! bumps a render counter (the owner re-renders when it changes). Deliveries
//! carrying an older version than the one held are ignored, so overlapping
//! fan-out rounds cannot leave it behind the store. Unmounting, either
//! explicitly or by dropping, unsubscribes exactly once. No network calls
//! happen at this layer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use ocean_events::{Observable, Published, Snapshot, Subscription};

use crate::context::ConsoleContext;
use crate::notifications::ToastSnapshot;

/// Component-local reflection of an observable value.
pub struct Mirror<S> {
    state: Arc<Mutex<Published<S>>>,
    renders: Arc<AtomicU64>,
    subscription: Option<Subscription>,
}

impl<S> Mirror<S>
where
    S: Clone + Send + Sync + 'static,
{
    /// Mount against `source`.
    pub fn mount<O>(source: &O) -> Self
    where
        O: Observable<Snapshot = S>,
    {
        Self::mount_with(source, |_| {})
    }

    /// Mount and call `on_change` after each state replacement.
    ///
    /// `on_change` runs outside the mirror's lock; treat it as a re-render
    /// signal and read [`Mirror::current`] for the value to show.
    pub fn mount_with<O, F>(source: &O, on_change: F) -> Self
    where
        O: Observable<Snapshot = S>,
        F: Fn(&S) + Send + Sync + 'static,
    {
        let state = Arc::new(Mutex::new(source.published()));
        let renders = Arc::new(AtomicU64::new(0));

        let s = Arc::clone(&state);
        let r = Arc::clone(&renders);
        let subscription = source.subscribe_boxed(Box::new(move |published: &Published<S>| {
            if !replace_if_newer(&s, published) {
                return;
            }
            r.fetch_add(1, Ordering::SeqCst);
            on_change(&published.value);
        }));

        // Catch a write that landed between the first read and subscribing.
        replace_if_newer(&state, &source.published());

        Self {
            state,
            renders,
            subscription: Some(subscription),
        }
    }

    /// The mirrored value as of the last notification.
    pub fn current(&self) -> S {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .value
            .clone()
    }

    /// Version of the source write the mirrored value came from.
    pub fn version(&self) -> u64 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .version
    }

    /// How many notifications replaced the state since mount.
    pub fn renders(&self) -> u64 {
        self.renders.load(Ordering::SeqCst)
    }

    pub fn is_mounted(&self) -> bool {
        self.subscription.is_some()
    }

    /// Stop following the store. Equivalent to dropping the mirror.
    pub fn unmount(mut self) {
        self.detach();
    }
}

fn replace_if_newer<S: Clone>(held: &Mutex<Published<S>>, incoming: &Published<S>) -> bool {
    let mut held = held.lock().unwrap_or_else(PoisonError::into_inner);
    if !incoming.supersedes(&held) {
        return false;
    }
    *held = incoming.clone();
    true
}

impl<S> Mirror<S> {
    fn detach(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }
}

impl<S> Drop for Mirror<S> {
    fn drop(&mut self) {
        self.detach();
    }
}

impl<S> core::fmt::Debug for Mirror<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Mirror")
            .field("renders", &self.renders.load(Ordering::SeqCst))
            .field("mounted", &self.subscription.is_some())
            .finish()
    }
}

/// Mirror over one of the event stores.
pub type EventMirror = Mirror<Snapshot>;

pub fn use_telemetry(ctx: &ConsoleContext) -> EventMirror {
    Mirror::mount(ctx.telemetry())
}

pub fn use_api_history(ctx: &ConsoleContext) -> EventMirror {
    Mirror::mount(ctx.api_history())
}

pub fn use_notification_history(ctx: &ConsoleContext) -> EventMirror {
    Mirror::mount(ctx.notification_history())
}

pub fn use_inflight(ctx: &ConsoleContext) -> Mirror<usize> {
    Mirror::mount(ctx.inflight())
}

pub fn use_toasts(ctx: &ConsoleContext) -> Mirror<ToastSnapshot> {
    Mirror::mount(ctx.notifications().toasts())
}
