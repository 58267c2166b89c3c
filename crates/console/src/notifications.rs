//! Notification history and transient toasts.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use ocean_core::ConsoleError;
use ocean_events::{
    EventKind, EventLog, EventRecord, NewEvent, Observable, Published, Registry, Subscription,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl NotificationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationLevel::Info => "info",
            NotificationLevel::Success => "success",
            NotificationLevel::Warning => "warning",
            NotificationLevel::Error => "error",
        }
    }
}

/// A toast currently on screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    pub id: u64,
    pub level: NotificationLevel,
    pub title: String,
    pub body: String,
    pub raised_at: DateTime<Utc>,
}

pub type ToastSnapshot = Arc<Vec<Toast>>;

#[derive(Debug)]
struct ToastState {
    next_id: u64,
    version: u64,
    active: ToastSnapshot,
}

impl ToastState {
    fn publish(&mut self) -> Published<ToastSnapshot> {
        self.version += 1;
        Published::new(self.version, Arc::clone(&self.active))
    }
}

#[derive(Debug)]
struct ToastInner {
    state: Mutex<ToastState>,
    listeners: Registry<Published<ToastSnapshot>>,
}

/// Observable list of active toasts, oldest first.
#[derive(Debug, Clone)]
pub struct ToastQueue {
    inner: Arc<ToastInner>,
}

impl Default for ToastQueue {
    fn default() -> Self {
        Self {
            inner: Arc::new(ToastInner {
                state: Mutex::new(ToastState {
                    next_id: 1,
                    version: 0,
                    active: Arc::new(Vec::new()),
                }),
                listeners: Registry::new("toasts"),
            }),
        }
    }
}

impl ToastQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, level: NotificationLevel, title: &str, body: &str) -> u64 {
        let (id, published) = {
            let mut state = self.inner.state.lock().unwrap_or_else(PoisonError::into_inner);
            let id = state.next_id;
            state.next_id += 1;
            Arc::make_mut(&mut state.active).push(Toast {
                id,
                level,
                title: title.to_string(),
                body: body.to_string(),
                raised_at: Utc::now(),
            });
            (id, state.publish())
        };
        self.inner.listeners.notify(&published);
        id
    }

    /// Remove a toast. Returns `false` (and notifies nobody) if it was
    /// already gone.
    pub fn dismiss(&self, id: u64) -> bool {
        let published = {
            let mut state = self.inner.state.lock().unwrap_or_else(PoisonError::into_inner);
            if !state.active.iter().any(|t| t.id == id) {
                return false;
            }
            Arc::make_mut(&mut state.active).retain(|t| t.id != id);
            state.publish()
        };
        self.inner.listeners.notify(&published);
        true
    }

    pub fn clear(&self) {
        let published = {
            let mut state = self.inner.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.active = Arc::new(Vec::new());
            state.publish()
        };
        self.inner.listeners.notify(&published);
    }

    pub fn snapshot(&self) -> ToastSnapshot {
        let state = self.inner.state.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&state.active)
    }
}

impl Observable for ToastQueue {
    type Snapshot = ToastSnapshot;

    fn published(&self) -> Published<ToastSnapshot> {
        let state = self.inner.state.lock().unwrap_or_else(PoisonError::into_inner);
        Published::new(state.version, Arc::clone(&state.active))
    }

    fn snapshot(&self) -> ToastSnapshot {
        ToastQueue::snapshot(self)
    }

    fn subscribe_boxed(
        &self,
        listener: Box<dyn Fn(&Published<ToastSnapshot>) + Send + Sync>,
    ) -> Subscription {
        self.inner
            .listeners
            .subscribe(move |p: &Published<ToastSnapshot>| listener(p))
    }

    fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }
}

/// Raises notifications: every one is kept in the history, and shown as a
/// toast that dismisses itself after `dismiss_after` (zero keeps it until
/// dismissed).
#[derive(Debug, Clone)]
pub struct NotificationCenter {
    history: Arc<EventLog>,
    toasts: ToastQueue,
    dismiss_after: Duration,
}

impl NotificationCenter {
    pub fn new(history: Arc<EventLog>, toasts: ToastQueue, dismiss_after: Duration) -> Self {
        Self {
            history,
            toasts,
            dismiss_after,
        }
    }

    pub fn notify(&self, level: NotificationLevel, title: &str, body: &str) -> EventRecord {
        let toast_id = self.toasts.push(level, title, body);
        self.schedule_dismiss(toast_id);

        self.history.record(
            NewEvent::new(EventKind::Notification)
                .with("level", level.as_str())
                .with("title", title)
                .with("body", body)
                .with("toast_id", toast_id),
        )
    }

    /// Error notification carrying the normalized error's details.
    pub fn notify_error(&self, title: &str, error: &ConsoleError) -> EventRecord {
        self.notify(NotificationLevel::Error, title, &error.text())
    }

    pub fn dismiss(&self, toast_id: u64) -> bool {
        self.toasts.dismiss(toast_id)
    }

    pub fn toasts(&self) -> &ToastQueue {
        &self.toasts
    }

    fn schedule_dismiss(&self, toast_id: u64) {
        if self.dismiss_after.is_zero() {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let toasts = self.toasts.clone();
                let delay = self.dismiss_after;
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    if toasts.dismiss(toast_id) {
                        debug!(toast_id, "toast auto-dismissed");
                    }
                });
            }
            Err(_) => {
                debug!(toast_id, "no async runtime; toast stays until dismissed");
            }
        }
    }
}
