//! The console context: every store and capability one console session uses,
//! built once from configuration and passed by reference.

use std::sync::Arc;

use ocean_core::{ConsoleConfig, SessionId};
use ocean_events::{EventKind, EventLog, EventRecord, InflightCounter, NewEvent};
use tracing::info;

use crate::interceptor::ApiInterceptor;
use crate::notifications::{NotificationCenter, ToastQueue};
use crate::storage::LocalStorage;
use crate::theme::Theme;

#[derive(Debug)]
pub struct ConsoleContext {
    config: ConsoleConfig,
    session_id: SessionId,
    telemetry: Arc<EventLog>,
    api_history: Arc<EventLog>,
    notification_history: Arc<EventLog>,
    inflight: InflightCounter,
    notifications: NotificationCenter,
    storage: Arc<LocalStorage>,
    theme: Theme,
}

impl ConsoleContext {
    pub fn init(config: ConsoleConfig) -> Self {
        let session_id = SessionId::new();
        let telemetry = Arc::new(EventLog::bounded("telemetry", config.telemetry_capacity));
        let api_history = Arc::new(EventLog::bounded("api", config.api_history_capacity));
        let notification_history = Arc::new(EventLog::bounded(
            "notifications",
            config.notification_capacity,
        ));

        let notifications = NotificationCenter::new(
            Arc::clone(&notification_history),
            ToastQueue::new(),
            config.toast_dismiss(),
        );
        let storage = Arc::new(LocalStorage::from_path(config.storage_path.as_deref()));
        let theme = Theme::load(Arc::clone(&storage), Arc::clone(&telemetry));

        info!(
            %session_id,
            theme = theme.current().as_str(),
            persistent = storage.path().is_some(),
            "console context initialized"
        );

        Self {
            config,
            session_id,
            telemetry,
            api_history,
            notification_history,
            inflight: InflightCounter::new(),
            notifications,
            storage,
            theme,
        }
    }

    /// Empty every store and the toast queue, and zero the inflight count.
    /// Subscribers stay attached and are notified. Stored preferences are
    /// kept.
    pub fn reset(&self) {
        self.telemetry.clear();
        self.api_history.clear();
        self.notification_history.clear();
        self.notifications.toasts().clear();
        self.inflight.reset();
        info!(session_id = %self.session_id, "console context reset");
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn telemetry(&self) -> &Arc<EventLog> {
        &self.telemetry
    }

    pub fn api_history(&self) -> &Arc<EventLog> {
        &self.api_history
    }

    pub fn notification_history(&self) -> &Arc<EventLog> {
        &self.notification_history
    }

    pub fn inflight(&self) -> &InflightCounter {
        &self.inflight
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    pub fn storage(&self) -> &Arc<LocalStorage> {
        &self.storage
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    /// Interceptor writing into this context's stores.
    pub fn interceptor(&self) -> ApiInterceptor {
        ApiInterceptor::new(
            Arc::clone(&self.api_history),
            Arc::clone(&self.telemetry),
            self.inflight.clone(),
            self.session_id,
        )
    }

    /// Record a `page_nav` telemetry event.
    pub fn navigate(&self, path: &str) -> EventRecord {
        self.telemetry
            .record(NewEvent::new(EventKind::PageNav).with("path", path))
    }

    /// Record a `user_action` telemetry event.
    pub fn track(&self, action: &str) -> EventRecord {
        self.telemetry
            .record(NewEvent::new(EventKind::UserAction).with("action", action))
    }
}
