//! `ocean-console`
//!
//! **Responsibility:** the operator console's client-side state layer.
//!
//! This crate provides:
//! - [`ConsoleContext`]: telemetry, API history and notification stores,
//!   the inflight counter, local storage and the theme, built from config
//! - hook adapters mirroring any store into component-local state
//! - [`use_entity_data`]: a polling data hook over an async [`Fetch`]
//! - [`ApiInterceptor`]: records every service call and its outcome

pub mod context;
pub mod entity_data;
pub mod hooks;
pub mod interceptor;
pub mod notifications;
pub mod storage;
pub mod theme;

pub use context::ConsoleContext;
pub use entity_data::{
    EntityData, EntityDataOptions, EntityState, Fetch, FetchFn, fetch_fn, use_entity_data,
};
pub use hooks::{
    EventMirror, Mirror, use_api_history, use_inflight, use_notification_history, use_telemetry,
    use_toasts,
};
pub use interceptor::ApiInterceptor;
pub use notifications::{NotificationCenter, NotificationLevel, Toast, ToastQueue};
pub use storage::{LocalStorage, StorageError};
pub use theme::{Theme, ThemePreference};
