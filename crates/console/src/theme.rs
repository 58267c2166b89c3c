//! Theme capability.
//!
//! Constructed once by the console context and handed to whoever needs it;
//! nothing looks the theme up ambiently.

use std::sync::{Arc, Mutex, PoisonError};

use ocean_events::{EventKind, EventLog, NewEvent};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::storage::{LocalStorage, StorageError};

/// Storage key of the persisted preference.
pub const THEME_KEY: &str = "console.theme";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemePreference {
    Light,
    Dark,
    #[default]
    System,
}

impl ThemePreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThemePreference::Light => "light",
            ThemePreference::Dark => "dark",
            ThemePreference::System => "system",
        }
    }
}

#[derive(Debug)]
pub struct Theme {
    storage: Arc<LocalStorage>,
    telemetry: Arc<EventLog>,
    current: Mutex<ThemePreference>,
}

impl Theme {
    /// Load the persisted preference (falling back to `system`).
    pub fn load(storage: Arc<LocalStorage>, telemetry: Arc<EventLog>) -> Self {
        let current = storage.get_or(THEME_KEY, ThemePreference::default());
        Self {
            storage,
            telemetry,
            current: Mutex::new(current),
        }
    }

    pub fn current(&self) -> ThemePreference {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Switch theme: persist, then record a `theme_change` event.
    ///
    /// Setting the current theme again is a no-op.
    pub fn set(&self, preference: ThemePreference) -> Result<(), StorageError> {
        let previous = {
            let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
            if *current == preference {
                return Ok(());
            }
            self.storage.set(THEME_KEY, &preference)?;
            std::mem::replace(&mut *current, preference)
        };

        info!(from = previous.as_str(), to = preference.as_str(), "theme changed");
        self.telemetry.record(
            NewEvent::new(EventKind::ThemeChange)
                .with("from", previous.as_str())
                .with("to", preference.as_str()),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_system_when_nothing_is_stored() {
        let theme = Theme::load(
            Arc::new(LocalStorage::in_memory()),
            Arc::new(EventLog::new("telemetry")),
        );
        assert_eq!(theme.current(), ThemePreference::System);
    }

    #[test]
    fn malformed_preference_falls_back_to_system() {
        let storage = Arc::new(LocalStorage::in_memory());
        storage.set(THEME_KEY, &"solarized").unwrap();

        let theme = Theme::load(storage, Arc::new(EventLog::new("telemetry")));
        assert_eq!(theme.current(), ThemePreference::System);
    }

    #[test]
    fn set_persists_and_records_once() {
        let storage = Arc::new(LocalStorage::in_memory());
        let telemetry = Arc::new(EventLog::new("telemetry"));
        let theme = Theme::load(storage.clone(), telemetry.clone());

        theme.set(ThemePreference::Dark).unwrap();
        theme.set(ThemePreference::Dark).unwrap();

        assert_eq!(storage.get::<ThemePreference>(THEME_KEY), Some(ThemePreference::Dark));
        let snap = telemetry.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].kind(), EventKind::ThemeChange);
        assert_eq!(snap[0].meta_str("from"), Some("system"));
        assert_eq!(snap[0].meta_str("to"), Some("dark"));
    }
}
