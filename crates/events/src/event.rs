use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use ocean_core::EventId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Free-form record metadata.
pub type Metadata = BTreeMap<String, Value>;

/// Fixed set of console event types.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PageNav,
    ThemeChange,
    ApiCall,
    ApiError,
    Notification,
    UserAction,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::PageNav => "page_nav",
            EventKind::ThemeChange => "theme_change",
            EventKind::ApiCall => "api_call",
            EventKind::ApiError => "api_error",
            EventKind::Notification => "notification",
            EventKind::UserAction => "user_action",
        }
    }
}

impl core::fmt::Display for EventKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A partial event handed to a store; `id` and `timestamp` are assigned on
/// record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEvent {
    pub kind: EventKind,
    #[serde(default)]
    pub metadata: Metadata,
}

impl NewEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            metadata: Metadata::new(),
        }
    }

    /// Attach a metadata entry. Later values for the same key win.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

impl From<EventKind> for NewEvent {
    fn from(kind: EventKind) -> Self {
        Self::new(kind)
    }
}

/// An immutable recorded event.
///
/// Records are facts: once appended they are never mutated, only evicted
/// (clear or capacity trimming).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    id: EventId,
    timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    kind: EventKind,
    metadata: Metadata,
}

impl EventRecord {
    pub(crate) fn new(id: EventId, timestamp: DateTime<Utc>, event: NewEvent) -> Self {
        Self {
            id,
            timestamp,
            kind: event.kind,
            metadata: event.metadata,
        }
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Convenience lookup for string metadata.
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }
}
