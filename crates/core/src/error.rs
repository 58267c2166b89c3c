//! Console error model.
//!
//! Backend services, interceptors and storage all surface failures in
//! different shapes (bare strings, `{ message, code, statusCode }` objects,
//! Rust errors). Everything is funnelled through [`ConsoleError::normalize`]
//! or [`ConsoleError::from_error`] so downstream code matches on a closed set
//! of cases.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Result type used across the console layer.
pub type ConsoleResult<T> = Result<T, ConsoleError>;

/// Normalized console error.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConsoleError {
    /// A plain human-readable message.
    #[error("{message}")]
    Message { message: String },

    /// A message with a service error code and/or transport status.
    #[error("{message}")]
    Structured {
        message: String,
        code: Option<String>,
        status_code: Option<u16>,
    },

    /// Nothing usable could be extracted from the failure.
    #[error("unknown error")]
    Unknown,
}

impl ConsoleError {
    pub fn message(msg: impl Into<String>) -> Self {
        Self::Message {
            message: msg.into(),
        }
    }

    pub fn structured(
        msg: impl Into<String>,
        code: Option<String>,
        status_code: Option<u16>,
    ) -> Self {
        Self::Structured {
            message: msg.into(),
            code,
            status_code,
        }
    }

    /// Normalize an arbitrary error payload.
    ///
    /// - a JSON string becomes [`ConsoleError::Message`]
    /// - an object carrying `message` plus `code` and/or `statusCode`
    ///   (`status_code`, `status`) becomes [`ConsoleError::Structured`]
    /// - an object carrying only `message` (or `error`) becomes a message
    /// - anything else is [`ConsoleError::Unknown`]
    pub fn normalize(raw: Value) -> Self {
        match raw {
            Value::String(s) if !s.trim().is_empty() => Self::Message { message: s },
            Value::Object(map) => {
                let message = map
                    .get("message")
                    .or_else(|| map.get("error"))
                    .and_then(Value::as_str)
                    .filter(|m| !m.trim().is_empty())
                    .map(str::to_string);

                let Some(message) = message else {
                    return Self::Unknown;
                };

                let code = map.get("code").and_then(|c| match c {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                });

                let status_code = ["statusCode", "status_code", "status"]
                    .iter()
                    .find_map(|k| map.get(*k).and_then(Value::as_u64))
                    .and_then(|s| u16::try_from(s).ok());

                if code.is_none() && status_code.is_none() {
                    Self::Message { message }
                } else {
                    Self::Structured {
                        message,
                        code,
                        status_code,
                    }
                }
            }
            _ => Self::Unknown,
        }
    }

    /// Normalize a Rust error into a message.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let message = err.to_string();
        if message.trim().is_empty() {
            Self::Unknown
        } else {
            Self::Message { message }
        }
    }

    /// Human-readable text for display surfaces (toasts, hook state).
    pub fn text(&self) -> String {
        self.to_string()
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Structured { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Structured { status_code, .. } => *status_code,
            _ => None,
        }
    }
}

impl From<Value> for ConsoleError {
    fn from(value: Value) -> Self {
        Self::normalize(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_payload_becomes_message() {
        let err = ConsoleError::normalize(json!("vessel not found"));
        assert_eq!(err, ConsoleError::message("vessel not found"));
        assert_eq!(err.text(), "vessel not found");
    }

    #[test]
    fn object_with_code_and_status_becomes_structured() {
        let err = ConsoleError::normalize(json!({
            "message": "quota exceeded",
            "code": "RESOURCE_EXHAUSTED",
            "statusCode": 429
        }));

        assert_eq!(err.code(), Some("RESOURCE_EXHAUSTED"));
        assert_eq!(err.status_code(), Some(429));
        assert_eq!(err.text(), "quota exceeded");
    }

    #[test]
    fn numeric_code_is_stringified() {
        let err = ConsoleError::normalize(json!({ "message": "denied", "code": 7 }));
        assert_eq!(err.code(), Some("7"));
        assert_eq!(err.status_code(), None);
    }

    #[test]
    fn object_with_only_message_is_plain_message() {
        let err = ConsoleError::normalize(json!({ "message": "timeout" }));
        assert_eq!(err, ConsoleError::message("timeout"));

        let err = ConsoleError::normalize(json!({ "error": "boom" }));
        assert_eq!(err, ConsoleError::message("boom"));
    }

    #[test]
    fn unrecognized_shapes_are_unknown() {
        assert_eq!(ConsoleError::normalize(json!(null)), ConsoleError::Unknown);
        assert_eq!(ConsoleError::normalize(json!(42)), ConsoleError::Unknown);
        assert_eq!(ConsoleError::normalize(json!("  ")), ConsoleError::Unknown);
        assert_eq!(
            ConsoleError::normalize(json!({ "code": "X" })),
            ConsoleError::Unknown
        );
        assert_eq!(ConsoleError::Unknown.text(), "unknown error");
    }

    #[test]
    fn out_of_range_status_is_dropped() {
        let err = ConsoleError::normalize(json!({ "message": "m", "status": 70000 }));
        assert_eq!(err, ConsoleError::message("m"));
    }

    #[test]
    fn serialized_form_is_tagged_by_kind() {
        assert_eq!(
            serde_json::to_value(ConsoleError::message("berth occupied")).unwrap(),
            json!({ "kind": "message", "message": "berth occupied" })
        );
        assert_eq!(
            serde_json::to_value(ConsoleError::structured("slow", None, Some(504))).unwrap(),
            json!({ "kind": "structured", "message": "slow", "code": null, "status_code": 504 })
        );
        assert_eq!(
            serde_json::to_value(ConsoleError::Unknown).unwrap(),
            json!({ "kind": "unknown" })
        );

        let back: ConsoleError =
            serde_json::from_value(json!({ "kind": "message", "message": "x" })).unwrap();
        assert_eq!(back, ConsoleError::message("x"));
    }

    #[test]
    fn rust_errors_become_messages() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "connection reset");
        assert_eq!(
            ConsoleError::from_error(&io),
            ConsoleError::message("connection reset")
        );
    }
}
