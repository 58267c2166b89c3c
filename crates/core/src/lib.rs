//! `ocean-core`
//!
//! Foundation building blocks for the operator console.
//!
//! Identifiers, the normalized error model and configuration. No IO, no async.

pub mod config;
pub mod error;
pub mod id;

pub use config::ConsoleConfig;
pub use error::{ConsoleError, ConsoleResult};
pub use id::{CallId, EventId, RequestId, SessionId};
