//! Wraps outgoing service calls: counts them as in flight, normalizes
//! failures and records every outcome in the API history.

use std::future::Future;
use std::sync::Arc;

use ocean_core::{CallId, ConsoleError, SessionId};
use ocean_events::{EventKind, EventLog, InflightCounter, NewEvent};
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct ApiInterceptor {
    api_history: Arc<EventLog>,
    telemetry: Arc<EventLog>,
    inflight: InflightCounter,
    session_id: SessionId,
}

impl ApiInterceptor {
    pub fn new(
        api_history: Arc<EventLog>,
        telemetry: Arc<EventLog>,
        inflight: InflightCounter,
        session_id: SessionId,
    ) -> Self {
        Self {
            api_history,
            telemetry,
            inflight,
            session_id,
        }
    }

    /// Run `call` as `service.method`.
    ///
    /// An `api_call` record is written for every outcome. Failures are also
    /// written to telemetry as `api_error` and returned normalized.
    pub async fn call<T, E, Fut>(
        &self,
        service: &str,
        method: &str,
        call: Fut,
    ) -> Result<T, ConsoleError>
    where
        Fut: Future<Output = Result<T, E>>,
        E: Into<ConsoleError>,
    {
        let call_id = CallId::new();
        let started = Instant::now();
        let guard = self.inflight.begin();
        debug!(service, method, %call_id, "api call started");

        let outcome = call.await.map_err(Into::into);
        guard.finish();
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let mut entry = NewEvent::new(EventKind::ApiCall)
            .with("service", service)
            .with("method", method)
            .with("call_id", call_id.to_string())
            .with("session_id", self.session_id.to_string())
            .with("duration_ms", duration_ms)
            .with("ok", outcome.is_ok());

        if let Err(err) = &outcome {
            warn!(service, method, %call_id, error = %err, "api call failed");
            entry = entry
                .with("error", err.text())
                .with("code", err.code())
                .with("status_code", err.status_code());
            self.telemetry.record(
                NewEvent::new(EventKind::ApiError)
                    .with("service", service)
                    .with("method", method)
                    .with("call_id", call_id.to_string())
                    .with("error", err.text()),
            );
        }

        self.api_history.record(entry);
        outcome
    }
}
