use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use ocean_console::{
    ConsoleContext, EntityDataOptions, ThemePreference, fetch_fn, use_api_history,
    use_entity_data, use_inflight, use_notification_history, use_telemetry, use_toasts,
};
use ocean_core::{ConsoleConfig, ConsoleError};
use ocean_events::EventKind;
use serde_json::json;

async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

fn kinds(records: &[ocean_events::EventRecord]) -> Vec<EventKind> {
    records.iter().map(|r| r.kind()).collect()
}

#[tokio::test(start_paused = true)]
async fn polled_service_calls_flow_into_every_mirror() {
    ocean_observability::tracing::init_for_tests();
    let ctx = Arc::new(ConsoleContext::init(ConsoleConfig {
        toast_dismiss_ms: 5_000,
        ..ConsoleConfig::default()
    }));
    let telemetry = use_telemetry(&ctx);
    let api_history = use_api_history(&ctx);
    let notifications = use_notification_history(&ctx);
    let inflight = use_inflight(&ctx);
    let toasts = use_toasts(&ctx);

    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = {
        let api = ctx.interceptor();
        let ctx = Arc::clone(&ctx);
        let calls = Arc::clone(&calls);
        fetch_fn(move |port: String| {
            let api = api.clone();
            let ctx = Arc::clone(&ctx);
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                let result = api
                    .call("harbor", "list_berths", async move {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        if n == 1 {
                            Err(json!({ "message": "harbor offline", "statusCode": 503 }))
                        } else {
                            Ok(format!("{port}: 12 berths"))
                        }
                    })
                    .await;
                if let Err(err) = &result {
                    ctx.notifications().notify_error("Berths unavailable", err);
                }
                result
            }
        })
    };

    ctx.navigate("/harbor");
    let berths = use_entity_data(
        fetcher,
        "rotterdam".to_string(),
        EntityDataOptions::default().with_auto_refresh(Duration::from_millis(1_000)),
    );

    settle().await;
    assert_eq!(inflight.current(), 1);

    tokio::time::sleep(Duration::from_millis(25)).await;
    settle().await;
    assert_eq!(berths.data(), Some("rotterdam: 12 berths".to_string()));
    assert_eq!(inflight.current(), 0);

    // Second poll fails: data is kept, the error is surfaced everywhere.
    tokio::time::sleep(Duration::from_millis(1_000)).await;
    settle().await;
    let state = berths.state();
    assert_eq!(state.data, Some("rotterdam: 12 berths".to_string()));
    assert_eq!(state.error.as_ref().and_then(ConsoleError::status_code), Some(503));

    assert_eq!(api_history.current().len(), 2);
    assert_eq!(
        kinds(&telemetry.current()),
        vec![EventKind::PageNav, EventKind::ApiError]
    );
    assert_eq!(notifications.current().len(), 1);
    assert_eq!(toasts.current().len(), 1);

    // Manual refresh recovers.
    let fresh = berths.refresh().await;
    assert_eq!(fresh, Ok("rotterdam: 12 berths".to_string()));
    assert_eq!(berths.error(), None);

    berths.unmount().await;
    let polled = calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(10_000)).await;
    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), polled);
    assert!(toasts.current().is_empty());
}

#[tokio::test]
async fn reset_is_seen_by_mounted_mirrors() {
    let ctx = ConsoleContext::init(ConsoleConfig::default());
    let telemetry = use_telemetry(&ctx);

    ctx.navigate("/fleet");
    ctx.track("export_manifest");
    assert_eq!(telemetry.current().len(), 2);

    ctx.reset();
    assert!(telemetry.current().is_empty());
    assert_eq!(telemetry.renders(), 3);
}

#[test]
fn theme_preference_survives_a_new_context() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prefs.json");
    let config = ConsoleConfig::default().with_storage_path(&path);

    let first = ConsoleContext::init(config.clone());
    assert_eq!(first.theme().current(), ThemePreference::System);
    first.theme().set(ThemePreference::Light).unwrap();

    let second = ConsoleContext::init(config);
    assert_eq!(second.theme().current(), ThemePreference::Light);
    assert!(second.telemetry().is_empty());
}
