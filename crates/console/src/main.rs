//! Demo: poll a simulated fleet service through the interceptor and dump the
//! mirrored stores as JSON.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use anyhow::Context;
use ocean_console::{
    ConsoleContext, EntityDataOptions, ThemePreference, fetch_fn, use_api_history,
    use_entity_data, use_telemetry,
};
use ocean_core::{ConsoleConfig, ConsoleError};
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Clone, Serialize)]
struct Vessel {
    name: String,
    berth: Option<String>,
}

/// Every third call fails with a structured upstream error.
async fn list_vessels(region: String, call: u32) -> Result<Vec<Vessel>, serde_json::Value> {
    tokio::time::sleep(Duration::from_millis(40)).await;
    if call % 3 == 2 {
        return Err(json!({
            "message": format!("fleet registry for {region} timed out"),
            "code": "UPSTREAM_TIMEOUT",
            "statusCode": 504,
        }));
    }
    Ok(vec![
        Vessel {
            name: format!("{region}-trawler-{call}"),
            berth: Some("B4".to_string()),
        },
        Vessel {
            name: format!("{region}-tug"),
            berth: None,
        },
    ])
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ocean_observability::init();

    let config = ConsoleConfig::from_env().with_refresh_interval(Duration::from_millis(250));
    let ctx = Arc::new(ConsoleContext::init(config));

    let telemetry = use_telemetry(&ctx);
    let api_history = use_api_history(&ctx);

    ctx.theme()
        .set(ThemePreference::Dark)
        .context("failed to persist theme preference")?;
    ctx.navigate("/fleet");

    let calls = Arc::new(AtomicU32::new(0));
    let fetcher = {
        let api = ctx.interceptor();
        let ctx = Arc::clone(&ctx);
        fetch_fn(move |region: String| {
            let api = api.clone();
            let ctx = Arc::clone(&ctx);
            let call = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                let result = api
                    .call("fleet", "list_vessels", list_vessels(region, call))
                    .await;
                if let Err(err) = &result {
                    ctx.notifications().notify_error("Fleet refresh failed", err);
                }
                result
            }
        })
    };

    let options = EntityDataOptions::from_config(ctx.config()).polling(true);
    let fleet = use_entity_data(fetcher, "north-sea".to_string(), options);

    tokio::time::sleep(Duration::from_millis(900)).await;
    fleet.set_filter("baltic".to_string());
    ctx.navigate("/fleet?region=baltic");
    tokio::time::sleep(Duration::from_millis(600)).await;

    let latest: Result<Vec<Vessel>, ConsoleError> = fleet.refresh().await;
    match &latest {
        Ok(vessels) => tracing::info!(count = vessels.len(), "manual refresh succeeded"),
        Err(err) => tracing::warn!(error = %err, "manual refresh failed"),
    }
    fleet.unmount().await;

    let report = json!({
        "session_id": ctx.session_id().to_string(),
        "vessels": fleet_snapshot(&latest),
        "telemetry": telemetry.current().as_slice(),
        "api_history": api_history.current().as_slice(),
        "notifications": ctx.notification_history().snapshot().as_slice(),
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("failed to encode report")?
    );
    Ok(())
}

fn fleet_snapshot(latest: &Result<Vec<Vessel>, ConsoleError>) -> serde_json::Value {
    match latest {
        Ok(vessels) => json!(vessels),
        Err(err) => json!({ "error": err }),
    }
}
