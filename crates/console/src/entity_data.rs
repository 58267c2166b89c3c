//! Polling data hook.
//!
//! [`use_entity_data`] binds an async [`Fetch`] operation to a filter and
//! keeps `{ data, loading, error }` in a watch-channel state container:
//!
//! - one fetch is dispatched on mount and one whenever the filter changes
//! - with `auto_refresh`, a fetch is re-dispatched every `refresh_interval`;
//!   the interval restarts on filter change and stops on unmount
//! - [`EntityData::refresh`] dispatches on demand and resolves once that
//!   fetch has settled
//!
//! Every dispatch is tagged with a strictly increasing [`RequestId`]. A
//! settling fetch is applied only if it is still the most recent dispatch, so
//! a slow early request can never overwrite a newer result. A failure sets
//! `error` but keeps the previously loaded `data`.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ocean_core::{ConsoleConfig, ConsoleError, RequestId};
use tokio::sync::{Notify, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Async fetch operation a polling hook is bound to.
#[async_trait]
pub trait Fetch: Send + Sync + 'static {
    type Filter: Clone + PartialEq + Send + Sync + 'static;
    type Output: Clone + Send + Sync + 'static;

    async fn fetch(&self, filter: &Self::Filter) -> Result<Self::Output, ConsoleError>;
}

/// Adapts an async closure into a [`Fetch`].
pub struct FetchFn<Fl, T, Func, Fut> {
    func: Func,
    _marker: PhantomData<fn(Fl) -> (T, Fut)>,
}

pub fn fetch_fn<Fl, T, Func, Fut>(func: Func) -> FetchFn<Fl, T, Func, Fut>
where
    Func: Fn(Fl) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ConsoleError>> + Send + 'static,
{
    FetchFn {
        func,
        _marker: PhantomData,
    }
}

#[async_trait]
impl<Fl, T, Func, Fut> Fetch for FetchFn<Fl, T, Func, Fut>
where
    Fl: Clone + PartialEq + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    Func: Fn(Fl) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ConsoleError>> + Send + 'static,
{
    type Filter = Fl;
    type Output = T;

    async fn fetch(&self, filter: &Fl) -> Result<T, ConsoleError> {
        (self.func)(filter.clone()).await
    }
}

/// State exposed by a polling hook.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityState<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<ConsoleError>,
    /// Most recently dispatched request.
    pub request_id: Option<RequestId>,
    /// When `data` was last replaced.
    pub updated_at: Option<DateTime<Utc>>,
}

impl<T> Default for EntityState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
            request_id: None,
            updated_at: None,
        }
    }
}

impl<T> EntityState<T> {
    /// `idle` = not loading, whatever the last outcome was.
    pub fn is_idle(&self) -> bool {
        !self.loading
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityDataOptions {
    pub auto_refresh: bool,
    pub refresh_interval: Duration,
}

impl Default for EntityDataOptions {
    fn default() -> Self {
        Self {
            auto_refresh: false,
            refresh_interval: ConsoleConfig::default().refresh_interval(),
        }
    }
}

impl EntityDataOptions {
    /// Options using the configured interval; auto-refresh stays off.
    pub fn from_config(config: &ConsoleConfig) -> Self {
        Self {
            auto_refresh: false,
            refresh_interval: config.refresh_interval(),
        }
    }

    pub fn with_auto_refresh(mut self, interval: Duration) -> Self {
        self.auto_refresh = true;
        self.refresh_interval = interval;
        self
    }

    pub fn polling(mut self, enabled: bool) -> Self {
        self.auto_refresh = enabled;
        self
    }

    fn ticker(&self) -> Option<Interval> {
        if !self.auto_refresh || self.refresh_interval.is_zero() {
            return None;
        }
        let period = self.refresh_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Some(ticker)
    }
}

struct Shared<F: Fetch> {
    fetcher: F,
    state: watch::Sender<EntityState<F::Output>>,
    latest: AtomicU64,
}

impl<F: Fetch> Shared<F> {
    async fn dispatch(&self, filter: F::Filter) -> Result<F::Output, ConsoleError> {
        let id = self.begin();
        self.run(id, filter).await
    }

    /// Take the next request id and enter `loading`.
    fn begin(&self) -> RequestId {
        let mut id = RequestId::new(0);
        self.state.send_modify(|s| {
            id = RequestId::new(self.latest.fetch_add(1, Ordering::SeqCst) + 1);
            s.loading = true;
            s.request_id = Some(id);
        });
        debug!(request_id = %id, "fetch dispatched");
        id
    }

    async fn run(&self, id: RequestId, filter: F::Filter) -> Result<F::Output, ConsoleError> {
        let result = self.fetcher.fetch(&filter).await;
        self.settle(id, &result);
        result
    }

    /// Leave `loading` after the driver's fetches were aborted; they will
    /// never settle.
    fn abandon(&self) {
        let cleared = self.state.send_if_modified(|s| {
            if !s.loading {
                return false;
            }
            s.loading = false;
            true
        });
        if cleared {
            debug!("pending fetches aborted; loading cleared");
        }
    }

    fn settle(&self, id: RequestId, result: &Result<F::Output, ConsoleError>) {
        let applied = self.state.send_if_modified(|s| {
            // Checked under the state lock so a concurrent dispatch cannot
            // slip in between the check and the write.
            if self.latest.load(Ordering::SeqCst) != id.value() {
                return false;
            }
            s.loading = false;
            match result {
                Ok(data) => {
                    s.data = Some(data.clone());
                    s.error = None;
                    s.updated_at = Some(Utc::now());
                }
                Err(err) => s.error = Some(err.clone()),
            }
            true
        });

        match (applied, result) {
            (false, _) => debug!(request_id = %id, "stale fetch result discarded"),
            (true, Ok(_)) => debug!(request_id = %id, "fetch settled"),
            (true, Err(err)) => warn!(request_id = %id, error = %err, "fetch failed"),
        }
    }
}

/// Handle to a mounted polling hook.
pub struct EntityData<F: Fetch> {
    shared: Arc<Shared<F>>,
    filter: watch::Sender<F::Filter>,
    shutdown: Arc<Notify>,
    driver: Option<JoinHandle<()>>,
}

/// Mount a polling hook: dispatch immediately and keep polling per
/// `options` until [`EntityData::unmount`] (or drop).
///
/// # Panics
///
/// Must be called from within a tokio runtime.
pub fn use_entity_data<F: Fetch>(
    fetcher: F,
    filter: F::Filter,
    options: EntityDataOptions,
) -> EntityData<F> {
    let (state, _) = watch::channel(EntityState::default());
    let shared = Arc::new(Shared {
        fetcher,
        state,
        latest: AtomicU64::new(0),
    });
    let (filter_tx, filter_rx) = watch::channel(filter);
    let shutdown = Arc::new(Notify::new());

    // The mount dispatch is visible before the driver first runs.
    let first = shared.begin();
    let driver = tokio::spawn(drive(
        Arc::clone(&shared),
        first,
        filter_rx,
        options,
        Arc::clone(&shutdown),
    ));

    EntityData {
        shared,
        filter: filter_tx,
        shutdown,
        driver: Some(driver),
    }
}

impl<F: Fetch> EntityData<F> {
    pub fn state(&self) -> EntityState<F::Output> {
        self.shared.state.borrow().clone()
    }

    /// Read through a selector without cloning the whole state.
    pub fn select<R>(&self, selector: impl FnOnce(&EntityState<F::Output>) -> R) -> R {
        selector(&self.shared.state.borrow())
    }

    pub fn data(&self) -> Option<F::Output> {
        self.select(|s| s.data.clone())
    }

    pub fn loading(&self) -> bool {
        self.select(|s| s.loading)
    }

    pub fn error(&self) -> Option<ConsoleError> {
        self.select(|s| s.error.clone())
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<EntityState<F::Output>> {
        self.shared.state.subscribe()
    }

    /// Wait for the next state change and return the new state.
    pub async fn changed(&self) -> EntityState<F::Output> {
        let mut rx = self.shared.state.subscribe();
        // The sender lives in `shared`, so the channel cannot close here.
        let _ = rx.changed().await;
        rx.borrow_and_update().clone()
    }

    pub fn filter(&self) -> F::Filter {
        self.filter.borrow().clone()
    }

    /// Replace the filter. An equal filter is ignored; a different one
    /// dispatches immediately and restarts the refresh interval.
    pub fn set_filter(&self, filter: F::Filter) {
        self.filter.send_if_modified(|current| {
            if *current == filter {
                return false;
            }
            *current = filter;
            true
        });
    }

    /// Fetch now with the current filter; resolves with this fetch's own
    /// outcome once it has settled.
    pub async fn refresh(&self) -> Result<F::Output, ConsoleError> {
        let filter = self.filter();
        self.shared.dispatch(filter).await
    }

    /// Stop polling and wait for the driver to exit. Fetches the driver
    /// started are aborted and `loading` is cleared; a `refresh` still
    /// awaited elsewhere completes and settles normally.
    pub async fn unmount(mut self) {
        self.shutdown.notify_one();
        if let Some(driver) = self.driver.take() {
            if let Err(err) = driver.await {
                if err.is_panic() {
                    warn!(error = %err, "entity data driver panicked");
                }
            }
        }
    }
}

impl<F: Fetch> Drop for EntityData<F> {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
            self.shared.abandon();
        }
    }
}

impl<F: Fetch> core::fmt::Debug for EntityData<F> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EntityData")
            .field("latest_request", &self.shared.latest.load(Ordering::SeqCst))
            .field("mounted", &self.driver.is_some())
            .finish()
    }
}

async fn drive<F: Fetch>(
    shared: Arc<Shared<F>>,
    first: RequestId,
    mut filter_rx: watch::Receiver<F::Filter>,
    options: EntityDataOptions,
    shutdown: Arc<Notify>,
) {
    let mut inflight: JoinSet<()> = JoinSet::new();
    let mut pending = Some(first);

    loop {
        let filter = filter_rx.borrow_and_update().clone();
        let id = pending.take().unwrap_or_else(|| shared.begin());
        spawn_fetch(&mut inflight, &shared, id, filter.clone());
        let mut ticker = options.ticker();

        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    inflight.abort_all();
                    shared.abandon();
                    info!("entity data hook unmounted");
                    return;
                }
                changed = filter_rx.changed() => {
                    if changed.is_err() {
                        inflight.abort_all();
                        return;
                    }
                    debug!("filter changed; restarting poll");
                    break;
                }
                _ = next_tick(&mut ticker) => {
                    let id = shared.begin();
                    spawn_fetch(&mut inflight, &shared, id, filter.clone());
                }
                Some(joined) = inflight.join_next(), if !inflight.is_empty() => {
                    if let Err(err) = joined {
                        if err.is_panic() {
                            warn!(error = %err, "fetch task panicked");
                        }
                    }
                }
            }
        }
    }
}

fn spawn_fetch<F: Fetch>(
    inflight: &mut JoinSet<()>,
    shared: &Arc<Shared<F>>,
    id: RequestId,
    filter: F::Filter,
) {
    let shared = Arc::clone(shared);
    inflight.spawn(async move {
        let _ = shared.run(id, filter).await;
    });
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(t) => {
            t.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    #[derive(Default)]
    struct Counting {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Fetch for Counting {
        type Filter = String;
        type Output = String;

        async fn fetch(&self, filter: &String) -> Result<String, ConsoleError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("{filter}#{n}"))
        }
    }

    /// Each call sleeps and then yields the scripted outcome for its index.
    struct Scripted {
        calls: Arc<AtomicUsize>,
        script: Vec<(u64, Result<&'static str, &'static str>)>,
    }

    #[async_trait]
    impl Fetch for Scripted {
        type Filter = ();
        type Output = String;

        async fn fetch(&self, _filter: &()) -> Result<String, ConsoleError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let (delay_ms, outcome) = self.script[n.min(self.script.len() - 1)];
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            outcome
                .map(str::to_string)
                .map_err(ConsoleError::message)
        }
    }

    fn every(ms: u64) -> EntityDataOptions {
        EntityDataOptions::default().with_auto_refresh(Duration::from_millis(ms))
    }

    #[tokio::test(start_paused = true)]
    async fn mount_fetches_once_then_on_each_interval() {
        let fetcher = Counting::default();
        let calls = fetcher.calls.clone();

        let hook = use_entity_data(fetcher, "fleet".to_string(), every(1000));
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(hook.data(), Some("fleet#1".to_string()));
        assert!(!hook.loading());

        tokio::time::advance(Duration::from_millis(999)).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(hook.data(), Some("fleet#2".to_string()));

        hook.unmount().await;
    }

    #[tokio::test(start_paused = true)]
    async fn unmount_before_the_interval_prevents_the_second_fetch() {
        let fetcher = Counting::default();
        let calls = fetcher.calls.clone();

        let hook = use_entity_data(fetcher, "fleet".to_string(), every(1000));
        settle().await;
        tokio::time::advance(Duration::from_millis(500)).await;
        hook.unmount().await;

        tokio::time::advance(Duration::from_millis(5000)).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn mount_is_loading_before_the_driver_first_runs() {
        let hook = use_entity_data(
            Counting::default(),
            "fleet".to_string(),
            EntityDataOptions::default(),
        );

        let state = hook.state();
        assert!(state.loading);
        assert_eq!(state.request_id, Some(RequestId::new(1)));

        settle().await;
        assert_eq!(hook.data(), Some("fleet#1".to_string()));
        assert_eq!(hook.state().request_id, Some(RequestId::new(1)));
        hook.unmount().await;
    }

    #[tokio::test(start_paused = true)]
    async fn unmount_during_a_fetch_clears_loading() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = Scripted {
            calls: calls.clone(),
            script: vec![(500, Ok("late"))],
        };
        let hook = use_entity_data(fetcher, (), EntityDataOptions::default());
        let rx = hook.subscribe();
        settle().await;
        assert!(rx.borrow().loading);

        hook.unmount().await;
        assert!(!rx.borrow().loading);

        tokio::time::sleep(Duration::from_millis(600)).await;
        settle().await;
        assert_eq!(rx.borrow().data, None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_clears_loading() {
        let fetcher = Scripted {
            calls: Arc::new(AtomicUsize::new(0)),
            script: vec![(500, Ok("late"))],
        };
        let hook = use_entity_data(fetcher, (), EntityDataOptions::default());
        let rx = hook.subscribe();
        settle().await;

        drop(hook);
        assert!(!rx.borrow().loading);
    }

    #[tokio::test(start_paused = true)]
    async fn without_auto_refresh_only_the_mount_fetch_happens() {
        let fetcher = Counting::default();
        let calls = fetcher.calls.clone();

        let hook = use_entity_data(fetcher, "fleet".to_string(), EntityDataOptions::default());
        settle().await;
        tokio::time::advance(Duration::from_secs(120)).await;
        settle().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        hook.unmount().await;
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_resolves_only_after_its_fetch_settles() {
        let gate = Arc::new(Notify::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = {
            let gate = gate.clone();
            let calls = calls.clone();
            fetch_fn(move |_: ()| {
                let gate = gate.clone();
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n > 1 {
                        gate.notified().await;
                    }
                    Ok::<_, ConsoleError>(n)
                }
            })
        };

        let hook = Arc::new(use_entity_data(fetcher, (), EntityDataOptions::default()));
        settle().await;
        assert_eq!(hook.data(), Some(1));

        let h = hook.clone();
        let pending = tokio::spawn(async move { h.refresh().await });
        settle().await;
        assert!(!pending.is_finished());
        assert!(hook.loading());

        gate.notify_one();
        settle().await;
        assert!(pending.is_finished());
        assert_eq!(pending.await.unwrap(), Ok(2));
        assert_eq!(hook.data(), Some(2));
        assert!(!hook.loading());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_results_do_not_overwrite_newer_ones() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = Scripted {
            calls: calls.clone(),
            script: vec![(500, Ok("old")), (10, Ok("new"))],
        };

        let hook = use_entity_data(fetcher, (), EntityDataOptions::default());
        settle().await;
        assert!(hook.loading());

        let fresh = hook.refresh().await;
        assert_eq!(fresh, Ok("new".to_string()));

        tokio::time::sleep(Duration::from_millis(600)).await;
        settle().await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(hook.data(), Some("new".to_string()));
        assert!(!hook.loading());
        assert_eq!(hook.state().request_id, Some(RequestId::new(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn failure_keeps_previous_data_and_sets_error() {
        let fetcher = Scripted {
            calls: Arc::new(AtomicUsize::new(0)),
            script: vec![(0, Ok("vessels")), (0, Err("upstream unavailable"))],
        };

        let hook = use_entity_data(fetcher, (), EntityDataOptions::default());
        settle().await;
        assert_eq!(hook.data(), Some("vessels".to_string()));

        let outcome = hook.refresh().await;
        assert_eq!(outcome, Err(ConsoleError::message("upstream unavailable")));

        let state = hook.state();
        assert_eq!(state.data, Some("vessels".to_string()));
        assert_eq!(state.error, Some(ConsoleError::message("upstream unavailable")));
        assert!(state.is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn filter_change_refetches_and_restarts_the_interval() {
        let fetcher = Counting::default();
        let calls = fetcher.calls.clone();

        let hook = use_entity_data(fetcher, "north".to_string(), every(1000));
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_millis(600)).await;
        hook.set_filter("north".to_string());
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        hook.set_filter("south".to_string());
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(hook.data(), Some("south#2".to_string()));

        // The old schedule would have fired at 1000ms.
        tokio::time::advance(Duration::from_millis(600)).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        tokio::time::advance(Duration::from_millis(400)).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(hook.data(), Some("south#3".to_string()));

        hook.unmount().await;
    }

    #[tokio::test(start_paused = true)]
    async fn state_changes_are_observable() {
        let hook = use_entity_data(Counting::default(), "fleet".to_string(), EntityDataOptions::default());
        let mut rx = hook.subscribe();

        rx.wait_for(|s| s.data.is_some()).await.unwrap();
        assert_eq!(hook.select(|s| s.request_id), Some(RequestId::new(1)));
        hook.unmount().await;
    }
}
