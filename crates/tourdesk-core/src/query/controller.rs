//! Per-key fetch orchestration.
//!
//! A [`QueryController`] owns the fetch lifecycle of one cache key:
//!
//! 1. The first subscriber triggers a fetch when the entry is idle or stale
//! 2. While anyone is subscribed the fetch repeats on a fixed interval
//! 3. Concurrent triggers join the request already in flight
//! 4. An invalidation that lands mid-flight schedules one follow-up fetch
//!
//! Results go through the [`ResourceStore`]; the controller never writes
//! entry fields itself.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::de::DeserializeOwned;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace, warn};

use crate::api::Transport;
use crate::cache::{CacheEntry, CacheKey, Refetch, ResourceStore, Subscription};
use crate::envelope;
use crate::error::{ErrorInfo, SyncError};

use super::QueryConfig;

/// Produces a fresh value for a key.
pub type Fetcher<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, SyncError>> + Send + Sync>;

/// A fetch that any number of callers can await. Resolves to the entry after
/// the result was applied, or `None` if the entry was evicted meanwhile.
pub type PendingFetch<T> = Shared<BoxFuture<'static, Option<CacheEntry<T>>>>;

struct ControlState<T> {
    in_flight: Option<PendingFetch<T>>,
    poller: Option<JoinHandle<()>>,
}

struct QueryInner<T> {
    key: CacheKey,
    store: ResourceStore,
    config: QueryConfig,
    fetcher: Fetcher<T>,
    placeholder: Arc<dyn Fn() -> T + Send + Sync>,
    state: Mutex<ControlState<T>>,
}

impl<T> QueryInner<T> {
    fn lock_state(&self) -> MutexGuard<'_, ControlState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stop_polling(&self) {
        if let Some(poller) = self.lock_state().poller.take() {
            debug!(key = %self.key, "Polling stopped");
            poller.abort();
        }
    }
}

impl<T: Send + Sync + 'static> QueryInner<T> {
    async fn run_fetch(self: Arc<Self>) -> Option<CacheEntry<T>> {
        // a direct refetch may run before anyone subscribed
        let placeholder = Arc::clone(&self.placeholder);
        if let Err(e) = self.store.get_or_create_with(&self.key, move || placeholder()) {
            warn!(key = %self.key, error = %e, "Cannot fetch into cache entry");
            self.lock_state().in_flight = None;
            return None;
        }

        let Some(generation) = self.store.set_loading(&self.key) else {
            debug!(key = %self.key, "Entry evicted before fetch started");
            self.lock_state().in_flight = None;
            return None;
        };

        debug!(key = %self.key, generation = %generation, "Fetching");
        match (self.fetcher)().await {
            Ok(data) => match self.store.set_success(&self.key, generation, data) {
                Ok(true) => trace!(key = %self.key, generation = %generation, "Fetch applied"),
                Ok(false) => {}
                Err(e) => warn!(key = %self.key, error = %e, "Cannot apply fetch result"),
            },
            Err(e) => {
                warn!(key = %self.key, generation = %generation, error = %e, "Fetch failed");
                self.store.set_error(&self.key, generation, ErrorInfo::from(&e));
            }
        }

        // an invalidate landing after this check finds no fetch in flight and
        // starts its own; one landing before it joins the follow-up
        let follow_up = {
            let mut state = self.lock_state();
            state.in_flight = None;
            if self.store.invalidated_since(&self.key, generation)
                && self.store.subscriber_count(&self.key) > 0
            {
                debug!(key = %self.key, "Invalidated while fetching, refetching");
                Some(self.begin(&mut state))
            } else {
                None
            }
        };
        if let Some(pending) = follow_up {
            self.drive(&pending);
        }

        self.store.get::<T>(&self.key).ok().flatten()
    }

    /// Record a new fetch as in flight. The caller holds the state lock.
    fn begin(self: &Arc<Self>, state: &mut ControlState<T>) -> PendingFetch<T> {
        let pending = Arc::clone(self).run_fetch().boxed().shared();
        state.in_flight = Some(pending.clone());
        pending
    }

    /// Run `pending` to completion on the runtime, whether or not anyone awaits it.
    fn drive(&self, pending: &PendingFetch<T>) {
        match Handle::try_current() {
            Ok(handle) => {
                let driver = pending.clone();
                handle.spawn(async move {
                    driver.await;
                });
            }
            Err(_) => warn!(key = %self.key, "No runtime, fetch runs only when awaited"),
        }
    }
}

impl<T: Send + Sync + 'static> Refetch for QueryInner<T> {
    fn trigger(self: Arc<Self>) {
        drop(QueryController::from_inner(self).refetch());
    }
}

/// Fetch orchestration for one cache key. Cloning shares the controller.
pub struct QueryController<T> {
    inner: Arc<QueryInner<T>>,
}

impl<T> Clone for QueryController<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for QueryController<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryController")
            .field("key", &self.inner.key)
            .field("config", &self.inner.config)
            .finish()
    }
}

impl<T: Default + Send + Sync + 'static> QueryController<T> {
    /// Controller whose entry starts out holding `T::default()`.
    pub fn new<F>(key: impl Into<CacheKey>, store: ResourceStore, config: QueryConfig, fetcher: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<T, SyncError>> + Send + Sync + 'static,
    {
        Self::with_placeholder(key, store, config, T::default, fetcher)
    }
}

impl<T: DeserializeOwned + Default + Send + Sync + 'static> QueryController<T> {
    /// Controller that fetches `GET <path>` and caches the envelope payload.
    pub fn for_path(
        key: impl Into<CacheKey>,
        path: impl Into<String>,
        store: ResourceStore,
        config: QueryConfig,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self::new(key, store, config, fetch_payload(transport, path))
    }
}

impl<T: Send + Sync + 'static> QueryController<T> {
    /// Controller with an explicit placeholder for the entry before the first fetch.
    pub fn with_placeholder<P, F>(
        key: impl Into<CacheKey>,
        store: ResourceStore,
        config: QueryConfig,
        placeholder: P,
        fetcher: F,
    ) -> Self
    where
        P: Fn() -> T + Send + Sync + 'static,
        F: Fn() -> BoxFuture<'static, Result<T, SyncError>> + Send + Sync + 'static,
    {
        let key = key.into();
        let inner = Arc::new(QueryInner {
            key: key.clone(),
            store: store.clone(),
            config,
            fetcher: Arc::new(fetcher),
            placeholder: Arc::new(placeholder),
            state: Mutex::new(ControlState {
                in_flight: None,
                poller: None,
            }),
        });
        let refetcher: Weak<dyn Refetch> = Arc::downgrade(&inner) as Weak<dyn Refetch>;
        store.register_refetch(&key, refetcher);
        Self { inner }
    }

    fn from_inner(inner: Arc<QueryInner<T>>) -> Self {
        Self { inner }
    }

    pub fn key(&self) -> &CacheKey {
        &self.inner.key
    }

    /// Current entry, created with the placeholder if absent.
    pub fn entry(&self) -> Result<CacheEntry<T>, SyncError> {
        let placeholder = Arc::clone(&self.inner.placeholder);
        self.inner
            .store
            .get_or_create_with(&self.inner.key, move || placeholder())
    }

    pub fn is_fetching(&self) -> bool {
        self.inner.lock_state().in_flight.is_some()
    }

    pub fn is_polling(&self) -> bool {
        self.inner
            .lock_state()
            .poller
            .as_ref()
            .is_some_and(|poller| !poller.is_finished())
    }

    /// Attach a listener. The first subscriber triggers a fetch when the
    /// entry is idle or stale, and polling runs while any subscriber remains.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn subscribe<F>(&self, listener: F) -> Result<QuerySubscription<T>, SyncError>
    where
        F: Fn(&CacheEntry<T>) + Send + Sync + 'static,
    {
        let placeholder = Arc::clone(&self.inner.placeholder);
        let (subscription, entry) =
            self.inner
                .store
                .attach(&self.inner.key, move || placeholder(), listener)?;

        if entry.subscriber_count == 1 && entry.needs_fetch(self.inner.config.stale_time) {
            drop(self.refetch());
        }
        self.ensure_polling();

        Ok(QuerySubscription {
            subscription: Some(subscription),
            inner: Arc::downgrade(&self.inner),
        })
    }

    /// Start a fetch, or join the one already in flight.
    ///
    /// The request runs to completion on a background task even if the
    /// returned future is dropped.
    pub fn refetch(&self) -> PendingFetch<T> {
        let mut state = self.inner.lock_state();
        if let Some(pending) = state.in_flight.as_ref() {
            trace!(key = %self.inner.key, "Joining in-flight fetch");
            return pending.clone();
        }

        let pending = self.inner.begin(&mut state);
        drop(state);

        self.inner.drive(&pending);
        pending
    }

    fn ensure_polling(&self) {
        let period = self.inner.config.poll_interval;
        if period.is_zero() {
            return;
        }
        let mut state = self.inner.lock_state();
        if state.poller.as_ref().is_some_and(|poller| !poller.is_finished()) {
            return;
        }
        let Ok(handle) = Handle::try_current() else {
            warn!(key = %self.inner.key, "No runtime, polling disabled");
            return;
        };
        debug!(key = %self.inner.key, interval_ms = period.as_millis() as u64, "Polling started");
        state.poller = Some(handle.spawn(poll(Arc::downgrade(&self.inner), period)));
    }
}

async fn poll<T: Send + Sync + 'static>(weak: Weak<QueryInner<T>>, period: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(inner) = weak.upgrade() else {
            return;
        };
        if inner.store.subscriber_count(&inner.key) == 0 {
            debug!(key = %inner.key, "No subscribers, polling stopped");
            return;
        }
        trace!(key = %inner.key, "Poll tick");
        let pending = QueryController::from_inner(inner).refetch();
        pending.await;
    }
}

/// Fetcher for `GET <path>` returning the decoded envelope payload.
pub fn fetch_payload<T>(
    transport: Arc<dyn Transport>,
    path: impl Into<String>,
) -> impl Fn() -> BoxFuture<'static, Result<T, SyncError>> + Send + Sync + 'static
where
    T: DeserializeOwned + Send + 'static,
{
    let path = path.into();
    move || {
        let transport = Arc::clone(&transport);
        let path = path.clone();
        async move {
            let body = transport.get(&path).await?;
            let envelope = envelope::decode::<T>(&body)?;
            Ok(envelope.payload)
        }
        .boxed()
    }
}

/// Interest in a query. Dropping it unsubscribes; the last one stops polling.
#[must_use = "dropping a QuerySubscription unsubscribes immediately"]
pub struct QuerySubscription<T> {
    subscription: Option<Subscription>,
    inner: Weak<QueryInner<T>>,
}

impl<T> QuerySubscription<T> {
    pub fn key(&self) -> Option<&CacheKey> {
        self.subscription.as_ref().map(Subscription::key)
    }

    /// Release explicitly; equivalent to dropping the handle.
    pub fn release(self) {}
}

impl<T> Drop for QuerySubscription<T> {
    fn drop(&mut self) {
        drop(self.subscription.take());
        if let Some(inner) = self.inner.upgrade() {
            if inner.store.subscriber_count(&inner.key) == 0 {
                inner.stop_polling();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_controller(store: &ResourceStore, calls: Arc<AtomicUsize>) -> QueryController<Vec<u32>> {
        QueryController::new("numbers", store.clone(), QueryConfig::default(), move || {
            let calls = Arc::clone(&calls);
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) as u32;
                Ok(vec![n])
            }
            .boxed()
        })
    }

    #[tokio::test]
    async fn test_refetch_applies_result() {
        let store = ResourceStore::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let query = counting_controller(&store, Arc::clone(&calls));

        let entry = query.refetch().await.expect("entry exists");
        assert!(entry.is_success());
        assert_eq!(*entry.data, vec![0]);
        assert!(!query.is_fetching());
    }

    #[tokio::test]
    async fn test_entry_uses_placeholder() {
        let store = ResourceStore::default();
        let query = QueryController::with_placeholder(
            "names",
            store,
            QueryConfig::default(),
            || vec!["loading".to_string()],
            || async { Ok(vec!["a".to_string()]) }.boxed(),
        );
        let entry = query.entry().expect("entry");
        assert_eq!(*entry.data, vec!["loading".to_string()]);
        assert_eq!(entry.status, crate::cache::Status::Idle);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_recorded_not_returned() {
        let store = ResourceStore::default();
        let query: QueryController<Vec<u32>> =
            QueryController::new("broken", store, QueryConfig::default(), || {
                async {
                    Err(SyncError::from(crate::api::TransportError::ServerError(
                        "down".to_string(),
                    )))
                }
                .boxed()
            });

        let entry = query.refetch().await.expect("entry exists");
        assert!(entry.is_error());
        assert_eq!(entry.error.map(|e| e.message), Some("down".to_string()));
        assert!(entry.data.is_empty());
    }

    #[tokio::test]
    async fn test_last_subscription_stops_polling() {
        let store = ResourceStore::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let query = counting_controller(&store, Arc::clone(&calls));

        let sub = query.subscribe(|_| {}).expect("subscribe");
        assert!(query.is_polling());
        drop(sub);
        assert!(!query.is_polling());
    }
}
