//! The shared resource cache.
//!
//! `ResourceStore` owns every cache slot. Controllers move a slot through its
//! states only via `set_loading` / `set_success` / `set_error` /
//! `invalidate`. Each slot sits behind its own `DashMap` shard lock, so
//! writes to one key are serialized while different keys proceed freely.
//! Listeners run after the lock is released and may call back into the store.
//!
//! Eviction is scheduled only when the last subscriber releases a slot. A slot
//! created by `get_or_create` or a refetch with nobody subscribed stays until
//! it has been subscribed and released once, or until [`ResourceStore::clear`].

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use tracing::{debug, trace, warn};

use crate::error::{ErrorInfo, SyncError};
use crate::query::QueryConfig;

use super::entry::{CacheEntry, CacheKey, Generation, RawEntry, Status};

type AnyData = Arc<dyn Any + Send + Sync>;
type RawListener = Arc<dyn Fn(&RawEntry) + Send + Sync>;

/// Hook the store uses to ask a query controller for a refetch.
pub(crate) trait Refetch: Send + Sync {
    fn trigger(self: Arc<Self>);
}

struct Slot {
    data: AnyData,
    status: Status,
    stale: bool,
    last_fetched_at: Option<DateTime<Utc>>,
    error: Option<ErrorInfo>,
    listeners: Vec<(u64, RawListener)>,
    /// Latest generation whose result was applied. Starts at the counter
    /// value when the slot was created so older requests never land.
    applied: u64,
    /// Value of the generation counter at the last invalidation.
    invalidated_at: u64,
    /// Bumped on every subscribe so a pending eviction can tell it was cancelled.
    eviction_token: u64,
}

impl Slot {
    fn new(data: AnyData, floor: u64) -> Self {
        Self {
            data,
            status: Status::Idle,
            stale: false,
            last_fetched_at: None,
            error: None,
            listeners: Vec::new(),
            applied: floor,
            invalidated_at: 0,
            eviction_token: 0,
        }
    }

    fn snapshot(&self, key: &CacheKey) -> RawEntry {
        CacheEntry {
            key: key.clone(),
            data: Arc::clone(&self.data),
            status: self.status,
            is_stale: self.stale,
            last_fetched_at: self.last_fetched_at,
            error: self.error.clone(),
            subscriber_count: self.listeners.len(),
        }
    }

    fn listeners(&self) -> Vec<RawListener> {
        self.listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
    }

    fn accepts(&self, generation: Generation) -> bool {
        generation.0 > self.applied
    }
}

struct StoreInner {
    slots: DashMap<CacheKey, Slot>,
    refetchers: DashMap<CacheKey, Weak<dyn Refetch>>,
    generation: AtomicU64,
    listener_ids: AtomicU64,
    eviction_grace: Duration,
}

/// Key-value store of cached resource collections.
///
/// Cloning yields another handle to the same store. Create one per session
/// and call [`ResourceStore::clear`] on logout.
#[derive(Clone)]
pub struct ResourceStore {
    inner: Arc<StoreInner>,
}

impl Default for ResourceStore {
    fn default() -> Self {
        Self::new(&QueryConfig::default())
    }
}

impl std::fmt::Debug for ResourceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceStore")
            .field("slots", &self.inner.slots.len())
            .field("eviction_grace", &self.inner.eviction_grace)
            .finish()
    }
}

impl ResourceStore {
    pub fn new(config: &QueryConfig) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                slots: DashMap::new(),
                refetchers: DashMap::new(),
                generation: AtomicU64::new(0),
                listener_ids: AtomicU64::new(0),
                eviction_grace: config.eviction_grace,
            }),
        }
    }

    fn current_generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    fn slot_or_insert(&self, key: &CacheKey, placeholder: impl FnOnce() -> AnyData) -> RefMut<'_, CacheKey, Slot> {
        let floor = self.current_generation();
        self.inner.slots.entry(key.clone()).or_insert_with(|| {
            trace!(key = %key, "Creating cache slot");
            Slot::new(placeholder(), floor)
        })
    }

    /// Returns the entry for `key`, creating an idle entry holding `T::default()` if absent.
    pub fn get_or_create<T>(&self, key: &CacheKey) -> Result<CacheEntry<T>, SyncError>
    where
        T: Default + Send + Sync + 'static,
    {
        self.get_or_create_with(key, T::default)
    }

    /// Like [`get_or_create`](Self::get_or_create) with a caller-supplied placeholder.
    pub fn get_or_create_with<T, P>(&self, key: &CacheKey, placeholder: P) -> Result<CacheEntry<T>, SyncError>
    where
        T: Send + Sync + 'static,
        P: FnOnce() -> T,
    {
        let raw = self.slot_or_insert(key, || Arc::new(placeholder()) as AnyData).snapshot(key);
        raw.downcast()
    }

    /// Current entry for `key`, if one exists.
    pub fn get<T>(&self, key: &CacheKey) -> Result<Option<CacheEntry<T>>, SyncError>
    where
        T: Send + Sync + 'static,
    {
        let raw = self.inner.slots.get(key).map(|slot| slot.snapshot(key));
        raw.map(RawEntry::downcast).transpose()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.inner.slots.contains_key(key)
    }

    pub fn subscriber_count(&self, key: &CacheKey) -> usize {
        self.inner
            .slots
            .get(key)
            .map(|slot| slot.listeners.len())
            .unwrap_or(0)
    }

    /// Register interest in `key`. `listener` runs after every change to the entry.
    pub fn subscribe<T, F>(&self, key: &CacheKey, listener: F) -> Result<Subscription, SyncError>
    where
        T: Default + Send + Sync + 'static,
        F: Fn(&CacheEntry<T>) + Send + Sync + 'static,
    {
        self.subscribe_with(key, T::default, listener)
    }

    /// Like [`subscribe`](Self::subscribe), creating the entry from `placeholder` if absent.
    pub fn subscribe_with<T, P, F>(&self, key: &CacheKey, placeholder: P, listener: F) -> Result<Subscription, SyncError>
    where
        T: Send + Sync + 'static,
        P: FnOnce() -> T,
        F: Fn(&CacheEntry<T>) + Send + Sync + 'static,
    {
        self.attach(key, placeholder, listener).map(|(subscription, _)| subscription)
    }

    /// Subscribe and return the entry as it stood right after the listener
    /// was added. The snapshot is taken under the same slot lock as the
    /// insert, so exactly one of several concurrent callers sees a
    /// `subscriber_count` of 1.
    pub(crate) fn attach<T, P, F>(
        &self,
        key: &CacheKey,
        placeholder: P,
        listener: F,
    ) -> Result<(Subscription, CacheEntry<T>), SyncError>
    where
        T: Send + Sync + 'static,
        P: FnOnce() -> T,
        F: Fn(&CacheEntry<T>) + Send + Sync + 'static,
    {
        let id = self.inner.listener_ids.fetch_add(1, Ordering::Relaxed);
        let raw: RawListener = Arc::new(move |entry: &RawEntry| {
            match entry.clone().downcast::<T>() {
                Ok(typed) => listener(&typed),
                Err(e) => warn!(key = %entry.key, error = %e, "Listener type does not match cache entry"),
            }
        });

        let snapshot = {
            let mut slot = self.slot_or_insert(key, || Arc::new(placeholder()) as AnyData);
            if !slot.data.is::<T>() {
                return Err(SyncError::TypeMismatch(key.to_string()));
            }
            slot.listeners.push((id, raw));
            slot.eviction_token += 1;
            debug!(key = %key, subscribers = slot.listeners.len(), "Subscribed");
            slot.snapshot(key)
        };

        let subscription = Subscription {
            store: self.clone(),
            key: key.clone(),
            id,
        };
        Ok((subscription, snapshot.downcast()?))
    }

    fn release(&self, key: &CacheKey, id: u64) {
        let token = {
            let Some(mut slot) = self.inner.slots.get_mut(key) else {
                return;
            };
            slot.listeners.retain(|(listener_id, _)| *listener_id != id);
            debug!(key = %key, subscribers = slot.listeners.len(), "Unsubscribed");
            if !slot.listeners.is_empty() {
                return;
            }
            slot.eviction_token
        };
        self.schedule_eviction(key, token);
    }

    fn schedule_eviction(&self, key: &CacheKey, token: u64) {
        let grace = self.inner.eviction_grace;
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) if !grace.is_zero() => handle,
            _ => {
                self.evict_if_idle(key, token);
                return;
            }
        };

        let weak = Arc::downgrade(&self.inner);
        let key = key.clone();
        handle.spawn(async move {
            tokio::time::sleep(grace).await;
            if let Some(inner) = weak.upgrade() {
                ResourceStore { inner }.evict_if_idle(&key, token);
            }
        });
    }

    fn evict_if_idle(&self, key: &CacheKey, token: u64) {
        let removed = self
            .inner
            .slots
            .remove_if(key, |_, slot| slot.listeners.is_empty() && slot.eviction_token == token);
        if removed.is_some() {
            debug!(key = %key, "Evicted cache entry");
        }
    }

    /// Mark `key` as loading and hand out the generation for the new request.
    ///
    /// Returns `None` when the entry no longer exists.
    pub fn set_loading(&self, key: &CacheKey) -> Option<Generation> {
        let (snapshot, listeners, generation) = {
            let mut slot = self.inner.slots.get_mut(key)?;
            let generation = Generation(self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1);
            slot.status = Status::Loading;
            (slot.snapshot(key), slot.listeners(), generation)
        };
        trace!(key = %key, generation = %generation, "Loading");
        Self::notify(&snapshot, &listeners);
        Some(generation)
    }

    /// Apply a successful result.
    ///
    /// Returns `Ok(false)` if the result was discarded because the entry was
    /// evicted or a newer request already landed, and `TypeMismatch` if `T`
    /// is not the type the entry holds.
    pub fn set_success<T>(&self, key: &CacheKey, generation: Generation, data: T) -> Result<bool, SyncError>
    where
        T: Send + Sync + 'static,
    {
        let (snapshot, listeners) = {
            let Some(mut slot) = self.inner.slots.get_mut(key) else {
                debug!(key = %key, generation = %generation, "Discarding result for evicted entry");
                return Ok(false);
            };
            if !slot.data.is::<T>() {
                return Err(SyncError::TypeMismatch(key.to_string()));
            }
            if !slot.accepts(generation) {
                debug!(key = %key, generation = %generation, applied = slot.applied, "Discarding stale result");
                return Ok(false);
            }
            slot.data = Arc::new(data);
            slot.status = Status::Success;
            slot.error = None;
            slot.stale = generation.0 <= slot.invalidated_at;
            slot.last_fetched_at = Some(Utc::now());
            slot.applied = generation.0;
            (slot.snapshot(key), slot.listeners())
        };
        Self::notify(&snapshot, &listeners);
        Ok(true)
    }

    /// Record a failed fetch. Previously cached data is kept for display.
    pub fn set_error(&self, key: &CacheKey, generation: Generation, error: ErrorInfo) -> bool {
        let (snapshot, listeners) = {
            let Some(mut slot) = self.inner.slots.get_mut(key) else {
                debug!(key = %key, generation = %generation, "Discarding error for evicted entry");
                return false;
            };
            if !slot.accepts(generation) {
                debug!(key = %key, generation = %generation, applied = slot.applied, "Discarding stale error");
                return false;
            }
            slot.status = Status::Error;
            slot.error = Some(error);
            slot.stale = true;
            slot.applied = generation.0;
            (slot.snapshot(key), slot.listeners())
        };
        Self::notify(&snapshot, &listeners);
        true
    }

    /// Mark `key` stale without dropping its data.
    ///
    /// With active subscribers the registered query controller refetches
    /// immediately; otherwise the refetch waits for the next subscription.
    pub fn invalidate(&self, key: &CacheKey) {
        let (snapshot, listeners) = {
            let Some(mut slot) = self.inner.slots.get_mut(key) else {
                trace!(key = %key, "Invalidate on absent entry");
                return;
            };
            slot.stale = true;
            slot.invalidated_at = self.current_generation();
            (slot.snapshot(key), slot.listeners())
        };
        debug!(key = %key, subscribers = listeners.len(), "Invalidated");
        Self::notify(&snapshot, &listeners);

        if listeners.is_empty() {
            return;
        }
        let refetcher = self
            .inner
            .refetchers
            .get(key)
            .and_then(|weak| weak.upgrade());
        match refetcher {
            Some(refetcher) => refetcher.trigger(),
            None => trace!(key = %key, "No query controller registered"),
        }
    }

    /// Whether `key` was invalidated after the request with `generation` was issued.
    pub fn invalidated_since(&self, key: &CacheKey, generation: Generation) -> bool {
        self.inner
            .slots
            .get(key)
            .map(|slot| slot.invalidated_at >= generation.0)
            .unwrap_or(false)
    }

    pub(crate) fn register_refetch(&self, key: &CacheKey, refetcher: Weak<dyn Refetch>) {
        self.inner.refetchers.insert(key.clone(), refetcher);
    }

    /// Drop every entry, e.g. on logout. Results still in flight are discarded on arrival.
    pub fn clear(&self) {
        let count = self.inner.slots.len();
        self.inner.slots.clear();
        self.inner.refetchers.clear();
        debug!(entries = count, "Cleared resource store");
    }

    fn notify(snapshot: &RawEntry, listeners: &[RawListener]) {
        for listener in listeners {
            listener(snapshot);
        }
    }
}

/// Handle for one registered listener. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    store: ResourceStore,
    key: CacheKey,
    id: u64,
}

impl Subscription {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Release explicitly; equivalent to dropping the handle.
    pub fn release(self) {}
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("id", &self.id)
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.store.release(&self.key, self.id);
    }
}
