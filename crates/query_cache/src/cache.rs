use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};

use serde_json::Value;
use tokio::{sync::Mutex, time::Instant};

use crate::keys::QueryKey;

const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// How long a fetched value is served without re-fetching.
    pub stale_time: Duration,
    /// Entries not read for this long are dropped by [`QueryCache::collect_garbage`].
    pub gc_time: Duration,
    /// Extra attempts for failed reads. Mutations are never retried.
    pub retry: u32,
    /// Base delay between read attempts, doubled on each retry.
    pub retry_delay: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_time: Duration::from_secs(60),
            gc_time: Duration::from_secs(5 * 60),
            retry: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl CacheConfig {
    /// Delay before retry number `attempt` (0-based).
    pub fn retry_delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.retry_delay
            .saturating_mul(factor)
            .min(MAX_RETRY_DELAY)
    }
}

#[derive(Debug)]
struct Entry {
    data: Arc<Value>,
    updated_at: Instant,
    last_access: Instant,
    invalidated: bool,
    /// Store version at the time this value was written.
    version: u64,
}

impl Entry {
    fn is_stale(&self, now: Instant, stale_time: Duration) -> bool {
        self.invalidated || now.saturating_duration_since(self.updated_at) >= stale_time
    }
}

#[derive(Debug, Default)]
struct Store {
    entries: HashMap<QueryKey, Entry>,
    /// Keys with a fetch in flight, flagged once invalidated during the fetch.
    pending: HashMap<QueryKey, bool>,
    /// Bumped on every write.
    version: u64,
}

impl Store {
    fn insert(&mut self, key: QueryKey, data: Arc<Value>, invalidated: bool) {
        let now = Instant::now();
        self.version += 1;
        self.entries.insert(
            key,
            Entry {
                data,
                updated_at: now,
                last_access: now,
                invalidated,
                version: self.version,
            },
        );
    }
}

#[derive(Debug, Default)]
struct Inner {
    config: CacheConfig,
    store: Mutex<Store>,
    /// One gate per key with a fetch in flight.
    inflight: Mutex<HashMap<QueryKey, Arc<Mutex<()>>>>,
}

/// Client-side store of fetched results, addressed by [`QueryKey`].
///
/// Cloning is cheap and every clone shares the same entries.
#[derive(Clone, Debug, Default)]
pub struct QueryCache {
    inner: Arc<Inner>,
}

impl QueryCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                ..Inner::default()
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Cached value for `key`, fresh or stale.
    pub async fn get(&self, key: &QueryKey) -> Option<Arc<Value>> {
        let mut store = self.inner.store.lock().await;
        let entry = store.entries.get_mut(key)?;
        entry.last_access = Instant::now();
        Some(entry.data.clone())
    }

    pub async fn set(&self, key: QueryKey, value: Value) -> Arc<Value> {
        let data = Arc::new(value);
        self.inner
            .store
            .lock()
            .await
            .insert(key, data.clone(), false);
        data
    }

    /// `true` when there is no entry or the entry must be re-fetched.
    pub async fn is_stale(&self, key: &QueryKey) -> bool {
        let store = self.inner.store.lock().await;
        store
            .entries
            .get(key)
            .is_none_or(|entry| entry.is_stale(Instant::now(), self.inner.config.stale_time))
    }

    /// Fresh value for `key`, otherwise the current store version.
    async fn fresh(&self, key: &QueryKey) -> Result<Arc<Value>, u64> {
        let mut store = self.inner.store.lock().await;
        let version = store.version;
        let now = Instant::now();
        match store.entries.get_mut(key) {
            Some(entry) if !entry.is_stale(now, self.inner.config.stale_time) => {
                entry.last_access = now;
                Ok(entry.data.clone())
            }
            _ => Err(version),
        }
    }

    /// Reuses a value written after `since` and not invalidated since then.
    /// Otherwise marks `key` as being fetched and returns `None`.
    async fn begin(&self, key: &QueryKey, since: u64) -> Option<Arc<Value>> {
        let mut store = self.inner.store.lock().await;
        if let Some(entry) = store.entries.get_mut(key)
            && !entry.invalidated
            && entry.version > since
        {
            entry.last_access = Instant::now();
            return Some(entry.data.clone());
        }
        store.pending.insert(key.clone(), false);
        None
    }

    /// Stores a fetched value, already stale when `key` was invalidated
    /// while the fetch was in flight.
    async fn finish(&self, key: &QueryKey, value: Value) -> Arc<Value> {
        let data = Arc::new(value);
        let mut store = self.inner.store.lock().await;
        let invalidated = store.pending.remove(key).unwrap_or(false);
        if invalidated {
            tracing::debug!(%key, "invalidated while fetching, stored as stale");
        }
        store.insert(key.clone(), data.clone(), invalidated);
        data
    }

    async fn abandon(&self, key: &QueryKey) {
        self.inner.store.lock().await.pending.remove(key);
    }

    /// Returns the fresh value for `key`, calling `fetcher` only when needed.
    ///
    /// Concurrent calls for the same key wait for the first fetch and reuse
    /// its result, even when it is already past `stale_time`. A failed fetch
    /// leaves the cache untouched and the next waiter tries again.
    pub async fn fetch<F, Fut, E>(&self, key: &QueryKey, fetcher: F) -> Result<Arc<Value>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, E>>,
    {
        let since = match self.fresh(key).await {
            Ok(data) => {
                tracing::trace!(%key, "cache hit");
                return Ok(data);
            }
            Err(version) => version,
        };

        let gate = {
            let mut inflight = self.inner.inflight.lock().await;
            inflight.entry(key.clone()).or_default().clone()
        };

        let result = {
            let _guard = gate.lock().await;
            match self.begin(key, since).await {
                Some(data) => {
                    tracing::trace!(%key, "fetch deduplicated");
                    Ok(data)
                }
                None => {
                    tracing::debug!(%key, "fetching");
                    match fetcher().await {
                        Ok(value) => Ok(self.finish(key, value).await),
                        Err(err) => {
                            self.abandon(key).await;
                            Err(err)
                        }
                    }
                }
            }
        };

        let mut inflight = self.inner.inflight.lock().await;
        // The map and this call hold the only references: nobody is waiting.
        if Arc::strong_count(&gate) <= 2 {
            inflight.remove(key);
        }
        // Release our reference while still holding the map lock, so the
        // last waiter sees an accurate count.
        drop(gate);
        drop(inflight);

        result
    }

    /// Marks every entry under `prefix` stale, including values still being
    /// fetched. Data stays readable through [`QueryCache::get`] until
    /// re-fetched. Returns the number of entries and fetches marked.
    pub async fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut store = self.inner.store.lock().await;
        let mut count = 0;
        for (key, entry) in store.entries.iter_mut() {
            if key.starts_with(prefix) {
                entry.invalidated = true;
                count += 1;
            }
        }
        for (key, invalidated) in store.pending.iter_mut() {
            if key.starts_with(prefix) && !*invalidated {
                *invalidated = true;
                count += 1;
            }
        }
        tracing::debug!(%prefix, count, "invalidated");
        count
    }

    pub async fn remove(&self, prefix: &QueryKey) -> usize {
        let mut store = self.inner.store.lock().await;
        let before = store.entries.len();
        store.entries.retain(|key, _| !key.starts_with(prefix));
        before - store.entries.len()
    }

    /// Drops entries idle for longer than `gc_time`.
    pub async fn collect_garbage(&self) -> usize {
        self.collect_garbage_at(Instant::now()).await
    }

    async fn collect_garbage_at(&self, now: Instant) -> usize {
        let gc_time = self.inner.config.gc_time;
        let mut store = self.inner.store.lock().await;
        let before = store.entries.len();
        store.entries.retain(|_, entry| now.saturating_duration_since(entry.last_access) <= gc_time);
        let removed = before - store.entries.len();
        if removed > 0 {
            tracing::debug!(removed, "collected idle cache entries");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.inner.store.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
