//! Double-checked, stale-if-error provider cache.

use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::context::RequestContext;
use crate::metrics::{CacheOutcome, ProviderMetrics};

use super::{CacheConfig, FetchFailure};

/// A cached payload and its timestamps.
#[derive(Debug)]
pub struct CachedEntry<V> {
    pub payload: Arc<V>,
    pub fetched_at: Instant,
    pub expires_at: Instant,
}

impl<V> CachedEntry<V> {
    fn new(payload: Arc<V>, now: Instant, ttl: Duration) -> Self {
        Self {
            payload,
            fetched_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }

    /// Whether the entry may still be served when the provider fails.
    pub fn is_usable(&self, now: Instant, stale_if_error_ttl: Duration) -> bool {
        now < self.fetched_at + stale_if_error_ttl
    }
}

/// A read-only look at one entry.
#[derive(Debug, Clone)]
pub struct CachedView<V> {
    pub payload: Arc<V>,
    pub age: Duration,
    pub is_fresh: bool,
    pub is_usable: bool,
}

/// Entry counts by freshness. Dead entries awaiting cleanup count as stale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total: usize,
    pub fresh: usize,
    pub stale: usize,
}

struct CacheState<K, V> {
    entries: HashMap<K, CachedEntry<V>>,
    last_cleanup: Instant,
}

/// Time-bounded cache in front of one provider.
///
/// Lookups take the read lock; misses take the write lock and hold it
/// across the provider call, so concurrent misses on one instance result
/// in a single fetch. Forced refreshes fetch outside the lock, so fresh
/// entries stay readable meanwhile. When the provider fails, an expired
/// entry younger than `stale_if_error_ttl` is served instead of the error.
///
/// Waiting for either lock in [`ProviderCache::get`] is bounded by the
/// caller's context.
pub struct ProviderCache<K, V> {
    name: &'static str,
    config: CacheConfig,
    state: RwLock<CacheState<K, V>>,
    metrics: ProviderMetrics,
}

impl<K, V> ProviderCache<K, V>
where
    K: Eq + Hash + Clone + Debug + Display,
{
    pub fn new(name: &'static str, config: CacheConfig, metrics: ProviderMetrics) -> Self {
        Self {
            name,
            config,
            state: RwLock::new(CacheState {
                entries: HashMap::new(),
                last_cleanup: Instant::now(),
            }),
            metrics,
        }
    }

    /// Label used in logs and metrics.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// TTLs and cleanup interval this cache was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Return the cached payload for `key`, calling `fetch` on a miss.
    pub async fn get<F, Fut, E>(
        &self,
        ctx: &RequestContext,
        key: &K,
        fetch: F,
    ) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: FetchFailure + Display,
    {
        ctx.check()?;

        {
            let state = ctx.run(self.state.read()).await?;
            if let Some(entry) = state.entries.get(key)
                && entry.is_fresh(Instant::now())
            {
                self.metrics.record_cache(self.name, CacheOutcome::Hit);
                debug!(cache = self.name, %key, "cache hit");
                return Ok(entry.payload.clone());
            }
        }

        let mut state = ctx.run(self.state.write()).await?;

        // Another caller may have refreshed while we waited.
        if let Some(entry) = state.entries.get(key)
            && entry.is_fresh(Instant::now())
        {
            self.metrics.record_cache(self.name, CacheOutcome::Hit);
            debug!(cache = self.name, %key, "cache hit after wait");
            return Ok(entry.payload.clone());
        }

        self.metrics.record_cache(self.name, CacheOutcome::Miss);
        debug!(cache = self.name, %key, "cache miss, fetching");

        match fetch().await {
            Ok(payload) => Ok(self.store(&mut state, key.clone(), payload)),
            Err(err) => {
                if err.serves_stale()
                    && let Some(entry) = state.entries.get(key)
                    && entry.is_usable(Instant::now(), self.config.stale_if_error_ttl)
                {
                    self.metrics.record_cache(self.name, CacheOutcome::Stale);
                    warn!(
                        cache = self.name,
                        %key,
                        age_secs = entry.fetched_at.elapsed().as_secs(),
                        error = %err,
                        "provider failed, serving stale entry"
                    );
                    return Ok(entry.payload.clone());
                }

                warn!(cache = self.name, %key, error = %err, "provider failed, no usable entry");
                Err(err)
            }
        }
    }

    /// Fetch and store `key` regardless of freshness. Errors propagate.
    ///
    /// The fetch runs without the lock; readers keep getting the current
    /// entry until the new one is stored.
    pub async fn refresh<F, Fut, E>(
        &self,
        ctx: &RequestContext,
        key: &K,
        fetch: F,
    ) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: FetchFailure + Display,
    {
        ctx.check()?;

        match fetch().await {
            Ok(payload) => {
                let mut state = self.state.write().await;
                Ok(self.store(&mut state, key.clone(), payload))
            }
            Err(err) => {
                warn!(cache = self.name, %key, error = %err, "forced refresh failed");
                Err(err)
            }
        }
    }

    /// Look at an entry without fetching.
    pub async fn peek(&self, key: &K) -> Option<CachedView<V>> {
        let state = self.state.read().await;
        let now = Instant::now();
        state.entries.get(key).map(|entry| CachedView {
            payload: entry.payload.clone(),
            age: now.saturating_duration_since(entry.fetched_at),
            is_fresh: entry.is_fresh(now),
            is_usable: entry.is_usable(now, self.config.stale_if_error_ttl),
        })
    }

    /// Drop every entry.
    pub async fn invalidate(&self) {
        let mut state = self.state.write().await;
        let dropped = state.entries.len();
        state.entries.clear();
        info!(cache = self.name, dropped, "cache invalidated");
    }

    /// Count entries by freshness.
    pub async fn stats(&self) -> CacheStats {
        let state = self.state.read().await;
        let now = Instant::now();
        let total = state.entries.len();
        let fresh = state.entries.values().filter(|e| e.is_fresh(now)).count();
        CacheStats {
            total,
            fresh,
            stale: total - fresh,
        }
    }

    fn store(&self, state: &mut CacheState<K, V>, key: K, payload: V) -> Arc<V> {
        let now = Instant::now();
        let payload = Arc::new(payload);

        // Writes are serialized by the lock and `now` is monotonic, so
        // expires_at only moves forward.
        state
            .entries
            .insert(key, CachedEntry::new(payload.clone(), now, self.config.ttl));

        if now.saturating_duration_since(state.last_cleanup) >= self.config.cleanup_interval {
            self.sweep(state, now);
        }

        payload
    }

    fn sweep(&self, state: &mut CacheState<K, V>, now: Instant) {
        let before = state.entries.len();
        let stale_ttl = self.config.stale_if_error_ttl;
        state.entries.retain(|_, entry| entry.is_usable(now, stale_ttl));
        state.last_cleanup = now;

        let removed = before - state.entries.len();
        if removed > 0 {
            debug!(cache = self.name, removed, "swept dead entries");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::context::Interrupted;

    #[derive(Debug, Clone, PartialEq, thiserror::Error)]
    enum TestError {
        #[error("provider down")]
        Down,
        #[error("interrupted: {0}")]
        Interrupted(#[from] Interrupted),
    }

    impl FetchFailure for TestError {
        fn serves_stale(&self) -> bool {
            matches!(self, TestError::Down)
        }
    }

    fn config() -> CacheConfig {
        CacheConfig::new(Duration::from_secs(60), Duration::from_secs(600))
            .with_cleanup_interval(Duration::from_secs(3600))
    }

    fn cache() -> (ProviderCache<String, u32>, ProviderMetrics) {
        let metrics = ProviderMetrics::detached();
        (ProviderCache::new("test", config(), metrics.clone()), metrics)
    }

    async fn ok(calls: &AtomicUsize, value: u32) -> Result<u32, TestError> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(value)
    }

    async fn down(calls: &AtomicUsize) -> Result<u32, TestError> {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(TestError::Down)
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_entry_is_served_without_fetching() {
        let (cache, metrics) = cache();
        let ctx = RequestContext::background();
        let key = "k".to_string();
        let calls = AtomicUsize::new(0);

        assert_eq!(*cache.get(&ctx, &key, || ok(&calls, 1)).await.unwrap(), 1);
        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(*cache.get(&ctx, &key, || ok(&calls, 2)).await.unwrap(), 1);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(metrics.cache_count("test", CacheOutcome::Miss), 1);
        assert_eq!(metrics.cache_count("test", CacheOutcome::Hit), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_is_refetched() {
        let (cache, _) = cache();
        let ctx = RequestContext::background();
        let key = "k".to_string();
        let calls = AtomicUsize::new(0);

        cache.get(&ctx, &key, || ok(&calls, 1)).await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        let value = cache.get(&ctx, &key, || ok(&calls, 2)).await.unwrap();

        assert_eq!(*value, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_entry_served_when_provider_fails() {
        let (cache, metrics) = cache();
        let ctx = RequestContext::background();
        let key = "k".to_string();
        let calls = AtomicUsize::new(0);

        cache.get(&ctx, &key, || ok(&calls, 7)).await.unwrap();
        tokio::time::advance(Duration::from_secs(300)).await;

        let value = cache.get(&ctx, &key, || down(&calls)).await.unwrap();
        assert_eq!(*value, 7);
        assert_eq!(metrics.cache_count("test", CacheOutcome::Stale), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dead_entry_is_never_served() {
        let (cache, _) = cache();
        let ctx = RequestContext::background();
        let key = "k".to_string();
        let calls = AtomicUsize::new(0);

        cache.get(&ctx, &key, || ok(&calls, 7)).await.unwrap();
        tokio::time::advance(Duration::from_secs(601)).await;

        let err = cache.get(&ctx, &key, || down(&calls)).await.unwrap_err();
        assert_eq!(err, TestError::Down);
    }

    #[tokio::test(start_paused = true)]
    async fn error_without_entry_propagates() {
        let (cache, _) = cache();
        let calls = AtomicUsize::new(0);

        let err = cache
            .get(&RequestContext::background(), &"k".to_string(), || down(&calls))
            .await
            .unwrap_err();
        assert_eq!(err, TestError::Down);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_is_not_masked_by_stale_data() {
        let (cache, _) = cache();
        let key = "k".to_string();
        let calls = AtomicUsize::new(0);

        cache
            .get(&RequestContext::background(), &key, || ok(&calls, 7))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(120)).await;

        let ctx = RequestContext::background();
        ctx.cancel();
        let err = cache.get(&ctx, &key, || ok(&calls, 8)).await.unwrap_err();
        assert_eq!(err, TestError::Interrupted(Interrupted::Cancelled));

        // A fetch that reports cancellation is not answered from the cache either.
        let err = cache
            .get(&RequestContext::background(), &key, || async {
                Err::<u32, _>(TestError::Interrupted(Interrupted::Cancelled))
            })
            .await
            .unwrap_err();
        assert_eq!(err, TestError::Interrupted(Interrupted::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_misses_share_one_fetch() {
        let (cache, _) = cache();
        let cache = Arc::new(cache);
        let calls = Arc::new(AtomicUsize::new(0));

        let callers = (0..10).map(|_| {
            let cache = cache.clone();
            let calls = calls.clone();
            async move {
                cache
                    .get(&RequestContext::background(), &"k".to_string(), || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok::<_, TestError>(42)
                    })
                    .await
            }
        });
        let results = futures::future::join_all(callers).await;

        assert!(results.iter().all(|r| r.as_deref() == Ok(&42)));
        assert!(calls.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_bypasses_freshness() {
        let (cache, _) = cache();
        let ctx = RequestContext::background();
        let key = "k".to_string();
        let calls = AtomicUsize::new(0);

        cache.get(&ctx, &key, || ok(&calls, 1)).await.unwrap();
        let value = cache.refresh(&ctx, &key, || ok(&calls, 2)).await.unwrap();
        assert_eq!(*value, 2);
        assert_eq!(*cache.get(&ctx, &key, || ok(&calls, 3)).await.unwrap(), 2);

        let err = cache.refresh(&ctx, &key, || down(&calls)).await.unwrap_err();
        assert_eq!(err, TestError::Down);
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_reads_proceed_during_refresh() {
        let (cache, _) = cache();
        let cache = Arc::new(cache);
        let ctx = RequestContext::background();
        let key = "k".to_string();
        let calls = AtomicUsize::new(0);
        cache.get(&ctx, &key, || ok(&calls, 1)).await.unwrap();

        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let refresher = cache.clone();
        let refresh = tokio::spawn(async move {
            refresher
                .refresh(&RequestContext::background(), &"k".to_string(), move || async move {
                    let _ = started_tx.send(());
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok::<_, TestError>(2)
                })
                .await
        });
        started_rx.await.unwrap();

        let started = Instant::now();
        let reader = RequestContext::with_timeout(Duration::from_secs(1));
        let value = cache.get(&reader, &key, || ok(&calls, 3)).await.unwrap();
        assert_eq!(*value, 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert!(cache.peek(&key).await.unwrap().is_fresh);

        assert_eq!(*refresh.await.unwrap().unwrap(), 2);
        assert_eq!(*cache.get(&ctx, &key, || ok(&calls, 3)).await.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reader_deadline_bounds_wait_behind_a_miss() {
        let (cache, _) = cache();
        let cache = Arc::new(cache);
        let calls = AtomicUsize::new(0);
        cache
            .get(&RequestContext::background(), &"a".to_string(), || ok(&calls, 1))
            .await
            .unwrap();

        // A miss on another key holds the write lock for its whole fetch.
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let filler = cache.clone();
        let miss = tokio::spawn(async move {
            filler
                .get(&RequestContext::background(), &"b".to_string(), move || async move {
                    let _ = started_tx.send(());
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok::<_, TestError>(2)
                })
                .await
        });
        started_rx.await.unwrap();

        let started = Instant::now();
        let reader = RequestContext::with_timeout(Duration::from_secs(1));
        let err = cache
            .get(&reader, &"a".to_string(), || ok(&calls, 3))
            .await
            .unwrap_err();
        assert_eq!(err, TestError::Interrupted(Interrupted::DeadlineExceeded));
        assert!(started.elapsed() < Duration::from_secs(2));

        assert_eq!(*miss.await.unwrap().unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stats_and_invalidate() {
        let (cache, _) = cache();
        let ctx = RequestContext::background();
        let calls = AtomicUsize::new(0);

        cache.get(&ctx, &"a".to_string(), || ok(&calls, 1)).await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        cache.get(&ctx, &"b".to_string(), || ok(&calls, 2)).await.unwrap();

        assert_eq!(
            cache.stats().await,
            CacheStats {
                total: 2,
                fresh: 1,
                stale: 1
            }
        );

        let view = cache.peek(&"a".to_string()).await.unwrap();
        assert!(!view.is_fresh);
        assert!(view.is_usable);
        assert_eq!(view.age, Duration::from_secs(61));

        cache.invalidate().await;
        assert_eq!(cache.stats().await.total, 0);
        assert!(cache.peek(&"a".to_string()).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cleanup_sweeps_dead_entries() {
        let metrics = ProviderMetrics::detached();
        let cache: ProviderCache<String, u32> = ProviderCache::new(
            "sweep",
            CacheConfig::new(Duration::from_secs(10), Duration::from_secs(20))
                .with_cleanup_interval(Duration::from_secs(30)),
            metrics,
        );
        let ctx = RequestContext::background();
        let calls = AtomicUsize::new(0);

        cache.get(&ctx, &"old".to_string(), || ok(&calls, 1)).await.unwrap();
        tokio::time::advance(Duration::from_secs(31)).await;
        cache.get(&ctx, &"new".to_string(), || ok(&calls, 2)).await.unwrap();

        assert_eq!(cache.stats().await.total, 1);
        assert!(cache.peek(&"old".to_string()).await.is_none());
    }
}
