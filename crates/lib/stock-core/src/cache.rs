//! Short-lived result cache with single-flight coalescing.
//!
//! Entries are keyed by tool name and canonical arguments. Each key owns a
//! slot with its own lock, so lookups for unrelated keys never wait on each
//! other; the map lock is only held to find or insert a slot.
//!
//! A miss spawns the compute on its own task. Callers await a shared handle
//! to that task, so a caller that goes away does not cancel the fetch other
//! callers are waiting on; the task stores its result before resolving.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use stock_schema::ToolResult;
use stock_schema::schema::DataKind;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error};

use crate::clock::Clock;
use crate::errors::ToolError;

const DEFAULT_ERROR_TTL: Duration = Duration::from_secs(10);

/// Cache key: tool name plus canonical argument string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub tool: String,
    pub args: String,
}

impl CacheKey {
    pub fn new(tool: impl Into<String>, args: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            args: args.into(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}?{}", self.tool, self.args)
    }
}

/// Stored result. Immutable; a refresh replaces the whole entry.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub value: ToolResult,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Lifetimes for one data kind. A zero duration disables caching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtl {
    pub success: Duration,
    pub error: Duration,
}

impl CacheTtl {
    #[must_use]
    pub const fn for_result(&self, result: &ToolResult) -> Duration {
        if result.is_success() {
            self.success
        } else {
            self.error
        }
    }
}

/// Per-kind TTLs plus the error TTL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtlPolicy {
    kinds: HashMap<DataKind, Duration>,
    error_ttl: Duration,
}

impl TtlPolicy {
    #[must_use]
    pub const fn default_ttl(kind: DataKind) -> Duration {
        match kind {
            DataKind::History => Duration::from_secs(15),
            DataKind::News => Duration::from_secs(5 * 60),
            DataKind::Profile
            | DataKind::Recommendations
            | DataKind::PriceTargets
            | DataKind::Revisions
            | DataKind::SectorTop => Duration::from_secs(60 * 60),
            DataKind::Statement | DataKind::CorporateActions | DataKind::Calendar => {
                Duration::from_secs(6 * 60 * 60)
            }
        }
    }

    #[must_use]
    pub fn with_kind_ttl(mut self, kind: DataKind, ttl: Duration) -> Self {
        self.kinds.insert(kind, ttl);
        self
    }

    #[must_use]
    pub const fn with_error_ttl(mut self, ttl: Duration) -> Self {
        self.error_ttl = ttl;
        self
    }

    /// TTLs for a kind. Errors never outlive a success of the same kind.
    #[must_use]
    pub fn ttl_for(&self, kind: DataKind) -> CacheTtl {
        let success = self
            .kinds
            .get(&kind)
            .copied()
            .unwrap_or_else(|| Self::default_ttl(kind));
        CacheTtl {
            success,
            error: self.error_ttl.min(success),
        }
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            kinds: HashMap::new(),
            error_ttl: DEFAULT_ERROR_TTL,
        }
    }
}

/// Snapshot of cache occupancy and counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub in_flight: usize,
    pub hits: u64,
    pub coalesced: u64,
    pub computes: u64,
}

type Flight = Shared<BoxFuture<'static, ToolResult>>;

#[derive(Default)]
struct SlotState {
    entry: Option<Arc<CacheEntry>>,
    flight: Option<Flight>,
    // Set when the slot is dropped from the map; holders must look it up again.
    retired: bool,
}

#[derive(Default)]
struct CacheSlot {
    state: Mutex<SlotState>,
}

impl CacheSlot {
    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Default)]
struct CacheCounters {
    hits: AtomicU64,
    coalesced: AtomicU64,
    computes: AtomicU64,
}

struct CacheInner {
    slots: RwLock<HashMap<CacheKey, Arc<CacheSlot>>>,
    policy: TtlPolicy,
    clock: Arc<dyn Clock>,
    counters: CacheCounters,
}

impl CacheInner {
    fn store(&self, slot: &CacheSlot, key: CacheKey, value: ToolResult, ttl: CacheTtl) {
        let ttl = ttl.for_result(&value);
        let created_at = self.clock.now();
        let expires_at = TimeDelta::from_std(ttl)
            .ok()
            .and_then(|delta| created_at.checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let mut state = slot.lock();
        state.flight = None;
        state.entry = (!ttl.is_zero()).then(|| {
            Arc::new(CacheEntry {
                key,
                value,
                created_at,
                expires_at,
            })
        });
    }
}

enum Lookup {
    Hit(ToolResult),
    Wait(Flight),
    Retired,
}

/// Result cache shared by every dispatcher clone.
#[derive(Clone)]
pub struct ResultCache {
    inner: Arc<CacheInner>,
}

impl ResultCache {
    pub fn new(policy: TtlPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                slots: RwLock::new(HashMap::new()),
                policy,
                clock,
                counters: CacheCounters::default(),
            }),
        }
    }

    #[must_use]
    pub fn policy(&self) -> &TtlPolicy {
        &self.inner.policy
    }

    /// Returns the cached result for `key`, or runs `compute` once and caches it.
    ///
    /// Concurrent callers for the same key share a single in-flight compute.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: CacheKey,
        ttl: CacheTtl,
        compute: F,
    ) -> ToolResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ToolResult> + Send + 'static,
    {
        let mut compute = Some(compute);
        loop {
            let slot = self.slot(&key).await;
            let lookup = {
                let mut state = slot.lock();
                let now = self.inner.clock.now();
                if state.retired {
                    Lookup::Retired
                } else if let Some(entry) =
                    state.entry.as_ref().filter(|entry| entry.is_fresh(now))
                {
                    self.inner.counters.hits.fetch_add(1, Ordering::Relaxed);
                    Lookup::Hit(entry.value.clone())
                } else if let Some(flight) = state.flight.clone() {
                    self.inner.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                    Lookup::Wait(flight)
                } else if let Some(compute) = compute.take() {
                    state.entry = None;
                    let flight = self.start(slot.clone(), key.clone(), ttl, compute());
                    state.flight = Some(flight.clone());
                    Lookup::Wait(flight)
                } else {
                    Lookup::Retired
                }
            };

            match lookup {
                Lookup::Hit(value) => {
                    debug!(%key, "cache hit");
                    return value;
                }
                Lookup::Wait(flight) => return flight.await,
                Lookup::Retired => {}
            }
        }
    }

    fn start<Fut>(
        &self,
        slot: Arc<CacheSlot>,
        key: CacheKey,
        ttl: CacheTtl,
        compute: Fut,
    ) -> Flight
    where
        Fut: Future<Output = ToolResult> + Send + 'static,
    {
        self.inner.counters.computes.fetch_add(1, Ordering::Relaxed);
        debug!(%key, "cache miss; computing");

        let inner = self.inner.clone();
        let task = tokio::spawn(
            async move {
                let value = AssertUnwindSafe(compute)
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| {
                        error!(%key, "tool computation panicked");
                        ToolError::UpstreamUnavailable("tool computation failed".to_string())
                            .to_result()
                    });
                inner.store(&slot, key, value.clone(), ttl);
                value
            }
            .in_current_span(),
        );

        async move {
            task.await.unwrap_or_else(|err| {
                ToolError::UpstreamUnavailable(format!("tool computation aborted: {err}"))
                    .to_result()
            })
        }
        .boxed()
        .shared()
    }

    async fn slot(&self, key: &CacheKey) -> Arc<CacheSlot> {
        if let Some(slot) = self.inner.slots.read().await.get(key) {
            return slot.clone();
        }
        self.inner
            .slots
            .write()
            .await
            .entry(key.clone())
            .or_default()
            .clone()
    }

    /// Drops expired entries that have no fetch in progress.
    pub async fn evict_expired(&self) -> usize {
        let now = self.inner.clock.now();
        let mut slots = self.inner.slots.write().await;
        let before = slots.len();
        slots.retain(|_, slot| {
            let mut state = slot.lock();
            let keep = state.flight.is_some()
                || state.entry.as_ref().is_some_and(|entry| entry.is_fresh(now));
            state.retired = !keep;
            keep
        });
        before.saturating_sub(slots.len())
    }

    /// Removes every entry and returns how many were stored.
    pub async fn clear(&self) -> usize {
        let mut slots = self.inner.slots.write().await;
        let stored = slots
            .values()
            .filter(|slot| {
                let mut state = slot.lock();
                state.retired = true;
                state.entry.is_some()
            })
            .count();
        slots.clear();
        stored
    }

    pub async fn stats(&self) -> CacheStats {
        let now = self.inner.clock.now();
        let slots = self.inner.slots.read().await;
        let (entries, in_flight) = slots.values().fold((0, 0), |(entries, in_flight), slot| {
            let state = slot.lock();
            let fresh = state.entry.as_ref().is_some_and(|entry| entry.is_fresh(now));
            (
                entries + usize::from(fresh),
                in_flight + usize::from(state.flight.is_some()),
            )
        });
        let counters = &self.inner.counters;
        CacheStats {
            entries,
            in_flight,
            hits: counters.hits.load(Ordering::Relaxed),
            coalesced: counters.coalesced.load(Ordering::Relaxed),
            computes: counters.computes.load(Ordering::Relaxed),
        }
    }

    /// Periodically evicts expired entries until the returned handle is aborted.
    #[must_use]
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let evicted = cache.evict_expired().await;
                if evicted > 0 {
                    debug!(evicted, "evicted expired cache entries");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use futures::future::join_all;
    use serde_json::json;
    use tokio::sync::oneshot;

    use crate::clock::ManualClock;

    const TTL: CacheTtl = CacheTtl {
        success: Duration::from_secs(60),
        error: Duration::from_secs(5),
    };

    fn cache_with(clock: Arc<ManualClock>) -> ResultCache {
        ResultCache::new(TtlPolicy::default(), clock)
    }

    fn key() -> CacheKey {
        CacheKey::new("ticker_info", "symbol=ACME")
    }

    async fn counted(cache: &ResultCache, calls: &Arc<AtomicUsize>, ok: bool) -> ToolResult {
        let calls = calls.clone();
        cache
            .get_or_compute(key(), TTL, move || async move {
                let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if ok {
                    ToolResult::success(json!({ "call": call }))
                } else {
                    ToolError::NotFound("ACME".to_string()).to_result()
                }
            })
            .await
    }

    #[tokio::test]
    async fn hit_skips_compute_until_expiry() {
        let clock = Arc::new(ManualClock::default());
        let cache = cache_with(clock.clone());
        let calls = Arc::new(AtomicUsize::new(0));

        let first = counted(&cache, &calls, true).await;
        let second = counted(&cache, &calls, true).await;
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        clock.advance(Duration::from_secs(61));
        let third = counted(&cache, &calls, true).await;
        assert_eq!(third.payload(), Some(&json!({ "call": 2 })));
        assert_eq!(cache.stats().await.hits, 1);
    }

    #[tokio::test]
    async fn errors_expire_sooner() {
        let clock = Arc::new(ManualClock::default());
        let cache = cache_with(clock.clone());
        let calls = Arc::new(AtomicUsize::new(0));

        counted(&cache, &calls, false).await;
        clock.advance(Duration::from_secs(4));
        counted(&cache, &calls, false).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        clock.advance(Duration::from_secs(2));
        counted(&cache, &calls, false).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn zero_ttl_is_not_stored() {
        let cache = cache_with(Arc::new(ManualClock::default()));
        let calls = Arc::new(AtomicUsize::new(0));
        let no_cache = CacheTtl {
            success: Duration::ZERO,
            error: Duration::ZERO,
        };

        for _ in 0..2 {
            let calls = calls.clone();
            cache
                .get_or_compute(key(), no_cache, move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    ToolResult::success(json!({}))
                })
                .await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().await.entries, 0);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_compute() {
        let cache = cache_with(Arc::new(ManualClock::default()));
        let calls = Arc::new(AtomicUsize::new(0));

        let callers = (0..16).map(|_| {
            let calls = calls.clone();
            cache.get_or_compute(key(), TTL, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                ToolResult::success(json!({ "symbol": "ACME" }))
            })
        });
        let results = join_all(callers).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|result| result == &results[0]));
        let stats = cache.stats().await;
        assert_eq!(stats.computes, 1);
        assert_eq!(stats.coalesced, 15);
    }

    #[tokio::test]
    async fn cancelled_caller_does_not_cancel_shared_compute() {
        let cache = cache_with(Arc::new(ManualClock::default()));
        let calls = Arc::new(AtomicUsize::new(0));
        let (release, gate) = oneshot::channel::<()>();

        let first = {
            let cache = cache.clone();
            let calls = calls.clone();
            tokio::spawn(async move {
                cache
                    .get_or_compute(key(), TTL, move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        let _ = gate.await;
                        ToolResult::success(json!({ "symbol": "ACME" }))
                    })
                    .await
            })
        };
        while cache.stats().await.in_flight == 0 {
            tokio::task::yield_now().await;
        }
        first.abort();
        let _ = first.await;

        let waiter = {
            let calls = calls.clone();
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get_or_compute(key(), TTL, move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        ToolResult::success(json!({ "symbol": "OTHER" }))
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;
        release.send(()).expect("compute is still waiting");

        let result = waiter.await.expect("waiter completes");
        assert_eq!(result.payload(), Some(&json!({ "symbol": "ACME" })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().await.entries, 1);
    }

    #[tokio::test]
    async fn sweeper_pass_evicts_expired_entries() {
        let clock = Arc::new(ManualClock::default());
        let cache = cache_with(clock.clone());
        let calls = Arc::new(AtomicUsize::new(0));

        counted(&cache, &calls, true).await;
        assert_eq!(cache.evict_expired().await, 0);
        clock.advance(Duration::from_secs(120));
        assert_eq!(cache.evict_expired().await, 1);
        assert_eq!(cache.stats().await.entries, 0);
    }

    #[test]
    fn error_ttl_never_exceeds_success_ttl() {
        let policy = TtlPolicy::default().with_kind_ttl(DataKind::History, Duration::from_secs(3));
        assert_eq!(policy.ttl_for(DataKind::History).error, Duration::from_secs(3));
        assert_eq!(
            policy.ttl_for(DataKind::Statement),
            CacheTtl {
                success: Duration::from_secs(6 * 60 * 60),
                error: Duration::from_secs(10),
            }
        );
    }
}
