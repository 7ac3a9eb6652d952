//! URL-keyed asset cache with a time-to-live and request coalescing.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arstory_core::asset::{Asset, AssetKind, AssetLoader};
use arstory_core::clock::Clock;
use arstory_core::error::AssetError;
use chrono::{DateTime, TimeDelta, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, instrument, warn};

type PendingLoad = Shared<BoxFuture<'static, Result<Asset, AssetError>>>;

/// A stored asset and the moment its load completed.
#[derive(Debug, Clone)]
pub struct CachedAsset {
    /// The decoded payload.
    pub asset: Asset,
    /// When the payload was stored.
    pub loaded_at: DateTime<Utc>,
}

impl CachedAsset {
    /// Whether the entry is still usable at `now`. An entry whose age equals
    /// the TTL is still fresh.
    #[must_use]
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: TimeDelta) -> bool {
        now - self.loaded_at <= ttl
    }
}

/// Counters for cache behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Requests answered from a fresh entry.
    pub hits: u64,
    /// Requests that started a load.
    pub misses: u64,
    /// Requests that joined a load already in flight.
    pub coalesced: u64,
    /// Loads that failed.
    pub failures: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CachedAsset>,
    in_flight: HashMap<String, PendingLoad>,
    stats: CacheStats,
}

/// In-memory asset cache.
///
/// Entries older than the TTL are treated as misses but stay in memory until
/// `sweep` or `clear`. At most one load per URL is in flight; every caller
/// that asks while it runs receives the same result.
pub struct AssetCache {
    loader: Arc<dyn AssetLoader>,
    clock: Arc<dyn Clock>,
    ttl: TimeDelta,
    state: Mutex<CacheState>,
}

impl fmt::Debug for AssetCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("AssetCache")
            .field("ttl", &self.ttl)
            .field("entries", &state.entries.len())
            .field("in_flight", &state.in_flight.len())
            .field("stats", &state.stats)
            .finish_non_exhaustive()
    }
}

impl AssetCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new(loader: Arc<dyn AssetLoader>, clock: Arc<dyn Clock>, ttl: TimeDelta) -> Self {
        Self {
            loader,
            clock,
            ttl,
            state: Mutex::new(CacheState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the asset for `url`, loading it on a miss.
    ///
    /// # Errors
    ///
    /// Returns the loader's `AssetError` if the load fails (nothing is stored,
    /// so the next call retries), or `AssetError::KindMismatch` if `url` is
    /// known as the other asset kind.
    #[instrument(skip(self, kind), fields(kind = %kind))]
    pub async fn get(&self, url: &str, kind: AssetKind) -> Result<Asset, AssetError> {
        let pending = {
            let mut state = self.lock();
            let now = self.clock.now();

            let fresh = state
                .entries
                .get(url)
                .filter(|entry| entry.is_fresh(now, self.ttl))
                .map(|entry| entry.asset.clone());
            if let Some(asset) = fresh {
                check_kind(url, kind, &asset)?;
                state.stats.hits += 1;
                debug!("cache hit");
                return Ok(asset);
            }

            if let Some(pending) = state.in_flight.get(url).cloned() {
                state.stats.coalesced += 1;
                debug!("joining in-flight load");
                pending
            } else {
                state.stats.misses += 1;
                debug!("cache miss, loading");
                let loader = Arc::clone(&self.loader);
                let owned_url = url.to_owned();
                let pending = async move { loader.load(kind, &owned_url).await }
                    .boxed()
                    .shared();
                state.in_flight.insert(url.to_owned(), pending.clone());
                pending
            }
        };

        let result = pending.clone().await;
        self.settle(url, &pending, &result);

        let asset = result?;
        check_kind(url, kind, &asset)?;
        Ok(asset)
    }

    /// Stores the outcome of a load exactly once, whichever waiter gets here
    /// first. A load whose slot was cleared in the meantime is not stored.
    fn settle(&self, url: &str, pending: &PendingLoad, result: &Result<Asset, AssetError>) {
        let mut state = self.lock();
        let owns_slot = state
            .in_flight
            .get(url)
            .is_some_and(|current| current.ptr_eq(pending));
        if !owns_slot {
            return;
        }
        state.in_flight.remove(url);

        match result {
            Ok(asset) => {
                let loaded_at = self.clock.now();
                state.entries.insert(
                    url.to_owned(),
                    CachedAsset {
                        asset: asset.clone(),
                        loaded_at,
                    },
                );
                info!(url, kind = %asset.kind(), "asset cached");
            }
            Err(err) => {
                state.stats.failures += 1;
                warn!(url, error = %err, "asset load failed");
            }
        }
    }

    /// Returns a fresh entry without ever loading.
    #[must_use]
    pub fn peek(&self, url: &str) -> Option<Asset> {
        let state = self.lock();
        let now = self.clock.now();
        state
            .entries
            .get(url)
            .filter(|entry| entry.is_fresh(now, self.ttl))
            .map(|entry| entry.asset.clone())
    }

    /// When the entry for `url` was stored, fresh or not.
    #[must_use]
    pub fn loaded_at(&self, url: &str) -> Option<DateTime<Utc>> {
        self.lock().entries.get(url).map(|entry| entry.loaded_at)
    }

    /// Evicts stale entries and returns how many were removed.
    pub fn sweep(&self) -> usize {
        let mut state = self.lock();
        let now = self.clock.now();
        let before = state.entries.len();
        state.entries.retain(|_, entry| entry.is_fresh(now, self.ttl));
        let removed = before - state.entries.len();
        if removed > 0 {
            debug!(removed, "swept stale assets");
        }
        removed
    }

    /// Drops every entry and forgets in-flight loads. Loads still running
    /// complete for their callers but are not stored.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.in_flight.clear();
        debug!("asset cache cleared");
    }

    /// Number of stored entries, fresh or stale.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.lock().stats
    }

    /// Entry lifetime.
    #[must_use]
    pub fn ttl(&self) -> TimeDelta {
        self.ttl
    }
}

fn check_kind(url: &str, expected: AssetKind, asset: &Asset) -> Result<(), AssetError> {
    let found = asset.kind();
    if found == expected {
        Ok(())
    } else {
        Err(AssetError::KindMismatch {
            url: url.to_owned(),
            expected,
            found,
        })
    }
}
