//! Eager loading of every scene asset through the cache.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arstory_core::clock::Clock;
use arstory_core::config::SceneManifest;
use chrono::TimeDelta;
use futures::future::{self, BoxFuture, FutureExt, Shared};
use tracing::{info, instrument, warn};

use crate::cache::AssetCache;

/// Outcome of a preload pass. Aggregate only: callers learn that the batch
/// settled, not which assets made it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreloadSettled {
    /// Number of assets requested.
    pub attempted: usize,
    /// Wall time from first request to last completion.
    pub elapsed: TimeDelta,
}

type PendingPreload = Shared<BoxFuture<'static, PreloadSettled>>;

/// Loads every asset in the manifest once.
///
/// Concurrent calls share one pass; once settled, the result is kept and
/// returned to later callers without touching the cache again.
pub struct PreloadCoordinator {
    cache: Arc<AssetCache>,
    manifest: SceneManifest,
    clock: Arc<dyn Clock>,
    run: Mutex<Option<PendingPreload>>,
}

impl fmt::Debug for PreloadCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreloadCoordinator")
            .field("manifest", &self.manifest)
            .field("settled", &self.settled())
            .finish_non_exhaustive()
    }
}

impl PreloadCoordinator {
    /// Creates a coordinator over `manifest`.
    #[must_use]
    pub fn new(cache: Arc<AssetCache>, manifest: SceneManifest, clock: Arc<dyn Clock>) -> Self {
        Self {
            cache,
            manifest,
            clock,
            run: Mutex::new(None),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<PendingPreload>> {
        self.run.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Loads every scene asset. Individual failures are logged and skipped.
    #[instrument(skip(self))]
    pub async fn preload_all(&self) -> PreloadSettled {
        let pending = {
            let mut slot = self.slot();
            slot.get_or_insert_with(|| {
                preload(
                    Arc::clone(&self.cache),
                    self.manifest.clone(),
                    Arc::clone(&self.clock),
                )
                .boxed()
                .shared()
            })
            .clone()
        };
        pending.await
    }

    /// The result of the pass, if it has settled.
    #[must_use]
    pub fn settled(&self) -> Option<PreloadSettled> {
        self.slot().as_ref().and_then(Shared::peek).copied()
    }

    /// Forgets the previous pass so the next call runs a fresh one.
    pub fn reset(&self) {
        self.slot().take();
    }
}

async fn preload(cache: Arc<AssetCache>, manifest: SceneManifest, clock: Arc<dyn Clock>) -> PreloadSettled {
    let started = clock.now();
    let entries = manifest.entries();
    let attempted = entries.len();

    let loads = entries.into_iter().map(|(scene, kind, url)| {
        let cache = Arc::clone(&cache);
        async move {
            if let Err(err) = cache.get(&url, kind).await {
                warn!(%scene, %kind, url, error = %err, "preload skipped asset");
            }
        }
    });
    future::join_all(loads).await;

    let elapsed = clock.since(started);
    info!(attempted, elapsed_ms = elapsed.num_milliseconds(), "preload settled");
    PreloadSettled { attempted, elapsed }
}
