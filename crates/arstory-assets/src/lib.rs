//! AR story — asset cache and preload coordination.
//!
//! The cache is the only path from scene loaders to the network: every model
//! and narration track is fetched through it, kept for a fixed time-to-live,
//! and shared between concurrent requests for the same URL.

pub mod cache;
pub mod preload;

pub use cache::{AssetCache, CacheStats, CachedAsset};
pub use preload::{PreloadCoordinator, PreloadSettled};
