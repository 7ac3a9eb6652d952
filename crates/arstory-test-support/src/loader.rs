//! Test loaders — mock `AssetLoader` implementations for tests.

use std::collections::HashSet;
use std::sync::Mutex;

use arstory_core::asset::{AnimationClip, AssetKind, AssetLoader, AudioBuffer, ModelData};
use arstory_core::error::AssetError;
use async_trait::async_trait;
use tokio::sync::watch;

/// An asset loader that records every call and fabricates decoded assets from
/// the URL. URLs registered with `fail_on` return a fetch error.
///
/// When built with `gated()`, every load stays pending until `open_gate()` is
/// called, which lets tests observe requests while they are in flight.
#[derive(Debug)]
pub struct RecordingAssetLoader {
    calls: Mutex<Vec<(AssetKind, String)>>,
    failing: Mutex<HashSet<String>>,
    gate: Option<watch::Sender<bool>>,
}

impl Default for RecordingAssetLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingAssetLoader {
    /// A loader that answers immediately.
    #[must_use]
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            gate: None,
        }
    }

    /// A loader whose loads block until `open_gate()`.
    #[must_use]
    pub fn gated() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            gate: Some(sender),
            ..Self::new()
        }
    }

    /// Lets every pending and future load complete.
    pub fn open_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.send_replace(true);
        }
    }

    /// Makes loads of `url` fail until `recover` is called.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn fail_on(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_owned());
    }

    /// Lets loads of `url` succeed again.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn recover(&self, url: &str) {
        self.failing.lock().unwrap().remove(url);
    }

    /// Every call in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn calls(&self) -> Vec<(AssetKind, String)> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls for one URL.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn load_count(&self, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, called)| called == url)
            .count()
    }

    async fn begin(&self, kind: AssetKind, url: &str) -> Result<(), AssetError> {
        self.calls.lock().unwrap().push((kind, url.to_owned()));

        if let Some(gate) = &self.gate {
            let mut open = gate.subscribe();
            // The sender lives as long as `self`, so this cannot fail while
            // the loader is borrowed.
            let _ = open.wait_for(|open| *open).await;
        }

        if self.failing.lock().unwrap().contains(url) {
            return Err(AssetError::Fetch {
                url: url.to_owned(),
                reason: "404 not found".to_owned(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AssetLoader for RecordingAssetLoader {
    async fn load_model(&self, url: &str) -> Result<ModelData, AssetError> {
        self.begin(AssetKind::Model, url).await?;
        Ok(ModelData {
            source: url.to_owned(),
            byte_len: url.len() * 1024,
            animations: vec![AnimationClip {
                name: "idle".to_owned(),
                duration: 2.0,
            }],
        })
    }

    async fn load_audio(&self, url: &str) -> Result<AudioBuffer, AssetError> {
        self.begin(AssetKind::Audio, url).await?;
        Ok(AudioBuffer {
            source: url.to_owned(),
            duration: 20.0,
            sample_rate: 44_100,
            channels: 2,
        })
    }
}

/// An asset loader that always fails with a fetch error. Useful for testing
/// degradation paths.
#[derive(Debug)]
pub struct FailingAssetLoader;

#[async_trait]
impl AssetLoader for FailingAssetLoader {
    async fn load_model(&self, url: &str) -> Result<ModelData, AssetError> {
        Err(AssetError::Fetch {
            url: url.to_owned(),
            reason: "connection refused".into(),
        })
    }

    async fn load_audio(&self, url: &str) -> Result<AudioBuffer, AssetError> {
        Err(AssetError::Fetch {
            url: url.to_owned(),
            reason: "connection refused".into(),
        })
    }
}
