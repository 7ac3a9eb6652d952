//! Decoded asset types and the loader port.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AssetError;

/// The two kinds of asset a scene references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    /// A glTF model.
    Model,
    /// A decoded audio track.
    Audio,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Model => f.write_str("model"),
            Self::Audio => f.write_str("audio"),
        }
    }
}

/// A named animation clip embedded in a model.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    /// Clip name.
    pub name: String,
    /// Clip length in seconds.
    pub duration: f32,
}

/// A decoded 3D model, CPU side.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelData {
    /// URL the model was loaded from.
    pub source: String,
    /// Size of the encoded payload.
    pub byte_len: usize,
    /// Animation clips in file order.
    pub animations: Vec<AnimationClip>,
}

/// A decoded audio buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// URL the track was loaded from.
    pub source: String,
    /// Track length in seconds.
    pub duration: f32,
    /// Samples per second.
    pub sample_rate: u32,
    /// Number of channels.
    pub channels: u16,
}

/// A loaded asset. Exactly one payload kind per value.
#[derive(Debug, Clone)]
pub enum Asset {
    /// A decoded model.
    Model(Arc<ModelData>),
    /// A decoded audio buffer.
    Audio(Arc<AudioBuffer>),
}

impl Asset {
    /// Which kind of payload this asset holds.
    #[must_use]
    pub fn kind(&self) -> AssetKind {
        match self {
            Self::Model(_) => AssetKind::Model,
            Self::Audio(_) => AssetKind::Audio,
        }
    }

    /// The model payload, if this is a model.
    #[must_use]
    pub fn as_model(&self) -> Option<&Arc<ModelData>> {
        match self {
            Self::Model(model) => Some(model),
            Self::Audio(_) => None,
        }
    }

    /// The audio payload, if this is an audio track.
    #[must_use]
    pub fn as_audio(&self) -> Option<&Arc<AudioBuffer>> {
        match self {
            Self::Audio(audio) => Some(audio),
            Self::Model(_) => None,
        }
    }

    /// Returns `true` when both values share the same underlying allocation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Model(a), Self::Model(b)) => Arc::ptr_eq(a, b),
            (Self::Audio(a), Self::Audio(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Port to the host's network fetch and decoders.
#[async_trait]
pub trait AssetLoader: Send + Sync {
    /// Fetch and decode a model.
    async fn load_model(&self, url: &str) -> Result<ModelData, AssetError>;

    /// Fetch and decode an audio track.
    async fn load_audio(&self, url: &str) -> Result<AudioBuffer, AssetError>;

    /// Dispatch on `kind`.
    async fn load(&self, kind: AssetKind, url: &str) -> Result<Asset, AssetError> {
        match kind {
            AssetKind::Model => Ok(Asset::Model(Arc::new(self.load_model(url).await?))),
            AssetKind::Audio => Ok(Asset::Audio(Arc::new(self.load_audio(url).await?))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(source: &str) -> Asset {
        Asset::Model(Arc::new(ModelData {
            source: source.to_owned(),
            byte_len: 10,
            animations: Vec::new(),
        }))
    }

    #[test]
    fn test_asset_accessors_match_kind() {
        let asset = model("/a.glb");

        assert_eq!(asset.kind(), AssetKind::Model);
        assert!(asset.as_model().is_some());
        assert!(asset.as_audio().is_none());
    }

    #[test]
    fn test_ptr_eq_distinguishes_clones_from_equal_values() {
        let a = model("/a.glb");
        let b = a.clone();
        let c = model("/a.glb");

        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
    }
}
