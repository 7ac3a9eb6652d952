//! Error types.

use thiserror::Error;

use crate::asset::AssetKind;

/// Failure of a single asset load.
///
/// `Clone` because one failed load is handed to every caller that was
/// waiting on the same in-flight request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssetError {
    /// The resource could not be fetched.
    #[error("failed to fetch {url}: {reason}")]
    Fetch {
        /// Source URL.
        url: String,
        /// Loader-supplied reason.
        reason: String,
    },

    /// The resource was fetched but could not be decoded.
    #[error("failed to decode {url}: {reason}")]
    Decode {
        /// Source URL.
        url: String,
        /// Decoder-supplied reason.
        reason: String,
    },

    /// A cached entry exists for the URL but holds the other asset kind.
    #[error("{url} is cached as {found}, requested as {expected}")]
    KindMismatch {
        /// Source URL.
        url: String,
        /// Kind the caller asked for.
        expected: AssetKind,
        /// Kind held by the cache.
        found: AssetKind,
    },
}

impl AssetError {
    /// The URL this error refers to.
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Fetch { url, .. } | Self::Decode { url, .. } | Self::KindMismatch { url, .. } => {
                url
            }
        }
    }
}

/// Top-level error type for the experience.
///
/// Asset failures are not represented here: they degrade the scene and are
/// logged where they happen.
#[derive(Debug, Error)]
pub enum ExperienceError {
    /// The platform lacks a required AR capability. Terminal.
    #[error("AR not supported: {0}")]
    Unsupported(String),

    /// The GPU rendering context was invalidated. Not recovered.
    #[error("render context lost")]
    ContextLost,

    /// The audio output could not be started or resumed.
    #[error("audio output error: {0}")]
    Audio(String),

    /// Configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_error_url_is_reported_for_every_variant() {
        let fetch = AssetError::Fetch {
            url: "/a.glb".into(),
            reason: "404".into(),
        };
        let mismatch = AssetError::KindMismatch {
            url: "/b.mp3".into(),
            expected: AssetKind::Audio,
            found: AssetKind::Model,
        };

        assert_eq!(fetch.url(), "/a.glb");
        assert_eq!(mismatch.url(), "/b.mp3");
        assert_eq!(
            mismatch.to_string(),
            "/b.mp3 is cached as model, requested as audio"
        );
    }
}
