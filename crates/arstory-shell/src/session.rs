//! Session lifecycle types exchanged with the host.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use arstory_core::asset::AssetLoader;
use arstory_core::clock::Clock;
use arstory_core::host::{AudioOutput, LinkOpener, RenderHost};
use glam::Mat4;

/// What the host platform can do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArCapabilities {
    /// Immersive AR sessions are available.
    pub immersive_ar: bool,
}

/// Session lifecycle notifications from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The user entered AR.
    Started,
    /// The AR session ended.
    Ended,
    /// The rendering context was lost.
    ContextLost,
}

/// One AR frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInput {
    /// Frame time since the session's time origin.
    pub timestamp: Duration,
    /// Viewer camera-to-world matrix. `None` while tracking is not yet
    /// established.
    pub viewer_pose: Option<Mat4>,
}

impl FrameInput {
    /// A tracked frame.
    #[must_use]
    pub fn tracked(timestamp: Duration, viewer_pose: Mat4) -> Self {
        Self {
            timestamp,
            viewer_pose: Some(viewer_pose),
        }
    }

    /// A frame without a viewer pose.
    #[must_use]
    pub fn untracked(timestamp: Duration) -> Self {
        Self {
            timestamp,
            viewer_pose: None,
        }
    }
}

/// Where the shell is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ShellPhase {
    /// Waiting for the user to start AR.
    #[default]
    Idle,
    /// An AR session is running.
    Active,
    /// The session ended and everything was torn down. A new session may
    /// start.
    Ended,
    /// Immersive AR is unavailable. Terminal.
    Unsupported,
}

/// The host services the shell is wired to.
pub struct ShellPorts {
    /// Fetches and decodes assets.
    pub loader: Arc<dyn AssetLoader>,
    /// Wall clock for cache expiry and preload timing.
    pub clock: Arc<dyn Clock>,
    /// Draws the stage.
    pub render: Box<dyn RenderHost>,
    /// Plays narration.
    pub audio: Arc<dyn AudioOutput>,
    /// Opens panel links.
    pub links: Arc<dyn LinkOpener>,
}

impl fmt::Debug for ShellPorts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShellPorts").finish_non_exhaustive()
    }
}
