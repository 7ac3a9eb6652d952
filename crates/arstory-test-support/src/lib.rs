//! Shared test doubles for the AR story presentation engine.

mod clock;
mod host;
mod loader;

pub use clock::{FixedClock, ManualClock};
pub use host::{RecordingAudioOutput, RecordingLinkOpener, RecordingRenderHost, RenderSnapshot};
pub use loader::{FailingAssetLoader, RecordingAssetLoader};
