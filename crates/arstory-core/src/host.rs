//! Ports to the host platform: rendering, audio output and link navigation.

use std::sync::Arc;

use crate::asset::{AudioBuffer, ModelData};
use crate::config::NarrationSettings;
use crate::error::ExperienceError;
use crate::spatial::Camera;
use crate::stage::Stage;

/// The host's 3D renderer. Owns every GPU-resident resource.
pub trait RenderHost: Send {
    /// Draws the stage through the camera. Called once per AR frame.
    fn render(&mut self, stage: &Stage, camera: &Camera);

    /// Frees the GPU resources (geometry, materials, textures) created for a
    /// model that left the stage.
    fn release_model(&mut self, model: &ModelData);

    /// Releases every GPU resource the renderer created for the stage.
    fn release_all(&mut self);
}

/// The host's audio output context.
pub trait AudioOutput: Send + Sync {
    /// Starts playing a decoded track.
    fn play(&self, track: Arc<AudioBuffer>, settings: NarrationSettings);

    /// Stops every playing track and disconnects the audio graph.
    fn stop_all(&self);

    /// Resumes a suspended output context.
    ///
    /// # Errors
    ///
    /// Returns `ExperienceError::Audio` if the platform refuses to resume.
    fn resume(&self) -> Result<(), ExperienceError>;
}

/// Opens external links in a new browsing context.
pub trait LinkOpener: Send + Sync {
    /// Navigates to `url`.
    fn open(&self, url: &str);
}
