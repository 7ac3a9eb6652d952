//! Test hosts — recording `RenderHost`, `AudioOutput` and `LinkOpener`.

use std::sync::{Arc, Mutex};

use arstory_core::asset::{AudioBuffer, ModelData};
use arstory_core::config::NarrationSettings;
use arstory_core::error::ExperienceError;
use arstory_core::host::{AudioOutput, LinkOpener, RenderHost};
use arstory_core::spatial::Camera;
use arstory_core::stage::Stage;

/// What the renderer saw on its most recent frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderSnapshot {
    /// Source URL of the mounted model.
    pub model: Option<String>,
    /// Labels of the interactive panels.
    pub panels: Vec<String>,
}

#[derive(Debug, Default)]
struct RenderLog {
    frames: usize,
    releases: usize,
    released_models: Vec<String>,
    last: RenderSnapshot,
}

/// A renderer that records frames and releases. Clones share the same log, so
/// a test can keep one handle after boxing another into the shell.
#[derive(Debug, Clone, Default)]
pub struct RecordingRenderHost {
    log: Arc<Mutex<RenderLog>>,
}

impl RecordingRenderHost {
    /// Frames rendered so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn frames(&self) -> usize {
        self.log.lock().unwrap().frames
    }

    /// Number of `release_all` calls.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn releases(&self) -> usize {
        self.log.lock().unwrap().releases
    }

    /// Sources of the models released one by one, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn released_models(&self) -> Vec<String> {
        self.log.lock().unwrap().released_models.clone()
    }

    /// The most recent frame's contents.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn last_frame(&self) -> RenderSnapshot {
        self.log.lock().unwrap().last.clone()
    }
}

impl RenderHost for RecordingRenderHost {
    fn render(&mut self, stage: &Stage, _camera: &Camera) {
        let mut log = self.log.lock().unwrap();
        log.frames += 1;
        log.last = RenderSnapshot {
            model: stage.model().map(|instance| instance.model.source.clone()),
            panels: stage.panels().iter().map(|p| p.label.clone()).collect(),
        };
    }

    fn release_model(&mut self, model: &ModelData) {
        self.log
            .lock()
            .unwrap()
            .released_models
            .push(model.source.clone());
    }

    fn release_all(&mut self) {
        self.log.lock().unwrap().releases += 1;
    }
}

#[derive(Debug, Default)]
struct AudioLog {
    played: Vec<(String, NarrationSettings)>,
    stops: usize,
    resumes: usize,
}

/// An audio output that records what it was asked to do. `refusing()` builds
/// one whose `resume` fails.
#[derive(Debug, Default)]
pub struct RecordingAudioOutput {
    log: Mutex<AudioLog>,
    refuse_resume: bool,
}

impl RecordingAudioOutput {
    /// An output whose `resume` always fails.
    #[must_use]
    pub fn refusing() -> Self {
        Self {
            refuse_resume: true,
            ..Self::default()
        }
    }

    /// Source URLs of every track played, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn played(&self) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .played
            .iter()
            .map(|(source, _)| source.clone())
            .collect()
    }

    /// Settings of every track played, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn settings(&self) -> Vec<NarrationSettings> {
        self.log
            .lock()
            .unwrap()
            .played
            .iter()
            .map(|(_, settings)| *settings)
            .collect()
    }

    /// Number of `stop_all` calls.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn stops(&self) -> usize {
        self.log.lock().unwrap().stops
    }

    /// Number of `resume` calls.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn resumes(&self) -> usize {
        self.log.lock().unwrap().resumes
    }
}

impl AudioOutput for RecordingAudioOutput {
    fn play(&self, track: Arc<AudioBuffer>, settings: NarrationSettings) {
        self.log
            .lock()
            .unwrap()
            .played
            .push((track.source.clone(), settings));
    }

    fn stop_all(&self) {
        self.log.lock().unwrap().stops += 1;
    }

    fn resume(&self) -> Result<(), ExperienceError> {
        self.log.lock().unwrap().resumes += 1;
        if self.refuse_resume {
            return Err(ExperienceError::Audio("resume requires a user gesture".into()));
        }
        Ok(())
    }
}

/// A link opener that records every URL it was asked to open.
#[derive(Debug, Default)]
pub struct RecordingLinkOpener {
    opened: Mutex<Vec<String>>,
}

impl RecordingLinkOpener {
    /// URLs opened so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

impl LinkOpener for RecordingLinkOpener {
    fn open(&self, url: &str) {
        self.opened.lock().unwrap().push(url.to_owned());
    }
}
