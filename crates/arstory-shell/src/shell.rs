//! The presentation shell.
//!
//! Owns the stage and the host ports, wires the cache, preload coordinator
//! and sequencer together, and routes session, frame and touch events.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use arstory_assets::{AssetCache, PreloadCoordinator, PreloadSettled};
use arstory_core::config::ExperienceConfig;
use arstory_core::error::ExperienceError;
use arstory_core::host::{AudioOutput, LinkOpener, RenderHost};
use arstory_core::spatial::{Camera, Viewport};
use arstory_core::stage::Stage;
use arstory_gesture::{GestureInterpreter, pick_panel};
use arstory_sequencer::application::sequencer::SceneSequencer;
use arstory_sequencer::domain::state::{SceneState, TransitionOutcome};
use glam::Vec2;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, trace, warn};
use uuid::Uuid;

use crate::session::{ArCapabilities, FrameInput, SessionEvent, ShellPhase, ShellPorts};

/// The AR experience as seen by the host page.
pub struct PresentationShell {
    config: ExperienceConfig,
    runtime: Handle,
    phase: ShellPhase,
    session_id: Option<Uuid>,
    cache: Arc<AssetCache>,
    preload: Arc<PreloadCoordinator>,
    sequencer: Arc<SceneSequencer>,
    stage: Arc<Mutex<Stage>>,
    camera: Camera,
    viewport: Viewport,
    gestures: GestureInterpreter,
    render: Box<dyn RenderHost>,
    audio: Arc<dyn AudioOutput>,
    links: Arc<dyn LinkOpener>,
    last_frame: Option<Duration>,
    story: Option<JoinHandle<TransitionOutcome>>,
    preloading: Option<JoinHandle<PreloadSettled>>,
}

impl fmt::Debug for PresentationShell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PresentationShell")
            .field("phase", &self.phase)
            .field("session_id", &self.session_id)
            .field("camera", &self.camera)
            .field("viewport", &self.viewport)
            .field("cache", &self.cache)
            .field("sequencer", &self.sequencer)
            .finish_non_exhaustive()
    }
}

impl PresentationShell {
    /// Builds the cache, preload coordinator and sequencer around `ports`.
    ///
    /// Must be called from within a tokio runtime; background work is spawned
    /// on it.
    ///
    /// # Errors
    ///
    /// Returns `ExperienceError::Configuration` if `config` is invalid or no
    /// runtime is available.
    pub fn new(
        config: ExperienceConfig,
        ports: ShellPorts,
        viewport: Viewport,
    ) -> Result<Self, ExperienceError> {
        config.validate()?;
        let runtime = Handle::try_current()
            .map_err(|e| ExperienceError::Configuration(format!("no tokio runtime: {e}")))?;

        let ShellPorts {
            loader,
            clock,
            render,
            audio,
            links,
        } = ports;

        let cache = Arc::new(AssetCache::new(loader, Arc::clone(&clock), config.cache_ttl()));
        let preload = Arc::new(PreloadCoordinator::new(
            Arc::clone(&cache),
            config.scenes.clone(),
            clock,
        ));
        let stage = Arc::new(Mutex::new(Stage::new()));
        let sequencer = Arc::new(SceneSequencer::new(
            &config,
            Arc::clone(&cache),
            Arc::clone(&audio),
            Arc::clone(&stage),
        ));
        let camera = Camera::perspective(
            config.camera.fov_y_degrees,
            viewport.aspect(),
            config.camera.near,
            config.camera.far,
        );
        let gestures = GestureInterpreter::new(config.gestures);

        Ok(Self {
            config,
            runtime,
            phase: ShellPhase::Idle,
            session_id: None,
            cache,
            preload,
            sequencer,
            stage,
            camera,
            viewport,
            gestures,
            render,
            audio,
            links,
            last_frame: None,
            story: None,
            preloading: None,
        })
    }

    /// Refuses to run without immersive AR. The refusal is terminal.
    ///
    /// # Errors
    ///
    /// Returns `ExperienceError::Unsupported` if immersive AR is unavailable
    /// now or was found unavailable before.
    pub fn check_support(&mut self, capabilities: &ArCapabilities) -> Result<(), ExperienceError> {
        if self.phase == ShellPhase::Unsupported || !capabilities.immersive_ar {
            if self.phase != ShellPhase::Unsupported {
                warn!("immersive AR is not supported on this device");
            }
            self.phase = ShellPhase::Unsupported;
            return Err(ExperienceError::Unsupported(
                "immersive AR is not available on this device".to_owned(),
            ));
        }
        Ok(())
    }

    /// Reacts to a session lifecycle event.
    ///
    /// # Errors
    ///
    /// Returns `ExperienceError::Unsupported` if a session starts after AR
    /// was found unsupported.
    #[instrument(skip(self), fields(phase = ?self.phase))]
    pub fn handle_session_event(&mut self, event: SessionEvent) -> Result<(), ExperienceError> {
        match event {
            SessionEvent::Started => self.start_session(),
            SessionEvent::Ended => {
                info!(session = ?self.session_id, "AR session ended");
                self.teardown();
                Ok(())
            }
            SessionEvent::ContextLost => {
                error!(error = %ExperienceError::ContextLost, "rendering context lost");
                Ok(())
            }
        }
    }

    fn start_session(&mut self) -> Result<(), ExperienceError> {
        match self.phase {
            ShellPhase::Unsupported => {
                return Err(ExperienceError::Unsupported(
                    "cannot start a session without immersive AR".to_owned(),
                ));
            }
            ShellPhase::Active => {
                debug!("session already active");
                return Ok(());
            }
            ShellPhase::Idle | ShellPhase::Ended => {}
        }

        let session_id = Uuid::new_v4();
        self.session_id = Some(session_id);
        self.phase = ShellPhase::Active;
        info!(session = %session_id, "AR session started");

        if let Err(e) = self.audio.resume() {
            warn!(error = %e, "audio output did not resume");
        }

        let preload = Arc::clone(&self.preload);
        self.preloading = Some(self.runtime.spawn(async move { preload.preload_all().await }));
        Ok(())
    }

    /// Processes one AR frame: tracks the viewer, starts the story on the
    /// first tracked frame, advances animation and renders.
    pub fn on_frame(&mut self, frame: FrameInput) {
        if self.phase != ShellPhase::Active {
            trace!(phase = ?self.phase, "frame outside an active session");
            return;
        }

        let dt = self
            .last_frame
            .map_or(0.0, |last| frame.timestamp.saturating_sub(last).as_secs_f32());
        self.last_frame = Some(frame.timestamp);

        if let Some(pose) = frame.viewer_pose {
            self.camera.pose = pose;
            if self.story.is_none() {
                self.start_story();
            }
        }

        let mut stage = lock(&self.stage);
        for model in stage.take_released() {
            debug!(model = %model.source, "releasing replaced model");
            self.render.release_model(&model);
        }
        stage.advance(dt);
        self.render.render(&stage, &self.camera);
    }

    fn start_story(&mut self) {
        info!("first tracked frame, starting the story");
        let sequencer = Arc::clone(&self.sequencer);
        self.story = Some(self.runtime.spawn(async move {
            sequencer.enter_first_scene().await;
            sequencer.transition_after_delay().await
        }));
    }

    /// Touches went down. Positions are in viewport pixels.
    pub fn on_touch_start(&mut self, touches: &[Vec2]) {
        self.gestures.touch_start(touches);
    }

    /// Touches moved. Rotates, scales or pushes the content.
    pub fn on_touch_move(&mut self, touches: &[Vec2]) {
        let mut stage = lock(&self.stage);
        let scale = stage
            .content()
            .map_or(self.config.content.scale, |content| content.scale);
        if let Some(delta) = self.gestures.touch_move(touches, scale) {
            stage.apply(delta);
        }
    }

    /// Touches lifted. A tap on a panel opens its link, which is returned.
    pub fn on_touch_end(&mut self, released: &[Vec2]) -> Option<String> {
        let tap = self.gestures.touch_end(released, &self.viewport)?;

        let link = {
            let stage = lock(&self.stage);
            let content_to_world = stage.content_to_world(self.camera.pose);
            let panel = pick_panel(&self.camera, tap.ndc, content_to_world, stage.panels())?;
            info!(label = %panel.label, link = %panel.link, "panel tapped");
            panel.link.clone()
        };

        self.links.open(&link);
        Some(link)
    }

    /// The host resized its canvas.
    pub fn resize(&mut self, width: f32, height: f32) {
        self.viewport = Viewport { width, height };
        self.camera.aspect = self.viewport.aspect();
        debug!(width, height, "viewport resized");
    }

    /// Stops everything the session started: the story task, audio, render
    /// resources, the stage, the cache and the sequencer.
    pub fn teardown(&mut self) {
        if let Some(story) = self.story.take() {
            story.abort();
        }
        if let Some(preloading) = self.preloading.take() {
            preloading.abort();
        }
        self.gestures.cancel();
        self.audio.stop_all();
        self.render.release_all();
        lock(&self.stage).clear();
        self.cache.clear();
        self.preload.reset();
        self.sequencer.reset();
        self.last_frame = None;
        self.session_id = None;
        if self.phase == ShellPhase::Active {
            self.phase = ShellPhase::Ended;
        }
        info!("experience torn down");
    }

    /// Lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> ShellPhase {
        self.phase
    }

    /// Whether an AR session is running. Hosts hide the start affordance
    /// while this is true.
    #[must_use]
    pub fn is_session_active(&self) -> bool {
        self.phase == ShellPhase::Active
    }

    /// Identifier of the running session.
    #[must_use]
    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    /// The tracked camera.
    #[must_use]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Current viewport.
    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Locks the stage for inspection. Do not hold across an `.await`.
    #[must_use]
    pub fn stage(&self) -> MutexGuard<'_, Stage> {
        lock(&self.stage)
    }

    /// Active scene.
    #[must_use]
    pub fn scene_state(&self) -> SceneState {
        self.sequencer.state()
    }

    /// The audio output narration plays through.
    #[must_use]
    pub fn audio(&self) -> &Arc<dyn AudioOutput> {
        &self.audio
    }

    /// The shared asset cache.
    #[must_use]
    pub fn cache(&self) -> &AssetCache {
        &self.cache
    }

    /// The preload coordinator.
    #[must_use]
    pub fn preload(&self) -> &PreloadCoordinator {
        &self.preload
    }

    /// The scene sequencer.
    #[must_use]
    pub fn sequencer(&self) -> &SceneSequencer {
        &self.sequencer
    }
}

impl Drop for PresentationShell {
    fn drop(&mut self) {
        if self.phase == ShellPhase::Active {
            self.teardown();
        }
    }
}

fn lock(stage: &Mutex<Stage>) -> MutexGuard<'_, Stage> {
    stage.lock().unwrap_or_else(PoisonError::into_inner)
}
