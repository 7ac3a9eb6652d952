//! The two-scene sequencer.
//!
//! Scene 1 is entered on the first AR frame; a timer then swaps it for
//! scene 2. All asset access goes through the shared [`AssetCache`], and all
//! scene-graph writes go through the shell-owned [`Stage`].

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use arstory_assets::AssetCache;
use arstory_core::asset::AssetKind;
use arstory_core::config::{
    ContentPlacement, ExperienceConfig, NarrationSettings, SceneId, SceneManifest,
};
use arstory_core::host::AudioOutput;
use arstory_core::spatial::{InteractivePanel, PanelSpec};
use arstory_core::stage::Stage;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::state::{LoadingFlags, SceneState, TransitionOutcome};

#[derive(Debug, Default)]
struct Progress {
    state: SceneState,
    entered: bool,
    loading: LoadingFlags,
    transitions: u32,
    /// Bumped on reset so loads from a previous session never land.
    epoch: u64,
}

/// Drives scene 1 → scene 2.
pub struct SceneSequencer {
    scenes: SceneManifest,
    panels: Vec<PanelSpec>,
    placement: ContentPlacement,
    narration: NarrationSettings,
    delay: Duration,
    cache: Arc<AssetCache>,
    audio: Arc<dyn AudioOutput>,
    stage: Arc<Mutex<Stage>>,
    progress: Mutex<Progress>,
}

impl fmt::Debug for SceneSequencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneSequencer")
            .field("scenes", &self.scenes)
            .field("delay", &self.delay)
            .field("progress", &*self.progress())
            .finish_non_exhaustive()
    }
}

impl SceneSequencer {
    /// Creates a sequencer that has not entered any scene yet.
    #[must_use]
    pub fn new(
        config: &ExperienceConfig,
        cache: Arc<AssetCache>,
        audio: Arc<dyn AudioOutput>,
        stage: Arc<Mutex<Stage>>,
    ) -> Self {
        Self {
            scenes: config.scenes.clone(),
            panels: config.panels.clone(),
            placement: config.content,
            narration: config.narration,
            delay: config.transition_delay(),
            cache,
            audio,
            stage,
            progress: Mutex::new(Progress::default()),
        }
    }

    fn progress(&self) -> MutexGuard<'_, Progress> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stage(&self) -> MutexGuard<'_, Stage> {
        self.stage.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The active scene.
    #[must_use]
    pub fn state(&self) -> SceneState {
        self.progress().state
    }

    /// Whether scene 1 has been entered this session.
    #[must_use]
    pub fn has_entered(&self) -> bool {
        self.progress().entered
    }

    /// Completed transitions this session. Never exceeds one.
    #[must_use]
    pub fn transitions(&self) -> u32 {
        self.progress().transitions
    }

    /// Enters scene 1: mounts the content group, then loads and presents the
    /// scene 1 model and narration. Returns `false` if already entered.
    #[instrument(skip(self))]
    pub async fn enter_first_scene(&self) -> bool {
        let epoch = {
            let mut progress = self.progress();
            if progress.entered {
                return false;
            }
            progress.entered = true;
            progress.epoch
        };

        self.stage().mount_content(&self.placement);
        info!("entering scene 1");
        self.present(SceneId::Scene1, epoch).await;
        true
    }

    /// Spawns the transition timer. The returned handle resolves to what the
    /// firing did; aborting it cancels the transition.
    #[must_use]
    pub fn arm_transition(self: &Arc<Self>) -> JoinHandle<TransitionOutcome> {
        let sequencer = Arc::clone(self);
        tokio::spawn(async move { sequencer.transition_after_delay().await })
    }

    /// Waits out the configured delay, then fires the transition timer.
    pub async fn transition_after_delay(&self) -> TransitionOutcome {
        info!(delay_ms = self.delay.as_millis(), "transition timer armed");
        tokio::time::sleep(self.delay).await;
        self.on_transition_timer().await
    }

    /// Handles a transition-timer firing. Only the first firing while in
    /// scene 1 does anything.
    #[instrument(skip(self))]
    pub async fn on_transition_timer(&self) -> TransitionOutcome {
        let epoch = {
            let mut progress = self.progress();
            if !progress.entered {
                debug!("timer fired before scene 1 was entered");
                return TransitionOutcome::NotEntered;
            }
            if progress.loading.is_loading(SceneId::Scene2) {
                debug!("transition already in flight");
                return TransitionOutcome::InFlight;
            }
            let Some(next) = progress.state.next() else {
                debug!("scene already advanced");
                return TransitionOutcome::AlreadyAdvanced;
            };
            progress.loading.try_begin(SceneId::Scene2);
            progress.state = next;
            progress.epoch
        };

        info!("transition timer elapsed, loading scene 2");
        {
            let mut stage = self.stage();
            if let Some(removed) = stage.unmount_model() {
                info!(model = %removed.model.source, "scene 1 model torn down");
            }
            stage.clear_panels();
            stage.set_panels(self.panels.iter().map(InteractivePanel::from).collect());
        }

        self.present(SceneId::Scene2, epoch).await;

        let mut progress = self.progress();
        if progress.epoch != epoch {
            info!("session reset while scene 2 loaded");
            return TransitionOutcome::Superseded;
        }
        progress.loading.finish(SceneId::Scene2);
        progress.transitions += 1;
        TransitionOutcome::Completed
    }

    /// Returns to the pre-session state. Loads still in flight are left to
    /// finish but will not touch the stage.
    pub fn reset(&self) {
        let mut progress = self.progress();
        let epoch = progress.epoch + 1;
        *progress = Progress {
            epoch,
            ..Progress::default()
        };
    }

    /// Loads a scene's model and narration through the cache, in no
    /// particular order, and presents whichever arrive. Failures are logged.
    async fn present(&self, scene: SceneId, epoch: u64) {
        let assets = self.scenes.scene(scene);

        let model = async {
            match self.cache.get(&assets.model, AssetKind::Model).await {
                Ok(asset) => {
                    let Some(model) = asset.as_model() else {
                        return;
                    };
                    let mounted = self.while_current(scene, epoch, || {
                        self.stage()
                            .mount_model(Arc::clone(model), self.placement.model_yaw);
                    });
                    if mounted {
                        info!(%scene, url = %assets.model, "model mounted");
                    } else {
                        warn!(%scene, url = %assets.model, "model arrived after scene changed, dropped");
                    }
                }
                Err(err) => error!(%scene, error = %err, "model load failed"),
            }
        };

        let narration = async {
            match self.cache.get(&assets.audio, AssetKind::Audio).await {
                Ok(asset) => {
                    let Some(track) = asset.as_audio() else {
                        return;
                    };
                    let played = self.while_current(scene, epoch, || {
                        self.audio.play(Arc::clone(track), self.narration);
                    });
                    if played {
                        info!(%scene, url = %assets.audio, "narration started");
                    } else {
                        warn!(%scene, url = %assets.audio, "narration arrived after scene changed, dropped");
                    }
                }
                Err(err) => error!(%scene, error = %err, "narration load failed"),
            }
        };

        futures::join!(model, narration);
    }

    /// Runs `present` only if `scene` of session `epoch` is still active,
    /// holding the progress lock throughout so a transition or reset cannot
    /// land in between. Lock order: progress, then stage.
    fn while_current(&self, scene: SceneId, epoch: u64, present: impl FnOnce()) -> bool {
        let progress = self.progress();
        if progress.epoch != epoch || progress.state.scene() != scene {
            return false;
        }
        present();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arstory_core::clock::Clock;
    use arstory_test_support::{FixedClock, RecordingAssetLoader, RecordingAudioOutput};
    use chrono::TimeDelta;
    use glam::Vec3;

    struct Fixture {
        loader: Arc<RecordingAssetLoader>,
        audio: Arc<RecordingAudioOutput>,
        stage: Arc<Mutex<Stage>>,
        sequencer: Arc<SceneSequencer>,
    }

    fn fixture(loader: RecordingAssetLoader) -> Fixture {
        let config = ExperienceConfig::default();
        let loader = Arc::new(loader);
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::default());
        let cache = Arc::new(AssetCache::new(
            Arc::clone(&loader) as _,
            clock,
            TimeDelta::minutes(30),
        ));
        let audio = Arc::new(RecordingAudioOutput::default());
        let stage = Arc::new(Mutex::new(Stage::new()));
        let sequencer = Arc::new(SceneSequencer::new(
            &config,
            cache,
            Arc::clone(&audio) as _,
            Arc::clone(&stage),
        ));
        Fixture {
            loader,
            audio,
            stage,
            sequencer,
        }
    }

    fn mounted_model(stage: &Mutex<Stage>) -> Option<String> {
        stage
            .lock()
            .unwrap()
            .model()
            .map(|instance| instance.model.source.clone())
    }

    #[tokio::test]
    async fn test_enter_first_scene_presents_model_and_narration() {
        // Arrange
        let f = fixture(RecordingAssetLoader::new());

        // Act
        let entered = f.sequencer.enter_first_scene().await;

        // Assert
        assert!(entered);
        assert_eq!(f.sequencer.state(), SceneState::Scene1);
        assert_eq!(mounted_model(&f.stage).as_deref(), Some("/siatangwave.glb"));
        assert_eq!(f.audio.played(), vec!["/scene1.mp3".to_owned()]);
        let settings = f.audio.settings()[0];
        assert!((settings.volume - 0.5).abs() < f32::EPSILON);
        assert!(!settings.looped);

        let stage = f.stage.lock().unwrap();
        let content = stage.content().unwrap();
        assert!(content.position.abs_diff_eq(Vec3::new(0.0, -1.0, -2.5), 1e-6));
        let instance = stage.model().unwrap();
        assert!((instance.yaw + std::f32::consts::FRAC_PI_2).abs() < 1e-6);
        assert!(instance.mixer.is_playing());
    }

    #[tokio::test]
    async fn test_enter_first_scene_is_once_per_session() {
        // Arrange
        let f = fixture(RecordingAssetLoader::new());
        f.sequencer.enter_first_scene().await;

        // Act
        let again = f.sequencer.enter_first_scene().await;

        // Assert
        assert!(!again);
        assert_eq!(f.loader.calls().len(), 2);
        assert_eq!(f.audio.played().len(), 1);
    }

    #[tokio::test]
    async fn test_timer_before_entry_does_nothing() {
        let f = fixture(RecordingAssetLoader::new());

        let outcome = f.sequencer.on_transition_timer().await;

        assert_eq!(outcome, TransitionOutcome::NotEntered);
        assert!(f.loader.calls().is_empty());
    }

    #[tokio::test]
    async fn test_transition_replaces_scene_one_with_scene_two_and_panels() {
        // Arrange
        let f = fixture(RecordingAssetLoader::new());
        f.sequencer.enter_first_scene().await;

        // Act
        let outcome = f.sequencer.on_transition_timer().await;

        // Assert
        assert_eq!(outcome, TransitionOutcome::Completed);
        assert_eq!(f.sequencer.state(), SceneState::Scene2);
        assert_eq!(f.sequencer.transitions(), 1);
        assert_eq!(mounted_model(&f.stage).as_deref(), Some("/siatang-opt.glb"));
        assert_eq!(
            f.audio.played(),
            vec!["/scene1.mp3".to_owned(), "/scene2.mp3".to_owned()]
        );

        let mut stage = f.stage.lock().unwrap();
        let released: Vec<String> = stage
            .take_released()
            .iter()
            .map(|model| model.source.clone())
            .collect();
        assert_eq!(released, vec!["/siatangwave.glb".to_owned()]);
        let panels = stage.panels();
        assert_eq!(panels.len(), 2);
        assert_eq!(panels[0].label, "Opsi 1");
        assert_eq!(panels[0].link, "https://www.google.com");
        assert_eq!(panels[0].transform.translation, Vec3::new(1.5, 4.0, 0.0));
        assert_eq!(panels[1].label, "Opsi 2");
        assert_eq!(panels[1].link, "https://www.bing.com");
        assert_eq!(panels[1].transform.translation, Vec3::new(-1.5, 4.0, 0.0));
    }

    #[tokio::test]
    async fn test_redundant_timer_firings_after_transition_are_noops() {
        // Arrange
        let f = fixture(RecordingAssetLoader::new());
        f.sequencer.enter_first_scene().await;
        f.sequencer.on_transition_timer().await;
        let calls_before = f.loader.calls().len();
        let generation_before = f.stage.lock().unwrap().generation();

        // Act
        let mut outcomes = Vec::new();
        for _ in 0..5 {
            outcomes.push(f.sequencer.on_transition_timer().await);
        }

        // Assert
        assert!(outcomes.iter().all(|o| *o == TransitionOutcome::AlreadyAdvanced));
        assert_eq!(f.loader.calls().len(), calls_before);
        assert_eq!(f.stage.lock().unwrap().generation(), generation_before);
        assert_eq!(f.sequencer.transitions(), 1);
        assert_eq!(f.audio.played().len(), 2);
    }

    #[tokio::test]
    async fn test_overlapping_firing_is_rejected_and_late_scene_one_assets_are_dropped() {
        // Arrange
        let f = fixture(RecordingAssetLoader::gated());

        // Act
        let (entered, first, second, ()) = tokio::join!(
            f.sequencer.enter_first_scene(),
            f.sequencer.on_transition_timer(),
            f.sequencer.on_transition_timer(),
            async { f.loader.open_gate() },
        );

        // Assert
        assert!(entered);
        assert_eq!(first, TransitionOutcome::Completed);
        assert_eq!(second, TransitionOutcome::InFlight);
        assert_eq!(mounted_model(&f.stage).as_deref(), Some("/siatang-opt.glb"));
        assert_eq!(f.audio.played(), vec!["/scene2.mp3".to_owned()]);
        assert_eq!(f.sequencer.transitions(), 1);
    }

    #[tokio::test]
    async fn test_scene_two_model_failure_still_shows_panels_and_narration() {
        // Arrange
        let loader = RecordingAssetLoader::new();
        loader.fail_on("/siatang-opt.glb");
        let f = fixture(loader);
        f.sequencer.enter_first_scene().await;

        // Act
        let outcome = f.sequencer.on_transition_timer().await;

        // Assert
        assert_eq!(outcome, TransitionOutcome::Completed);
        assert!(mounted_model(&f.stage).is_none());
        assert_eq!(f.stage.lock().unwrap().panels().len(), 2);
        assert_eq!(f.audio.played().last().map(String::as_str), Some("/scene2.mp3"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_armed_timer_fires_after_configured_delay() {
        // Arrange
        let f = fixture(RecordingAssetLoader::new());
        f.sequencer.enter_first_scene().await;
        let started = tokio::time::Instant::now();

        // Act
        let handle = f.sequencer.arm_transition();
        tokio::time::sleep(Duration::from_millis(4_900)).await;
        let before_deadline = f.sequencer.state();
        let outcome = handle.await.unwrap();

        // Assert
        assert_eq!(before_deadline, SceneState::Scene1);
        assert_eq!(outcome, TransitionOutcome::Completed);
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert_eq!(f.sequencer.state(), SceneState::Scene2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborted_timer_never_transitions() {
        // Arrange
        let f = fixture(RecordingAssetLoader::new());
        f.sequencer.enter_first_scene().await;
        let handle = f.sequencer.arm_transition();

        // Act
        handle.abort();
        tokio::time::sleep(Duration::from_secs(10)).await;

        // Assert
        assert_eq!(f.sequencer.state(), SceneState::Scene1);
        assert_eq!(f.sequencer.transitions(), 0);
    }

    #[tokio::test]
    async fn test_reset_returns_to_pre_session_state() {
        // Arrange
        let f = fixture(RecordingAssetLoader::new());
        f.sequencer.enter_first_scene().await;
        f.sequencer.on_transition_timer().await;

        // Act
        f.sequencer.reset();

        // Assert
        assert!(!f.sequencer.has_entered());
        assert_eq!(f.sequencer.state(), SceneState::Scene1);
        assert_eq!(f.sequencer.transitions(), 0);
    }

    #[tokio::test]
    async fn test_reset_during_scene_two_load_reports_superseded() {
        // Arrange
        let f = fixture(RecordingAssetLoader::gated());

        // Act
        let (_, outcome, ()) = tokio::join!(
            f.sequencer.enter_first_scene(),
            f.sequencer.on_transition_timer(),
            async {
                f.sequencer.reset();
                f.loader.open_gate();
            },
        );

        // Assert
        assert_eq!(outcome, TransitionOutcome::Superseded);
        assert_eq!(f.sequencer.transitions(), 0);
        assert!(mounted_model(&f.stage).is_none());
        assert!(f.audio.played().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_late_scene_one_model_never_lands_over_scene_two_across_threads() {
        for _ in 0..50 {
            // Arrange
            let f = fixture(RecordingAssetLoader::gated());
            let entering = {
                let sequencer = Arc::clone(&f.sequencer);
                tokio::spawn(async move { sequencer.enter_first_scene().await })
            };
            while !f.sequencer.has_entered() {
                tokio::task::yield_now().await;
            }

            // Act
            let transition = {
                let sequencer = Arc::clone(&f.sequencer);
                tokio::spawn(async move { sequencer.on_transition_timer().await })
            };
            f.loader.open_gate();
            entering.await.unwrap();
            let outcome = transition.await.unwrap();

            // Assert
            assert_eq!(outcome, TransitionOutcome::Completed);
            assert_eq!(mounted_model(&f.stage).as_deref(), Some("/siatang-opt.glb"));
        }
    }
}
