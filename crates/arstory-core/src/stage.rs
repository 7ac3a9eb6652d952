//! The CPU-side scene graph owned by the presentation shell.
//!
//! Single writer per field: the scene sequencer mounts models and panels,
//! gesture deltas move the content group and the model's yaw, and the render
//! loop advances the animation mixer.

use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};

use crate::asset::{AnimationClip, ModelData};
use crate::config::ContentPlacement;
use crate::spatial::InteractivePanel;

/// Plays the first clip of a model on a loop.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationMixer {
    clip: Option<AnimationClip>,
    time: f32,
    playing: bool,
}

impl AnimationMixer {
    /// Starts the model's first clip. A model without clips yields an idle
    /// mixer.
    #[must_use]
    pub fn play_first(model: &ModelData) -> Self {
        let clip = model.animations.first().cloned();
        let playing = clip.is_some();
        Self {
            clip,
            time: 0.0,
            playing,
        }
    }

    /// Advances playback by `dt` seconds, wrapping at the clip end.
    pub fn update(&mut self, dt: f32) {
        if !self.playing {
            return;
        }
        if let Some(clip) = &self.clip {
            self.time += dt;
            if clip.duration > 0.0 {
                self.time %= clip.duration;
            }
        }
    }

    /// Halts playback.
    pub fn stop_all(&mut self) {
        self.playing = false;
    }

    /// Whether a clip is playing.
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Playback position in seconds.
    #[must_use]
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Name of the active clip.
    #[must_use]
    pub fn clip_name(&self) -> Option<&str> {
        self.clip.as_ref().map(|clip| clip.name.as_str())
    }
}

/// A model placed in the content group.
#[derive(Debug, Clone)]
pub struct ModelInstance {
    /// Decoded model shared with the asset cache.
    pub model: Arc<ModelData>,
    /// Rotation about the vertical axis, in radians.
    pub yaw: f32,
    /// Animation state.
    pub mixer: AnimationMixer,
}

/// Camera-relative group holding the model and the panels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContentGroup {
    /// Offset from the camera.
    pub position: Vec3,
    /// Uniform scale.
    pub scale: f32,
}

impl ContentGroup {
    /// Group-to-camera matrix.
    #[must_use]
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(Vec3::splat(self.scale), Quat::IDENTITY, self.position)
    }
}

/// A transform change produced by a touch gesture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PoseDelta {
    /// Add to the model's yaw.
    Yaw(f32),
    /// Set the content group's uniform scale (already clamped).
    Scale(f32),
    /// Add to the content group's depth offset.
    Depth(f32),
}

/// The scene graph.
#[derive(Debug, Default)]
pub struct Stage {
    content: Option<ContentGroup>,
    model: Option<ModelInstance>,
    panels: Vec<InteractivePanel>,
    released: Vec<Arc<ModelData>>,
    generation: u64,
}

impl Stage {
    /// An empty stage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the content group if it does not exist yet.
    pub fn mount_content(&mut self, placement: &ContentPlacement) {
        if self.content.is_none() {
            self.content = Some(ContentGroup {
                position: Vec3::from_array(placement.position),
                scale: placement.scale,
            });
            self.generation += 1;
        }
    }

    /// The content group, once mounted.
    #[must_use]
    pub fn content(&self) -> Option<&ContentGroup> {
        self.content.as_ref()
    }

    /// Places `model` in the content group and starts its first clip,
    /// replacing any previous model.
    pub fn mount_model(&mut self, model: Arc<ModelData>, yaw: f32) {
        self.unmount_model();
        let mixer = AnimationMixer::play_first(&model);
        self.model = Some(ModelInstance { model, yaw, mixer });
        self.generation += 1;
    }

    /// Removes the current model, stopping its mixer. The model is queued
    /// for release until [`Stage::take_released`] collects it.
    pub fn unmount_model(&mut self) -> Option<ModelInstance> {
        let mut removed = self.model.take()?;
        removed.mixer.stop_all();
        self.released.push(Arc::clone(&removed.model));
        self.generation += 1;
        Some(removed)
    }

    /// Drains the models removed since the last call. The renderer frees
    /// their GPU resources.
    pub fn take_released(&mut self) -> Vec<Arc<ModelData>> {
        std::mem::take(&mut self.released)
    }

    /// The mounted model.
    #[must_use]
    pub fn model(&self) -> Option<&ModelInstance> {
        self.model.as_ref()
    }

    /// Replaces the interactive panel set.
    pub fn set_panels(&mut self, panels: Vec<InteractivePanel>) {
        self.panels = panels;
        self.generation += 1;
    }

    /// Removes all interactive panels.
    pub fn clear_panels(&mut self) {
        if !self.panels.is_empty() {
            self.panels.clear();
            self.generation += 1;
        }
    }

    /// The interactive panels.
    #[must_use]
    pub fn panels(&self) -> &[InteractivePanel] {
        &self.panels
    }

    /// Advances the active animation.
    pub fn advance(&mut self, dt: f32) {
        if let Some(instance) = &mut self.model {
            instance.mixer.update(dt);
        }
    }

    /// Applies a gesture delta. Ignored while no model is mounted.
    pub fn apply(&mut self, delta: PoseDelta) {
        let (Some(instance), Some(content)) = (&mut self.model, &mut self.content) else {
            return;
        };
        match delta {
            PoseDelta::Yaw(amount) => instance.yaw += amount,
            PoseDelta::Scale(scale) => content.scale = scale,
            PoseDelta::Depth(amount) => content.position.z += amount,
        }
    }

    /// Content-group-to-world matrix given the camera pose.
    #[must_use]
    pub fn content_to_world(&self, camera_pose: Mat4) -> Mat4 {
        self.content
            .map_or(camera_pose, |content| camera_pose * content.matrix())
    }

    /// World position of each panel given the camera pose.
    #[must_use]
    pub fn panel_world_positions(&self, camera_pose: Mat4) -> Vec<Vec3> {
        let parent = self.content_to_world(camera_pose);
        self.panels
            .iter()
            .map(|panel| parent.transform_point3(panel.transform.translation))
            .collect()
    }

    /// Bumped on every structural change so a renderer can skip resyncs.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Drops everything, including the release queue. Callers release all
    /// renderer resources alongside.
    pub fn clear(&mut self) {
        self.model = None;
        self.released.clear();
        self.panels.clear();
        self.content = None;
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model_with_clip(duration: f32) -> Arc<ModelData> {
        Arc::new(ModelData {
            source: "/m.glb".to_owned(),
            byte_len: 1,
            animations: vec![AnimationClip {
                name: "wave".to_owned(),
                duration,
            }],
        })
    }

    fn mounted_stage() -> Stage {
        let mut stage = Stage::new();
        stage.mount_content(&ContentPlacement::default());
        stage.mount_model(model_with_clip(2.0), 0.0);
        stage
    }

    #[test]
    fn test_mixer_loops_first_clip() {
        let mut stage = mounted_stage();

        stage.advance(1.5);
        stage.advance(1.0);

        let mixer = &stage.model().unwrap().mixer;
        assert_eq!(mixer.clip_name(), Some("wave"));
        assert!((mixer.time() - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_mixer_without_clips_is_idle() {
        let model = ModelData {
            source: "/m.glb".to_owned(),
            byte_len: 1,
            animations: Vec::new(),
        };

        let mut mixer = AnimationMixer::play_first(&model);
        mixer.update(1.0);

        assert!(!mixer.is_playing());
        assert!(mixer.time().abs() < f32::EPSILON);
    }

    #[test]
    fn test_unmount_model_stops_mixer_and_empties_slot() {
        let mut stage = mounted_stage();

        let removed = stage.unmount_model().unwrap();

        assert!(!removed.mixer.is_playing());
        assert!(stage.model().is_none());
        assert!(stage.unmount_model().is_none());
    }

    #[test]
    fn test_replaced_and_unmounted_models_are_queued_for_release_once() {
        // Arrange
        let mut stage = mounted_stage();
        let second = Arc::new(ModelData {
            source: "/second.glb".to_owned(),
            byte_len: 1,
            animations: Vec::new(),
        });

        // Act
        stage.mount_model(Arc::clone(&second), 0.0);
        let after_replace = stage.take_released();
        stage.unmount_model();
        let after_unmount = stage.take_released();
        let drained = stage.take_released();

        // Assert
        let sources = |models: &[Arc<ModelData>]| {
            models.iter().map(|m| m.source.clone()).collect::<Vec<_>>()
        };
        assert_eq!(sources(&after_replace), vec!["/m.glb".to_owned()]);
        assert_eq!(sources(&after_unmount), vec!["/second.glb".to_owned()]);
        assert!(drained.is_empty());
    }

    #[test]
    fn test_deltas_ignored_without_model() {
        let mut stage = Stage::new();
        stage.mount_content(&ContentPlacement::default());

        stage.apply(PoseDelta::Scale(2.0));

        assert!((stage.content().unwrap().scale - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn test_deltas_update_yaw_scale_and_depth() {
        let mut stage = mounted_stage();

        stage.apply(PoseDelta::Yaw(-0.25));
        stage.apply(PoseDelta::Scale(1.2));
        stage.apply(PoseDelta::Depth(0.5));

        assert!((stage.model().unwrap().yaw + 0.25).abs() < 1e-6);
        let content = stage.content().unwrap();
        assert!((content.scale - 1.2).abs() < 1e-6);
        assert!((content.position.z + 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_panel_world_positions_follow_content_group() {
        let mut stage = mounted_stage();
        stage.set_panels(vec![InteractivePanel::at("a", "https://a", Vec3::new(1.5, 4.0, 0.0))]);

        let positions = stage.panel_world_positions(Mat4::IDENTITY);

        // (0,-1,-2.5) + 0.3 * (1.5, 4, 0)
        assert!(positions[0].abs_diff_eq(Vec3::new(0.45, 0.2, -2.5), 1e-5));
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut stage = mounted_stage();
        stage.set_panels(vec![InteractivePanel::at("a", "https://a", Vec3::ZERO)]);
        let before = stage.generation();

        stage.clear();

        assert!(stage.content().is_none());
        assert!(stage.model().is_none());
        assert!(stage.panels().is_empty());
        assert!(stage.take_released().is_empty());
        assert!(stage.generation() > before);
    }
}
