//! Experience configuration.
//!
//! Defaults reproduce the shipped experience; a YAML document or environment
//! variables may override them.

use std::fmt;
use std::time::Duration;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::asset::AssetKind;
use crate::error::ExperienceError;
use crate::spatial::PanelSpec;

/// Prefix prepended to every asset path.
pub const ENV_ASSET_BASE: &str = "ARSTORY_ASSET_BASE";
/// Scene transition delay in milliseconds.
pub const ENV_TRANSITION_DELAY_MS: &str = "ARSTORY_TRANSITION_DELAY_MS";
/// Cache time-to-live in seconds.
pub const ENV_CACHE_TTL_SECS: &str = "ARSTORY_CACHE_TTL_SECS";

/// One of the two fixed scenes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneId {
    /// The opening scene.
    Scene1,
    /// The closing scene with link panels.
    Scene2,
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scene1 => f.write_str("scene1"),
            Self::Scene2 => f.write_str("scene2"),
        }
    }
}

/// The model and narration track for one scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneAssets {
    /// Model URL.
    pub model: String,
    /// Narration URL.
    pub audio: String,
}

impl SceneAssets {
    /// URL for the given kind.
    #[must_use]
    pub fn url(&self, kind: AssetKind) -> &str {
        match kind {
            AssetKind::Model => &self.model,
            AssetKind::Audio => &self.audio,
        }
    }
}

/// Asset URLs for both scenes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneManifest {
    /// Opening scene.
    pub scene1: SceneAssets,
    /// Closing scene.
    pub scene2: SceneAssets,
}

impl Default for SceneManifest {
    fn default() -> Self {
        Self {
            scene1: SceneAssets {
                model: "/siatangwave.glb".to_owned(),
                audio: "/scene1.mp3".to_owned(),
            },
            scene2: SceneAssets {
                model: "/siatang-opt.glb".to_owned(),
                audio: "/scene2.mp3".to_owned(),
            },
        }
    }
}

impl SceneManifest {
    /// Assets for one scene.
    #[must_use]
    pub fn scene(&self, scene: SceneId) -> &SceneAssets {
        match scene {
            SceneId::Scene1 => &self.scene1,
            SceneId::Scene2 => &self.scene2,
        }
    }

    /// Every `(scene, kind, url)` triple, scene 1 first.
    #[must_use]
    pub fn entries(&self) -> Vec<(SceneId, AssetKind, String)> {
        [SceneId::Scene1, SceneId::Scene2]
            .into_iter()
            .flat_map(|scene| {
                [AssetKind::Model, AssetKind::Audio]
                    .into_iter()
                    .map(move |kind| (scene, kind, self.scene(scene).url(kind).to_owned()))
            })
            .collect()
    }

    fn prefix_all(&mut self, base: &str) {
        let base = base.trim_end_matches('/');
        for assets in [&mut self.scene1, &mut self.scene2] {
            assets.model = format!("{base}{}", assets.model);
            assets.audio = format!("{base}{}", assets.audio);
        }
    }
}

/// Touch gesture tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Radians of yaw per pixel of horizontal drag.
    pub rotation_sensitivity: f32,
    /// Depth units per pixel of vertical two-finger drag.
    pub pan_sensitivity: f32,
    /// Scale units per pixel of pinch distance change.
    pub scale_sensitivity: f32,
    /// Lower scale bound.
    pub min_scale: f32,
    /// Upper scale bound.
    pub max_scale: f32,
    /// Pixels a single touch must travel before it counts as a drag.
    pub tap_threshold: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            rotation_sensitivity: 0.01,
            pan_sensitivity: 0.01,
            scale_sensitivity: 0.002,
            min_scale: 0.1,
            max_scale: 3.0,
            tap_threshold: 10.0,
        }
    }
}

/// Where the content group sits relative to the camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentPlacement {
    /// Offset from the camera.
    pub position: [f32; 3],
    /// Initial uniform scale.
    pub scale: f32,
    /// Yaw applied to every freshly mounted model, in radians.
    pub model_yaw: f32,
}

impl Default for ContentPlacement {
    fn default() -> Self {
        Self {
            position: [0.0, -1.0, -2.5],
            scale: 0.3,
            model_yaw: -std::f32::consts::FRAC_PI_2,
        }
    }
}

/// Narration playback settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrationSettings {
    /// Gain in [0, 1].
    pub volume: f32,
    /// Whether the track repeats.
    pub looped: bool,
}

impl Default for NarrationSettings {
    fn default() -> Self {
        Self {
            volume: 0.5,
            looped: false,
        }
    }
}

/// Camera projection parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Vertical field of view in degrees.
    pub fov_y_degrees: f32,
    /// Near clip distance.
    pub near: f32,
    /// Far clip distance.
    pub far: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            fov_y_degrees: 70.0,
            near: 0.01,
            far: 20.0,
        }
    }
}

/// Everything tunable about the experience.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperienceConfig {
    /// Asset URLs per scene.
    pub scenes: SceneManifest,
    /// Link panels shown in scene 2.
    pub panels: Vec<PanelSpec>,
    /// Gesture tuning.
    pub gestures: GestureConfig,
    /// Cache entry lifetime in seconds.
    pub cache_ttl_secs: u64,
    /// Delay between entering scene 1 and switching to scene 2.
    pub transition_delay_ms: u64,
    /// Content group placement.
    pub content: ContentPlacement,
    /// Narration playback.
    pub narration: NarrationSettings,
    /// Camera projection.
    pub camera: CameraSettings,
}

impl Default for ExperienceConfig {
    fn default() -> Self {
        Self {
            scenes: SceneManifest::default(),
            panels: vec![
                PanelSpec {
                    label: "Opsi 1".to_owned(),
                    link: "https://www.google.com".to_owned(),
                    position: [1.5, 4.0, 0.0],
                    width: 1.5,
                    height: 0.75,
                },
                PanelSpec {
                    label: "Opsi 2".to_owned(),
                    link: "https://www.bing.com".to_owned(),
                    position: [-1.5, 4.0, 0.0],
                    width: 1.5,
                    height: 0.75,
                },
            ],
            gestures: GestureConfig::default(),
            cache_ttl_secs: 30 * 60,
            transition_delay_ms: 5_000,
            content: ContentPlacement::default(),
            narration: NarrationSettings::default(),
            camera: CameraSettings::default(),
        }
    }
}

impl ExperienceConfig {
    /// Parses a YAML document; omitted fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ExperienceError::Configuration` if the document is malformed
    /// or fails validation.
    pub fn from_yaml_str(source: &str) -> Result<Self, ExperienceError> {
        let config: Self = serde_yaml::from_str(source)
            .map_err(|e| ExperienceError::Configuration(format!("invalid YAML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `ARSTORY_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ExperienceError::Configuration` if a variable cannot be parsed.
    pub fn from_env() -> Result<Self, ExperienceError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by values from `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `ExperienceError::Configuration` if a value cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ExperienceError> {
        let mut config = Self::default();

        if let Some(base) = lookup(ENV_ASSET_BASE) {
            debug!(%base, "asset base overridden");
            config.scenes.prefix_all(&base);
        }
        if let Some(raw) = lookup(ENV_TRANSITION_DELAY_MS) {
            config.transition_delay_ms = raw.parse().map_err(|e| {
                ExperienceError::Configuration(format!("{ENV_TRANSITION_DELAY_MS} must be a u64: {e}"))
            })?;
        }
        if let Some(raw) = lookup(ENV_CACHE_TTL_SECS) {
            config.cache_ttl_secs = raw.parse().map_err(|e| {
                ExperienceError::Configuration(format!("{ENV_CACHE_TTL_SECS} must be a u64: {e}"))
            })?;
        }

        debug!(
            delay_ms = config.transition_delay_ms,
            ttl_secs = config.cache_ttl_secs,
            "configuration loaded"
        );
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns `ExperienceError::Configuration` describing the first violation.
    pub fn validate(&self) -> Result<(), ExperienceError> {
        let g = &self.gestures;
        if !(g.min_scale > 0.0 && g.min_scale < g.max_scale) {
            return Err(ExperienceError::Configuration(format!(
                "scale bounds must satisfy 0 < min < max, got [{}, {}]",
                g.min_scale, g.max_scale
            )));
        }
        if g.tap_threshold <= 0.0 {
            return Err(ExperienceError::Configuration(
                "tap threshold must be positive".to_owned(),
            ));
        }
        if self.cache_ttl_secs == 0 {
            return Err(ExperienceError::Configuration(
                "cache TTL must be positive".to_owned(),
            ));
        }
        Ok(())
    }

    /// Cache entry lifetime.
    #[must_use]
    pub fn cache_ttl(&self) -> TimeDelta {
        i64::try_from(self.cache_ttl_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX)
    }

    /// Delay before the scene transition fires.
    #[must_use]
    pub fn transition_delay(&self) -> Duration {
        Duration::from_millis(self.transition_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_shipped_experience() {
        let config = ExperienceConfig::default();

        assert_eq!(config.cache_ttl(), TimeDelta::minutes(30));
        assert_eq!(config.transition_delay(), Duration::from_secs(5));
        assert_eq!(config.panels.len(), 2);
        assert_eq!(config.panels[0].position, [1.5, 4.0, 0.0]);
        assert_eq!(config.panels[1].position, [-1.5, 4.0, 0.0]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_manifest_entries_cover_both_scenes_and_kinds() {
        let entries = SceneManifest::default().entries();

        assert_eq!(entries.len(), 4);
        assert_eq!(
            entries[0],
            (SceneId::Scene1, AssetKind::Model, "/siatangwave.glb".to_owned())
        );
        assert_eq!(
            entries[3],
            (SceneId::Scene2, AssetKind::Audio, "/scene2.mp3".to_owned())
        );
    }

    #[test]
    fn test_yaml_overrides_only_listed_fields() {
        let yaml = "transition_delay_ms: 1500\ngestures:\n  max_scale: 2.0\n";

        let config = ExperienceConfig::from_yaml_str(yaml).unwrap();

        assert_eq!(config.transition_delay_ms, 1500);
        assert!((config.gestures.max_scale - 2.0).abs() < f32::EPSILON);
        assert!((config.gestures.min_scale - 0.1).abs() < f32::EPSILON);
        assert_eq!(config.scenes, SceneManifest::default());
    }

    #[test]
    fn test_yaml_with_inverted_scale_bounds_is_rejected() {
        let yaml = "gestures:\n  min_scale: 4.0\n";

        let result = ExperienceConfig::from_yaml_str(yaml);

        assert!(matches!(result, Err(ExperienceError::Configuration(_))));
    }

    #[test]
    fn test_lookup_prefixes_assets_and_parses_numbers() {
        let config = ExperienceConfig::from_lookup(|key| match key {
            ENV_ASSET_BASE => Some("https://cdn.example.com/".to_owned()),
            ENV_CACHE_TTL_SECS => Some("60".to_owned()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.scenes.scene1.model, "https://cdn.example.com/siatangwave.glb");
        assert_eq!(config.cache_ttl(), TimeDelta::seconds(60));
    }

    #[test]
    fn test_lookup_rejects_unparseable_delay() {
        let result = ExperienceConfig::from_lookup(|key| {
            (key == ENV_TRANSITION_DELAY_MS).then(|| "soon".to_owned())
        });

        match result {
            Err(ExperienceError::Configuration(message)) => {
                assert!(message.contains(ENV_TRANSITION_DELAY_MS));
            }
            other => panic!("expected Configuration error, got {other:?}"),
        }
    }

    #[test]
    fn test_config_serializes_with_snake_case_keys_for_the_host() {
        let value = serde_json::to_value(ExperienceConfig::default()).unwrap();

        assert_eq!(value["scenes"]["scene1"]["model"], "/siatangwave.glb");
        assert_eq!(value["scenes"]["scene2"]["audio"], "/scene2.mp3");
        assert_eq!(value["transition_delay_ms"], 5000);
        assert_eq!(value["panels"][1]["label"], "Opsi 2");
    }
}
