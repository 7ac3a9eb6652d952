//! Scene state, load flags and transition outcomes.

use std::collections::HashMap;

use arstory_core::config::SceneId;

/// Which scene is active. Moves forward only, once per session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SceneState {
    /// The opening scene.
    #[default]
    Scene1,
    /// The closing scene. Terminal.
    Scene2,
}

impl SceneState {
    /// The scene this state presents.
    #[must_use]
    pub fn scene(self) -> SceneId {
        match self {
            Self::Scene1 => SceneId::Scene1,
            Self::Scene2 => SceneId::Scene2,
        }
    }

    /// The state after the transition, or `None` from the terminal state.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Scene1 => Some(Self::Scene2),
            Self::Scene2 => None,
        }
    }
}

/// In-flight markers for scene loads.
#[derive(Debug, Clone, Default)]
pub struct LoadingFlags {
    flags: HashMap<SceneId, bool>,
}

impl LoadingFlags {
    /// Marks `scene` as loading. Returns `false` if it already was.
    pub fn try_begin(&mut self, scene: SceneId) -> bool {
        let flag = self.flags.entry(scene).or_default();
        if *flag {
            return false;
        }
        *flag = true;
        true
    }

    /// Clears the marker for `scene`.
    pub fn finish(&mut self, scene: SceneId) {
        self.flags.insert(scene, false);
    }

    /// Whether `scene` is loading.
    #[must_use]
    pub fn is_loading(&self, scene: SceneId) -> bool {
        self.flags.get(&scene).copied().unwrap_or(false)
    }
}

/// What a transition-timer firing did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Scene 1 was replaced by scene 2.
    Completed,
    /// The scene was already advanced; nothing happened.
    AlreadyAdvanced,
    /// A transition is still running; nothing happened.
    InFlight,
    /// Scene 1 was never entered; nothing happened.
    NotEntered,
    /// The session was reset while scene 2 loaded; nothing was shown.
    Superseded,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_moves_forward_once() {
        assert_eq!(SceneState::default(), SceneState::Scene1);
        assert_eq!(SceneState::Scene1.next(), Some(SceneState::Scene2));
        assert_eq!(SceneState::Scene2.next(), None);
        assert_eq!(SceneState::Scene2.scene(), SceneId::Scene2);
    }

    #[test]
    fn test_loading_flag_rejects_overlapping_begin() {
        let mut flags = LoadingFlags::default();

        assert!(flags.try_begin(SceneId::Scene2));
        assert!(!flags.try_begin(SceneId::Scene2));
        assert!(flags.is_loading(SceneId::Scene2));
        assert!(!flags.is_loading(SceneId::Scene1));

        flags.finish(SceneId::Scene2);
        assert!(!flags.is_loading(SceneId::Scene2));
        assert!(flags.try_begin(SceneId::Scene2));
    }
}
