//! Per-touch-sequence gesture state.

use glam::Vec2;

/// How a touch sequence is being interpreted. Fixed when the sequence starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureMode {
    /// One finger: horizontal drag spins the model.
    Rotate,
    /// Two fingers spread mostly horizontally: distance change scales.
    Pinch,
    /// Two fingers spread mostly vertically: vertical drag moves in depth.
    Pan,
}

/// State of one continuous touch interaction, from touch-start to touch-end.
#[derive(Debug, Clone, PartialEq)]
pub struct GestureSession {
    pub(crate) mode: GestureMode,
    pub(crate) start: Vec2,
    pub(crate) last_x: f32,
    pub(crate) last_pinch: f32,
    pub(crate) last_mid_y: f32,
    pub(crate) dragging: bool,
}

impl GestureSession {
    /// Opens a session for the touches present at touch-start. Returns `None`
    /// for any count other than one or two.
    #[must_use]
    pub fn begin(touches: &[Vec2]) -> Option<Self> {
        match *touches {
            [point] => Some(Self {
                mode: GestureMode::Rotate,
                start: point,
                last_x: point.x,
                last_pinch: 0.0,
                last_mid_y: 0.0,
                dragging: false,
            }),
            [a, b] => {
                let separation = a - b;
                // Ties go to pinch.
                let mode = if separation.x.abs() >= separation.y.abs() {
                    GestureMode::Pinch
                } else {
                    GestureMode::Pan
                };
                Some(Self {
                    mode,
                    start: (a + b) / 2.0,
                    last_x: 0.0,
                    last_pinch: a.distance(b),
                    last_mid_y: (a.y + b.y) / 2.0,
                    dragging: true,
                })
            }
            _ => None,
        }
    }

    /// The mode chosen at touch-start.
    #[must_use]
    pub fn mode(&self) -> GestureMode {
        self.mode
    }

    /// Whether the sequence has been committed as a drag.
    #[must_use]
    pub fn is_dragging(&self) -> bool {
        self.dragging
    }
}
