//! Touch stream to pose-delta state machine.

use arstory_core::config::GestureConfig;
use arstory_core::spatial::Viewport;
use arstory_core::stage::PoseDelta;
use glam::Vec2;
use tracing::{debug, trace};

use crate::session::{GestureMode, GestureSession};

/// A completed tap, ready for a ray pick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tap {
    /// Release point in normalized device coordinates.
    pub ndc: Vec2,
}

/// Interprets touch sequences. Holds at most one live [`GestureSession`].
#[derive(Debug, Clone)]
pub struct GestureInterpreter {
    config: GestureConfig,
    session: Option<GestureSession>,
}

impl GestureInterpreter {
    /// Creates an idle interpreter.
    #[must_use]
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }

    /// Opens a new session for the touches currently down, replacing any
    /// previous one.
    pub fn touch_start(&mut self, touches: &[Vec2]) {
        self.session = GestureSession::begin(touches);
        if let Some(session) = &self.session {
            debug!(mode = ?session.mode, touches = touches.len(), "gesture started");
        }
    }

    /// Feeds the touches currently down. Returns the transform change to apply,
    /// if any. `current_scale` is the content group's scale before this move.
    pub fn touch_move(&mut self, touches: &[Vec2], current_scale: f32) -> Option<PoseDelta> {
        let config = self.config;
        let session = self.session.as_mut()?;

        match (session.mode, touches) {
            (GestureMode::Rotate, &[point]) => {
                if !session.dragging && session.start.distance(point) > config.tap_threshold {
                    session.dragging = true;
                    trace!("tap promoted to drag");
                }
                if !session.dragging {
                    return None;
                }
                let dx = point.x - session.last_x;
                session.last_x = point.x;
                Some(PoseDelta::Yaw(-dx * config.rotation_sensitivity))
            }
            (GestureMode::Pinch, &[a, b]) => {
                let distance = a.distance(b);
                let change = (distance - session.last_pinch) * config.scale_sensitivity;
                session.last_pinch = distance;
                Some(PoseDelta::Scale(
                    (current_scale + change).clamp(config.min_scale, config.max_scale),
                ))
            }
            (GestureMode::Pan, &[a, b]) => {
                let mid_y = (a.y + b.y) / 2.0;
                let dy = mid_y - session.last_mid_y;
                session.last_mid_y = mid_y;
                Some(PoseDelta::Depth(dy * config.pan_sensitivity))
            }
            _ => None,
        }
    }

    /// Closes the session. Returns a tap if the sequence never became a drag
    /// and exactly one touch was released.
    pub fn touch_end(&mut self, released: &[Vec2], viewport: &Viewport) -> Option<Tap> {
        let session = self.session.take()?;
        match released {
            [point] if !session.dragging => {
                let Some(ndc) = viewport.to_ndc(point.x, point.y) else {
                    debug!(
                        width = viewport.width,
                        height = viewport.height,
                        "tap on empty viewport ignored"
                    );
                    return None;
                };
                debug!(x = ndc.x, y = ndc.y, "tap");
                Some(Tap { ndc })
            }
            _ => None,
        }
    }

    /// Mode of the live session.
    #[must_use]
    pub fn mode(&self) -> Option<GestureMode> {
        self.session.as_ref().map(GestureSession::mode)
    }

    /// Drops any live session.
    pub fn cancel(&mut self) {
        self.session = None;
    }
}
