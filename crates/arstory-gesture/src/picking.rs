//! Ray picking against interactive panels.

use arstory_core::spatial::{Camera, InteractivePanel};
use glam::{Mat4, Vec2};

/// Casts a ray from `camera` through `ndc` and returns the nearest panel it
/// crosses. `content_to_world` places the panels' parent group in the world.
#[must_use]
pub fn pick_panel<'a>(
    camera: &Camera,
    ndc: Vec2,
    content_to_world: Mat4,
    panels: &'a [InteractivePanel],
) -> Option<&'a InteractivePanel> {
    let ray = camera.ray_through(ndc);
    panels
        .iter()
        .filter_map(|panel| panel.intersect(&ray, content_to_world).map(|d| (d, panel)))
        .min_by(|(a, _), (b, _)| a.total_cmp(b))
        .map(|(_, panel)| panel)
}
