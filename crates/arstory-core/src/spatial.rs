//! Spatial types: transforms, the AR camera, rays and tappable panels.

use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// Translation, rotation and scale of a scene-graph node relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Position relative to the parent.
    pub translation: Vec3,
    /// Orientation relative to the parent.
    pub rotation: Quat,
    /// Per-axis scale.
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    /// A pure translation.
    #[must_use]
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    /// Local-to-parent matrix.
    #[must_use]
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// Screen size in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Width in pixels.
    pub width: f32,
    /// Height in pixels.
    pub height: f32,
}

impl Viewport {
    /// Width over height; 1.0 for a degenerate viewport.
    #[must_use]
    pub fn aspect(&self) -> f32 {
        if self.height > 0.0 {
            self.width / self.height
        } else {
            1.0
        }
    }

    /// Whether the viewport covers any screen area.
    #[must_use]
    pub fn has_area(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    /// Converts a pixel position (origin top-left, y down) to normalized
    /// device coordinates (origin center, y up, both axes in [-1, 1]).
    /// `None` for a viewport without area or a non-finite position.
    #[must_use]
    pub fn to_ndc(&self, x: f32, y: f32) -> Option<Vec2> {
        if !self.has_area() {
            return None;
        }
        let ndc = Vec2::new((x / self.width) * 2.0 - 1.0, -(y / self.height) * 2.0 + 1.0);
        ndc.is_finite().then_some(ndc)
    }
}

/// A half-line in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Start point.
    pub origin: Vec3,
    /// Unit direction.
    pub direction: Vec3,
}

/// Perspective camera tracked by the AR session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// Camera-to-world matrix, updated from the AR viewer pose every frame.
    pub pose: Mat4,
    /// Vertical field of view in degrees.
    pub fov_y_degrees: f32,
    /// Width over height.
    pub aspect: f32,
    /// Near clip distance.
    pub near: f32,
    /// Far clip distance.
    pub far: f32,
}

impl Camera {
    /// Camera at the world origin looking down -Z.
    #[must_use]
    pub fn perspective(fov_y_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            pose: Mat4::IDENTITY,
            fov_y_degrees,
            aspect,
            near,
            far,
        }
    }

    /// Projection matrix.
    #[must_use]
    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_degrees.to_radians(), self.aspect, self.near, self.far)
    }

    /// World-to-camera matrix.
    #[must_use]
    pub fn view(&self) -> Mat4 {
        self.pose.inverse()
    }

    /// Camera position in world space.
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.pose.w_axis.truncate()
    }

    /// Ray from the camera through a point given in normalized device
    /// coordinates.
    #[must_use]
    pub fn ray_through(&self, ndc: Vec2) -> Ray {
        let inv_view_proj = (self.projection() * self.view()).inverse();
        let far_point = inv_view_proj * Vec4::new(ndc.x, ndc.y, 1.0, 1.0);
        let far_world = far_point.truncate() / far_point.w;
        let origin = self.position();

        Ray {
            origin,
            direction: (far_world - origin).normalize(),
        }
    }
}

/// Layout of a tappable panel: what it says, where it links, where it sits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelSpec {
    /// Text drawn on the panel.
    pub label: String,
    /// External link opened on tap.
    pub link: String,
    /// Position inside the content group.
    pub position: [f32; 3],
    /// Panel width in content-group units.
    #[serde(default = "default_panel_width")]
    pub width: f32,
    /// Panel height in content-group units.
    #[serde(default = "default_panel_height")]
    pub height: f32,
}

fn default_panel_width() -> f32 {
    1.5
}

fn default_panel_height() -> f32 {
    0.75
}

/// A tappable in-world panel carrying an external link.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractivePanel {
    /// Text drawn on the panel.
    pub label: String,
    /// External link opened on tap.
    pub link: String,
    /// Placement inside the content group.
    pub transform: Transform,
    /// Width of the quad in local units.
    pub width: f32,
    /// Height of the quad in local units.
    pub height: f32,
}

impl From<&PanelSpec> for InteractivePanel {
    fn from(spec: &PanelSpec) -> Self {
        Self {
            label: spec.label.clone(),
            link: spec.link.clone(),
            transform: Transform::from_translation(Vec3::from_array(spec.position)),
            width: spec.width,
            height: spec.height,
        }
    }
}

impl InteractivePanel {
    /// A default-sized panel translated inside the content group.
    #[must_use]
    pub fn at(label: &str, link: &str, translation: Vec3) -> Self {
        Self {
            label: label.to_owned(),
            link: link.to_owned(),
            transform: Transform::from_translation(translation),
            width: default_panel_width(),
            height: default_panel_height(),
        }
    }

    /// Distance along `ray` to where it crosses this panel, or `None` if it
    /// misses. `parent` is the panel's parent-to-world matrix. Both faces are
    /// hittable.
    #[must_use]
    pub fn intersect(&self, ray: &Ray, parent: Mat4) -> Option<f32> {
        let world = parent * self.transform.matrix();
        let to_local = world.inverse();
        let origin = to_local.transform_point3(ray.origin);
        let direction = to_local.transform_vector3(ray.direction);

        if !origin.is_finite() || !direction.is_finite() || direction.z.abs() < f32::EPSILON {
            return None;
        }
        let t = -origin.z / direction.z;
        if !t.is_finite() || t < 0.0 {
            return None;
        }

        let hit = origin + direction * t;
        if hit.x.abs() > self.width / 2.0 || hit.y.abs() > self.height / 2.0 {
            return None;
        }

        Some(world.transform_point3(hit).distance(ray.origin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panel_at(position: Vec3) -> InteractivePanel {
        InteractivePanel::at("Opsi", "https://example.com", position)
    }

    #[test]
    fn test_viewport_maps_corners_and_center_to_ndc() {
        let viewport = Viewport {
            width: 400.0,
            height: 800.0,
        };

        assert_eq!(viewport.to_ndc(0.0, 0.0), Some(Vec2::new(-1.0, 1.0)));
        assert_eq!(viewport.to_ndc(200.0, 400.0), Some(Vec2::new(0.0, 0.0)));
        assert_eq!(viewport.to_ndc(400.0, 800.0), Some(Vec2::new(1.0, -1.0)));
    }

    #[test]
    fn test_viewport_without_area_has_no_ndc() {
        let collapsed = Viewport {
            width: 0.0,
            height: 0.0,
        };
        let flat = Viewport {
            width: 400.0,
            height: 0.0,
        };

        assert!(!collapsed.has_area());
        assert_eq!(collapsed.to_ndc(0.0, 0.0), None);
        assert_eq!(flat.to_ndc(10.0, 0.0), None);
        assert!((collapsed.aspect() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_ray_with_nan_direction_hits_nothing() {
        let ray = Ray {
            origin: Vec3::ZERO,
            direction: Vec3::NAN,
        };
        let panel = panel_at(Vec3::new(0.0, 0.0, -3.0));

        assert!(panel.intersect(&ray, Mat4::IDENTITY).is_none());
    }

    #[test]
    fn test_center_ray_points_down_negative_z() {
        let camera = Camera::perspective(70.0, 0.5, 0.01, 20.0);

        let ray = camera.ray_through(Vec2::ZERO);

        assert!(ray.origin.abs_diff_eq(Vec3::ZERO, 1e-5));
        assert!(ray.direction.abs_diff_eq(Vec3::NEG_Z, 1e-4));
    }

    #[test]
    fn test_ray_hits_panel_in_front_and_reports_distance() {
        let ray = Ray {
            origin: Vec3::ZERO,
            direction: Vec3::NEG_Z,
        };
        let panel = panel_at(Vec3::new(0.0, 0.0, -3.0));

        let distance = panel.intersect(&ray, Mat4::IDENTITY).unwrap();

        assert!((distance - 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_ray_misses_panel_outside_its_extent_or_behind() {
        let ray = Ray {
            origin: Vec3::ZERO,
            direction: Vec3::NEG_Z,
        };

        assert!(panel_at(Vec3::new(1.0, 0.0, -3.0)).intersect(&ray, Mat4::IDENTITY).is_none());
        assert!(panel_at(Vec3::new(0.0, 0.0, 3.0)).intersect(&ray, Mat4::IDENTITY).is_none());
    }

    #[test]
    fn test_parent_scale_shrinks_hittable_area() {
        let ray = Ray {
            origin: Vec3::new(0.5, 0.0, 0.0),
            direction: Vec3::NEG_Z,
        };
        let panel = panel_at(Vec3::new(0.0, 0.0, -3.0));
        let parent = Mat4::from_scale(Vec3::splat(0.3));

        // Scaled panel is 0.45 wide, centered at x = 0.
        assert!(panel.intersect(&ray, parent).is_none());
        assert!(panel.intersect(&ray, Mat4::IDENTITY).is_some());
    }
}
