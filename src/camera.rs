use glam::{Mat4, Vec2, Vec3};

use crate::picking::Ray;

/// A perspective camera as seen by the post-processing stack.
///
/// Provides position, orientation, field of view and clip planes.
/// Focus sampling casts rays through it and the depth-of-field pass uses
/// its depth range to normalize the focal distance.
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub position: Vec3,
    pub forward: Vec3,
    pub up: Vec3,
    pub fov: f32, // radians, vertical
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            forward: Vec3::NEG_Z,
            up: Vec3::Y,
            fov: 60.0_f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(mut self, x: f32, y: f32, z: f32) -> Self {
        self.position = Vec3::new(x, y, z);
        self
    }

    pub fn looking_at(mut self, target: Vec3) -> Self {
        self.forward = (target - self.position).normalize_or_zero();
        self
    }

    pub fn with_aspect(mut self, aspect: f32) -> Self {
        self.aspect = aspect;
        self
    }

    pub fn with_clip(mut self, near: f32, far: f32) -> Self {
        self.near = near;
        self.far = far;
        self
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.forward, self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
    }

    /// Builds a ray from the camera through a normalized viewport point.
    ///
    /// `(0, 0)` is the bottom-left corner of the viewport and `(1, 1)` the
    /// top-right. The ray starts at the camera position so hit distances are
    /// measured from the eye.
    pub fn viewport_ray(&self, viewport: Vec2) -> Ray {
        let ndc_x = viewport.x * 2.0 - 1.0;
        let ndc_y = viewport.y * 2.0 - 1.0;

        let inv_view_proj = (self.projection_matrix() * self.view_matrix()).inverse();
        let far_clip = inv_view_proj * glam::Vec4::new(ndc_x, ndc_y, 1.0, 1.0);
        let far_point = far_clip.truncate() / far_clip.w;

        Ray::new(self.position, far_point - self.position)
    }

    /// Distance of a world point along the view direction.
    pub fn view_depth(&self, point: Vec3) -> f32 {
        (point - self.position).dot(self.forward.normalize_or_zero())
    }

    /// Maps a world-space focal distance into the camera's `[near, far]` range.
    ///
    /// The focal point is placed `distance - near` units in front of the camera
    /// and its view depth is divided by the depth range, giving `0` at the near
    /// plane's offset and `1` at the far plane.
    pub fn focal_distance01(&self, distance: f32) -> f32 {
        let range = self.far - self.near;
        if range <= f32::EPSILON {
            return 0.0;
        }
        let point = self.position + self.forward.normalize_or_zero() * (distance - self.near);
        self.view_depth(point) / range
    }
}
