//! Depth sampling for auto-focus.

use glam::Vec2;

use crate::camera::Camera;
use crate::picking::SceneQuery;

/// Casts rays from the camera through viewport points and reports hit distances.
///
/// A ray that hits nothing within `max_distance` reports `max_distance`: a miss
/// is a far-away reading, not a failure. The only failure is a missing camera,
/// which yields `None` so the caller leaves its state untouched.
pub struct FocusSampler<'a, Q: SceneQuery + ?Sized> {
    camera: Option<&'a Camera>,
    scene: &'a Q,
    max_distance: f32,
}

impl<'a, Q: SceneQuery + ?Sized> FocusSampler<'a, Q> {
    pub fn new(camera: Option<&'a Camera>, scene: &'a Q, max_distance: f32) -> Self {
        Self {
            camera,
            scene,
            max_distance,
        }
    }

    /// Whether a camera is available to sample through.
    pub fn has_camera(&self) -> bool {
        self.camera.is_some()
    }

    /// Sample scene depth through the normalized viewport point `(x, y)`.
    pub fn sample(&self, x: f32, y: f32) -> Option<f32> {
        let camera = self.camera?;
        let ray = camera.viewport_ray(Vec2::new(x, y));
        Some(
            self.scene
                .cast(&ray, self.max_distance)
                .unwrap_or(self.max_distance),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::picking::{Collider, Transform};
    use glam::Vec3;

    fn wall_at(z: f32) -> hecs::World {
        let mut world = hecs::World::new();
        world.spawn((
            Transform::from_position(Vec3::new(0.0, 0.0, z)),
            Collider::box_collider(Vec3::new(50.0, 50.0, 2.0)),
        ));
        world
    }

    #[test]
    fn hit_reports_distance() {
        let world = wall_at(-11.0);
        let camera = Camera::new();
        let sampler = FocusSampler::new(Some(&camera), &world, 100.0);

        let depth = sampler.sample(0.5, 0.5).unwrap();
        assert!((depth - 10.0).abs() < 1e-3);
    }

    #[test]
    fn miss_reports_max_distance() {
        let world = hecs::World::new();
        let camera = Camera::new();
        let sampler = FocusSampler::new(Some(&camera), &world, 42.0);

        assert_eq!(sampler.sample(0.5, 0.5), Some(42.0));
    }

    #[test]
    fn hit_beyond_range_is_a_miss() {
        let world = wall_at(-81.0);
        let camera = Camera::new();
        let sampler = FocusSampler::new(Some(&camera), &world, 50.0);

        assert_eq!(sampler.sample(0.5, 0.5), Some(50.0));
    }

    #[test]
    fn no_camera_yields_none() {
        let world = wall_at(-11.0);
        let sampler = FocusSampler::new(None, &world, 100.0);

        assert!(!sampler.has_camera());
        assert_eq!(sampler.sample(0.5, 0.5), None);
    }
}
