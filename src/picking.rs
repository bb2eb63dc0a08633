//! Ray casting against simple collision shapes.
//!
//! Focus sampling needs "how far away is the first opaque thing along this
//! ray", nothing more. This module provides:
//!
//! - [`Ray`]: A 3D ray with origin and direction
//! - [`Collider`]: Collision shapes (box, sphere) attached to entities
//! - [`RayHit`]: Information about a ray-collider intersection
//! - [`SceneQuery`]: The read-only scene interface the focus sampler casts against
//!
//! A [`hecs::World`] whose entities carry a [`Transform`] and a [`Collider`]
//! implements [`SceneQuery`] out of the box.
//!
//! # Example
//!
//! ```
//! use visorfx::{Collider, Ray, SceneQuery, Transform, Vec3};
//!
//! let mut world = hecs::World::new();
//! world.spawn((
//!     Transform::from_position(Vec3::new(0.0, 0.0, -10.0)),
//!     Collider::box_collider(Vec3::splat(2.0)),
//! ));
//!
//! let ray = Ray::new(Vec3::ZERO, Vec3::NEG_Z);
//! assert_eq!(world.cast(&ray, 100.0), Some(9.0));
//! ```

use glam::Vec3;

/// A ray in 3D space.
///
/// A ray has an origin point and a normalized direction. It represents
/// an infinite line starting at the origin and extending in the direction.
#[derive(Clone, Copy, Debug)]
pub struct Ray {
    /// The starting point of the ray.
    pub origin: Vec3,
    /// The normalized direction of the ray.
    pub direction: Vec3,
}

impl Ray {
    /// Create a new ray with the given origin and direction.
    ///
    /// The direction will be normalized automatically.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    /// Get a point along the ray at the given distance from the origin.
    #[inline]
    pub fn point_at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Test intersection with an axis-aligned bounding box (AABB).
    ///
    /// Returns the distance along the ray to the intersection point, or `None`
    /// if the ray doesn't intersect the box.
    pub fn intersect_aabb(&self, min: Vec3, max: Vec3) -> Option<f32> {
        let mut t_min = f32::NEG_INFINITY;
        let mut t_max = f32::INFINITY;

        for i in 0..3 {
            let origin = self.origin[i];
            let dir = self.direction[i];
            let box_min = min[i];
            let box_max = max[i];

            if dir.abs() < f32::EPSILON {
                // Ray is parallel to this axis
                if origin < box_min || origin > box_max {
                    return None;
                }
            } else {
                let inv_dir = 1.0 / dir;
                let mut t1 = (box_min - origin) * inv_dir;
                let mut t2 = (box_max - origin) * inv_dir;

                if t1 > t2 {
                    std::mem::swap(&mut t1, &mut t2);
                }

                t_min = t_min.max(t1);
                t_max = t_max.min(t2);

                if t_min > t_max {
                    return None;
                }
            }
        }

        // Nearest positive intersection; an origin inside the box hits the far side
        if t_min > 0.0 {
            Some(t_min)
        } else if t_max > 0.0 {
            Some(t_max)
        } else {
            None
        }
    }

    /// Test intersection with a sphere.
    ///
    /// Returns the distance along the ray to the intersection point, or `None`
    /// if the ray doesn't intersect the sphere.
    pub fn intersect_sphere(&self, center: Vec3, radius: f32) -> Option<f32> {
        let oc = self.origin - center;
        let a = self.direction.dot(self.direction);
        if a <= f32::EPSILON {
            return None;
        }
        let b = 2.0 * oc.dot(self.direction);
        let c = oc.dot(oc) - radius * radius;
        let discriminant = b * b - 4.0 * a * c;

        if discriminant < 0.0 {
            return None;
        }

        let sqrt_disc = discriminant.sqrt();
        let t1 = (-b - sqrt_disc) / (2.0 * a);
        let t2 = (-b + sqrt_disc) / (2.0 * a);

        if t1 > 0.0 {
            Some(t1)
        } else if t2 > 0.0 {
            Some(t2)
        } else {
            None
        }
    }
}

/// World placement of a collider: position and per-axis scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    /// World-space position (translation).
    pub position: Vec3,
    /// Scale factors for each axis.
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Creates an identity transform (origin, unit scale).
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transform positioned at the given location.
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Sets the scale component.
    pub fn scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }
}

/// A collision shape for ray casting.
///
/// Colliders are simple geometric shapes. They're much faster to test than
/// full mesh geometry and precise enough to pick a focus distance.
#[derive(Clone, Copy, Debug)]
pub enum Collider {
    /// Axis-aligned bounding box defined by half-extents.
    /// A box with half_extents (1, 1, 1) spans from (-1, -1, -1) to (1, 1, 1).
    Box {
        /// Half the size of the box on each axis.
        half_extents: Vec3,
    },
    /// Sphere defined by radius.
    Sphere {
        /// Radius of the sphere.
        radius: f32,
    },
}

impl Collider {
    /// Create a box collider from full dimensions.
    pub fn box_collider(size: Vec3) -> Self {
        Self::Box {
            half_extents: size * 0.5,
        }
    }

    /// Create a sphere collider.
    pub fn sphere(radius: f32) -> Self {
        Self::Sphere { radius }
    }

    /// Test if a ray intersects this collider at the given transform.
    ///
    /// Returns the distance along the ray to the hit point, or `None` if no hit.
    pub fn intersect(&self, ray: &Ray, transform: &Transform) -> Option<f32> {
        match self {
            Collider::Box { half_extents } => {
                let scaled_half = *half_extents * transform.scale;
                let min = transform.position - scaled_half;
                let max = transform.position + scaled_half;
                ray.intersect_aabb(min, max)
            }
            Collider::Sphere { radius } => {
                // Use the average scale for sphere radius
                let avg_scale = (transform.scale.x + transform.scale.y + transform.scale.z) / 3.0;
                ray.intersect_sphere(transform.position, radius * avg_scale)
            }
        }
    }
}

impl Default for Collider {
    fn default() -> Self {
        Self::box_collider(Vec3::ONE)
    }
}

/// Information about a ray-collider intersection.
#[derive(Clone, Copy, Debug)]
pub struct RayHit {
    /// The entity that was hit.
    pub entity: hecs::Entity,
    /// Distance from ray origin to the hit point.
    pub distance: f32,
    /// World-space position of the hit point.
    pub point: Vec3,
}

/// Cast a ray against all entities with colliders and return hits within `max_distance`.
///
/// Hits are sorted by distance (closest first).
pub fn raycast_all(world: &hecs::World, ray: &Ray, max_distance: f32) -> Vec<RayHit> {
    let mut hits = Vec::new();

    for (entity, (transform, collider)) in world.query::<(&Transform, &Collider)>().iter() {
        if let Some(distance) = collider.intersect(ray, transform) {
            if distance <= max_distance {
                hits.push(RayHit {
                    entity,
                    distance,
                    point: ray.point_at(distance),
                });
            }
        }
    }

    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    hits
}

/// Cast a ray and return the closest hit within `max_distance`.
pub fn raycast(world: &hecs::World, ray: &Ray, max_distance: f32) -> Option<RayHit> {
    world
        .query::<(&Transform, &Collider)>()
        .iter()
        .filter_map(|(entity, (transform, collider))| {
            collider
                .intersect(ray, transform)
                .filter(|distance| *distance <= max_distance)
                .map(|distance| (entity, distance))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(entity, distance)| RayHit {
            entity,
            distance,
            point: ray.point_at(distance),
        })
}

/// Read-only scene interface used for focus sampling.
pub trait SceneQuery {
    /// Distance to the first opaque surface along `ray`, if one lies within `max_distance`.
    fn cast(&self, ray: &Ray, max_distance: f32) -> Option<f32>;
}

impl SceneQuery for hecs::World {
    fn cast(&self, ray: &Ray, max_distance: f32) -> Option<f32> {
        raycast(self, ray, max_distance).map(|hit| hit.distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aabb_hit_from_outside() {
        let ray = Ray::new(Vec3::ZERO, Vec3::NEG_Z);
        let t = ray.intersect_aabb(Vec3::new(-1.0, -1.0, -6.0), Vec3::new(1.0, 1.0, -4.0));
        assert_eq!(t, Some(4.0));
    }

    #[test]
    fn sphere_miss() {
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        assert_eq!(ray.intersect_sphere(Vec3::new(0.0, 5.0, 0.0), 1.0), None);
    }

    #[test]
    fn world_cast_returns_closest_within_range() {
        let mut world = hecs::World::new();
        world.spawn((
            Transform::from_position(Vec3::new(0.0, 0.0, -20.0)),
            Collider::sphere(1.0),
        ));
        world.spawn((
            Transform::from_position(Vec3::new(0.0, 0.0, -8.0)),
            Collider::box_collider(Vec3::splat(2.0)),
        ));

        let ray = Ray::new(Vec3::ZERO, Vec3::NEG_Z);
        assert_eq!(world.cast(&ray, 100.0), Some(7.0));
        assert_eq!(world.cast(&ray, 5.0), None);
    }

    #[test]
    fn raycast_picks_nearest_regardless_of_spawn_order() {
        let mut world = hecs::World::new();
        for z in [-30.0, -6.0, -15.0] {
            world.spawn((
                Transform::from_position(Vec3::new(0.0, 0.0, z)),
                Collider::sphere(1.0),
            ));
        }
        let near = world.spawn((
            Transform::from_position(Vec3::new(0.0, 0.0, -4.0)),
            Collider::sphere(0.5),
        ));

        let ray = Ray::new(Vec3::ZERO, Vec3::NEG_Z);
        let hit = raycast(&world, &ray, 100.0).unwrap();
        assert_eq!(hit.entity, near);
        assert_eq!(hit.distance, 3.5);
        assert_eq!(hit.point, Vec3::new(0.0, 0.0, -3.5));
        assert_eq!(raycast_all(&world, &ray, 100.0)[0].entity, near);
    }

    #[test]
    fn scaled_box_grows() {
        let ray = Ray::new(Vec3::ZERO, Vec3::NEG_Z);
        let transform = Transform::from_position(Vec3::new(0.0, 0.0, -10.0)).scale(Vec3::splat(4.0));
        let hit = Collider::box_collider(Vec3::ONE).intersect(&ray, &transform);
        assert_eq!(hit, Some(8.0));
    }
}
