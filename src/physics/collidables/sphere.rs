use glam::Vec3;

use super::shape::{check_dimension, ConvexShape, RayHit};
use crate::error::Result;
use crate::physics::rigid_pose::RigidPose;
use crate::utilities::bounding_box::BoundingBox;

/// Collision shape representing a sphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    /// Radius of the sphere.
    pub radius: f32,
}

impl Sphere {
    /// Creates a sphere shape.
    pub fn new(radius: f32) -> Result<Self> {
        check_dimension("Sphere radius", radius)?;
        Ok(Self { radius })
    }
}

/// Intersects a ray with a sphere. `t` is in units of `direction`; the normal points outward.
pub(crate) fn ray_sphere(origin: Vec3, direction: Vec3, center: Vec3, radius: f32, maximum_t: f32) -> Option<RayHit> {
    // Normalize the direction. Sqrts aren't *that* bad, and it both simplifies things
    // and helps avoid numerical problems.
    let inverse_d_length = 1.0 / direction.length();
    let d = direction * inverse_d_length;

    // Move the origin up to the earliest possible impact time.
    let mut o = origin - center;
    let t_offset = (-o.dot(d) - radius).max(0.0);
    o += d * t_offset;
    let b = o.dot(d);
    let c = o.dot(o) - radius * radius;

    if b > 0.0 && c > 0.0 {
        // Ray is outside and pointing away, no hit.
        return None;
    }
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    let local_t = (-b - discriminant.sqrt()).max(-t_offset);
    let hit = o + d * local_t;
    let normal = if radius > 0.0 { hit / radius } else { -d };
    let t = (local_t + t_offset) * inverse_d_length;
    (t <= maximum_t).then_some(RayHit { t, normal })
}

impl ConvexShape for Sphere {
    #[inline(always)]
    fn support(&self, direction: Vec3) -> Vec3 {
        direction.normalize_or_zero() * self.radius
    }

    #[inline(always)]
    fn core_support(&self, _direction: Vec3) -> Vec3 {
        Vec3::ZERO
    }

    #[inline(always)]
    fn margin(&self) -> f32 {
        self.radius
    }

    fn feature(&self, direction: Vec3) -> Vec<Vec3> {
        vec![self.support(direction)]
    }

    #[inline(always)]
    fn compute_bounds(&self, pose: &RigidPose) -> BoundingBox {
        BoundingBox::from_center(pose.position, Vec3::splat(self.radius))
    }

    fn ray_test(&self, pose: &RigidPose, origin: Vec3, direction: Vec3, maximum_t: f32) -> Option<RayHit> {
        ray_sphere(origin, direction, pose.position, self.radius, maximum_t)
    }
}
