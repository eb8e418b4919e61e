use glam::Vec3;

use super::shape::{check_dimension, ConvexShape, RayHit};
use super::sphere::ray_sphere;
use crate::error::Result;
use crate::physics::rigid_pose::RigidPose;

/// Collision shape representing a sphere-expanded line segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Capsule {
    /// Spherical expansion applied to the internal line segment.
    pub radius: f32,
    /// Half of the length of the internal line segment. Oriented along the local Y axis.
    pub half_length: f32,
}

impl Capsule {
    /// Creates a capsule shape.
    pub fn new(radius: f32, half_length: f32) -> Result<Self> {
        check_dimension("Capsule radius", radius)?;
        check_dimension("Capsule half length", half_length)?;
        Ok(Self { radius, half_length })
    }

    /// Gets the length of the capsule's internal line segment.
    #[inline(always)]
    pub fn length(&self) -> f32 {
        self.half_length * 2.0
    }

    /// Endpoints of the internal segment in world space.
    pub fn segment(&self, pose: &RigidPose) -> (Vec3, Vec3) {
        let axis = pose.transform_vector(Vec3::Y * self.half_length);
        (pose.position - axis, pose.position + axis)
    }
}

impl ConvexShape for Capsule {
    #[inline(always)]
    fn support(&self, direction: Vec3) -> Vec3 {
        self.core_support(direction) + direction.normalize_or_zero() * self.radius
    }

    #[inline(always)]
    fn core_support(&self, direction: Vec3) -> Vec3 {
        Vec3::new(0.0, if direction.y < 0.0 { -self.half_length } else { self.half_length }, 0.0)
    }

    #[inline(always)]
    fn margin(&self) -> f32 {
        self.radius
    }

    fn feature(&self, direction: Vec3) -> Vec<Vec3> {
        let n = direction.normalize_or_zero();
        // Directions nearly perpendicular to the axis see the whole side line.
        if n.y.abs() < 0.05 && self.half_length > 0.0 {
            let side = Vec3::new(n.x, 0.0, n.z).normalize_or_zero() * self.radius;
            vec![
                Vec3::new(0.0, -self.half_length, 0.0) + side,
                Vec3::new(0.0, self.half_length, 0.0) + side,
            ]
        } else {
            vec![self.support(direction)]
        }
    }

    fn ray_test(&self, pose: &RigidPose, origin: Vec3, direction: Vec3, maximum_t: f32) -> Option<RayHit> {
        // Work in local space.
        let o = pose.inverse_transform_point(origin);
        let d = pose.inverse_transform_vector(direction);

        let mut best: Option<RayHit> = None;
        let mut consider = |hit: Option<RayHit>| {
            if let Some(hit) = hit {
                if best.map_or(true, |b| hit.t < b.t) {
                    best = Some(hit);
                }
            }
        };

        // Infinite cylinder around the axis, restricted to the segment span.
        let oh = Vec3::new(o.x, 0.0, o.z);
        let dh = Vec3::new(d.x, 0.0, d.z);
        let a = dh.dot(dh);
        let b = oh.dot(dh);
        let c = oh.dot(oh) - self.radius * self.radius;
        if a > 1e-12 {
            let discriminant = b * b - a * c;
            if discriminant >= 0.0 {
                let t = ((-b - discriminant.sqrt()) / a).max(0.0);
                let hit = o + d * t;
                let inside = c <= 0.0;
                if hit.y.abs() <= self.half_length && t <= maximum_t && (inside || b < 0.0) {
                    let normal = if inside {
                        -d.normalize()
                    } else {
                        Vec3::new(hit.x, 0.0, hit.z) / self.radius.max(f32::MIN_POSITIVE)
                    };
                    consider(Some(RayHit { t, normal }));
                }
            }
        }
        // End caps.
        for y in [-self.half_length, self.half_length] {
            consider(ray_sphere(o, d, Vec3::new(0.0, y, 0.0), self.radius, maximum_t));
        }

        best.map(|hit| RayHit {
            t: hit.t,
            normal: pose.transform_vector(hit.normal),
        })
    }
}
