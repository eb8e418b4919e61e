use glam::Vec3;

use super::shape::{ConvexShape, RayHit};
use crate::error::{CollisionError, Result};
use crate::physics::rigid_pose::RigidPose;

/// Collision shape representing an individual double-sided triangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    /// First vertex of the triangle in local space.
    pub a: Vec3,
    /// Second vertex of the triangle in local space.
    pub b: Vec3,
    /// Third vertex of the triangle in local space.
    pub c: Vec3,
}

impl Triangle {
    /// Creates a triangle shape. Degenerate (zero area) triangles are rejected.
    pub fn new(a: Vec3, b: Vec3, c: Vec3) -> Result<Self> {
        if !(a.is_finite() && b.is_finite() && c.is_finite()) {
            return Err(CollisionError::InvalidShape("Triangle vertices must be finite".into()));
        }
        let triangle = Self { a, b, c };
        if triangle.unnormalized_normal().length_squared() <= f32::MIN_POSITIVE {
            return Err(CollisionError::InvalidShape(format!(
                "Triangle {a}, {b}, {c} has no area"
            )));
        }
        Ok(triangle)
    }

    /// Cross product of the edges; its direction follows the counterclockwise winding a, b, c.
    #[inline(always)]
    pub fn unnormalized_normal(&self) -> Vec3 {
        (self.b - self.a).cross(self.c - self.a)
    }

    #[inline(always)]
    pub fn normal(&self) -> Vec3 {
        self.unnormalized_normal().normalize_or_zero()
    }

    pub fn vertices(&self) -> [Vec3; 3] {
        [self.a, self.b, self.c]
    }

    /// Intersects a ray with the triangle from either side. The normal faces the ray.
    pub fn ray_test_vertices(
        a: Vec3,
        b: Vec3,
        c: Vec3,
        origin: Vec3,
        direction: Vec3,
        maximum_t: f32,
    ) -> Option<RayHit> {
        let ab = b - a;
        let ac = c - a;
        let mut normal = ab.cross(ac);
        let mut dn = -direction.dot(normal);
        if dn == 0.0 {
            return None;
        }
        if dn < 0.0 {
            // Approaching the back side; mirror so the same test applies.
            normal = -normal;
            dn = -dn;
        }
        let ao = origin - a;
        let t = ao.dot(normal);
        if t < 0.0 {
            return None;
        }
        let aoxd = ao.cross(direction);
        // Barycentric weights scaled by dn; their signs follow the winding seen from the ray.
        let (v, w) = if normal.dot(ab.cross(ac)) > 0.0 {
            (ac.dot(aoxd), -ab.dot(aoxd))
        } else {
            (-ac.dot(aoxd), ab.dot(aoxd))
        };
        if v < 0.0 || w < 0.0 || v + w > dn {
            return None;
        }
        let t = t / dn;
        (t <= maximum_t).then(|| RayHit {
            t,
            normal: normal.normalize(),
        })
    }
}

impl ConvexShape for Triangle {
    fn support(&self, direction: Vec3) -> Vec3 {
        let da = self.a.dot(direction);
        let db = self.b.dot(direction);
        let dc = self.c.dot(direction);
        if da >= db && da >= dc {
            self.a
        } else if db >= dc {
            self.b
        } else {
            self.c
        }
    }

    fn feature(&self, direction: Vec3) -> Vec<Vec3> {
        if self.unnormalized_normal().dot(direction) >= 0.0 {
            vec![self.a, self.b, self.c]
        } else {
            vec![self.a, self.c, self.b]
        }
    }

    fn ray_test(&self, pose: &RigidPose, origin: Vec3, direction: Vec3, maximum_t: f32) -> Option<RayHit> {
        Self::ray_test_vertices(
            pose.transform_point(self.a),
            pose.transform_point(self.b),
            pose.transform_point(self.c),
            origin,
            direction,
            maximum_t,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn floor() -> Triangle {
        Triangle::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 4.0), Vec3::new(4.0, 0.0, 0.0)).unwrap()
    }

    #[test]
    fn degenerate_triangles_are_rejected() {
        assert!(Triangle::new(Vec3::ZERO, Vec3::X, Vec3::X * 2.0).is_err());
        assert!(Triangle::new(Vec3::ZERO, Vec3::X, Vec3::splat(f32::NAN)).is_err());
    }

    #[test]
    fn rays_hit_both_sides() {
        let triangle = floor();
        let pose = RigidPose::IDENTITY;
        let above = triangle.ray_test(&pose, Vec3::new(1.0, 3.0, 1.0), -Vec3::Y, 10.0).unwrap();
        assert_relative_eq!(above.t, 3.0);
        assert_relative_eq!(above.normal, Vec3::Y);
        let below = triangle.ray_test(&pose, Vec3::new(1.0, -2.0, 1.0), Vec3::Y * 2.0, 10.0).unwrap();
        assert_relative_eq!(below.t, 1.0);
        assert_relative_eq!(below.normal, -Vec3::Y);
        assert!(triangle.ray_test(&pose, Vec3::new(3.0, 3.0, 3.0), -Vec3::Y, 10.0).is_none());
        assert!(triangle.ray_test(&pose, Vec3::new(1.0, 3.0, 1.0), Vec3::X, 10.0).is_none());
    }

    #[test]
    fn feature_faces_the_direction() {
        let triangle = floor();
        for direction in [Vec3::Y, -Vec3::Y] {
            let face = triangle.feature(direction);
            let normal = (face[1] - face[0]).cross(face[2] - face[0]);
            assert!(normal.dot(direction) > 0.0);
        }
    }
}
