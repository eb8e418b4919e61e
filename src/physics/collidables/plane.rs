use glam::Vec3;

use super::shape::RayHit;
use crate::error::{CollisionError, Result};
use crate::physics::rigid_pose::RigidPose;
use crate::utilities::bounding_box::BoundingBox;

/// Extent used for the unbounded directions of a plane's bounding box.
pub const PLANE_EXTENT: f32 = 1e15;

/// An infinite half space. Points with `normal · x <= distance` (in local space) are inside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Unit normal pointing out of the solid side.
    pub normal: Vec3,
    /// Distance of the surface from the local origin along the normal.
    pub distance: f32,
}

impl Plane {
    /// Creates a plane. The normal is normalized; zero or non-finite normals are rejected.
    pub fn new(normal: Vec3, distance: f32) -> Result<Self> {
        let length = normal.length();
        if !length.is_finite() || length == 0.0 || !distance.is_finite() {
            return Err(CollisionError::InvalidShape(format!(
                "Plane needs a finite nonzero normal and finite distance, got {normal} / {distance}"
            )));
        }
        Ok(Self {
            normal: normal / length,
            distance: distance / length,
        })
    }

    /// Creates a plane through a point.
    pub fn from_point(normal: Vec3, point: Vec3) -> Result<Self> {
        let unit = normal.normalize_or_zero();
        Self::new(unit, unit.dot(point))
    }

    /// The plane's world space normal and distance.
    pub fn world_plane(&self, pose: &RigidPose) -> (Vec3, f32) {
        let normal = pose.transform_vector(self.normal);
        (normal, self.distance + normal.dot(pose.position))
    }

    /// Signed distance of a world space point from the surface; negative inside.
    pub fn signed_distance(&self, pose: &RigidPose, point: Vec3) -> f32 {
        let (normal, distance) = self.world_plane(pose);
        normal.dot(point) - distance
    }

    /// Bounds are unbounded except along a world axis that the normal is aligned with.
    pub fn compute_bounds(&self, pose: &RigidPose) -> BoundingBox {
        let (normal, distance) = self.world_plane(pose);
        let mut min = Vec3::splat(-PLANE_EXTENT);
        let mut max = Vec3::splat(PLANE_EXTENT);
        for axis in 0..3 {
            if normal[axis] == 1.0 {
                max[axis] = distance;
            } else if normal[axis] == -1.0 {
                min[axis] = -distance;
            }
        }
        BoundingBox::new(min, max)
    }

    pub fn ray_test(&self, pose: &RigidPose, origin: Vec3, direction: Vec3, maximum_t: f32) -> Option<RayHit> {
        let (normal, distance) = self.world_plane(pose);
        let height = normal.dot(origin) - distance;
        if height <= 0.0 {
            // Starting inside the solid.
            return Some(RayHit { t: 0.0, normal });
        }
        let approach = normal.dot(direction);
        if approach >= 0.0 {
            return None;
        }
        let t = -height / approach;
        (t <= maximum_t).then_some(RayHit { t, normal })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Quat;

    #[test]
    fn rejects_degenerate_normals() {
        assert!(Plane::new(Vec3::ZERO, 1.0).is_err());
        assert!(Plane::new(Vec3::Y, f32::NAN).is_err());
        let plane = Plane::new(Vec3::Y * 2.0, 4.0).unwrap();
        assert_eq!((plane.normal, plane.distance), (Vec3::Y, 2.0));
    }

    #[test]
    fn axis_aligned_bounds_are_clamped() {
        let plane = Plane::new(Vec3::Y, 1.0).unwrap();
        let bounds = plane.compute_bounds(&RigidPose::from_position(Vec3::new(0.0, 2.0, 0.0)));
        assert_eq!(bounds.max.y, 3.0);
        assert_eq!(bounds.min.y, -PLANE_EXTENT);
        assert_eq!(bounds.max.x, PLANE_EXTENT);
        let flipped = Plane::new(-Vec3::X, 0.0).unwrap().compute_bounds(&RigidPose::IDENTITY);
        assert_eq!(flipped.min.x, 0.0);
    }

    #[test]
    fn ray_and_distance() {
        let plane = Plane::new(Vec3::Y, 0.0).unwrap();
        let pose = RigidPose::new(Vec3::ZERO, Quat::from_rotation_z(std::f32::consts::FRAC_PI_2));
        // Rotated so the outward normal is -X.
        assert_relative_eq!(plane.signed_distance(&pose, Vec3::new(-3.0, 0.0, 0.0)), 3.0, epsilon = 1e-5);
        let hit = plane.ray_test(&pose, Vec3::new(-3.0, 1.0, 0.0), Vec3::X, 10.0).unwrap();
        assert_relative_eq!(hit.t, 3.0, epsilon = 1e-5);
        assert!(plane.ray_test(&pose, Vec3::new(-3.0, 1.0, 0.0), -Vec3::X, 10.0).is_none());
        assert_eq!(plane.ray_test(&pose, Vec3::new(3.0, 0.0, 0.0), -Vec3::X, 10.0).unwrap().t, 0.0);
    }
}
