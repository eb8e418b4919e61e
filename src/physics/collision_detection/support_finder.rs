use glam::Vec3;

use crate::physics::collidables::ConvexShape;
use crate::physics::rigid_pose::RigidPose;

/// A convex shape placed in world space.
#[derive(Clone, Copy, Debug)]
pub struct PosedConvex<'a> {
    pub shape: &'a dyn ConvexShape,
    pub pose: &'a RigidPose,
}

impl<'a> PosedConvex<'a> {
    pub fn new(shape: &'a dyn ConvexShape, pose: &'a RigidPose) -> Self {
        Self { shape, pose }
    }

    /// World space support point along a world space direction.
    #[inline(always)]
    pub fn support(&self, direction: Vec3) -> Vec3 {
        let local = self.pose.inverse_transform_vector(direction);
        self.pose.transform_point(self.shape.support(local))
    }

    /// World space support point of the core shape.
    #[inline(always)]
    pub fn core_support(&self, direction: Vec3) -> Vec3 {
        let local = self.pose.inverse_transform_vector(direction);
        self.pose.transform_point(self.shape.core_support(local))
    }

    #[inline(always)]
    pub fn margin(&self) -> f32 {
        self.shape.margin()
    }

    /// World space feature polygon most aligned with a world space direction.
    pub fn feature(&self, direction: Vec3) -> Vec<Vec3> {
        let local = self.pose.inverse_transform_vector(direction);
        self.shape
            .feature(local)
            .into_iter()
            .map(|p| self.pose.transform_point(p))
            .collect()
    }

    /// Core feature: the feature pulled in by the margin along the direction.
    pub fn core_feature(&self, direction: Vec3) -> Vec<Vec3> {
        let offset = direction.normalize_or_zero() * self.margin();
        self.feature(direction).into_iter().map(|p| p - offset).collect()
    }
}

/// A vertex of the Minkowski difference together with the points of A and B it came from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SupportPoint {
    /// `on_a - on_b`.
    pub point: Vec3,
    pub on_a: Vec3,
    pub on_b: Vec3,
}

/// Support mapping of `A - B` for two posed convex shapes.
#[derive(Clone, Copy, Debug)]
pub struct MinkowskiDifference<'a> {
    pub a: PosedConvex<'a>,
    pub b: PosedConvex<'a>,
    /// Whether the core shapes are used instead of the full shapes.
    pub core: bool,
}

impl<'a> MinkowskiDifference<'a> {
    /// The difference of the full shapes.
    pub fn new(a: PosedConvex<'a>, b: PosedConvex<'a>) -> Self {
        Self { a, b, core: false }
    }

    /// The difference of the core shapes. Add `a.margin() + b.margin()` to distances measured on it.
    pub fn of_cores(a: PosedConvex<'a>, b: PosedConvex<'a>) -> Self {
        Self { a, b, core: true }
    }

    #[inline(always)]
    pub fn support(&self, direction: Vec3) -> SupportPoint {
        let (on_a, on_b) = if self.core {
            (self.a.core_support(direction), self.b.core_support(-direction))
        } else {
            (self.a.support(direction), self.b.support(-direction))
        };
        SupportPoint {
            point: on_a - on_b,
            on_a,
            on_b,
        }
    }

    /// A point inside the difference, used to seed searches.
    #[inline(always)]
    pub fn center(&self) -> Vec3 {
        self.a.pose.position - self.b.pose.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::collidables::box_shape::BoxShape;
    use crate::physics::collidables::capsule::Capsule;
    use approx::assert_relative_eq;
    use glam::Quat;

    #[test]
    fn support_in_world_space() {
        let cube = BoxShape::new(Vec3::ONE).unwrap();
        let pose = RigidPose::new(Vec3::X * 10.0, Quat::from_rotation_z(std::f32::consts::FRAC_PI_4));
        let posed = PosedConvex::new(&cube, &pose);
        let support = posed.support(Vec3::Y);
        assert_relative_eq!(support.y, 2.0_f32.sqrt(), epsilon = 1e-5);
        assert_relative_eq!(support.x, 10.0, epsilon = 1e-5);
    }

    #[test]
    fn difference_of_cores() {
        let capsule = Capsule::new(0.5, 1.0).unwrap();
        let cube = BoxShape::new(Vec3::ONE).unwrap();
        let (pose_a, pose_b) = (RigidPose::IDENTITY, RigidPose::from_position(Vec3::X * 3.0));
        let a = PosedConvex::new(&capsule, &pose_a);
        let b = PosedConvex::new(&cube, &pose_b);
        let full = MinkowskiDifference::new(a, b).support(Vec3::X);
        assert_relative_eq!(full.point.x, 0.5 - 2.0, epsilon = 1e-5);
        let core = MinkowskiDifference::of_cores(a, b).support(Vec3::X);
        assert_relative_eq!(core.point.x, -2.0, epsilon = 1e-5);
        assert_eq!(core.point, core.on_a - core.on_b);
    }
}
