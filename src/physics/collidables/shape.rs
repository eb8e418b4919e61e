use std::fmt::Debug;

use glam::Vec3;

use super::box_shape::BoxShape;
use super::capsule::Capsule;
use super::compound::Composite;
use super::convex_hull::ConvexHull;
use super::height_field::HeightField;
use super::plane::Plane;
use super::sphere::Sphere;
use super::triangle::Triangle;
use crate::error::{CollisionError, Result};
use crate::physics::rigid_pose::RigidPose;
use crate::utilities::bounding_box::BoundingBox;

/// Result of a successful ray test against a shape.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    /// Ray parameter of the hit; the hit point is `origin + direction * t`.
    pub t: f32,
    /// World space surface normal at the hit, pointing out of the shape.
    pub normal: Vec3,
}

/// Defines functions available on all convex shapes.
/// Convex shapes have no hollowed out regions; any line passing through a convex shape
/// will never enter and exit more than once.
///
/// Directions and points are in the shape's local space unless noted otherwise.
pub trait ConvexShape: Debug + Send + Sync {
    /// Farthest point of the shape along `direction`. The direction need not be normalized.
    fn support(&self, direction: Vec3) -> Vec3;

    /// Support of the core shape: the shape shrunk by [`ConvexShape::margin`].
    fn core_support(&self, direction: Vec3) -> Vec3 {
        self.support(direction)
    }

    /// Radius swept around the core shape. Zero for polytopes.
    fn margin(&self) -> f32 {
        0.0
    }

    /// The vertex, edge or face polygon most aligned with `direction`.
    ///
    /// Polygons are returned in a consistent winding around `direction`.
    fn feature(&self, direction: Vec3) -> Vec<Vec3>;

    /// Computes the world space bounding box of the shape at a pose.
    fn compute_bounds(&self, pose: &RigidPose) -> BoundingBox {
        let mut min = Vec3::ZERO;
        let mut max = Vec3::ZERO;
        for axis in 0..3 {
            let mut world_axis = Vec3::ZERO;
            world_axis[axis] = 1.0;
            let local_axis = pose.inverse_transform_vector(world_axis);
            max[axis] = pose.transform_point(self.support(local_axis))[axis];
            min[axis] = pose.transform_point(self.support(-local_axis))[axis];
        }
        BoundingBox::new(min, max)
    }

    /// Tests a world space ray against the shape at the given pose.
    fn ray_test(&self, pose: &RigidPose, origin: Vec3, direction: Vec3, maximum_t: f32) -> Option<RayHit>;
}

/// Discriminant of a [`Shape`], used to index the collision algorithm matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShapeType {
    Sphere = 0,
    Box = 1,
    Capsule = 2,
    ConvexHull = 3,
    Triangle = 4,
    Plane = 5,
    HeightField = 6,
    Composite = 7,
}

impl ShapeType {
    /// Number of shape types.
    pub const COUNT: usize = 8;

    pub const ALL: [ShapeType; Self::COUNT] = [
        ShapeType::Sphere,
        ShapeType::Box,
        ShapeType::Capsule,
        ShapeType::ConvexHull,
        ShapeType::Triangle,
        ShapeType::Plane,
        ShapeType::HeightField,
        ShapeType::Composite,
    ];

    #[inline(always)]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Whether shapes of this type expose a support mapping.
    pub fn is_convex(self) -> bool {
        matches!(
            self,
            ShapeType::Sphere | ShapeType::Box | ShapeType::Capsule | ShapeType::ConvexHull | ShapeType::Triangle
        )
    }
}

/// A collision shape.
#[derive(Clone, Debug)]
pub enum Shape {
    Sphere(Sphere),
    Box(BoxShape),
    Capsule(Capsule),
    ConvexHull(ConvexHull),
    Triangle(Triangle),
    Plane(Plane),
    HeightField(HeightField),
    Composite(Composite),
}

impl Shape {
    pub fn sphere(radius: f32) -> Result<Self> {
        Ok(Shape::Sphere(Sphere::new(radius)?))
    }

    pub fn cuboid(half_extents: Vec3) -> Result<Self> {
        Ok(Shape::Box(BoxShape::new(half_extents)?))
    }

    pub fn capsule(radius: f32, half_length: f32) -> Result<Self> {
        Ok(Shape::Capsule(Capsule::new(radius, half_length)?))
    }

    pub fn convex_hull(points: &[Vec3]) -> Result<Self> {
        Ok(Shape::ConvexHull(ConvexHull::new(points)?))
    }

    pub fn triangle(a: Vec3, b: Vec3, c: Vec3) -> Result<Self> {
        Ok(Shape::Triangle(Triangle::new(a, b, c)?))
    }

    pub fn plane(normal: Vec3, distance: f32) -> Result<Self> {
        Ok(Shape::Plane(Plane::new(normal, distance)?))
    }

    pub fn shape_type(&self) -> ShapeType {
        match self {
            Shape::Sphere(_) => ShapeType::Sphere,
            Shape::Box(_) => ShapeType::Box,
            Shape::Capsule(_) => ShapeType::Capsule,
            Shape::ConvexHull(_) => ShapeType::ConvexHull,
            Shape::Triangle(_) => ShapeType::Triangle,
            Shape::Plane(_) => ShapeType::Plane,
            Shape::HeightField(_) => ShapeType::HeightField,
            Shape::Composite(_) => ShapeType::Composite,
        }
    }

    /// The support mapping of the shape, if it is convex.
    pub fn as_convex(&self) -> Option<&dyn ConvexShape> {
        match self {
            Shape::Sphere(s) => Some(s),
            Shape::Box(s) => Some(s),
            Shape::Capsule(s) => Some(s),
            Shape::ConvexHull(s) => Some(s),
            Shape::Triangle(s) => Some(s),
            Shape::Plane(_) | Shape::HeightField(_) | Shape::Composite(_) => None,
        }
    }

    /// Like [`Shape::as_convex`], but reports non-convex shapes as an error.
    pub fn expect_convex(&self) -> Result<&dyn ConvexShape> {
        self.as_convex().ok_or_else(|| {
            CollisionError::InvalidShape(format!("{:?} shapes have no support mapping", self.shape_type()))
        })
    }

    /// Computes the world space bounding box of the shape at a pose.
    pub fn compute_bounds(&self, pose: &RigidPose) -> BoundingBox {
        match self {
            Shape::Plane(plane) => plane.compute_bounds(pose),
            Shape::HeightField(height_field) => height_field.compute_bounds(pose),
            Shape::Composite(composite) => composite.compute_bounds(pose),
            _ => match self.as_convex() {
                Some(convex) => convex.compute_bounds(pose),
                None => BoundingBox::empty(),
            },
        }
    }

    /// Tests a world space ray against the shape. Hits are reported for `t` in `[0, maximum_t]`.
    pub fn ray_test(&self, pose: &RigidPose, origin: Vec3, direction: Vec3, maximum_t: f32) -> Option<RayHit> {
        if direction.length_squared() == 0.0 {
            return None;
        }
        match self {
            Shape::Plane(plane) => plane.ray_test(pose, origin, direction, maximum_t),
            Shape::HeightField(height_field) => height_field.ray_test(pose, origin, direction, maximum_t),
            Shape::Composite(composite) => composite.ray_test(pose, origin, direction, maximum_t),
            _ => self
                .as_convex()
                .and_then(|convex| convex.ray_test(pose, origin, direction, maximum_t)),
        }
    }
}

impl From<Sphere> for Shape {
    fn from(shape: Sphere) -> Self {
        Shape::Sphere(shape)
    }
}

impl From<BoxShape> for Shape {
    fn from(shape: BoxShape) -> Self {
        Shape::Box(shape)
    }
}

impl From<Capsule> for Shape {
    fn from(shape: Capsule) -> Self {
        Shape::Capsule(shape)
    }
}

impl From<ConvexHull> for Shape {
    fn from(shape: ConvexHull) -> Self {
        Shape::ConvexHull(shape)
    }
}

impl From<Triangle> for Shape {
    fn from(shape: Triangle) -> Self {
        Shape::Triangle(shape)
    }
}

impl From<Plane> for Shape {
    fn from(shape: Plane) -> Self {
        Shape::Plane(shape)
    }
}

impl From<HeightField> for Shape {
    fn from(shape: HeightField) -> Self {
        Shape::HeightField(shape)
    }
}

impl From<Composite> for Shape {
    fn from(shape: Composite) -> Self {
        Shape::Composite(shape)
    }
}

/// Rejects non-finite or negative shape dimensions.
pub(crate) fn check_dimension(name: &str, value: f32) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(CollisionError::InvalidShape(format!("{name} must be finite and non-negative, got {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Quat;

    #[test]
    fn invalid_dimensions_are_rejected() {
        assert!(Shape::sphere(-1.0).is_err());
        assert!(Shape::sphere(f32::NAN).is_err());
        assert!(Shape::capsule(0.5, f32::INFINITY).is_err());
        assert!(Shape::cuboid(Vec3::new(1.0, -1.0, 1.0)).is_err());
        assert!(Shape::sphere(0.0).is_ok());
    }

    #[test]
    fn support_based_bounds_follow_rotation() {
        let shape = Shape::cuboid(Vec3::new(2.0, 1.0, 0.5)).unwrap();
        let pose = RigidPose::new(Vec3::new(1.0, 2.0, 3.0), Quat::from_rotation_z(std::f32::consts::FRAC_PI_2));
        let bounds = shape.compute_bounds(&pose);
        assert_relative_eq!(bounds.min, Vec3::new(0.0, 0.0, 2.5), epsilon = 1e-5);
        assert_relative_eq!(bounds.max, Vec3::new(2.0, 4.0, 3.5), epsilon = 1e-5);
    }

    #[test]
    fn convexity_by_type() {
        assert!(Shape::sphere(1.0).unwrap().as_convex().is_some());
        assert!(Shape::plane(Vec3::Y, 0.0).unwrap().as_convex().is_none());
        assert!(Shape::plane(Vec3::Y, 0.0).unwrap().expect_convex().is_err());
        for shape_type in ShapeType::ALL {
            assert_eq!(ShapeType::ALL[shape_type.index()], shape_type);
        }
    }
}
