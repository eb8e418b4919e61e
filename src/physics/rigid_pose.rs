use std::fmt;

use glam::{Quat, Vec3};

/// Position and orientation of a collision object or a child shape.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RigidPose {
    /// Orientation of the pose.
    pub orientation: Quat,
    /// Position of the pose.
    pub position: Vec3,
}

impl Default for RigidPose {
    #[inline(always)]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl RigidPose {
    /// Returns a pose with a position at (0,0,0) and identity orientation.
    pub const IDENTITY: Self = Self {
        orientation: Quat::IDENTITY,
        position: Vec3::ZERO,
    };

    /// Creates a rigid pose with the given position and orientation.
    #[inline(always)]
    pub fn new(position: Vec3, orientation: Quat) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// Creates a rigid pose with the given position and identity orientation.
    #[inline(always)]
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            orientation: Quat::IDENTITY,
        }
    }

    /// Transforms a local point to world space.
    #[inline(always)]
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.orientation * point + self.position
    }

    /// Rotates a local direction to world space.
    #[inline(always)]
    pub fn transform_vector(&self, vector: Vec3) -> Vec3 {
        self.orientation * vector
    }

    /// Transforms a world point into the local space of the pose.
    #[inline(always)]
    pub fn inverse_transform_point(&self, point: Vec3) -> Vec3 {
        self.orientation.conjugate() * (point - self.position)
    }

    /// Rotates a world direction into the local space of the pose.
    #[inline(always)]
    pub fn inverse_transform_vector(&self, vector: Vec3) -> Vec3 {
        self.orientation.conjugate() * vector
    }

    /// Inverts the rigid transformation of the pose.
    #[inline(always)]
    pub fn inverse(&self) -> Self {
        let orientation = self.orientation.conjugate();
        Self {
            orientation,
            position: orientation * -self.position,
        }
    }

    /// Concatenates two poses. The result applies `local` first and then `self`,
    /// which is how a child pose inside a composite is brought into world space.
    #[inline(always)]
    pub fn multiply(&self, local: &RigidPose) -> Self {
        Self {
            orientation: (self.orientation * local.orientation).normalize(),
            position: self.transform_point(local.position),
        }
    }

    /// Pose of `other` expressed in the local space of `self`.
    #[inline(always)]
    pub fn relative(&self, other: &RigidPose) -> Self {
        self.inverse().multiply(other)
    }

    /// Whether position and orientation contain only finite values.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.orientation.is_finite()
    }
}

impl From<Vec3> for RigidPose {
    fn from(position: Vec3) -> Self {
        Self::from_position(position)
    }
}

impl From<(Vec3, Quat)> for RigidPose {
    fn from((position, orientation): (Vec3, Quat)) -> Self {
        Self::new(position, orientation)
    }
}

impl fmt::Display for RigidPose {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}, {}", self.position, self.orientation)
    }
}
