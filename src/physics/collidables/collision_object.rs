use std::fmt;
use std::sync::Arc;

use super::shape::Shape;
use crate::error::{CollisionError, Result};
use crate::physics::rigid_pose::RigidPose;
use crate::utilities::bounding_box::BoundingBox;

/// Handle of an object in a collision domain. Stable until the object is removed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollisionObjectId(pub u32);

impl CollisionObjectId {
    /// Id of an object that has not been added to a domain.
    pub const UNASSIGNED: Self = Self(u32::MAX);
}

impl fmt::Debug for CollisionObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How an object takes part in contact generation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CollisionObjectKind {
    /// Computes full contact sets.
    #[default]
    Default,
    /// Only reports whether it overlaps other objects; contact sets stay empty.
    Trigger,
}

/// A posed shape taking part in collision detection.
#[derive(Clone, Debug)]
pub struct CollisionObject {
    id: CollisionObjectId,
    pose: RigidPose,
    shape: Arc<Shape>,
    /// Disabled objects are skipped by the broad phase.
    pub enabled: bool,
    /// Group used by the collision filter.
    pub collision_group: u32,
    pub kind: CollisionObjectKind,
    bounds: BoundingBox,
}

impl CollisionObject {
    pub fn new(shape: Arc<Shape>, pose: RigidPose) -> Result<Self> {
        check_pose(&pose)?;
        let bounds = shape.compute_bounds(&pose);
        Ok(Self {
            id: CollisionObjectId::UNASSIGNED,
            pose,
            shape,
            enabled: true,
            collision_group: 0,
            kind: CollisionObjectKind::Default,
            bounds,
        })
    }

    pub fn with_kind(mut self, kind: CollisionObjectKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_group(mut self, collision_group: u32) -> Self {
        self.collision_group = collision_group;
        self
    }

    #[inline(always)]
    pub fn id(&self) -> CollisionObjectId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: CollisionObjectId) {
        self.id = id;
    }

    #[inline(always)]
    pub fn pose(&self) -> &RigidPose {
        &self.pose
    }

    /// Moves the object and refreshes its cached bounds.
    pub fn set_pose(&mut self, pose: RigidPose) -> Result<()> {
        check_pose(&pose)?;
        self.pose = pose;
        self.bounds = self.shape.compute_bounds(&self.pose);
        Ok(())
    }

    #[inline(always)]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// The shared shape handle.
    pub fn shape_arc(&self) -> &Arc<Shape> {
        &self.shape
    }

    pub fn set_shape(&mut self, shape: Arc<Shape>) {
        self.shape = shape;
        self.bounds = self.shape.compute_bounds(&self.pose);
    }

    /// Cached world space bounding box.
    #[inline(always)]
    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    #[inline(always)]
    pub fn is_trigger(&self) -> bool {
        self.kind == CollisionObjectKind::Trigger
    }
}

fn check_pose(pose: &RigidPose) -> Result<()> {
    if pose.is_finite() {
        Ok(())
    } else {
        Err(CollisionError::InvalidArgument(format!("Pose must be finite, got {pose:?}.")))
    }
}
