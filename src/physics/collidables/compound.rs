use glam::Vec3;

use super::shape::{RayHit, Shape};
use crate::error::{CollisionError, Result};
use crate::physics::rigid_pose::RigidPose;
use crate::physics::trees::Tree;
use crate::utilities::bounding_box::BoundingBox;

/// Shape and pose of a child within a composite shape.
#[derive(Clone, Debug)]
pub struct CompositeChild {
    /// Pose of the child in the composite's local space.
    pub pose: RigidPose,
    pub shape: Shape,
}

/// A shape made of posed child shapes. Children may themselves be composites.
///
/// A bounding tree over the children's local bounds accelerates ray tests and pair tests; leaf `i` of the tree
/// is child `i`.
#[derive(Clone, Debug)]
pub struct Composite {
    children: Vec<CompositeChild>,
    tree: Tree,
}

impl Composite {
    pub fn new(children: Vec<(RigidPose, Shape)>) -> Result<Self> {
        if children.is_empty() {
            return Err(CollisionError::InvalidShape(
                "A composite shape needs at least one child.".to_string(),
            ));
        }
        if let Some(index) = children.iter().position(|(pose, _)| !pose.is_finite()) {
            return Err(CollisionError::InvalidShape(format!(
                "Composite child {index} has a non-finite pose."
            )));
        }
        let children: Vec<CompositeChild> = children
            .into_iter()
            .map(|(pose, shape)| CompositeChild { pose, shape })
            .collect();
        let bounds: Vec<BoundingBox> = children.iter().map(|c| c.shape.compute_bounds(&c.pose)).collect();
        let mut tree = Tree::new(children.len());
        tree.sweep_build(&bounds);
        Ok(Self { children, tree })
    }

    #[inline(always)]
    pub fn children(&self) -> &[CompositeChild] {
        &self.children
    }

    #[inline(always)]
    pub fn child(&self, index: usize) -> &CompositeChild {
        &self.children[index]
    }

    #[inline(always)]
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// The bounding tree over the children in local space.
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// World pose of a child when the composite is at `pose`.
    #[inline(always)]
    pub fn child_pose(&self, pose: &RigidPose, index: usize) -> RigidPose {
        pose.multiply(&self.children[index].pose)
    }

    /// Indices of the children whose local bounds overlap a local space box, sorted.
    pub fn overlapping_children(&self, local_bounds: &BoundingBox) -> Vec<usize> {
        let mut found: Vec<usize> = self
            .tree
            .overlapping_leaves(local_bounds)
            .into_iter()
            .map(|leaf| leaf as usize)
            .collect();
        found.sort_unstable();
        found
    }

    pub fn compute_bounds(&self, pose: &RigidPose) -> BoundingBox {
        self.children
            .iter()
            .map(|child| child.shape.compute_bounds(&pose.multiply(&child.pose)))
            .fold(BoundingBox::empty(), |merged, bounds| merged.merged(&bounds))
    }

    /// Closest hit among the children.
    pub fn ray_test(&self, pose: &RigidPose, origin: Vec3, direction: Vec3, maximum_t: f32) -> Option<RayHit> {
        let local_origin = pose.inverse_transform_point(origin);
        let local_direction = pose.inverse_transform_vector(direction);
        let mut closest: Option<RayHit> = None;
        self.tree.ray_cast(
            local_origin,
            local_direction,
            maximum_t,
            &mut |leaf: i32, maximum_t: &mut f32| {
                let child = &self.children[leaf as usize];
                if let Some(hit) = child.shape.ray_test(&child.pose, local_origin, local_direction, *maximum_t) {
                    if hit.t <= *maximum_t {
                        *maximum_t = hit.t;
                        closest = Some(hit);
                    }
                }
            },
        );
        closest.map(|hit| RayHit {
            t: hit.t,
            normal: pose.transform_vector(hit.normal),
        })
    }
}
