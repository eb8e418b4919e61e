use glam::Vec3;

use crate::utilities::bounding_box::BoundingBox;

/// A child slot of a tree node: the bounding box of the subtree plus where to find it.
///
/// `index >= 0` points at an internal node; negative values are encoded leaf indices (see [`Tree::encode`](super::tree::Tree::encode)).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NodeChild {
    /// Minimum bounds of the bounding box
    pub min: Vec3,
    /// Index of the child node or encoded leaf index
    pub index: i32,
    /// Maximum bounds of the bounding box
    pub max: Vec3,
    /// Number of leaves under this child
    pub leaf_count: i32,
}

impl NodeChild {
    /// Creates a child slot holding a single leaf.
    #[inline(always)]
    pub fn leaf(bounds: BoundingBox, leaf_index: i32) -> Self {
        Self {
            min: bounds.min,
            index: -1 - leaf_index,
            max: bounds.max,
            leaf_count: 1,
        }
    }

    /// Creates a child slot pointing at an internal node.
    #[inline(always)]
    pub fn internal(bounds: BoundingBox, node_index: i32, leaf_count: i32) -> Self {
        debug_assert!(node_index >= 0);
        Self {
            min: bounds.min,
            index: node_index,
            max: bounds.max,
            leaf_count,
        }
    }

    #[inline(always)]
    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::new(self.min, self.max)
    }

    #[inline(always)]
    pub fn set_bounds(&mut self, bounds: BoundingBox) {
        self.min = bounds.min;
        self.max = bounds.max;
    }

    #[inline(always)]
    pub fn is_leaf(&self) -> bool {
        self.index < 0
    }

    /// Surface area heuristic cost of the child's bounds.
    #[inline(always)]
    pub fn metric(&self) -> f32 {
        self.bounds().surface_metric()
    }
}

/// 2-wide tree node.
///
/// The format implies that the root bounding box is never tested explicitly during queries.
/// Broad phase queries almost always land inside the root anyway.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Node {
    pub a: NodeChild,
    pub b: NodeChild,
}

impl Node {
    /// Gets the child in slot 0 (a) or 1 (b).
    #[inline(always)]
    pub fn child(&self, index: i32) -> &NodeChild {
        debug_assert!(index == 0 || index == 1);
        if index == 0 {
            &self.a
        } else {
            &self.b
        }
    }

    #[inline(always)]
    pub fn child_mut(&mut self, index: i32) -> &mut NodeChild {
        debug_assert!(index == 0 || index == 1);
        if index == 0 {
            &mut self.a
        } else {
            &mut self.b
        }
    }

    /// Bounds enclosing both children.
    #[inline(always)]
    pub fn bounds(&self) -> BoundingBox {
        self.a.bounds().merged(&self.b.bounds())
    }
}

/// Metadata associated with a 2-child tree node.
///
/// Node metadata isn't used during collision testing, so it is stored separately
/// to keep query traversal touching only the nodes.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Metanode {
    pub parent: i32,
    pub index_in_parent: i32,
}

impl Default for Metanode {
    fn default() -> Self {
        Self {
            parent: -1,
            index_in_parent: -1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_layout_is_compact() {
        assert_eq!(std::mem::size_of::<NodeChild>(), 32);
        assert_eq!(std::mem::size_of::<Node>(), 64);
        assert_eq!(std::mem::size_of::<Metanode>(), 8);
    }

    #[test]
    fn leaf_children_encode_their_index() {
        let bounds = BoundingBox::new(Vec3::ZERO, Vec3::ONE);
        let child = NodeChild::leaf(bounds, 5);
        assert!(child.is_leaf());
        assert_eq!(child.index, -6);
        assert_eq!(child.bounds(), bounds);
        let internal = NodeChild::internal(bounds, 3, 7);
        assert!(!internal.is_leaf());
        assert_eq!(internal.leaf_count, 7);
    }
}
