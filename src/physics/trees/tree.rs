use crate::utilities::bounding_box::BoundingBox;

use super::leaf::Leaf;
use super::node::{Metanode, Node, NodeChild};

/// A binary bounding volume hierarchy over axis-aligned boxes.
///
/// The struct is defined here and extended with `impl Tree` blocks in the sibling
/// `tree_*` modules (insertion, removal, refitting, queries, building, diagnostics).
///
/// The root node always exists. With fewer than two leaves it is only partially filled:
/// leaf 0 lives in slot a, and slot b is unused.
#[derive(Clone, Debug)]
pub struct Tree {
    /// Nodes of the tree. Node 0 is the root.
    pub(crate) nodes: Vec<Node>,
    /// Metadata per node that queries never read.
    pub(crate) metanodes: Vec<Metanode>,
    /// Back-pointers from leaves to the node slots holding them.
    pub(crate) leaves: Vec<Leaf>,
}

/// Initial capacity of the explicit stacks used by iterative traversals.
pub const TRAVERSAL_STACK_CAPACITY: usize = 256;

impl Default for Tree {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Tree {
    /// Constructs an empty tree with room for `initial_leaf_capacity` leaves before reallocating.
    pub fn new(initial_leaf_capacity: usize) -> Self {
        let node_capacity = initial_leaf_capacity.max(1);
        let mut tree = Self {
            nodes: Vec::with_capacity(node_capacity),
            metanodes: Vec::with_capacity(node_capacity),
            leaves: Vec::with_capacity(initial_leaf_capacity),
        };
        tree.initialize_root();
        tree
    }

    fn initialize_root(&mut self) {
        // The root always exists, even if there are no children in it. Makes some bookkeeping simpler.
        self.nodes.clear();
        self.metanodes.clear();
        self.nodes.push(Node::default());
        self.metanodes.push(Metanode::default());
    }

    /// Encodes a leaf index into the negative-index form used by node children, and back.
    #[inline(always)]
    pub fn encode(index: i32) -> i32 {
        -1 - index
    }

    #[inline(always)]
    pub fn leaf_count(&self) -> i32 {
        self.leaves.len() as i32
    }

    #[inline(always)]
    pub fn node_count(&self) -> i32 {
        self.nodes.len() as i32
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Resets the tree to a fresh post-construction state, keeping the allocations.
    pub fn clear(&mut self) {
        self.leaves.clear();
        self.initialize_root();
    }

    #[inline(always)]
    pub(crate) fn allocate_node(&mut self) -> i32 {
        let index = self.nodes.len() as i32;
        self.nodes.push(Node::default());
        self.metanodes.push(Metanode::default());
        index
    }

    #[inline(always)]
    pub(crate) fn add_leaf(&mut self, node_index: i32, child_index: i32) -> i32 {
        let index = self.leaves.len() as i32;
        self.leaves.push(Leaf::new(node_index, child_index));
        index
    }

    #[inline(always)]
    pub(crate) fn node(&self, node_index: i32) -> &Node {
        &self.nodes[node_index as usize]
    }

    #[inline(always)]
    pub(crate) fn node_mut(&mut self, node_index: i32) -> &mut Node {
        &mut self.nodes[node_index as usize]
    }

    #[inline(always)]
    pub(crate) fn metanode(&self, node_index: i32) -> &Metanode {
        &self.metanodes[node_index as usize]
    }

    #[inline(always)]
    pub(crate) fn metanode_mut(&mut self, node_index: i32) -> &mut Metanode {
        &mut self.metanodes[node_index as usize]
    }

    #[inline(always)]
    pub(crate) fn leaf(&self, leaf_index: i32) -> Leaf {
        self.leaves[leaf_index as usize]
    }

    /// Points the given child (leaf or node) back at its new parent slot.
    #[inline(always)]
    pub(crate) fn set_child_parent(&mut self, child: &NodeChild, parent: i32, index_in_parent: i32) {
        if child.index < 0 {
            self.leaves[Self::encode(child.index) as usize] = Leaf::new(parent, index_in_parent);
        } else {
            *self.metanode_mut(child.index) = Metanode {
                parent,
                index_in_parent,
            };
        }
    }

    /// Gets the node child representing the leaf at `leaf_index` within the tree.
    #[inline(always)]
    pub fn get_node_child_for_leaf(&self, leaf_index: i32) -> &NodeChild {
        let leaf = self.leaf(leaf_index);
        self.node(leaf.node_index()).child(leaf.child_index())
    }

    /// Bounds currently stored for a leaf.
    #[inline(always)]
    pub fn get_bounds(&self, leaf_index: i32) -> BoundingBox {
        self.get_node_child_for_leaf(leaf_index).bounds()
    }

    /// Applies updated bounds to the given leaf index in the tree, refitting the tree to match.
    pub fn update_bounds(&mut self, leaf_index: i32, bounds: BoundingBox) {
        let leaf = self.leaf(leaf_index);
        self.node_mut(leaf.node_index())
            .child_mut(leaf.child_index())
            .set_bounds(bounds);
        self.refit_for_node_bounds_change(leaf.node_index());
    }

    /// Bounds of everything in the tree, or `None` when empty.
    pub fn root_bounds(&self) -> Option<BoundingBox> {
        match self.leaves.len() {
            0 => None,
            1 => Some(self.node(0).a.bounds()),
            _ => Some(self.node(0).bounds()),
        }
    }

    /// Computes the SAH (surface area heuristic) metric for a bounding box.
    #[inline(always)]
    pub fn compute_bounds_metric(bounds: &BoundingBox) -> f32 {
        // Merely proportional to surface area. Being scaled by a constant factor is irrelevant.
        bounds.surface_metric()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn new_tree_has_root_only() {
        let tree = Tree::new(16);
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.leaf_count(), 0);
        assert!(tree.root_bounds().is_none());
    }

    #[test]
    fn encode_is_an_involution() {
        for i in [0, 1, 42, 1 << 20] {
            assert!(Tree::encode(i) < 0);
            assert_eq!(Tree::encode(Tree::encode(i)), i);
        }
    }

    #[test]
    fn clear_resets_to_root() {
        let mut tree = Tree::new(4);
        for i in 0..4 {
            let p = Vec3::splat(i as f32);
            tree.add(BoundingBox::new(p, p + Vec3::ONE));
        }
        tree.clear();
        assert_eq!(tree.node_count(), 1);
        assert!(tree.is_empty());
    }
}
