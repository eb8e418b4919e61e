use super::node::{Metanode, Node, NodeChild};
use super::tree::Tree;
use crate::utilities::bounding_box::BoundingBox;

/// Rotation strategy applied while descending or after inserting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum InsertionRotation {
    None,
    TopDown,
    BottomUp,
}

impl Tree {
    /// Adds a leaf to the tree with the given bounding box and returns the index of the added leaf.
    ///
    /// Performs no incremental refinement. Slightly cheaper than `add`, but tree quality
    /// depends on insertion order. Pathological orders can result in maximally imbalanced trees.
    pub fn add_without_refinement(&mut self, bounds: BoundingBox) -> i32 {
        self.add_internal(bounds, InsertionRotation::None)
    }

    /// Adds a leaf to the tree with the given bounding box and returns the index of the added leaf.
    ///
    /// Performs incrementally refining tree rotations down along the insertion path.
    pub fn add(&mut self, bounds: BoundingBox) -> i32 {
        self.add_internal(bounds, InsertionRotation::TopDown)
    }

    /// Adds a leaf to the tree with the given bounding box and returns the index of the added leaf.
    ///
    /// Performs incrementally refining tree rotations up along the insertion path.
    /// Slightly better quality than `add`, but also slightly more expensive.
    pub fn add_with_bottom_up_refinement(&mut self, bounds: BoundingBox) -> i32 {
        self.add_internal(bounds, InsertionRotation::BottomUp)
    }

    fn add_internal(&mut self, bounds: BoundingBox, rotation: InsertionRotation) -> i32 {
        let leaf_count = self.leaf_count();
        if leaf_count < 2 {
            // The root is partial.
            let leaf_index = self.add_leaf(0, leaf_count);
            *self.node_mut(0).child_mut(leaf_count) = NodeChild::leaf(bounds, leaf_index);
            return leaf_index;
        }

        // The tree is complete; traverse to find the best place to insert the leaf.
        let new_node_index = self.allocate_node();
        // We only ever insert into child A of the new node, so the leaf can be added right away.
        let new_leaf_index = self.add_leaf(new_node_index, 0);
        let mut node_index = 0;

        loop {
            // Rotating from the top down produces a tree that's lower quality than rotating from the bottom up.
            // The advantage is that top down is a little faster.
            if rotation == InsertionRotation::TopDown {
                self.try_rotate_node(node_index);
            }

            let node = *self.node(node_index);
            // Choose whichever child requires less bounds expansion.
            let merged_a = bounds.merged(&node.a.bounds());
            let merged_b = bounds.merged(&node.b.bounds());
            let bounds_increase_a = merged_a.surface_metric() - node.a.metric();
            let bounds_increase_b = merged_b.surface_metric() - node.b.metric();

            let use_a = if bounds_increase_a == bounds_increase_b {
                node.a.leaf_count < node.b.leaf_count
            } else {
                bounds_increase_a < bounds_increase_b
            };
            let (child_index, merged) = if use_a { (0, merged_a) } else { (1, merged_b) };
            let chosen = *node.child(child_index);

            if chosen.is_leaf() {
                // The merge target is a leaf. A new internal node takes its slot and holds both leaves.
                *self.metanode_mut(new_node_index) = Metanode {
                    parent: node_index,
                    index_in_parent: child_index,
                };
                *self.node_mut(new_node_index) = Node {
                    a: NodeChild::leaf(bounds, new_leaf_index),
                    b: chosen,
                };
                self.set_child_parent(&chosen, new_node_index, 1);
                *self.node_mut(node_index).child_mut(child_index) =
                    NodeChild::internal(merged, new_node_index, 2);
                break;
            }

            // Just traversing into an internal node.
            let child = self.node_mut(node_index).child_mut(child_index);
            child.set_bounds(merged);
            child.leaf_count += 1;
            node_index = child.index;
        }

        if rotation == InsertionRotation::BottomUp {
            let mut parent_index = self.leaf(new_leaf_index).node_index();
            while parent_index >= 0 {
                self.try_rotate_node(parent_index);
                parent_index = self.metanode(parent_index).parent;
            }
        }

        new_leaf_index
    }

    /// Tries a left and a right tree rotation around the node and applies whichever lowers the cost the most.
    pub(crate) fn try_rotate_node(&mut self, rotation_root_index: i32) {
        let root = *self.node(rotation_root_index);
        let cost_a = root.a.metric();
        let cost_b = root.b.metric();
        let mut left_rotation_cost_change = 0.0f32;
        let mut left_uses_a = false;
        let mut right_rotation_cost_change = 0.0f32;
        let mut right_uses_a = false;

        if root.a.index >= 0 {
            // Try a right rotation: one of A's children joins B.
            let a = self.node(root.a.index);
            let cost_aab = a.a.bounds().merged(&root.b.bounds()).surface_metric();
            let cost_abb = a.b.bounds().merged(&root.b.bounds()).surface_metric();
            right_uses_a = cost_aab < cost_abb;
            right_rotation_cost_change = cost_aab.min(cost_abb) - cost_a;
        }

        if root.b.index >= 0 {
            // Try a left rotation: one of B's children joins A.
            let b = self.node(root.b.index);
            let cost_bab = root.a.bounds().merged(&b.a.bounds()).surface_metric();
            let cost_bbb = root.a.bounds().merged(&b.b.bounds()).surface_metric();
            left_uses_a = cost_bab < cost_bbb;
            left_rotation_cost_change = cost_bab.min(cost_bbb) - cost_b;
        }

        if left_rotation_cost_change.min(right_rotation_cost_change) >= 0.0 {
            return;
        }

        if left_rotation_cost_change < right_rotation_cost_change {
            // Left rotation wins!
            let node_index_to_replace = root.b.index;
            let node_to_replace = *self.node(node_index_to_replace);
            let (child_to_shift_left, child_to_shift_up) = if left_uses_a {
                (node_to_replace.a, node_to_replace.b)
            } else {
                (node_to_replace.b, node_to_replace.a)
            };
            let replaced = Node {
                a: root.a,
                b: child_to_shift_left,
            };
            *self.node_mut(node_index_to_replace) = replaced;
            *self.node_mut(rotation_root_index) = Node {
                a: NodeChild::internal(
                    replaced.bounds(),
                    node_index_to_replace,
                    replaced.a.leaf_count + replaced.b.leaf_count,
                ),
                b: child_to_shift_up,
            };
            *self.metanode_mut(node_index_to_replace) = Metanode {
                parent: rotation_root_index,
                index_in_parent: 0,
            };
            self.set_child_parent(&child_to_shift_up, rotation_root_index, 1);
            self.set_child_parent(&replaced.a, node_index_to_replace, 0);
            self.set_child_parent(&replaced.b, node_index_to_replace, 1);
        } else {
            // Right rotation wins!
            let node_index_to_replace = root.a.index;
            let node_to_replace = *self.node(node_index_to_replace);
            let (child_to_shift_right, child_to_shift_up) = if right_uses_a {
                (node_to_replace.a, node_to_replace.b)
            } else {
                (node_to_replace.b, node_to_replace.a)
            };
            let replaced = Node {
                a: child_to_shift_right,
                b: root.b,
            };
            *self.node_mut(node_index_to_replace) = replaced;
            *self.node_mut(rotation_root_index) = Node {
                a: child_to_shift_up,
                b: NodeChild::internal(
                    replaced.bounds(),
                    node_index_to_replace,
                    replaced.a.leaf_count + replaced.b.leaf_count,
                ),
            };
            *self.metanode_mut(node_index_to_replace) = Metanode {
                parent: rotation_root_index,
                index_in_parent: 1,
            };
            self.set_child_parent(&child_to_shift_up, rotation_root_index, 0);
            self.set_child_parent(&replaced.a, node_index_to_replace, 0);
            self.set_child_parent(&replaced.b, node_index_to_replace, 1);
        }
    }
}
