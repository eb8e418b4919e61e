use super::node::{Node, NodeChild};
use super::tree::Tree;

/// Overlap callback for tree overlap queries.
pub trait OverlapHandler {
    /// Handles an overlap between leaves.
    fn handle(&mut self, index_a: i32, index_b: i32);
}

impl<F: FnMut(i32, i32)> OverlapHandler for F {
    #[inline(always)]
    fn handle(&mut self, index_a: i32, index_b: i32) {
        self(index_a, index_b)
    }
}

impl Tree {
    fn dispatch_test_for_leaf<THandler: OverlapHandler>(
        &self,
        leaf_index: i32,
        leaf_child: &NodeChild,
        node_index: i32,
        results: &mut THandler,
    ) {
        if node_index < 0 {
            results.handle(leaf_index, Self::encode(node_index));
        } else {
            self.test_leaf_against_node(leaf_index, leaf_child, node_index, results);
        }
    }

    pub(crate) fn test_leaf_against_node<THandler: OverlapHandler>(
        &self,
        leaf_index: i32,
        leaf_child: &NodeChild,
        node_index: i32,
        results: &mut THandler,
    ) {
        let node = self.node(node_index);
        let leaf_bounds = leaf_child.bounds();
        if node.a.bounds().intersects(&leaf_bounds) {
            self.dispatch_test_for_leaf(leaf_index, leaf_child, node.a.index, results);
        }
        if node.b.bounds().intersects(&leaf_bounds) {
            self.dispatch_test_for_leaf(leaf_index, leaf_child, node.b.index, results);
        }
    }

    fn dispatch_test_for_nodes<THandler: OverlapHandler>(
        &self,
        a: &NodeChild,
        b: &NodeChild,
        results: &mut THandler,
    ) {
        if a.index >= 0 {
            if b.index >= 0 {
                self.get_overlaps_between_different_nodes(
                    self.node(a.index),
                    self.node(b.index),
                    results,
                );
            } else {
                // Leaf B versus node A.
                self.test_leaf_against_node(Self::encode(b.index), b, a.index, results);
            }
        } else if b.index >= 0 {
            // Leaf A versus node B.
            self.test_leaf_against_node(Self::encode(a.index), a, b.index, results);
        } else {
            // Two leaves.
            results.handle(Self::encode(a.index), Self::encode(b.index));
        }
    }

    fn get_overlaps_between_different_nodes<THandler: OverlapHandler>(
        &self,
        a: &Node,
        b: &Node,
        results: &mut THandler,
    ) {
        // There are no shared children, so test them all.
        for child_a in [&a.a, &a.b] {
            for child_b in [&b.a, &b.b] {
                if child_a.bounds().intersects(&child_b.bounds()) {
                    self.dispatch_test_for_nodes(child_a, child_b, results);
                }
            }
        }
    }

    fn get_overlaps_in_node<THandler: OverlapHandler>(&self, node: &Node, results: &mut THandler) {
        if node.a.index >= 0 {
            self.get_overlaps_in_node(self.node(node.a.index), results);
        }
        if node.b.index >= 0 {
            self.get_overlaps_in_node(self.node(node.b.index), results);
        }
        if node.a.bounds().intersects(&node.b.bounds()) {
            self.dispatch_test_for_nodes(&node.a, &node.b, results);
        }
    }

    /// Reports every pair of leaves within this tree whose bounding boxes overlap. Each pair is reported once.
    pub fn get_self_overlaps<THandler: OverlapHandler>(&self, results: &mut THandler) {
        // If there are less than two leaves, there can't be any overlap.
        if self.leaf_count() < 2 {
            return;
        }
        self.get_overlaps_in_node(self.node(0), results);
    }
}
