use super::node::{Node, NodeChild};
use super::tree::Tree;
use super::tree_self_queries::OverlapHandler;

impl Tree {
    fn dispatch_test_for_node_against_leaf<THandler: OverlapHandler>(
        &self,
        leaf_index: i32,
        leaf_child: &NodeChild,
        node_index: i32,
        results: &mut THandler,
    ) {
        if node_index < 0 {
            results.handle(Self::encode(node_index), leaf_index);
        } else {
            self.test_node_against_leaf(node_index, leaf_index, leaf_child, results);
        }
    }

    /// Tests a leaf owned by the other tree against a node of this tree; results are reported (this, other).
    fn test_node_against_leaf<THandler: OverlapHandler>(
        &self,
        node_index: i32,
        leaf_index: i32,
        leaf_child: &NodeChild,
        results: &mut THandler,
    ) {
        let node = self.node(node_index);
        let leaf_bounds = leaf_child.bounds();
        if node.a.bounds().intersects(&leaf_bounds) {
            self.dispatch_test_for_node_against_leaf(leaf_index, leaf_child, node.a.index, results);
        }
        if node.b.bounds().intersects(&leaf_bounds) {
            self.dispatch_test_for_node_against_leaf(leaf_index, leaf_child, node.b.index, results);
        }
    }

    fn dispatch_test_for_nodes_intertree<THandler: OverlapHandler>(
        &self,
        a: &NodeChild,
        tree_b: &Tree,
        b: &NodeChild,
        results: &mut THandler,
    ) {
        if a.index >= 0 {
            if b.index >= 0 {
                self.get_overlaps_between_trees(self.node(a.index), tree_b, tree_b.node(b.index), results);
            } else {
                // Leaf B versus node A.
                self.test_node_against_leaf(a.index, Self::encode(b.index), b, results);
            }
        } else if b.index >= 0 {
            // Leaf A versus node B. The other tree reports (b, a), so flip the handler.
            let mut flipped = |index_b: i32, index_a: i32| results.handle(index_a, index_b);
            tree_b.test_leaf_against_node(Self::encode(a.index), a, b.index, &mut flipped);
        } else {
            // Two leaves.
            results.handle(Self::encode(a.index), Self::encode(b.index));
        }
    }

    fn get_overlaps_between_trees<THandler: OverlapHandler>(
        &self,
        a: &Node,
        tree_b: &Tree,
        b: &Node,
        results: &mut THandler,
    ) {
        for child_a in [&a.a, &a.b] {
            for child_b in [&b.a, &b.b] {
                if child_a.bounds().intersects(&child_b.bounds()) {
                    self.dispatch_test_for_nodes_intertree(child_a, tree_b, child_b, results);
                }
            }
        }
    }

    /// Reports every overlapping pair between a leaf of this tree and a leaf of `tree_b`, as (this leaf, other leaf).
    pub fn get_overlaps_with<THandler: OverlapHandler>(&self, tree_b: &Tree, results: &mut THandler) {
        if self.leaf_count() == 0 || tree_b.leaf_count() == 0 {
            return;
        }
        // Partial roots hold only slot a; a zero-sized phantom slot b must not be visited.
        let root_a = self.node(0);
        let root_b = tree_b.node(0);
        let children_a = [root_a.a, root_a.b];
        let children_b = [root_b.a, root_b.b];
        let children_a = &children_a[..self.leaf_count().min(2) as usize];
        let children_b = &children_b[..tree_b.leaf_count().min(2) as usize];
        for child_a in children_a {
            for child_b in children_b {
                if child_a.bounds().intersects(&child_b.bounds()) {
                    self.dispatch_test_for_nodes_intertree(child_a, tree_b, child_b, results);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utilities::bounding_box::BoundingBox;
    use glam::Vec3;

    fn scatter(count: i32, offset: f32) -> (Tree, Vec<BoundingBox>) {
        let mut tree = Tree::new(count as usize);
        let mut boxes = Vec::new();
        for i in 0..count {
            let p = Vec3::new((i * 11 % 9) as f32 + offset, (i * 5 % 7) as f32, (i % 3) as f32);
            let b = BoundingBox::new(p, p + Vec3::splat(0.8));
            tree.add(b);
            boxes.push(b);
        }
        (tree, boxes)
    }

    fn brute_force(a: &[BoundingBox], b: &[BoundingBox]) -> Vec<(i32, i32)> {
        let mut pairs = Vec::new();
        for (i, box_a) in a.iter().enumerate() {
            for (j, box_b) in b.iter().enumerate() {
                if box_a.intersects(box_b) {
                    pairs.push((i as i32, j as i32));
                }
            }
        }
        pairs
    }

    #[test]
    fn intertree_overlaps_match_brute_force() {
        for (count_a, count_b) in [(30, 25), (1, 25), (25, 1), (1, 1), (2, 40)] {
            let (tree_a, boxes_a) = scatter(count_a, 0.0);
            let (tree_b, boxes_b) = scatter(count_b, 0.35);
            let mut found = Vec::new();
            tree_a.get_overlaps_with(&tree_b, &mut |a: i32, b: i32| found.push((a, b)));
            found.sort_unstable();
            assert_eq!(found, brute_force(&boxes_a, &boxes_b), "{count_a} vs {count_b}");
        }
    }

    #[test]
    fn empty_tree_has_no_overlaps() {
        let (tree_a, _) = scatter(10, 0.0);
        let tree_b = Tree::new(0);
        let mut count = 0;
        tree_a.get_overlaps_with(&tree_b, &mut |_: i32, _: i32| count += 1);
        assert_eq!(count, 0);
    }
}
