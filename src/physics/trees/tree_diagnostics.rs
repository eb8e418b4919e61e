use super::tree::Tree;
use crate::utilities::bounding_box::BoundingBox;

impl Tree {
    /// Measures the SAH cost of the tree relative to its root bounds. Lower is better.
    ///
    /// Trees with two or fewer leaves have no internal nodes to judge and report zero.
    pub fn compute_cost(&self) -> f32 {
        if self.leaf_count() <= 2 {
            return 0.0;
        }
        let root_metric = self.node(0).bounds().surface_metric();
        // Both leaf and internal node cost is 1, so just add the metric.
        let total_cost: f32 = self
            .nodes
            .iter()
            .map(|node| node.a.metric() + node.b.metric())
            .sum();
        total_cost / root_metric.max(f32::MIN_POSITIVE)
    }

    fn compute_max_depth_from(&self, node_index: i32, depth: i32) -> i32 {
        let node = self.node(node_index);
        let mut max_depth = depth;
        for child in [&node.a, &node.b] {
            if child.index >= 0 {
                max_depth = max_depth.max(self.compute_max_depth_from(child.index, depth + 1));
            }
        }
        max_depth
    }

    /// Number of levels in the deepest path from the root, counting the root node as level 1.
    pub fn compute_max_depth(&self) -> i32 {
        if self.is_empty() {
            return 0;
        }
        self.compute_max_depth_from(0, 1)
    }

    fn validate_node(
        &self,
        node_index: i32,
        expected_parent_index: i32,
        expected_index_in_parent: i32,
        expected_bounds: Option<BoundingBox>,
    ) -> Result<i32, String> {
        let metanode = self.metanode(node_index);
        if metanode.parent != expected_parent_index {
            return Err(format!("Bad parent index on node {node_index}."));
        }
        if metanode.index_in_parent != expected_index_in_parent {
            return Err(format!("Bad index in parent on node {node_index}."));
        }

        let node = self.node(node_index);
        let child_count = self.leaf_count().min(2);
        let mut found_leaf_count = 0;
        let mut merged = BoundingBox::empty();
        for i in 0..child_count {
            let child = node.child(i);
            if !child.bounds().is_valid() {
                return Err(format!("Node {node_index} child {i} has a bad bounding box."));
            }
            merged = merged.merged(&child.bounds());

            if child.index >= 0 {
                if child.index >= self.node_count() {
                    return Err(format!(
                        "Implied existence of node {} is outside of count {}.",
                        child.index,
                        self.node_count()
                    ));
                }
                let child_found_leaf_count =
                    self.validate_node(child.index, node_index, i, Some(child.bounds()))?;
                if child_found_leaf_count != child.leaf_count {
                    return Err(format!("Bad leaf count for child {i} of node {node_index}."));
                }
                found_leaf_count += child_found_leaf_count;
            } else {
                found_leaf_count += 1;
                if child.leaf_count != 1 {
                    return Err(format!(
                        "Bad leaf count on node {node_index} child {i}, it's a leaf but leaf_count is {}.",
                        child.leaf_count
                    ));
                }
                let leaf_index = Self::encode(child.index);
                if leaf_index < 0 || leaf_index >= self.leaf_count() {
                    return Err(format!("Bad node-contained leaf index {leaf_index}."));
                }
                let leaf = self.leaf(leaf_index);
                if leaf.node_index() != node_index || leaf.child_index() != i {
                    return Err(format!(
                        "Mismatch between node-held leaf pointer and leaf {leaf_index}'s pointers."
                    ));
                }
            }
        }

        if found_leaf_count == 0 && (self.leaf_count() > 0 || expected_parent_index >= 0) {
            return Err(format!("Node {node_index} holds no leaves."));
        }
        if let Some(expected) = expected_bounds {
            if merged != expected {
                return Err(format!(
                    "Node {node_index} bounds {:?}, {:?}, expected ({:?}, {:?}).",
                    merged.min, merged.max, expected.min, expected.max
                ));
            }
        }
        Ok(found_leaf_count)
    }

    /// Checks the structural invariants of the tree: parent pointers, leaf back-pointers,
    /// leaf counts, and that every parent slot holds exactly the merged bounds of its children.
    pub fn validate(&self) -> Result<(), String> {
        if self.metanode(0).parent != -1 {
            return Err(format!(
                "Invalid parent for root: {}. Should be -1.",
                self.metanode(0).parent
            ));
        }
        if self.leaf_count() > 0 && self.node_count() != (self.leaf_count() - 1).max(1) {
            return Err(format!(
                "{} leaves should need {} nodes, but the tree has {}.",
                self.leaf_count(),
                (self.leaf_count() - 1).max(1),
                self.node_count()
            ));
        }
        for i in 0..self.leaf_count() {
            let leaf = self.leaf(i);
            if leaf.node_index() >= self.node_count() {
                return Err(format!("Leaf {i} points at missing node {}.", leaf.node_index()));
            }
            if Self::encode(self.node(leaf.node_index()).child(leaf.child_index()).index) != i {
                return Err(format!("Leaf {i} is not held by the node slot it points to."));
            }
        }
        let found_leaf_count = self.validate_node(0, -1, -1, None)?;
        if found_leaf_count != self.leaf_count() {
            return Err(format!(
                "{found_leaf_count} leaves found in tree, expected {}.",
                self.leaf_count()
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn line(count: i32) -> Tree {
        let mut tree = Tree::new(count as usize);
        for i in 0..count {
            let p = Vec3::new(i as f32, 0.0, 0.0);
            tree.add(BoundingBox::new(p, p + Vec3::ONE));
        }
        tree
    }

    #[test]
    fn small_trees_have_zero_cost() {
        assert_eq!(line(0).compute_cost(), 0.0);
        assert_eq!(line(2).compute_cost(), 0.0);
        assert!(line(3).compute_cost() > 0.0);
    }

    #[test]
    fn depth_is_bounded_by_leaf_count() {
        assert_eq!(line(0).compute_max_depth(), 0);
        assert_eq!(line(2).compute_max_depth(), 1);
        let tree = line(64);
        let depth = tree.compute_max_depth();
        assert!(depth >= 6 && depth <= 63, "depth {depth}");
    }

    #[test]
    fn validate_detects_corrupted_bounds() {
        let mut tree = line(8);
        tree.validate().unwrap();
        // A leaf held directly by the root has no stored parent bounds to contradict.
        let leaf_index = (0..8).find(|&i| tree.leaf(i).node_index() != 0).unwrap();
        tree.set_leaf_bounds_without_refit(leaf_index, BoundingBox::new(Vec3::splat(50.0), Vec3::splat(51.0)));
        assert!(tree.validate().is_err());
        tree.refit();
        tree.validate().unwrap();
    }
}
