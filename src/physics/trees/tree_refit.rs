use super::tree::Tree;
use crate::utilities::bounding_box::BoundingBox;

impl Tree {
    /// Refits the bounding box of every parent of the node recursively to the root.
    pub fn refit_for_node_bounds_change(&mut self, mut node_index: i32) {
        // No attempt is made to refit the root node; its bounds live implicitly in its children.
        loop {
            let metanode = *self.metanode(node_index);
            if metanode.parent < 0 {
                break;
            }
            let bounds = self.node(node_index).bounds();
            self.node_mut(metanode.parent)
                .child_mut(metanode.index_in_parent)
                .set_bounds(bounds);
            node_index = metanode.parent;
        }
    }

    fn refit_recursive(&mut self, node_index: i32) -> BoundingBox {
        let node = *self.node(node_index);
        if node.a.index >= 0 {
            let bounds = self.refit_recursive(node.a.index);
            self.node_mut(node_index).a.set_bounds(bounds);
        }
        if node.b.index >= 0 {
            let bounds = self.refit_recursive(node.b.index);
            self.node_mut(node_index).b.set_bounds(bounds);
        }
        self.node(node_index).bounds()
    }

    /// Updates the bounding boxes of all internal nodes in the tree.
    /// Use after changing many leaf bounds without refitting, e.g. through [`Tree::set_leaf_bounds_without_refit`].
    pub fn refit(&mut self) {
        // No point in refitting a tree with no internal nodes!
        if self.leaf_count() <= 2 {
            return;
        }
        self.refit_recursive(0);
    }

    /// Writes the leaf bounds without touching its ancestors. Call [`Tree::refit`] afterwards.
    pub fn set_leaf_bounds_without_refit(&mut self, leaf_index: i32, bounds: BoundingBox) {
        let leaf = self.leaf(leaf_index);
        self.node_mut(leaf.node_index())
            .child_mut(leaf.child_index())
            .set_bounds(bounds);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn batched_bounds_changes_refit_correctly() {
        let mut tree = Tree::new(32);
        for i in 0..32 {
            let p = Vec3::new(i as f32, 0.0, 0.0);
            tree.add(BoundingBox::new(p, p + Vec3::ONE));
        }
        for i in 0..32 {
            let p = Vec3::new(0.0, i as f32 * 2.0, 5.0);
            tree.set_leaf_bounds_without_refit(i, BoundingBox::new(p, p + Vec3::ONE));
        }
        tree.refit();
        tree.validate().unwrap();
        let root = tree.root_bounds().unwrap();
        assert_eq!(root.min, Vec3::new(0.0, 0.0, 5.0));
        assert_eq!(root.max, Vec3::new(1.0, 63.0, 6.0));
    }

    #[test]
    fn update_bounds_refits_ancestors() {
        let mut tree = Tree::new(8);
        for i in 0..8 {
            let p = Vec3::splat(i as f32);
            tree.add(BoundingBox::new(p, p + Vec3::ONE));
        }
        let far = BoundingBox::new(Vec3::splat(100.0), Vec3::splat(101.0));
        tree.update_bounds(3, far);
        tree.validate().unwrap();
        assert_eq!(tree.root_bounds().unwrap().max, Vec3::splat(101.0));
    }
}
