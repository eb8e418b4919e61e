use super::leaf::Leaf;
use super::tree::Tree;

impl Tree {
    /// Removes a node by moving the last node into its slot. The removed node must already be unlinked.
    fn remove_node_at(&mut self, node_index: i32) {
        debug_assert!(node_index > 0 && node_index < self.node_count());
        let last = self.node_count() - 1;
        if node_index < last {
            let moved_node = *self.node(last);
            let moved_metanode = *self.metanode(last);
            *self.node_mut(node_index) = moved_node;
            *self.metanode_mut(node_index) = moved_metanode;

            // The moved node's parent should point at the new slot...
            self.node_mut(moved_metanode.parent)
                .child_mut(moved_metanode.index_in_parent)
                .index = node_index;
            // ...and its children should point back at it.
            for i in 0..2 {
                let child = *moved_node.child(i);
                if child.index >= 0 {
                    self.metanode_mut(child.index).parent = node_index;
                } else {
                    self.leaves[Self::encode(child.index) as usize] = Leaf::new(node_index, i);
                }
            }
        }
        self.nodes.pop();
        self.metanodes.pop();
    }

    /// Walks from `node_index` to the root, refitting parents and decrementing their leaf counts.
    fn refit_for_removal(&mut self, mut node_index: i32) {
        loop {
            let metanode = *self.metanode(node_index);
            if metanode.parent < 0 {
                break;
            }
            let bounds = self.node(node_index).bounds();
            let child_in_parent = self
                .node_mut(metanode.parent)
                .child_mut(metanode.index_in_parent);
            child_in_parent.set_bounds(bounds);
            child_in_parent.leaf_count -= 1;
            node_index = metanode.parent;
        }
    }

    /// Removes a leaf at an index. If the index is not at the end of the leaf list,
    /// the last leaf is swapped into the removed location.
    ///
    /// Returns the former index of the leaf that was moved into the removed leaf's slot, if any.
    pub fn remove_at(&mut self, leaf_index: i32) -> Option<i32> {
        assert!(
            leaf_index >= 0 && leaf_index < self.leaf_count(),
            "Leaf index must be a valid index in the tree's leaf array."
        );

        let leaf = self.leaf(leaf_index);
        // Delete the leaf from the leaves array, moving the last leaf into its slot.
        self.leaves.swap_remove(leaf_index as usize);
        let moved_from = self.leaf_count();
        if leaf_index < moved_from {
            let moved_leaf = self.leaf(leaf_index);
            self.node_mut(moved_leaf.node_index())
                .child_mut(moved_leaf.child_index())
                .index = Self::encode(leaf_index);
        }

        let node_index = leaf.node_index();
        let metanode = *self.metanode(node_index);
        let surviving_child_index_in_node = leaf.child_index() ^ 1;
        let surviving_child = *self.node(node_index).child(surviving_child_index_in_node);

        if metanode.parent >= 0 {
            // Non-root internal node. With only two children, it collapses:
            // the surviving child takes over the slot that pointed at the collapsing node.
            *self
                .node_mut(metanode.parent)
                .child_mut(metanode.index_in_parent) = surviving_child;
            self.set_child_parent(&surviving_child, metanode.parent, metanode.index_in_parent);
            self.refit_for_removal(metanode.parent);
            self.remove_node_at(node_index);
        } else {
            debug_assert!(node_index == 0, "Only the root should have a negative parent.");
            if self.leaf_count() > 0 {
                if surviving_child.index >= 0 {
                    // The surviving child is an internal node and replaces the root.
                    let pulled_node_index = surviving_child.index;
                    let pulled = *self.node(pulled_node_index);
                    *self.node_mut(0) = pulled;
                    for i in 0..2 {
                        self.set_child_parent(pulled.child(i), 0, i);
                    }
                    self.remove_node_at(pulled_node_index);
                } else if surviving_child_index_in_node > 0 {
                    // The surviving leaf moves down to keep the lowest slot filled.
                    let root = self.node_mut(0);
                    root.a = root.b;
                    self.leaves[Self::encode(surviving_child.index) as usize] = Leaf::new(0, 0);
                }
            }
            // No refit needed; it's the root.
        }

        (leaf_index < moved_from).then_some(moved_from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utilities::bounding_box::BoundingBox;
    use glam::Vec3;

    fn build(count: i32) -> Tree {
        let mut tree = Tree::new(count as usize);
        for i in 0..count {
            let p = Vec3::new((i * 37 % 11) as f32, (i * 13 % 5) as f32, i as f32 * 0.3);
            tree.add(BoundingBox::new(p, p + Vec3::ONE));
        }
        tree
    }

    #[test]
    fn removing_last_leaf_moves_nothing() {
        let mut tree = build(5);
        assert_eq!(tree.remove_at(4), None);
        assert_eq!(tree.leaf_count(), 4);
        tree.validate().unwrap();
    }

    #[test]
    fn removing_moves_last_leaf_into_slot() {
        let mut tree = build(6);
        let last_bounds = tree.get_bounds(5);
        assert_eq!(tree.remove_at(1), Some(5));
        assert_eq!(tree.get_bounds(1), last_bounds);
        tree.validate().unwrap();
    }

    #[test]
    fn remove_everything_in_varied_order() {
        let mut tree = build(64);
        let mut remaining = 64;
        let mut step = 0;
        while remaining > 0 {
            step += 1;
            let index = (step * 7919) % remaining;
            tree.remove_at(index);
            remaining -= 1;
            assert_eq!(tree.leaf_count(), remaining);
            assert_eq!(tree.node_count(), (remaining - 1).max(1));
            tree.validate().unwrap();
        }
        assert!(tree.root_bounds().is_none());
    }

    #[test]
    fn remove_from_two_leaf_root() {
        let mut tree = build(2);
        let survivor = tree.get_bounds(1);
        assert_eq!(tree.remove_at(0), Some(1));
        assert_eq!(tree.get_bounds(0), survivor);
        assert_eq!(tree.root_bounds(), Some(survivor));
        tree.validate().unwrap();
    }
}
