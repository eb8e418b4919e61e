use super::tree::{Tree, TRAVERSAL_STACK_CAPACITY};
use crate::utilities::bounding_box::BoundingBox;
use crate::utilities::for_each_ref::BreakableForEach;

impl Tree {
    /// Depth-first traversal of everything overlapping `bounding_box`. Returns false if the enumerator stopped early.
    fn get_overlaps_internal<TEnumerator: BreakableForEach<i32>>(
        &self,
        mut node_index: i32,
        bounding_box: &BoundingBox,
        leaf_enumerator: &mut TEnumerator,
    ) -> bool {
        debug_assert!(
            self.leaf_count() >= 2,
            "This implementation assumes all nodes are filled."
        );

        let mut stack: Vec<i32> = Vec::with_capacity(TRAVERSAL_STACK_CAPACITY);
        loop {
            if node_index < 0 {
                // This is actually a leaf node.
                if !leaf_enumerator.loop_body(Self::encode(node_index)) {
                    return false;
                }
                // Leaves have no children; pull from the stack.
                match stack.pop() {
                    Some(next) => node_index = next,
                    None => return true,
                }
            } else {
                let node = self.node(node_index);
                let a_intersected = node.a.bounds().intersects(bounding_box);
                let b_intersected = node.b.bounds().intersects(bounding_box);

                if a_intersected {
                    node_index = node.a.index;
                    if b_intersected {
                        stack.push(node.b.index);
                    }
                } else if b_intersected {
                    node_index = node.b.index;
                } else {
                    // No intersection. Pull from stack.
                    match stack.pop() {
                        Some(next) => node_index = next,
                        None => return true,
                    }
                }
            }
        }
    }

    /// Reports all leaf indices whose bounding boxes overlap the given bounding box.
    /// The enumerator can stop the query early by returning false.
    pub fn get_overlaps<TEnumerator: BreakableForEach<i32>>(
        &self,
        bounding_box: &BoundingBox,
        leaf_enumerator: &mut TEnumerator,
    ) {
        match self.leaf_count() {
            0 => {}
            1 => {
                debug_assert!(
                    self.node(0).a.is_leaf(),
                    "If the root only has one child, it must be a leaf."
                );
                if self.node(0).a.bounds().intersects(bounding_box) {
                    leaf_enumerator.loop_body(Self::encode(self.node(0).a.index));
                }
            }
            _ => {
                self.get_overlaps_internal(0, bounding_box, leaf_enumerator);
            }
        }
    }

    /// Collects all leaf indices whose bounds overlap the given box.
    pub fn overlapping_leaves(&self, bounding_box: &BoundingBox) -> Vec<i32> {
        let mut leaves = Vec::new();
        self.get_overlaps(bounding_box, &mut |leaf_index: i32| {
            leaves.push(leaf_index);
            true
        });
        leaves
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn grid_tree() -> (Tree, Vec<BoundingBox>) {
        let mut tree = Tree::new(64);
        let mut boxes = Vec::new();
        for x in 0..4 {
            for y in 0..4 {
                for z in 0..4 {
                    let p = Vec3::new(x as f32, y as f32, z as f32) * 2.0;
                    let b = BoundingBox::new(p, p + Vec3::ONE);
                    tree.add(b);
                    boxes.push(b);
                }
            }
        }
        (tree, boxes)
    }

    #[test]
    fn matches_brute_force() {
        let (tree, boxes) = grid_tree();
        let query = BoundingBox::new(Vec3::new(0.5, 1.5, -1.0), Vec3::new(4.5, 3.0, 2.0));
        let mut found = tree.overlapping_leaves(&query);
        found.sort_unstable();
        let expected: Vec<i32> = boxes
            .iter()
            .enumerate()
            .filter(|(_, b)| b.intersects(&query))
            .map(|(i, _)| i as i32)
            .collect();
        assert_eq!(found, expected);
    }

    #[test]
    fn early_exit_stops_traversal() {
        let (tree, _) = grid_tree();
        let everything = BoundingBox::new(Vec3::splat(-10.0), Vec3::splat(10.0));
        let mut visited = 0;
        tree.get_overlaps(&everything, &mut |_: i32| {
            visited += 1;
            visited < 3
        });
        assert_eq!(visited, 3);
    }

    #[test]
    fn single_leaf_and_empty_trees() {
        let mut tree = Tree::new(1);
        let query = BoundingBox::new(Vec3::ZERO, Vec3::ONE);
        assert!(tree.overlapping_leaves(&query).is_empty());
        tree.add(BoundingBox::new(Vec3::splat(0.5), Vec3::splat(2.0)));
        assert_eq!(tree.overlapping_leaves(&query), vec![0]);
    }
}
