use super::leaf::Leaf;
use super::node::{Metanode, Node, NodeChild};
use super::tree::Tree;
use crate::utilities::bounding_box::BoundingBox;

/// Best split found along one axis: the sorted leaf order and where to cut it.
struct AxisPartition {
    order: Vec<i32>,
    split_index: usize,
    cost: f32,
    a: BoundingBox,
    b: BoundingBox,
}

struct SweepResources<'a> {
    bounds: &'a [BoundingBox],
    centroids: Vec<[f32; 3]>,
    merged: Vec<BoundingBox>,
}

impl Tree {
    fn find_partition_for_axis(
        leaves: &mut SweepResources,
        index_map: &[i32],
        axis: usize,
    ) -> AxisPartition {
        let count = index_map.len();
        debug_assert!(count > 1);

        let mut order = index_map.to_vec();
        order.sort_by(|a, b| {
            leaves.centroids[*a as usize][axis].total_cmp(&leaves.centroids[*b as usize][axis])
        });

        // Sweep across from low to high, caching the merged size at each point.
        leaves.merged.clear();
        let mut a_merged = leaves.bounds[order[0] as usize];
        leaves.merged.push(a_merged);
        for &index in &order[1..count - 1] {
            a_merged = a_merged.merged(&leaves.bounds[index as usize]);
            leaves.merged.push(a_merged);
        }

        // Sweep from high to low.
        let mut b_merged = BoundingBox::empty();
        let mut best = AxisPartition {
            order: Vec::new(),
            split_index: 0,
            cost: f32::MAX,
            a: BoundingBox::empty(),
            b: BoundingBox::empty(),
        };
        for i in (1..count).rev() {
            b_merged = b_merged.merged(&leaves.bounds[order[i] as usize]);
            // The slight superlinear count penalty favors balanced splits when metrics tie.
            let a_count = i as f32;
            let b_count = (count - i) as f32;
            let a_cost = a_count
                * (1.0 + a_count * 0.001)
                * (f32::MIN_POSITIVE + leaves.merged[i - 1].surface_metric());
            let b_cost =
                b_count * (1.0 + b_count * 0.001) * (f32::MIN_POSITIVE + b_merged.surface_metric());
            let total_cost = a_cost + b_cost;
            if total_cost < best.cost {
                best.cost = total_cost;
                best.split_index = i;
                best.a = leaves.merged[i - 1];
                best.b = b_merged;
            }
        }
        best.order = order;
        best
    }

    fn child_for_range(
        &mut self,
        leaves: &mut SweepResources,
        index_map: &mut [i32],
        bounds: BoundingBox,
        node_index: i32,
        slot: i32,
    ) -> NodeChild {
        if index_map.len() == 1 {
            let leaf_index = index_map[0];
            self.leaves[leaf_index as usize] = Leaf::new(node_index, slot);
            NodeChild::leaf(bounds, leaf_index)
        } else {
            let child_index = self.create_sweep_builder_node(node_index, slot, leaves, index_map);
            NodeChild::internal(bounds, child_index, index_map.len() as i32)
        }
    }

    fn create_sweep_builder_node(
        &mut self,
        parent_index: i32,
        index_in_parent: i32,
        leaves: &mut SweepResources,
        index_map: &mut [i32],
    ) -> i32 {
        debug_assert!(index_map.len() >= 2);
        let node_index = self.allocate_node();
        *self.metanode_mut(node_index) = Metanode {
            parent: parent_index,
            index_in_parent,
        };

        let best = (0..3)
            .map(|axis| Self::find_partition_for_axis(leaves, index_map, axis))
            .min_by(|x, y| x.cost.total_cmp(&y.cost));
        let Some(best) = best else {
            return node_index;
        };
        index_map.copy_from_slice(&best.order);
        let (range_a, range_b) = index_map.split_at_mut(best.split_index);

        let a = self.child_for_range(leaves, range_a, best.a, node_index, 0);
        let b = self.child_for_range(leaves, range_b, best.b, node_index, 1);
        let node = self.node_mut(node_index);
        node.a = a;
        node.b = b;
        node_index
    }

    /// Discards the current topology and builds the tree top-down from the given leaf bounds,
    /// choosing every split by a surface area heuristic sweep over sorted centroids.
    ///
    /// Leaf `i` of the rebuilt tree has bounds `leaf_bounds[i]`.
    pub fn sweep_build(&mut self, leaf_bounds: &[BoundingBox]) {
        self.clear();
        self.leaves.resize(leaf_bounds.len(), Leaf::new(0, 0));
        match leaf_bounds.len() {
            0 => {}
            1 => {
                *self.node_mut(0) = Node {
                    a: NodeChild::leaf(leaf_bounds[0], 0),
                    b: NodeChild::default(),
                }
            }
            count => {
                // The root is created again by the build.
                self.nodes.clear();
                self.metanodes.clear();
                let mut leaves = SweepResources {
                    bounds: leaf_bounds,
                    centroids: leaf_bounds
                        .iter()
                        .map(|b| (b.min + b.max).to_array())
                        .collect(),
                    merged: Vec::with_capacity(count),
                };
                let mut index_map: Vec<i32> = (0..count as i32).collect();
                self.create_sweep_builder_node(-1, -1, &mut leaves, &mut index_map);
            }
        }
    }

    /// Rebuilds the whole tree from its current leaf bounds, keeping every leaf index stable.
    pub fn rebuild(&mut self) {
        let bounds: Vec<BoundingBox> = (0..self.leaf_count()).map(|i| self.get_bounds(i)).collect();
        self.sweep_build(&bounds);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn bounds(count: i32) -> Vec<BoundingBox> {
        (0..count)
            .map(|i| {
                let p = Vec3::new(i as f32, (i * 3 % 7) as f32, (i * 5 % 3) as f32);
                BoundingBox::new(p, p + Vec3::splat(0.75))
            })
            .collect()
    }

    #[test]
    fn sweep_build_produces_valid_tree() {
        for count in [0, 1, 2, 3, 17, 128] {
            let boxes = bounds(count);
            let mut tree = Tree::new(0);
            tree.sweep_build(&boxes);
            tree.validate().unwrap();
            assert_eq!(tree.leaf_count(), count);
            assert_eq!(tree.node_count(), (count - 1).max(1));
            for (i, b) in boxes.iter().enumerate() {
                assert_eq!(tree.get_bounds(i as i32), *b);
            }
        }
    }

    #[test]
    fn rebuild_keeps_leaf_indices_and_query_results() {
        let boxes = bounds(256);
        let mut tree = Tree::new(0);
        for b in &boxes {
            tree.add_without_refinement(*b);
        }
        tree.rebuild();
        tree.validate().unwrap();
        for (i, b) in boxes.iter().enumerate() {
            assert_eq!(tree.get_bounds(i as i32), *b);
        }
        let query = BoundingBox::new(Vec3::new(10.0, 0.0, 0.0), Vec3::new(40.0, 3.0, 3.0));
        let mut found = tree.overlapping_leaves(&query);
        found.sort_unstable();
        let expected: Vec<i32> = (0..256).filter(|&i| boxes[i as usize].intersects(&query)).collect();
        assert_eq!(found, expected);
    }
}
