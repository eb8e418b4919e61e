use glam::Vec3;

use super::tree::{Tree, TRAVERSAL_STACK_CAPACITY};

/// Tests rays against the leaves a tree ray cast reaches.
pub trait RayLeafTester {
    /// Tests a leaf for intersection with the ray.
    /// Lowering `maximum_t` prunes everything farther along the ray from the rest of the traversal.
    fn test_leaf(&mut self, leaf_index: i32, maximum_t: &mut f32);
}

impl<F: FnMut(i32, &mut f32)> RayLeafTester for F {
    #[inline(always)]
    fn test_leaf(&mut self, leaf_index: i32, maximum_t: &mut f32) {
        self(leaf_index, maximum_t)
    }
}

/// Ray representation designed for quicker intersection against axis aligned bounding boxes.
#[derive(Clone, Copy, Debug)]
pub struct TreeRay {
    pub origin_over_direction: Vec3,
    pub maximum_t: f32,
    pub inverse_direction: Vec3,
}

impl TreeRay {
    #[inline(always)]
    pub fn new(origin: Vec3, direction: Vec3, maximum_t: f32) -> Self {
        // Near zero direction components are clamped to a tiny nonzero value. Intervals computed with such an
        // inverse are enormous but never appear as results, since a parallel ray never hits the slab faces.
        // The sign is reintroduced in the numerator to compensate for the abs.
        let sign = Vec3::new(
            if direction.x < 0.0 { -1.0 } else { 1.0 },
            if direction.y < 0.0 { -1.0 } else { 1.0 },
            if direction.z < 0.0 { -1.0 } else { 1.0 },
        );
        let inverse_direction = sign / direction.abs().max(Vec3::splat(1e-15));
        Self {
            origin_over_direction: origin * inverse_direction,
            maximum_t,
            inverse_direction,
        }
    }

    /// Tests the ray against an AABB. Returns the entry t on a hit.
    #[inline(always)]
    pub fn intersects(&self, min: Vec3, max: Vec3) -> Option<f32> {
        let t0 = min * self.inverse_direction - self.origin_over_direction;
        let t1 = max * self.inverse_direction - self.origin_over_direction;
        let t_exit = t0.max(t1);
        let t_entry = t0.min(t1);
        let earliest_exit = self.maximum_t.min(t_exit.min_element());
        let t = t_entry.max_element().max(0.0);
        (t <= earliest_exit).then_some(t)
    }
}

impl Tree {
    fn ray_cast_node<TLeafTester: RayLeafTester>(
        &self,
        mut node_index: i32,
        tree_ray: &mut TreeRay,
        leaf_tester: &mut TLeafTester,
    ) {
        debug_assert!(self.leaf_count() >= 2, "This implementation assumes all nodes are filled.");

        // Deferred children remember their entry t; a shrunken maximum_t may make them unreachable.
        let mut stack: Vec<(i32, f32)> = Vec::with_capacity(TRAVERSAL_STACK_CAPACITY);
        let pop = |stack: &mut Vec<(i32, f32)>, maximum_t: f32| {
            while let Some((index, entry_t)) = stack.pop() {
                if entry_t <= maximum_t {
                    return Some(index);
                }
            }
            None
        };
        loop {
            if node_index < 0 {
                // This is actually a leaf node.
                leaf_tester.test_leaf(Self::encode(node_index), &mut tree_ray.maximum_t);
                match pop(&mut stack, tree_ray.maximum_t) {
                    Some(next) => node_index = next,
                    None => return,
                }
            } else {
                let node = self.node(node_index);
                let t_a = tree_ray.intersects(node.a.min, node.a.max);
                let t_b = tree_ray.intersects(node.b.min, node.b.max);
                match (t_a, t_b) {
                    (Some(t_a), Some(t_b)) => {
                        // Visit the earlier AABB intersection first.
                        if t_a < t_b {
                            node_index = node.a.index;
                            stack.push((node.b.index, t_b));
                        } else {
                            node_index = node.b.index;
                            stack.push((node.a.index, t_a));
                        }
                    }
                    (Some(_), None) => node_index = node.a.index,
                    (None, Some(_)) => node_index = node.b.index,
                    (None, None) => match pop(&mut stack, tree_ray.maximum_t) {
                        Some(next) => node_index = next,
                        None => return,
                    },
                }
            }
        }
    }

    /// Casts a ray through the tree, handing every leaf whose bounds the ray reaches to the tester.
    ///
    /// Nodes are visited near to far; a tester that lowers `maximum_t` on hits gets closest-hit behavior.
    pub fn ray_cast<TLeafTester: RayLeafTester>(
        &self,
        origin: Vec3,
        direction: Vec3,
        maximum_t: f32,
        leaf_tester: &mut TLeafTester,
    ) {
        let mut tree_ray = TreeRay::new(origin, direction, maximum_t);
        match self.leaf_count() {
            0 => {}
            1 => {
                let root = self.node(0);
                if tree_ray.intersects(root.a.min, root.a.max).is_some() {
                    leaf_tester.test_leaf(Self::encode(root.a.index), &mut tree_ray.maximum_t);
                }
            }
            _ => self.ray_cast_node(0, &mut tree_ray, leaf_tester),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utilities::bounding_box::BoundingBox;

    fn row() -> Tree {
        let mut tree = Tree::new(10);
        for i in 0..10 {
            let p = Vec3::new(i as f32 * 3.0, 0.0, 0.0);
            tree.add(BoundingBox::new(p, p + Vec3::ONE));
        }
        tree
    }

    #[test]
    fn aabb_slab_test() {
        let ray = TreeRay::new(Vec3::new(-1.0, 0.5, 0.5), Vec3::X, 100.0);
        assert_eq!(ray.intersects(Vec3::ZERO, Vec3::ONE), Some(1.0));
        assert_eq!(ray.intersects(Vec3::new(0.0, 2.0, 0.0), Vec3::new(1.0, 3.0, 1.0)), None);
        let short = TreeRay::new(Vec3::new(-1.0, 0.5, 0.5), Vec3::X, 0.5);
        assert_eq!(short.intersects(Vec3::ZERO, Vec3::ONE), None);
    }

    #[test]
    fn visits_every_leaf_along_the_ray() {
        let tree = row();
        let mut hits = Vec::new();
        tree.ray_cast(Vec3::new(-5.0, 0.5, 0.5), Vec3::X, 1000.0, &mut |leaf: i32, _: &mut f32| {
            hits.push(leaf)
        });
        hits.sort_unstable();
        assert_eq!(hits, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn shrinking_maximum_t_prunes_farther_leaves() {
        let tree = row();
        let mut hits = Vec::new();
        tree.ray_cast(Vec3::new(-5.0, 0.5, 0.5), Vec3::X, 1000.0, &mut |leaf: i32, t: &mut f32| {
            hits.push(leaf);
            let entry = tree.get_bounds(leaf).min.x + 5.0;
            *t = t.min(entry);
        });
        // The nearest leaf is reached first, after which everything else is beyond maximum_t.
        assert_eq!(hits, vec![0]);
    }

    #[test]
    fn missing_ray_visits_nothing() {
        let tree = row();
        let mut count = 0;
        tree.ray_cast(Vec3::new(-5.0, 5.0, 0.5), Vec3::X, 1000.0, &mut |_: i32, _: &mut f32| {
            count += 1
        });
        assert_eq!(count, 0);
    }
}
