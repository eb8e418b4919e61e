use std::cmp::Ordering;
use std::collections::BinaryHeap;

use glam::Vec3;

use super::tree::{Tree, TRAVERSAL_STACK_CAPACITY};

/// Tests the leaves a closest-point query reaches.
pub trait DistanceLeafTester {
    /// Tests a leaf against the query point.
    /// Lowering `maximum_distance` prunes every subtree farther away than the new value.
    fn test_leaf(&mut self, leaf_index: i32, maximum_distance: &mut f32);
}

impl<F: FnMut(i32, &mut f32)> DistanceLeafTester for F {
    #[inline(always)]
    fn test_leaf(&mut self, leaf_index: i32, maximum_distance: &mut f32) {
        self(leaf_index, maximum_distance)
    }
}

/// Heap entry ordered so that the nearest candidate pops first.
#[derive(Clone, Copy, Debug)]
struct Candidate {
    distance_squared: f32,
    index: i32,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .distance_squared
            .total_cmp(&self.distance_squared)
            .then_with(|| other.index.cmp(&self.index))
    }
}

impl Tree {
    /// Visits leaves in order of increasing bounds distance from `point`, skipping everything
    /// whose bounds are farther than the current `maximum_distance`.
    ///
    /// A tester that lowers `maximum_distance` to the exact distance of each leaf it accepts
    /// turns this into a nearest-neighbor search.
    pub fn find_closest<TTester: DistanceLeafTester>(
        &self,
        point: Vec3,
        maximum_distance: f32,
        leaf_tester: &mut TTester,
    ) {
        let mut maximum_distance = maximum_distance;
        let root = self.node(0);
        let child_count = self.leaf_count().min(2) as usize;
        let mut heap = BinaryHeap::with_capacity(TRAVERSAL_STACK_CAPACITY);
        for child in [&root.a, &root.b].into_iter().take(child_count) {
            heap.push(Candidate {
                distance_squared: child.bounds().distance_squared_to_point(point),
                index: child.index,
            });
        }

        while let Some(candidate) = heap.pop() {
            if candidate.distance_squared > maximum_distance * maximum_distance {
                // Everything left in the heap is at least this far away.
                return;
            }
            if candidate.index < 0 {
                leaf_tester.test_leaf(Self::encode(candidate.index), &mut maximum_distance);
            } else {
                let node = self.node(candidate.index);
                for child in [&node.a, &node.b] {
                    let distance_squared = child.bounds().distance_squared_to_point(point);
                    if distance_squared <= maximum_distance * maximum_distance {
                        heap.push(Candidate {
                            distance_squared,
                            index: child.index,
                        });
                    }
                }
            }
        }
    }

    /// Returns the leaf whose bounds are nearest to `point` within `maximum_distance`, with that distance.
    pub fn closest_leaf(&self, point: Vec3, maximum_distance: f32) -> Option<(i32, f32)> {
        let mut best = None;
        self.find_closest(point, maximum_distance, &mut |leaf_index: i32, maximum: &mut f32| {
            let distance = self.get_bounds(leaf_index).distance_squared_to_point(point).sqrt();
            if distance <= *maximum {
                *maximum = distance;
                best = Some((leaf_index, distance));
            }
        });
        best
    }
}
