use std::collections::HashMap;

use glam::Vec3;
use log::debug;

use super::spatial_partition::{ordered_pair, sort_ray_hits, PartitionItem, SpatialPartition};
use super::tree::Tree;
use super::tree_ray_cast::TreeRay;
use crate::utilities::bounding_box::BoundingBox;

const QUANTIZATION_MAX: f32 = u16::MAX as f32;

/// Quantized node in depth-first order.
///
/// `data >= 0` marks a leaf and holds its slot in the item list. Internal nodes store the
/// negated index of the first node after their subtree, so traversal can skip a subtree
/// without a stack.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct CompressedNode {
    min: [u16; 3],
    max: [u16; 3],
    data: i32,
}

impl CompressedNode {
    #[inline(always)]
    fn is_leaf(&self) -> bool {
        self.data >= 0
    }

    #[inline(always)]
    fn overlaps(&self, min: &[u16; 3], max: &[u16; 3]) -> bool {
        (0..3).all(|axis| self.min[axis] <= max[axis] && self.max[axis] >= min[axis])
    }

    /// Index of the next node once this node (and its subtree) has been handled or skipped.
    #[inline(always)]
    fn skip_to(&self, node_index: usize) -> usize {
        if self.is_leaf() {
            node_index + 1
        } else {
            (-self.data) as usize
        }
    }
}

/// Maps world coordinates into the 16 bit grid spanning the root bounds.
#[derive(Clone, Copy, Debug)]
struct Quantizer {
    origin: Vec3,
    scale: Vec3,
    inverse_scale: Vec3,
}

impl Quantizer {
    fn new(bounds: &BoundingBox) -> Self {
        let extents = bounds.max - bounds.min;
        let scale = Vec3::select(
            extents.cmpgt(Vec3::ZERO),
            Vec3::splat(QUANTIZATION_MAX) / extents,
            Vec3::ZERO,
        );
        let inverse_scale = Vec3::select(scale.cmpgt(Vec3::ZERO), Vec3::ONE / scale, Vec3::ZERO);
        Self {
            origin: bounds.min,
            scale,
            inverse_scale,
        }
    }

    /// Quantizes a box, rounding outward so the quantized box always contains the original.
    fn quantize(&self, bounds: &BoundingBox) -> ([u16; 3], [u16; 3]) {
        let min = ((bounds.min - self.origin) * self.scale).floor();
        let max = ((bounds.max - self.origin) * self.scale).ceil();
        let to_u16 = |v: f32| v.clamp(0.0, QUANTIZATION_MAX) as u16;
        (
            [to_u16(min.x), to_u16(min.y), to_u16(min.z)],
            [to_u16(max.x), to_u16(max.y), to_u16(max.z)],
        )
    }

    fn dequantize(&self, min: &[u16; 3], max: &[u16; 3]) -> BoundingBox {
        let to_vec = |q: &[u16; 3]| Vec3::new(q[0] as f32, q[1] as f32, q[2] as f32);
        let dequantized = BoundingBox::new(
            self.origin + to_vec(min) * self.inverse_scale,
            self.origin + to_vec(max) * self.inverse_scale,
        );
        // Float error in the round trip must not shrink the box.
        let magnitude = dequantized.min.abs().max(dequantized.max.abs()).max_element();
        dequantized.expanded(self.inverse_scale.max_element() * 0.5 + magnitude * 1e-6)
    }
}

/// Static partition with 16 bit quantized node bounds, built in one shot.
///
/// Edits only mark the partition dirty; the compact tree is rebuilt by
/// [`SpatialPartition::optimize`]. Queries against a dirty partition scan the exact item
/// bounds linearly, so results never depend on when the rebuild happens.
#[derive(Clone, Debug)]
pub struct CompressedAabbTree<T: PartitionItem> {
    items: HashMap<T, BoundingBox>,
    nodes: Vec<CompressedNode>,
    leaf_items: Vec<(T, BoundingBox)>,
    quantizer: Quantizer,
    dirty: bool,
}

impl<T: PartitionItem> Default for CompressedAabbTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: PartitionItem> CompressedAabbTree<T> {
    pub fn new() -> Self {
        Self {
            items: HashMap::new(),
            nodes: Vec::new(),
            leaf_items: Vec::new(),
            quantizer: Quantizer::new(&BoundingBox::new(Vec3::ZERO, Vec3::ZERO)),
            dirty: false,
        }
    }

    /// Builds a partition from a complete item set.
    pub fn from_items<I: IntoIterator<Item = (T, BoundingBox)>>(items: I) -> Self {
        let mut partition = Self::new();
        partition.items.extend(items);
        partition.build();
        partition
    }

    /// Whether edits are waiting for the next rebuild.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Number of quantized nodes, leaves included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn flatten(&mut self, tree: &Tree, node_index: i32) {
        let node = *tree.node(node_index);
        for child in [node.a, node.b] {
            let (min, max) = self.quantizer.quantize(&child.bounds());
            let slot = self.nodes.len();
            if child.is_leaf() {
                self.nodes.push(CompressedNode {
                    min,
                    max,
                    data: Tree::encode(child.index),
                });
            } else {
                self.nodes.push(CompressedNode { min, max, data: 0 });
                self.flatten(tree, child.index);
                self.nodes[slot].data = -(self.nodes.len() as i32);
            }
        }
    }

    /// Rebuilds the quantized tree from the current items.
    pub fn build(&mut self) {
        self.dirty = false;
        self.nodes.clear();
        self.leaf_items = self.items.iter().map(|(item, bounds)| (*item, *bounds)).collect();
        self.leaf_items.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        if self.leaf_items.is_empty() {
            return;
        }

        let bounds: Vec<BoundingBox> = self.leaf_items.iter().map(|(_, b)| *b).collect();
        let root_bounds = bounds.iter().fold(BoundingBox::empty(), |acc, b| acc.merged(b));
        self.quantizer = Quantizer::new(&root_bounds);

        let mut tree = Tree::new(bounds.len());
        tree.sweep_build(&bounds);
        if bounds.len() == 1 {
            let (min, max) = self.quantizer.quantize(&bounds[0]);
            self.nodes.push(CompressedNode { min, max, data: 0 });
        } else {
            self.nodes.reserve(2 * bounds.len() - 2);
            self.flatten(&tree, 0);
        }
        debug!(
            "Built compressed AABB tree: {} items, {} nodes.",
            self.leaf_items.len(),
            self.nodes.len()
        );
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Visits every leaf slot whose quantized bounds overlap the box.
    fn visit_overlaps<F: FnMut(usize)>(&self, bounds: &BoundingBox, mut visitor: F) {
        let (min, max) = self.quantizer.quantize(bounds);
        let mut node_index = 0;
        while node_index < self.nodes.len() {
            let node = &self.nodes[node_index];
            if node.overlaps(&min, &max) {
                if node.is_leaf() {
                    visitor(node.data as usize);
                }
                node_index += 1;
            } else {
                node_index = node.skip_to(node_index);
            }
        }
    }

    fn linear_scan(&self) -> impl Iterator<Item = (&T, &BoundingBox)> {
        self.items.iter()
    }
}

impl<T: PartitionItem> SpatialPartition<T> for CompressedAabbTree<T> {
    fn insert(&mut self, item: T, bounds: BoundingBox) {
        self.items.insert(item, bounds);
        self.mark_dirty();
    }

    fn remove(&mut self, item: T) -> bool {
        let removed = self.items.remove(&item).is_some();
        if removed {
            self.mark_dirty();
        }
        removed
    }

    fn update(&mut self, item: T, bounds: BoundingBox) -> bool {
        match self.items.get_mut(&item) {
            Some(existing) => {
                if *existing != bounds {
                    *existing = bounds;
                    self.mark_dirty();
                }
                true
            }
            None => false,
        }
    }

    fn contains(&self, item: T) -> bool {
        self.items.contains_key(&item)
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn clear(&mut self) {
        self.items.clear();
        self.nodes.clear();
        self.leaf_items.clear();
        self.dirty = false;
    }

    fn bounds_of(&self, item: T) -> Option<BoundingBox> {
        self.items.get(&item).copied()
    }

    fn get_overlaps(&self, bounds: &BoundingBox) -> Vec<T> {
        if self.dirty {
            return self
                .linear_scan()
                .filter(|(_, b)| b.intersects(bounds))
                .map(|(item, _)| *item)
                .collect();
        }
        let mut results = Vec::new();
        self.visit_overlaps(bounds, |slot| {
            let (item, item_bounds) = self.leaf_items[slot];
            if item_bounds.intersects(bounds) {
                results.push(item);
            }
        });
        results
    }

    fn get_self_overlaps(&self) -> Vec<(T, T)> {
        let mut pairs = Vec::new();
        if self.dirty {
            let entries: Vec<(&T, &BoundingBox)> = self.linear_scan().collect();
            for (i, (item_a, bounds_a)) in entries.iter().enumerate() {
                for (item_b, bounds_b) in &entries[i + 1..] {
                    if bounds_a.intersects(bounds_b) {
                        pairs.push(ordered_pair(**item_a, **item_b));
                    }
                }
            }
            return pairs;
        }
        for (slot_a, (item_a, bounds_a)) in self.leaf_items.iter().enumerate() {
            self.visit_overlaps(bounds_a, |slot_b| {
                // Each pair is found from both sides; keep the one found from the lower slot.
                if slot_b > slot_a {
                    let (item_b, bounds_b) = &self.leaf_items[slot_b];
                    if bounds_a.intersects(bounds_b) {
                        pairs.push(ordered_pair(*item_a, *item_b));
                    }
                }
            });
        }
        pairs
    }

    fn ray_cast(&self, origin: Vec3, direction: Vec3, maximum_t: f32) -> Vec<T> {
        let mut hits = Vec::new();
        if self.dirty {
            for (item, bounds) in self.linear_scan() {
                if let Some(t) = bounds.ray_intersection(origin, direction, maximum_t) {
                    hits.push((t, *item));
                }
            }
            return sort_ray_hits(hits);
        }
        let ray = TreeRay::new(origin, direction, maximum_t);
        let mut node_index = 0;
        while node_index < self.nodes.len() {
            let node = &self.nodes[node_index];
            let node_bounds = self.quantizer.dequantize(&node.min, &node.max);
            if ray.intersects(node_bounds.min, node_bounds.max).is_some() {
                if node.is_leaf() {
                    let (item, bounds) = self.leaf_items[node.data as usize];
                    if let Some(t) = bounds.ray_intersection(origin, direction, maximum_t) {
                        hits.push((t, item));
                    }
                }
                node_index += 1;
            } else {
                node_index = node.skip_to(node_index);
            }
        }
        sort_ray_hits(hits)
    }

    fn get_closest(&self, point: Vec3, maximum_distance: f32) -> Option<(T, f32)> {
        let mut best: Option<(T, f32)> = None;
        let consider = |item: T, bounds: &BoundingBox, best: &mut Option<(T, f32)>| {
            let distance = bounds.distance_squared_to_point(point).sqrt();
            let better = match *best {
                Some((best_item, best_distance)) => {
                    distance < best_distance || (distance == best_distance && item < best_item)
                }
                None => distance <= maximum_distance,
            };
            if better {
                *best = Some((item, distance));
            }
        };
        if self.dirty {
            for (item, bounds) in self.linear_scan() {
                consider(*item, bounds, &mut best);
            }
            return best;
        }
        let mut node_index = 0;
        while node_index < self.nodes.len() {
            let node = &self.nodes[node_index];
            let limit = best.map_or(maximum_distance, |(_, distance)| distance);
            let node_bounds = self.quantizer.dequantize(&node.min, &node.max);
            if node_bounds.distance_squared_to_point(point) <= limit * limit {
                if node.is_leaf() {
                    let (item, bounds) = self.leaf_items[node.data as usize];
                    consider(item, &bounds, &mut best);
                }
                node_index += 1;
            } else {
                node_index = node.skip_to(node_index);
            }
        }
        best
    }

    fn optimize(&mut self) {
        if self.dirty {
            self.build();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::trees::basic_partition::BasicPartition;
    use crate::utilities::bounding_box::ContainmentType;

    fn sorted<T: Ord>(mut v: Vec<T>) -> Vec<T> {
        v.sort_unstable();
        v
    }

    fn scene() -> Vec<(u32, BoundingBox)> {
        (0..80u32)
            .map(|i| {
                let p = Vec3::new(
                    (i * 37 % 29) as f32 * 1.3,
                    (i * 13 % 11) as f32 * 0.7 - 3.0,
                    (i % 6) as f32 * 2.1,
                );
                (i, BoundingBox::new(p, p + Vec3::new(1.0, 0.4 + (i % 3) as f32, 0.9)))
            })
            .collect()
    }

    fn check_against_basic(compressed: &CompressedAabbTree<u32>, basic: &BasicPartition<u32>) {
        assert_eq!(sorted(compressed.get_self_overlaps()), sorted(basic.get_self_overlaps()));
        for query in [
            BoundingBox::new(Vec3::new(3.0, -2.0, 0.0), Vec3::new(9.0, 1.0, 5.0)),
            BoundingBox::new(Vec3::splat(-100.0), Vec3::splat(-99.0)),
        ] {
            assert_eq!(sorted(compressed.get_overlaps(&query)), sorted(basic.get_overlaps(&query)));
        }
        let origin = Vec3::new(-3.0, 0.0, 4.0);
        let direction = Vec3::new(1.0, -0.1, 0.02).normalize();
        assert_eq!(compressed.ray_cast(origin, direction, 60.0), basic.ray_cast(origin, direction, 60.0));
        for point in [origin, Vec3::new(12.0, 12.0, 12.0)] {
            assert_eq!(compressed.get_closest(point, 50.0), basic.get_closest(point, 50.0));
        }
    }

    #[test]
    fn quantization_rounds_outward() {
        let root = BoundingBox::new(Vec3::new(-10.0, 0.0, 3.0), Vec3::new(10.0, 1.0, 3.0));
        let quantizer = Quantizer::new(&root);
        let inner = BoundingBox::new(Vec3::new(-3.3, 0.123, 3.0), Vec3::new(7.77, 0.5, 3.0));
        let (min, max) = quantizer.quantize(&inner);
        let dequantized = quantizer.dequantize(&min, &max);
        assert_eq!(dequantized.contains(&inner), ContainmentType::Contains);
        // Flat axes collapse to zero instead of dividing by zero.
        assert_eq!((min[2], max[2]), (0, 0));
    }

    #[test]
    fn built_tree_matches_basic_partition() {
        let items = scene();
        let compressed = CompressedAabbTree::from_items(items.iter().copied());
        let mut basic = BasicPartition::new();
        for (item, bounds) in &items {
            basic.insert(*item, *bounds);
        }
        assert!(!compressed.is_dirty());
        assert_eq!(compressed.node_count(), 2 * items.len() - 2);
        check_against_basic(&compressed, &basic);
    }

    #[test]
    fn edits_are_visible_before_and_after_rebuild() {
        let items = scene();
        let mut compressed = CompressedAabbTree::from_items(items.iter().copied());
        let mut basic = BasicPartition::new();
        for (item, bounds) in &items {
            basic.insert(*item, *bounds);
        }
        for i in (0..80u32).step_by(7) {
            let moved = BoundingBox::new(Vec3::new(i as f32, 1.0, 1.0), Vec3::new(i as f32 + 2.0, 2.0, 2.0));
            compressed.update(i, moved);
            basic.update(i, moved);
        }
        compressed.remove(3);
        basic.remove(3);
        compressed.insert(1000, BoundingBox::new(Vec3::ZERO, Vec3::splat(4.0)));
        basic.insert(1000, BoundingBox::new(Vec3::ZERO, Vec3::splat(4.0)));
        assert!(compressed.is_dirty());
        check_against_basic(&compressed, &basic);
        compressed.optimize();
        assert!(!compressed.is_dirty());
        check_against_basic(&compressed, &basic);
    }

    #[test]
    fn single_item_and_empty() {
        let mut compressed = CompressedAabbTree::new();
        assert!(compressed.get_overlaps(&BoundingBox::new(Vec3::ZERO, Vec3::ONE)).is_empty());
        compressed.insert(5u32, BoundingBox::new(Vec3::ONE, Vec3::splat(2.0)));
        compressed.optimize();
        assert_eq!(compressed.node_count(), 1);
        assert_eq!(compressed.get_overlaps(&BoundingBox::new(Vec3::ZERO, Vec3::ONE)), vec![5]);
        assert_eq!(compressed.get_closest(Vec3::ZERO, 10.0).map(|(item, _)| item), Some(5));
        assert!(compressed.get_self_overlaps().is_empty());
    }
}
