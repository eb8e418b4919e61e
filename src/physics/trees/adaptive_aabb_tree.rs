use std::collections::HashMap;

use glam::Vec3;
use log::debug;

use super::spatial_partition::{ordered_pair, sort_ray_hits, PartitionItem, SpatialPartition};
use super::tree::Tree;
use crate::config::CollisionSettings;
use crate::utilities::bounding_box::{BoundingBox, ContainmentType};

#[derive(Clone, Copy, Debug)]
struct ItemEntry {
    leaf_index: i32,
    bounds: BoundingBox,
}

/// Dynamic partition over a [`Tree`] whose leaves hold enlarged ("fat") bounds.
///
/// Small motions stay inside the fat bounds and never touch the tree. When incremental
/// changes have degraded the tree's SAH cost past `rebuild_cost_ratio` times the cost
/// measured after the last rebuild, [`SpatialPartition::optimize`] rebuilds it from scratch.
#[derive(Clone, Debug)]
pub struct AdaptiveAabbTree<T: PartitionItem> {
    tree: Tree,
    leaf_items: Vec<T>,
    items: HashMap<T, ItemEntry>,
    enlargement: f32,
    rebuild_cost_ratio: f32,
    baseline_cost: f32,
    rebuild_count: usize,
}

impl<T: PartitionItem> Default for AdaptiveAabbTree<T> {
    fn default() -> Self {
        Self::from_settings(&CollisionSettings::default())
    }
}

impl<T: PartitionItem> AdaptiveAabbTree<T> {
    pub fn new(enlargement: f32, rebuild_cost_ratio: f32) -> Self {
        debug_assert!(enlargement >= 0.0 && rebuild_cost_ratio >= 1.0);
        Self {
            tree: Tree::new(0),
            leaf_items: Vec::new(),
            items: HashMap::new(),
            enlargement,
            rebuild_cost_ratio,
            baseline_cost: 0.0,
            rebuild_count: 0,
        }
    }

    pub fn from_settings(settings: &CollisionSettings) -> Self {
        Self::new(settings.aabb_enlargement, settings.rebuild_cost_ratio)
    }

    /// The underlying tree. Leaf bounds are the enlarged bounds.
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Number of full rebuilds performed by [`SpatialPartition::optimize`] so far.
    pub fn rebuild_count(&self) -> usize {
        self.rebuild_count
    }

    /// Rebuilds the tree from the current fat bounds.
    pub fn rebuild(&mut self) {
        self.tree.rebuild();
        self.baseline_cost = self.tree.compute_cost();
        self.rebuild_count += 1;
        debug!(
            "Rebuilt adaptive AABB tree with {} leaves, cost {:.3}.",
            self.tree.leaf_count(),
            self.baseline_cost
        );
    }

    #[inline(always)]
    fn fat_bounds(&self, bounds: &BoundingBox) -> BoundingBox {
        bounds.expanded(self.enlargement)
    }

    fn remove_leaf(&mut self, leaf_index: i32) {
        if self.tree.remove_at(leaf_index).is_some() {
            // The tree moved its last leaf into the freed slot; mirror that.
            self.leaf_items.swap_remove(leaf_index as usize);
            let moved_item = self.leaf_items[leaf_index as usize];
            if let Some(entry) = self.items.get_mut(&moved_item) {
                entry.leaf_index = leaf_index;
            }
        } else {
            self.leaf_items.pop();
        }
    }
}

impl<T: PartitionItem> SpatialPartition<T> for AdaptiveAabbTree<T> {
    fn insert(&mut self, item: T, bounds: BoundingBox) {
        if self.update(item, bounds) {
            return;
        }
        let leaf_index = self.tree.add(self.fat_bounds(&bounds));
        debug_assert_eq!(leaf_index as usize, self.leaf_items.len());
        self.leaf_items.push(item);
        self.items.insert(item, ItemEntry { leaf_index, bounds });
    }

    fn remove(&mut self, item: T) -> bool {
        match self.items.remove(&item) {
            Some(entry) => {
                self.remove_leaf(entry.leaf_index);
                true
            }
            None => false,
        }
    }

    fn update(&mut self, item: T, bounds: BoundingBox) -> bool {
        let fat = self.fat_bounds(&bounds);
        let Some(entry) = self.items.get_mut(&item) else {
            return false;
        };
        entry.bounds = bounds;
        let leaf_index = entry.leaf_index;
        if self.tree.get_bounds(leaf_index).contains(&bounds) != ContainmentType::Contains {
            self.tree.update_bounds(leaf_index, fat);
        }
        true
    }

    fn contains(&self, item: T) -> bool {
        self.items.contains_key(&item)
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn clear(&mut self) {
        self.tree.clear();
        self.leaf_items.clear();
        self.items.clear();
        self.baseline_cost = 0.0;
    }

    fn bounds_of(&self, item: T) -> Option<BoundingBox> {
        self.items.get(&item).map(|entry| entry.bounds)
    }

    fn get_overlaps(&self, bounds: &BoundingBox) -> Vec<T> {
        let mut results = Vec::new();
        self.tree.get_overlaps(bounds, &mut |leaf_index: i32| {
            let item = self.leaf_items[leaf_index as usize];
            if self.items[&item].bounds.intersects(bounds) {
                results.push(item);
            }
            true
        });
        results
    }

    fn get_self_overlaps(&self) -> Vec<(T, T)> {
        let mut pairs = Vec::new();
        self.tree.get_self_overlaps(&mut |leaf_a: i32, leaf_b: i32| {
            let item_a = self.leaf_items[leaf_a as usize];
            let item_b = self.leaf_items[leaf_b as usize];
            if self.items[&item_a].bounds.intersects(&self.items[&item_b].bounds) {
                pairs.push(ordered_pair(item_a, item_b));
            }
        });
        pairs
    }

    fn ray_cast(&self, origin: Vec3, direction: Vec3, maximum_t: f32) -> Vec<T> {
        let mut hits = Vec::new();
        self.tree.ray_cast(origin, direction, maximum_t, &mut |leaf_index: i32, _: &mut f32| {
            let item = self.leaf_items[leaf_index as usize];
            if let Some(t) = self.items[&item].bounds.ray_intersection(origin, direction, maximum_t) {
                hits.push((t, item));
            }
        });
        sort_ray_hits(hits)
    }

    fn get_closest(&self, point: Vec3, maximum_distance: f32) -> Option<(T, f32)> {
        let mut best: Option<(T, f32)> = None;
        self.tree.find_closest(point, maximum_distance, &mut |leaf_index: i32, maximum: &mut f32| {
            let item = self.leaf_items[leaf_index as usize];
            let distance = self.items[&item].bounds.distance_squared_to_point(point).sqrt();
            let better = match best {
                Some((best_item, best_distance)) => {
                    distance < best_distance || (distance == best_distance && item < best_item)
                }
                None => distance <= *maximum,
            };
            if better {
                *maximum = distance;
                best = Some((item, distance));
            }
        });
        best
    }

    fn optimize(&mut self) {
        if self.tree.leaf_count() <= 2 {
            return;
        }
        let cost = self.tree.compute_cost();
        if self.baseline_cost <= 0.0 {
            self.baseline_cost = cost;
        } else if cost > self.baseline_cost * self.rebuild_cost_ratio {
            debug!(
                "Adaptive AABB tree cost {cost:.3} exceeds {:.1}x baseline {:.3}.",
                self.rebuild_cost_ratio, self.baseline_cost
            );
            self.rebuild();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::trees::basic_partition::BasicPartition;

    fn cube(p: Vec3, size: f32) -> BoundingBox {
        BoundingBox::new(p, p + Vec3::splat(size))
    }

    fn position(i: u32, frame: u32) -> Vec3 {
        let f = frame as f32;
        Vec3::new(
            (i * 37 % 23) as f32 + (f * 0.3 + i as f32).sin() * 2.0,
            (i * 11 % 17) as f32 + f * 0.1,
            (i * 5 % 7) as f32,
        )
    }

    fn sorted<T: Ord>(mut v: Vec<T>) -> Vec<T> {
        v.sort_unstable();
        v
    }

    #[test]
    fn matches_basic_partition_while_moving() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut adaptive = AdaptiveAabbTree::new(0.2, 1.5);
        let mut basic = BasicPartition::new();
        for i in 0..60u32 {
            adaptive.insert(i, cube(position(i, 0), 1.5));
            basic.insert(i, cube(position(i, 0), 1.5));
        }
        for frame in 1..20 {
            for i in 0..60u32 {
                if (i + frame) % 3 == 0 {
                    adaptive.update(i, cube(position(i, frame), 1.5));
                    basic.update(i, cube(position(i, frame), 1.5));
                }
            }
            if frame % 5 == 0 {
                adaptive.remove(frame);
                basic.remove(frame);
            }
            adaptive.optimize();
            adaptive.tree().validate().unwrap();

            assert_eq!(sorted(adaptive.get_self_overlaps()), sorted(basic.get_self_overlaps()));
            let query = cube(Vec3::new(5.0, 5.0, 1.0), 6.0);
            assert_eq!(sorted(adaptive.get_overlaps(&query)), sorted(basic.get_overlaps(&query)));
            let origin = Vec3::new(-5.0, 8.0, 2.0);
            let direction = Vec3::new(1.0, 0.2, 0.05).normalize();
            assert_eq!(
                adaptive.ray_cast(origin, direction, 50.0),
                basic.ray_cast(origin, direction, 50.0)
            );
            assert_eq!(adaptive.get_closest(origin, 100.0), basic.get_closest(origin, 100.0));
        }
        assert_eq!(adaptive.len(), basic.len());
    }

    #[test]
    fn small_motion_stays_inside_fat_bounds() {
        let mut adaptive = AdaptiveAabbTree::new(0.5, 2.0);
        adaptive.insert(7u32, cube(Vec3::ZERO, 1.0));
        let fat = adaptive.tree().get_bounds(0);
        adaptive.update(7, cube(Vec3::splat(0.25), 1.0));
        assert_eq!(adaptive.tree().get_bounds(0), fat);
        assert_eq!(adaptive.bounds_of(7), Some(cube(Vec3::splat(0.25), 1.0)));
        adaptive.update(7, cube(Vec3::splat(3.0), 1.0));
        assert_ne!(adaptive.tree().get_bounds(0), fat);
    }

    #[test]
    fn degraded_tree_gets_rebuilt() {
        let mut adaptive = AdaptiveAabbTree::new(0.0, 1.1);
        for i in 0..64u32 {
            adaptive.insert(i, cube(Vec3::new(i as f32, 0.0, 0.0), 1.0));
        }
        adaptive.optimize();
        // Scatter everything far from where the tree was built.
        for i in 0..64u32 {
            let scattered = Vec3::new(((i * 29) % 64) as f32 * 10.0, (i % 8) as f32 * 40.0, 0.0);
            adaptive.update(i, cube(scattered, 1.0));
        }
        adaptive.optimize();
        assert_eq!(adaptive.rebuild_count(), 1);
        adaptive.tree().validate().unwrap();
    }

    #[test]
    fn insert_of_existing_item_moves_it() {
        let mut adaptive = AdaptiveAabbTree::new(0.1, 2.0);
        adaptive.insert(1u32, cube(Vec3::ZERO, 1.0));
        adaptive.insert(1u32, cube(Vec3::splat(10.0), 1.0));
        assert_eq!(adaptive.len(), 1);
        assert_eq!(adaptive.get_overlaps(&cube(Vec3::ZERO, 1.0)), Vec::<u32>::new());
        adaptive.clear();
        assert!(adaptive.is_empty());
        assert!(adaptive.tree().is_empty());
    }
}
