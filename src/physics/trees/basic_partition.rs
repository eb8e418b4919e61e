use std::collections::BTreeMap;

use glam::Vec3;

use super::spatial_partition::{ordered_pair, sort_ray_hits, PartitionItem, SpatialPartition};
use crate::utilities::bounding_box::BoundingBox;

/// Brute force partition testing everything against everything.
///
/// Useful for tiny scenes and as the reference other partitions are checked against.
#[derive(Clone, Debug)]
pub struct BasicPartition<T: PartitionItem> {
    items: BTreeMap<T, BoundingBox>,
}

impl<T: PartitionItem> Default for BasicPartition<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: PartitionItem> BasicPartition<T> {
    pub fn new() -> Self {
        Self {
            items: BTreeMap::new(),
        }
    }
}

impl<T: PartitionItem> SpatialPartition<T> for BasicPartition<T> {
    fn insert(&mut self, item: T, bounds: BoundingBox) {
        self.items.insert(item, bounds);
    }

    fn remove(&mut self, item: T) -> bool {
        self.items.remove(&item).is_some()
    }

    fn update(&mut self, item: T, bounds: BoundingBox) -> bool {
        match self.items.get_mut(&item) {
            Some(existing) => {
                *existing = bounds;
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
    }

    fn bounds_of(&self, item: T) -> Option<BoundingBox> {
        self.items.get(&item).copied()
    }

    fn get_overlaps(&self, bounds: &BoundingBox) -> Vec<T> {
        self.items
            .iter()
            .filter(|(_, b)| b.intersects(bounds))
            .map(|(item, _)| *item)
            .collect()
    }

    fn get_self_overlaps(&self) -> Vec<(T, T)> {
        let entries: Vec<(&T, &BoundingBox)> = self.items.iter().collect();
        let mut pairs = Vec::new();
        for (i, (item_a, bounds_a)) in entries.iter().enumerate() {
            for (item_b, bounds_b) in &entries[i + 1..] {
                if bounds_a.intersects(bounds_b) {
                    pairs.push(ordered_pair(**item_a, **item_b));
                }
            }
        }
        pairs
    }

    fn ray_cast(&self, origin: Vec3, direction: Vec3, maximum_t: f32) -> Vec<T> {
        let hits = self
            .items
            .iter()
            .filter_map(|(item, b)| b.ray_intersection(origin, direction, maximum_t).map(|t| (t, *item)))
            .collect();
        sort_ray_hits(hits)
    }

    fn get_closest(&self, point: Vec3, maximum_distance: f32) -> Option<(T, f32)> {
        self.items
            .iter()
            .map(|(item, b)| (*item, b.distance_squared_to_point(point).sqrt()))
            .filter(|(_, distance)| *distance <= maximum_distance)
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }
}
