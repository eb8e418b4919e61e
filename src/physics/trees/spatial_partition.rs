use std::fmt::Debug;
use std::hash::Hash;

use glam::Vec3;

use crate::utilities::bounding_box::BoundingBox;

/// Keys stored in a spatial partition.
pub trait PartitionItem: Copy + Eq + Hash + Ord + Debug + Send + Sync {}

impl<T: Copy + Eq + Hash + Ord + Debug + Send + Sync> PartitionItem for T {}

/// An item-keyed spatial index over axis-aligned bounding boxes.
///
/// Query results are exact with respect to the bounds last handed to the partition,
/// whatever representation (enlarged, quantized, stale) the implementation keeps internally.
pub trait SpatialPartition<T: PartitionItem>: Send + Sync {
    /// Adds an item, or moves it if it is already present.
    fn insert(&mut self, item: T, bounds: BoundingBox);

    /// Removes an item. Returns false if the item was not present.
    fn remove(&mut self, item: T) -> bool;

    /// Changes the bounds of an existing item. Returns false if the item was not present.
    fn update(&mut self, item: T, bounds: BoundingBox) -> bool;

    fn contains(&self, item: T) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&mut self);

    /// Bounds last given for the item.
    fn bounds_of(&self, item: T) -> Option<BoundingBox>;

    /// Items whose bounds overlap `bounds`. Touching counts as overlapping.
    fn get_overlaps(&self, bounds: &BoundingBox) -> Vec<T>;

    /// Every unordered pair of overlapping items, each reported exactly once and never paired with itself.
    fn get_self_overlaps(&self) -> Vec<(T, T)>;

    /// Items whose bounds the ray reaches within `maximum_t`, nearest entry first.
    fn ray_cast(&self, origin: Vec3, direction: Vec3, maximum_t: f32) -> Vec<T>;

    /// The item whose bounds are nearest to `point`, if any lies within `maximum_distance`.
    fn get_closest(&self, point: Vec3, maximum_distance: f32) -> Option<(T, f32)>;

    /// Gives the partition a chance to restructure itself. Called once per broad phase update.
    fn optimize(&mut self) {}
}

/// Sorts ray cast candidates by entry t, breaking ties by item for deterministic output.
pub(crate) fn sort_ray_hits<T: PartitionItem>(mut hits: Vec<(f32, T)>) -> Vec<T> {
    hits.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    hits.into_iter().map(|(_, item)| item).collect()
}

/// Orders a pair so the smaller item comes first.
#[inline(always)]
pub(crate) fn ordered_pair<T: PartitionItem>(a: T, b: T) -> (T, T) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}
