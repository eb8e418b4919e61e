use std::collections::{BTreeMap, BTreeSet, HashSet};

use glam::Vec3;
use log::trace;

use crate::physics::collidables::{CollisionObject, CollisionObjectId};
use crate::physics::trees::{AdaptiveAabbTree, SpatialPartition};
use crate::utilities::bounding_box::BoundingBox;

/// Decides which objects may collide, by per-object enabled flags and a table of disabled group pairs.
#[derive(Clone, Debug, Default)]
pub struct CollisionFilter {
    disabled_group_pairs: HashSet<(u32, u32)>,
}

impl CollisionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    fn key(group_a: u32, group_b: u32) -> (u32, u32) {
        (group_a.min(group_b), group_a.max(group_b))
    }

    /// Enables or disables collisions between two groups. The setting is symmetric.
    pub fn set(&mut self, group_a: u32, group_b: u32, enabled: bool) {
        let key = Self::key(group_a, group_b);
        if enabled {
            self.disabled_group_pairs.remove(&key);
        } else {
            self.disabled_group_pairs.insert(key);
        }
    }

    pub fn is_enabled(&self, group_a: u32, group_b: u32) -> bool {
        !self.disabled_group_pairs.contains(&Self::key(group_a, group_b))
    }

    /// Whether two objects may produce contacts.
    pub fn can_collide(&self, a: &CollisionObject, b: &CollisionObject) -> bool {
        a.enabled && b.enabled && a.id() != b.id() && self.is_enabled(a.collision_group, b.collision_group)
    }

    /// Enables every group pair again.
    pub fn reset(&mut self) {
        self.disabled_group_pairs.clear();
    }
}

/// Proposes candidate pairs from a spatial partition over the objects' bounds.
///
/// Bound changes are only pushed into the partition on [`BroadPhase::update`]; objects marked dirty in between are
/// tested directly by the queries so results never go stale.
#[derive(Debug)]
pub struct BroadPhase<P = AdaptiveAabbTree<CollisionObjectId>>
where
    P: SpatialPartition<CollisionObjectId>,
{
    partition: P,
    dirty: BTreeSet<CollisionObjectId>,
}

impl<P: SpatialPartition<CollisionObjectId> + Default> Default for BroadPhase<P> {
    fn default() -> Self {
        Self::new(P::default())
    }
}

impl<P: SpatialPartition<CollisionObjectId>> BroadPhase<P> {
    pub fn new(partition: P) -> Self {
        Self {
            partition,
            dirty: BTreeSet::new(),
        }
    }

    pub fn partition(&self) -> &P {
        &self.partition
    }

    /// Records that an object was added, moved, reshaped or removed since the last update.
    pub fn mark_dirty(&mut self, id: CollisionObjectId) {
        self.dirty.insert(id);
    }

    pub fn is_dirty(&self, id: CollisionObjectId) -> bool {
        self.dirty.contains(&id)
    }

    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    /// Pushes the dirty objects into the partition and returns the candidate pairs, normalized to `a < b` and sorted.
    pub fn update(
        &mut self,
        objects: &BTreeMap<CollisionObjectId, CollisionObject>,
        filter: &CollisionFilter,
    ) -> Vec<(CollisionObjectId, CollisionObjectId)> {
        let dirty = std::mem::take(&mut self.dirty);
        trace!("Broad phase pushing {} dirty objects.", dirty.len());
        for id in dirty {
            match objects.get(&id) {
                Some(object) => self.partition.insert(id, object.bounds()),
                None => {
                    self.partition.remove(id);
                }
            }
        }
        self.partition.optimize();

        let mut pairs: Vec<(CollisionObjectId, CollisionObjectId)> = self
            .partition
            .get_self_overlaps()
            .into_iter()
            .filter_map(|(a, b)| {
                let (a, b) = if a < b { (a, b) } else { (b, a) };
                let (object_a, object_b) = (objects.get(&a)?, objects.get(&b)?);
                filter.can_collide(object_a, object_b).then_some((a, b))
            })
            .collect();
        pairs.sort_unstable();
        pairs.dedup();
        pairs
    }

    /// Enabled objects whose bounds overlap `bounds`, sorted by id.
    pub fn query_overlaps(
        &self,
        bounds: &BoundingBox,
        objects: &BTreeMap<CollisionObjectId, CollisionObject>,
    ) -> Vec<CollisionObjectId> {
        let mut found: Vec<CollisionObjectId> = self
            .partition
            .get_overlaps(bounds)
            .into_iter()
            .filter(|id| !self.dirty.contains(id))
            .chain(self.dirty.iter().copied())
            .filter(|id| {
                objects
                    .get(id)
                    .is_some_and(|object| object.enabled && object.bounds().intersects(bounds))
            })
            .collect();
        found.sort_unstable();
        found.dedup();
        found
    }

    /// Enabled objects whose bounds the ray reaches, with their entry t along the ray, nearest first.
    pub fn ray_cast(
        &self,
        origin: Vec3,
        direction: Vec3,
        maximum_t: f32,
        objects: &BTreeMap<CollisionObjectId, CollisionObject>,
    ) -> Vec<(CollisionObjectId, f32)> {
        let mut found: Vec<(CollisionObjectId, f32)> = self
            .partition
            .ray_cast(origin, direction, maximum_t)
            .into_iter()
            .filter(|id| !self.dirty.contains(id))
            .chain(self.dirty.iter().copied())
            .filter_map(|id| {
                let object = objects.get(&id).filter(|object| object.enabled)?;
                let t = object.bounds().ray_intersection(origin, direction, maximum_t)?;
                Some((id, t))
            })
            .collect();
        found.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        found
    }

    /// Drops every object from the partition.
    pub fn clear(&mut self) {
        self.partition.clear();
        self.dirty.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::collidables::Shape;
    use crate::physics::rigid_pose::RigidPose;
    use crate::physics::trees::BasicPartition;
    use std::sync::Arc;

    fn world(positions: &[Vec3]) -> BTreeMap<CollisionObjectId, CollisionObject> {
        let shape = Arc::new(Shape::sphere(0.5).unwrap());
        positions
            .iter()
            .enumerate()
            .map(|(i, &p)| {
                let mut object = CollisionObject::new(shape.clone(), RigidPose::from_position(p)).unwrap();
                object.set_id(CollisionObjectId(i as u32));
                (object.id(), object)
            })
            .collect()
    }

    fn mark_all<P: SpatialPartition<CollisionObjectId>>(
        broad_phase: &mut BroadPhase<P>,
        objects: &BTreeMap<CollisionObjectId, CollisionObject>,
    ) {
        for &id in objects.keys() {
            broad_phase.mark_dirty(id);
        }
    }

    #[test]
    fn pairs_are_sorted_and_normalized() {
        let objects = world(&[Vec3::ZERO, Vec3::new(0.8, 0.0, 0.0), Vec3::new(10.0, 0.0, 0.0), Vec3::new(-0.8, 0.0, 0.0)]);
        let mut broad_phase = BroadPhase::<AdaptiveAabbTree<CollisionObjectId>>::default();
        mark_all(&mut broad_phase, &objects);
        let pairs = broad_phase.update(&objects, &CollisionFilter::new());
        let id = CollisionObjectId;
        assert_eq!(pairs, vec![(id(0), id(1)), (id(0), id(3))]);
        assert_eq!(broad_phase.dirty_count(), 0);
    }

    #[test]
    fn filter_disables_groups_and_objects() {
        let mut objects = world(&[Vec3::ZERO, Vec3::new(0.5, 0.0, 0.0), Vec3::new(0.0, 0.5, 0.0)]);
        objects.get_mut(&CollisionObjectId(1)).unwrap().collision_group = 3;
        objects.get_mut(&CollisionObjectId(2)).unwrap().enabled = false;
        let mut filter = CollisionFilter::new();
        filter.set(3, 0, false);
        assert!(!filter.is_enabled(0, 3));

        let mut broad_phase = BroadPhase::new(BasicPartition::default());
        mark_all(&mut broad_phase, &objects);
        assert!(broad_phase.update(&objects, &filter).is_empty());

        filter.set(0, 3, true);
        mark_all(&mut broad_phase, &objects);
        let pairs = broad_phase.update(&objects, &filter);
        assert_eq!(pairs, vec![(CollisionObjectId(0), CollisionObjectId(1))]);
    }

    #[test]
    fn queries_see_dirty_objects_before_the_update() {
        let mut objects = world(&[Vec3::ZERO, Vec3::new(5.0, 0.0, 0.0)]);
        let mut broad_phase = BroadPhase::<AdaptiveAabbTree<CollisionObjectId>>::default();
        mark_all(&mut broad_phase, &objects);
        broad_phase.update(&objects, &CollisionFilter::new());

        let moved = CollisionObjectId(1);
        objects
            .get_mut(&moved)
            .unwrap()
            .set_pose(RigidPose::from_position(Vec3::new(0.0, 5.0, 0.0)))
            .unwrap();
        broad_phase.mark_dirty(moved);

        let query = BoundingBox::new(Vec3::new(-1.0, 4.0, -1.0), Vec3::new(1.0, 6.0, 1.0));
        assert_eq!(broad_phase.query_overlaps(&query, &objects), vec![moved]);
        let hits = broad_phase.ray_cast(Vec3::new(0.0, 10.0, 0.0), -Vec3::Y, 100.0, &objects);
        assert_eq!(hits.iter().map(|h| h.0).collect::<Vec<_>>(), vec![moved, CollisionObjectId(0)]);
        assert!((hits[0].1 - 4.5).abs() < 1e-5);
    }

    #[test]
    fn removed_objects_leave_the_partition() {
        let mut objects = world(&[Vec3::ZERO, Vec3::new(0.5, 0.0, 0.0)]);
        let mut broad_phase = BroadPhase::<AdaptiveAabbTree<CollisionObjectId>>::default();
        mark_all(&mut broad_phase, &objects);
        assert_eq!(broad_phase.update(&objects, &CollisionFilter::new()).len(), 1);
        objects.remove(&CollisionObjectId(1));
        broad_phase.mark_dirty(CollisionObjectId(1));
        assert!(broad_phase.update(&objects, &CollisionFilter::new()).is_empty());
        assert_eq!(broad_phase.partition().len(), 1);
    }
}
