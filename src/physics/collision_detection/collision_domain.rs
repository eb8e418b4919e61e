use std::collections::BTreeMap;
use std::sync::Arc;

use glam::Vec3;
use log::{debug, trace};

use super::broad_phase::{BroadPhase, CollisionFilter};
use super::closest_points::closest_contact;
use super::collision_algorithms::CollisionAlgorithmMatrix;
use super::contact_manifold::ContactSet;
use super::narrow_phase::NarrowPhase;
use crate::config::CollisionSettings;
use crate::error::{CollisionError, Result};
use crate::physics::collidables::{CollisionObject, CollisionObjectId, Shape};
use crate::physics::rigid_pose::RigidPose;
use crate::physics::trees::AdaptiveAabbTree;
use crate::utilities::bounding_box::BoundingBox;

/// A ray hit reported by [`CollisionDomain::ray_cast`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayCastHit {
    pub object: CollisionObjectId,
    pub t: f32,
    pub position: Vec3,
    /// World space surface normal, pointing out of the hit shape.
    pub normal: Vec3,
}

/// A set of collision objects with a broad phase, a narrow phase and the contact sets of the last update.
///
/// Mutations only mark objects dirty; [`CollisionDomain::update`] refreshes the partition and recomputes the
/// contact sets.
#[derive(Debug)]
pub struct CollisionDomain {
    settings: CollisionSettings,
    objects: BTreeMap<CollisionObjectId, CollisionObject>,
    next_id: u32,
    filter: CollisionFilter,
    broad_phase: BroadPhase<AdaptiveAabbTree<CollisionObjectId>>,
    narrow_phase: NarrowPhase,
    /// Whether the cached contact sets reflect the current objects and filter.
    up_to_date: bool,
    update_count: u64,
}

impl Default for CollisionDomain {
    fn default() -> Self {
        Self::new(CollisionSettings::default())
    }
}

impl CollisionDomain {
    pub fn new(settings: CollisionSettings) -> Self {
        Self {
            broad_phase: BroadPhase::new(AdaptiveAabbTree::from_settings(&settings)),
            narrow_phase: NarrowPhase::new(&settings),
            settings,
            objects: BTreeMap::new(),
            next_id: 0,
            filter: CollisionFilter::new(),
            up_to_date: true,
            update_count: 0,
        }
    }

    pub fn settings(&self) -> &CollisionSettings {
        &self.settings
    }

    pub fn filter(&self) -> &CollisionFilter {
        &self.filter
    }

    /// Mutable access to the filter. The cached contact sets count as stale afterwards.
    pub fn filter_mut(&mut self) -> &mut CollisionFilter {
        self.up_to_date = false;
        &mut self.filter
    }

    pub fn algorithms(&self) -> &CollisionAlgorithmMatrix {
        self.narrow_phase.algorithms()
    }

    /// Mutable access to the algorithm matrix. The cached contact sets count as stale afterwards.
    pub fn algorithms_mut(&mut self) -> &mut CollisionAlgorithmMatrix {
        self.up_to_date = false;
        self.narrow_phase.algorithms_mut()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Objects in id order.
    pub fn objects(&self) -> impl Iterator<Item = &CollisionObject> {
        self.objects.values()
    }

    pub fn object(&self, id: CollisionObjectId) -> Option<&CollisionObject> {
        self.objects.get(&id)
    }

    fn object_mut(&mut self, id: CollisionObjectId) -> Result<&mut CollisionObject> {
        self.objects.get_mut(&id).ok_or(CollisionError::UnknownObject(id))
    }

    fn get(&self, id: CollisionObjectId) -> Result<&CollisionObject> {
        self.objects.get(&id).ok_or(CollisionError::UnknownObject(id))
    }

    fn touch(&mut self, id: CollisionObjectId) {
        self.broad_phase.mark_dirty(id);
        self.up_to_date = false;
    }

    /// Creates an object for a shape at a pose and adds it.
    pub fn add(&mut self, shape: impl Into<Arc<Shape>>, pose: RigidPose) -> Result<CollisionObjectId> {
        let object = CollisionObject::new(shape.into(), pose)?;
        Ok(self.add_object(object))
    }

    /// Adds an object and assigns it a fresh id.
    pub fn add_object(&mut self, mut object: CollisionObject) -> CollisionObjectId {
        let id = CollisionObjectId(self.next_id);
        self.next_id += 1;
        object.set_id(id);
        self.objects.insert(id, object);
        self.touch(id);
        trace!("Added collision object {:?}.", id);
        id
    }

    /// Removes an object, dropping its cached contact sets.
    pub fn remove(&mut self, id: CollisionObjectId) -> Result<CollisionObject> {
        let mut object = self.objects.remove(&id).ok_or(CollisionError::UnknownObject(id))?;
        self.touch(id);
        self.narrow_phase.forget(id);
        object.set_id(CollisionObjectId::UNASSIGNED);
        Ok(object)
    }

    pub fn set_pose(&mut self, id: CollisionObjectId, pose: RigidPose) -> Result<()> {
        self.object_mut(id)?.set_pose(pose)?;
        self.touch(id);
        Ok(())
    }

    pub fn set_shape(&mut self, id: CollisionObjectId, shape: impl Into<Arc<Shape>>) -> Result<()> {
        self.object_mut(id)?.set_shape(shape.into());
        self.touch(id);
        Ok(())
    }

    pub fn set_enabled(&mut self, id: CollisionObjectId, enabled: bool) -> Result<()> {
        self.object_mut(id)?.enabled = enabled;
        self.touch(id);
        Ok(())
    }

    pub fn set_collision_group(&mut self, id: CollisionObjectId, collision_group: u32) -> Result<()> {
        self.object_mut(id)?.collision_group = collision_group;
        self.touch(id);
        Ok(())
    }

    /// Removes every object.
    pub fn clear(&mut self) {
        self.objects.clear();
        self.broad_phase.clear();
        self.narrow_phase.clear();
        self.up_to_date = true;
    }

    /// Pushes changed bounds into the broad phase, then recomputes the contact sets of all candidate pairs.
    pub fn update(&mut self, delta_time: f32) {
        let dirty = self.broad_phase.dirty_count();
        let pairs = self.broad_phase.update(&self.objects, &self.filter);
        self.narrow_phase.update(&pairs, &self.objects, &self.settings);
        self.up_to_date = true;
        self.update_count += 1;
        debug!(
            "Collision domain update {} (dt {:.4}): {} objects, {} dirty, {} candidate pairs, {} contact sets.",
            self.update_count,
            delta_time,
            self.objects.len(),
            dirty,
            pairs.len(),
            self.narrow_phase.contact_sets().len()
        );
    }

    /// Contact sets of the last update, sorted by object pair. Every set has contact.
    pub fn contact_sets(&self) -> &[ContactSet] {
        self.narrow_phase.contact_sets()
    }

    /// Cached contact sets involving the object, from the last update.
    pub fn contacts_of(&self, id: CollisionObjectId) -> impl Iterator<Item = &ContactSet> {
        self.contact_sets()
            .iter()
            .filter(move |set| set.object_a == id || set.object_b == id)
    }

    /// Whether two objects touch. Uses the cached result when the domain is unchanged since the last update.
    pub fn have_contact(&self, a: CollisionObjectId, b: CollisionObjectId) -> Result<bool> {
        let (object_a, object_b) = (self.get(a)?, self.get(b)?);
        if self.up_to_date {
            return Ok(self.narrow_phase.find(a, b).is_some_and(|set| set.have_contact));
        }
        if !self.filter.can_collide(object_a, object_b) {
            return Ok(false);
        }
        Ok(self.algorithms().have_contact(
            object_a.shape(),
            object_a.pose(),
            object_b.shape(),
            object_b.pose(),
            &self.settings,
        ))
    }

    /// Computes the contact set of two objects now, with `a` as object A. Filtered pairs get an empty set.
    pub fn get_contacts(&self, a: CollisionObjectId, b: CollisionObjectId) -> Result<ContactSet> {
        let (object_a, object_b) = (self.get(a)?, self.get(b)?);
        if !self.filter.can_collide(object_a, object_b) {
            return Ok(ContactSet::new(a, b));
        }
        Ok(NarrowPhase::compute_pair(self.algorithms(), object_a, object_b, &self.settings))
    }

    /// The closest points of two objects. Separated objects get a single contact whose penetration depth is the
    /// negative distance; touching objects get their regular contact set. When no closest pair can be measured the
    /// pair algorithm still runs.
    pub fn get_closest_points(&self, a: CollisionObjectId, b: CollisionObjectId) -> Result<ContactSet> {
        let (object_a, object_b) = (self.get(a)?, self.get(b)?);
        let mut contacts = ContactSet::new(a, b);
        let closest = closest_contact(
            object_a.shape(),
            object_a.pose(),
            object_b.shape(),
            object_b.pose(),
            &self.settings,
        );
        if let Some(separated) = closest.filter(|c| c.penetration_depth < 0.0) {
            contacts.add(separated, self.settings.contact_position_tolerance);
            return Ok(contacts);
        }
        self.algorithms().compute_collision(
            object_a.shape(),
            object_a.pose(),
            object_b.shape(),
            object_b.pose(),
            &self.settings,
            &mut contacts,
        );
        if let Some(closest) = closest.filter(|_| contacts.is_empty()) {
            contacts.add(closest, self.settings.contact_position_tolerance);
            contacts.have_contact = true;
        }
        Ok(contacts)
    }

    /// Casts a ray against every enabled object. Hits are sorted by `t`.
    pub fn ray_cast(&self, origin: Vec3, direction: Vec3, maximum_t: f32) -> Vec<RayCastHit> {
        let mut hits: Vec<RayCastHit> = self
            .broad_phase
            .ray_cast(origin, direction, maximum_t, &self.objects)
            .into_iter()
            .filter_map(|(id, _)| {
                let object = self.objects.get(&id)?;
                let hit = object.shape().ray_test(object.pose(), origin, direction, maximum_t)?;
                Some(RayCastHit {
                    object: id,
                    t: hit.t,
                    position: origin + direction * hit.t,
                    normal: hit.normal,
                })
            })
            .collect();
        hits.sort_by(|a, b| a.t.total_cmp(&b.t).then_with(|| a.object.cmp(&b.object)));
        hits
    }

    /// Enabled objects whose bounds overlap a box, sorted by id.
    pub fn query_overlaps(&self, bounds: &BoundingBox) -> Vec<CollisionObjectId> {
        self.broad_phase.query_overlaps(bounds, &self.objects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::collidables::CollisionObjectKind;
    use approx::assert_relative_eq;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn stack() -> (CollisionDomain, CollisionObjectId, CollisionObjectId) {
        let mut domain = CollisionDomain::default();
        let ground = domain.add(Shape::plane(Vec3::Y, 0.0).unwrap(), RigidPose::IDENTITY).unwrap();
        let cube = domain
            .add(Shape::cuboid(Vec3::splat(0.5)).unwrap(), RigidPose::from_position(Vec3::Y * 0.45))
            .unwrap();
        (domain, ground, cube)
    }

    #[test]
    fn update_caches_contact_sets() {
        init_logging();
        let (mut domain, ground, cube) = stack();
        let ball = domain.add(Shape::sphere(0.5).unwrap(), RigidPose::from_position(Vec3::new(5.0, 3.0, 0.0))).unwrap();
        domain.update(1.0 / 60.0);

        assert_eq!(domain.contact_sets().len(), 1);
        let set = &domain.contact_sets()[0];
        assert_eq!((set.object_a, set.object_b), (ground, cube));
        assert_eq!(set.len(), 4);
        for contact in set {
            assert_relative_eq!(contact.normal, Vec3::Y);
            assert_relative_eq!(contact.penetration_depth, 0.05, epsilon = 1e-5);
        }
        assert!(domain.have_contact(cube, ground).unwrap());
        assert!(!domain.have_contact(ball, ground).unwrap());
        assert_eq!(domain.contacts_of(cube).count(), 1);
        assert_eq!(domain.contacts_of(ball).count(), 0);
    }

    #[test]
    fn stale_queries_compute_on_demand() {
        let (mut domain, ground, cube) = stack();
        domain.update(0.0);
        domain.set_pose(cube, RigidPose::from_position(Vec3::Y * 2.0)).unwrap();
        assert!(!domain.have_contact(ground, cube).unwrap());
        assert!(domain.get_contacts(ground, cube).unwrap().is_empty());
        // The cache keeps the old sets until the next update.
        assert_eq!(domain.contact_sets().len(), 1);
        domain.update(0.0);
        assert!(domain.contact_sets().is_empty());
    }

    #[test]
    fn lifetimes_grow_while_resting() {
        let (mut domain, _, _) = stack();
        for _ in 0..3 {
            domain.update(1.0 / 60.0);
        }
        assert!(domain.contact_sets()[0].iter().all(|contact| contact.lifetime == 2));
    }

    #[test]
    fn closest_points_of_separated_objects() {
        let (mut domain, ground, cube) = stack();
        domain.set_pose(cube, RigidPose::from_position(Vec3::Y * 3.0)).unwrap();
        let closest = domain.get_closest_points(ground, cube).unwrap();
        assert!(!closest.have_contact);
        assert_eq!(closest.len(), 1);
        assert_relative_eq!(closest.contacts()[0].penetration_depth, -2.5, epsilon = 1e-5);

        domain.set_pose(cube, RigidPose::from_position(Vec3::Y * 0.45)).unwrap();
        let touching = domain.get_closest_points(ground, cube).unwrap();
        assert!(touching.have_contact);
        assert_eq!(touching.len(), 4);
    }

    #[test]
    fn unknown_ids_are_errors() {
        let (mut domain, ground, cube) = stack();
        domain.remove(cube).unwrap();
        assert!(matches!(domain.have_contact(ground, cube), Err(CollisionError::UnknownObject(id)) if id == cube));
        assert!(domain.set_pose(cube, RigidPose::IDENTITY).is_err());
        assert!(domain.remove(cube).is_err());
        domain.update(0.0);
        assert!(domain.contact_sets().is_empty());
    }

    #[test]
    fn filters_and_triggers() {
        let (mut domain, ground, cube) = stack();
        domain.set_collision_group(cube, 2).unwrap();
        domain.filter_mut().set(0, 2, false);
        domain.update(0.0);
        assert!(domain.contact_sets().is_empty());
        assert!(!domain.have_contact(ground, cube).unwrap());

        domain.filter_mut().reset();
        let sensor = CollisionObject::new(
            Arc::new(Shape::sphere(1.0).unwrap()),
            RigidPose::from_position(Vec3::new(0.0, 1.0, 0.0)),
        )
        .unwrap()
        .with_kind(CollisionObjectKind::Trigger);
        let sensor = domain.add_object(sensor);
        domain.update(0.0);
        let sensor_set = domain.contacts_of(sensor).find(|set| set.object_a == cube || set.object_b == cube).unwrap();
        assert!(sensor_set.have_contact && sensor_set.is_empty());

        domain.set_enabled(sensor, false).unwrap();
        domain.update(0.0);
        assert_eq!(domain.contacts_of(sensor).count(), 0);
    }

    #[test]
    fn ray_cast_and_overlap_queries() {
        let (mut domain, ground, cube) = stack();
        let hits = domain.ray_cast(Vec3::new(0.0, 10.0, 0.0), -Vec3::Y, 100.0);
        assert_eq!(hits.iter().map(|hit| hit.object).collect::<Vec<_>>(), vec![cube, ground]);
        assert_relative_eq!(hits[0].t, 10.0 - 0.95, epsilon = 1e-5);
        assert_relative_eq!(hits[0].normal, Vec3::Y, epsilon = 1e-5);
        assert_relative_eq!(hits[1].position, Vec3::ZERO, epsilon = 1e-5);

        let region = BoundingBox::new(Vec3::new(-0.1, 0.8, -0.1), Vec3::new(0.1, 1.0, 0.1));
        assert_eq!(domain.query_overlaps(&region), vec![cube]);
        domain.set_enabled(cube, false).unwrap();
        assert!(domain.query_overlaps(&region).is_empty());
    }

    #[test]
    fn closest_points_of_concentric_spheres() {
        let mut domain = CollisionDomain::default();
        let center = RigidPose::from_position(Vec3::new(1.0, 2.0, 3.0));
        let outer = domain.add(Shape::sphere(1.0).unwrap(), center).unwrap();
        let inner = domain.add(Shape::sphere(0.5).unwrap(), center).unwrap();
        let contacts = domain.get_closest_points(outer, inner).unwrap();
        assert!(contacts.have_contact);
        assert!(!contacts.is_empty());
        assert_relative_eq!(contacts.deepest().unwrap().penetration_depth, 1.5, epsilon = 1e-3);
    }

    #[test]
    fn sphere_centered_in_triangle_plane_collides() {
        init_logging();
        let mut domain = CollisionDomain::default();
        let triangle = Shape::triangle(Vec3::new(-1.0, 0.0, -1.0), Vec3::new(-1.0, 0.0, 1.0), Vec3::new(1.0, 0.0, 0.0));
        let triangle = domain.add(triangle.unwrap(), RigidPose::IDENTITY).unwrap();
        let ball = domain.add(Shape::sphere(0.5).unwrap(), RigidPose::from_position(Vec3::new(-0.2, 0.0, 0.0))).unwrap();
        domain.update(1.0 / 60.0);
        assert!(domain.have_contact(triangle, ball).unwrap());
        let set = domain.contacts_of(ball).next().unwrap();
        assert!(!set.is_empty());
        assert_relative_eq!(set.deepest().unwrap().penetration_depth, 0.5, epsilon = 1e-2);
    }
}

