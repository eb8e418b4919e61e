use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use log::{debug, trace};

use super::collision_algorithms::CollisionAlgorithmMatrix;
use super::contact_manifold::ContactSet;
use crate::config::CollisionSettings;
use crate::physics::collidables::{CollisionObject, CollisionObjectId};
use crate::utilities::thread_dispatcher::{JobCounter, ScopedThreadDispatcher, ThreadDispatcher};

type PairKey = (CollisionObjectId, CollisionObjectId);

/// Turns candidate pairs into contact sets and keeps the sets of the last update.
#[derive(Debug)]
pub struct NarrowPhase {
    algorithms: CollisionAlgorithmMatrix,
    dispatcher: ScopedThreadDispatcher,
    contact_sets: Vec<ContactSet>,
    set_indices: HashMap<PairKey, usize>,
}

impl NarrowPhase {
    pub fn new(settings: &CollisionSettings) -> Self {
        Self {
            algorithms: CollisionAlgorithmMatrix::default(),
            dispatcher: ScopedThreadDispatcher::new(settings.resolved_worker_count()),
            contact_sets: Vec::new(),
            set_indices: HashMap::new(),
        }
    }

    pub fn algorithms(&self) -> &CollisionAlgorithmMatrix {
        &self.algorithms
    }

    pub fn algorithms_mut(&mut self) -> &mut CollisionAlgorithmMatrix {
        &mut self.algorithms
    }

    /// Contact sets of the last update, in candidate pair order. Every set has contact.
    pub fn contact_sets(&self) -> &[ContactSet] {
        &self.contact_sets
    }

    /// The cached set of a pair, in either order.
    pub fn find(&self, a: CollisionObjectId, b: CollisionObjectId) -> Option<&ContactSet> {
        let key = if a < b { (a, b) } else { (b, a) };
        self.set_indices.get(&key).map(|&index| &self.contact_sets[index])
    }

    /// Drops every cached set involving the object.
    pub fn forget(&mut self, id: CollisionObjectId) {
        self.contact_sets.retain(|set| set.object_a != id && set.object_b != id);
        self.rebuild_indices();
    }

    pub fn clear(&mut self) {
        self.contact_sets.clear();
        self.set_indices.clear();
    }

    fn rebuild_indices(&mut self) {
        self.set_indices = self
            .contact_sets
            .iter()
            .enumerate()
            .map(|(index, set)| ((set.object_a, set.object_b), index))
            .collect();
    }

    /// Computes the contact set of two objects. Triggers only report `have_contact`.
    pub fn compute_pair(
        algorithms: &CollisionAlgorithmMatrix,
        a: &CollisionObject,
        b: &CollisionObject,
        settings: &CollisionSettings,
    ) -> ContactSet {
        let mut contacts = ContactSet::new(a.id(), b.id());
        if a.is_trigger() || b.is_trigger() {
            contacts.have_contact = algorithms.have_contact(a.shape(), a.pose(), b.shape(), b.pose(), settings);
        } else {
            algorithms.compute_collision(a.shape(), a.pose(), b.shape(), b.pose(), settings, &mut contacts);
        }
        contacts
    }

    /// Runs the pair testers over the candidate pairs and replaces the cached sets.
    ///
    /// Contacts matching a contact of the previous set for the same pair keep aging.
    pub fn update(
        &mut self,
        pairs: &[PairKey],
        objects: &BTreeMap<CollisionObjectId, CollisionObject>,
        settings: &CollisionSettings,
    ) {
        let algorithms = &self.algorithms;
        let compute = |&(a, b): &PairKey| -> Option<ContactSet> {
            let set = Self::compute_pair(algorithms, objects.get(&a)?, objects.get(&b)?, settings);
            trace!("Pair {:?}-{:?}: {} contacts.", a, b, set.len());
            set.have_contact.then_some(set)
        };

        let mut sets: Vec<ContactSet> = if pairs.len() >= settings.parallel_pair_threshold
            && self.dispatcher.thread_count() > 1
        {
            let counter = JobCounter::new();
            let results: Mutex<Vec<(usize, ContactSet)>> = Mutex::new(Vec::with_capacity(pairs.len()));
            self.dispatcher.dispatch_workers(
                |_| {
                    let mut local = Vec::new();
                    while let Some(index) = counter.claim(pairs.len()) {
                        if let Some(set) = compute(&pairs[index]) {
                            local.push((index, set));
                        }
                    }
                    match results.lock() {
                        Ok(mut results) => results.extend(local),
                        Err(poisoned) => poisoned.into_inner().extend(local),
                    }
                },
                pairs.len(),
            );
            let mut results = results.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());
            results.sort_unstable_by_key(|(index, _)| *index);
            results.into_iter().map(|(_, set)| set).collect()
        } else {
            pairs.iter().filter_map(compute).collect()
        };

        for set in &mut sets {
            if let Some(previous) = self.find(set.object_a, set.object_b) {
                set.inherit_lifetimes(previous, settings.contact_position_tolerance);
            }
        }
        debug!(
            "Narrow phase tested {} pairs, {} with contact.",
            pairs.len(),
            sets.len()
        );
        self.contact_sets = sets;
        self.rebuild_indices();
    }
}
