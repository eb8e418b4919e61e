use glam::Vec3;

use crate::physics::collidables::CollisionObjectId;

/// A single contact between two objects.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Contact {
    /// World space position halfway between the two surfaces.
    pub position: Vec3,
    /// Unit contact normal pointing from object A to object B.
    pub normal: Vec3,
    /// Penetration depth along the normal. Negative values represent separation.
    pub penetration_depth: f32,
    /// Id of the feature of object A involved in the contact.
    pub feature_a: u32,
    /// Id of the feature of object B involved in the contact.
    pub feature_b: u32,
    /// Number of consecutive updates this contact has persisted for.
    pub lifetime: u32,
}

impl Contact {
    pub fn new(position: Vec3, normal: Vec3, penetration_depth: f32) -> Self {
        Self {
            position,
            normal,
            penetration_depth,
            feature_a: 0,
            feature_b: 0,
            lifetime: 0,
        }
    }

    pub fn with_features(mut self, feature_a: u32, feature_b: u32) -> Self {
        self.feature_a = feature_a;
        self.feature_b = feature_b;
        self
    }

    /// The contact point on the surface of object A.
    #[inline(always)]
    pub fn position_a(&self) -> Vec3 {
        self.position + self.normal * (self.penetration_depth * 0.5)
    }

    /// The contact point on the surface of object B.
    #[inline(always)]
    pub fn position_b(&self) -> Vec3 {
        self.position - self.normal * (self.penetration_depth * 0.5)
    }

    /// The same contact seen with A and B exchanged.
    #[inline(always)]
    pub fn swapped(&self) -> Self {
        Self {
            normal: -self.normal,
            feature_a: self.feature_b,
            feature_b: self.feature_a,
            ..*self
        }
    }
}

/// The contacts between two collision objects.
#[derive(Clone, Debug, PartialEq)]
pub struct ContactSet {
    pub object_a: CollisionObjectId,
    pub object_b: CollisionObjectId,
    /// Whether the objects touch. Can be true with no contacts, e.g. for triggers.
    pub have_contact: bool,
    contacts: Vec<Contact>,
}

impl ContactSet {
    pub fn new(object_a: CollisionObjectId, object_b: CollisionObjectId) -> Self {
        Self {
            object_a,
            object_b,
            have_contact: false,
            contacts: Vec::new(),
        }
    }

    #[inline(always)]
    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Contact> {
        self.contacts.iter()
    }

    /// Adds a contact. An existing contact closer than `position_tolerance` is replaced by the new one, which
    /// keeps the existing lifetime.
    pub fn add(&mut self, mut contact: Contact, position_tolerance: f32) {
        let tolerance_squared = position_tolerance * position_tolerance;
        match self
            .contacts
            .iter_mut()
            .find(|c| c.position.distance_squared(contact.position) <= tolerance_squared)
        {
            Some(existing) => {
                contact.lifetime = contact.lifetime.max(existing.lifetime);
                *existing = contact;
            }
            None => self.contacts.push(contact),
        }
    }

    /// Carries lifetimes over from an earlier set for the same pair. Contacts of this set with a predecessor
    /// closer than `position_tolerance` get the predecessor's lifetime plus one.
    pub fn inherit_lifetimes(&mut self, previous: &ContactSet, position_tolerance: f32) {
        let same_order = previous.object_a == self.object_a;
        let tolerance_squared = position_tolerance * position_tolerance;
        for contact in &mut self.contacts {
            let predecessor = previous.contacts.iter().find(|c| {
                let matches_direction = if same_order {
                    c.normal.dot(contact.normal) >= 0.0
                } else {
                    c.normal.dot(contact.normal) <= 0.0
                };
                matches_direction && c.position.distance_squared(contact.position) <= tolerance_squared
            });
            if let Some(predecessor) = predecessor {
                contact.lifetime = predecessor.lifetime + 1;
            }
        }
    }

    /// Exchanges objects A and B, flipping every normal and feature pair.
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.object_a, &mut self.object_b);
        for contact in &mut self.contacts {
            *contact = contact.swapped();
        }
    }

    pub fn clear(&mut self) {
        self.have_contact = false;
        self.contacts.clear();
    }

    /// Moves every contact of `other` into this set.
    pub fn extend_from(&mut self, other: &ContactSet, position_tolerance: f32) {
        for &contact in &other.contacts {
            self.add(contact, position_tolerance);
        }
        self.have_contact |= other.have_contact;
    }

    /// The contact with the largest penetration depth.
    pub fn deepest(&self) -> Option<&Contact> {
        self.contacts
            .iter()
            .max_by(|a, b| a.penetration_depth.total_cmp(&b.penetration_depth))
    }

    /// Removes contacts whose penetration depth is below `minimum_depth`.
    pub fn retain_deeper_than(&mut self, minimum_depth: f32) {
        self.contacts.retain(|c| c.penetration_depth >= minimum_depth);
    }

    /// Keeps at most `maximum_count` contacts: the deepest, the one farthest from it, then the ones spanning the
    /// largest area. The deepest contact ends up first.
    pub fn reduce(&mut self, maximum_count: usize) {
        if self.contacts.len() <= maximum_count {
            if let Some(deepest) = self.deepest_index() {
                self.contacts.swap(0, deepest);
            }
            return;
        }
        if maximum_count == 0 {
            self.contacts.clear();
            return;
        }

        let mut remaining = std::mem::take(&mut self.contacts);
        let mut kept = Vec::with_capacity(maximum_count);
        let pick = |remaining: &mut Vec<Contact>, kept: &mut Vec<Contact>, score: &dyn Fn(&[Contact], Vec3) -> f32| {
            let best = remaining
                .iter()
                .enumerate()
                .map(|(i, c)| (i, score(kept, c.position)))
                .max_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(i, _)| i);
            if let Some(i) = best {
                kept.push(remaining.swap_remove(i));
            }
        };

        let deepest = remaining
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.penetration_depth.total_cmp(&b.1.penetration_depth))
            .map(|(i, _)| i)
            .unwrap_or(0);
        kept.push(remaining.swap_remove(deepest));
        if kept.len() < maximum_count {
            pick(&mut remaining, &mut kept, &|kept, p| kept[0].position.distance_squared(p));
        }
        if kept.len() < maximum_count {
            pick(&mut remaining, &mut kept, &|kept, p| {
                (kept[1].position - kept[0].position).cross(p - kept[0].position).length_squared()
            });
        }
        if kept.len() < maximum_count {
            pick(&mut remaining, &mut kept, &|kept, p| {
                let [a, b, c] = [kept[0].position, kept[1].position, kept[2].position];
                (a - p).cross(b - p).length() + (b - p).cross(c - p).length() + (c - p).cross(a - p).length()
            });
        }
        while kept.len() < maximum_count && !remaining.is_empty() {
            pick(&mut remaining, &mut kept, &|kept, p| {
                kept.iter()
                    .map(|c| c.position.distance_squared(p))
                    .fold(f32::INFINITY, f32::min)
            });
        }
        self.contacts = kept;
    }

    fn deepest_index(&self) -> Option<usize> {
        self.contacts
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.penetration_depth.total_cmp(&b.1.penetration_depth))
            .map(|(i, _)| i)
    }
}

impl<'a> IntoIterator for &'a ContactSet {
    type Item = &'a Contact;
    type IntoIter = std::slice::Iter<'a, Contact>;

    fn into_iter(self) -> Self::IntoIter {
        self.contacts.iter()
    }
}
