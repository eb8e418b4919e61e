//! Pair testers producing contact sets for two posed shapes, and the matrix dispatching shape pairs to them.

use std::fmt;
use std::sync::Arc;

use glam::Vec3;
use log::trace;

use super::contact_manifold::{Contact, ContactSet};
use crate::config::CollisionSettings;
use crate::physics::collidables::{CollisionObjectId, Shape, ShapeType};
use crate::physics::rigid_pose::RigidPose;

pub mod capsule_pair_tester;
pub mod composite_tester;
pub mod convex_pair_tester;
pub mod height_field_tester;
pub mod plane_convex_tester;
pub mod sphere_box_tester;
pub mod sphere_capsule_tester;
pub mod sphere_pair_tester;

pub use capsule_pair_tester::CapsulePairTester;
pub use composite_tester::CompositeTester;
pub use convex_pair_tester::ConvexPairTester;
pub use height_field_tester::HeightFieldTester;
pub use plane_convex_tester::PlaneConvexTester;
pub use sphere_box_tester::SphereBoxTester;
pub use sphere_capsule_tester::SphereCapsuleTester;
pub use sphere_pair_tester::SpherePairTester;

/// State shared by the testers of one collision query.
#[derive(Clone, Copy)]
pub struct CollisionContext<'a> {
    pub settings: &'a CollisionSettings,
    /// Used by testers of non-convex shapes to dispatch their child pairs.
    pub algorithms: &'a CollisionAlgorithmMatrix,
}

impl<'a> CollisionContext<'a> {
    pub fn new(settings: &'a CollisionSettings, algorithms: &'a CollisionAlgorithmMatrix) -> Self {
        Self { settings, algorithms }
    }

    /// Adds a contact if it is deep enough to count, honoring the contact margin.
    #[inline(always)]
    pub fn add_contact(&self, contacts: &mut ContactSet, contact: Contact) {
        if contact.penetration_depth >= -self.settings.contact_margin {
            contacts.add(contact, self.settings.contact_position_tolerance);
        }
    }

    /// Reduces the set to the configured size and derives `have_contact`.
    pub fn finish(&self, contacts: &mut ContactSet) {
        contacts.reduce(self.settings.max_contacts_per_set);
        contacts.have_contact = !contacts.is_empty();
    }
}

/// Computes contacts between two shapes of fixed types.
///
/// Contacts written to the set use object A's perspective: normals point from A to B.
pub trait CollisionAlgorithm: Send + Sync {
    fn compute_collision(
        &self,
        a: &Shape,
        pose_a: &RigidPose,
        b: &Shape,
        pose_b: &RigidPose,
        context: &CollisionContext,
        contacts: &mut ContactSet,
    );

    /// Whether the shapes touch. Testers with a cheaper boolean test override this.
    fn have_contact(&self, a: &Shape, pose_a: &RigidPose, b: &Shape, pose_b: &RigidPose, context: &CollisionContext) -> bool {
        let mut contacts = ContactSet::new(CollisionObjectId::UNASSIGNED, CollisionObjectId::UNASSIGNED);
        self.compute_collision(a, pose_a, b, pose_b, context, &mut contacts);
        contacts.have_contact
    }

    fn name(&self) -> &'static str;
}

#[derive(Clone)]
enum MatrixEntry {
    Unsupported,
    Direct(Arc<dyn CollisionAlgorithm>),
    /// The algorithm expects the shapes in the opposite order.
    Swapped(Arc<dyn CollisionAlgorithm>),
}

/// Table of collision algorithms indexed by the shape types of a pair.
#[derive(Clone)]
pub struct CollisionAlgorithmMatrix {
    entries: Vec<MatrixEntry>,
}

impl fmt::Debug for CollisionAlgorithmMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for a in ShapeType::ALL {
            for b in ShapeType::ALL {
                if let Some((algorithm, swapped)) = self.get(a, b) {
                    map.entry(&(a, b), &(algorithm.name(), swapped));
                }
            }
        }
        map.finish()
    }
}

impl Default for CollisionAlgorithmMatrix {
    fn default() -> Self {
        let mut matrix = Self::empty();
        let convex_pair: Arc<dyn CollisionAlgorithm> = Arc::new(ConvexPairTester);
        let convex_types: Vec<ShapeType> = ShapeType::ALL.into_iter().filter(|t| t.is_convex()).collect();
        for &a in &convex_types {
            for &b in &convex_types {
                matrix.set(a, b, convex_pair.clone());
            }
        }
        matrix.set(ShapeType::Sphere, ShapeType::Sphere, Arc::new(SpherePairTester));
        matrix.set(ShapeType::Sphere, ShapeType::Box, Arc::new(SphereBoxTester));
        matrix.set(ShapeType::Sphere, ShapeType::Capsule, Arc::new(SphereCapsuleTester));
        matrix.set(ShapeType::Capsule, ShapeType::Capsule, Arc::new(CapsulePairTester));

        let plane: Arc<dyn CollisionAlgorithm> = Arc::new(PlaneConvexTester);
        let height_field: Arc<dyn CollisionAlgorithm> = Arc::new(HeightFieldTester);
        for &convex in &convex_types {
            matrix.set(ShapeType::Plane, convex, plane.clone());
            matrix.set(ShapeType::HeightField, convex, height_field.clone());
        }
        let composite: Arc<dyn CollisionAlgorithm> = Arc::new(CompositeTester);
        for other in ShapeType::ALL {
            matrix.set(ShapeType::Composite, other, composite.clone());
        }
        matrix
    }
}

impl CollisionAlgorithmMatrix {
    /// A matrix without any algorithms.
    pub fn empty() -> Self {
        Self {
            entries: vec![MatrixEntry::Unsupported; ShapeType::COUNT * ShapeType::COUNT],
        }
    }

    #[inline(always)]
    fn slot(a: ShapeType, b: ShapeType) -> usize {
        a.index() * ShapeType::COUNT + b.index()
    }

    /// Registers an algorithm for shapes of type `a` against shapes of type `b`. The mirrored pair is served by
    /// the same algorithm with the arguments exchanged.
    pub fn set(&mut self, a: ShapeType, b: ShapeType, algorithm: Arc<dyn CollisionAlgorithm>) {
        self.entries[Self::slot(a, b)] = MatrixEntry::Direct(algorithm.clone());
        if a != b {
            self.entries[Self::slot(b, a)] = MatrixEntry::Swapped(algorithm);
        }
    }

    /// Removes the algorithm of a pair in both orders.
    pub fn clear(&mut self, a: ShapeType, b: ShapeType) {
        self.entries[Self::slot(a, b)] = MatrixEntry::Unsupported;
        self.entries[Self::slot(b, a)] = MatrixEntry::Unsupported;
    }

    /// The algorithm of a pair and whether it is applied with the shapes swapped.
    pub fn get(&self, a: ShapeType, b: ShapeType) -> Option<(&Arc<dyn CollisionAlgorithm>, bool)> {
        match &self.entries[Self::slot(a, b)] {
            MatrixEntry::Unsupported => None,
            MatrixEntry::Direct(algorithm) => Some((algorithm, false)),
            MatrixEntry::Swapped(algorithm) => Some((algorithm, true)),
        }
    }

    pub fn supports(&self, a: ShapeType, b: ShapeType) -> bool {
        self.get(a, b).is_some()
    }

    /// Computes the contacts of a pair into `contacts`, which should be empty. Unsupported pairs leave it empty.
    pub fn compute_collision(
        &self,
        a: &Shape,
        pose_a: &RigidPose,
        b: &Shape,
        pose_b: &RigidPose,
        settings: &CollisionSettings,
        contacts: &mut ContactSet,
    ) {
        let context = CollisionContext::new(settings, self);
        self.dispatch(a, pose_a, b, pose_b, &context, contacts);
    }

    /// Like [`CollisionAlgorithmMatrix::compute_collision`] for testers that already hold a context.
    pub fn dispatch(
        &self,
        a: &Shape,
        pose_a: &RigidPose,
        b: &Shape,
        pose_b: &RigidPose,
        context: &CollisionContext,
        contacts: &mut ContactSet,
    ) {
        match self.get(a.shape_type(), b.shape_type()) {
            None => trace!("No collision algorithm for {:?} vs {:?}.", a.shape_type(), b.shape_type()),
            Some((algorithm, false)) => algorithm.compute_collision(a, pose_a, b, pose_b, context, contacts),
            Some((algorithm, true)) => {
                contacts.swap();
                algorithm.compute_collision(b, pose_b, a, pose_a, context, contacts);
                contacts.swap();
            }
        }
    }

    pub fn have_contact(
        &self,
        a: &Shape,
        pose_a: &RigidPose,
        b: &Shape,
        pose_b: &RigidPose,
        settings: &CollisionSettings,
    ) -> bool {
        let context = CollisionContext::new(settings, self);
        match self.get(a.shape_type(), b.shape_type()) {
            None => false,
            Some((algorithm, false)) => algorithm.have_contact(a, pose_a, b, pose_b, &context),
            Some((algorithm, true)) => algorithm.have_contact(b, pose_b, a, pose_a, &context),
        }
    }
}

/// Builds the contact for two surface points and a normal from A to B.
#[inline(always)]
pub(crate) fn contact_from_surface_points(point_a: Vec3, point_b: Vec3, normal: Vec3) -> Contact {
    Contact::new((point_a + point_b) * 0.5, normal, (point_a - point_b).dot(normal))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matrix_coverage() {
        let matrix = CollisionAlgorithmMatrix::default();
        for a in ShapeType::ALL {
            for b in ShapeType::ALL {
                let unbounded = |t: ShapeType| matches!(t, ShapeType::Plane | ShapeType::HeightField);
                let expected = !(unbounded(a) && unbounded(b));
                assert_eq!(matrix.supports(a, b), expected, "{a:?} vs {b:?}");
            }
        }
        let (algorithm, swapped) = matrix.get(ShapeType::Box, ShapeType::Sphere).unwrap();
        assert_eq!(algorithm.name(), "SphereBoxTester");
        assert!(swapped);
    }

    #[test]
    fn swapped_dispatch_reports_from_first_object() {
        let matrix = CollisionAlgorithmMatrix::default();
        let settings = CollisionSettings::default();
        let cube = Shape::cuboid(glam::Vec3::ONE).unwrap();
        let sphere = Shape::sphere(1.0).unwrap();
        let pose_sphere = RigidPose::from_position(glam::Vec3::new(0.0, 1.5, 0.0));
        let mut contacts = ContactSet::new(CollisionObjectId(0), CollisionObjectId(1));
        matrix.compute_collision(&cube, &RigidPose::IDENTITY, &sphere, &pose_sphere, &settings, &mut contacts);
        assert!(contacts.have_contact);
        assert_eq!(contacts.object_a, CollisionObjectId(0));
        let contact = contacts.contacts()[0];
        // The normal points from the box to the sphere.
        assert!(contact.normal.y > 0.99);
        assert!((contact.penetration_depth - 0.5).abs() < 1e-5);
    }

    #[test]
    fn unsupported_pairs_are_ignored() {
        let matrix = CollisionAlgorithmMatrix::default();
        let plane = Shape::plane(glam::Vec3::Y, 0.0).unwrap();
        let mut contacts = ContactSet::new(CollisionObjectId(0), CollisionObjectId(1));
        let (pose, settings) = (RigidPose::IDENTITY, CollisionSettings::default());
        matrix.compute_collision(&plane, &pose, &plane, &pose, &settings, &mut contacts);
        assert!(!contacts.have_contact);
        assert!(!matrix.have_contact(&plane, &pose, &plane, &pose, &settings));
    }
}
