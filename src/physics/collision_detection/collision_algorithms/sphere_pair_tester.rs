use glam::Vec3;

use super::{contact_from_surface_points, CollisionAlgorithm, CollisionContext};
use crate::physics::collidables::Shape;
use crate::physics::collision_detection::contact_manifold::ContactSet;
use crate::physics::rigid_pose::RigidPose;

/// Pair tester for sphere vs sphere collisions.
#[derive(Clone, Copy, Debug, Default)]
pub struct SpherePairTester;

impl CollisionAlgorithm for SpherePairTester {
    fn compute_collision(
        &self,
        a: &Shape,
        pose_a: &RigidPose,
        b: &Shape,
        pose_b: &RigidPose,
        context: &CollisionContext,
        contacts: &mut ContactSet,
    ) {
        let (Shape::Sphere(sphere_a), Shape::Sphere(sphere_b)) = (a, b) else {
            return;
        };
        let offset = pose_b.position - pose_a.position;
        let distance = offset.length();
        // Coincident centers have no meaningful direction; any unit vector works.
        let normal = if distance > f32::MIN_POSITIVE { offset / distance } else { Vec3::Y };
        let contact = contact_from_surface_points(
            pose_a.position + normal * sphere_a.radius,
            pose_b.position - normal * sphere_b.radius,
            normal,
        );
        context.add_contact(contacts, contact);
        context.finish(contacts);
    }

    fn have_contact(&self, a: &Shape, pose_a: &RigidPose, b: &Shape, pose_b: &RigidPose, context: &CollisionContext) -> bool {
        let (Shape::Sphere(sphere_a), Shape::Sphere(sphere_b)) = (a, b) else {
            return false;
        };
        let reach = sphere_a.radius + sphere_b.radius + context.settings.contact_margin;
        pose_a.position.distance_squared(pose_b.position) <= reach * reach
    }

    fn name(&self) -> &'static str {
        "SpherePairTester"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollisionSettings;
    use crate::physics::collidables::CollisionObjectId;
    use crate::physics::collision_detection::collision_algorithms::CollisionAlgorithmMatrix;
    use approx::assert_relative_eq;

    fn collide(distance: f32, settings: &CollisionSettings) -> ContactSet {
        let matrix = CollisionAlgorithmMatrix::default();
        let context = CollisionContext::new(settings, &matrix);
        let (a, b) = (Shape::sphere(1.0).unwrap(), Shape::sphere(0.5).unwrap());
        let mut contacts = ContactSet::new(CollisionObjectId(0), CollisionObjectId(1));
        SpherePairTester.compute_collision(
            &a,
            &RigidPose::IDENTITY,
            &b,
            &RigidPose::from_position(Vec3::new(distance, 0.0, 0.0)),
            &context,
            &mut contacts,
        );
        contacts
    }

    #[test]
    fn overlapping_spheres() {
        let contacts = collide(1.25, &CollisionSettings::default());
        assert!(contacts.have_contact);
        let contact = contacts.contacts()[0];
        assert_relative_eq!(contact.normal, Vec3::X);
        assert_relative_eq!(contact.penetration_depth, 0.25, epsilon = 1e-6);
        assert_relative_eq!(contact.position.x, 0.875, epsilon = 1e-6);
    }

    #[test]
    fn separation_and_margin() {
        assert!(!collide(1.6, &CollisionSettings::default()).have_contact);
        let settings = CollisionSettings {
            contact_margin: 0.2,
            ..Default::default()
        };
        let contacts = collide(1.6, &settings);
        assert!(contacts.have_contact);
        assert_relative_eq!(contacts.contacts()[0].penetration_depth, -0.1, epsilon = 1e-6);
    }

    #[test]
    fn coincident_centers() {
        let contacts = collide(0.0, &CollisionSettings::default());
        assert_relative_eq!(contacts.contacts()[0].penetration_depth, 1.5);
    }
}
