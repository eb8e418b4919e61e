use glam::Vec3;

use super::{contact_from_surface_points, CollisionAlgorithm, CollisionContext};
use crate::physics::collidables::Shape;
use crate::physics::collision_detection::contact_manifold::ContactSet;
use crate::physics::rigid_pose::RigidPose;
use crate::utilities::math_helper::{build_orthonormal_basis, closest_point_on_segment};

/// Pair tester for sphere vs capsule collisions. The sphere is object A.
#[derive(Clone, Copy, Debug, Default)]
pub struct SphereCapsuleTester;

impl CollisionAlgorithm for SphereCapsuleTester {
    fn compute_collision(
        &self,
        a: &Shape,
        pose_a: &RigidPose,
        b: &Shape,
        pose_b: &RigidPose,
        context: &CollisionContext,
        contacts: &mut ContactSet,
    ) {
        let (Shape::Sphere(sphere), Shape::Capsule(capsule)) = (a, b) else {
            return;
        };
        let (start, end) = capsule.segment(pose_b);
        let (_, closest) = closest_point_on_segment(pose_a.position, start, end);
        let offset = closest - pose_a.position;
        let distance = offset.length();
        let normal = if distance > f32::MIN_POSITIVE {
            offset / distance
        } else {
            // The center lies on the capsule's axis; push out perpendicular to it.
            build_orthonormal_basis(pose_b.transform_vector(Vec3::Y)).0
        };
        let contact = contact_from_surface_points(
            pose_a.position + normal * sphere.radius,
            closest - normal * capsule.radius,
            normal,
        );
        context.add_contact(contacts, contact);
        context.finish(contacts);
    }

    fn name(&self) -> &'static str {
        "SphereCapsuleTester"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollisionSettings;
    use crate::physics::collidables::CollisionObjectId;
    use crate::physics::collision_detection::collision_algorithms::CollisionAlgorithmMatrix;
    use approx::assert_relative_eq;

    fn collide(sphere_position: Vec3) -> ContactSet {
        let settings = CollisionSettings::default();
        let matrix = CollisionAlgorithmMatrix::default();
        let context = CollisionContext::new(&settings, &matrix);
        let mut contacts = ContactSet::new(CollisionObjectId(0), CollisionObjectId(1));
        SphereCapsuleTester.compute_collision(
            &Shape::sphere(1.0).unwrap(),
            &RigidPose::from_position(sphere_position),
            &Shape::capsule(0.5, 2.0).unwrap(),
            &RigidPose::IDENTITY,
            &context,
            &mut contacts,
        );
        contacts
    }

    #[test]
    fn side_and_cap_contacts() {
        let side = collide(Vec3::new(1.2, 1.0, 0.0));
        assert_relative_eq!(side.contacts()[0].normal, -Vec3::X, epsilon = 1e-6);
        assert_relative_eq!(side.contacts()[0].penetration_depth, 0.3, epsilon = 1e-6);

        let cap = collide(Vec3::new(0.0, 3.0, 0.0));
        assert_relative_eq!(cap.contacts()[0].normal, -Vec3::Y, epsilon = 1e-6);
        assert_relative_eq!(cap.contacts()[0].penetration_depth, 0.5, epsilon = 1e-6);

        assert!(!collide(Vec3::new(0.0, 4.0, 0.0)).have_contact);
    }

    #[test]
    fn center_on_axis() {
        let contacts = collide(Vec3::ZERO);
        let contact = contacts.contacts()[0];
        assert_relative_eq!(contact.normal.dot(Vec3::Y), 0.0, epsilon = 1e-6);
        assert_relative_eq!(contact.penetration_depth, 1.5, epsilon = 1e-6);
    }
}
