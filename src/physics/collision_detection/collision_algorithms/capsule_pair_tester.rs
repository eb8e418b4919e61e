use glam::Vec3;

use super::{contact_from_surface_points, CollisionAlgorithm, CollisionContext};
use crate::physics::collidables::Shape;
use crate::physics::collision_detection::contact_manifold::ContactSet;
use crate::physics::rigid_pose::RigidPose;
use crate::utilities::math_helper::{build_orthonormal_basis, closest_point_on_segment, closest_points_on_segments};

/// Pair tester for capsule vs capsule collisions.
///
/// Produces one contact at the closest points of the two axes, or two contacts spanning the overlap when the
/// axes are nearly parallel.
#[derive(Clone, Copy, Debug, Default)]
pub struct CapsulePairTester;

/// Axes this close to parallel produce two contacts.
const PARALLEL_THRESHOLD: f32 = 0.995;

impl CollisionAlgorithm for CapsulePairTester {
    fn compute_collision(
        &self,
        a: &Shape,
        pose_a: &RigidPose,
        b: &Shape,
        pose_b: &RigidPose,
        context: &CollisionContext,
        contacts: &mut ContactSet,
    ) {
        let (Shape::Capsule(capsule_a), Shape::Capsule(capsule_b)) = (a, b) else {
            return;
        };
        let (a0, a1) = capsule_a.segment(pose_a);
        let (b0, b1) = capsule_b.segment(pose_b);
        let (_, _, closest_a, closest_b) = closest_points_on_segments(a0, a1, b0, b1);
        let offset = closest_b - closest_a;
        let distance = offset.length();
        let (axis_a, axis_b) = (a1 - a0, b1 - b0);
        let fallback_normal = {
            let cross = axis_a.cross(axis_b);
            let normal = if cross.length_squared() > 1e-12 {
                cross.normalize()
            } else {
                build_orthonormal_basis(axis_a.normalize_or_zero()).0
            };
            // Point the normal from A toward B.
            if normal.dot(pose_b.position - pose_a.position) < 0.0 {
                -normal
            } else {
                normal
            }
        };
        let normal = if distance > 1e-7 { offset / distance } else { fallback_normal };

        let contact_at = |on_a: Vec3, on_b: Vec3, normal: Vec3| {
            contact_from_surface_points(on_a + normal * capsule_a.radius, on_b - normal * capsule_b.radius, normal)
        };

        let parallel = axis_a.normalize_or_zero().dot(axis_b.normalize_or_zero()).abs() >= PARALLEL_THRESHOLD;
        if parallel && axis_a.length_squared() > 0.0 {
            // Project B's endpoints onto A's axis and keep the shared interval.
            let inverse_length_squared = 1.0 / axis_a.length_squared();
            let t0 = ((b0 - a0).dot(axis_a) * inverse_length_squared).clamp(0.0, 1.0);
            let t1 = ((b1 - a0).dot(axis_a) * inverse_length_squared).clamp(0.0, 1.0);
            let (start, end) = (t0.min(t1), t0.max(t1));
            if (end - start) * axis_a.length() > context.settings.contact_position_tolerance {
                for t in [start, end] {
                    let on_a = a0 + axis_a * t;
                    let (_, on_b) = closest_point_on_segment(on_a, b0, b1);
                    context.add_contact(contacts, contact_at(on_a, on_b, normal));
                }
                context.finish(contacts);
                return;
            }
        }

        context.add_contact(contacts, contact_at(closest_a, closest_b, normal));
        context.finish(contacts);
    }

    fn name(&self) -> &'static str {
        "CapsulePairTester"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollisionSettings;
    use crate::physics::collidables::CollisionObjectId;
    use crate::physics::collision_detection::collision_algorithms::CollisionAlgorithmMatrix;
    use approx::assert_relative_eq;
    use glam::Quat;

    fn collide(pose_b: RigidPose) -> ContactSet {
        let settings = CollisionSettings::default();
        let matrix = CollisionAlgorithmMatrix::default();
        let context = CollisionContext::new(&settings, &matrix);
        let capsule = Shape::capsule(0.5, 1.0).unwrap();
        let mut contacts = ContactSet::new(CollisionObjectId(0), CollisionObjectId(1));
        CapsulePairTester.compute_collision(&capsule, &RigidPose::IDENTITY, &capsule, &pose_b, &context, &mut contacts);
        contacts
    }

    #[test]
    fn crossing_capsules_have_one_contact() {
        let pose = RigidPose::new(Vec3::new(0.8, 0.0, 0.0), Quat::from_rotation_x(std::f32::consts::FRAC_PI_2));
        let contacts = collide(pose);
        assert_eq!(contacts.len(), 1);
        let contact = contacts.contacts()[0];
        assert_relative_eq!(contact.normal, Vec3::X, epsilon = 1e-5);
        assert_relative_eq!(contact.penetration_depth, 0.2, epsilon = 1e-5);
    }

    #[test]
    fn parallel_capsules_have_two_contacts() {
        let contacts = collide(RigidPose::from_position(Vec3::new(0.9, 0.5, 0.0)));
        assert_eq!(contacts.len(), 2);
        for contact in contacts.contacts() {
            assert_relative_eq!(contact.normal, Vec3::X, epsilon = 1e-5);
            assert_relative_eq!(contact.penetration_depth, 0.1, epsilon = 1e-5);
        }
        let heights: Vec<f32> = contacts.contacts().iter().map(|c| c.position.y).collect();
        assert!(heights.iter().any(|&y| (y - 1.0).abs() < 1e-5));
        assert!(heights.iter().any(|&y| (y + 0.5).abs() < 1e-5));
    }

    #[test]
    fn separated_capsules() {
        assert!(!collide(RigidPose::from_position(Vec3::new(1.2, 0.0, 0.0))).have_contact);
    }
}
