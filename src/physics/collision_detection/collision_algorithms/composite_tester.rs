use super::{CollisionAlgorithm, CollisionContext};
use crate::physics::collidables::Shape;
use crate::physics::collision_detection::contact_manifold::ContactSet;
use crate::physics::rigid_pose::RigidPose;

/// Pair tester for a composite shape (object A) against any shape.
///
/// Children whose bounds overlap the other shape are dispatched through the algorithm matrix, so composites
/// nest. `feature_a` of each contact holds the index of the child that produced it.
#[derive(Clone, Copy, Debug, Default)]
pub struct CompositeTester;

impl CollisionAlgorithm for CompositeTester {
    fn compute_collision(
        &self,
        a: &Shape,
        pose_a: &RigidPose,
        b: &Shape,
        pose_b: &RigidPose,
        context: &CollisionContext,
        contacts: &mut ContactSet,
    ) {
        let Shape::Composite(composite) = a else {
            return;
        };
        let local_bounds = b
            .compute_bounds(&pose_a.relative(pose_b))
            .expanded(context.settings.contact_margin);
        let mut child_contacts = ContactSet::new(contacts.object_a, contacts.object_b);
        for index in composite.overlapping_children(&local_bounds) {
            let child_pose = composite.child_pose(pose_a, index);
            child_contacts.clear();
            context.algorithms.dispatch(
                &composite.child(index).shape,
                &child_pose,
                b,
                pose_b,
                context,
                &mut child_contacts,
            );
            for contact in child_contacts.iter() {
                context.add_contact(contacts, contact.with_features(index as u32, contact.feature_b));
            }
        }
        context.finish(contacts);
    }

    fn have_contact(&self, a: &Shape, pose_a: &RigidPose, b: &Shape, pose_b: &RigidPose, context: &CollisionContext) -> bool {
        let Shape::Composite(composite) = a else {
            return false;
        };
        let local_bounds = b
            .compute_bounds(&pose_a.relative(pose_b))
            .expanded(context.settings.contact_margin);
        composite.overlapping_children(&local_bounds).into_iter().any(|index| {
            let child_pose = composite.child_pose(pose_a, index);
            context
                .algorithms
                .have_contact(&composite.child(index).shape, &child_pose, b, pose_b, context.settings)
        })
    }

    fn name(&self) -> &'static str {
        "CompositeTester"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollisionSettings;
    use crate::physics::collidables::compound::Composite;
    use crate::physics::collidables::CollisionObjectId;
    use crate::physics::collision_detection::collision_algorithms::CollisionAlgorithmMatrix;
    use approx::assert_relative_eq;
    use glam::Vec3;

    fn dumbbell() -> Shape {
        Shape::Composite(
            Composite::new(vec![
                (RigidPose::from_position(Vec3::new(-2.0, 0.0, 0.0)), Shape::sphere(0.5).unwrap()),
                (RigidPose::from_position(Vec3::new(2.0, 0.0, 0.0)), Shape::sphere(0.5).unwrap()),
            ])
            .unwrap(),
        )
    }

    fn collide(a: &Shape, pose_a: RigidPose, b: &Shape, pose_b: RigidPose) -> ContactSet {
        let settings = CollisionSettings::default();
        let matrix = CollisionAlgorithmMatrix::default();
        let mut contacts = ContactSet::new(CollisionObjectId(0), CollisionObjectId(1));
        matrix.compute_collision(a, &pose_a, b, &pose_b, &settings, &mut contacts);
        contacts
    }

    #[test]
    fn dumbbell_on_a_plane_touches_with_both_ends() {
        let ground = Shape::plane(Vec3::Y, 0.0).unwrap();
        let contacts = collide(&dumbbell(), RigidPose::from_position(Vec3::Y * 0.4), &ground, RigidPose::IDENTITY);
        assert_eq!(contacts.len(), 2);
        let mut children: Vec<u32> = contacts.iter().map(|c| c.feature_a).collect();
        children.sort_unstable();
        assert_eq!(children, vec![0, 1]);
        for contact in contacts.contacts() {
            assert_relative_eq!(contact.normal, -Vec3::Y, epsilon = 1e-5);
            assert_relative_eq!(contact.penetration_depth, 0.1, epsilon = 1e-5);
        }
    }

    #[test]
    fn nested_composites() {
        let contacts = collide(&dumbbell(), RigidPose::IDENTITY, &dumbbell(), RigidPose::from_position(Vec3::Y * 0.9));
        assert_eq!(contacts.len(), 2);
        for contact in contacts.contacts() {
            assert_relative_eq!(contact.normal, Vec3::Y, epsilon = 1e-5);
            assert_relative_eq!(contact.penetration_depth, 0.1, epsilon = 1e-5);
        }
    }

    #[test]
    fn have_contact_checks_children_only() {
        let settings = CollisionSettings::default();
        let matrix = CollisionAlgorithmMatrix::default();
        let context = CollisionContext::new(&settings, &matrix);
        let ball = Shape::sphere(0.5).unwrap();
        // Between the two ends: inside the composite bounds but touching no child.
        let between = RigidPose::IDENTITY;
        assert!(!CompositeTester.have_contact(&dumbbell(), &RigidPose::IDENTITY, &ball, &between, &context));
        let at_end = RigidPose::from_position(Vec3::new(2.8, 0.0, 0.0));
        assert!(CompositeTester.have_contact(&dumbbell(), &RigidPose::IDENTITY, &ball, &at_end, &context));
    }
}
