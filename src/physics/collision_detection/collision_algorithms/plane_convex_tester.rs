use super::{contact_from_surface_points, CollisionAlgorithm, CollisionContext};
use crate::physics::collidables::Shape;
use crate::physics::collision_detection::contact_manifold::ContactSet;
use crate::physics::collision_detection::support_finder::PosedConvex;
use crate::physics::rigid_pose::RigidPose;

/// Pair tester for a plane (object A) against any convex shape.
///
/// Every vertex of the convex feature facing the plane that lies below the plane (or within the contact margin)
/// becomes a contact.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlaneConvexTester;

impl CollisionAlgorithm for PlaneConvexTester {
    fn compute_collision(
        &self,
        a: &Shape,
        pose_a: &RigidPose,
        b: &Shape,
        pose_b: &RigidPose,
        context: &CollisionContext,
        contacts: &mut ContactSet,
    ) {
        let (Shape::Plane(plane), Some(convex)) = (a, b.as_convex()) else {
            return;
        };
        let (normal, distance) = plane.world_plane(pose_a);
        let posed = PosedConvex::new(convex, pose_b);
        let mut candidates = posed.feature(-normal);
        candidates.push(posed.support(-normal));
        for point in candidates {
            let depth = distance - normal.dot(point);
            let on_plane = point + normal * depth;
            context.add_contact(contacts, contact_from_surface_points(on_plane, point, normal));
        }
        context.finish(contacts);
    }

    fn have_contact(&self, a: &Shape, pose_a: &RigidPose, b: &Shape, pose_b: &RigidPose, context: &CollisionContext) -> bool {
        let (Shape::Plane(plane), Some(convex)) = (a, b.as_convex()) else {
            return false;
        };
        let (normal, distance) = plane.world_plane(pose_a);
        let deepest = PosedConvex::new(convex, pose_b).support(-normal);
        distance - normal.dot(deepest) >= -context.settings.contact_margin
    }

    fn name(&self) -> &'static str {
        "PlaneConvexTester"
    }
}
