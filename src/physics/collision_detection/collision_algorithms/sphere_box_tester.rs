use glam::Vec3;

use super::{contact_from_surface_points, CollisionAlgorithm, CollisionContext};
use crate::physics::collidables::Shape;
use crate::physics::collision_detection::contact_manifold::ContactSet;
use crate::physics::rigid_pose::RigidPose;

/// Pair tester for sphere vs box collisions. The sphere is object A.
#[derive(Clone, Copy, Debug, Default)]
pub struct SphereBoxTester;

impl CollisionAlgorithm for SphereBoxTester {
    fn compute_collision(
        &self,
        a: &Shape,
        pose_a: &RigidPose,
        b: &Shape,
        pose_b: &RigidPose,
        context: &CollisionContext,
        contacts: &mut ContactSet,
    ) {
        let (Shape::Sphere(sphere), Shape::Box(cube)) = (a, b) else {
            return;
        };
        // Clamp the position of the sphere to the box.
        let local_center = pose_b.inverse_transform_point(pose_a.position);
        let half = cube.half_extents;
        let clamped = local_center.clamp(-half, half);
        let outside = clamped - local_center;
        let distance = outside.length();

        let (local_normal, local_surface) = if distance > 0.0 {
            (outside / distance, clamped)
        } else {
            // The center is inside the box; exit through the closest face.
            let depths = half - local_center.abs();
            let axis = if depths.x <= depths.y && depths.x <= depths.z {
                0
            } else if depths.y <= depths.z {
                1
            } else {
                2
            };
            let sign = if local_center[axis] < 0.0 { -1.0 } else { 1.0 };
            let mut normal = Vec3::ZERO;
            // From the sphere into the box, opposite the exit direction.
            normal[axis] = -sign;
            let mut surface = local_center;
            surface[axis] = sign * half[axis];
            (normal, surface)
        };
        let normal = pose_b.transform_vector(local_normal);
        let contact = contact_from_surface_points(
            pose_a.position + normal * sphere.radius,
            pose_b.transform_point(local_surface),
            normal,
        );
        context.add_contact(contacts, contact);
        context.finish(contacts);
    }

    fn have_contact(&self, a: &Shape, pose_a: &RigidPose, b: &Shape, pose_b: &RigidPose, context: &CollisionContext) -> bool {
        let (Shape::Sphere(sphere), Shape::Box(cube)) = (a, b) else {
            return false;
        };
        let local_center = pose_b.inverse_transform_point(pose_a.position);
        let clamped = local_center.clamp(-cube.half_extents, cube.half_extents);
        let reach = sphere.radius + context.settings.contact_margin;
        clamped.distance_squared(local_center) <= reach * reach
    }

    fn name(&self) -> &'static str {
        "SphereBoxTester"
    }
}
