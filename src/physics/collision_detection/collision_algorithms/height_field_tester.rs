use super::convex_pair_tester::ConvexPairTester;
use super::{contact_from_surface_points, CollisionAlgorithm, CollisionContext};
use crate::physics::collidables::Shape;
use crate::physics::collision_detection::contact_manifold::ContactSet;
use crate::physics::collision_detection::gjk::barycentric;
use crate::physics::collision_detection::support_finder::PosedConvex;
use crate::physics::rigid_pose::RigidPose;

/// Pair tester for a height field (object A) against a convex shape.
///
/// Each triangle under the convex's bounds is tested as a convex pair. Contact normals always point out of the
/// field's top surface, so shapes that sank below a triangle are pushed back up from the points of their lowest
/// feature. `feature_a` holds the triangle id.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeightFieldTester;

impl CollisionAlgorithm for HeightFieldTester {
    fn compute_collision(
        &self,
        a: &Shape,
        pose_a: &RigidPose,
        b: &Shape,
        pose_b: &RigidPose,
        context: &CollisionContext,
        contacts: &mut ContactSet,
    ) {
        let (Shape::HeightField(field), Some(convex)) = (a, b.as_convex()) else {
            return;
        };
        let local_bounds = b
            .compute_bounds(&pose_a.relative(pose_b))
            .expanded(context.settings.contact_margin);
        let posed = PosedConvex::new(convex, pose_b);
        let mut triangle_contacts = ContactSet::new(contacts.object_a, contacts.object_b);
        for (id, triangle) in field.triangles_in_bounds(&local_bounds) {
            let up = pose_a.transform_vector(triangle.normal());
            triangle_contacts.clear();
            ConvexPairTester::add_convex_contacts(&triangle, pose_a, convex, pose_b, context, &mut triangle_contacts);
            let mut sunk = false;
            for contact in triangle_contacts.iter() {
                if contact.normal.dot(up) < 0.0 {
                    sunk = true;
                } else {
                    context.add_contact(contacts, contact.with_features(id, contact.feature_b));
                }
            }
            if sunk {
                // Below the surface: measure the lowest feature against the triangle plane instead.
                let [ta, tb, tc] = triangle.vertices().map(|v| pose_a.transform_point(v));
                let mut pushed = false;
                for point in posed.feature(-up) {
                    let depth = (ta - point).dot(up);
                    let on_plane = point + up * depth;
                    if barycentric(on_plane, ta, tb, tc).iter().all(|&w| w >= -1e-4) {
                        let contact = contact_from_surface_points(on_plane, point, up);
                        context.add_contact(contacts, contact.with_features(id, 0));
                        pushed = true;
                    }
                }
                if !pushed {
                    let deepest = posed.support(-up);
                    let depth = (ta - deepest).dot(up);
                    let contact = contact_from_surface_points(deepest + up * depth, deepest, up);
                    context.add_contact(contacts, contact.with_features(id, 0));
                }
            }
        }
        context.finish(contacts);
    }

    fn name(&self) -> &'static str {
        "HeightFieldTester"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollisionSettings;
    use crate::physics::collidables::height_field::HeightField;
    use crate::physics::collidables::CollisionObjectId;
    use crate::physics::collision_detection::collision_algorithms::CollisionAlgorithmMatrix;
    use approx::assert_relative_eq;
    use glam::Vec3;

    fn flat_field() -> Shape {
        Shape::HeightField(HeightField::new(-2.0, -2.0, 4.0, 4.0, 5, 5, vec![0.0; 25], 1.0).unwrap())
    }

    fn collide(b: &Shape, pose_b: RigidPose) -> ContactSet {
        let settings = CollisionSettings::default();
        let matrix = CollisionAlgorithmMatrix::default();
        let context = CollisionContext::new(&settings, &matrix);
        let mut contacts = ContactSet::new(CollisionObjectId(0), CollisionObjectId(1));
        HeightFieldTester.compute_collision(&flat_field(), &RigidPose::IDENTITY, b, &pose_b, &context, &mut contacts);
        contacts
    }

    #[test]
    fn box_resting_on_flat_ground() {
        let cube = Shape::cuboid(Vec3::splat(0.25)).unwrap();
        let contacts = collide(&cube, RigidPose::from_position(Vec3::new(0.5, 0.15, 0.5)));
        assert!(contacts.have_contact);
        assert!(!contacts.is_empty() && contacts.len() <= 4);
        for contact in contacts.contacts() {
            assert_relative_eq!(contact.normal, Vec3::Y, epsilon = 1e-3);
            assert_relative_eq!(contact.penetration_depth, 0.1, epsilon = 1e-3);
            assert!(contact.feature_a < 32);
        }
    }

    #[test]
    fn sunken_sphere_is_pushed_up() {
        let sphere = Shape::sphere(0.5).unwrap();
        let contacts = collide(&sphere, RigidPose::from_position(Vec3::new(0.5, -0.2, 0.5)));
        assert!(contacts.have_contact);
        let deepest = contacts.deepest().unwrap();
        assert_relative_eq!(deepest.normal, Vec3::Y, epsilon = 1e-4);
        assert_relative_eq!(deepest.penetration_depth, 0.7, epsilon = 1e-4);
    }

    #[test]
    fn shapes_off_the_grid_are_ignored() {
        let sphere = Shape::sphere(0.5).unwrap();
        assert!(!collide(&sphere, RigidPose::from_position(Vec3::new(5.0, 0.0, 0.0))).have_contact);
        assert!(!collide(&sphere, RigidPose::from_position(Vec3::new(0.0, 1.0, 0.0))).have_contact);
    }

    #[test]
    fn sunken_box_keeps_its_manifold() {
        let cube = Shape::cuboid(Vec3::splat(0.25)).unwrap();
        let contacts = collide(&cube, RigidPose::from_position(Vec3::new(0.5, -0.2, 0.5)));
        assert!(contacts.have_contact);
        assert_eq!(contacts.len(), 4);
        for contact in contacts.contacts() {
            assert_relative_eq!(contact.normal, Vec3::Y, epsilon = 1e-4);
            assert_relative_eq!(contact.penetration_depth, 0.45, epsilon = 1e-4);
            assert_relative_eq!(contact.position_b().y, -0.45, epsilon = 1e-4);
        }
        let spread = contacts
            .iter()
            .flat_map(|x| contacts.iter().map(move |y| x.position.distance(y.position)))
            .fold(0.0f32, f32::max);
        assert_relative_eq!(spread, 0.5 * std::f32::consts::SQRT_2, epsilon = 1e-3);
    }
}
