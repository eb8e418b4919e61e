use glam::Vec3;
use log::trace;

use super::{contact_from_surface_points, CollisionAlgorithm, CollisionContext};
use crate::physics::collidables::{ConvexShape, Shape};
use crate::physics::collision_detection::closest_points::convex_closest_contact;
use crate::physics::collision_detection::contact_manifold::ContactSet;
use crate::physics::collision_detection::gjk::{Gjk, GjkResult};
use crate::physics::collision_detection::support_finder::{MinkowskiDifference, PosedConvex};
use crate::physics::rigid_pose::RigidPose;
use crate::utilities::math_helper::polygon_normal;

/// General tester for any two convex shapes.
///
/// GJK runs on the core shapes; if the cores intersect, EPA finds the penetration. The manifold is then built by
/// clipping the incident feature against the side planes of the reference feature.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConvexPairTester;

impl ConvexPairTester {
    /// Adds the contacts of two convex shapes without reducing the set.
    pub(crate) fn add_convex_contacts(
        a: &dyn ConvexShape,
        pose_a: &RigidPose,
        b: &dyn ConvexShape,
        pose_b: &RigidPose,
        context: &CollisionContext,
        contacts: &mut ContactSet,
    ) {
        let Some(closest) = convex_closest_contact(a, pose_a, b, pose_b, context.settings) else {
            trace!("No closest points found for a convex pair.");
            return;
        };
        if closest.penetration_depth < -context.settings.contact_margin {
            return;
        }
        let normal = closest.normal;
        let (posed_a, posed_b) = (PosedConvex::new(a, pose_a), PosedConvex::new(b, pose_b));

        let feature_a = posed_a.feature(normal);
        let feature_b = posed_b.feature(-normal);
        let before = contacts.len();
        if feature_a.len() > 1 && feature_b.len() > 1 {
            // The better aligned face is the reference. Segments only serve as reference against segments.
            let alignment = |feature: &[Vec3], direction: Vec3| {
                if feature.len() < 3 {
                    -1.0
                } else {
                    polygon_normal(feature).normalize_or_zero().dot(direction).abs()
                }
            };
            let reference_is_a = alignment(&feature_a, normal) >= alignment(&feature_b, -normal);
            let (reference, incident, reference_direction) = if reference_is_a {
                (&feature_a, &feature_b, normal)
            } else {
                (&feature_b, &feature_a, -normal)
            };
            let clipped = clip_to_reference(reference, incident, reference_direction);
            let reference_point = reference[0];
            for point in clipped {
                let contact = if reference_is_a {
                    let depth = (reference_point - point).dot(normal);
                    contact_from_surface_points(point + normal * depth, point, normal)
                } else {
                    let depth = (point - reference_point).dot(normal);
                    contact_from_surface_points(point, point - normal * depth, normal)
                };
                context.add_contact(contacts, contact);
            }
        }
        if contacts.len() == before {
            context.add_contact(contacts, closest);
        }
    }
}

/// Keeps the part of a polygon or segment on the negative side of a plane.
fn clip_against_plane(points: &[Vec3], origin: Vec3, normal: Vec3) -> Vec<Vec3> {
    let distance = |p: Vec3| (p - origin).dot(normal);
    let crossing = |p: Vec3, q: Vec3, dp: f32, dq: f32| p + (q - p) * (dp / (dp - dq));
    if points.len() == 2 {
        let (p, q) = (points[0], points[1]);
        let (dp, dq) = (distance(p), distance(q));
        return match (dp <= 0.0, dq <= 0.0) {
            (true, true) => vec![p, q],
            (false, false) => Vec::new(),
            (true, false) => vec![p, crossing(p, q, dp, dq)],
            (false, true) => vec![crossing(p, q, dp, dq), q],
        };
    }
    let mut output = Vec::with_capacity(points.len() + 1);
    for (i, &current) in points.iter().enumerate() {
        let next = points[(i + 1) % points.len()];
        let (dc, dn) = (distance(current), distance(next));
        if dc <= 0.0 {
            output.push(current);
        }
        if (dc <= 0.0) != (dn <= 0.0) {
            output.push(crossing(current, next, dc, dn));
        }
    }
    output
}

/// Sutherland-Hodgman clipping of the incident feature against the side planes of the reference feature.
fn clip_to_reference(reference: &[Vec3], incident: &[Vec3], direction: Vec3) -> Vec<Vec3> {
    let mut clipped = incident.to_vec();
    if reference.len() == 2 {
        let axis = reference[1] - reference[0];
        clipped = clip_against_plane(&clipped, reference[0], -axis);
        return clip_against_plane(&clipped, reference[1], axis);
    }
    let mut face_normal = polygon_normal(reference).normalize_or_zero();
    if face_normal.dot(direction) < 0.0 {
        face_normal = -face_normal;
    }
    let centroid = reference.iter().copied().sum::<Vec3>() / reference.len() as f32;
    for (i, &start) in reference.iter().enumerate() {
        let end = reference[(i + 1) % reference.len()];
        let mut side = (end - start).cross(face_normal);
        if side.dot(centroid - start) > 0.0 {
            side = -side;
        }
        clipped = clip_against_plane(&clipped, start, side);
        if clipped.is_empty() {
            break;
        }
    }
    clipped
}

impl CollisionAlgorithm for ConvexPairTester {
    fn compute_collision(
        &self,
        a: &Shape,
        pose_a: &RigidPose,
        b: &Shape,
        pose_b: &RigidPose,
        context: &CollisionContext,
        contacts: &mut ContactSet,
    ) {
        let (Some(convex_a), Some(convex_b)) = (a.as_convex(), b.as_convex()) else {
            return;
        };
        Self::add_convex_contacts(convex_a, pose_a, convex_b, pose_b, context, contacts);
        context.finish(contacts);
    }

    fn have_contact(&self, a: &Shape, pose_a: &RigidPose, b: &Shape, pose_b: &RigidPose, context: &CollisionContext) -> bool {
        let (Some(convex_a), Some(convex_b)) = (a.as_convex(), b.as_convex()) else {
            return false;
        };
        let (posed_a, posed_b) = (PosedConvex::new(convex_a, pose_a), PosedConvex::new(convex_b, pose_b));
        let margins = posed_a.margin() + posed_b.margin();
        match Gjk::from_settings(context.settings).distance(&MinkowskiDifference::of_cores(posed_a, posed_b)) {
            GjkResult::Intersecting { .. } => true,
            GjkResult::Separated { distance, .. } => distance <= margins + context.settings.contact_margin,
        }
    }

    fn name(&self) -> &'static str {
        "ConvexPairTester"
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

    fn collide(a: &Shape, pose_a: RigidPose, b: &Shape, pose_b: RigidPose) -> ContactSet {
        let settings = CollisionSettings::default();
        let matrix = CollisionAlgorithmMatrix::default();
        let context = CollisionContext::new(&settings, &matrix);
        let mut contacts = ContactSet::new(CollisionObjectId(0), CollisionObjectId(1));
        ConvexPairTester.compute_collision(a, &pose_a, b, &pose_b, &context, &mut contacts);
        contacts
    }

    fn cube_hull(half: f32) -> Shape {
        let mut corners = Vec::new();
        for i in 0..8 {
            let sign = |bit: usize| if i & bit == 0 { -half } else { half };
            corners.push(Vec3::new(sign(1), sign(2), sign(4)));
        }
        Shape::convex_hull(&corners).unwrap()
    }

    #[test]
    fn stacked_boxes_have_a_face_manifold() {
        let base = Shape::cuboid(Vec3::ONE).unwrap();
        let top = Shape::cuboid(Vec3::splat(0.5)).unwrap();
        let contacts = collide(
            &base,
            RigidPose::IDENTITY,
            &top,
            RigidPose::from_position(Vec3::new(0.2, 1.4, 0.1)),
        );
        assert!(contacts.have_contact);
        assert_eq!(contacts.len(), 4);
        for contact in contacts.contacts() {
            assert_relative_eq!(contact.normal, Vec3::Y, epsilon = 1e-3);
            assert_relative_eq!(contact.penetration_depth, 0.1, epsilon = 1e-3);
        }
    }

    #[test]
    fn capsule_lying_on_a_box_touches_along_its_side() {
        let base = Shape::cuboid(Vec3::splat(2.0)).unwrap();
        let capsule = Shape::capsule(0.5, 1.0).unwrap();
        let pose = RigidPose::new(Vec3::new(0.0, 2.4, 0.0), Quat::from_rotation_z(std::f32::consts::FRAC_PI_2));
        let contacts = collide(&base, RigidPose::IDENTITY, &capsule, pose);
        assert_eq!(contacts.len(), 2);
        for contact in contacts.contacts() {
            assert_relative_eq!(contact.normal, Vec3::Y, epsilon = 1e-3);
            assert_relative_eq!(contact.penetration_depth, 0.1, epsilon = 1e-3);
        }
    }

    #[test]
    fn sphere_resting_on_a_hull() {
        let hull = cube_hull(1.0);
        let sphere = Shape::sphere(0.5).unwrap();
        let contacts = collide(&hull, RigidPose::IDENTITY, &sphere, RigidPose::from_position(Vec3::Y * 1.3));
        assert_eq!(contacts.len(), 1);
        let contact = contacts.contacts()[0];
        assert_relative_eq!(contact.normal, Vec3::Y, epsilon = 1e-4);
        assert_relative_eq!(contact.penetration_depth, 0.2, epsilon = 1e-4);
        assert_relative_eq!(contact.position.y, 0.9, epsilon = 1e-4);
    }

    #[test]
    fn separated_shapes_report_nothing() {
        let hull = cube_hull(1.0);
        let sphere = Shape::sphere(0.5).unwrap();
        let pose = RigidPose::from_position(Vec3::Y * 2.0);
        assert!(!collide(&hull, RigidPose::IDENTITY, &sphere, pose).have_contact);

        let settings = CollisionSettings::default();
        let matrix = CollisionAlgorithmMatrix::default();
        let context = CollisionContext::new(&settings, &matrix);
        assert!(!ConvexPairTester.have_contact(&hull, &RigidPose::IDENTITY, &sphere, &pose, &context));
        let touching = RigidPose::from_position(Vec3::Y * 1.4);
        assert!(ConvexPairTester.have_contact(&hull, &RigidPose::IDENTITY, &sphere, &touching, &context));
    }

    #[test]
    fn clipping_a_segment_against_a_square() {
        let square = [
            Vec3::new(-1.0, 0.0, -1.0),
            Vec3::new(-1.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, -1.0),
        ];
        let segment = [Vec3::new(-3.0, -0.1, 0.0), Vec3::new(0.5, -0.1, 0.0)];
        let clipped = clip_to_reference(&square, &segment, Vec3::Y);
        assert_eq!(clipped.len(), 2);
        assert_relative_eq!(clipped[0], Vec3::new(-1.0, -0.1, 0.0), epsilon = 1e-6);
        assert_relative_eq!(clipped[1], Vec3::new(0.5, -0.1, 0.0), epsilon = 1e-6);
    }

    fn flat_triangle() -> Shape {
        Shape::triangle(Vec3::new(-1.0, 0.0, -1.0), Vec3::new(-1.0, 0.0, 1.0), Vec3::new(1.0, 0.0, 0.0)).unwrap()
    }

    #[test]
    fn sphere_centered_in_triangle_plane() {
        let sphere = Shape::sphere(0.5).unwrap();
        let pose = RigidPose::from_position(Vec3::new(-0.2, 0.0, 0.0));
        let contacts = collide(&flat_triangle(), RigidPose::IDENTITY, &sphere, pose);
        assert!(contacts.have_contact);
        let deepest = contacts.deepest().unwrap();
        assert_relative_eq!(deepest.penetration_depth, 0.5, epsilon = 1e-2);
        assert_relative_eq!(deepest.normal.y.abs(), 1.0, epsilon = 1e-2);
    }

    #[test]
    fn capsule_axis_in_triangle_plane() {
        let capsule = Shape::capsule(0.5, 0.3).unwrap();
        let pose = RigidPose::new(Vec3::new(-0.3, 0.0, 0.0), Quat::from_rotation_z(std::f32::consts::FRAC_PI_2));
        let contacts = collide(&flat_triangle(), RigidPose::IDENTITY, &capsule, pose);
        assert!(!contacts.is_empty());
        for contact in contacts.iter() {
            assert_relative_eq!(contact.penetration_depth, 0.5, epsilon = 1e-2);
            assert_relative_eq!(contact.normal.y.abs(), 1.0, epsilon = 1e-2);
        }
    }
}
