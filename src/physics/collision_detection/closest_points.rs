//! Closest point queries that also work for separated shapes.

use log::trace;

use super::collision_algorithms::contact_from_surface_points;
use super::contact_manifold::Contact;
use super::epa::Epa;
use super::gjk::{Gjk, GjkResult};
use super::support_finder::{MinkowskiDifference, PosedConvex};
use crate::config::CollisionSettings;
use crate::physics::collidables::{ConvexShape, Shape};
use crate::physics::rigid_pose::RigidPose;

/// The closest (or deepest) pair of points of two shapes as one contact with a normal from A to B.
///
/// The penetration depth is negative for separated shapes, `-distance`. Returns `None` for pairs without a
/// closest point definition, such as two planes.
pub fn closest_contact(
    a: &Shape,
    pose_a: &RigidPose,
    b: &Shape,
    pose_b: &RigidPose,
    settings: &CollisionSettings,
) -> Option<Contact> {
    match (a, b) {
        (Shape::Composite(composite), _) => (0..composite.child_count())
            .filter_map(|index| {
                let child_pose = composite.child_pose(pose_a, index);
                closest_contact(&composite.child(index).shape, &child_pose, b, pose_b, settings)
                    .map(|contact| contact.with_features(index as u32, contact.feature_b))
            })
            .max_by(|x, y| x.penetration_depth.total_cmp(&y.penetration_depth)),
        (Shape::Plane(_) | Shape::HeightField(_), Shape::Plane(_) | Shape::HeightField(_)) => None,
        (_, Shape::Composite(_) | Shape::Plane(_) | Shape::HeightField(_)) => {
            closest_contact(b, pose_b, a, pose_a, settings).map(|contact| contact.swapped())
        }
        (Shape::Plane(plane), _) => {
            let convex = b.as_convex()?;
            let (normal, distance) = plane.world_plane(pose_a);
            let deepest = PosedConvex::new(convex, pose_b).support(-normal);
            let depth = distance - normal.dot(deepest);
            Some(contact_from_surface_points(deepest + normal * depth, deepest, normal))
        }
        (Shape::HeightField(field), _) => {
            let convex = b.as_convex()?;
            // Search every cell under the shape's footprint, at any height.
            let mut search = b.compute_bounds(&pose_a.relative(pose_b));
            let field_bounds = field.local_bounds();
            search.min.y = field_bounds.min.y;
            search.max.y = field_bounds.max.y;
            field
                .triangles_in_bounds(&search)
                .into_iter()
                .filter_map(|(id, triangle)| {
                    convex_closest_contact(&triangle, pose_a, convex, pose_b, settings)
                        .map(|contact| contact.with_features(id, contact.feature_b))
                })
                .max_by(|x, y| x.penetration_depth.total_cmp(&y.penetration_depth))
        }
        _ => convex_closest_contact(a.as_convex()?, pose_a, b.as_convex()?, pose_b, settings),
    }
}

/// Closest points of two convex shapes, through GJK on the cores and EPA when the cores intersect.
///
/// When the core difference is flat (a sphere centered in a triangle's plane, coincident capsule axes) EPA has no
/// volume to expand, so the full shapes are used instead.
pub fn convex_closest_contact(
    a: &dyn ConvexShape,
    pose_a: &RigidPose,
    b: &dyn ConvexShape,
    pose_b: &RigidPose,
    settings: &CollisionSettings,
) -> Option<Contact> {
    let (posed_a, posed_b) = (PosedConvex::new(a, pose_a), PosedConvex::new(b, pose_b));
    let cores = MinkowskiDifference::of_cores(posed_a, posed_b);
    let simplex = match Gjk::from_settings(settings).distance(&cores) {
        GjkResult::Separated {
            distance,
            point_a,
            point_b,
        } if distance > settings.epsilon => {
            let normal = (point_b - point_a) / distance;
            return Some(contact_from_surface_points(
                point_a + normal * posed_a.margin(),
                point_b - normal * posed_b.margin(),
                normal,
            ));
        }
        GjkResult::Separated { .. } => Vec::new(),
        GjkResult::Intersecting { simplex } => simplex,
    };
    match Epa::from_settings(settings).penetration(&cores, &simplex) {
        Some(penetration) => Some(contact_from_surface_points(
            penetration.point_a + penetration.normal * posed_a.margin(),
            penetration.point_b - penetration.normal * posed_b.margin(),
            penetration.normal,
        )),
        None if posed_a.margin() + posed_b.margin() > 0.0 => {
            trace!("Core difference is flat; measuring the full shapes.");
            full_shape_contact(posed_a, posed_b, settings)
        }
        None => None,
    }
}

/// GJK and EPA on the full shapes, without separating cores and margins.
fn full_shape_contact(posed_a: PosedConvex, posed_b: PosedConvex, settings: &CollisionSettings) -> Option<Contact> {
    let full = MinkowskiDifference::new(posed_a, posed_b);
    let simplex = match Gjk::from_settings(settings).distance(&full) {
        GjkResult::Separated {
            distance,
            point_a,
            point_b,
        } if distance > settings.epsilon => {
            return Some(contact_from_surface_points(point_a, point_b, (point_b - point_a) / distance));
        }
        GjkResult::Separated { .. } => Vec::new(),
        GjkResult::Intersecting { simplex } => simplex,
    };
    let penetration = Epa::from_settings(settings).penetration(&full, &simplex)?;
    Some(contact_from_surface_points(penetration.point_a, penetration.point_b, penetration.normal))
}
