use glam::Vec3;
use log::warn;

use super::support_finder::{MinkowskiDifference, SupportPoint};
use crate::config::CollisionSettings;

/// Outcome of a GJK distance query.
#[derive(Clone, Debug, PartialEq)]
pub enum GjkResult {
    /// The shapes do not touch. `point_a` and `point_b` are the closest points on each shape.
    Separated { distance: f32, point_a: Vec3, point_b: Vec3 },
    /// The origin is inside the Minkowski difference. The final simplex seeds EPA.
    Intersecting { simplex: Vec<SupportPoint> },
}

/// Gilbert-Johnson-Keerthi distance algorithm with a Voronoi region simplex solver.
#[derive(Clone, Copy, Debug)]
pub struct Gjk {
    pub max_iterations: usize,
    /// Relative progress below which the search terminates.
    pub epsilon: f32,
}

impl Default for Gjk {
    fn default() -> Self {
        Self::from_settings(&CollisionSettings::default())
    }
}

/// Barycentric coordinates of `p` with respect to the triangle `abc`. `p` is assumed to lie in its plane.
pub(crate) fn barycentric(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> [f32; 3] {
    let (v0, v1, v2) = (b - a, c - a, p - a);
    let d00 = v0.dot(v0);
    let d01 = v0.dot(v1);
    let d11 = v1.dot(v1);
    let d20 = v2.dot(v0);
    let d21 = v2.dot(v1);
    let denominator = d00 * d11 - d01 * d01;
    if denominator.abs() <= f32::EPSILON * (d00 * d11).max(f32::MIN_POSITIVE) {
        return [1.0, 0.0, 0.0];
    }
    let v = (d11 * d20 - d01 * d21) / denominator;
    let w = (d00 * d21 - d01 * d20) / denominator;
    [1.0 - v - w, v, w]
}

/// Closest point of a segment to the origin and the weights of its endpoints.
fn solve_segment(a: Vec3, b: Vec3) -> (Vec3, [f32; 2]) {
    let ab = b - a;
    let length_squared = ab.length_squared();
    if length_squared <= f32::MIN_POSITIVE {
        return (a, [1.0, 0.0]);
    }
    let t = (-a.dot(ab) / length_squared).clamp(0.0, 1.0);
    (a + ab * t, [1.0 - t, t])
}

/// Closest point of a triangle to the origin and the weights of its vertices.
/// Vertices outside the closest feature get a weight of exactly zero.
fn solve_triangle(a: Vec3, b: Vec3, c: Vec3) -> (Vec3, [f32; 3]) {
    let (ab, ac, ap) = (b - a, c - a, -a);
    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return (a, [1.0, 0.0, 0.0]);
    }
    let bp = -b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= 0.0 && d4 <= d3 {
        return (b, [0.0, 1.0, 0.0]);
    }
    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return (a + ab * v, [1.0 - v, v, 0.0]);
    }
    let cp = -c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 {
        return (c, [0.0, 0.0, 1.0]);
    }
    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return (a + ac * w, [1.0 - w, 0.0, w]);
    }
    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return (b + (c - b) * w, [0.0, 1.0 - w, w]);
    }
    let denominator = va + vb + vc;
    if denominator.abs() <= f32::MIN_POSITIVE {
        // Degenerate triangle; fall back to its best edge.
        let (p, [s, t]) = solve_segment(a, b);
        return (p, [s, t, 0.0]);
    }
    let v = vb / denominator;
    let w = vc / denominator;
    (a + ab * v + ac * w, [1.0 - v - w, v, w])
}

/// Reduces the simplex to the feature closest to the origin and returns the closest point.
/// Returns `None` if the origin is enclosed by a tetrahedron.
fn solve_simplex(simplex: &mut Vec<SupportPoint>, weights: &mut Vec<f32>) -> Option<Vec3> {
    let keep = |simplex: &mut Vec<SupportPoint>, weights: &mut Vec<f32>, candidate: &[(usize, f32)]| {
        let kept: Vec<(SupportPoint, f32)> = candidate
            .iter()
            .filter(|(_, w)| *w > 0.0)
            .map(|&(i, w)| (simplex[i], w))
            .collect();
        simplex.clear();
        weights.clear();
        for (point, weight) in kept {
            simplex.push(point);
            weights.push(weight);
        }
    };

    match simplex.len() {
        1 => {
            weights.clear();
            weights.push(1.0);
            Some(simplex[0].point)
        }
        2 => {
            let (p, [s, t]) = solve_segment(simplex[0].point, simplex[1].point);
            keep(simplex, weights, &[(0, s), (1, t)]);
            Some(p)
        }
        3 => {
            let (p, [u, v, w]) = solve_triangle(simplex[0].point, simplex[1].point, simplex[2].point);
            keep(simplex, weights, &[(0, u), (1, v), (2, w)]);
            Some(p)
        }
        _ => {
            let points = [simplex[0].point, simplex[1].point, simplex[2].point, simplex[3].point];
            let volume = (points[1] - points[0]).cross(points[2] - points[0]).dot(points[3] - points[0]);
            let degenerate = volume.abs() <= 1e-12 * points.iter().map(|p| p.length_squared()).fold(1.0, f32::max);
            const FACES: [([usize; 3], usize); 4] = [([0, 1, 2], 3), ([0, 1, 3], 2), ([0, 2, 3], 1), ([1, 2, 3], 0)];
            let mut best: Option<(Vec3, [(usize, f32); 3])> = None;
            for (face, opposite) in FACES {
                let [a, b, c] = face.map(|i| points[i]);
                let normal = (b - a).cross(c - a);
                let origin_side = normal.dot(-a);
                let opposite_side = normal.dot(points[opposite] - a);
                if !degenerate && origin_side * opposite_side >= 0.0 {
                    continue;
                }
                let (p, [u, v, w]) = solve_triangle(a, b, c);
                if best.map_or(true, |(q, _)| p.length_squared() < q.length_squared()) {
                    best = Some((p, [(face[0], u), (face[1], v), (face[2], w)]));
                }
            }
            match best {
                Some((p, candidate)) => {
                    keep(simplex, weights, &candidate);
                    Some(p)
                }
                None => None,
            }
        }
    }
}

impl Gjk {
    pub fn new(max_iterations: usize, epsilon: f32) -> Self {
        Self { max_iterations, epsilon }
    }

    pub fn from_settings(settings: &CollisionSettings) -> Self {
        Self::new(settings.gjk_max_iterations, settings.epsilon)
    }

    /// Computes the distance between the shapes of a Minkowski difference, or reports that they intersect.
    pub fn distance(&self, difference: &MinkowskiDifference) -> GjkResult {
        let mut direction = difference.center();
        if direction.length_squared() <= f32::MIN_POSITIVE {
            direction = Vec3::X;
        }
        let mut simplex = vec![difference.support(-direction)];
        let mut weights = vec![1.0];
        let mut closest = simplex[0].point;
        let mut scale = closest.length().max(1.0);

        for _ in 0..self.max_iterations {
            let distance_squared = closest.length_squared();
            if distance_squared <= (self.epsilon * scale).powi(2) {
                return GjkResult::Intersecting { simplex };
            }
            let candidate = difference.support(-closest);
            scale = scale.max(candidate.point.length());
            // No more progress toward the origin: the current simplex holds the closest feature.
            let progress = distance_squared - closest.dot(candidate.point);
            if progress <= self.epsilon * distance_squared
                || simplex.iter().any(|s| s.point == candidate.point)
            {
                return Self::separated(&simplex, &weights, closest);
            }

            simplex.push(candidate);
            match solve_simplex(&mut simplex, &mut weights) {
                None => return GjkResult::Intersecting { simplex },
                Some(next) => {
                    if next.length_squared() >= distance_squared {
                        // Rounding stalled the search; keep the last improving answer.
                        return Self::separated(&simplex, &weights, next);
                    }
                    closest = next;
                }
            }
        }
        warn!("GJK did not converge in {} iterations.", self.max_iterations);
        Self::separated(&simplex, &weights, closest)
    }

    fn separated(simplex: &[SupportPoint], weights: &[f32], closest: Vec3) -> GjkResult {
        let (mut point_a, mut point_b) = (Vec3::ZERO, Vec3::ZERO);
        for (vertex, &weight) in simplex.iter().zip(weights) {
            point_a += vertex.on_a * weight;
            point_b += vertex.on_b * weight;
        }
        GjkResult::Separated {
            distance: closest.length(),
            point_a,
            point_b,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::collidables::box_shape::BoxShape;
    use crate::physics::collidables::capsule::Capsule;
    use crate::physics::collidables::sphere::Sphere;
    use crate::physics::collision_detection::support_finder::PosedConvex;
    use crate::physics::rigid_pose::RigidPose;
    use approx::assert_relative_eq;
    use glam::Quat;

    #[test]
    fn separated_boxes() {
        let cube = BoxShape::new(Vec3::ONE).unwrap();
        let (pose_a, pose_b) = (RigidPose::IDENTITY, RigidPose::from_position(Vec3::new(3.0, 0.5, 0.0)));
        let difference = MinkowskiDifference::new(PosedConvex::new(&cube, &pose_a), PosedConvex::new(&cube, &pose_b));
        match Gjk::default().distance(&difference) {
            GjkResult::Separated { distance, point_a, point_b } => {
                assert_relative_eq!(distance, 1.0, epsilon = 1e-4);
                assert_relative_eq!(point_a.x, 1.0, epsilon = 1e-4);
                assert_relative_eq!(point_b.x, 2.0, epsilon = 1e-4);
            }
            other => panic!("expected separation, got {other:?}"),
        }
    }

    #[test]
    fn overlapping_rotated_boxes() {
        let cube = BoxShape::new(Vec3::ONE).unwrap();
        let pose_a = RigidPose::IDENTITY;
        let pose_b = RigidPose::new(Vec3::new(1.5, 0.3, 0.2), Quat::from_rotation_y(0.7));
        let difference = MinkowskiDifference::new(PosedConvex::new(&cube, &pose_a), PosedConvex::new(&cube, &pose_b));
        assert!(matches!(Gjk::default().distance(&difference), GjkResult::Intersecting { .. }));
    }

    #[test]
    fn core_distance_between_capsule_and_sphere() {
        let capsule = Capsule::new(0.5, 2.0).unwrap();
        let sphere = Sphere::new(1.0).unwrap();
        let pose_a = RigidPose::IDENTITY;
        let pose_b = RigidPose::from_position(Vec3::new(4.0, 1.0, 0.0));
        let difference =
            MinkowskiDifference::of_cores(PosedConvex::new(&capsule, &pose_a), PosedConvex::new(&sphere, &pose_b));
        match Gjk::default().distance(&difference) {
            GjkResult::Separated { distance, point_a, point_b } => {
                assert_relative_eq!(distance, 4.0, epsilon = 1e-4);
                assert_relative_eq!(point_a, Vec3::new(0.0, 1.0, 0.0), epsilon = 1e-4);
                assert_relative_eq!(point_b, pose_b.position, epsilon = 1e-4);
            }
            other => panic!("expected separation, got {other:?}"),
        }
    }

    #[test]
    fn triangle_solver_regions() {
        let (p, w) = solve_triangle(Vec3::new(1.0, -1.0, 1.0), Vec3::new(1.0, 1.0, 1.0), Vec3::new(-3.0, 0.0, 1.0));
        assert_relative_eq!(p, Vec3::new(0.0, 0.0, 1.0), epsilon = 1e-6);
        assert!(w.iter().all(|&x| x > 0.0));
        let (p, w) = solve_triangle(Vec3::new(1.0, 1.0, 0.0), Vec3::new(2.0, 1.0, 0.0), Vec3::new(1.0, 2.0, 0.0));
        assert_eq!(p, Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(w, [1.0, 0.0, 0.0]);
        assert_eq!(barycentric(Vec3::new(0.5, 0.5, 0.0), Vec3::ZERO, Vec3::X, Vec3::Y), [0.0, 0.5, 0.5]);
    }
}
