use std::cmp::Ordering;
use std::collections::BinaryHeap;

use glam::Vec3;
use log::{trace, warn};

use super::gjk::barycentric;
use super::support_finder::{MinkowskiDifference, SupportPoint};
use crate::config::CollisionSettings;
use crate::utilities::math_helper::build_orthonormal_basis;

/// Penetration of two intersecting shapes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Penetration {
    /// Unit normal pointing from A to B; moving B by `normal * depth` separates the shapes.
    pub normal: Vec3,
    pub depth: f32,
    /// Deepest point of A inside B.
    pub point_a: Vec3,
    /// Deepest point of B inside A.
    pub point_b: Vec3,
}

#[derive(Clone, Copy, Debug)]
struct PolytopeFace {
    vertices: [usize; 3],
    normal: Vec3,
    distance: f32,
    alive: bool,
}

/// Heap entry ordering faces by distance, closest first.
#[derive(Clone, Copy, Debug)]
struct FaceCandidate {
    distance: f32,
    face: usize,
}

impl PartialEq for FaceCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FaceCandidate {}

impl PartialOrd for FaceCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FaceCandidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .distance
            .total_cmp(&self.distance)
            .then_with(|| other.face.cmp(&self.face))
    }
}

/// Adds a horizon edge, or cancels it against its reverse when both neighbors of the edge are removed.
fn add_edge(edges: &mut Vec<(usize, usize)>, a: usize, b: usize) {
    match edges.iter().position(|&(from, to)| from == b && to == a) {
        Some(index) => {
            edges.swap_remove(index);
        }
        None => edges.push((a, b)),
    }
}

/// Expanding polytope algorithm: finds the penetration of two shapes whose Minkowski difference contains the origin.
#[derive(Clone, Copy, Debug)]
pub struct Epa {
    pub max_iterations: usize,
    pub epsilon: f32,
}

impl Default for Epa {
    fn default() -> Self {
        Self::from_settings(&CollisionSettings::default())
    }
}

impl Epa {
    pub fn new(max_iterations: usize, epsilon: f32) -> Self {
        Self { max_iterations, epsilon }
    }

    pub fn from_settings(settings: &CollisionSettings) -> Self {
        Self::new(settings.epa_max_iterations, settings.epsilon)
    }

    /// Grows a GJK terminal simplex into a tetrahedron. Returns `None` if the difference is flat.
    fn blow_up(difference: &MinkowskiDifference, simplex: &[SupportPoint], tolerance: f32) -> Option<Vec<SupportPoint>> {
        let mut points: Vec<SupportPoint> = simplex.to_vec();
        if points.is_empty() {
            points.push(difference.support(Vec3::X));
        }
        if points.len() == 1 {
            let origin = points[0].point;
            let found = [Vec3::X, -Vec3::X, Vec3::Y, -Vec3::Y, Vec3::Z, -Vec3::Z]
                .into_iter()
                .map(|d| difference.support(d))
                .find(|s| s.point.distance(origin) > tolerance)?;
            points.push(found);
        }
        if points.len() == 2 {
            let axis = points[1].point - points[0].point;
            let (u, v) = build_orthonormal_basis(axis.normalize());
            let found = (0..6)
                .map(|k| {
                    let angle = k as f32 * std::f32::consts::FRAC_PI_3;
                    difference.support(u * angle.cos() + v * angle.sin())
                })
                .find(|s| axis.cross(s.point - points[0].point).length() > tolerance * axis.length())?;
            points.push(found);
        }
        if points.len() == 3 {
            let normal = (points[1].point - points[0].point).cross(points[2].point - points[0].point);
            let above = difference.support(normal);
            let below = difference.support(-normal);
            let height = |s: &SupportPoint| normal.dot(s.point - points[0].point).abs();
            let best = if height(&above) >= height(&below) { above } else { below };
            if height(&best) <= tolerance * normal.length() {
                return None;
            }
            points.push(best);
        }
        points.truncate(4);
        Some(points)
    }

    /// Computes the penetration normal and depth from a simplex enclosing the origin.
    /// Returns `None` if the polytope degenerates.
    pub fn penetration(&self, difference: &MinkowskiDifference, simplex: &[SupportPoint]) -> Option<Penetration> {
        let scale = simplex.iter().map(|s| s.point.length()).fold(1.0, f32::max);
        let tolerance = self.epsilon * scale;
        let mut vertices = Self::blow_up(difference, simplex, tolerance)?;

        let centroid = vertices.iter().map(|s| s.point).sum::<Vec3>() * 0.25;
        let mut faces: Vec<PolytopeFace> = Vec::new();
        let mut heap = BinaryHeap::new();
        let make_face = |vertices: &[SupportPoint], indices: [usize; 3]| -> Option<PolytopeFace> {
            let [a, b, c] = indices.map(|i| vertices[i].point);
            let normal = (b - a).cross(c - a);
            let length = normal.length();
            if length <= f32::MIN_POSITIVE {
                return None;
            }
            let normal = normal / length;
            Some(PolytopeFace {
                vertices: indices,
                normal,
                distance: normal.dot(a),
                alive: true,
            })
        };
        for indices in [[0, 1, 2], [0, 3, 1], [0, 2, 3], [1, 3, 2]] {
            let mut indices = indices;
            let [a, b, c] = indices.map(|i| vertices[i].point);
            if (b - a).cross(c - a).dot(a - centroid) < 0.0 {
                indices.swap(1, 2);
            }
            let face = make_face(&vertices, indices)?;
            heap.push(FaceCandidate {
                distance: face.distance,
                face: faces.len(),
            });
            faces.push(face);
        }

        let mut best = None;
        for _ in 0..self.max_iterations {
            let closest = loop {
                let candidate = heap.pop()?;
                if faces[candidate.face].alive {
                    break candidate.face;
                }
            };
            let face = faces[closest];
            best = Some(face);
            let support = difference.support(face.normal);
            let gap = support.point.dot(face.normal) - face.distance;
            if gap <= tolerance.max(self.epsilon * face.distance.abs()) {
                return Some(Self::finish(&vertices, &face));
            }

            let new_index = vertices.len();
            vertices.push(support);
            let mut horizon = Vec::new();
            for f in faces.iter_mut().filter(|f| f.alive) {
                let anchor = vertices[f.vertices[0]].point;
                if f.normal.dot(support.point - anchor) > 0.0 {
                    f.alive = false;
                    let [a, b, c] = f.vertices;
                    add_edge(&mut horizon, a, b);
                    add_edge(&mut horizon, b, c);
                    add_edge(&mut horizon, c, a);
                }
            }
            for (a, b) in horizon {
                match make_face(&vertices, [a, b, new_index]) {
                    Some(new_face) => {
                        heap.push(FaceCandidate {
                            distance: new_face.distance,
                            face: faces.len(),
                        });
                        faces.push(new_face);
                    }
                    None => trace!("Skipped a degenerate polytope face."),
                }
            }
        }

        warn!("EPA did not converge in {} iterations; using the closest face found.", self.max_iterations);
        best.map(|face| Self::finish(&vertices, &face))
    }

    fn finish(vertices: &[SupportPoint], face: &PolytopeFace) -> Penetration {
        let [a, b, c] = face.vertices.map(|i| vertices[i]);
        let projection = face.normal * face.distance;
        let [u, v, w] = barycentric(projection, a.point, b.point, c.point);
        Penetration {
            normal: face.normal,
            depth: face.distance,
            point_a: a.on_a * u + b.on_a * v + c.on_a * w,
            point_b: a.on_b * u + b.on_b * v + c.on_b * w,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::collidables::box_shape::BoxShape;
    use crate::physics::collision_detection::gjk::{Gjk, GjkResult};
    use crate::physics::collision_detection::support_finder::PosedConvex;
    use crate::physics::rigid_pose::RigidPose;
    use approx::assert_relative_eq;

    fn penetrate(difference: &MinkowskiDifference) -> Penetration {
        match Gjk::default().distance(difference) {
            GjkResult::Intersecting { simplex } => Epa::default().penetration(difference, &simplex).unwrap(),
            other => panic!("expected intersection, got {other:?}"),
        }
    }

    #[test]
    fn overlapping_boxes() {
        let cube = BoxShape::new(Vec3::ONE).unwrap();
        let (pose_a, pose_b) = (RigidPose::IDENTITY, RigidPose::from_position(Vec3::new(1.8, 0.2, -0.1)));
        let difference = MinkowskiDifference::new(PosedConvex::new(&cube, &pose_a), PosedConvex::new(&cube, &pose_b));
        let penetration = penetrate(&difference);
        assert_relative_eq!(penetration.normal, Vec3::X, epsilon = 1e-4);
        assert_relative_eq!(penetration.depth, 0.2, epsilon = 1e-4);
        assert_relative_eq!(penetration.point_a.x, 1.0, epsilon = 1e-4);
        assert_relative_eq!(penetration.point_b.x, 0.8, epsilon = 1e-4);
    }

    #[test]
    fn coincident_boxes() {
        let cube = BoxShape::new(Vec3::ONE).unwrap();
        let pose = RigidPose::IDENTITY;
        let difference = MinkowskiDifference::new(PosedConvex::new(&cube, &pose), PosedConvex::new(&cube, &pose));
        let penetration = penetrate(&difference);
        // Pushing either box out through a face takes the full width.
        assert_relative_eq!(penetration.depth, 2.0, epsilon = 1e-3);
        assert_relative_eq!(penetration.normal.abs().max_element(), 1.0, epsilon = 1e-3);
    }

    #[test]
    fn horizon_edges_cancel() {
        let mut edges = Vec::new();
        add_edge(&mut edges, 0, 1);
        add_edge(&mut edges, 1, 2);
        add_edge(&mut edges, 1, 0);
        assert_eq!(edges, vec![(1, 2)]);
    }
}
