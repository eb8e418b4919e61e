use std::collections::{HashMap, HashSet, VecDeque};

use glam::Vec3;
use log::{trace, warn};

use super::dcel_mesh::DcelMesh;
use crate::error::{CollisionError, Result};

/// Triangle of the hull under construction.
#[derive(Clone, Debug)]
struct HullTriangle {
    vertices: [u32; 3],
    normal: Vec3,
    offset: f32,
    alive: bool,
    /// Points in front of this triangle that are not yet on the hull.
    conflicts: Vec<u32>,
}

impl HullTriangle {
    fn new(points: &[Vec3], vertices: [u32; 3]) -> Self {
        let [a, b, c] = vertices.map(|v| points[v as usize]);
        let normal = (b - a).cross(c - a).normalize_or_zero();
        Self {
            vertices,
            normal,
            offset: normal.dot(a),
            alive: true,
            conflicts: Vec::new(),
        }
    }

    #[inline(always)]
    fn distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) - self.offset
    }

    #[inline(always)]
    fn edges(&self) -> [(u32, u32); 3] {
        let [a, b, c] = self.vertices;
        [(a, b), (b, c), (c, a)]
    }
}

/// Builds convex hulls of point clouds incrementally.
///
/// Each hull triangle keeps a conflict list of the points in front of it. The farthest conflict point is added by
/// removing every triangle it can see and connecting the horizon to it. Coplanar triangles of the finished hull are
/// merged into polygons.
#[derive(Clone, Copy, Debug)]
pub struct ConvexHullBuilder {
    /// Distance tolerance relative to the size of the point cloud.
    pub relative_tolerance: f32,
    /// Faces whose normals satisfy `dot >= 1 - coplanar_tolerance` are merged.
    pub coplanar_tolerance: f32,
}

impl Default for ConvexHullBuilder {
    fn default() -> Self {
        Self {
            relative_tolerance: 1e-5,
            coplanar_tolerance: 1e-5,
        }
    }
}

impl ConvexHullBuilder {
    pub fn new(relative_tolerance: f32, coplanar_tolerance: f32) -> Self {
        Self {
            relative_tolerance,
            coplanar_tolerance,
        }
    }

    /// Finds four points spanning a tetrahedron, or fails if the cloud is flat.
    fn initial_simplex(points: &[Vec3], tolerance: f32) -> Result<[u32; 4]> {
        let degenerate = |what: &str| -> Result<[u32; 4]> {
            warn!("Convex hull input of {} points is {what}.", points.len());
            Err(CollisionError::DegenerateMesh(format!("Convex hull input is {what}.")))
        };
        let farthest = |score: &dyn Fn(Vec3) -> f32| {
            points
                .iter()
                .enumerate()
                .map(|(i, &p)| (i as u32, score(p)))
                .fold((0u32, f32::NEG_INFINITY), |best, next| if next.1 > best.1 { next } else { best })
        };

        let (i0, _) = farthest(&|p: Vec3| -p.x);
        let p0 = points[i0 as usize];
        let (i1, d1) = farthest(&|p: Vec3| p.distance(p0));
        if d1 <= tolerance {
            return degenerate("a single point");
        }
        let p1 = points[i1 as usize];
        let axis = (p1 - p0).normalize();
        let (i2, d2) = farthest(&|p: Vec3| {
            let offset = p - p0;
            (offset - axis * offset.dot(axis)).length()
        });
        if d2 <= tolerance {
            return degenerate("collinear");
        }
        let p2 = points[i2 as usize];
        let normal = (p1 - p0).cross(p2 - p0).normalize();
        let (i3, d3) = farthest(&|p: Vec3| normal.dot(p - p0).abs());
        if d3 <= tolerance {
            return degenerate("coplanar");
        }
        Ok([i0, i1, i2, i3])
    }

    /// Computes the hull of `points` as a closed convex mesh with merged coplanar faces.
    pub fn build(&self, points: &[Vec3]) -> Result<DcelMesh> {
        if let Some(bad) = points.iter().find(|p| !p.is_finite()) {
            return Err(CollisionError::DegenerateMesh(format!("Convex hull input contains {bad}.")));
        }
        if points.len() < 4 {
            return Err(CollisionError::DegenerateMesh(format!(
                "A convex hull needs at least 4 points, got {}.",
                points.len()
            )));
        }
        let extent = points
            .iter()
            .fold(Vec3::ZERO, |m, p| m.max(p.abs()))
            .max_element()
            .max(1e-6);
        let tolerance = self.relative_tolerance * extent;

        let [i0, i1, i2, i3] = Self::initial_simplex(points, tolerance)?;
        let mut triangles: Vec<HullTriangle> = Vec::new();
        let mut edge_owner: HashMap<(u32, u32), usize> = HashMap::new();
        let add_triangle = |triangles: &mut Vec<HullTriangle>, edge_owner: &mut HashMap<(u32, u32), usize>, v: [u32; 3]| {
            let index = triangles.len();
            let triangle = HullTriangle::new(points, v);
            for edge in triangle.edges() {
                edge_owner.insert(edge, index);
            }
            triangles.push(triangle);
            index
        };

        // Orient the simplex so its faces point away from the fourth vertex.
        let (a, b, c) = if HullTriangle::new(points, [i0, i1, i2]).distance(points[i3 as usize]) > 0.0 {
            (i0, i2, i1)
        } else {
            (i0, i1, i2)
        };
        for v in [[a, b, c], [a, i3, b], [b, i3, c], [c, i3, a]] {
            add_triangle(&mut triangles, &mut edge_owner, v);
        }

        let simplex = [i0, i1, i2, i3];
        let assign = |triangles: &mut [HullTriangle], candidates: &[usize], point: u32| {
            let position = points[point as usize];
            let best = candidates
                .iter()
                .map(|&t| (t, triangles[t].distance(position)))
                .filter(|&(_, d)| d > tolerance)
                .max_by(|x, y| x.1.total_cmp(&y.1));
            if let Some((t, _)) = best {
                triangles[t].conflicts.push(point);
            }
        };
        let all: Vec<usize> = (0..triangles.len()).collect();
        for point in 0..points.len() as u32 {
            if !simplex.contains(&point) {
                assign(&mut triangles, &all, point);
            }
        }

        let iteration_limit = points.len() * 4 + 64;
        let mut iterations = 0;
        while let Some(seed) = triangles.iter().position(|t| t.alive && !t.conflicts.is_empty()) {
            iterations += 1;
            if iterations > iteration_limit {
                warn!("Convex hull did not converge after {iteration_limit} iterations; using the partial hull.");
                break;
            }
            let eye = triangles[seed]
                .conflicts
                .iter()
                .copied()
                .max_by(|&x, &y| {
                    let dx = triangles[seed].distance(points[x as usize]);
                    let dy = triangles[seed].distance(points[y as usize]);
                    dx.total_cmp(&dy)
                })
                .unwrap_or(triangles[seed].conflicts[0]);
            let eye_position = points[eye as usize];

            // Flood the triangles visible from the eye.
            let mut visible = HashSet::from([seed]);
            let mut queue = VecDeque::from([seed]);
            while let Some(t) = queue.pop_front() {
                for (from, to) in triangles[t].edges() {
                    if let Some(&neighbor) = edge_owner.get(&(to, from)) {
                        if !visible.contains(&neighbor) && triangles[neighbor].distance(eye_position) > tolerance {
                            visible.insert(neighbor);
                            queue.push_back(neighbor);
                        }
                    }
                }
            }

            let mut horizon = Vec::new();
            let mut orphans = Vec::new();
            let mut visible_sorted: Vec<usize> = visible.iter().copied().collect();
            visible_sorted.sort_unstable();
            for &t in &visible_sorted {
                for (from, to) in triangles[t].edges() {
                    let across = edge_owner.get(&(to, from)).copied();
                    if across.map_or(true, |n| !visible.contains(&n)) {
                        horizon.push((from, to));
                    }
                }
                orphans.append(&mut triangles[t].conflicts);
                triangles[t].alive = false;
            }
            for &t in &visible_sorted {
                for edge in triangles[t].edges() {
                    if edge_owner.get(&edge) == Some(&t) {
                        edge_owner.remove(&edge);
                    }
                }
            }

            let created: Vec<usize> = horizon
                .iter()
                .map(|&(from, to)| add_triangle(&mut triangles, &mut edge_owner, [from, to, eye]))
                .collect();
            for point in orphans {
                if point != eye {
                    assign(&mut triangles, &created, point);
                }
            }
        }

        let polygons: Vec<Vec<u32>> = triangles
            .iter()
            .filter(|t| t.alive)
            .map(|t| t.vertices.to_vec())
            .collect();
        trace!("Convex hull of {} points has {} triangles.", points.len(), polygons.len());
        let mut mesh = DcelMesh::from_polygons(points, &polygons)?;
        mesh.merge_coplanar_faces(self.coplanar_tolerance, tolerance * 10.0)?;
        Ok(mesh)
    }
}
