use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap};

use glam::Vec3;
use log::{debug, trace};

use super::dcel_mesh::DcelMesh;
use super::triangle_mesh::TriangleMesh;
use crate::error::{CollisionError, Result};
use crate::physics::collidables::compound::Composite;
use crate::physics::collidables::convex_hull::ConvexHull;
use crate::physics::collidables::Shape;
use crate::physics::rigid_pose::RigidPose;

/// A connected set of triangles that is merged as one part.
#[derive(Clone, Debug)]
struct Cluster {
    triangles: Vec<usize>,
    vertices: BTreeSet<u32>,
    neighbors: BTreeSet<usize>,
    version: u32,
}

/// A proposed merge of two adjacent clusters.
#[derive(Clone, Copy, Debug)]
struct MergeCandidate {
    concavity: f32,
    a: usize,
    b: usize,
    version_a: u32,
    version_b: u32,
}

impl PartialEq for MergeCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MergeCandidate {}

impl PartialOrd for MergeCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MergeCandidate {
    // Reversed so the max-heap pops the least concave merge first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .concavity
            .total_cmp(&self.concavity)
            .then_with(|| (other.a, other.b).cmp(&(self.a, self.b)))
    }
}

/// Splits a triangle mesh into convex parts by greedily merging adjacent triangle clusters.
///
/// Every triangle starts as its own cluster. The pair of adjacent clusters whose union is least concave is merged
/// next, until every remaining merge would exceed `allowed_concavity`. The concavity of a cluster is the largest
/// distance a point of one of its triangles travels along the triangle normal before leaving the cluster's hull.
/// Flat clusters are extruded backwards into a thin slab so they still form a solid part.
#[derive(Clone, Copy, Debug)]
pub struct ConvexDecomposition {
    pub allowed_concavity: f32,
    /// When set, every part is reduced to at most this many vertices.
    pub vertex_limit: Option<usize>,
    /// Every part is grown outward by this distance.
    pub skin_width: f32,
    /// Thickness of the slab built from flat clusters, relative to the size of the mesh.
    pub relative_extrusion: f32,
}

impl Default for ConvexDecomposition {
    fn default() -> Self {
        Self {
            allowed_concavity: 0.1,
            vertex_limit: None,
            skin_width: 0.0,
            relative_extrusion: 1e-3,
        }
    }
}

/// Triangle data shared by the concavity evaluations of one decomposition.
struct Surface<'a> {
    mesh: &'a TriangleMesh,
    normals: Vec<Vec3>,
    extrusion: f32,
}

impl Surface<'_> {
    /// Hull of a set of triangles, extruding flat sets along their average back side.
    fn hull(&self, triangles: &[usize], vertices: &BTreeSet<u32>) -> Result<DcelMesh> {
        let points: Vec<Vec3> = vertices.iter().map(|&v| self.mesh.vertices[v as usize]).collect();
        match DcelMesh::from_convex_hull(&points) {
            Err(CollisionError::DegenerateMesh(_)) => {
                let normal = triangles
                    .iter()
                    .map(|&t| self.normals[t])
                    .sum::<Vec3>()
                    .try_normalize()
                    .unwrap_or(Vec3::Y);
                let offset = normal * self.extrusion;
                let slab: Vec<Vec3> = points.iter().flat_map(|&p| [p, p - offset]).collect();
                DcelMesh::from_convex_hull(&slab)
            }
            result => result,
        }
    }

    /// Largest distance a point of the triangles travels along its triangle normal before leaving the hull.
    fn concavity(&self, triangles: &[usize], hull: &DcelMesh) -> f32 {
        let planes: Vec<(Vec3, f32)> = hull.face_ids().map(|face| hull.face_plane(face)).collect();
        let exit_distance = |point: Vec3, direction: Vec3| {
            planes
                .iter()
                .filter_map(|&(normal, offset)| {
                    let approach = normal.dot(direction);
                    (approach > 1e-6).then(|| (offset - normal.dot(point)) / approach)
                })
                .fold(f32::INFINITY, f32::min)
        };
        let mut concavity = 0.0f32;
        for &t in triangles {
            let direction = self.normals[t];
            if direction == Vec3::ZERO {
                continue;
            }
            let corners = self.mesh.triangle(t);
            let centroid = (corners[0] + corners[1] + corners[2]) / 3.0;
            // Samples sit inside the triangle so rays from hull edges don't graze neighboring faces.
            let samples = corners.map(|corner| corner.lerp(centroid, 0.1));
            for point in samples.into_iter().chain([centroid]) {
                let distance = exit_distance(point, direction);
                if distance.is_finite() {
                    concavity = concavity.max(distance);
                }
            }
        }
        concavity
    }
}

impl ConvexDecomposition {
    pub fn new(allowed_concavity: f32) -> Self {
        Self {
            allowed_concavity,
            ..Default::default()
        }
    }

    pub fn with_vertex_limit(mut self, vertex_limit: usize) -> Self {
        self.vertex_limit = Some(vertex_limit);
        self
    }

    pub fn with_skin_width(mut self, skin_width: f32) -> Self {
        self.skin_width = skin_width;
        self
    }

    fn validate(&self) -> Result<()> {
        if !self.allowed_concavity.is_finite() || self.allowed_concavity < 0.0 {
            return Err(CollisionError::InvalidArgument(format!(
                "Allowed concavity must be a finite non-negative number, got {}.",
                self.allowed_concavity
            )));
        }
        if !(self.relative_extrusion > 0.0 && self.relative_extrusion.is_finite()) {
            return Err(CollisionError::InvalidArgument(format!(
                "Relative extrusion must be positive, got {}.",
                self.relative_extrusion
            )));
        }
        if matches!(self.vertex_limit, Some(limit) if limit < 4) {
            return Err(CollisionError::InvalidArgument(
                "The vertex limit of a convex part must be at least 4.".to_string(),
            ));
        }
        Ok(())
    }

    /// Decomposes a mesh into convex parts. An empty mesh has no parts.
    pub fn decompose(&self, mesh: &TriangleMesh) -> Result<Vec<ConvexHull>> {
        self.validate()?;
        if mesh.is_empty() {
            return Ok(Vec::new());
        }
        let mut mesh = mesh.clone();
        let extent = mesh.bounding_box().extents().max_element();
        if !extent.is_finite() {
            return Err(CollisionError::DegenerateMesh("The mesh has non-finite vertices.".to_string()));
        }
        mesh.weld_vertices(extent * 1e-5);
        if mesh.is_empty() {
            return Ok(Vec::new());
        }

        let normals: Vec<Vec3> = (0..mesh.triangle_count())
            .map(|t| {
                let [a, b, c] = mesh.triangle(t);
                (b - a).cross(c - a).normalize_or_zero()
            })
            .collect();
        let surface = Surface {
            mesh: &mesh,
            normals,
            extrusion: (extent * self.relative_extrusion).max(1e-6),
        };

        let mut clusters: Vec<Option<Cluster>> = mesh
            .edge_adjacency()
            .into_iter()
            .enumerate()
            .map(|(t, adjacent)| {
                Some(Cluster {
                    triangles: vec![t],
                    vertices: mesh.indices[t].into_iter().collect(),
                    neighbors: adjacent.into_iter().flatten().filter(|&n| n != t).collect(),
                    version: 0,
                })
            })
            .collect();

        let mut heap = BinaryHeap::new();
        for a in 0..clusters.len() {
            let neighbors: Vec<usize> = match &clusters[a] {
                Some(cluster) => cluster.neighbors.iter().copied().filter(|&b| b > a).collect(),
                None => continue,
            };
            for b in neighbors {
                if let Some(candidate) = self.evaluate(&surface, &clusters, a, b) {
                    heap.push(candidate);
                }
            }
        }

        let mut merges = 0;
        while let Some(candidate) = heap.pop() {
            if candidate.concavity > self.allowed_concavity {
                break;
            }
            let current = |index: usize, version: u32| {
                clusters[index].as_ref().is_some_and(|cluster| cluster.version == version)
            };
            if !current(candidate.a, candidate.version_a) || !current(candidate.b, candidate.version_b) {
                continue;
            }
            let Some(absorbed) = clusters[candidate.b].take() else {
                continue;
            };
            for &neighbor in &absorbed.neighbors {
                if let Some(cluster) = clusters[neighbor].as_mut() {
                    cluster.neighbors.remove(&candidate.b);
                    if neighbor != candidate.a {
                        cluster.neighbors.insert(candidate.a);
                    }
                }
            }
            let neighbors: Vec<usize> = {
                let Some(merged) = clusters[candidate.a].as_mut() else {
                    continue;
                };
                merged.triangles.extend(absorbed.triangles);
                merged.vertices.extend(absorbed.vertices);
                merged.neighbors.extend(absorbed.neighbors);
                merged.neighbors.remove(&candidate.a);
                merged.neighbors.remove(&candidate.b);
                merged.version += 1;
                merged.neighbors.iter().copied().collect()
            };
            merges += 1;
            trace!(
                "Merged clusters {} and {} with concavity {:.5}.",
                candidate.a,
                candidate.b,
                candidate.concavity
            );
            for neighbor in neighbors {
                if let Some(next) = self.evaluate(&surface, &clusters, candidate.a, neighbor) {
                    heap.push(next);
                }
            }
        }

        let parts = clusters
            .iter()
            .flatten()
            .map(|cluster| {
                let mut hull = surface.hull(&cluster.triangles, &cluster.vertices)?;
                if self.vertex_limit.is_some() || self.skin_width != 0.0 {
                    hull.modify_convex(self.vertex_limit.unwrap_or(usize::MAX), self.skin_width)?;
                }
                ConvexHull::from_mesh(&hull)
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(
            "Decomposed {} triangles into {} convex parts after {} merges.",
            mesh.triangle_count(),
            parts.len(),
            merges
        );
        Ok(parts)
    }

    /// Decomposes a mesh and wraps the parts in a composite shape.
    pub fn decompose_to_composite(&self, mesh: &TriangleMesh) -> Result<Shape> {
        to_composite(self.decompose(mesh)?)
    }

    fn evaluate(&self, surface: &Surface, clusters: &[Option<Cluster>], a: usize, b: usize) -> Option<MergeCandidate> {
        let (first, second) = (clusters[a].as_ref()?, clusters[b].as_ref()?);
        let triangles: Vec<usize> = first.triangles.iter().chain(&second.triangles).copied().collect();
        let vertices: BTreeSet<u32> = first.vertices.union(&second.vertices).copied().collect();
        let hull = match surface.hull(&triangles, &vertices) {
            Ok(hull) => hull,
            Err(error) => {
                trace!("Clusters {a} and {b} have no hull: {error}");
                return None;
            }
        };
        Some(MergeCandidate {
            concavity: surface.concavity(&triangles, &hull),
            a,
            b,
            version_a: first.version,
            version_b: second.version,
        })
    }
}

/// A composite shape with one child per convex part, all at the identity pose.
pub fn to_composite(parts: Vec<ConvexHull>) -> Result<Shape> {
    let children = parts.into_iter().map(|part| (RigidPose::IDENTITY, Shape::from(part))).collect();
    Ok(Shape::Composite(Composite::new(children)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cube(center: Vec3, half: f32) -> TriangleMesh {
        let bounds = crate::utilities::bounding_box::BoundingBox::new(center - Vec3::splat(half), center + Vec3::splat(half));
        DcelMesh::from_box(&bounds).unwrap().to_triangle_mesh()
    }

    /// Two planks meeting at a right angle along the z axis, open upwards.
    fn trough() -> TriangleMesh {
        let left = [Vec3::new(-1.0, 1.0, 0.0), Vec3::new(0.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 1.0), Vec3::new(-1.0, 1.0, 1.0)];
        let right = [Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 0.0), Vec3::new(1.0, 1.0, 1.0), Vec3::new(0.0, 0.0, 1.0)];
        let mut mesh = TriangleMesh::new();
        for quad in [left, right] {
            // Counterclockwise seen from inside the trough.
            mesh.add_triangle(quad[0], quad[3], quad[2]);
            mesh.add_triangle(quad[0], quad[2], quad[1]);
        }
        mesh
    }

    #[test]
    fn closed_convex_mesh_stays_whole() {
        let parts = ConvexDecomposition::default().decompose(&cube(Vec3::ZERO, 1.0)).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].points.len(), 8);
        assert_relative_eq!(parts[0].volume(), 8.0, epsilon = 1e-3);
    }

    #[test]
    fn disconnected_islands_become_separate_parts() {
        let mut mesh = cube(Vec3::ZERO, 0.5);
        mesh.append(&cube(Vec3::new(3.0, 0.0, 0.0), 0.5));
        let shape = ConvexDecomposition::default().decompose_to_composite(&mesh).unwrap();
        let Shape::Composite(composite) = &shape else {
            panic!("expected a composite");
        };
        assert_eq!(composite.child_count(), 2);
        let bounds = shape.compute_bounds(&RigidPose::IDENTITY);
        assert_relative_eq!(bounds.min, Vec3::splat(-0.5), epsilon = 1e-4);
        assert_relative_eq!(bounds.max, Vec3::new(3.5, 0.5, 0.5), epsilon = 1e-4);
    }

    #[test]
    fn concave_trough_splits_at_the_crease() {
        let _ = env_logger::builder().is_test(true).try_init();
        let strict = ConvexDecomposition::new(0.1).decompose(&trough()).unwrap();
        assert_eq!(strict.len(), 2);
        for part in &strict {
            // Each flat plank became a thin slab.
            assert_eq!(part.points.len(), 8);
            assert!(part.volume() < 0.01);
        }

        let loose = ConvexDecomposition::new(2.0).decompose(&trough()).unwrap();
        assert_eq!(loose.len(), 1);
        assert_eq!(loose[0].points.len(), 6);
    }

    #[test]
    fn parts_honor_vertex_limit_and_skin() {
        let mut mesh = TriangleMesh::new();
        // A coarse sphere has many vertices.
        let (rings, segments) = (8, 12);
        let point = |ring: usize, segment: usize| {
            let theta = std::f32::consts::PI * ring as f32 / rings as f32;
            let phi = std::f32::consts::TAU * segment as f32 / segments as f32;
            Vec3::new(theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin())
        };
        for ring in 0..rings {
            for segment in 0..segments {
                let (a, b) = (point(ring, segment), point(ring, segment + 1));
                let (c, d) = (point(ring + 1, segment), point(ring + 1, segment + 1));
                if ring > 0 {
                    mesh.add_triangle(a, b, c);
                }
                if ring + 1 < rings {
                    mesh.add_triangle(b, d, c);
                }
            }
        }
        let parts = ConvexDecomposition::new(0.05)
            .with_vertex_limit(16)
            .with_skin_width(0.1)
            .decompose(&mesh)
            .unwrap();
        assert_eq!(parts.len(), 1);
        assert!(parts[0].points.len() <= 16);
        let reach = parts[0].points.iter().map(|p| p.length()).fold(0.0f32, f32::max);
        assert!(reach >= 1.1 - 1e-3);
    }

    #[test]
    fn rejects_invalid_settings() {
        assert!(ConvexDecomposition::new(-1.0).decompose(&trough()).is_err());
        assert!(ConvexDecomposition::new(0.1).with_vertex_limit(3).decompose(&trough()).is_err());
        assert!(ConvexDecomposition::default().decompose(&TriangleMesh::new()).unwrap().is_empty());
    }
}
