use glam::Vec3;

use super::shape::{ConvexShape, RayHit};
use crate::error::{CollisionError, Result};
use crate::physics::meshes::dcel_mesh::DcelMesh;
use crate::physics::rigid_pose::RigidPose;

/// Bounding plane of a convex hull face together with the face's vertices.
#[derive(Clone, Debug, PartialEq)]
pub struct HullFace {
    /// Indices into [`ConvexHull::points`], counterclockwise seen from outside.
    pub vertex_indices: Vec<u32>,
    /// Outward unit normal of the bounding plane.
    pub normal: Vec3,
    /// Offset from the origin to a point on the plane along the normal.
    pub offset: f32,
}

/// Shape representing the convex hull of a set of points.
#[derive(Clone, Debug, PartialEq)]
pub struct ConvexHull {
    /// Hull vertices in local space.
    pub points: Vec<Vec3>,
    pub faces: Vec<HullFace>,
}

impl ConvexHull {
    /// Computes the hull of a point cloud. Points inside the hull are discarded.
    pub fn new(points: &[Vec3]) -> Result<Self> {
        let mesh = DcelMesh::from_convex_hull(points).map_err(|error| match error {
            CollisionError::DegenerateMesh(reason) => CollisionError::InvalidShape(reason),
            other => other,
        })?;
        Self::from_mesh(&mesh)
    }

    /// Creates a hull from a closed convex mesh.
    pub fn from_mesh(mesh: &DcelMesh) -> Result<Self> {
        let tolerance = 1e-4 * mesh.bounding_box().extents().max_element().max(1.0);
        if mesh.face_count() < 4 || !mesh.is_convex(tolerance) {
            return Err(CollisionError::InvalidShape(
                "Convex hulls need a closed convex mesh with at least 4 faces.".to_string(),
            ));
        }
        let points = mesh.vertices().iter().map(|v| v.position).collect();
        let faces = mesh
            .face_ids()
            .map(|face| {
                let (normal, offset) = mesh.face_plane(face);
                HullFace {
                    vertex_indices: mesh.face_vertices(face).into_iter().map(|v| v.0).collect(),
                    normal,
                    offset,
                }
            })
            .collect();
        Ok(Self { points, faces })
    }

    /// The hull as a half-edge mesh.
    pub fn to_mesh(&self) -> Result<DcelMesh> {
        let polygons: Vec<Vec<u32>> = self.faces.iter().map(|f| f.vertex_indices.clone()).collect();
        DcelMesh::from_polygons(&self.points, &polygons)
    }

    pub fn volume(&self) -> f32 {
        self.faces
            .iter()
            .map(|face| {
                let v = &face.vertex_indices;
                let a = self.points[v[0] as usize];
                (1..v.len() - 1)
                    .map(|k| a.dot(self.points[v[k] as usize].cross(self.points[v[k + 1] as usize])) / 6.0)
                    .sum::<f32>()
            })
            .sum()
    }

    /// Index of the face whose normal is most aligned with a local direction.
    pub fn face_most_aligned_with(&self, direction: Vec3) -> usize {
        let mut best = 0;
        let mut best_dot = f32::NEG_INFINITY;
        for (i, face) in self.faces.iter().enumerate() {
            let dot = face.normal.dot(direction);
            if dot > best_dot {
                best_dot = dot;
                best = i;
            }
        }
        best
    }
}

impl ConvexShape for ConvexHull {
    fn support(&self, direction: Vec3) -> Vec3 {
        self.points
            .iter()
            .copied()
            .fold((Vec3::ZERO, f32::NEG_INFINITY), |best, p| {
                let dot = p.dot(direction);
                if dot > best.1 {
                    (p, dot)
                } else {
                    best
                }
            })
            .0
    }

    fn feature(&self, direction: Vec3) -> Vec<Vec3> {
        let face = &self.faces[self.face_most_aligned_with(direction)];
        face.vertex_indices.iter().map(|&i| self.points[i as usize]).collect()
    }

    fn ray_test(&self, pose: &RigidPose, origin: Vec3, direction: Vec3, maximum_t: f32) -> Option<RayHit> {
        let local_origin = pose.inverse_transform_point(origin);
        let local_direction = pose.inverse_transform_vector(direction);
        let mut entry_t = 0.0f32;
        let mut exit_t = maximum_t;
        let mut entry_normal = None;
        for face in &self.faces {
            let distance = face.offset - face.normal.dot(local_origin);
            let velocity = face.normal.dot(local_direction);
            if velocity == 0.0 {
                if distance < 0.0 {
                    return None;
                }
                continue;
            }
            let t = distance / velocity;
            if velocity < 0.0 {
                if t > entry_t {
                    entry_t = t;
                    entry_normal = Some(face.normal);
                }
            } else {
                exit_t = exit_t.min(t);
            }
            if entry_t > exit_t {
                return None;
            }
        }
        let local_normal = entry_normal.unwrap_or_else(|| -local_direction.normalize_or_zero());
        Some(RayHit {
            t: entry_t,
            normal: pose.transform_vector(local_normal),
        })
    }
}
