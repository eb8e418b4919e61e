use glam::Vec3;

use super::shape::RayHit;
use super::triangle::Triangle;
use crate::error::{CollisionError, Result};
use crate::physics::rigid_pose::RigidPose;
use crate::utilities::bounding_box::BoundingBox;

/// A regular grid of height samples over the local XZ plane, triangulated two triangles per cell.
///
/// Sample `(x, z)` is stored at `heights[z * samples_x + x]` and sits at
/// `(origin_x + x * cell_width_x, height, origin_z + z * cell_width_z)`.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightField {
    pub origin_x: f32,
    pub origin_z: f32,
    /// Total extent of the grid along X.
    pub width_x: f32,
    /// Total extent of the grid along Z.
    pub width_z: f32,
    pub samples_x: usize,
    pub samples_z: usize,
    pub heights: Vec<f32>,
    /// Thickness of the solid below the lowest sample, used for bounds.
    pub depth: f32,
}

impl HeightField {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        origin_x: f32,
        origin_z: f32,
        width_x: f32,
        width_z: f32,
        samples_x: usize,
        samples_z: usize,
        heights: Vec<f32>,
        depth: f32,
    ) -> Result<Self> {
        if samples_x < 2 || samples_z < 2 {
            return Err(CollisionError::InvalidShape(format!(
                "Height field needs at least 2x2 samples, got {samples_x}x{samples_z}"
            )));
        }
        if heights.len() != samples_x * samples_z {
            return Err(CollisionError::InvalidShape(format!(
                "Height field expects {} samples, got {}",
                samples_x * samples_z,
                heights.len()
            )));
        }
        let dimensions_valid = [origin_x, origin_z, width_x, width_z, depth].iter().all(|v| v.is_finite())
            && width_x > 0.0
            && width_z > 0.0
            && depth >= 0.0;
        if !dimensions_valid || heights.iter().any(|h| !h.is_finite()) {
            return Err(CollisionError::InvalidShape(
                "Height field dimensions and samples must be finite, widths positive".into(),
            ));
        }
        Ok(Self {
            origin_x,
            origin_z,
            width_x,
            width_z,
            samples_x,
            samples_z,
            heights,
            depth,
        })
    }

    #[inline(always)]
    pub fn cell_width_x(&self) -> f32 {
        self.width_x / (self.samples_x - 1) as f32
    }

    #[inline(always)]
    pub fn cell_width_z(&self) -> f32 {
        self.width_z / (self.samples_z - 1) as f32
    }

    #[inline(always)]
    pub fn height(&self, x: usize, z: usize) -> f32 {
        self.heights[z * self.samples_x + x]
    }

    /// Local position of a sample.
    pub fn sample_position(&self, x: usize, z: usize) -> Vec3 {
        Vec3::new(
            self.origin_x + x as f32 * self.cell_width_x(),
            self.height(x, z),
            self.origin_z + z as f32 * self.cell_width_z(),
        )
    }

    /// Number of triangles in the field. Triangle ids run from zero to this count.
    pub fn triangle_count(&self) -> u32 {
        ((self.samples_x - 1) * (self.samples_z - 1) * 2) as u32
    }

    /// The two upward facing triangles of a cell, with their ids.
    pub fn cell_triangles(&self, x: usize, z: usize) -> [(u32, Triangle); 2] {
        let p00 = self.sample_position(x, z);
        let p10 = self.sample_position(x + 1, z);
        let p01 = self.sample_position(x, z + 1);
        let p11 = self.sample_position(x + 1, z + 1);
        let id = ((z * (self.samples_x - 1) + x) * 2) as u32;
        [
            (id, Triangle { a: p00, b: p01, c: p10 }),
            (id + 1, Triangle { a: p10, b: p01, c: p11 }),
        ]
    }

    /// Range of cells whose XZ footprint overlaps the local box, or `None` if it misses the grid.
    fn cell_range(&self, local_bounds: &BoundingBox) -> Option<(usize, usize, usize, usize)> {
        let max_cell_x = (self.samples_x - 2) as f32;
        let max_cell_z = (self.samples_z - 2) as f32;
        let min_x = (local_bounds.min.x - self.origin_x) / self.cell_width_x();
        let max_x = (local_bounds.max.x - self.origin_x) / self.cell_width_x();
        let min_z = (local_bounds.min.z - self.origin_z) / self.cell_width_z();
        let max_z = (local_bounds.max.z - self.origin_z) / self.cell_width_z();
        if max_x < 0.0 || max_z < 0.0 || min_x > max_cell_x + 1.0 || min_z > max_cell_z + 1.0 {
            return None;
        }
        Some((
            min_x.floor().clamp(0.0, max_cell_x) as usize,
            max_x.floor().clamp(0.0, max_cell_x) as usize,
            min_z.floor().clamp(0.0, max_cell_z) as usize,
            max_z.floor().clamp(0.0, max_cell_z) as usize,
        ))
    }

    /// Triangles (in local space, with ids) whose bounds, extended down by `depth`, overlap the local box.
    pub fn triangles_in_bounds(&self, local_bounds: &BoundingBox) -> Vec<(u32, Triangle)> {
        let mut triangles = Vec::new();
        let Some((x0, x1, z0, z1)) = self.cell_range(local_bounds) else {
            return triangles;
        };
        for z in z0..=z1 {
            for x in x0..=x1 {
                for (id, triangle) in self.cell_triangles(x, z) {
                    let mut bounds = BoundingBox::from_points(&triangle.vertices());
                    bounds.min.y -= self.depth;
                    if bounds.intersects(local_bounds) {
                        triangles.push((id, triangle));
                    }
                }
            }
        }
        triangles
    }

    /// Local bounds of the whole field, including the depth below the lowest sample.
    pub fn local_bounds(&self) -> BoundingBox {
        let (min_height, max_height) = self
            .heights
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), h| (lo.min(*h), hi.max(*h)));
        BoundingBox::new(
            Vec3::new(self.origin_x, min_height - self.depth, self.origin_z),
            Vec3::new(self.origin_x + self.width_x, max_height, self.origin_z + self.width_z),
        )
    }

    pub fn compute_bounds(&self, pose: &RigidPose) -> BoundingBox {
        let local = self.local_bounds();
        let corners: Vec<Vec3> = (0..8)
            .map(|i| {
                pose.transform_point(Vec3::new(
                    if i & 1 == 0 { local.min.x } else { local.max.x },
                    if i & 2 == 0 { local.min.y } else { local.max.y },
                    if i & 4 == 0 { local.min.z } else { local.max.z },
                ))
            })
            .collect();
        BoundingBox::from_points(&corners)
    }

    pub fn ray_test(&self, pose: &RigidPose, origin: Vec3, direction: Vec3, maximum_t: f32) -> Option<RayHit> {
        let local_origin = pose.inverse_transform_point(origin);
        let local_direction = pose.inverse_transform_vector(direction);
        let field_bounds = self.local_bounds();
        // Clip the ray to the field so that only the cells it can cross are visited.
        let t_enter = field_bounds.ray_intersection(local_origin, local_direction, maximum_t)?;
        let t_exit = {
            let far = local_origin + local_direction * maximum_t;
            field_bounds
                .ray_intersection(far, -local_direction, maximum_t)
                .map_or(maximum_t, |t_back| maximum_t - t_back)
        };
        let segment = BoundingBox::from_points(&[
            local_origin + local_direction * t_enter,
            local_origin + local_direction * t_exit.max(t_enter),
        ]);
        let mut best: Option<RayHit> = None;
        let mut limit = maximum_t;
        for (_, triangle) in self.triangles_in_bounds(&segment) {
            if let Some(hit) =
                Triangle::ray_test_vertices(triangle.a, triangle.b, triangle.c, local_origin, local_direction, limit)
            {
                if best.map_or(true, |b| hit.t < b.t) {
                    limit = hit.t;
                    best = Some(hit);
                }
            }
        }
        best.map(|hit| RayHit {
            t: hit.t,
            normal: pose.transform_vector(hit.normal),
        })
    }
}
