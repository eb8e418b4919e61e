use glam::Vec3;

use super::shape::{check_dimension, ConvexShape, RayHit};
use crate::error::Result;
use crate::physics::rigid_pose::RigidPose;

/// Collision shape representing a solid cuboid centered on the local origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxShape {
    /// Half of the box's size along each local axis.
    pub half_extents: Vec3,
}

impl BoxShape {
    /// Creates a box shape from half extents.
    pub fn new(half_extents: Vec3) -> Result<Self> {
        check_dimension("Box half width", half_extents.x)?;
        check_dimension("Box half height", half_extents.y)?;
        check_dimension("Box half length", half_extents.z)?;
        Ok(Self { half_extents })
    }

    /// Creates a box shape from full widths.
    pub fn from_size(width: f32, height: f32, length: f32) -> Result<Self> {
        Self::new(Vec3::new(width, height, length) * 0.5)
    }

    /// The eight corners in local space.
    pub fn vertices(&self) -> [Vec3; 8] {
        let h = self.half_extents;
        let mut corners = [Vec3::ZERO; 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            *corner = Vec3::new(
                if i & 1 == 0 { -h.x } else { h.x },
                if i & 2 == 0 { -h.y } else { h.y },
                if i & 4 == 0 { -h.z } else { h.z },
            );
        }
        corners
    }
}

impl ConvexShape for BoxShape {
    #[inline(always)]
    fn support(&self, direction: Vec3) -> Vec3 {
        let h = self.half_extents;
        Vec3::new(
            if direction.x < 0.0 { -h.x } else { h.x },
            if direction.y < 0.0 { -h.y } else { h.y },
            if direction.z < 0.0 { -h.z } else { h.z },
        )
    }

    fn feature(&self, direction: Vec3) -> Vec<Vec3> {
        // The face whose normal is most aligned with the direction.
        let abs = direction.abs();
        let axis = if abs.x >= abs.y && abs.x >= abs.z {
            0
        } else if abs.y >= abs.z {
            1
        } else {
            2
        };
        let sign = if direction[axis] < 0.0 { -1.0 } else { 1.0 };
        let u_axis = (axis + 1) % 3;
        let v_axis = (axis + 2) % 3;
        let h = self.half_extents;
        // Counterclockwise around the outward face normal.
        let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];
        let mut face: Vec<Vec3> = corners
            .iter()
            .map(|(u, v)| {
                let mut p = Vec3::ZERO;
                p[axis] = sign * h[axis];
                p[u_axis] = u * h[u_axis];
                p[v_axis] = v * h[v_axis];
                p
            })
            .collect();
        if sign < 0.0 {
            face.reverse();
        }
        face
    }

    fn ray_test(&self, pose: &RigidPose, origin: Vec3, direction: Vec3, maximum_t: f32) -> Option<RayHit> {
        let local_offset = pose.inverse_transform_vector(origin - pose.position);
        let local_direction = pose.inverse_transform_vector(direction);

        let offset_to_t_scale = Vec3::new(
            if local_direction.x < 0.0 { 1.0 } else { -1.0 },
            if local_direction.y < 0.0 { 1.0 } else { -1.0 },
            if local_direction.z < 0.0 { 1.0 } else { -1.0 },
        ) / local_direction.abs().max(Vec3::splat(1e-15));

        let negative_t = (local_offset - self.half_extents) * offset_to_t_scale;
        let positive_t = (local_offset + self.half_extents) * offset_to_t_scale;
        let entry_t = negative_t.min(positive_t);
        let exit_t = negative_t.max(positive_t);

        let earliest_exit = exit_t.min_element();
        if earliest_exit < 0.0 {
            return None;
        }
        let axis = if entry_t.x > entry_t.y {
            if entry_t.x > entry_t.z {
                0
            } else {
                2
            }
        } else if entry_t.y > entry_t.z {
            1
        } else {
            2
        };
        let latest_entry = entry_t[axis];
        if earliest_exit < latest_entry || latest_entry > maximum_t {
            return None;
        }
        // The normal should point against the ray on the entered face.
        let mut local_normal = Vec3::ZERO;
        local_normal[axis] = if local_direction[axis] < 0.0 { 1.0 } else { -1.0 };
        Some(RayHit {
            t: latest_entry.max(0.0),
            normal: pose.transform_vector(local_normal),
        })
    }
}
