use std::collections::HashMap;

use glam::Vec3;

use crate::utilities::bounding_box::BoundingBox;

/// An indexed triangle soup.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TriangleMesh {
    pub vertices: Vec<Vec3>,
    /// Counterclockwise vertex indices of each triangle.
    pub indices: Vec<[u32; 3]>,
}

impl TriangleMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(vertices: Vec<Vec3>, indices: Vec<[u32; 3]>) -> Self {
        Self { vertices, indices }
    }

    #[inline(always)]
    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Appends a triangle with its own three vertices. Call [`TriangleMesh::weld_vertices`] to share them.
    pub fn add_triangle(&mut self, a: Vec3, b: Vec3, c: Vec3) {
        let start = self.vertices.len() as u32;
        self.vertices.extend([a, b, c]);
        self.indices.push([start, start + 1, start + 2]);
    }

    /// Appends another mesh.
    pub fn append(&mut self, other: &TriangleMesh) {
        let offset = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.indices
            .extend(other.indices.iter().map(|t| [t[0] + offset, t[1] + offset, t[2] + offset]));
    }

    #[inline(always)]
    pub fn triangle(&self, index: usize) -> [Vec3; 3] {
        let [a, b, c] = self.indices[index];
        [self.vertices[a as usize], self.vertices[b as usize], self.vertices[c as usize]]
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(&self.vertices)
    }

    /// Merges vertices closer than `tolerance`, drops unused vertices and removes triangles
    /// that collapse. Returns the number of vertices removed.
    pub fn weld_vertices(&mut self, tolerance: f32) -> usize {
        let cell = tolerance.max(f32::MIN_POSITIVE) * 2.0;
        let key = |p: Vec3| {
            let q = (p / cell).floor();
            (q.x as i64, q.y as i64, q.z as i64)
        };
        let mut grid: HashMap<(i64, i64, i64), Vec<u32>> = HashMap::new();
        let mut welded: Vec<Vec3> = Vec::new();
        let mut remap = Vec::with_capacity(self.vertices.len());
        for &position in &self.vertices {
            let (x, y, z) = key(position);
            let mut found = None;
            'search: for dx in -1..=1 {
                for dy in -1..=1 {
                    for dz in -1..=1 {
                        if let Some(candidates) = grid.get(&(x + dx, y + dy, z + dz)) {
                            if let Some(&existing) = candidates
                                .iter()
                                .find(|&&i| welded[i as usize].distance_squared(position) <= tolerance * tolerance)
                            {
                                found = Some(existing);
                                break 'search;
                            }
                        }
                    }
                }
            }
            let index = found.unwrap_or_else(|| {
                let index = welded.len() as u32;
                welded.push(position);
                grid.entry((x, y, z)).or_default().push(index);
                index
            });
            remap.push(index);
        }

        let removed = self.vertices.len() - welded.len();
        self.vertices = welded;
        self.indices = self
            .indices
            .iter()
            .map(|t| [remap[t[0] as usize], remap[t[1] as usize], remap[t[2] as usize]])
            .filter(|t| t[0] != t[1] && t[1] != t[2] && t[2] != t[0])
            .collect();
        removed
    }

    /// For each triangle edge (a→b, b→c, c→a), the triangle sharing that edge in the opposite direction.
    pub fn edge_adjacency(&self) -> Vec<[Option<usize>; 3]> {
        let mut directed: HashMap<(u32, u32), usize> = HashMap::with_capacity(self.indices.len() * 3);
        for (triangle_index, t) in self.indices.iter().enumerate() {
            for k in 0..3 {
                directed.insert((t[k], t[(k + 1) % 3]), triangle_index);
            }
        }
        self.indices
            .iter()
            .map(|t| {
                let mut neighbors = [None; 3];
                for (k, neighbor) in neighbors.iter_mut().enumerate() {
                    *neighbor = directed.get(&(t[(k + 1) % 3], t[k])).copied();
                }
                neighbors
            })
            .collect()
    }

    /// Signed volume enclosed by the mesh; positive for closed, outward wound meshes.
    pub fn volume(&self) -> f32 {
        (0..self.triangle_count())
            .map(|i| {
                let [a, b, c] = self.triangle(i);
                a.dot(b.cross(c)) / 6.0
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn two_triangles() -> TriangleMesh {
        let mut mesh = TriangleMesh::new();
        mesh.add_triangle(Vec3::ZERO, Vec3::X, Vec3::Y);
        mesh.add_triangle(Vec3::X, Vec3::new(1.0, 1.0, 0.0), Vec3::Y + Vec3::splat(1e-7));
        mesh
    }

    #[test]
    fn welding_shares_vertices_and_finds_neighbors() {
        let mut mesh = two_triangles();
        assert_eq!(mesh.weld_vertices(1e-5), 2);
        assert_eq!(mesh.vertices.len(), 4);
        let adjacency = mesh.edge_adjacency();
        // Edge X→Y of the first triangle is Y→X in the second.
        assert_eq!(adjacency[0], [None, Some(1), None]);
        assert_eq!(adjacency[1], [None, None, Some(0)]);
    }

    #[test]
    fn collapsed_triangles_are_dropped() {
        let mut mesh = TriangleMesh::new();
        mesh.add_triangle(Vec3::ZERO, Vec3::X, Vec3::X * 1.000001);
        mesh.weld_vertices(1e-4);
        assert!(mesh.is_empty());
    }

    #[test]
    fn tetrahedron_volume() {
        let vertices = vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z];
        let mesh = TriangleMesh::from_parts(vertices, vec![[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]]);
        assert_relative_eq!(mesh.volume(), 1.0 / 6.0, epsilon = 1e-6);
        assert_eq!(mesh.bounding_box(), BoundingBox::new(Vec3::ZERO, Vec3::ONE));
    }
}
