use std::collections::HashMap;

use glam::Vec3;
use log::trace;

use super::convex_hull_builder::ConvexHullBuilder;
use super::triangle_mesh::TriangleMesh;
use crate::error::{CollisionError, Result};
use crate::physics::collidables::plane::Plane;
use crate::utilities::bounding_box::BoundingBox;
use crate::utilities::math_helper::{build_orthonormal_basis, polygon_normal};

macro_rules! mesh_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            #[inline(always)]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

mesh_handle!(
    /// Index of a vertex in a [`DcelMesh`].
    VertexId
);
mesh_handle!(
    /// Index of a half edge in a [`DcelMesh`].
    EdgeId
);
mesh_handle!(
    /// Index of a face in a [`DcelMesh`].
    FaceId
);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DcelVertex {
    pub position: Vec3,
    /// One of the half edges leaving the vertex.
    pub edge: Option<EdgeId>,
}

/// A directed half edge. Faces lie to the left of their edges, so a face's boundary runs counterclockwise
/// when viewed from outside.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DcelEdge {
    pub origin: VertexId,
    /// The opposite half edge of the neighboring face. `None` on open boundaries.
    pub twin: Option<EdgeId>,
    pub next: EdgeId,
    pub previous: EdgeId,
    pub face: FaceId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DcelFace {
    pub boundary: EdgeId,
}

/// Doubly connected edge list over polygonal faces.
///
/// The mesh is stored in flat arrays indexed by [`VertexId`], [`EdgeId`] and [`FaceId`]. Topology edits rebuild
/// the arrays from polygon lists, so handles are only stable between edits.
#[derive(Clone, Debug, Default)]
pub struct DcelMesh {
    vertices: Vec<DcelVertex>,
    edges: Vec<DcelEdge>,
    faces: Vec<DcelFace>,
}

impl DcelMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a mesh from counterclockwise polygons indexing into `positions`. Unreferenced positions are dropped.
    ///
    /// Fails on polygons with fewer than three vertices and on directed edges used by more than one face.
    pub fn from_polygons(positions: &[Vec3], polygons: &[Vec<u32>]) -> Result<Self> {
        let mut used = vec![false; positions.len()];
        for polygon in polygons {
            if polygon.len() < 3 {
                return Err(CollisionError::DegenerateMesh(format!(
                    "Face has only {} vertices.",
                    polygon.len()
                )));
            }
            for &vertex in polygon {
                match used.get_mut(vertex as usize) {
                    Some(flag) => *flag = true,
                    None => {
                        return Err(CollisionError::DegenerateMesh(format!(
                            "Face references vertex {vertex} but only {} exist.",
                            positions.len()
                        )))
                    }
                }
            }
        }

        let mut remap = vec![u32::MAX; positions.len()];
        let mut vertices = Vec::new();
        for (i, &position) in positions.iter().enumerate() {
            if used[i] {
                remap[i] = vertices.len() as u32;
                vertices.push(DcelVertex { position, edge: None });
            }
        }

        let edge_total: usize = polygons.iter().map(Vec::len).sum();
        let mut edges = Vec::with_capacity(edge_total);
        let mut faces = Vec::with_capacity(polygons.len());
        let mut directed: HashMap<(u32, u32), EdgeId> = HashMap::with_capacity(edge_total);
        for polygon in polygons {
            let face = FaceId(faces.len() as u32);
            let first = edges.len() as u32;
            let count = polygon.len() as u32;
            for k in 0..count {
                let origin = remap[polygon[k as usize] as usize];
                let destination = remap[polygon[((k + 1) % count) as usize] as usize];
                if origin == destination {
                    return Err(CollisionError::DegenerateMesh(format!(
                        "Face {} repeats vertex {origin}.",
                        face.0
                    )));
                }
                let id = EdgeId(first + k);
                if directed.insert((origin, destination), id).is_some() {
                    return Err(CollisionError::DegenerateMesh(format!(
                        "Edge {origin} -> {destination} is shared by more than one face."
                    )));
                }
                edges.push(DcelEdge {
                    origin: VertexId(origin),
                    twin: None,
                    next: EdgeId(first + (k + 1) % count),
                    previous: EdgeId(first + (k + count - 1) % count),
                    face,
                });
                vertices[origin as usize].edge.get_or_insert(id);
            }
            faces.push(DcelFace { boundary: EdgeId(first) });
        }
        for (&(origin, destination), &id) in &directed {
            edges[id.index()].twin = directed.get(&(destination, origin)).copied();
        }

        Ok(Self { vertices, edges, faces })
    }

    /// Builds the convex hull of a point cloud.
    pub fn from_convex_hull(points: &[Vec3]) -> Result<Self> {
        ConvexHullBuilder::default().build(points)
    }

    /// Builds a mesh whose faces are the triangles of `mesh`.
    pub fn from_triangle_mesh(mesh: &TriangleMesh) -> Result<Self> {
        let polygons: Vec<Vec<u32>> = mesh.indices.iter().map(|t| t.to_vec()).collect();
        Self::from_polygons(&mesh.vertices, &polygons)
    }

    /// Exports the vertex positions and counterclockwise face polygons.
    pub fn to_polygons(&self) -> (Vec<Vec3>, Vec<Vec<u32>>) {
        let positions = self.vertices.iter().map(|v| v.position).collect();
        let polygons = self
            .face_ids()
            .map(|face| self.face_vertices(face).into_iter().map(|v| v.0).collect())
            .collect();
        (positions, polygons)
    }

    #[inline(always)]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline(always)]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    #[inline(always)]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.edges.clear();
        self.faces.clear();
    }

    pub fn vertices(&self) -> &[DcelVertex] {
        &self.vertices
    }

    pub fn edges(&self) -> &[DcelEdge] {
        &self.edges
    }

    pub fn faces(&self) -> &[DcelFace] {
        &self.faces
    }

    pub fn face_ids(&self) -> impl Iterator<Item = FaceId> {
        (0..self.faces.len() as u32).map(FaceId)
    }

    #[inline(always)]
    pub fn vertex(&self, id: VertexId) -> &DcelVertex {
        &self.vertices[id.index()]
    }

    #[inline(always)]
    pub fn edge(&self, id: EdgeId) -> &DcelEdge {
        &self.edges[id.index()]
    }

    #[inline(always)]
    pub fn face(&self, id: FaceId) -> &DcelFace {
        &self.faces[id.index()]
    }

    #[inline(always)]
    pub fn position(&self, id: VertexId) -> Vec3 {
        self.vertices[id.index()].position
    }

    /// The vertex an edge points to.
    #[inline(always)]
    pub fn destination(&self, id: EdgeId) -> VertexId {
        self.edge(self.edge(id).next).origin
    }

    /// Boundary edges of a face in counterclockwise order.
    pub fn face_edges(&self, face: FaceId) -> Vec<EdgeId> {
        let start = self.face(face).boundary;
        let mut result = vec![start];
        let mut edge = self.edge(start).next;
        // Bounded so a corrupt next chain cannot loop forever.
        while edge != start && result.len() <= self.edges.len() {
            result.push(edge);
            edge = self.edge(edge).next;
        }
        result
    }

    pub fn face_vertices(&self, face: FaceId) -> Vec<VertexId> {
        self.face_edges(face).into_iter().map(|e| self.edge(e).origin).collect()
    }

    pub fn face_positions(&self, face: FaceId) -> Vec<Vec3> {
        self.face_edges(face)
            .into_iter()
            .map(|e| self.position(self.edge(e).origin))
            .collect()
    }

    /// Newell's method; twice the area vector of the polygon.
    /// Outward unit normal of a face. Zero for degenerate faces.
    pub fn face_normal(&self, face: FaceId) -> Vec3 {
        polygon_normal(&self.face_positions(face)).normalize_or_zero()
    }

    pub fn face_area(&self, face: FaceId) -> f32 {
        polygon_normal(&self.face_positions(face)).length() * 0.5
    }

    /// Plane of a face as an outward unit normal and offset, so that `normal · x = offset` on the face.
    pub fn face_plane(&self, face: FaceId) -> (Vec3, f32) {
        let positions = self.face_positions(face);
        let normal = polygon_normal(&positions).normalize_or_zero();
        let centroid = positions.iter().copied().sum::<Vec3>() / positions.len() as f32;
        (normal, normal.dot(centroid))
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(self.vertices.iter().map(|v| &v.position))
    }

    /// Vertices connected to `vertex` by an edge, sorted.
    pub fn vertex_neighbors(&self, vertex: VertexId) -> Vec<VertexId> {
        let mut neighbors: Vec<VertexId> = self
            .edges
            .iter()
            .enumerate()
            .filter_map(|(i, edge)| {
                let destination = self.destination(EdgeId(i as u32));
                if edge.origin == vertex {
                    Some(destination)
                } else if destination == vertex {
                    Some(edge.origin)
                } else {
                    None
                }
            })
            .collect();
        neighbors.sort_unstable();
        neighbors.dedup();
        neighbors
    }

    /// Checks that next/previous links are inverse, twins are mutual and consistent and that faces and vertices
    /// point at edges belonging to them.
    pub fn is_valid(&self) -> bool {
        let edge_count = self.edges.len();
        for (i, edge) in self.edges.iter().enumerate() {
            let id = EdgeId(i as u32);
            if edge.next.index() >= edge_count
                || edge.previous.index() >= edge_count
                || edge.face.index() >= self.faces.len()
                || edge.origin.index() >= self.vertices.len()
            {
                return false;
            }
            if self.edge(edge.next).previous != id || self.edge(edge.previous).next != id {
                return false;
            }
            if self.edge(edge.next).face != edge.face {
                return false;
            }
            if let Some(twin) = edge.twin {
                if twin.index() >= edge_count {
                    return false;
                }
                let twin_edge = self.edge(twin);
                if twin_edge.twin != Some(id) || twin_edge.origin != self.destination(id) {
                    return false;
                }
            }
        }
        let faces_valid = self.face_ids().all(|face| {
            let boundary = self.face(face).boundary;
            boundary.index() < edge_count
                && self.edge(boundary).face == face
                && self.face_edges(face).len() <= edge_count
        });
        let vertices_valid = self.vertices.iter().enumerate().all(|(i, vertex)| match vertex.edge {
            Some(edge) => edge.index() < edge_count && self.edge(edge).origin == VertexId(i as u32),
            None => false,
        });
        faces_valid && vertices_valid
    }

    /// True if every half edge has a twin.
    pub fn is_closed(&self) -> bool {
        !self.edges.is_empty() && self.edges.iter().all(|e| e.twin.is_some())
    }

    pub fn is_triangle_mesh(&self) -> bool {
        self.face_ids().all(|face| self.face_edges(face).len() == 3)
    }

    /// True if the mesh is closed and no vertex lies more than `tolerance` in front of any face plane.
    pub fn is_convex(&self, tolerance: f32) -> bool {
        if !self.is_closed() {
            return false;
        }
        self.face_ids().all(|face| {
            let (normal, offset) = self.face_plane(face);
            self.vertices.iter().all(|v| normal.dot(v.position) - offset <= tolerance)
        })
    }

    /// Fan triangulation of every face.
    pub fn to_triangle_mesh(&self) -> TriangleMesh {
        let vertices = self.vertices.iter().map(|v| v.position).collect();
        let mut indices = Vec::new();
        for face in self.face_ids() {
            let polygon = self.face_vertices(face);
            for k in 1..polygon.len().saturating_sub(1) {
                indices.push([polygon[0].0, polygon[k].0, polygon[k + 1].0]);
            }
        }
        TriangleMesh::from_parts(vertices, indices)
    }

    /// Enclosed volume of a closed mesh.
    pub fn volume(&self) -> f32 {
        self.to_triangle_mesh().volume()
    }

    /// Distance below which a vertex counts as lying on a cutting plane.
    fn plane_tolerance(&self) -> f32 {
        1e-5 * self.bounding_box().extents().max_element().max(1.0)
    }

    /// Cuts a convex mesh with a plane, keeping the part behind it and capping the hole with a new face.
    ///
    /// Returns false if the plane does not cut the mesh. If the mesh lies entirely in front of the plane,
    /// it becomes empty.
    pub fn cut_convex(&mut self, plane: &Plane) -> bool {
        if self.is_empty() {
            return false;
        }
        let tolerance = self.plane_tolerance();
        let distances: Vec<f32> = self
            .vertices
            .iter()
            .map(|v| {
                let d = plane.normal.dot(v.position) - plane.distance;
                if d.abs() <= tolerance {
                    0.0
                } else {
                    d
                }
            })
            .collect();
        if distances.iter().all(|&d| d <= 0.0) {
            return false;
        }
        if distances.iter().all(|&d| d >= 0.0) {
            trace!("Cut plane removed the whole mesh.");
            self.clear();
            return true;
        }

        let mut positions: Vec<Vec3> = self.vertices.iter().map(|v| v.position).collect();
        let mut on_plane: Vec<u32> = (0..positions.len() as u32)
            .filter(|&i| distances[i as usize] == 0.0)
            .collect();
        let mut split_vertices: HashMap<(u32, u32), u32> = HashMap::new();
        let mut polygons = Vec::with_capacity(self.faces.len() + 1);
        for face in self.face_ids() {
            let polygon = self.face_vertices(face);
            let mut clipped = Vec::with_capacity(polygon.len() + 1);
            for (k, &current) in polygon.iter().enumerate() {
                let next = polygon[(k + 1) % polygon.len()];
                let (dc, dn) = (distances[current.index()], distances[next.index()]);
                if dc <= 0.0 {
                    clipped.push(current.0);
                }
                if (dc < 0.0 && dn > 0.0) || (dc > 0.0 && dn < 0.0) {
                    let key = (current.0.min(next.0), current.0.max(next.0));
                    let split = *split_vertices.entry(key).or_insert_with(|| {
                        let (pc, pn) = (positions[current.index()], positions[next.index()]);
                        let t = dc / (dc - dn);
                        positions.push(pc + (pn - pc) * t);
                        let index = positions.len() as u32 - 1;
                        on_plane.push(index);
                        index
                    });
                    clipped.push(split);
                }
            }
            if clipped.len() >= 3 {
                polygons.push(clipped);
            }
        }

        // The cap is convex; order its vertices counterclockwise around the plane normal.
        let (u, v) = build_orthonormal_basis(plane.normal);
        let center = on_plane.iter().map(|&i| positions[i as usize]).sum::<Vec3>() / on_plane.len().max(1) as f32;
        on_plane.sort_by(|&a, &b| {
            let da = positions[a as usize] - center;
            let db = positions[b as usize] - center;
            let angle_a = da.dot(v).atan2(da.dot(u));
            let angle_b = db.dot(v).atan2(db.dot(u));
            angle_a.total_cmp(&angle_b)
        });
        if u.cross(v).dot(plane.normal) < 0.0 {
            on_plane.reverse();
        }
        if on_plane.len() >= 3 {
            polygons.push(on_plane);
        }

        match Self::from_polygons(&positions, &polygons) {
            Ok(mesh) => {
                *self = mesh;
                true
            }
            Err(error) => {
                // A cut that would break the topology is skipped; the mesh is left as it was.
                trace!("Discarded plane cut: {error}");
                false
            }
        }
    }

    /// Offsets every face plane outward by `skin_width` and rebuilds the mesh from the offset planes so it has
    /// at most `vertex_limit` vertices.
    ///
    /// Starts from the bounding box of the offset hull (or from a tetrahedron around it when the limit is below
    /// eight) and cuts with the face planes in order of decreasing face area, stopping before a cut would exceed
    /// the limit.
    pub fn modify_convex(&mut self, vertex_limit: usize, skin_width: f32) -> Result<()> {
        if vertex_limit < 4 {
            return Err(CollisionError::InvalidArgument(format!(
                "A convex mesh needs at least 4 vertices, the limit was {vertex_limit}."
            )));
        }
        if !skin_width.is_finite() {
            return Err(CollisionError::InvalidArgument(format!("Skin width must be finite, got {skin_width}.")));
        }
        if !self.is_closed() {
            return Err(CollisionError::DegenerateMesh(
                "Only closed convex meshes can be modified.".to_string(),
            ));
        }

        let mut planes: Vec<(Plane, f32)> = self
            .face_ids()
            .filter_map(|face| {
                let (normal, offset) = self.face_plane(face);
                let plane = Plane::new(normal, offset + skin_width).ok()?;
                Some((plane, self.face_area(face)))
            })
            .collect();
        planes.sort_by(|a, b| b.1.total_cmp(&a.1));

        // The exact offset hull, clipped from a generous box.
        let bounds = self.bounding_box();
        let slack = bounds.extents().max_element() * 2.0 + skin_width.abs() * 4.0 + 1e-3;
        let mut offset_hull = Self::from_box(&bounds.expanded(slack))?;
        for (plane, _) in &planes {
            offset_hull.cut_convex(plane);
        }
        if offset_hull.is_empty() {
            return Err(CollisionError::DegenerateMesh(
                "Skin width collapsed the mesh.".to_string(),
            ));
        }
        if offset_hull.vertex_count() <= vertex_limit {
            *self = offset_hull;
            return Ok(());
        }

        let mut current = if vertex_limit >= 8 {
            Self::from_box(&offset_hull.bounding_box())?
        } else {
            let center = offset_hull.bounding_box().center();
            let radius = offset_hull
                .vertices
                .iter()
                .map(|v| v.position.distance(center))
                .fold(0.0f32, f32::max);
            Self::circumscribing_tetrahedron(center, radius)?
        };
        for (plane, _) in &planes {
            let mut candidate = current.clone();
            if !candidate.cut_convex(plane) || candidate.is_empty() {
                continue;
            }
            if candidate.vertex_count() > vertex_limit {
                break;
            }
            current = candidate;
        }
        trace!(
            "Reduced convex mesh from {} to {} vertices.",
            offset_hull.vertex_count(),
            current.vertex_count()
        );
        *self = current;
        Ok(())
    }

    /// A closed box mesh.
    pub fn from_box(bounds: &BoundingBox) -> Result<Self> {
        let (min, max) = (bounds.min, bounds.max);
        let corners: Vec<Vec3> = (0..8)
            .map(|i| {
                Vec3::new(
                    if i & 1 == 0 { min.x } else { max.x },
                    if i & 2 == 0 { min.y } else { max.y },
                    if i & 4 == 0 { min.z } else { max.z },
                )
            })
            .collect();
        let polygons = vec![
            vec![0, 4, 6, 2], // -x
            vec![1, 3, 7, 5], // +x
            vec![0, 1, 5, 4], // -y
            vec![2, 6, 7, 3], // +y
            vec![0, 2, 3, 1], // -z
            vec![4, 5, 7, 6], // +z
        ];
        Self::from_polygons(&corners, &polygons)
    }

    /// A regular tetrahedron whose inscribed sphere is the given sphere.
    fn circumscribing_tetrahedron(center: Vec3, radius: f32) -> Result<Self> {
        // The circumradius of a regular tetrahedron is three times its inradius.
        let r = radius.max(1e-4) * 3.0;
        let corners = [
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(1.0, -1.0, -1.0),
            Vec3::new(-1.0, 1.0, -1.0),
            Vec3::new(-1.0, -1.0, 1.0),
        ]
        .map(|c| center + c.normalize() * r);
        let polygons = vec![vec![0, 1, 2], vec![0, 3, 1], vec![0, 2, 3], vec![1, 3, 2]];
        Self::from_polygons(&corners, &polygons)
    }

    /// Merges adjacent faces whose planes agree within the tolerances into single polygons.
    pub fn merge_coplanar_faces(&mut self, normal_tolerance: f32, distance_tolerance: f32) -> Result<()> {
        let planes: Vec<(Vec3, f32)> = self.face_ids().map(|f| self.face_plane(f)).collect();
        let mut parent: Vec<usize> = (0..self.faces.len()).collect();
        fn find(parent: &mut [usize], mut i: usize) -> usize {
            while parent[i] != i {
                parent[i] = parent[parent[i]];
                i = parent[i];
            }
            i
        }
        for edge in &self.edges {
            let Some(twin) = edge.twin else { continue };
            let (a, b) = (edge.face.index(), self.edge(twin).face.index());
            let ((na, da), (nb, db)) = (planes[a], planes[b]);
            if na.dot(nb) >= 1.0 - normal_tolerance && (da - db).abs() <= distance_tolerance {
                let (ra, rb) = (find(&mut parent, a), find(&mut parent, b));
                if ra != rb {
                    parent[ra.max(rb)] = ra.min(rb);
                }
            }
        }

        let group_of: Vec<usize> = (0..self.faces.len()).map(|face| find(&mut parent, face)).collect();
        let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
        for (face, &group) in group_of.iter().enumerate() {
            groups.entry(group).or_default().push(face);
        }
        if groups.len() == self.faces.len() {
            return Ok(());
        }

        let mut roots: Vec<usize> = groups.keys().copied().collect();
        roots.sort_unstable();
        let mut polygons = Vec::with_capacity(roots.len());
        for root in roots {
            let members = &groups[&root];
            if members.len() == 1 {
                polygons.push(self.face_vertices(FaceId(root as u32)).iter().map(|v| v.0).collect());
                continue;
            }
            match self.chain_group_boundary(members, &group_of) {
                Some(polygon) => polygons.push(polygon),
                None => {
                    for &face in members {
                        polygons.push(self.face_vertices(FaceId(face as u32)).iter().map(|v| v.0).collect());
                    }
                }
            }
        }
        let positions: Vec<Vec3> = self.vertices.iter().map(|v| v.position).collect();
        *self = Self::from_polygons(&positions, &polygons)?;
        Ok(())
    }

    /// Walks the outer boundary of a face group. Returns `None` unless it forms a single loop.
    fn chain_group_boundary(&self, members: &[usize], group_of: &[usize]) -> Option<Vec<u32>> {
        let group = group_of[members[0]];
        let mut outgoing: HashMap<u32, u32> = HashMap::new();
        for &face in members {
            for edge_id in self.face_edges(FaceId(face as u32)) {
                let edge = self.edge(edge_id);
                let interior = edge
                    .twin
                    .map(|twin| group_of[self.edge(twin).face.index()] == group)
                    .unwrap_or(false);
                if !interior && outgoing.insert(edge.origin.0, self.destination(edge_id).0).is_some() {
                    return None;
                }
            }
        }
        let start = *outgoing.keys().min()?;
        let mut polygon = vec![start];
        let mut current = *outgoing.get(&start)?;
        while current != start {
            if polygon.len() > outgoing.len() {
                return None;
            }
            polygon.push(current);
            current = *outgoing.get(&current)?;
        }
        (polygon.len() == outgoing.len()).then_some(polygon)
    }
}
