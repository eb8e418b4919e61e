pub mod convex_decomposition;
pub mod convex_hull_builder;
pub mod dcel_mesh;
pub mod triangle_mesh;

pub use convex_decomposition::ConvexDecomposition;
pub use convex_hull_builder::ConvexHullBuilder;
pub use dcel_mesh::DcelMesh;
pub use triangle_mesh::TriangleMesh;
