pub mod adaptive_aabb_tree;
pub mod basic_partition;
pub mod compressed_aabb_tree;
pub mod leaf;
pub mod node;
pub mod spatial_partition;
pub mod tree;
pub mod tree_add;
pub mod tree_closest_query;
pub mod tree_diagnostics;
pub mod tree_intertree_queries;
pub mod tree_ray_cast;
pub mod tree_refit;
pub mod tree_remove;
pub mod tree_self_queries;
pub mod tree_sweep_builder;
pub mod tree_volume_query;

pub use adaptive_aabb_tree::AdaptiveAabbTree;
pub use basic_partition::BasicPartition;
pub use compressed_aabb_tree::CompressedAabbTree;
pub use spatial_partition::{PartitionItem, SpatialPartition};
pub use tree::Tree;
