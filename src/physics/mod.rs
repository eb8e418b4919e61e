pub mod collidables;
pub mod collision_detection;
pub mod meshes;
pub mod rigid_pose;
pub mod trees;
