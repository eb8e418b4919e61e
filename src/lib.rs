//! Collision detection and spatial partitioning for real-time 3D simulations.
//!
//! The crate is organized the way the collision pipeline runs:
//! - [`physics::trees`] holds the bounding volume hierarchies and the spatial partitions built on them.
//! - [`physics::collidables`] holds the shapes and the collision objects that pair them with poses.
//! - [`physics::collision_detection`] holds the narrow phase (GJK, EPA, pair testers), the broad phase
//!   and the [`CollisionDomain`](physics::collision_detection::collision_domain::CollisionDomain) tying them together.
//! - [`physics::meshes`] holds the half-edge mesh used for convex hull construction, cutting and decomposition.

pub mod config;
pub mod error;
pub mod physics;
pub mod utilities;

pub use config::CollisionSettings;
pub use error::{CollisionError, Result};
pub use physics::collidables::collision_object::{
    CollisionObject, CollisionObjectId, CollisionObjectKind,
};
pub use physics::collidables::shape::Shape;
pub use physics::collision_detection::collision_domain::CollisionDomain;
pub use physics::collision_detection::contact_manifold::{Contact, ContactSet};
pub use physics::rigid_pose::RigidPose;
pub use utilities::bounding_box::BoundingBox;
