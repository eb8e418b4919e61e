pub mod collision_object;
pub mod shape;

// Convex shapes
pub mod box_shape;
pub mod capsule;
pub mod convex_hull;
pub mod sphere;
pub mod triangle;

// Non-convex shapes
pub mod compound;
pub mod height_field;
pub mod plane;

pub use collision_object::{CollisionObject, CollisionObjectId, CollisionObjectKind};
pub use shape::{ConvexShape, RayHit, Shape, ShapeType};
