pub mod broad_phase;
pub mod closest_points;
pub mod collision_algorithms;
pub mod collision_domain;
pub mod contact_manifold;
pub mod epa;
pub mod gjk;
pub mod narrow_phase;
pub mod support_finder;

pub use broad_phase::{BroadPhase, CollisionFilter};
pub use collision_domain::{CollisionDomain, RayCastHit};
pub use contact_manifold::{Contact, ContactSet};
pub use narrow_phase::NarrowPhase;
