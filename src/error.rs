//! Error types shared by the collision library.

use crate::physics::collidables::collision_object::CollisionObjectId;

/// Errors raised by shape construction, mesh processing and domain operations.
#[derive(thiserror::Error, Debug)]
pub enum CollisionError {
    /// A shape was constructed with parameters that do not describe a valid shape.
    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    /// An argument was outside of its valid range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The collision object is not part of the domain.
    #[error("Unknown collision object: {0:?}")]
    UnknownObject(CollisionObjectId),

    /// A mesh operation could not produce a valid result.
    #[error("Degenerate mesh: {0}")]
    DegenerateMesh(String),

    /// Settings could not be read, parsed or validated.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error while reading or writing settings.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CollisionError>;
