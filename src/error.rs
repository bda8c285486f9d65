//! Error types for the collision layer.
//!
//! Registry operations that the gameplay layer treats as "skip and carry on"
//! still build a [`CollisionError`] internally so the warning that gets logged
//! is consistent across call sites.

use bevy_ecs::prelude::Entity;
use thiserror::Error;

/// Errors produced while configuring or running the collision layer.
#[derive(Debug, Error)]
pub enum CollisionError {
    /// A rule or membership call referenced a group that was never registered.
    #[error("collision group '{0}' is not registered")]
    UnknownGroup(String),

    /// The compatibility table does not declare the two groups as interacting.
    #[error("groups '{0}' and '{1}' are not declared compatible")]
    IncompatibleGroups(String, String),

    /// The entity does not exist or carries no `Collidable`.
    #[error("entity {0:?} is missing or has no Collidable")]
    MissingEntity(Entity),

    /// Configuration file could not be read, parsed or written.
    #[error("collision config: {0}")]
    Config(String),
}

/// Result type for collision operations.
pub type Result<T> = std::result::Result<T, CollisionError>;
