//! Kinematic body component.
//!
//! The [`RigidBody`] component stores a velocity that the
//! [`movement`](crate::systems::movement::movement) system integrates into
//! [`MapPosition`](super::mapposition::MapPosition) each tick. Collision
//! response in blocking mode is applied by the spatial engine directly on the
//! position, so the body itself carries no mass or restitution.
//!
//! The `frozen` flag allows temporarily disabling movement, useful for
//! stunned enemies or a player locked in a cutscene.

use bevy_ecs::prelude::Component;
use glam::Vec2;

/// Kinematic body storing velocity.
///
/// # Example
/// ```ignore
/// let mut rb = RigidBody::with_velocity(120.0, 0.0);
/// rb.max_speed = Some(200.0);
/// rb.freeze();
/// ```
#[derive(Component, Clone, Debug, Default)]
pub struct RigidBody {
    /// Current velocity in world units per second.
    pub velocity: Vec2,
    /// Optional maximum speed. If set, velocity magnitude is clamped to this value.
    pub max_speed: Option<f32>,
    /// When true, movement system skips this entity.
    pub frozen: bool,
}

impl RigidBody {
    /// Create a RigidBody with zero velocity.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_velocity(vx: f32, vy: f32) -> Self {
        Self {
            velocity: Vec2::new(vx, vy),
            ..Self::default()
        }
    }

    /// Set the velocity of the RigidBody.
    pub fn set_velocity(&mut self, velocity: Vec2) {
        self.velocity = velocity;
    }

    /// Velocity after applying the speed clamp.
    pub fn clamped_velocity(&self) -> Vec2 {
        match self.max_speed {
            Some(max) => self.velocity.clamp_length_max(max),
            None => self.velocity,
        }
    }

    /// Freeze the rigid body, preventing movement system from updating it.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Unfreeze the rigid body, allowing movement system to update it.
    pub fn unfreeze(&mut self) {
        self.frozen = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_clamped_velocity_respects_max_speed() {
        let mut rb = RigidBody::with_velocity(30.0, 40.0);
        rb.max_speed = Some(10.0);
        let v = rb.clamped_velocity();
        assert!((v.length() - 10.0).abs() < EPSILON);
        assert!((v.x - 6.0).abs() < EPSILON);
    }

    #[test]
    fn test_freeze_unfreeze() {
        let mut rb = RigidBody::new();
        rb.freeze();
        assert!(rb.frozen);
        rb.unfreeze();
        assert!(!rb.frozen);
    }
}
