//! World-space position of an entity's pivot.
//!
//! Spatial bodies are placed by their [`MapPosition`]; a
//! [`BoxCollider`](super::boxcollider::BoxCollider) is offset from it.

use bevy_ecs::prelude::Component;
use glam::Vec2;

#[derive(Component, Clone, Copy, Debug, PartialEq)]
pub struct MapPosition {
    pub pos: Vec2,
}

impl MapPosition {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            pos: Vec2::new(x, y),
        }
    }

    /// Move the pivot by a delta.
    pub fn translate(&mut self, dx: f32, dy: f32) {
        self.pos.x += dx;
        self.pos.y += dy;
    }
}
