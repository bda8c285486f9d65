//! Aberred Collide library.
//!
//! Collision classification and lifecycle events on top of a spatial engine.
//! This module exposes the ECS components, resources, systems, and events
//! for use in integration tests and as a reusable library.

pub mod components;
pub mod error;
pub mod events;
pub mod resources;
pub mod systems;
