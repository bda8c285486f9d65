//! ECS components for collidable entities.
//!
//! Submodules overview:
//! - [`boxcollider`] – axis-aligned rectangular collider and its world bounds
//! - [`collidable`] – per-entity collision state, open records and reaction slots
//! - [`group`] – catalog of conventional collision group names
//! - [`mapposition`] – world-space position (pivot) for an entity
//! - [`rigidbody`] – simple kinematic body storing velocity

pub mod boxcollider;
pub mod collidable;
pub mod group;
pub mod mapposition;
pub mod rigidbody;
