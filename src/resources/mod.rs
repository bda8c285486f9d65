//! ECS resources made available to systems.
//!
//! Overview
//! - `collisionconfig` – INI-backed settings for the collision layer
//! - `compatibility` – declared interactions between collision groups
//! - `registry` – groups, monitoring rules and the enter/stay/exit state machine
//! - `spatial` – the spatial engine seam and the built-in AABB engine
//! - `worldtime` – simulation time and delta
pub mod collisionconfig;
pub mod compatibility;
pub mod registry;
pub mod spatial;
pub mod worldtime;
