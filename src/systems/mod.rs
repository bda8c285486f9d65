//! Collision layer systems.
//!
//! Submodules overview
//! - [`collision`] – run one registry tick per frame
//! - [`movement`] – integrate positions from rigid body velocities and time

pub mod collision;
pub mod movement;
