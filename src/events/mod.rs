//! Collision events and their dispatcher.
//!
//! Submodules:
//! - [`bus`] – publish/subscribe dispatcher keyed by event type
//! - [`collision`] – enter/stay/exit payload and the event-type catalog
//!
//! See each submodule for concrete event data, semantics, and example usage.
pub mod bus;
pub mod collision;
