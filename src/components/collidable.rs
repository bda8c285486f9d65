//! Per-entity collision state.
//!
//! [`Collidable`] is attached to every entity that takes part in collision
//! monitoring. It carries the entity's group label and interest mask, an
//! active flag consulted by the registry's gate and by the spatial engine, and
//! the set of overlap episodes currently open with other entities.
//!
//! Gameplay code reacts through three reaction slots. The registry drives
//! them through [`Collidable::handle_enter`], [`Collidable::handle_stay`] and
//! [`Collidable::handle_exit`]; a panicking slot is caught and logged so one
//! faulty entity cannot stop the rest of the tick.
//!
//! # Example
//!
//! ```ignore
//! let hits = Arc::new(AtomicU32::new(0));
//! let counter = hits.clone();
//! world.spawn((
//!     MapPosition::new(0.0, 0.0),
//!     BoxCollider::new(16.0, 16.0),
//!     Collidable::in_group(CollisionGroup::Enemy).with_on_enter(move |_partner, data| {
//!         if data.group.as_deref() == Some("player_projectile") {
//!             counter.fetch_add(1, Ordering::Relaxed);
//!         }
//!     }),
//! ));
//! ```
//!
//! # Related
//!
//! - [`crate::resources::registry::CollisionRegistry`] – drives the slots each tick
//! - [`crate::events::bus::CollisionEventBus`] – decoupled listeners for the same transitions

use std::fmt;

use bevy_ecs::prelude::*;
use log::debug;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::events::bus::run_isolated;

/// Data handed to reaction slots alongside the partner entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContactData {
    /// Group label of the partner, if it has one.
    pub group: Option<String>,
    /// World time at which this data was produced.
    pub time: f32,
}

impl ContactData {
    pub fn new(group: Option<String>, time: f32) -> Self {
        Self { group, time }
    }
}

/// One open overlap episode as seen from one participant.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactRecord {
    pub partner: Entity,
    pub started_at: f32,
    pub last_data: ContactData,
}

/// Reaction slot signature: `(partner, data)`.
pub type ReactionFn = Box<dyn FnMut(Entity, &ContactData) + Send + Sync>;

#[derive(Component)]
pub struct Collidable {
    group: Option<String>,
    interest_mask: FxHashSet<String>,
    active: bool,
    open: FxHashMap<Entity, ContactRecord>,
    on_enter: Option<ReactionFn>,
    on_stay: Option<ReactionFn>,
    on_exit: Option<ReactionFn>,
}

impl Default for Collidable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Collidable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collidable")
            .field("group", &self.group)
            .field("interest_mask", &self.interest_mask)
            .field("active", &self.active)
            .field("open", &self.open.len())
            .finish_non_exhaustive()
    }
}

impl Collidable {
    /// An active collidable with no group and no reaction slots.
    pub fn new() -> Self {
        Self {
            group: None,
            interest_mask: FxHashSet::default(),
            active: true,
            open: FxHashMap::default(),
            on_enter: None,
            on_stay: None,
            on_exit: None,
        }
    }

    pub fn in_group(group: impl AsRef<str>) -> Self {
        let mut collidable = Self::new();
        collidable.set_group(group);
        collidable
    }

    pub fn with_interest<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.set_interest_mask(groups);
        self
    }

    pub fn with_on_enter<F>(mut self, f: F) -> Self
    where
        F: FnMut(Entity, &ContactData) + Send + Sync + 'static,
    {
        self.on_enter = Some(Box::new(f));
        self
    }

    pub fn with_on_stay<F>(mut self, f: F) -> Self
    where
        F: FnMut(Entity, &ContactData) + Send + Sync + 'static,
    {
        self.on_stay = Some(Box::new(f));
        self
    }

    pub fn with_on_exit<F>(mut self, f: F) -> Self
    where
        F: FnMut(Entity, &ContactData) + Send + Sync + 'static,
    {
        self.on_exit = Some(Box::new(f));
        self
    }

    /// Replace the enter slot. `None` clears it.
    pub fn set_on_enter(&mut self, slot: Option<ReactionFn>) {
        self.on_enter = slot;
    }

    pub fn set_on_stay(&mut self, slot: Option<ReactionFn>) {
        self.on_stay = slot;
    }

    pub fn set_on_exit(&mut self, slot: Option<ReactionFn>) {
        self.on_exit = slot;
    }

    // ==================== Labels ====================

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    pub fn set_group(&mut self, group: impl AsRef<str>) {
        let group = group.as_ref();
        if !self.open.is_empty() && self.group.as_deref() != Some(group) {
            debug!(
                "Collidable group changed from {:?} to '{}' with {} open collisions",
                self.group,
                group,
                self.open.len()
            );
        }
        self.group = Some(group.to_string());
    }

    pub fn interest_mask(&self) -> &FxHashSet<String> {
        &self.interest_mask
    }

    pub fn set_interest_mask<I, S>(&mut self, groups: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.interest_mask = groups
            .into_iter()
            .map(|g| g.as_ref().to_string())
            .collect();
    }

    /// Whether this collidable declares interest in `group`.
    /// An empty mask means no restriction.
    pub fn interested_in(&self, group: &str) -> bool {
        self.interest_mask.is_empty() || self.interest_mask.contains(group)
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Toggle participation. Inactive collidables are skipped by the spatial
    /// engine and rejected by the registry gate; open records are closed by
    /// the next exit sweep.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    // ==================== Lifecycle ====================

    /// Open a record for `partner` and run the enter slot.
    ///
    /// If a record already exists the call is routed to
    /// [`handle_stay`](Self::handle_stay). Returns `true` when a new record
    /// was opened.
    pub fn handle_enter(&mut self, partner: Entity, data: ContactData) -> bool {
        if self.open.contains_key(&partner) {
            self.handle_stay(partner, data);
            return false;
        }
        self.open.insert(
            partner,
            ContactRecord {
                partner,
                started_at: data.time,
                last_data: data.clone(),
            },
        );
        if let Some(slot) = self.on_enter.as_mut() {
            run_isolated("on_enter", || slot(partner, &data));
        }
        true
    }

    /// Refresh the record for `partner` and run the stay slot.
    ///
    /// A stay for a partner with no open record opens one instead, so every
    /// exit this collidable reports is preceded by an enter.
    pub fn handle_stay(&mut self, partner: Entity, data: ContactData) {
        let Some(record) = self.open.get_mut(&partner) else {
            self.handle_enter(partner, data);
            return;
        };
        record.last_data = data.clone();
        if let Some(slot) = self.on_stay.as_mut() {
            run_isolated("on_stay", || slot(partner, &data));
        }
    }

    /// Close the record for `partner` and run the exit slot.
    /// Returns `false` (and runs nothing) when no record was open.
    pub fn handle_exit(&mut self, partner: Entity) -> bool {
        let Some(record) = self.open.remove(&partner) else {
            return false;
        };
        if let Some(slot) = self.on_exit.as_mut() {
            run_isolated("on_exit", || slot(partner, &record.last_data));
        }
        true
    }

    pub fn is_colliding_with(&self, partner: Entity) -> bool {
        self.open.contains_key(&partner)
    }

    pub fn active_collisions(&self) -> impl Iterator<Item = &ContactRecord> {
        self.open.values()
    }

    pub fn collision_count(&self) -> usize {
        self.open.len()
    }

    /// Force-close every open record, running the exit slot for each.
    /// Returns the partners that were closed.
    pub fn clear_collisions(&mut self) -> Vec<Entity> {
        let partners: Vec<Entity> = self.open.keys().copied().collect();
        for partner in &partners {
            self.handle_exit(*partner);
        }
        partners
    }

    /// Drop every open record without running any slot.
    pub(crate) fn forget_collisions(&mut self) {
        self.open.clear();
    }
}
