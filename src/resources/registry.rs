//! Collision registry: groups, monitoring rules, and the enter/stay/exit
//! state machine.
//!
//! The [`CollisionRegistry`] turns the spatial engine's positive-overlap
//! reports into per-pair lifecycle transitions. It owns:
//!
//! - named groups, each backed by a spatial group in the engine plus an
//!   internal member set
//! - monitoring rules (group vs group, or one entity vs a group), each backed
//!   by an engine watch
//! - the open collision records, at most one per unordered entity pair
//!
//! Entities are never owned here. The registry only holds [`Entity`] ids and
//! looks their [`Collidable`] up in the [`World`] when it needs them; an id
//! whose entity was despawned simply stops resolving.
//!
//! # Tick
//!
//! [`tick`](CollisionRegistry::tick) runs one full pass:
//!
//! 1. `engine.step(world)` collects this tick's overlaps per watch
//! 2. [`classify`](CollisionRegistry::classify) gates each report, then opens
//!    a record (enter) or refreshes it (stay), and runs the rule's reaction
//! 3. [`update`](CollisionRegistry::update) sweeps open records and closes
//!    those whose participants are gone, inactive, or no longer overlapping
//!
//! Every transition runs the participants' reaction slots and is published on
//! the [`CollisionEventBus`] under the rule's `groupA_groupB` name (plus the
//! generic `collision_start`/`collision_stay`/`collision_end` markers unless
//! disabled in [`CollisionConfig`]).
//!
//! # Failure handling
//!
//! Unknown groups and missing entities are logged at `warn` and the call is
//! skipped. Panics raised by reaction slots, rule reactions and bus handlers
//! are caught where they are invoked; a tick always finishes.
//!
//! # Example
//!
//! ```ignore
//! let bus = CollisionEventBus::new();
//! let mut registry = CollisionRegistry::new(bus.clone(), CollisionConfig::default());
//! registry.register_group("player", GroupConfig::default());
//! registry.register_group("enemy", GroupConfig::default());
//! registry.add_to_group(&mut world, player, "player");
//! registry.add_collision_rule("player", "enemy", CollisionMode::NonBlocking, None);
//!
//! bus.on(event_types::PLAYER_ENEMY, |e| if e.is_enter() { /* take damage */ });
//!
//! loop {
//!     registry.tick(&mut world);
//! }
//! ```

use std::fmt;

use bevy_ecs::prelude::*;
use log::{debug, info, trace, warn};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use smallvec::SmallVec;

use crate::components::collidable::{Collidable, ContactData};
use crate::error::CollisionError;
use crate::events::bus::{CollisionEventBus, run_isolated};
use crate::events::collision::{CollisionEvent, CollisionPhase, pair_event_type};
use crate::resources::collisionconfig::CollisionConfig;
use crate::resources::spatial::{
    AabbEngine, CollisionMode, GroupConfig, RawOverlap, SpatialEngine, SpatialGroupId,
    WatchHandle, WatchTarget,
};
use crate::resources::worldtime::WorldTime;

/// Identifier of a monitoring rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RuleKey(pub u64);

/// Reaction run on every gated report of a rule, on top of enter/stay.
/// Receives the world and the pair in rule side order.
pub type RuleReaction = Box<dyn FnMut(&mut World, Entity, Entity) + Send + Sync>;

/// Box a closure as a [`RuleReaction`].
pub fn reaction<F>(f: F) -> RuleReaction
where
    F: FnMut(&mut World, Entity, Entity) + Send + Sync + 'static,
{
    Box::new(f)
}

/// One side of a monitoring rule.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RuleSide {
    Group(String),
    Object(Entity),
}

impl RuleSide {
    pub fn references_group(&self, group: &str) -> bool {
        matches!(self, RuleSide::Group(name) if name == group)
    }

    pub fn references_entity(&self, entity: Entity) -> bool {
        matches!(self, RuleSide::Object(e) if *e == entity)
    }
}

/// A registered group-pair or object-to-group watch.
pub struct MonitoringRule {
    pub key: RuleKey,
    pub side_a: RuleSide,
    pub side_b: RuleSide,
    pub mode: CollisionMode,
    /// Name under which transitions are published, `groupA_groupB`.
    pub event_type: String,
    watch: WatchHandle,
    reaction: Option<RuleReaction>,
}

impl fmt::Debug for MonitoringRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitoringRule")
            .field("key", &self.key)
            .field("side_a", &self.side_a)
            .field("side_b", &self.side_b)
            .field("mode", &self.mode)
            .field("event_type", &self.event_type)
            .field("watch", &self.watch)
            .field("reaction", &self.reaction.is_some())
            .finish()
    }
}

impl MonitoringRule {
    pub fn watch(&self) -> WatchHandle {
        self.watch
    }

    pub fn has_reaction(&self) -> bool {
        self.reaction.is_some()
    }
}

/// Order-independent key of an entity pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey(Entity, Entity);

impl PairKey {
    pub fn new(a: Entity, b: Entity) -> Self {
        if a <= b { Self(a, b) } else { Self(b, a) }
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.0 == entity || self.1 == entity
    }

    pub fn entities(&self) -> (Entity, Entity) {
        (self.0, self.1)
    }
}

/// One continuous overlap episode between two entities.
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionRecord {
    /// Participant on the first side of the rule that opened the record.
    pub a: Entity,
    /// Participant on the second side.
    pub b: Entity,
    pub rule: RuleKey,
    pub event_type: String,
    pub started_at: f32,
    pub last_seen: f32,
    /// Number of ticks the pair was reported, the enter tick included.
    pub ticks: u32,
}

#[derive(Debug)]
struct GroupEntry {
    spatial: SpatialGroupId,
    config: GroupConfig,
    members: FxHashSet<Entity>,
}

/// Read-only counters for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CollisionStats {
    pub groups: usize,
    pub rules: usize,
    pub open_records: usize,
    pub members: usize,
}

#[derive(Resource)]
pub struct CollisionRegistry {
    engine: Box<dyn SpatialEngine>,
    bus: CollisionEventBus,
    config: CollisionConfig,
    groups: FxHashMap<String, GroupEntry>,
    rules: FxHashMap<RuleKey, MonitoringRule>,
    watches: FxHashMap<WatchHandle, RuleKey>,
    records: FxHashMap<PairKey, CollisionRecord>,
    next_rule: u64,
}

impl fmt::Debug for CollisionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollisionRegistry")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl CollisionRegistry {
    /// Registry backed by the built-in [`AabbEngine`].
    pub fn new(bus: CollisionEventBus, config: CollisionConfig) -> Self {
        Self::with_engine(AabbEngine::new(), bus, config)
    }

    pub fn with_engine(
        engine: impl SpatialEngine + 'static,
        bus: CollisionEventBus,
        config: CollisionConfig,
    ) -> Self {
        Self {
            engine: Box::new(engine),
            bus,
            config,
            groups: FxHashMap::default(),
            rules: FxHashMap::default(),
            watches: FxHashMap::default(),
            records: FxHashMap::default(),
            next_rule: 0,
        }
    }

    pub fn bus(&self) -> &CollisionEventBus {
        &self.bus
    }

    pub fn config(&self) -> &CollisionConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut CollisionConfig {
        &mut self.config
    }

    // ==================== Groups ====================

    /// Register a named group backed by a spatial group. Registering an
    /// existing name returns the existing handle.
    pub fn register_group(&mut self, name: impl AsRef<str>, config: GroupConfig) -> SpatialGroupId {
        let name = name.as_ref();
        if let Some(entry) = self.groups.get(name) {
            debug!("collision group '{}' already registered", name);
            return entry.spatial;
        }
        let spatial = self.engine.create_group(name, &config);
        self.groups.insert(
            name.to_string(),
            GroupEntry {
                spatial,
                config,
                members: FxHashSet::default(),
            },
        );
        debug!("registered collision group '{}' ({:?})", name, spatial);
        spatial
    }

    pub fn has_group(&self, name: &str) -> bool {
        self.groups.contains_key(name)
    }

    pub fn group_handle(&self, name: &str) -> Option<SpatialGroupId> {
        self.groups.get(name).map(|g| g.spatial)
    }

    pub fn group_config(&self, name: &str) -> Option<GroupConfig> {
        self.groups.get(name).map(|g| g.config)
    }

    pub fn group_members(&self, name: &str) -> impl Iterator<Item = Entity> + '_ {
        self.groups
            .get(name)
            .into_iter()
            .flat_map(|g| g.members.iter().copied())
    }

    /// Add `entity` to a registered group.
    ///
    /// An entity belongs to at most one group; it leaves its previous group
    /// first. The entity's `Collidable` group label is stamped if unset.
    pub fn add_to_group(&mut self, world: &mut World, entity: Entity, name: &str) -> bool {
        if !self.groups.contains_key(name) {
            warn!("add_to_group: {}", CollisionError::UnknownGroup(name.to_string()));
            return false;
        }
        let Some(mut collidable) = world.get_mut::<Collidable>(entity) else {
            warn!("add_to_group: {}", CollisionError::MissingEntity(entity));
            return false;
        };
        if collidable.group().is_none() {
            collidable.set_group(name);
        }

        let previous: SmallVec<[String; 1]> = self
            .groups
            .iter()
            .filter(|(group, entry)| group.as_str() != name && entry.members.contains(&entity))
            .map(|(group, _)| group.clone())
            .collect();
        for group in previous {
            debug!("{:?} moves from group '{}' to '{}'", entity, group, name);
            self.detach(entity, &group);
        }

        let Some(entry) = self.groups.get_mut(name) else {
            return false;
        };
        entry.members.insert(entity);
        self.engine.insert_member(entry.spatial, entity);
        true
    }

    /// Remove `entity` from a group. Open records are left to the exit sweep.
    pub fn remove_from_group(&mut self, entity: Entity, name: &str) -> bool {
        if !self.groups.contains_key(name) {
            warn!("remove_from_group: {}", CollisionError::UnknownGroup(name.to_string()));
            return false;
        }
        self.detach(entity, name)
    }

    /// Drop a group: its rules are removed and its spatial group destroyed.
    /// Open records between former members are closed by the exit sweep.
    pub fn unregister_group(&mut self, name: &str) -> bool {
        if !self.groups.contains_key(name) {
            warn!("unregister_group: {}", CollisionError::UnknownGroup(name.to_string()));
            return false;
        }
        let removed = self.clear_group_collisions(name);
        let Some(entry) = self.groups.remove(name) else {
            return false;
        };
        self.engine.destroy_group(entry.spatial);
        debug!(
            "unregistered collision group '{}' ({} rules, {} members)",
            name,
            removed,
            entry.members.len()
        );
        true
    }

    fn detach(&mut self, entity: Entity, name: &str) -> bool {
        let Some(entry) = self.groups.get_mut(name) else {
            return false;
        };
        let removed = entry.members.remove(&entity);
        self.engine.remove_member(entry.spatial, entity);
        removed
    }

    // ==================== Rules ====================

    /// Watch every pair between `group_a` and `group_b` members.
    ///
    /// Returns `None` (after logging) if either group is not registered, or
    /// if the compatibility table rejects the pair under `strict_groups`.
    pub fn add_collision_rule(
        &mut self,
        group_a: impl AsRef<str>,
        group_b: impl AsRef<str>,
        mode: CollisionMode,
        reaction: Option<RuleReaction>,
    ) -> Option<RuleKey> {
        let (group_a, group_b) = (group_a.as_ref(), group_b.as_ref());
        let (spatial_a, spatial_b) = match (self.group_handle(group_a), self.group_handle(group_b)) {
            (Some(a), Some(b)) => (a, b),
            (a, _) => {
                let missing = if a.is_none() { group_a } else { group_b };
                warn!(
                    "add_collision_rule({}, {}): {}",
                    group_a,
                    group_b,
                    CollisionError::UnknownGroup(missing.to_string())
                );
                return None;
            }
        };
        if !self.check_compatibility(group_a, group_b) {
            return None;
        }

        let watch = self.engine.watch(
            WatchTarget::Group(spatial_a),
            WatchTarget::Group(spatial_b),
            mode,
        );
        Some(self.insert_rule(
            RuleSide::Group(group_a.to_string()),
            RuleSide::Group(group_b.to_string()),
            mode,
            pair_event_type(group_a, group_b),
            watch,
            reaction,
        ))
    }

    /// Watch one entity against every member of `group`.
    ///
    /// The event name uses the object's own group label, or `object` when it
    /// has none.
    pub fn add_object_group_collision(
        &mut self,
        world: &World,
        object: Entity,
        group: impl AsRef<str>,
        mode: CollisionMode,
        reaction: Option<RuleReaction>,
    ) -> Option<RuleKey> {
        let group = group.as_ref();
        let Some(spatial) = self.group_handle(group) else {
            warn!(
                "add_object_group_collision: {}",
                CollisionError::UnknownGroup(group.to_string())
            );
            return None;
        };
        let Some(collidable) = world.get::<Collidable>(object) else {
            warn!(
                "add_object_group_collision: {}",
                CollisionError::MissingEntity(object)
            );
            return None;
        };
        let label = collidable.group().unwrap_or("object").to_string();
        if collidable.group().is_some() && !self.check_compatibility(&label, group) {
            return None;
        }

        let watch = self
            .engine
            .watch(WatchTarget::Body(object), WatchTarget::Group(spatial), mode);
        Some(self.insert_rule(
            RuleSide::Object(object),
            RuleSide::Group(group.to_string()),
            mode,
            pair_event_type(&label, group),
            watch,
            reaction,
        ))
    }

    fn check_compatibility(&self, a: &str, b: &str) -> bool {
        let table = &self.config.compatibility;
        if !table.knows(a) || !table.knows(b) || table.is_compatible(a, b) {
            return true;
        }
        let err = CollisionError::IncompatibleGroups(a.to_string(), b.to_string());
        if self.config.strict_groups {
            warn!("rule rejected: {}", err);
            false
        } else {
            warn!("registering rule anyway: {}", err);
            true
        }
    }

    fn insert_rule(
        &mut self,
        side_a: RuleSide,
        side_b: RuleSide,
        mode: CollisionMode,
        event_type: String,
        watch: WatchHandle,
        reaction: Option<RuleReaction>,
    ) -> RuleKey {
        self.next_rule += 1;
        let key = RuleKey(self.next_rule);
        debug!("rule {:?} '{}' ({:?})", key, event_type, mode);
        self.watches.insert(watch, key);
        self.rules.insert(
            key,
            MonitoringRule {
                key,
                side_a,
                side_b,
                mode,
                event_type,
                watch,
                reaction,
            },
        );
        key
    }

    pub fn rule(&self, key: RuleKey) -> Option<&MonitoringRule> {
        self.rules.get(&key)
    }

    /// Rule keys in registration order.
    pub fn rule_keys(&self) -> Vec<RuleKey> {
        let mut keys: Vec<RuleKey> = self.rules.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    /// Unregister a rule from the engine and drop it.
    pub fn remove_collision(&mut self, key: RuleKey) -> bool {
        let Some(rule) = self.rules.remove(&key) else {
            debug!("remove_collision: no rule {:?}", key);
            return false;
        };
        self.watches.remove(&rule.watch);
        self.engine.unwatch(rule.watch);
        debug!("removed rule {:?} '{}'", key, rule.event_type);
        true
    }

    /// Remove every rule that references `group` on either side.
    /// Returns the number of rules removed.
    pub fn clear_group_collisions(&mut self, group: &str) -> usize {
        if !self.groups.contains_key(group) {
            warn!(
                "clear_group_collisions: {}",
                CollisionError::UnknownGroup(group.to_string())
            );
            return 0;
        }
        let keys: SmallVec<[RuleKey; 8]> = self
            .rules
            .values()
            .filter(|r| r.side_a.references_group(group) || r.side_b.references_group(group))
            .map(|r| r.key)
            .collect();
        for key in &keys {
            self.remove_collision(*key);
        }
        keys.len()
    }

    // ==================== Tick ====================

    /// One full tick: engine step, classification, exit sweep.
    pub fn tick(&mut self, world: &mut World) {
        let reports = self.engine.step(world);
        self.classify(world, &reports);
        self.update(world);
    }

    /// Classify this tick's positive overlap reports into enter/stay.
    ///
    /// Reports for watches that no longer belong to a rule are ignored. A
    /// pair reported by several rules is classified once; each rule's
    /// reaction still runs.
    pub fn classify(&mut self, world: &mut World, reports: &[RawOverlap]) {
        let now = world_time(world);
        let mut seen: FxHashSet<PairKey> = FxHashSet::default();

        for report in reports {
            let Some(rule_key) = self.watches.get(&report.watch).copied() else {
                trace!("ignoring report for stale watch {:?}", report.watch);
                continue;
            };
            if !gate(world, report.a, report.b) {
                continue;
            }
            let pair = PairKey::new(report.a, report.b);
            if seen.insert(pair) {
                self.classify_pair(world, rule_key, pair, report.a, report.b, now);
            }
            self.run_reaction(world, rule_key, report.a, report.b);
        }
    }

    fn classify_pair(
        &mut self,
        world: &mut World,
        rule_key: RuleKey,
        pair: PairKey,
        a: Entity,
        b: Entity,
        now: f32,
    ) {
        let (a, b, phase, event_type, started_at) = match self.records.get_mut(&pair) {
            Some(record) => {
                record.last_seen = now;
                record.ticks += 1;
                (
                    record.a,
                    record.b,
                    CollisionPhase::Stay,
                    record.event_type.clone(),
                    record.started_at,
                )
            }
            None => {
                let Some(rule) = self.rules.get(&rule_key) else {
                    return;
                };
                let event_type = rule.event_type.clone();
                self.records.insert(
                    pair,
                    CollisionRecord {
                        a,
                        b,
                        rule: rule_key,
                        event_type: event_type.clone(),
                        started_at: now,
                        last_seen: now,
                        ticks: 1,
                    },
                );
                debug!("enter '{}' {:?} <-> {:?}", event_type, a, b);
                (a, b, CollisionPhase::Enter, event_type, now)
            }
        };

        let group_a = group_of(world, a);
        let group_b = group_of(world, b);
        if let Some(mut collidable) = world.get_mut::<Collidable>(a) {
            let data = ContactData::new(group_b.clone(), now);
            match phase {
                CollisionPhase::Enter => {
                    collidable.handle_enter(b, data);
                }
                _ => collidable.handle_stay(b, data),
            }
        }
        if let Some(mut collidable) = world.get_mut::<Collidable>(b) {
            let data = ContactData::new(group_a.clone(), now);
            match phase {
                CollisionPhase::Enter => {
                    collidable.handle_enter(a, data);
                }
                _ => collidable.handle_stay(a, data),
            }
        }
        if phase == CollisionPhase::Stay {
            trace!("stay '{}' {:?} <-> {:?}", event_type, a, b);
        }

        self.publish(
            &event_type,
            CollisionEvent {
                phase,
                a,
                b,
                group_a,
                group_b,
                time: now,
                started_at,
            },
        );
    }

    fn run_reaction(&mut self, world: &mut World, rule_key: RuleKey, a: Entity, b: Entity) {
        let Some(rule) = self.rules.get_mut(&rule_key) else {
            return;
        };
        if let Some(reaction) = rule.reaction.as_mut() {
            run_isolated(&rule.event_type, || reaction(world, a, b));
        }
    }

    /// Exit sweep over every open record.
    ///
    /// A record closes when either participant is despawned or inactive, or
    /// when the engine's bounds for the two no longer overlap. Exit slots run
    /// on every participant that still carries a `Collidable`.
    pub fn update(&mut self, world: &mut World) {
        let now = world_time(world);
        let mut pairs: Vec<PairKey> = self.records.keys().copied().collect();
        pairs.sort_unstable();

        for pair in pairs {
            let Some(record) = self.records.get(&pair) else {
                continue;
            };
            let (a, b) = (record.a, record.b);
            let still_overlapping = is_active(world, a)
                && is_active(world, b)
                && match (self.engine.bounds(world, a), self.engine.bounds(world, b)) {
                    (Some(box_a), Some(box_b)) => {
                        if self.config.touch_is_overlap {
                            box_a.touches(&box_b)
                        } else {
                            box_a.intersects(&box_b)
                        }
                    }
                    _ => false,
                };
            if !still_overlapping {
                self.close_record(world, pair, now);
            }
        }
        self.prune_despawned(world);
    }

    /// Forget group members and object rules whose entity no longer exists.
    fn prune_despawned(&mut self, world: &World) {
        let mut dead: Vec<(String, Entity)> = Vec::new();
        for (name, entry) in &self.groups {
            for &entity in &entry.members {
                if world.get_entity(entity).is_err() {
                    dead.push((name.clone(), entity));
                }
            }
        }
        for (name, entity) in dead {
            trace!("pruning despawned {:?} from group '{}'", entity, name);
            self.detach(entity, &name);
        }

        let orphaned: SmallVec<[RuleKey; 4]> = self
            .rules
            .values()
            .filter(|r| match r.side_a {
                RuleSide::Object(entity) => world.get_entity(entity).is_err(),
                RuleSide::Group(_) => false,
            })
            .map(|r| r.key)
            .collect();
        for key in orphaned {
            self.remove_collision(key);
        }
    }

    fn close_record(&mut self, world: &mut World, pair: PairKey, now: f32) {
        let Some(record) = self.records.remove(&pair) else {
            return;
        };
        if let Some(mut collidable) = world.get_mut::<Collidable>(record.a) {
            collidable.handle_exit(record.b);
        }
        if let Some(mut collidable) = world.get_mut::<Collidable>(record.b) {
            collidable.handle_exit(record.a);
        }
        debug!("exit '{}' {:?} <-> {:?}", record.event_type, record.a, record.b);
        self.publish(
            &record.event_type,
            CollisionEvent {
                phase: CollisionPhase::Exit,
                a: record.a,
                b: record.b,
                group_a: group_of(world, record.a),
                group_b: group_of(world, record.b),
                time: now,
                started_at: record.started_at,
            },
        );
    }

    fn publish(&self, event_type: &str, event: CollisionEvent) {
        self.bus.emit(event_type, &event);
        if self.config.emit_lifecycle_markers {
            self.bus.emit(event.phase.marker(), &event);
        }
    }

    // ==================== Entity lifecycle ====================

    /// Forced-exit path for an entity about to be discarded: closes every
    /// record it takes part in (exit slots and events fire) and removes it
    /// from all groups and object rules. Returns the number of records closed.
    pub fn release_entity(&mut self, world: &mut World, entity: Entity) -> usize {
        let now = world_time(world);
        let mut pairs: Vec<PairKey> = self
            .records
            .keys()
            .filter(|pair| pair.contains(entity))
            .copied()
            .collect();
        pairs.sort_unstable();
        for pair in &pairs {
            self.close_record(world, *pair, now);
        }

        let groups: SmallVec<[String; 1]> = self
            .groups
            .iter()
            .filter(|(_, entry)| entry.members.contains(&entity))
            .map(|(name, _)| name.clone())
            .collect();
        for group in groups {
            self.detach(entity, &group);
        }

        let object_rules: SmallVec<[RuleKey; 4]> = self
            .rules
            .values()
            .filter(|r| r.side_a.references_entity(entity) || r.side_b.references_entity(entity))
            .map(|r| r.key)
            .collect();
        for key in object_rules {
            self.remove_collision(key);
        }
        pairs.len()
    }

    /// [`release_entity`](Self::release_entity), then despawn.
    pub fn despawn_collidable(&mut self, world: &mut World, entity: Entity) -> bool {
        self.release_entity(world, entity);
        world.despawn(entity)
    }

    // ==================== Teardown & introspection ====================

    /// Full teardown for a world or level transition.
    ///
    /// Destroys every rule, drops every open record, empties every group's
    /// member set and clears the event bus. Records are dropped silently
    /// unless `exit_on_cleanup` is set, in which case exits fire first.
    pub fn cleanup(&mut self, world: &mut World) {
        let stats = self.stats();
        let mut pairs: Vec<PairKey> = self.records.keys().copied().collect();
        pairs.sort_unstable();
        if self.config.exit_on_cleanup {
            let now = world_time(world);
            for pair in pairs {
                self.close_record(world, pair, now);
            }
        } else {
            for pair in pairs {
                let (a, b) = pair.entities();
                for entity in [a, b] {
                    if let Some(mut collidable) = world.get_mut::<Collidable>(entity) {
                        collidable.forget_collisions();
                    }
                }
            }
            self.records.clear();
        }

        for key in self.rule_keys() {
            self.remove_collision(key);
        }
        self.watches.clear();

        for entry in self.groups.values_mut() {
            entry.members.clear();
            self.engine.clear_members(entry.spatial);
        }

        self.bus.clear();
        info!(
            "collision registry cleaned up ({} rules, {} records, {} members)",
            stats.rules, stats.open_records, stats.members
        );
    }

    pub fn stats(&self) -> CollisionStats {
        CollisionStats {
            groups: self.groups.len(),
            rules: self.rules.len(),
            open_records: self.records.len(),
            members: self.groups.values().map(|g| g.members.len()).sum(),
        }
    }

    pub fn record(&self, a: Entity, b: Entity) -> Option<&CollisionRecord> {
        self.records.get(&PairKey::new(a, b))
    }

    pub fn records(&self) -> impl Iterator<Item = &CollisionRecord> {
        self.records.values()
    }
}

/// Gating predicate: both entities must exist, carry a `Collidable`, and be
/// active.
fn gate(world: &World, a: Entity, b: Entity) -> bool {
    a != b && is_active(world, a) && is_active(world, b)
}

fn is_active(world: &World, entity: Entity) -> bool {
    world
        .get::<Collidable>(entity)
        .is_some_and(Collidable::is_active)
}

fn group_of(world: &World, entity: Entity) -> Option<String> {
    world
        .get::<Collidable>(entity)
        .and_then(|c| c.group().map(str::to_string))
}

fn world_time(world: &World) -> f32 {
    world.get_resource::<WorldTime>().map_or(0.0, |t| t.elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::boxcollider::BoxCollider;
    use crate::components::mapposition::MapPosition;

    fn spawn(world: &mut World, x: f32, y: f32) -> Entity {
        world
            .spawn((
                MapPosition::new(x, y),
                BoxCollider::new(10.0, 10.0),
                Collidable::new(),
            ))
            .id()
    }

    fn registry() -> CollisionRegistry {
        let mut registry = CollisionRegistry::new(CollisionEventBus::new(), CollisionConfig::new());
        registry.register_group("player", GroupConfig::default());
        registry.register_group("enemy", GroupConfig::default());
        registry
    }

    #[test]
    fn test_pair_key_is_order_independent() {
        let mut world = World::new();
        let a = world.spawn_empty().id();
        let b = world.spawn_empty().id();
        assert_eq!(PairKey::new(a, b), PairKey::new(b, a));
        assert!(PairKey::new(a, b).contains(b));
    }

    #[test]
    fn test_rule_on_unknown_group_is_skipped() {
        let mut registry = registry();
        assert!(
            registry
                .add_collision_rule("player", "ghost", CollisionMode::NonBlocking, None)
                .is_none()
        );
        assert_eq!(registry.stats().rules, 0);
        assert_eq!(registry.clear_group_collisions("ghost"), 0);
    }

    #[test]
    fn test_strict_groups_rejects_undeclared_pair() {
        let mut registry = registry();
        registry.register_group("item", GroupConfig::default());
        registry.register_group("wall", GroupConfig::default());

        assert!(
            registry
                .add_collision_rule("item", "wall", CollisionMode::NonBlocking, None)
                .is_some()
        );
        registry.config_mut().strict_groups = true;
        assert!(
            registry
                .add_collision_rule("item", "wall", CollisionMode::NonBlocking, None)
                .is_none()
        );
        assert!(
            registry
                .add_collision_rule("player", "enemy", CollisionMode::NonBlocking, None)
                .is_some()
        );
    }

    #[test]
    fn test_add_to_group_stamps_label_and_moves_membership() {
        let mut world = World::new();
        let mut registry = registry();
        let e = spawn(&mut world, 0.0, 0.0);

        assert!(registry.add_to_group(&mut world, e, "enemy"));
        assert_eq!(world.get::<Collidable>(e).unwrap().group(), Some("enemy"));

        assert!(registry.add_to_group(&mut world, e, "player"));
        assert_eq!(registry.group_members("enemy").count(), 0);
        assert_eq!(registry.group_members("player").count(), 1);
        // explicit label is kept
        assert_eq!(world.get::<Collidable>(e).unwrap().group(), Some("enemy"));

        assert!(!registry.add_to_group(&mut world, e, "ghost"));
        let bare = world.spawn_empty().id();
        assert!(!registry.add_to_group(&mut world, bare, "enemy"));
    }

    #[test]
    fn test_enter_stay_exit_records() {
        let mut world = World::new();
        let mut registry = registry();
        let p = spawn(&mut world, 0.0, 0.0);
        let e = spawn(&mut world, 5.0, 0.0);
        registry.add_to_group(&mut world, p, "player");
        registry.add_to_group(&mut world, e, "enemy");
        registry.add_collision_rule("player", "enemy", CollisionMode::NonBlocking, None);

        registry.tick(&mut world);
        registry.tick(&mut world);
        let record = registry.record(e, p).unwrap();
        assert_eq!(record.ticks, 2);
        assert_eq!(record.event_type, "player_enemy");
        assert_eq!((record.a, record.b), (p, e));

        world.get_mut::<MapPosition>(e).unwrap().translate(100.0, 0.0);
        registry.tick(&mut world);
        assert!(registry.record(p, e).is_none());
        assert!(!world.get::<Collidable>(p).unwrap().is_colliding_with(e));
    }

    #[test]
    fn test_release_entity_removes_object_rules() {
        let mut world = World::new();
        let mut registry = registry();
        let p = spawn(&mut world, 0.0, 0.0);
        let e = spawn(&mut world, 5.0, 0.0);
        registry.add_to_group(&mut world, e, "enemy");
        registry
            .add_object_group_collision(&world, p, "enemy", CollisionMode::NonBlocking, None)
            .unwrap();
        registry.tick(&mut world);
        assert_eq!(registry.stats().open_records, 1);

        assert_eq!(registry.release_entity(&mut world, p), 1);
        assert_eq!(registry.stats().rules, 0);
        assert_eq!(registry.stats().open_records, 0);
    }

    #[test]
    fn test_unregister_group_drops_its_rules() {
        let mut registry = registry();
        registry.register_group("wall", GroupConfig::immovable());
        registry.add_collision_rule("player", "wall", CollisionMode::Blocking, None);
        registry.add_collision_rule("player", "enemy", CollisionMode::NonBlocking, None);

        assert!(registry.unregister_group("wall"));
        assert!(!registry.has_group("wall"));
        assert_eq!(registry.stats().rules, 1);
        assert!(!registry.unregister_group("wall"));
    }

    #[test]
    fn test_object_rule_event_name_uses_label() {
        let mut world = World::new();
        let mut registry = registry();
        let p = world.spawn(Collidable::in_group("player")).id();
        let key = registry
            .add_object_group_collision(&world, p, "enemy", CollisionMode::NonBlocking, None)
            .unwrap();
        assert_eq!(registry.rule(key).unwrap().event_type, "player_enemy");

        let missing = world.spawn_empty().id();
        assert!(
            registry
                .add_object_group_collision(&world, missing, "enemy", CollisionMode::NonBlocking, None)
                .is_none()
        );
    }
}
