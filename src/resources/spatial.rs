//! Spatial engine seam and the default box-overlap engine.
//!
//! The [`CollisionRegistry`](crate::resources::registry::CollisionRegistry)
//! does not compute intersections itself. It talks to a [`SpatialEngine`]
//! that owns spatial groups, answers bounds queries, and reports, once per
//! tick, every pair of watched bodies whose bounds currently intersect. The
//! engine only ever reports positive overlaps; noticing that an overlap has
//! ended is the registry's job.
//!
//! [`AabbEngine`] is the built-in implementation: bodies are entities with a
//! [`MapPosition`] and a [`BoxCollider`]. Bodies whose [`Collidable`] is
//! inactive are skipped. Watches in [`CollisionMode::Blocking`] also push
//! overlapping bodies apart along the axis of least penetration.
//!
//! # Flow
//!
//! 1. `create_group` / `insert_member` as gameplay registers entities
//! 2. `watch(a, b, mode)` for each monitoring rule, `unwatch` on removal
//! 3. `step(world)` each tick returns [`RawOverlap`]s tagged with the watch
//! 4. `bounds(world, entity)` during the registry's exit sweep

use bevy_ecs::prelude::*;
use glam::Vec2;
use log::trace;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::components::boxcollider::{Aabb, BoxCollider};
use crate::components::collidable::Collidable;
use crate::components::mapposition::MapPosition;

/// Handle of a spatial group inside the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SpatialGroupId(pub u32);

/// Handle of one watch subscription, needed to unregister it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct WatchHandle(pub u64);

/// Whether the engine should also separate overlapping bodies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionMode {
    /// Stop bodies from interpenetrating.
    Blocking,
    /// Detect overlap only; motion is untouched.
    #[default]
    NonBlocking,
}

/// Per-group settings handed to the engine on creation.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GroupConfig {
    /// Bodies of this group are never moved by blocking resolution.
    pub immovable: bool,
}

impl GroupConfig {
    pub fn immovable() -> Self {
        Self { immovable: true }
    }
}

/// One side of a watch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WatchTarget {
    Group(SpatialGroupId),
    Body(Entity),
}

/// A positive overlap reported for a watch. `a` comes from the watch's first
/// side, `b` from the second.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawOverlap {
    pub watch: WatchHandle,
    pub a: Entity,
    pub b: Entity,
}

/// The external collision-detection collaborator.
pub trait SpatialEngine: Send + Sync {
    fn create_group(&mut self, name: &str, config: &GroupConfig) -> SpatialGroupId;

    /// Forget the group and its member set. Watches on it stop reporting.
    fn destroy_group(&mut self, group: SpatialGroupId);

    fn insert_member(&mut self, group: SpatialGroupId, entity: Entity) -> bool;

    fn remove_member(&mut self, group: SpatialGroupId, entity: Entity) -> bool;

    fn clear_members(&mut self, group: SpatialGroupId);

    fn watch(&mut self, a: WatchTarget, b: WatchTarget, mode: CollisionMode) -> WatchHandle;

    fn unwatch(&mut self, handle: WatchHandle) -> bool;

    /// Advance one tick and report every watched pair that overlaps now.
    fn step(&mut self, world: &mut World) -> Vec<RawOverlap>;

    /// Current world bounds of a body, `None` if it has none or is disabled.
    fn bounds(&self, world: &World, entity: Entity) -> Option<Aabb>;
}

#[derive(Debug, Default)]
struct SpatialGroup {
    name: String,
    config: GroupConfig,
    members: FxHashSet<Entity>,
}

#[derive(Debug, Clone, Copy)]
struct Watch {
    a: WatchTarget,
    b: WatchTarget,
    mode: CollisionMode,
}

/// Box-overlap engine over [`MapPosition`] + [`BoxCollider`].
#[derive(Debug, Default)]
pub struct AabbEngine {
    groups: FxHashMap<SpatialGroupId, SpatialGroup>,
    watches: FxHashMap<WatchHandle, Watch>,
    next_group: u32,
    next_watch: u64,
}

impl AabbEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group_name(&self, group: SpatialGroupId) -> Option<&str> {
        self.groups.get(&group).map(|g| g.name.as_str())
    }

    pub fn member_count(&self, group: SpatialGroupId) -> usize {
        self.groups.get(&group).map_or(0, |g| g.members.len())
    }

    pub fn watch_count(&self) -> usize {
        self.watches.len()
    }

    fn side_members(&self, target: WatchTarget) -> Vec<Entity> {
        match target {
            WatchTarget::Group(id) => self
                .groups
                .get(&id)
                .map(|g| g.members.iter().copied().collect())
                .unwrap_or_default(),
            WatchTarget::Body(entity) => vec![entity],
        }
    }

    fn is_immovable(&self, entity: Entity) -> bool {
        self.groups
            .values()
            .any(|g| g.config.immovable && g.members.contains(&entity))
    }

    /// Push `a` and `b` apart along the axis of least penetration.
    fn separate(&self, world: &mut World, a: Entity, b: Entity, box_a: &Aabb, box_b: &Aabb) {
        let Some(pen) = box_a.penetration(box_b) else {
            return;
        };
        let towards_b = box_b.center() - box_a.center();
        let push = if pen.x < pen.y {
            Vec2::new(if towards_b.x < 0.0 { -pen.x } else { pen.x }, 0.0)
        } else {
            Vec2::new(0.0, if towards_b.y < 0.0 { -pen.y } else { pen.y })
        };

        let (share_a, share_b) = match (self.is_immovable(a), self.is_immovable(b)) {
            (false, false) => (0.5, 0.5),
            (true, false) => (0.0, 1.0),
            (false, true) => (1.0, 0.0),
            (true, true) => return,
        };
        if share_a > 0.0 {
            if let Some(mut pos) = world.get_mut::<MapPosition>(a) {
                pos.pos -= push * share_a;
            }
        }
        if share_b > 0.0 {
            if let Some(mut pos) = world.get_mut::<MapPosition>(b) {
                pos.pos += push * share_b;
            }
        }
    }
}

impl SpatialEngine for AabbEngine {
    fn create_group(&mut self, name: &str, config: &GroupConfig) -> SpatialGroupId {
        self.next_group += 1;
        let id = SpatialGroupId(self.next_group);
        self.groups.insert(
            id,
            SpatialGroup {
                name: name.to_string(),
                config: *config,
                members: FxHashSet::default(),
            },
        );
        id
    }

    fn destroy_group(&mut self, group: SpatialGroupId) {
        self.groups.remove(&group);
    }

    fn insert_member(&mut self, group: SpatialGroupId, entity: Entity) -> bool {
        self.groups
            .get_mut(&group)
            .is_some_and(|g| g.members.insert(entity))
    }

    fn remove_member(&mut self, group: SpatialGroupId, entity: Entity) -> bool {
        self.groups
            .get_mut(&group)
            .is_some_and(|g| g.members.remove(&entity))
    }

    fn clear_members(&mut self, group: SpatialGroupId) {
        if let Some(g) = self.groups.get_mut(&group) {
            g.members.clear();
        }
    }

    fn watch(&mut self, a: WatchTarget, b: WatchTarget, mode: CollisionMode) -> WatchHandle {
        self.next_watch += 1;
        let handle = WatchHandle(self.next_watch);
        self.watches.insert(handle, Watch { a, b, mode });
        handle
    }

    fn unwatch(&mut self, handle: WatchHandle) -> bool {
        self.watches.remove(&handle).is_some()
    }

    fn step(&mut self, world: &mut World) -> Vec<RawOverlap> {
        let mut handles: Vec<WatchHandle> = self.watches.keys().copied().collect();
        handles.sort_unstable();

        let mut overlaps = Vec::new();
        for handle in handles {
            let watch = self.watches[&handle];
            let side_a = self.side_members(watch.a);
            let side_b = self.side_members(watch.b);
            let same_side = watch.a == watch.b;

            for (i, &a) in side_a.iter().enumerate() {
                // Same group on both sides: visit each unordered pair once.
                let candidates = if same_side { &side_b[i + 1..] } else { &side_b[..] };
                for &b in candidates {
                    if a == b {
                        continue;
                    }
                    let (Some(box_a), Some(box_b)) = (self.bounds(world, a), self.bounds(world, b))
                    else {
                        continue;
                    };
                    if !box_a.intersects(&box_b) {
                        continue;
                    }
                    trace!("overlap {:?} <-> {:?} on watch {:?}", a, b, handle);
                    overlaps.push(RawOverlap { watch: handle, a, b });
                    if watch.mode == CollisionMode::Blocking {
                        self.separate(world, a, b, &box_a, &box_b);
                    }
                }
            }
        }
        overlaps
    }

    fn bounds(&self, world: &World, entity: Entity) -> Option<Aabb> {
        if world
            .get::<Collidable>(entity)
            .is_some_and(|c| !c.is_active())
        {
            return None;
        }
        let position = world.get::<MapPosition>(entity)?;
        let collider = world.get::<BoxCollider>(entity)?;
        Some(collider.aabb(position.pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(world: &mut World, x: f32, y: f32) -> Entity {
        world
            .spawn((
                MapPosition::new(x, y),
                BoxCollider::new(10.0, 10.0),
                Collidable::new(),
            ))
            .id()
    }

    #[test]
    fn test_step_reports_only_overlapping_pairs() {
        let mut world = World::new();
        let mut engine = AabbEngine::new();
        let players = engine.create_group("player", &GroupConfig::default());
        let enemies = engine.create_group("enemy", &GroupConfig::default());

        let p = body(&mut world, 0.0, 0.0);
        let near = body(&mut world, 5.0, 5.0);
        let far = body(&mut world, 100.0, 0.0);
        engine.insert_member(players, p);
        engine.insert_member(enemies, near);
        engine.insert_member(enemies, far);

        let handle = engine.watch(
            WatchTarget::Group(players),
            WatchTarget::Group(enemies),
            CollisionMode::NonBlocking,
        );
        let overlaps = engine.step(&mut world);
        assert_eq!(overlaps, vec![RawOverlap { watch: handle, a: p, b: near }]);
    }

    #[test]
    fn test_same_group_pairs_reported_once() {
        let mut world = World::new();
        let mut engine = AabbEngine::new();
        let enemies = engine.create_group("enemy", &GroupConfig::default());
        for x in [0.0, 4.0, 8.0] {
            let e = body(&mut world, x, 0.0);
            engine.insert_member(enemies, e);
        }
        engine.watch(
            WatchTarget::Group(enemies),
            WatchTarget::Group(enemies),
            CollisionMode::NonBlocking,
        );
        // 0-4, 0-8 and 4-8 all overlap with 10 wide boxes.
        assert_eq!(engine.step(&mut world).len(), 3);
    }

    #[test]
    fn test_inactive_bodies_are_skipped() {
        let mut world = World::new();
        let mut engine = AabbEngine::new();
        let g = engine.create_group("enemy", &GroupConfig::default());
        let a = body(&mut world, 0.0, 0.0);
        let b = body(&mut world, 1.0, 1.0);
        engine.insert_member(g, b);
        engine.watch(WatchTarget::Body(a), WatchTarget::Group(g), CollisionMode::NonBlocking);

        world.get_mut::<Collidable>(b).unwrap().set_active(false);
        assert!(engine.step(&mut world).is_empty());
        assert!(engine.bounds(&world, b).is_none());
    }

    #[test]
    fn test_blocking_moves_only_movable_body() {
        let mut world = World::new();
        let mut engine = AabbEngine::new();
        let walls = engine.create_group("wall", &GroupConfig::immovable());
        let players = engine.create_group("player", &GroupConfig::default());
        let wall = body(&mut world, 0.0, 0.0);
        let player = body(&mut world, 8.0, 1.0);
        engine.insert_member(walls, wall);
        engine.insert_member(players, player);
        engine.watch(
            WatchTarget::Group(players),
            WatchTarget::Group(walls),
            CollisionMode::Blocking,
        );

        assert_eq!(engine.step(&mut world).len(), 1);

        let wall_pos = world.get::<MapPosition>(wall).unwrap().pos;
        let player_pos = world.get::<MapPosition>(player).unwrap().pos;
        assert_eq!(wall_pos, Vec2::ZERO);
        assert!((player_pos.x - 10.0).abs() < 1e-5);
        assert!((player_pos.y - 1.0).abs() < 1e-5);

        let wb = engine.bounds(&world, wall).unwrap();
        let pb = engine.bounds(&world, player).unwrap();
        assert!(!wb.intersects(&pb));
        assert!(wb.touches(&pb));
    }

    #[test]
    fn test_unwatch_stops_reports() {
        let mut world = World::new();
        let mut engine = AabbEngine::new();
        let g = engine.create_group("enemy", &GroupConfig::default());
        let a = body(&mut world, 0.0, 0.0);
        let b = body(&mut world, 1.0, 0.0);
        engine.insert_member(g, b);
        let h = engine.watch(WatchTarget::Body(a), WatchTarget::Group(g), CollisionMode::NonBlocking);
        assert_eq!(engine.step(&mut world).len(), 1);
        assert!(engine.unwatch(h));
        assert!(engine.step(&mut world).is_empty());
        assert_eq!(engine.watch_count(), 0);
    }
}
