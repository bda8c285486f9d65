//! Collision event payload and the conventional event-type catalog.
//!
//! The registry emits a [`CollisionEvent`] on the
//! [`CollisionEventBus`](super::bus::CollisionEventBus) for every enter, stay
//! and exit transition. The event type is the rule's `groupA_groupB` name
//! (for example `"player_enemy"`); listeners that do not care about group
//! identity subscribe to the generic lifecycle markers in [`event_types`]
//! instead.
//!
//! Event types are open-ended strings. Gameplay code is free to emit its own
//! names with the same payload.

use bevy_ecs::prelude::Entity;
use serde::{Deserialize, Serialize};

/// Transition carried by a [`CollisionEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPhase {
    Enter,
    Stay,
    Exit,
}

impl CollisionPhase {
    /// Generic lifecycle marker emitted alongside the pair-named event.
    pub fn marker(&self) -> &'static str {
        match self {
            CollisionPhase::Enter => event_types::COLLISION_START,
            CollisionPhase::Stay => event_types::COLLISION_STAY,
            CollisionPhase::Exit => event_types::COLLISION_END,
        }
    }
}

/// Payload of every collision emission.
///
/// `a` and `b` follow the rule's side order when the event comes from the
/// registry: `a` belongs to the rule's first group (or is the rule's fixed
/// object), `b` to the second.
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionEvent {
    pub phase: CollisionPhase,
    pub a: Entity,
    pub b: Entity,
    pub group_a: Option<String>,
    pub group_b: Option<String>,
    /// World time of the emission.
    pub time: f32,
    /// World time at which the overlap episode started.
    pub started_at: f32,
}

impl CollisionEvent {
    pub fn is_enter(&self) -> bool {
        self.phase == CollisionPhase::Enter
    }

    pub fn is_stay(&self) -> bool {
        self.phase == CollisionPhase::Stay
    }

    pub fn is_exit(&self) -> bool {
        self.phase == CollisionPhase::Exit
    }

    /// Whether `entity` takes part in this event.
    pub fn involves(&self, entity: Entity) -> bool {
        self.a == entity || self.b == entity
    }

    /// The other participant, if `entity` takes part.
    pub fn other(&self, entity: Entity) -> Option<Entity> {
        if self.a == entity {
            Some(self.b)
        } else if self.b == entity {
            Some(self.a)
        } else {
            None
        }
    }

    /// Seconds the overlap has lasted at emission time.
    pub fn duration(&self) -> f32 {
        self.time - self.started_at
    }
}

/// Event type name for a pair of groups, as the registry builds it.
pub fn pair_event_type(group_a: &str, group_b: &str) -> String {
    format!("{group_a}_{group_b}")
}

/// Conventional event names.
pub mod event_types {
    pub const PLAYER_ENEMY: &str = "player_enemy";
    pub const PLAYER_WALL: &str = "player_wall";
    pub const PLAYER_ITEM: &str = "player_item";
    pub const PLAYER_PORTAL: &str = "player_portal";

    pub const PLAYER_PROJECTILE_ENEMY: &str = "player_projectile_enemy";
    pub const PLAYER_PROJECTILE_WALL: &str = "player_projectile_wall";
    pub const ENEMY_PROJECTILE_PLAYER: &str = "enemy_projectile_player";
    pub const ENEMY_PROJECTILE_WALL: &str = "enemy_projectile_wall";

    pub const ENEMY_ENEMY: &str = "enemy_enemy";
    pub const ENEMY_WALL: &str = "enemy_wall";

    pub const AREA_EFFECT_ENEMY: &str = "area_effect_enemy";
    pub const AREA_EFFECT_PLAYER: &str = "area_effect_player";

    pub const COLLISION_START: &str = "collision_start";
    pub const COLLISION_STAY: &str = "collision_stay";
    pub const COLLISION_END: &str = "collision_end";

    pub const ALL: [&str; 15] = [
        PLAYER_ENEMY,
        PLAYER_WALL,
        PLAYER_ITEM,
        PLAYER_PORTAL,
        PLAYER_PROJECTILE_ENEMY,
        PLAYER_PROJECTILE_WALL,
        ENEMY_PROJECTILE_PLAYER,
        ENEMY_PROJECTILE_WALL,
        ENEMY_ENEMY,
        ENEMY_WALL,
        AREA_EFFECT_ENEMY,
        AREA_EFFECT_PLAYER,
        COLLISION_START,
        COLLISION_STAY,
        COLLISION_END,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::group::CollisionGroup;
    use bevy_ecs::world::World;

    #[test]
    fn pair_names_match_catalog() {
        assert_eq!(
            pair_event_type(CollisionGroup::Player.name(), CollisionGroup::Enemy.name()),
            event_types::PLAYER_ENEMY
        );
        assert_eq!(
            pair_event_type(
                CollisionGroup::PlayerProjectile.name(),
                CollisionGroup::Wall.name()
            ),
            event_types::PLAYER_PROJECTILE_WALL
        );
        assert_eq!(
            pair_event_type(CollisionGroup::AreaEffect.name(), CollisionGroup::Player.name()),
            event_types::AREA_EFFECT_PLAYER
        );
    }

    #[test]
    fn other_participant() {
        let mut world = World::new();
        let a = world.spawn_empty().id();
        let b = world.spawn_empty().id();
        let c = world.spawn_empty().id();
        let event = CollisionEvent {
            phase: CollisionPhase::Stay,
            a,
            b,
            group_a: None,
            group_b: None,
            time: 3.0,
            started_at: 1.0,
        };
        assert_eq!(event.other(a), Some(b));
        assert_eq!(event.other(b), Some(a));
        assert_eq!(event.other(c), None);
        assert_eq!(event.duration(), 2.0);
        assert_eq!(CollisionPhase::Exit.marker(), event_types::COLLISION_END);
    }
}
