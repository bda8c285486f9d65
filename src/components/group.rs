//! Collision group catalog.
//!
//! Groups are plain names as far as the registry is concerned; every API
//! takes `impl AsRef<str>`. [`CollisionGroup`] is the conventional catalog so
//! gameplay code does not scatter string literals around.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CollisionError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionGroup {
    Player,
    Enemy,
    PlayerProjectile,
    EnemyProjectile,
    Wall,
    Item,
    Portal,
    AreaEffect,
    Trigger,
}

impl CollisionGroup {
    pub const ALL: [CollisionGroup; 9] = [
        CollisionGroup::Player,
        CollisionGroup::Enemy,
        CollisionGroup::PlayerProjectile,
        CollisionGroup::EnemyProjectile,
        CollisionGroup::Wall,
        CollisionGroup::Item,
        CollisionGroup::Portal,
        CollisionGroup::AreaEffect,
        CollisionGroup::Trigger,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            CollisionGroup::Player => "player",
            CollisionGroup::Enemy => "enemy",
            CollisionGroup::PlayerProjectile => "player_projectile",
            CollisionGroup::EnemyProjectile => "enemy_projectile",
            CollisionGroup::Wall => "wall",
            CollisionGroup::Item => "item",
            CollisionGroup::Portal => "portal",
            CollisionGroup::AreaEffect => "area_effect",
            CollisionGroup::Trigger => "trigger",
        }
    }
}

impl AsRef<str> for CollisionGroup {
    fn as_ref(&self) -> &str {
        self.name()
    }
}

impl fmt::Display for CollisionGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CollisionGroup {
    type Err = CollisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CollisionGroup::ALL
            .iter()
            .copied()
            .find(|g| g.name() == s)
            .ok_or_else(|| CollisionError::UnknownGroup(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_from_str() {
        for group in CollisionGroup::ALL {
            assert_eq!(group.name().parse::<CollisionGroup>().unwrap(), group);
        }
    }

    #[test]
    fn unknown_name_is_an_error() {
        assert!("boss_room".parse::<CollisionGroup>().is_err());
    }
}
