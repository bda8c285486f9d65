//! Group compatibility table.
//!
//! The [`GroupCompatibilityTable`] declares which collision groups are meant
//! to interact. It does not drive detection: only rules registered on the
//! [`CollisionRegistry`](crate::resources::registry::CollisionRegistry)
//! produce events. The registry consults it when a rule is added and either
//! warns about or rejects rules between undeclared pairs, depending on
//! [`CollisionConfig::strict_groups`](crate::resources::collisionconfig::CollisionConfig).
//!
//! Declarations are symmetric: declaring `player -> enemy` also makes
//! `enemy -> player` compatible.
//!
//! # Usage
//!
//! ```ignore
//! let mut table = GroupCompatibilityTable::default(); // catalog defaults
//! table.declare("player", ["boss_room"]);
//! assert!(table.is_compatible("boss_room", "player"));
//! ```

use bevy_ecs::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::components::group::CollisionGroup;

#[derive(Debug, Clone, Resource)]
pub struct GroupCompatibilityTable {
    /// Group name to the set of group names it is declared to interact with.
    pub entries: FxHashMap<String, FxHashSet<String>>,
}

impl Default for GroupCompatibilityTable {
    /// Declarations for the built-in catalog.
    fn default() -> Self {
        use CollisionGroup::*;

        let mut table = Self::empty();
        table.declare(
            Player,
            [Enemy, EnemyProjectile, Wall, Item, Portal, AreaEffect, Trigger],
        );
        table.declare(
            Enemy,
            [Player, PlayerProjectile, Enemy, Wall, AreaEffect, Trigger],
        );
        table.declare(PlayerProjectile, [Enemy, Wall]);
        table.declare(EnemyProjectile, [Player, Wall]);
        table.declare(Wall, [Player, Enemy, PlayerProjectile, EnemyProjectile]);
        table.declare(Item, [Player]);
        table.declare(Portal, [Player]);
        table.declare(AreaEffect, [Player, Enemy]);
        table.declare(Trigger, [Player, Enemy]);
        table
    }
}

impl GroupCompatibilityTable {
    /// A table with no declarations.
    pub fn empty() -> Self {
        Self {
            entries: FxHashMap::default(),
        }
    }

    /// Declare `group` compatible with each of `others` (both directions).
    pub fn declare<G, I, S>(&mut self, group: G, others: I)
    where
        G: AsRef<str>,
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let group = group.as_ref();
        for other in others {
            let other = other.as_ref();
            self.entries
                .entry(group.to_string())
                .or_default()
                .insert(other.to_string());
            self.entries
                .entry(other.to_string())
                .or_default()
                .insert(group.to_string());
        }
    }

    /// Remove every declaration involving `group`.
    pub fn forget(&mut self, group: &str) {
        self.entries.remove(group);
        for others in self.entries.values_mut() {
            others.remove(group);
        }
    }

    /// Returns `true` if the table has any declaration for `group`.
    pub fn knows(&self, group: &str) -> bool {
        self.entries.contains_key(group)
    }

    pub fn is_compatible(&self, a: &str, b: &str) -> bool {
        self.entries.get(a).is_some_and(|set| set.contains(b))
    }

    /// Groups declared compatible with `group`, unordered.
    pub fn partners(&self, group: &str) -> impl Iterator<Item = &String> {
        self.entries.get(group).into_iter().flatten()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let table = GroupCompatibilityTable::default();
        assert!(table.is_compatible("player", "enemy"));
        assert!(table.is_compatible("player_projectile", "enemy"));
        assert!(table.is_compatible("enemy", "enemy"));
        assert!(!table.is_compatible("item", "wall"));
        assert!(!table.is_compatible("player", "player_projectile"));
    }

    #[test]
    fn test_declare_is_symmetric() {
        let mut table = GroupCompatibilityTable::empty();
        table.declare("boss", ["player"]);
        assert!(table.is_compatible("player", "boss"));
        assert!(table.knows("player"));
    }

    #[test]
    fn test_forget_removes_both_directions() {
        let mut table = GroupCompatibilityTable::default();
        table.forget("portal");
        assert!(!table.knows("portal"));
        assert!(!table.is_compatible("player", "portal"));
        assert_eq!(table.partners("portal").count(), 0);
    }
}
