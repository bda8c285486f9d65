//! Collision tick system.
//!
//! Runs one [`CollisionRegistry::tick`] per frame against the world it is
//! scheduled in. It must run after movement so the engine sees this frame's
//! positions.
//!
//! ```ignore
//! update.add_systems(movement);
//! update.add_systems(collision_tick_system.after(movement));
//! ```

use bevy_ecs::prelude::*;
use log::trace;

use crate::resources::registry::CollisionRegistry;

/// Exclusive system driving the registry's step, classification and exit
/// sweep. Does nothing if no [`CollisionRegistry`] resource is present.
pub fn collision_tick_system(world: &mut World) {
    if !world.contains_resource::<CollisionRegistry>() {
        trace!("collision_tick_system: no CollisionRegistry resource");
        return;
    }
    world.resource_scope(|world, mut registry: Mut<CollisionRegistry>| {
        registry.tick(world);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::boxcollider::BoxCollider;
    use crate::components::collidable::Collidable;
    use crate::components::mapposition::MapPosition;
    use crate::events::bus::CollisionEventBus;
    use crate::resources::collisionconfig::CollisionConfig;
    use crate::resources::spatial::{CollisionMode, GroupConfig};

    #[test]
    fn test_system_without_registry_is_noop() {
        let mut world = World::new();
        collision_tick_system(&mut world);
    }

    #[test]
    fn test_system_ticks_registry_resource() {
        let mut world = World::new();
        let a = world
            .spawn((
                MapPosition::new(0.0, 0.0),
                BoxCollider::new(8.0, 8.0),
                Collidable::new(),
            ))
            .id();
        let b = world
            .spawn((
                MapPosition::new(4.0, 4.0),
                BoxCollider::new(8.0, 8.0),
                Collidable::new(),
            ))
            .id();

        let mut registry = CollisionRegistry::new(CollisionEventBus::new(), CollisionConfig::new());
        registry.register_group("player", GroupConfig::default());
        registry.register_group("item", GroupConfig::default());
        registry.add_to_group(&mut world, a, "player");
        registry.add_to_group(&mut world, b, "item");
        registry.add_collision_rule("player", "item", CollisionMode::NonBlocking, None);
        world.insert_resource(registry);

        let mut schedule = Schedule::default();
        schedule.add_systems(collision_tick_system);
        schedule.run(&mut world);

        assert!(world.get::<Collidable>(a).unwrap().is_colliding_with(b));
        assert_eq!(world.resource::<CollisionRegistry>().stats().open_records, 1);
    }
}
