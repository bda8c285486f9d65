//! Aberred Collide demo entry point.
//!
//! A headless arena that exercises the collision layer using:
//! - **bevy_ecs** for entity-component-system architecture
//! - **clap** for the command line
//! - **configparser** for `collision.ini`
//!
//! # Scene
//!
//! A player wanders a walled arena populated with enemies at random
//! positions and fires a projectile every few ticks. Walls block players and
//! enemies; projectiles vanish on the first enemy or wall they touch. Bus
//! activity is reported through logging.
//!
//! # Main Loop
//!
//! 1. Load `collision.ini` (defaults if missing)
//! 2. Build the world, the event bus and the registry; register groups/rules
//! 3. Run `--ticks` frames: advance time, move bodies, run the collision tick
//! 4. Tear the registry down and report statistics
//!
//! # Running
//!
//! ```sh
//! RUST_LOG=debug cargo run -- --ticks 600 --seed 7 --stats-json
//! ```

mod components;
mod error;
mod events;
mod resources;
mod systems;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use bevy_ecs::prelude::*;
use clap::Parser;
use glam::Vec2;
use serde::Serialize;

use crate::components::boxcollider::BoxCollider;
use crate::components::collidable::Collidable;
use crate::components::group::CollisionGroup;
use crate::components::mapposition::MapPosition;
use crate::components::rigidbody::RigidBody;
use crate::events::bus::CollisionEventBus;
use crate::events::collision::{CollisionPhase, event_types};
use crate::resources::collisionconfig::CollisionConfig;
use crate::resources::registry::{CollisionRegistry, CollisionStats, reaction};
use crate::resources::spatial::{CollisionMode, GroupConfig};
use crate::resources::worldtime::WorldTime;
use crate::systems::collision::collision_tick_system;
use crate::systems::movement::movement;

const ARENA_W: f32 = 640.0;
const ARENA_H: f32 = 360.0;
const WALL_THICKNESS: f32 = 16.0;
const FIRE_EVERY: u32 = 20;
const PROJECTILE_SPEED: f32 = 240.0;

/// Aberred Collide headless demo
#[derive(Parser)]
#[command(version, about = "Collision lifecycle demo: groups, rules and enter/stay/exit events.")]
struct Cli {
    /// Number of ticks to simulate.
    #[arg(long, default_value_t = 600)]
    ticks: u32,

    /// Path to the collision INI file.
    #[arg(long, value_name = "PATH", default_value = "./collision.ini")]
    config: PathBuf,

    /// Seed for enemy placement.
    #[arg(long)]
    seed: Option<u64>,

    /// Number of enemies to spawn.
    #[arg(long, default_value_t = 12)]
    enemies: u32,

    /// Print final statistics as JSON on stdout.
    #[arg(long)]
    stats_json: bool,
}

#[derive(Default)]
struct Counters {
    enters: AtomicU32,
    stays: AtomicU32,
    exits: AtomicU32,
}

#[derive(Serialize)]
struct DemoReport {
    ticks: u32,
    seed: u64,
    enters: u32,
    stays: u32,
    exits: u32,
    /// Registry state just before teardown.
    registry: CollisionStats,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = CollisionConfig::with_path(&cli.config);
    if let Err(e) = config.load_from_file() {
        log::info!("{e}; using defaults");
    }

    let seed = cli.seed.unwrap_or_else(|| fastrand::u64(..));
    let mut rng = fastrand::Rng::with_seed(seed);
    log::info!("Hello, world! This is Aberred Collide (seed {seed})");

    // --------------- ECS world + resources ---------------
    let mut world = World::new();
    world.insert_resource(WorldTime::default().with_time_scale(1.0));

    let bus = CollisionEventBus::new();
    world.insert_resource(bus.clone());

    let counters = Arc::new(Counters::default());
    {
        let counters = counters.clone();
        bus.on_all(move |_, event| {
            let counter = match event.phase {
                CollisionPhase::Enter => &counters.enters,
                CollisionPhase::Stay => &counters.stays,
                CollisionPhase::Exit => &counters.exits,
            };
            counter.fetch_add(1, Ordering::Relaxed);
        });
    }
    bus.on(event_types::PLAYER_ENEMY, |event| match event.phase {
        CollisionPhase::Enter => log::info!("player hit by {:?} at {:.2}s", event.b, event.time),
        CollisionPhase::Exit => log::info!(
            "player free of {:?} after {:.2}s",
            event.b,
            event.duration()
        ),
        CollisionPhase::Stay => {}
    });
    bus.on(event_types::ENEMY_ENEMY, |event| {
        if event.is_enter() {
            log::debug!("enemies {:?} and {:?} bumped", event.a, event.b);
        }
    });

    let mut registry = CollisionRegistry::new(bus.clone(), config);
    registry.register_group(CollisionGroup::Player, GroupConfig::default());
    registry.register_group(CollisionGroup::Enemy, GroupConfig::default());
    registry.register_group(CollisionGroup::PlayerProjectile, GroupConfig::default());
    registry.register_group(CollisionGroup::Wall, GroupConfig::immovable());

    // --------------- Scene ---------------
    let player = world
        .spawn((
            MapPosition::new(ARENA_W * 0.5, ARENA_H * 0.5),
            BoxCollider::new(16.0, 16.0).with_offset(Vec2::new(-8.0, -8.0)),
            RigidBody::with_velocity(70.0, 45.0),
            Collidable::in_group(CollisionGroup::Player).with_on_exit(|partner, data| {
                log::debug!("player on_exit {:?} ({:?})", partner, data.group);
            }),
        ))
        .id();
    registry.add_to_group(&mut world, player, CollisionGroup::Player.name());

    for (x, y, w, h) in [
        (0.0, 0.0, ARENA_W, WALL_THICKNESS),
        (0.0, ARENA_H - WALL_THICKNESS, ARENA_W, WALL_THICKNESS),
        (0.0, 0.0, WALL_THICKNESS, ARENA_H),
        (ARENA_W - WALL_THICKNESS, 0.0, WALL_THICKNESS, ARENA_H),
    ] {
        let wall = world
            .spawn((
                MapPosition::new(x, y),
                BoxCollider::new(w, h),
                Collidable::in_group(CollisionGroup::Wall),
            ))
            .id();
        registry.add_to_group(&mut world, wall, CollisionGroup::Wall.name());
    }

    let inner_w = ARENA_W - 2.0 * WALL_THICKNESS - 24.0;
    let inner_h = ARENA_H - 2.0 * WALL_THICKNESS - 24.0;
    for _ in 0..cli.enemies {
        let x = WALL_THICKNESS + 12.0 + rng.f32() * inner_w;
        let y = WALL_THICKNESS + 12.0 + rng.f32() * inner_h;
        let angle = rng.f32() * std::f32::consts::TAU;
        let enemy = world
            .spawn((
                MapPosition::new(x, y),
                BoxCollider::new(20.0, 20.0).with_offset(Vec2::new(-10.0, -10.0)),
                RigidBody::with_velocity(angle.cos() * 40.0, angle.sin() * 40.0),
                Collidable::in_group(CollisionGroup::Enemy),
            ))
            .id();
        registry.add_to_group(&mut world, enemy, CollisionGroup::Enemy.name());
    }

    // --------------- Rules ---------------
    registry.add_collision_rule(
        CollisionGroup::Player,
        CollisionGroup::Enemy,
        CollisionMode::NonBlocking,
        None,
    );
    registry.add_collision_rule(
        CollisionGroup::Player,
        CollisionGroup::Wall,
        CollisionMode::Blocking,
        Some(reaction(bounce)),
    );
    registry.add_collision_rule(
        CollisionGroup::Enemy,
        CollisionGroup::Wall,
        CollisionMode::Blocking,
        Some(reaction(bounce)),
    );
    registry.add_collision_rule(
        CollisionGroup::Enemy,
        CollisionGroup::Enemy,
        CollisionMode::NonBlocking,
        None,
    );
    for target in [CollisionGroup::Enemy, CollisionGroup::Wall] {
        registry.add_collision_rule(
            CollisionGroup::PlayerProjectile,
            target,
            CollisionMode::NonBlocking,
            Some(reaction(|world, projectile, _| {
                // Spent: ignored from now on, despawned after the tick.
                if let Some(mut collidable) = world.get_mut::<Collidable>(projectile) {
                    collidable.set_active(false);
                }
            })),
        );
    }
    world.insert_resource(registry);

    let mut update = Schedule::default();
    update.add_systems(movement);
    update.add_systems(collision_tick_system.after(movement));

    // --------------- Main loop ---------------
    let dt = 1.0 / 60.0;
    for tick in 1..=cli.ticks {
        world.resource_mut::<WorldTime>().advance(dt);

        if tick % FIRE_EVERY == 0 {
            fire(&mut world, player);
        }

        update.run(&mut world);
        reap_projectiles(&mut world);
        world.clear_trackers();
    }

    let stats = world.resource::<CollisionRegistry>().stats();
    world.resource_scope(|world, mut registry: Mut<CollisionRegistry>| {
        registry.cleanup(world);
    });

    let report = DemoReport {
        ticks: cli.ticks,
        seed,
        enters: counters.enters.load(Ordering::Relaxed),
        stays: counters.stays.load(Ordering::Relaxed),
        exits: counters.exits.load(Ordering::Relaxed),
        registry: stats,
    };
    log::info!(
        "done: {} enters, {} stays, {} exits, {} records still open",
        report.enters,
        report.stays,
        report.exits,
        report.registry.open_records
    );

    if cli.stats_json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing stats: {e}");
                std::process::exit(1);
            }
        }
    }
}

/// Blocking rules already separated the bodies; reverse the moving one.
fn bounce(world: &mut World, body: Entity, wall: Entity) {
    let (Some(body_pos), Some(wall_pos)) = (
        world.get::<MapPosition>(body).map(|p| p.pos),
        world.get::<MapPosition>(wall).map(|p| p.pos),
    ) else {
        return;
    };
    let (Some(body_box), Some(wall_box)) = (
        world.get::<BoxCollider>(body).map(|c| c.aabb(body_pos)),
        world.get::<BoxCollider>(wall).map(|c| c.aabb(wall_pos)),
    ) else {
        return;
    };
    let Some(mut rigidbody) = world.get_mut::<RigidBody>(body) else {
        return;
    };
    let towards_wall = wall_box.center() - body_box.center();
    let horizontal_wall = wall_box.max.x - wall_box.min.x > wall_box.max.y - wall_box.min.y;
    let mut velocity = rigidbody.velocity;
    if horizontal_wall && velocity.y * towards_wall.y > 0.0 {
        velocity.y = -velocity.y;
    } else if !horizontal_wall && velocity.x * towards_wall.x > 0.0 {
        velocity.x = -velocity.x;
    }
    rigidbody.set_velocity(velocity);
}

fn fire(world: &mut World, player: Entity) {
    let Some((origin, heading)) = world
        .get::<MapPosition>(player)
        .zip(world.get::<RigidBody>(player))
        .map(|(p, rb)| (p.pos, rb.velocity.normalize_or_zero()))
    else {
        return;
    };
    if heading == Vec2::ZERO {
        return;
    }
    let projectile = world
        .spawn((
            MapPosition { pos: origin + heading * 14.0 },
            BoxCollider::new(4.0, 4.0).with_offset(Vec2::new(-2.0, -2.0)),
            RigidBody::with_velocity(heading.x * PROJECTILE_SPEED, heading.y * PROJECTILE_SPEED),
            Collidable::in_group(CollisionGroup::PlayerProjectile),
        ))
        .id();
    world.resource_scope(|world, mut registry: Mut<CollisionRegistry>| {
        registry.add_to_group(world, projectile, CollisionGroup::PlayerProjectile.name());
    });
}

/// Despawn projectiles deactivated by their hit reaction this tick.
fn reap_projectiles(world: &mut World) {
    world.resource_scope(|world, mut registry: Mut<CollisionRegistry>| {
        let spent: Vec<Entity> = registry
            .group_members(CollisionGroup::PlayerProjectile.name())
            .filter(|e| world.get::<Collidable>(*e).is_some_and(|c| !c.is_active()))
            .collect();
        for projectile in spent {
            registry.despawn_collidable(world, projectile);
        }
    });
}
