//! Publish/subscribe dispatcher for collision events.
//!
//! [`CollisionEventBus`] routes [`CollisionEvent`]s by string event type to
//! subscribed handlers, plus a catch-all channel that sees every emission.
//! The bus is an explicitly constructed handle: clone it into whatever needs
//! to publish or subscribe (the registry, gameplay systems, the ECS world as a
//! resource). All clones share the same subscriber lists, and the bus lives as
//! long as its last clone, normally the owning world.
//!
//! # Dispatch
//!
//! [`emit`](CollisionEventBus::emit) calls the handlers of that event type in
//! subscription order, then every catch-all handler with `(event_type,
//! payload)`. It works on a snapshot of the subscriber lists taken before the
//! first handler runs, so a handler may subscribe or unsubscribe (itself
//! included) without disturbing the emission in progress; the change applies
//! from the next emission.
//!
//! A handler that panics is caught and logged; the remaining handlers for the
//! same emission still run.
//!
//! # Example
//!
//! ```ignore
//! let bus = CollisionEventBus::new();
//! let sub = bus.on(event_types::PLAYER_ENEMY, |event| {
//!     if event.is_enter() {
//!         log::info!("player touched {:?}", event.b);
//!     }
//! });
//! bus.on_all(|event_type, event| log::trace!("{event_type}: {:?}", event.phase));
//! // later
//! sub.unsubscribe();
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use bevy_ecs::prelude::Resource;
use log::{error, trace};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::events::collision::CollisionEvent;

/// Handler for one event type.
pub type EventHandler = Arc<dyn Fn(&CollisionEvent) + Send + Sync>;

/// Handler for every event type; receives the event type first.
pub type CatchAllHandler = Arc<dyn Fn(&str, &CollisionEvent) + Send + Sync>;

/// Subscriber ID
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberId(pub u64);

#[derive(Default)]
struct BusInner {
    handlers: FxHashMap<String, Vec<(SubscriberId, EventHandler)>>,
    catch_all: Vec<(SubscriberId, CatchAllHandler)>,
    next_id: u64,
}

impl BusInner {
    fn next_id(&mut self) -> SubscriberId {
        self.next_id += 1;
        SubscriberId(self.next_id)
    }

    fn remove(&mut self, event_type: &str, id: SubscriberId) -> bool {
        let Some(list) = self.handlers.get_mut(event_type) else {
            return false;
        };
        let before = list.len();
        list.retain(|(sub, _)| *sub != id);
        let removed = list.len() != before;
        if list.is_empty() {
            self.handlers.remove(event_type);
        }
        removed
    }

    fn remove_catch_all(&mut self, id: SubscriberId) -> bool {
        let before = self.catch_all.len();
        self.catch_all.retain(|(sub, _)| *sub != id);
        self.catch_all.len() != before
    }
}

/// Shared collision event dispatcher. Cloning yields another handle to the
/// same subscriber lists.
#[derive(Resource, Clone, Default)]
pub struct CollisionEventBus {
    inner: Arc<RwLock<BusInner>>,
}

/// Disposer returned by [`CollisionEventBus::on`] and
/// [`CollisionEventBus::on_all`].
///
/// Dropping it does not unsubscribe; call [`unsubscribe`](Self::unsubscribe).
#[derive(Debug)]
pub struct Subscription {
    bus: Weak<RwLock<BusInner>>,
    id: SubscriberId,
    event_type: Option<String>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Event type this subscription listens to, `None` for catch-all.
    pub fn event_type(&self) -> Option<&str> {
        self.event_type.as_deref()
    }

    /// Remove the handler from the bus. Returns `false` if it was already
    /// gone (removed by `off`, `clear`, or the bus was dropped).
    pub fn unsubscribe(self) -> bool {
        let Some(bus) = self.bus.upgrade() else {
            return false;
        };
        let mut inner = bus.write();
        match &self.event_type {
            Some(event_type) => inner.remove(event_type, self.id),
            None => inner.remove_catch_all(self.id),
        }
    }
}

impl std::fmt::Debug for BusInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusInner")
            .field("event_types", &self.handlers.len())
            .field("catch_all", &self.catch_all.len())
            .finish()
    }
}

impl std::fmt::Debug for CollisionEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("CollisionEventBus")
            .field(&*self.inner.read())
            .finish()
    }
}

impl CollisionEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `handler` to `event_type`.
    pub fn on<F>(&self, event_type: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(&CollisionEvent) + Send + Sync + 'static,
    {
        let event_type = event_type.into();
        let mut inner = self.inner.write();
        let id = inner.next_id();
        inner
            .handlers
            .entry(event_type.clone())
            .or_default()
            .push((id, Arc::new(handler)));
        Subscription {
            bus: Arc::downgrade(&self.inner),
            id,
            event_type: Some(event_type),
        }
    }

    /// Subscribe `handler` to every event type.
    pub fn on_all<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&str, &CollisionEvent) + Send + Sync + 'static,
    {
        let mut inner = self.inner.write();
        let id = inner.next_id();
        inner.catch_all.push((id, Arc::new(handler)));
        Subscription {
            bus: Arc::downgrade(&self.inner),
            id,
            event_type: None,
        }
    }

    /// Remove a handler subscribed with [`on`](Self::on).
    pub fn off(&self, event_type: &str, id: SubscriberId) -> bool {
        self.inner.write().remove(event_type, id)
    }

    /// Remove a handler subscribed with [`on_all`](Self::on_all).
    pub fn off_all(&self, id: SubscriberId) -> bool {
        self.inner.write().remove_catch_all(id)
    }

    /// Dispatch `event` to the handlers of `event_type`, then to catch-all
    /// handlers. Returns the number of handlers that completed without
    /// panicking.
    pub fn emit(&self, event_type: &str, event: &CollisionEvent) -> usize {
        let (specific, catch_all) = {
            let inner = self.inner.read();
            let specific: Vec<EventHandler> = inner
                .handlers
                .get(event_type)
                .map(|list| list.iter().map(|(_, h)| h.clone()).collect())
                .unwrap_or_default();
            let catch_all: Vec<CatchAllHandler> =
                inner.catch_all.iter().map(|(_, h)| h.clone()).collect();
            (specific, catch_all)
        };

        trace!(
            "emit '{}' ({:?}) to {} + {} handlers",
            event_type,
            event.phase,
            specific.len(),
            catch_all.len()
        );

        let mut completed = 0;
        for handler in &specific {
            if run_isolated(event_type, || handler(event)) {
                completed += 1;
            }
        }
        for handler in &catch_all {
            if run_isolated(event_type, || handler(event_type, event)) {
                completed += 1;
            }
        }
        completed
    }

    /// Drop every subscription.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.handlers.clear();
        inner.catch_all.clear();
    }

    pub fn handler_count(&self, event_type: &str) -> usize {
        self.inner
            .read()
            .handlers
            .get(event_type)
            .map_or(0, Vec::len)
    }

    pub fn catch_all_count(&self) -> usize {
        self.inner.read().catch_all.len()
    }

    pub fn is_empty(&self) -> bool {
        let inner = self.inner.read();
        inner.handlers.is_empty() && inner.catch_all.is_empty()
    }
}

/// Run a gameplay-supplied callback, catching and logging a panic.
/// Returns `true` when the callback completed.
pub(crate) fn run_isolated<F: FnOnce()>(label: &str, f: F) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => true,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            error!("collision listener '{}' panicked: {}", label, message);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::collision::CollisionPhase;
    use bevy_ecs::world::World;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn sample_event() -> CollisionEvent {
        let mut world = World::new();
        let a = world.spawn_empty().id();
        let b = world.spawn_empty().id();
        CollisionEvent {
            phase: CollisionPhase::Enter,
            a,
            b,
            group_a: Some("player".into()),
            group_b: Some("enemy".into()),
            time: 0.0,
            started_at: 0.0,
        }
    }

    #[test]
    fn test_specific_handlers_run_before_catch_all() {
        let bus = CollisionEventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o = order.clone();
        bus.on_all(move |event_type, _| o.lock().unwrap().push(format!("all:{event_type}")));
        let o = order.clone();
        bus.on("player_enemy", move |_| o.lock().unwrap().push("specific".to_string()));

        bus.emit("player_enemy", &sample_event());

        let order = order.lock().unwrap();
        assert_eq!(*order, vec!["specific".to_string(), "all:player_enemy".to_string()]);
    }

    #[test]
    fn test_other_event_types_are_not_delivered() {
        let bus = CollisionEventBus::new();
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();
        bus.on("player_wall", move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(bus.emit("player_enemy", &sample_event()), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_off_and_off_all() {
        let bus = CollisionEventBus::new();
        let specific = bus.on("enemy_wall", |_| {});
        let all = bus.on_all(|_, _| {});

        assert!(bus.off("enemy_wall", specific.id()));
        assert!(!bus.off("enemy_wall", specific.id()));
        assert!(bus.off_all(all.id()));
        assert!(bus.is_empty());
        assert!(!specific.unsubscribe());
    }

    #[test]
    fn test_handler_can_unsubscribe_itself_during_emit() {
        let bus = CollisionEventBus::new();
        let count = Arc::new(AtomicU32::new(0));
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let c = count.clone();
        let s = slot.clone();
        let sub = bus.on("player_item", move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            if let Some(sub) = s.lock().unwrap().take() {
                sub.unsubscribe();
            }
        });
        *slot.lock().unwrap() = Some(sub);

        bus.emit("player_item", &sample_event());
        bus.emit("player_item", &sample_event());

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(bus.handler_count("player_item"), 0);
    }

    #[test]
    fn test_clear_resets_bus() {
        let bus = CollisionEventBus::new();
        let clone = bus.clone();
        clone.on("a", |_| {});
        clone.on_all(|_, _| {});
        assert!(!bus.is_empty());
        bus.clear();
        assert!(clone.is_empty());
    }
}
