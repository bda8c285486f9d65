//! Simulation clock.
//!
//! The registry stamps enter times, record refreshes and emitted events with
//! [`WorldTime::elapsed`]. The host loop advances it once per frame before
//! running the schedule:
//!
//! ```ignore
//! world.resource_mut::<WorldTime>().advance(frame_dt);
//! update.run(&mut world);
//! ```
use bevy_ecs::prelude::Resource;

#[derive(Resource, Clone, Copy, Debug)]
pub struct WorldTime {
    /// Scaled seconds since start.
    pub elapsed: f32,
    /// Scaled delta of the last frame; `movement` integrates with it.
    pub delta: f32,
    pub time_scale: f32,
    pub frame_count: u64,
}

impl Default for WorldTime {
    fn default() -> Self {
        WorldTime {
            elapsed: 0.0,
            delta: 0.0,
            time_scale: 1.0,
            frame_count: 0,
        }
    }
}

impl WorldTime {
    pub fn with_time_scale(mut self, time_scale: f32) -> Self {
        self.time_scale = time_scale;
        self
    }

    /// Advance one frame by the unscaled `dt` seconds.
    ///
    /// A paused clock (`time_scale == 0`) still counts frames, so collision
    /// ticks keep running while records stop ageing.
    pub fn advance(&mut self, dt: f32) {
        let scaled = dt.max(0.0) * self.time_scale;
        self.elapsed += scaled;
        self.delta = scaled;
        self.frame_count += 1;
    }

    /// Seconds elapsed since `since`, never negative.
    pub fn since(&self, since: f32) -> f32 {
        (self.elapsed - since).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_applies_time_scale() {
        let mut time = WorldTime::default().with_time_scale(0.5);
        time.advance(0.2);
        time.advance(0.2);
        assert!((time.elapsed - 0.2).abs() < 1e-6);
        assert!((time.delta - 0.1).abs() < 1e-6);
        assert_eq!(time.frame_count, 2);
    }

    #[test]
    fn test_paused_clock_counts_frames_only() {
        let mut time = WorldTime::default().with_time_scale(0.0);
        time.advance(1.0);
        assert_eq!(time.elapsed, 0.0);
        assert_eq!(time.frame_count, 1);
        assert_eq!(time.since(3.0), 0.0);
    }

    #[test]
    fn test_negative_dt_is_ignored() {
        let mut time = WorldTime::default();
        time.advance(0.5);
        time.advance(-1.0);
        assert_eq!(time.elapsed, 0.5);
        assert_eq!(time.delta, 0.0);
    }
}
