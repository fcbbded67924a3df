use log::warn;

use crate::simulation::control::Event;
use crate::simulation::Engine;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Fixed simulation rate in Hz.
    pub target_hz: f64,
    pub max_updates_per_frame: u32,
    /// Backlog cap; accumulated time beyond this is dropped.
    pub max_accumulated_ms: f64,
    pub lifecycle_hz: f64,
    pub catch_hz: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            target_hz: 30.0,
            max_updates_per_frame: 3,
            max_accumulated_ms: 167.0,
            lifecycle_hz: 1.0,
            catch_hz: 10.0,
        }
    }
}

/// A throttle for work that runs at its own cadence below the fixed step:
/// accumulates scaled time and fires with the elapsed amount.
#[derive(Debug)]
pub struct Throttle {
    period_ms: f64,
    accumulated_ms: f64,
}

impl Throttle {
    pub fn new(hz: f64) -> Self {
        Self {
            period_ms: 1000.0 / hz.max(0.001),
            accumulated_ms: 0.0,
        }
    }

    pub fn accumulate(&mut self, dt_ms: f64) {
        self.accumulated_ms += dt_ms;
    }

    /// Elapsed milliseconds if the period has passed, else None.
    pub fn fire(&mut self) -> Option<f64> {
        if self.accumulated_ms >= self.period_ms {
            let elapsed = self.accumulated_ms;
            self.accumulated_ms = 0.0;
            Some(elapsed)
        } else {
            None
        }
    }

    pub fn reset(&mut self) {
        self.accumulated_ms = 0.0;
    }
}

/// Couples real wall time to deterministic fixed steps. Feed it real frame
/// deltas; it runs the engine at the configured cadences and returns the
/// events the engine emitted, in emission order.
pub struct UpdateLoop {
    config: SchedulerConfig,
    accumulator_ms: f64,
    lifecycle: Throttle,
    catches: Throttle,
    pub dropped_ms: f64,
    pub drift_count: u64,
}

impl UpdateLoop {
    pub fn new(config: SchedulerConfig) -> Self {
        let lifecycle = Throttle::new(config.lifecycle_hz);
        let catches = Throttle::new(config.catch_hz);
        Self {
            config,
            accumulator_ms: 0.0,
            lifecycle,
            catches,
            dropped_ms: 0.0,
            drift_count: 0,
        }
    }

    pub fn timestep_ms(&self) -> f64 {
        1000.0 / self.config.target_hz
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Zero all accumulators; used on profile load and stop.
    pub fn reset(&mut self) {
        self.accumulator_ms = 0.0;
        self.lifecycle.reset();
        self.catches.reset();
    }

    pub fn advance(&mut self, engine: &mut Engine, real_dt_ms: f64) -> Vec<Event> {
        let mut out = Vec::new();
        let paused = engine.time.paused;
        if paused && !engine.time.step_requested() {
            return out;
        }

        let scaled_dt = if paused {
            0.0
        } else {
            real_dt_ms.max(0.0) * engine.time.time_scale as f64
        };
        let timestep = self.timestep_ms();

        self.accumulator_ms += scaled_dt;
        let mut updates = 0;
        while self.accumulator_ms >= timestep && updates < self.config.max_updates_per_frame {
            engine.fixed_step(timestep, &mut out);
            self.accumulator_ms -= timestep;
            updates += 1;
        }
        if self.accumulator_ms >= timestep {
            // More backlog than the per-frame budget allows.
            self.drift_count += 1;
            warn!(
                "simulation running behind: {:.1}ms backlog after {} updates",
                self.accumulator_ms, updates
            );
        }
        if self.accumulator_ms > self.config.max_accumulated_ms {
            self.dropped_ms += self.accumulator_ms - self.config.max_accumulated_ms;
            self.accumulator_ms = self.config.max_accumulated_ms;
        }

        self.lifecycle.accumulate(scaled_dt);
        self.catches.accumulate(scaled_dt);
        if let Some(elapsed_ms) = self.lifecycle.fire() {
            engine.lifecycle_pass((elapsed_ms / 1000.0) as f32, &mut out);
        }
        if self.catches.fire().is_some() {
            engine.catch_pass(&mut out);
        }

        if engine.time.step_requested() {
            engine.fixed_step(timestep, &mut out);
            engine.time.clear_step_request();
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::profile::builtin_profiles;

    fn empty_engine() -> Engine {
        let mut profile = builtin_profiles()[0].clone();
        profile.world.initial_prey_count = 0;
        profile.world.initial_predator_count = 0;
        Engine::new(profile).unwrap()
    }

    #[test]
    fn one_frame_delta_runs_one_step() {
        let mut engine = empty_engine();
        let mut update_loop = UpdateLoop::new(SchedulerConfig::default());
        update_loop.advance(&mut engine, 1000.0 / 30.0);
        assert_eq!(engine.time.frame, 1);
    }

    #[test]
    fn catch_up_is_bounded_per_frame() {
        let mut engine = empty_engine();
        let mut update_loop = UpdateLoop::new(SchedulerConfig::default());
        update_loop.advance(&mut engine, 500.0);
        assert_eq!(engine.time.frame, 3, "max three updates per frame");
        assert!(update_loop.drift_count >= 1);
    }

    #[test]
    fn accumulator_is_capped() {
        let mut engine = empty_engine();
        let mut update_loop = UpdateLoop::new(SchedulerConfig::default());
        update_loop.advance(&mut engine, 10_000.0);
        assert!(update_loop.accumulator_ms <= update_loop.config.max_accumulated_ms);
        assert!(update_loop.dropped_ms > 0.0);
    }

    #[test]
    fn paused_engine_does_not_step() {
        let mut engine = empty_engine();
        engine.time.pause();
        let mut update_loop = UpdateLoop::new(SchedulerConfig::default());
        for _ in 0..10 {
            update_loop.advance(&mut engine, 33.0);
        }
        assert_eq!(engine.time.frame, 0);
    }

    #[test]
    fn step_request_runs_exactly_one_step_while_paused() {
        let mut engine = empty_engine();
        engine.time.pause();
        engine.time.step();
        let mut update_loop = UpdateLoop::new(SchedulerConfig::default());
        update_loop.advance(&mut engine, 1000.0);
        assert_eq!(engine.time.frame, 1);
        update_loop.advance(&mut engine, 1000.0);
        assert_eq!(engine.time.frame, 1, "step request must not repeat");
    }

    #[test]
    fn time_scale_doubles_step_count() {
        let mut engine = empty_engine();
        engine.time.set_time_scale(2.0);
        let mut update_loop = UpdateLoop::new(SchedulerConfig::default());
        update_loop.advance(&mut engine, 1000.0 / 30.0);
        assert_eq!(engine.time.frame, 2);
    }

    #[test]
    fn zero_time_scale_freezes_the_engine() {
        let mut engine = empty_engine();
        engine.time.set_time_scale(0.0);
        let mut update_loop = UpdateLoop::new(SchedulerConfig::default());
        for _ in 0..5 {
            update_loop.advance(&mut engine, 100.0);
        }
        assert_eq!(engine.time.frame, 0);
    }

    #[test]
    fn throttle_fires_with_elapsed_time() {
        let mut throttle = Throttle::new(1.0);
        throttle.accumulate(400.0);
        assert!(throttle.fire().is_none());
        throttle.accumulate(700.0);
        let elapsed = throttle.fire().expect("period elapsed");
        assert!((elapsed - 1100.0).abs() < 1e-9);
        assert!(throttle.fire().is_none());
    }
}
