use serde::Serialize;

pub const MAX_TIME_SCALE: f32 = 8.0;

/// Tracks simulated time independently of wall time. The scheduler owns the
/// real-time accumulator; this only ever sees fixed-step advances.
#[derive(Debug, Clone, Serialize)]
pub struct TimeController {
    pub frame: u64,
    pub simulated_elapsed_ms: f64,
    pub time_scale: f32,
    pub paused: bool,
    step_requested: bool,
}

impl TimeController {
    pub fn new() -> Self {
        Self {
            frame: 0,
            simulated_elapsed_ms: 0.0,
            time_scale: 1.0,
            paused: false,
            step_requested: false,
        }
    }

    /// One fixed simulation step of `dt_ms` simulated milliseconds.
    pub fn tick(&mut self, dt_ms: f64) {
        self.frame += 1;
        self.simulated_elapsed_ms += dt_ms;
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Request exactly one fixed step; requests do not accumulate.
    pub fn step(&mut self) {
        self.step_requested = true;
    }

    pub fn step_requested(&self) -> bool {
        self.step_requested
    }

    pub fn clear_step_request(&mut self) {
        self.step_requested = false;
    }

    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.clamp(0.0, MAX_TIME_SCALE);
    }

    /// Zero the counters while keeping the operator-controlled pause and
    /// scale state (used on profile load).
    pub fn reset(&mut self) {
        self.frame = 0;
        self.simulated_elapsed_ms = 0.0;
        self.step_requested = false;
    }
}

impl Default for TimeController {
    fn default() -> Self {
        Self::new()
    }
}
