pub mod simulation;

use std::collections::HashMap;

use thiserror::Error;

pub use simulation::agent::{Agent, DeathCause, Stance};
pub use simulation::control::{ControlBus, ErrorReport, Event, Resources};
pub use simulation::lifecycle::{DeathMarker, FoodKind, FoodSource, Obstacle};
pub use simulation::profile::{builtin_profiles, ConfigError, Parameters, Profile, Role};
pub use simulation::scheduler::{SchedulerConfig, UpdateLoop};
pub use simulation::snapshot::{SharedBuffers, Snapshot};
pub use simulation::Engine;

#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid event: {0}")]
    InvalidEvent(String),
}

/// The engine, its control plane, and the fixed-timestep loop bundled into
/// one command surface. Drive it with real frame deltas via [`advance_ms`]
/// and read back snapshots and the outbound event stream.
///
/// [`advance_ms`]: Simulation::advance_ms
pub struct Simulation {
    engine: Engine,
    bus: ControlBus,
    update_loop: UpdateLoop,
    profiles: HashMap<String, Profile>,
}

impl Simulation {
    /// Build a simulation from a profile, with the built-in profiles
    /// available for later switching.
    pub fn new(profile: Profile) -> Result<Self, SimError> {
        Self::with_scheduler(profile, SchedulerConfig::default())
    }

    pub fn with_scheduler(profile: Profile, config: SchedulerConfig) -> Result<Self, SimError> {
        let mut profiles: HashMap<String, Profile> = builtin_profiles()
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();
        profiles.insert(profile.id.clone(), profile.clone());
        let engine = Engine::new(profile)?;
        Ok(Self {
            engine,
            bus: ControlBus::new(),
            update_loop: UpdateLoop::new(config),
            profiles,
        })
    }

    /// Register an additional profile for `loadProfile` / profile.switched.
    pub fn register_profile(&mut self, profile: Profile) -> Result<(), SimError> {
        profile.validate()?;
        self.profiles.insert(profile.id.clone(), profile);
        Ok(())
    }

    // ─── Commands ───

    pub fn pause(&mut self) {
        self.engine.time.pause();
    }

    pub fn resume(&mut self) {
        self.engine.time.resume();
    }

    pub fn step(&mut self) {
        self.engine.time.step();
    }

    pub fn set_time_scale(&mut self, scale: f32) {
        self.engine.time.set_time_scale(scale);
    }

    pub fn add_boid(&mut self, type_id: &str, x: f32, y: f32) -> Option<u32> {
        self.engine.add_boid(type_id, x, y)
    }

    pub fn remove_boid(&mut self, id: u32) {
        self.engine.remove_boid(id);
    }

    pub fn spawn_predator(&mut self, x: f32, y: f32) {
        self.dispatch(Event::SpawnPredator { x, y });
    }

    pub fn add_obstacle(&mut self, x: f32, y: f32, radius: f32) {
        self.dispatch(Event::ObstacleAdded { x, y, radius });
    }

    pub fn clear_obstacles(&mut self) {
        self.dispatch(Event::ObstaclesCleared);
    }

    pub fn load_profile(&mut self, profile_id: &str) {
        self.dispatch(Event::ProfileSwitched {
            profile_id: profile_id.to_string(),
        });
    }

    /// Stop: cancel timers and drop any scheduled work. State is preserved.
    pub fn stop(&mut self) {
        self.engine.time.pause();
        self.bus.cancel_all_timers();
        self.update_loop.reset();
    }

    // ─── Driving ───

    /// Feed one outer frame of real time through the control plane.
    pub fn advance_ms(&mut self, real_dt_ms: f64) {
        self.dispatch(Event::TimePassed {
            delta_ms: real_dt_ms,
        });
    }

    pub fn dispatch(&mut self, event: Event) {
        let mut res = Resources {
            engine: &mut self.engine,
            update_loop: &mut self.update_loop,
            profiles: &self.profiles,
        };
        self.bus.dispatch(&mut res, event);
    }

    /// Dispatch a wire-format event. Unknown tags or malformed payloads are
    /// recorded as an error outcome and do not touch state.
    pub fn dispatch_json(&mut self, json: &str) -> Result<(), SimError> {
        match simulation::control::parse_event(json) {
            Ok(event) => {
                self.dispatch(event);
                Ok(())
            }
            Err(err) => {
                let message = err.to_string();
                self.bus.record_invalid_event(message.clone());
                Err(SimError::InvalidEvent(message))
            }
        }
    }

    // ─── Observation ───

    pub fn snapshot(&self) -> Snapshot {
        self.engine.snapshot()
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Outbound notifications (births, deaths, catches, food creation)
    /// since the last drain, in tick-emission order.
    pub fn drain_events(&mut self) -> Vec<Event> {
        self.bus.drain_outbound()
    }

    pub fn drain_errors(&mut self) -> Vec<ErrorReport> {
        self.bus.drain_errors()
    }

    pub fn publish(&self, buffers: &SharedBuffers) {
        self.engine.publish(buffers);
    }
}
