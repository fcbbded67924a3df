use std::collections::{HashMap, VecDeque};

use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::simulation::agent::DeathCause;
use crate::simulation::lifecycle::FoodSource;
use crate::simulation::profile::{ConfigError, Profile, Role};
use crate::simulation::scheduler::UpdateLoop;
use crate::simulation::Engine;

const DEFAULT_MAX_QUEUE_DEPTH: usize = 1024;

// ─── Events ───

/// The closed set of control-plane events. External intents and engine
/// notifications share one taxonomy; the tag strings are the wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "controls.typeConfigChanged", rename_all = "camelCase")]
    TypeConfigChanged {
        type_id: String,
        field: String,
        value: f64,
    },
    #[serde(rename = "controls.perceptionRadiusChanged")]
    PerceptionRadiusChanged { value: f32 },
    #[serde(rename = "controls.obstacleAvoidanceChanged")]
    ObstacleAvoidanceChanged { value: f32 },
    #[serde(rename = "obstacles.added")]
    ObstacleAdded { x: f32, y: f32, radius: f32 },
    #[serde(rename = "obstacles.removed")]
    ObstacleRemoved { index: usize },
    #[serde(rename = "obstacles.cleared")]
    ObstaclesCleared,
    #[serde(rename = "time.passed", rename_all = "camelCase")]
    TimePassed { delta_ms: f64 },
    #[serde(rename = "boids.caught", rename_all = "camelCase")]
    Caught {
        predator_id: u32,
        prey_id: u32,
        prey_type_id: String,
        prey_energy: f32,
        prey_x: f32,
        prey_y: f32,
    },
    #[serde(rename = "boids.died", rename_all = "camelCase")]
    Died {
        boid_id: u32,
        type_id: String,
        reason: DeathCause,
    },
    #[serde(rename = "boids.reproduced", rename_all = "camelCase")]
    Reproduced {
        parent_id: u32,
        child_id: u32,
        type_id: String,
        offspring_count: u32,
        parent2_id: Option<u32>,
    },
    #[serde(rename = "boids.spawnPredator")]
    SpawnPredator { x: f32, y: f32 },
    #[serde(rename = "boids.foodSourceCreated")]
    FoodSourceCreated { food: FoodSource },
    #[serde(rename = "profile.switched", rename_all = "camelCase")]
    ProfileSwitched { profile_id: String },
    #[serde(rename = "analytics.filterChanged")]
    AnalyticsFilterChanged { filter: String },
    #[serde(rename = "analytics.filterCleared")]
    AnalyticsFilterCleared,
}

impl Event {
    /// Notifications make up the outbound stream; intents do not.
    fn is_notification(&self) -> bool {
        matches!(
            self,
            Event::Caught { .. }
                | Event::Died { .. }
                | Event::Reproduced { .. }
                | Event::FoodSourceCreated { .. }
        )
    }
}

/// Parse a wire event. Unknown tags or missing fields fail here, before any
/// state is touched.
pub fn parse_event(json: &str) -> Result<Event, serde_json::Error> {
    serde_json::from_str(json)
}

// ─── Effects ───

/// Typed partial-state mutation carried by `Effect::StateUpdate`.
#[derive(Debug, Clone)]
pub enum StatePatch {
    AddObstacle { x: f32, y: f32, radius: f32 },
    RemoveObstacle { index: usize },
    ClearObstacles,
    SpeciesField {
        type_id: String,
        field: String,
        value: f64,
    },
    PerceptionRadius(f32),
    ObstacleAvoidanceWeight(f32),
    AnalyticsFilter(Option<String>),
    /// Real frame time to feed the update loop and the timers.
    AdvanceClock { delta_ms: f64 },
}

/// The closed set of effects. Handlers only ever return these; executors
/// are the sole mutators.
#[derive(Debug, Clone)]
pub enum Effect {
    StateUpdate(StatePatch),
    TimerSchedule {
        id: String,
        delay_ms: f64,
        on_expire: Box<Event>,
    },
    TimerCancel { id: String },
    AddBoid { type_id: String, x: f32, y: f32 },
    RemoveBoid { id: u32 },
    LoadProfile { profile_id: String },
    Dispatch(Box<Event>),
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error(transparent)]
    Profile(#[from] ConfigError),
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub kind: String,
    pub message: String,
}

/// Control-plane-owned state that is not part of the engine world.
#[derive(Debug, Clone, Default)]
pub struct ControlState {
    pub analytics_filter: Option<String>,
}

// ─── Handlers ───

/// Pure event resolution: `(state, event, profile) → effects`. Never touches
/// the engine or any I/O.
pub fn handle(_state: &ControlState, profile: &Profile, event: &Event) -> Vec<Effect> {
    match event {
        Event::TypeConfigChanged {
            type_id,
            field,
            value,
        } => vec![Effect::StateUpdate(StatePatch::SpeciesField {
            type_id: type_id.clone(),
            field: field.clone(),
            value: *value,
        })],
        Event::PerceptionRadiusChanged { value } => {
            vec![Effect::StateUpdate(StatePatch::PerceptionRadius(*value))]
        }
        Event::ObstacleAvoidanceChanged { value } => vec![Effect::StateUpdate(
            StatePatch::ObstacleAvoidanceWeight(*value),
        )],
        Event::ObstacleAdded { x, y, radius } => {
            vec![Effect::StateUpdate(StatePatch::AddObstacle {
                x: *x,
                y: *y,
                radius: *radius,
            })]
        }
        Event::ObstacleRemoved { index } => {
            vec![Effect::StateUpdate(StatePatch::RemoveObstacle { index: *index })]
        }
        Event::ObstaclesCleared => vec![Effect::StateUpdate(StatePatch::ClearObstacles)],
        Event::TimePassed { delta_ms } => {
            vec![Effect::StateUpdate(StatePatch::AdvanceClock {
                delta_ms: *delta_ms,
            })]
        }
        Event::SpawnPredator { x, y } => {
            match profile.species_ids_with_role(Role::Predator).first() {
                Some(type_id) => vec![Effect::AddBoid {
                    type_id: type_id.clone(),
                    x: *x,
                    y: *y,
                }],
                None => Vec::new(),
            }
        }
        Event::ProfileSwitched { profile_id } => vec![Effect::LoadProfile {
            profile_id: profile_id.clone(),
        }],
        Event::AnalyticsFilterChanged { filter } => vec![Effect::StateUpdate(
            StatePatch::AnalyticsFilter(Some(filter.clone())),
        )],
        Event::AnalyticsFilterCleared => {
            vec![Effect::StateUpdate(StatePatch::AnalyticsFilter(None))]
        }
        // Outbound notifications need no further effects.
        Event::Caught { .. }
        | Event::Died { .. }
        | Event::Reproduced { .. }
        | Event::FoodSourceCreated { .. } => Vec::new(),
    }
}

// ─── Bus / executors ───

struct Timer {
    id: String,
    remaining_ms: f64,
    on_expire: Event,
}

/// Writable resources the executors may touch. The engine is exclusively
/// owned here; nothing else writes to it.
pub struct Resources<'a> {
    pub engine: &'a mut Engine,
    pub update_loop: &'a mut UpdateLoop,
    pub profiles: &'a HashMap<String, Profile>,
}

/// The event/effect loop: events in, pure handlers, effects executed in
/// order, dispatched events drained FIFO to quiescence.
pub struct ControlBus {
    pub state: ControlState,
    queue: VecDeque<Event>,
    outbound: Vec<Event>,
    errors: Vec<ErrorReport>,
    timers: Vec<Timer>,
    max_queue_depth: usize,
}

impl ControlBus {
    pub fn new() -> Self {
        Self {
            state: ControlState::default(),
            queue: VecDeque::new(),
            outbound: Vec::new(),
            errors: Vec::new(),
            timers: Vec::new(),
            max_queue_depth: DEFAULT_MAX_QUEUE_DEPTH,
        }
    }

    pub fn dispatch(&mut self, res: &mut Resources, event: Event) {
        self.enqueue(event);
        self.drain(res);
    }

    fn enqueue(&mut self, event: Event) {
        if self.queue.len() >= self.max_queue_depth {
            warn!("event queue full ({}), dropping {:?}", self.max_queue_depth, event);
            return;
        }
        self.queue.push_back(event);
    }

    fn drain(&mut self, res: &mut Resources) {
        while let Some(event) = self.queue.pop_front() {
            if event.is_notification() {
                self.outbound.push(event.clone());
            }
            let effects = handle(&self.state, res.engine.profile(), &event);
            for effect in effects {
                if let Err(err) = self.execute(res, effect) {
                    error!("effect execution failed: {err}");
                    self.errors.push(ErrorReport {
                        kind: "config_error".to_string(),
                        message: err.to_string(),
                    });
                }
            }
        }
    }

    fn execute(&mut self, res: &mut Resources, effect: Effect) -> Result<(), ExecError> {
        match effect {
            Effect::StateUpdate(patch) => self.apply_patch(res, patch),
            Effect::TimerSchedule {
                id,
                delay_ms,
                on_expire,
            } => {
                self.timers.retain(|t| t.id != id);
                self.timers.push(Timer {
                    id,
                    remaining_ms: delay_ms,
                    on_expire: *on_expire,
                });
                Ok(())
            }
            Effect::TimerCancel { id } => {
                self.timers.retain(|t| t.id != id);
                Ok(())
            }
            Effect::AddBoid { type_id, x, y } => {
                // Cap overflow is a skip, not an error.
                res.engine.add_boid(&type_id, x, y);
                Ok(())
            }
            Effect::RemoveBoid { id } => {
                // A missing id is a stale reference; treat as a no-op.
                res.engine.remove_boid(id);
                Ok(())
            }
            Effect::LoadProfile { profile_id } => {
                let profile = res
                    .profiles
                    .get(&profile_id)
                    .cloned()
                    .ok_or(ConfigError::UnknownProfile(profile_id))?;
                res.engine.load_profile(profile)?;
                self.timers.clear();
                self.queue.clear();
                res.update_loop.reset();
                Ok(())
            }
            Effect::Dispatch(event) => {
                self.enqueue(*event);
                Ok(())
            }
        }
    }

    fn apply_patch(&mut self, res: &mut Resources, patch: StatePatch) -> Result<(), ExecError> {
        match patch {
            StatePatch::AddObstacle { x, y, radius } => {
                res.engine.add_obstacle(x, y, radius);
            }
            StatePatch::RemoveObstacle { index } => {
                if !res.engine.remove_obstacle(index) {
                    debug!("removeObstacle: index {index} out of range, skipped");
                }
            }
            StatePatch::ClearObstacles => res.engine.clear_obstacles(),
            StatePatch::SpeciesField {
                type_id,
                field,
                value,
            } => {
                if !res.engine.apply_species_field(&type_id, &field, value) {
                    debug!("typeConfigChanged: unknown target {type_id}.{field}, skipped");
                }
            }
            StatePatch::PerceptionRadius(value) => res.engine.set_perception_radius(value),
            StatePatch::ObstacleAvoidanceWeight(value) => {
                res.engine.set_obstacle_avoidance_weight(value)
            }
            StatePatch::AnalyticsFilter(filter) => self.state.analytics_filter = filter,
            StatePatch::AdvanceClock { delta_ms } => {
                self.advance_timers(delta_ms);
                let emitted = res.update_loop.advance(res.engine, delta_ms);
                for event in emitted {
                    self.enqueue(event);
                }
            }
        }
        Ok(())
    }

    fn advance_timers(&mut self, real_dt_ms: f64) {
        let mut expired = Vec::new();
        for timer in &mut self.timers {
            timer.remaining_ms -= real_dt_ms;
            if timer.remaining_ms <= 0.0 {
                expired.push(timer.on_expire.clone());
            }
        }
        self.timers.retain(|t| t.remaining_ms > 0.0);
        for event in expired {
            self.enqueue(event);
        }
    }

    pub fn record_invalid_event(&mut self, message: String) {
        warn!("invalid event discarded: {message}");
        self.errors.push(ErrorReport {
            kind: "invalid_event".to_string(),
            message,
        });
    }

    /// Outbound notifications since the last drain, in emission order.
    pub fn drain_outbound(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.outbound)
    }

    pub fn drain_errors(&mut self) -> Vec<ErrorReport> {
        std::mem::take(&mut self.errors)
    }

    pub fn cancel_all_timers(&mut self) {
        self.timers.clear();
    }

    pub fn pending_timer_count(&self) -> usize {
        self.timers.len()
    }
}

impl Default for ControlBus {
    fn default() -> Self {
        Self::new()
    }
}
