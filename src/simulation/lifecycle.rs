use serde::{Deserialize, Serialize};

use crate::simulation::agent::{Agent, DeathCause};
use crate::simulation::boids::torus_dist_sq;
use crate::simulation::profile::{Profile, ReproductionKind, Role};
use crate::simulation::rng::DomainRng;

pub const PREDATOR_FOOD_FROM_PREY_MULTIPLIER: f32 = 0.8;
pub const PREY_FOOD_SPAWN_INTERVAL_TICKS: u64 = 90;
pub const PREY_FOOD_SPAWN_COUNT: usize = 3;
pub const MAX_PREY_FOOD_SOURCES: usize = 40;
pub const MAX_PREDATOR_FOOD_SOURCES: usize = 30;
pub const PREY_FOOD_INITIAL_ENERGY: f32 = 30.0;
pub const PREDATOR_FOOD_LIFETIME_TICKS: u64 = 1800;
/// Consumption applies when distance < this (strictly).
pub const FOOD_CONSUMPTION_RADIUS: f32 = 12.0;
/// Energy per second a single eater can draw from a source.
pub const FOOD_CONSUMPTION_RATE: f32 = 20.0;
pub const DEATH_MARKER_BASE_LIFE_TICKS: u32 = 900;
pub const DEATH_MARKER_MAX_LIFETIME_TICKS: u32 = 2700;
pub const DEATH_MARKER_CONSOLIDATION_RADIUS: f32 = 100.0;
pub const DEATH_MARKER_MAX_STRENGTH: f32 = 5.0;
/// Fraction of current energy each parent spends on a sexual reproduction.
pub const REPRODUCTION_ENERGY_COST_FRACTION: f32 = 0.3;

// ─── World collections ───

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Obstacle {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FoodKind {
    /// Plant food, edible by prey.
    Prey,
    /// Carcass food left by a catch, edible by predators.
    Predator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodSource {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub energy: f32,
    pub max_energy: f32,
    pub kind: FoodKind,
    pub created_tick: u64,
}

impl FoodSource {
    pub fn is_exhausted(&self) -> bool {
        self.energy <= 0.0
    }

    pub fn is_expired(&self, tick: u64) -> bool {
        self.kind == FoodKind::Predator
            && tick.saturating_sub(self.created_tick) >= PREDATOR_FOOD_LIFETIME_TICKS
    }

    /// Whether an agent of `role` may eat from this source.
    pub fn edible_by(&self, role: Role) -> bool {
        matches!(
            (self.kind, role),
            (FoodKind::Prey, Role::Prey) | (FoodKind::Predator, Role::Predator)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeathMarker {
    pub x: f32,
    pub y: f32,
    pub remaining_ticks: u32,
    pub strength: f32,
    pub max_lifetime_ticks: u32,
    pub type_id: String,
}

// ─── Lifecycle pass ───

/// Everything one lifecycle pass wants to change, staged before any of it is
/// applied so external listeners observe a consistent order.
#[derive(Debug, Default)]
pub struct Changes {
    pub deaths: Vec<(u32, DeathCause)>,
    /// Parents due an asexual reproduction.
    pub asexual_parents: Vec<u32>,
    pub food_add: Vec<(f32, f32, FoodKind, f32)>,
    pub food_remove: Vec<u32>,
}

pub struct LifecycleManager {
    last_prey_food_tick: u64,
}

impl LifecycleManager {
    pub fn new() -> Self {
        Self {
            last_prey_food_tick: 0,
        }
    }

    pub fn reset(&mut self) {
        self.last_prey_food_tick = 0;
    }

    /// Aging and energy flow. Mutates agents in place; deaths that follow
    /// from the new values are collected by `plan`.
    pub fn advance_vitals(agents: &mut [Agent], profile: &Profile, dt: f32) {
        for agent in agents.iter_mut() {
            if agent.is_dead {
                continue;
            }
            let species = match profile.species(&agent.type_id) {
                Some(s) => s,
                None => continue,
            };
            agent.age += dt;
            match species.role {
                Role::Predator => {
                    agent.energy =
                        (agent.energy - species.lifecycle.energy_loss_rate * dt).max(0.0);
                }
                Role::Prey => {
                    agent.gain_energy(species.lifecycle.energy_gain_rate * dt);
                }
            }
        }
    }

    /// Pure scan over the post-vitals state.
    pub fn plan(
        &mut self,
        agents: &[Agent],
        profile: &Profile,
        food: &[FoodSource],
        tick: u64,
        rng: &mut DomainRng,
    ) -> Changes {
        let mut changes = Changes::default();

        for agent in agents {
            if agent.is_dead {
                continue;
            }
            let species = match profile.species(&agent.type_id) {
                Some(s) => s,
                None => continue,
            };
            if species.lifecycle.max_age > 0.0 && agent.age >= species.lifecycle.max_age {
                changes.deaths.push((agent.id, DeathCause::OldAge));
                continue;
            }
            if species.role == Role::Predator && agent.energy <= 0.0 {
                changes.deaths.push((agent.id, DeathCause::Starvation));
                continue;
            }
            if species.reproduction.kind == ReproductionKind::Asexual
                && agent.reproduction_cooldown == 0
                && agent.energy >= agent.phenotype.max_energy
            {
                changes.asexual_parents.push(agent.id);
            }
        }

        for source in food {
            if source.is_exhausted() || source.is_expired(tick) {
                changes.food_remove.push(source.id);
            }
        }

        // Periodic plant food.
        if tick.saturating_sub(self.last_prey_food_tick) >= PREY_FOOD_SPAWN_INTERVAL_TICKS {
            self.last_prey_food_tick = tick;
            let current = food
                .iter()
                .filter(|f| f.kind == FoodKind::Prey && !f.is_exhausted())
                .count();
            let room = MAX_PREY_FOOD_SOURCES.saturating_sub(current);
            for _ in 0..PREY_FOOD_SPAWN_COUNT.min(room) {
                let x = rng.range(0.0, profile.world.width);
                let y = rng.range(0.0, profile.world.height);
                changes
                    .food_add
                    .push((x, y, FoodKind::Prey, PREY_FOOD_INITIAL_ENERGY));
            }
        }

        changes
    }
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Death markers ───

/// Record a non-predation death. Consolidates into an existing marker when
/// one lies within the consolidation radius, so no two markers within that
/// radius ever coexist.
pub fn register_death_marker(
    markers: &mut Vec<DeathMarker>,
    x: f32,
    y: f32,
    type_id: &str,
    width: f32,
    height: f32,
) {
    let radius_sq = DEATH_MARKER_CONSOLIDATION_RADIUS * DEATH_MARKER_CONSOLIDATION_RADIUS;
    let mut nearest: Option<(usize, f32)> = None;
    for (i, marker) in markers.iter().enumerate() {
        let dist_sq = torus_dist_sq(marker.x, marker.y, x, y, width, height);
        if dist_sq < radius_sq && nearest.map_or(true, |(_, best)| dist_sq < best) {
            nearest = Some((i, dist_sq));
        }
    }
    match nearest {
        Some((i, _)) => {
            let marker = &mut markers[i];
            marker.strength = (marker.strength + 0.5).min(DEATH_MARKER_MAX_STRENGTH);
            marker.remaining_ticks = (marker.remaining_ticks + DEATH_MARKER_BASE_LIFE_TICKS)
                .min(marker.max_lifetime_ticks);
        }
        None => markers.push(DeathMarker {
            x,
            y,
            remaining_ticks: DEATH_MARKER_BASE_LIFE_TICKS,
            strength: 1.0,
            max_lifetime_ticks: DEATH_MARKER_MAX_LIFETIME_TICKS,
            type_id: type_id.to_string(),
        }),
    }
}

/// One tick of decay; extinguished markers are dropped.
pub fn decay_markers(markers: &mut Vec<DeathMarker>) {
    for marker in markers.iter_mut() {
        marker.remaining_ticks = marker.remaining_ticks.saturating_sub(1);
    }
    markers.retain(|m| m.remaining_ticks > 0);
}
