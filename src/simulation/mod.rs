pub mod agent;
pub mod boids;
pub mod catches;
pub mod control;
pub mod lifecycle;
pub mod profile;
pub mod rng;
pub mod scheduler;
pub mod snapshot;
pub mod stance;
pub mod time;

use std::collections::HashMap;

use log::{debug, info};

use agent::{Agent, DeathCause, Stance};
use boids::{wrap, SpatialGrid, SteeringEngine};
use control::Event;
use lifecycle::{
    register_death_marker, DeathMarker, FoodKind, FoodSource, LifecycleManager, Obstacle,
    FOOD_CONSUMPTION_RADIUS, FOOD_CONSUMPTION_RATE, MAX_PREDATOR_FOOD_SOURCES,
    PREDATOR_FOOD_FROM_PREY_MULTIPLIER, REPRODUCTION_ENERGY_COST_FRACTION,
};
use profile::{Profile, Role};
use rng::EngineRng;
use snapshot::{AgentView, PopulationStats, Snapshot};
use stance::MatingCompletion;
use time::TimeController;

/// The authoritative simulation state: the agent arena, the world
/// collections, and everything the per-tick pipeline needs. All writes come
/// through the control plane's executors; readers get snapshots.
pub struct Engine {
    profile: Profile,
    pub agents: Vec<Agent>,
    pub obstacles: Vec<Obstacle>,
    pub food: Vec<FoodSource>,
    pub death_markers: Vec<DeathMarker>,
    pub time: TimeController,
    grid: SpatialGrid,
    steering: SteeringEngine,
    rng: EngineRng,
    lifecycle: LifecycleManager,
    next_agent_id: u32,
    next_obstacle_id: u32,
    next_food_id: u32,
    id_index: HashMap<u32, usize>,
    scratch: Vec<usize>,
}

impl Engine {
    pub fn new(profile: Profile) -> Result<Self, profile::ConfigError> {
        profile.validate()?;
        let grid = SpatialGrid::new(
            profile.world.width,
            profile.world.height,
            profile.grid_cell_size(),
        );
        let steering = SteeringEngine::new(profile.random_seed);
        let rng = EngineRng::new(profile.random_seed);
        let mut engine = Self {
            profile,
            agents: Vec::new(),
            obstacles: Vec::new(),
            food: Vec::new(),
            death_markers: Vec::new(),
            time: TimeController::new(),
            grid,
            steering,
            rng,
            lifecycle: LifecycleManager::new(),
            next_agent_id: 1,
            next_obstacle_id: 1,
            next_food_id: 1,
            id_index: HashMap::new(),
            scratch: Vec::new(),
        };
        engine.spawn_initial_population();
        Ok(engine)
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Atomic profile swap: validate, install, reseed, clear the world,
    /// respawn, zero the clock. On error the previous state is untouched.
    pub fn load_profile(&mut self, profile: Profile) -> Result<(), profile::ConfigError> {
        profile.validate()?;
        info!("loading profile `{}`", profile.id);
        self.profile = profile;
        self.rng.reseed(self.profile.random_seed);
        self.steering = SteeringEngine::new(self.profile.random_seed);
        self.grid = SpatialGrid::new(
            self.profile.world.width,
            self.profile.world.height,
            self.profile.grid_cell_size(),
        );
        self.agents.clear();
        self.obstacles.clear();
        self.food.clear();
        self.death_markers.clear();
        self.id_index.clear();
        self.lifecycle.reset();
        self.next_agent_id = 1;
        self.next_obstacle_id = 1;
        self.next_food_id = 1;
        self.time.reset();
        self.spawn_initial_population();
        Ok(())
    }

    fn spawn_initial_population(&mut self) {
        let world = self.profile.world.clone();
        let prey_species = self.profile.species_ids_with_role(Role::Prey);
        let predator_species = self.profile.species_ids_with_role(Role::Predator);
        for i in 0..world.initial_prey_count {
            let type_id = prey_species[i as usize % prey_species.len().max(1)].clone();
            let x = self.rng.spawn.range(0.0, world.width);
            let y = self.rng.spawn.range(0.0, world.height);
            self.spawn_agent(&type_id, x, y, None);
        }
        for i in 0..world.initial_predator_count {
            let type_id = predator_species[i as usize % predator_species.len().max(1)].clone();
            let x = self.rng.spawn.range(0.0, world.width);
            let y = self.rng.spawn.range(0.0, world.height);
            self.spawn_agent(&type_id, x, y, None);
        }
    }

    // ─── Population bookkeeping ───

    fn count_role(&self, role: Role) -> usize {
        self.agents
            .iter()
            .filter(|a| {
                !a.is_dead && self.profile.species(&a.type_id).map(|s| s.role) == Some(role)
            })
            .count()
    }

    fn count_species(&self, type_id: &str) -> usize {
        self.agents
            .iter()
            .filter(|a| !a.is_dead && a.type_id == type_id)
            .count()
    }

    fn has_capacity_for(&self, type_id: &str) -> bool {
        let species = match self.profile.species(type_id) {
            Some(s) => s,
            None => return false,
        };
        let params = &self.profile.parameters;
        let live = self.agents.iter().filter(|a| !a.is_dead).count();
        if live >= params.max_boids as usize {
            return false;
        }
        let role_cap = match species.role {
            Role::Prey => params.max_prey_boids,
            Role::Predator => params.max_predator_boids,
        } as usize;
        if self.count_role(species.role) >= role_cap {
            return false;
        }
        if let Some(cap) = species.limits.max_population {
            if self.count_species(type_id) >= cap as usize {
                return false;
            }
        }
        true
    }

    /// Spawn respecting the population caps. Returns the new agent id, or
    /// None when the spawn was skipped (full caps are a skip, not an error).
    pub fn spawn_agent(&mut self, type_id: &str, x: f32, y: f32, energy: Option<f32>) -> Option<u32> {
        if !self.has_capacity_for(type_id) {
            debug!("spawn of `{type_id}` skipped: population cap reached");
            return None;
        }
        let species = self.profile.species(type_id)?.clone();
        let default_stance = match species.role {
            Role::Prey => Stance::Flocking,
            Role::Predator => Stance::Hunting,
        };
        let id = self.next_agent_id;
        self.next_agent_id += 1;
        let mut agent = Agent::new(
            id,
            &species,
            wrap(x, self.profile.world.width),
            wrap(y, self.profile.world.height),
            default_stance,
            &mut self.rng.spawn,
        );
        agent.stance_entered_frame = self.time.frame;
        if let Some(energy) = energy {
            agent.energy = energy.clamp(0.0, agent.phenotype.max_energy);
        }
        self.id_index.insert(id, self.agents.len());
        self.agents.push(agent);
        Some(id)
    }

    pub fn add_boid(&mut self, type_id: &str, x: f32, y: f32) -> Option<u32> {
        self.spawn_agent(type_id, x, y, None)
    }

    /// Removing an id that is no longer present is a no-op.
    pub fn remove_boid(&mut self, id: u32) {
        if let Some(pos) = self.agents.iter().position(|a| a.id == id) {
            self.agents.remove(pos);
            self.refresh_id_index();
        }
    }

    // ─── Obstacles ───

    pub fn add_obstacle(&mut self, x: f32, y: f32, radius: f32) -> u32 {
        let id = self.next_obstacle_id;
        self.next_obstacle_id += 1;
        self.obstacles.push(Obstacle {
            id,
            x: wrap(x, self.profile.world.width),
            y: wrap(y, self.profile.world.height),
            radius,
        });
        id
    }

    pub fn remove_obstacle(&mut self, index: usize) -> bool {
        if index < self.obstacles.len() {
            self.obstacles.remove(index);
            true
        } else {
            false
        }
    }

    pub fn clear_obstacles(&mut self) {
        self.obstacles.clear();
    }

    // ─── Runtime parameter mutation (executor-only entry points) ───

    pub fn apply_species_field(&mut self, type_id: &str, field: &str, value: f64) -> bool {
        let species = match self.profile.species.get_mut(type_id) {
            Some(s) => s,
            None => return false,
        };
        let v = value as f32;
        match field {
            "separationWeight" => species.movement.separation_weight = v,
            "alignmentWeight" => species.movement.alignment_weight = v,
            "cohesionWeight" => species.movement.cohesion_weight = v,
            "maxSpeed" => species.movement.max_speed = v.max(0.1),
            "maxForce" => species.movement.max_force = v.max(0.1),
            "minDistance" => species.movement.min_distance = Some(v),
            "maxEnergy" => species.lifecycle.max_energy = v.max(1.0),
            "energyGainRate" => species.lifecycle.energy_gain_rate = v,
            "energyLossRate" => species.lifecycle.energy_loss_rate = v,
            "maxAge" => species.lifecycle.max_age = v.max(0.0),
            "fearFactor" => species.lifecycle.fear_factor = v,
            "fearRadius" => species.limits.fear_radius = Some(v),
            _ => return false,
        }
        true
    }

    pub fn set_perception_radius(&mut self, value: f32) {
        self.profile.parameters.perception_radius = value.max(1.0);
        self.grid = SpatialGrid::new(
            self.profile.world.width,
            self.profile.world.height,
            self.profile.grid_cell_size(),
        );
    }

    pub fn set_obstacle_avoidance_weight(&mut self, value: f32) {
        self.profile.parameters.obstacle_avoidance_weight = value.max(0.0);
    }

    // ─── Per-tick pipeline ───

    fn refresh_id_index(&mut self) {
        self.id_index.clear();
        for (i, agent) in self.agents.iter().enumerate() {
            self.id_index.insert(agent.id, i);
        }
    }

    fn refresh_index(&mut self) {
        self.refresh_id_index();
        self.grid.rebuild(&self.agents);
    }

    /// One fixed simulation step: index rebuild, stance decisions, steering
    /// and integration, mating completions, food consumption, marker decay.
    pub fn fixed_step(&mut self, step_ms: f64, out: &mut Vec<Event>) {
        self.time.tick(step_ms);
        let frame = self.time.frame;
        let dt = (step_ms / 1000.0) as f32;

        for agent in &mut self.agents {
            if agent.is_dead {
                continue;
            }
            agent.reproduction_cooldown = agent.reproduction_cooldown.saturating_sub(1);
            agent.eating_cooldown = agent.eating_cooldown.saturating_sub(1);
        }

        self.refresh_index();

        let completions = {
            let Engine {
                ref mut agents,
                ref profile,
                ref grid,
                ref food,
                ref id_index,
                ref mut scratch,
                ..
            } = *self;
            stance::run(agents, profile, grid, food, id_index, frame, scratch)
        };

        {
            let Engine {
                ref mut agents,
                ref profile,
                ref grid,
                ref obstacles,
                ref food,
                ref death_markers,
                ref id_index,
                ref steering,
                ref mut scratch,
                ..
            } = *self;
            steering.update(
                agents,
                profile,
                grid,
                obstacles,
                food,
                death_markers,
                id_index,
                frame,
                dt,
                scratch,
            );
        }

        self.apply_mating_completions(completions, out);
        self.consume_food(dt);
        lifecycle::decay_markers(&mut self.death_markers);
    }

    fn apply_mating_completions(&mut self, completions: Vec<MatingCompletion>, out: &mut Vec<Event>) {
        for completion in completions {
            let species = match self.profile.species(&completion.type_id) {
                Some(s) => s.clone(),
                None => continue,
            };
            let cooldown = species
                .reproduction
                .cooldown_ticks
                .unwrap_or(self.profile.parameters.reproduction_cooldown_ticks);
            for parent_id in [completion.parent_a, completion.parent_b] {
                if let Some(&idx) = self.id_index.get(&parent_id) {
                    let parent = &mut self.agents[idx];
                    parent.energy *= 1.0 - REPRODUCTION_ENERGY_COST_FRACTION;
                    parent.reproduction_cooldown = cooldown;
                    parent.seeking_mate = false;
                }
            }

            let offspring_energy =
                species.lifecycle.max_energy * 0.5 * species.reproduction.offspring_energy_bonus;
            let mut first_child = None;
            let mut spawned = 0;
            for _ in 0..species.reproduction.offspring_count {
                let jx = self.rng.spawn.gaussian(0.0, 2.0);
                let jy = self.rng.spawn.gaussian(0.0, 2.0);
                if let Some(child) = self.spawn_agent(
                    &completion.type_id,
                    completion.x + jx,
                    completion.y + jy,
                    Some(offspring_energy),
                ) {
                    spawned += 1;
                    first_child.get_or_insert(child);
                }
            }
            if let Some(child_id) = first_child {
                out.push(Event::Reproduced {
                    parent_id: completion.parent_a,
                    child_id,
                    type_id: completion.type_id.clone(),
                    offspring_count: spawned,
                    parent2_id: Some(completion.parent_b),
                });
            }
        }
    }

    /// Eating-stance agents draw energy from their target source, split
    /// equally among simultaneous consumers. Exhausted sources vanish and
    /// set the eaters' cooldowns.
    fn consume_food(&mut self, dt: f32) {
        let cooldown = self.profile.parameters.eating_cooldown_ticks;
        let width = self.profile.world.width;
        let height = self.profile.world.height;
        let radius_sq = FOOD_CONSUMPTION_RADIUS * FOOD_CONSUMPTION_RADIUS;
        let Engine {
            ref mut agents,
            ref mut food,
            ..
        } = *self;

        for source in food.iter_mut() {
            if source.is_exhausted() {
                continue;
            }
            let consumers: Vec<usize> = agents
                .iter()
                .enumerate()
                .filter(|(_, a)| {
                    !a.is_dead
                        && a.stance == Stance::Eating
                        && a.eating_target == Some(source.id)
                        && a.energy < a.phenotype.max_energy
                        && boids::torus_dist_sq(a.x, a.y, source.x, source.y, width, height)
                            < radius_sq
                })
                .map(|(i, _)| i)
                .collect();
            if consumers.is_empty() {
                continue;
            }
            let per_consumer =
                (FOOD_CONSUMPTION_RATE * dt).min(source.energy / consumers.len() as f32);
            for &i in &consumers {
                let agent = &mut agents[i];
                agent.gain_energy(per_consumer);
                if agent.energy >= agent.phenotype.max_energy {
                    agent.eating_cooldown = cooldown;
                }
            }
            source.energy -= per_consumer * consumers.len() as f32;
            if source.is_exhausted() {
                for &i in &consumers {
                    agents[i].eating_cooldown = cooldown;
                }
            }
        }
        food.retain(|f| !f.is_exhausted());
    }

    /// Catch-detector pass, at the catch rater's cadence.
    pub fn catch_pass(&mut self, out: &mut Vec<Event>) {
        if self.agents.is_empty() {
            return;
        }
        self.refresh_index();
        let outcomes = {
            let Engine {
                ref agents,
                ref profile,
                ref grid,
                ref mut scratch,
                ..
            } = *self;
            catches::detect(agents, profile, grid, scratch)
        };

        for outcome in outcomes {
            out.push(Event::Caught {
                predator_id: outcome.predator_id,
                prey_id: outcome.prey_id,
                prey_type_id: outcome.prey_type_id.clone(),
                prey_energy: outcome.prey_energy,
                prey_x: outcome.prey_x,
                prey_y: outcome.prey_y,
            });
            if let Some(&prey_idx) = self.id_index.get(&outcome.prey_id) {
                self.agents[prey_idx].kill(DeathCause::Predation);
            }
            if let Some(&pred_idx) = self.id_index.get(&outcome.predator_id) {
                self.agents[pred_idx].gain_energy(outcome.energy_gain);
            }
            out.push(Event::Died {
                boid_id: outcome.prey_id,
                type_id: outcome.prey_type_id.clone(),
                reason: DeathCause::Predation,
            });

            let predator_food = self
                .food
                .iter()
                .filter(|f| f.kind == FoodKind::Predator)
                .count();
            if predator_food < MAX_PREDATOR_FOOD_SOURCES {
                let id = self.next_food_id;
                self.next_food_id += 1;
                let energy = outcome.prey_energy * PREDATOR_FOOD_FROM_PREY_MULTIPLIER;
                let source = FoodSource {
                    id,
                    x: outcome.prey_x,
                    y: outcome.prey_y,
                    energy,
                    max_energy: energy,
                    kind: FoodKind::Predator,
                    created_tick: self.time.frame,
                };
                self.food.push(source.clone());
                out.push(Event::FoodSourceCreated { food: source });
            } else {
                debug!("predator food cap reached, carcass dropped");
            }
        }
        self.sweep_dead();
    }

    /// Lifecycle pass, at the lifecycle rater's cadence, with the elapsed
    /// simulated seconds since the previous pass.
    pub fn lifecycle_pass(&mut self, dt_seconds: f32, out: &mut Vec<Event>) {
        LifecycleManager::advance_vitals(&mut self.agents, &self.profile, dt_seconds);
        self.refresh_id_index();

        let changes = {
            let Engine {
                ref agents,
                ref profile,
                ref food,
                ref mut lifecycle,
                ref mut rng,
                ref time,
                ..
            } = *self;
            lifecycle.plan(agents, profile, food, time.frame, &mut rng.spawn)
        };

        // Death events go out before removal so listeners still see the
        // agent's type.
        let width = self.profile.world.width;
        let height = self.profile.world.height;
        for (id, cause) in &changes.deaths {
            if let Some(&idx) = self.id_index.get(id) {
                let (x, y, type_id) = {
                    let agent = &mut self.agents[idx];
                    agent.kill(*cause);
                    (agent.x, agent.y, agent.type_id.clone())
                };
                out.push(Event::Died {
                    boid_id: *id,
                    type_id: type_id.clone(),
                    reason: *cause,
                });
                if *cause != DeathCause::Predation {
                    register_death_marker(
                        &mut self.death_markers,
                        x,
                        y,
                        &type_id,
                        width,
                        height,
                    );
                }
            }
        }
        self.sweep_dead();

        for parent_id in &changes.asexual_parents {
            let (type_id, x, y, max_energy) = match self.id_index.get(parent_id) {
                Some(&idx) if !self.agents[idx].is_dead => {
                    let a = &self.agents[idx];
                    (a.type_id.clone(), a.x, a.y, a.phenotype.max_energy)
                }
                _ => continue,
            };
            let species = match self.profile.species(&type_id) {
                Some(s) => s.clone(),
                None => continue,
            };
            let cooldown = species
                .reproduction
                .cooldown_ticks
                .unwrap_or(self.profile.parameters.reproduction_cooldown_ticks);

            let offspring_energy =
                species.lifecycle.max_energy * 0.5 * species.reproduction.offspring_energy_bonus;
            let mut first_child = None;
            let mut spawned = 0;
            for _ in 0..species.reproduction.offspring_count {
                let jx = self.rng.spawn.gaussian(0.0, 4.0);
                let jy = self.rng.spawn.gaussian(0.0, 4.0);
                if let Some(child) =
                    self.spawn_agent(&type_id, x + jx, y + jy, Some(offspring_energy))
                {
                    spawned += 1;
                    first_child.get_or_insert(child);
                }
            }
            if let Some(&idx) = self.id_index.get(parent_id) {
                let parent = &mut self.agents[idx];
                parent.energy = max_energy * 0.5;
                parent.reproduction_cooldown = cooldown;
            }
            if let Some(child_id) = first_child {
                out.push(Event::Reproduced {
                    parent_id: *parent_id,
                    child_id,
                    type_id,
                    offspring_count: spawned,
                    parent2_id: None,
                });
            }
        }

        // Hard safety: random cull back under the global cap.
        let max_boids = self.profile.parameters.max_boids as usize;
        while self.agents.len() > max_boids {
            let victim = self.rng.spawn.pick_index(self.agents.len());
            debug!(
                "population over cap, culling agent {}",
                self.agents[victim].id
            );
            self.agents.remove(victim);
        }
        if !changes.deaths.is_empty() || self.agents.len() != self.id_index.len() {
            self.refresh_id_index();
        }

        for id in &changes.food_remove {
            self.food.retain(|f| f.id != *id);
        }
        for (x, y, kind, energy) in changes.food_add {
            let id = self.next_food_id;
            self.next_food_id += 1;
            let source = FoodSource {
                id,
                x,
                y,
                energy,
                max_energy: energy,
                kind,
                created_tick: self.time.frame,
            };
            self.food.push(source.clone());
            out.push(Event::FoodSourceCreated { food: source });
        }
    }

    fn sweep_dead(&mut self) {
        if self.agents.iter().any(|a| a.is_dead) {
            self.agents.retain(|a| !a.is_dead);
            self.refresh_id_index();
        }
    }

    // ─── Outbound views ───

    pub fn snapshot(&self) -> Snapshot {
        let mut stats = PopulationStats::default();
        let mut live = 0usize;
        for agent in &self.agents {
            if agent.is_dead {
                continue;
            }
            live += 1;
            match self.profile.species(&agent.type_id).map(|s| s.role) {
                Some(Role::Prey) => stats.prey += 1,
                Some(Role::Predator) => stats.predators += 1,
                None => {}
            }
            stats.mean_energy += agent.energy;
            stats.mean_age += agent.age;
        }
        if live > 0 {
            stats.mean_energy /= live as f32;
            stats.mean_age /= live as f32;
        }
        Snapshot {
            frame: self.time.frame,
            simulated_elapsed_ms: self.time.simulated_elapsed_ms,
            paused: self.time.paused,
            time_scale: self.time.time_scale,
            agents: self
                .agents
                .iter()
                .filter(|a| !a.is_dead)
                .map(AgentView::from_agent)
                .collect(),
            obstacles: self.obstacles.clone(),
            food: self.food.clone(),
            death_markers: self.death_markers.clone(),
            stats,
        }
    }

    pub fn publish(&self, buffers: &snapshot::SharedBuffers) {
        buffers.publish(&self.agents);
    }
}
