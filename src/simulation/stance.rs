use std::collections::HashMap;

use crate::simulation::agent::{Agent, Stance};
use crate::simulation::boids::{torus_delta, torus_dist_sq, wrap, SpatialGrid};
use crate::simulation::lifecycle::{FoodSource, FOOD_CONSUMPTION_RADIUS};
use crate::simulation::profile::{Profile, ReproductionKind, Role, SpeciesConfig};

/// Below this fraction of max energy a predator stops hunting and conserves.
pub const PREDATOR_HUNT_ENERGY_FRACTION: f32 = 0.25;

/// A pair that finished its mating buildup this tick. The engine turns these
/// into offspring at end of tick.
#[derive(Debug, Clone)]
pub struct MatingCompletion {
    pub parent_a: u32,
    pub parent_b: u32,
    pub type_id: String,
    pub x: f32,
    pub y: f32,
}

struct DecisionInputs {
    role: Role,
    predator_near: bool,
    food_target: Option<u32>,
    eligible_mate_seeker: bool,
}

fn role_default(species: &SpeciesConfig, agent: &Agent) -> Stance {
    match species.role {
        Role::Prey => Stance::Flocking,
        Role::Predator => {
            if agent.energy >= agent.phenotype.max_energy * PREDATOR_HUNT_ENERGY_FRACTION {
                Stance::Hunting
            } else {
                Stance::Idle
            }
        }
    }
}

/// One stance-machine pass over every agent: derived flags, transitions,
/// mate pairing, and mating progress, in that order. Pure with respect to
/// everything except the agents themselves.
pub fn run(
    agents: &mut [Agent],
    profile: &Profile,
    grid: &SpatialGrid,
    food: &[FoodSource],
    id_index: &HashMap<u32, usize>,
    frame: u64,
    scratch: &mut Vec<usize>,
) -> Vec<MatingCompletion> {
    let params = &profile.parameters;
    let width = profile.world.width;
    let height = profile.world.height;

    // Phase 1: read-only decision inputs against the pre-transition world.
    let mut inputs: Vec<DecisionInputs> = Vec::with_capacity(agents.len());
    for i in 0..agents.len() {
        let me = &agents[i];
        let species = match profile.species(&me.type_id) {
            Some(s) => s,
            None => {
                inputs.push(DecisionInputs {
                    role: Role::Prey,
                    predator_near: false,
                    food_target: None,
                    eligible_mate_seeker: false,
                });
                continue;
            }
        };

        let predator_near = if me.is_dead || species.role != Role::Prey {
            false
        } else {
            let fear_radius = species.limits.fear_radius.unwrap_or(params.fear_radius);
            let fear_sq = fear_radius * fear_radius;
            grid.neighbors_role_into(
                me.x,
                me.y,
                fear_radius,
                Role::Predator,
                agents,
                profile,
                scratch,
            );
            scratch.iter().any(|&j| {
                j != i
                    && !agents[j].is_dead
                    && torus_dist_sq(me.x, me.y, agents[j].x, agents[j].y, width, height)
                        < fear_sq
            })
        };

        let mut food_target: Option<(u32, f32)> = None;
        if !me.is_dead {
            let radius_sq = FOOD_CONSUMPTION_RADIUS * FOOD_CONSUMPTION_RADIUS;
            for source in food {
                if source.is_exhausted() || !source.edible_by(species.role) {
                    continue;
                }
                let dist_sq = torus_dist_sq(me.x, me.y, source.x, source.y, width, height);
                if dist_sq < radius_sq && food_target.map_or(true, |(_, best)| dist_sq < best) {
                    food_target = Some((source.id, dist_sq));
                }
            }
        }

        let eligible_mate_seeker = !me.is_dead
            && species.reproduction.kind == ReproductionKind::Sexual
            && me.age >= params.min_reproduction_age
            && me.energy >= me.phenotype.max_energy * params.reproduction_energy_threshold
            && me.reproduction_cooldown == 0;

        inputs.push(DecisionInputs {
            role: species.role,
            predator_near,
            food_target: food_target.map(|(id, _)| id),
            eligible_mate_seeker,
        });
    }

    // Phase 2: transitions. Mating agents are handled by the progress phase.
    for i in 0..agents.len() {
        let input = &inputs[i];
        let agent = &mut agents[i];
        if agent.is_dead {
            continue;
        }
        agent.seeking_mate = input.eligible_mate_seeker;
        if agent.stance == Stance::Mating {
            continue;
        }
        match input.role {
            Role::Prey => {
                if input.predator_near {
                    agent.threat_clear_ticks = 0;
                    if agent.stance != Stance::Fleeing {
                        agent.eating_target = None;
                        agent.set_stance(Stance::Fleeing, frame);
                    }
                } else if agent.stance == Stance::Fleeing {
                    agent.threat_clear_ticks += 1;
                    if agent.threat_clear_ticks > 1 {
                        agent.set_stance(Stance::Flocking, frame);
                    }
                } else if agent.stance == Stance::Eating {
                    let target_live = agent
                        .eating_target
                        .and_then(|id| food.iter().find(|f| f.id == id))
                        .map_or(false, |f| !f.is_exhausted());
                    if !target_live || agent.eating_cooldown > 0 {
                        agent.eating_target = None;
                        agent.set_stance(Stance::Flocking, frame);
                    }
                } else if input.food_target.is_some() && agent.eating_cooldown == 0 {
                    agent.eating_target = input.food_target;
                    agent.set_stance(Stance::Eating, frame);
                } else if agent.seeking_mate {
                    agent.set_stance(Stance::SeekingMate, frame);
                } else {
                    agent.set_stance(Stance::Flocking, frame);
                }
            }
            Role::Predator => {
                if agent.stance == Stance::Eating {
                    let target_live = agent
                        .eating_target
                        .and_then(|id| food.iter().find(|f| f.id == id))
                        .map_or(false, |f| !f.is_exhausted());
                    if !target_live || agent.eating_cooldown > 0 {
                        agent.eating_target = None;
                        let next = if agent.energy
                            >= agent.phenotype.max_energy * PREDATOR_HUNT_ENERGY_FRACTION
                        {
                            Stance::Hunting
                        } else {
                            Stance::Idle
                        };
                        agent.set_stance(next, frame);
                    }
                } else if input.food_target.is_some() && agent.eating_cooldown == 0 {
                    agent.eating_target = input.food_target;
                    agent.set_stance(Stance::Eating, frame);
                } else if agent.energy
                    >= agent.phenotype.max_energy * PREDATOR_HUNT_ENERGY_FRACTION
                {
                    agent.set_stance(Stance::Hunting, frame);
                } else {
                    agent.set_stance(Stance::Idle, frame);
                }
            }
        }
    }

    // Phase 3: pair unmatched seekers, ascending id order, nearest first
    // with the lower id breaking distance ties.
    for i in 0..agents.len() {
        if agents[i].is_dead
            || agents[i].stance != Stance::SeekingMate
            || agents[i].mate_id.is_some()
        {
            continue;
        }
        let choice = {
            let me = &agents[i];
            let mate_sq = params.mate_radius * params.mate_radius;
            grid.neighbors_into(me.x, me.y, params.mate_radius, scratch);
            let mut best: Option<(usize, f32)> = None;
            for &j in scratch.iter() {
                if j == i {
                    continue;
                }
                let other = &agents[j];
                if other.is_dead
                    || other.stance != Stance::SeekingMate
                    || other.mate_id.is_some()
                    || other.type_id != me.type_id
                {
                    continue;
                }
                let dist_sq = torus_dist_sq(me.x, me.y, other.x, other.y, width, height);
                if dist_sq >= mate_sq {
                    continue;
                }
                let better = match best {
                    None => true,
                    Some((bj, best_sq)) => {
                        dist_sq < best_sq || (dist_sq == best_sq && other.id < agents[bj].id)
                    }
                };
                if better {
                    best = Some((j, dist_sq));
                }
            }
            best.map(|(j, _)| j)
        };
        if let Some(j) = choice {
            let id_i = agents[i].id;
            let id_j = agents[j].id;
            agents[i].mate_id = Some(id_j);
            agents[i].mating_buildup = 0;
            agents[i].mate_out_of_range = 0;
            agents[i].set_stance(Stance::Mating, frame);
            agents[j].mate_id = Some(id_i);
            agents[j].mating_buildup = 0;
            agents[j].mate_out_of_range = 0;
            agents[j].set_stance(Stance::Mating, frame);
        }
    }

    // Phase 4: mating progress, one visit per pair.
    let mut completions = Vec::new();
    for i in 0..agents.len() {
        if agents[i].is_dead || agents[i].stance != Stance::Mating {
            continue;
        }
        let mate_id = match agents[i].mate_id {
            Some(id) => id,
            None => {
                // Partnerless mating state; fall back to the role default.
                let species = profile.species(&agents[i].type_id);
                if let Some(species) = species {
                    let next = role_default(species, &agents[i]);
                    agents[i].set_stance(next, frame);
                }
                continue;
            }
        };
        let partner = id_index.get(&mate_id).copied();
        let partner_ok = partner.map_or(false, |j| {
            !agents[j].is_dead && agents[j].mate_id == Some(agents[i].id)
        });
        if !partner_ok {
            if let Some(species) = profile.species(&agents[i].type_id) {
                let next = role_default(species, &agents[i]);
                agents[i].set_stance(next, frame);
            }
            agents[i].clear_mate();
            continue;
        }
        let j = partner.unwrap_or(i);
        if agents[i].id > agents[j].id {
            continue; // the lower-id side advances the pair
        }

        let dist_sq = torus_dist_sq(
            agents[i].x,
            agents[i].y,
            agents[j].x,
            agents[j].y,
            width,
            height,
        );
        if dist_sq < params.mate_radius * params.mate_radius {
            agents[i].mating_buildup += 1;
            agents[j].mating_buildup += 1;
            agents[i].mate_out_of_range = 0;
            agents[j].mate_out_of_range = 0;
        } else {
            agents[i].mate_out_of_range += 1;
            agents[j].mate_out_of_range += 1;
            if agents[i].mate_out_of_range > 1 {
                for k in [i, j] {
                    if let Some(species) = profile.species(&agents[k].type_id) {
                        let next = role_default(species, &agents[k]);
                        agents[k].set_stance(next, frame);
                    }
                    agents[k].clear_mate();
                }
                continue;
            }
        }

        if agents[i].mating_buildup >= params.mating_buildup_ticks {
            let dx = torus_delta(agents[i].x, agents[j].x, width);
            let dy = torus_delta(agents[i].y, agents[j].y, height);
            completions.push(MatingCompletion {
                parent_a: agents[i].id,
                parent_b: agents[j].id,
                type_id: agents[i].type_id.clone(),
                x: wrap(agents[i].x + dx * 0.5, width),
                y: wrap(agents[i].y + dy * 0.5, height),
            });
            for k in [i, j] {
                if let Some(species) = profile.species(&agents[k].type_id) {
                    let next = role_default(species, &agents[k]);
                    agents[k].set_stance(next, frame);
                }
                agents[k].clear_mate();
            }
        }
    }

    completions
}
