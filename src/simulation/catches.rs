use std::collections::HashSet;

use crate::simulation::agent::{Agent, Stance};
use crate::simulation::boids::{torus_dist_sq, SpatialGrid};
use crate::simulation::profile::{Profile, Role};

/// One resolved predator strike. The engine applies the kill, the energy
/// transfer, and the carcass food source.
#[derive(Debug, Clone)]
pub struct CatchOutcome {
    pub predator_id: u32,
    pub prey_id: u32,
    pub prey_type_id: String,
    pub prey_energy: f32,
    pub prey_x: f32,
    pub prey_y: f32,
    pub energy_gain: f32,
}

/// One catch-detector pass. Predators are visited in arena (id) order; each
/// hunting predator catches at most its nearest prey inside the catch
/// radius, skipping mating prey and prey already claimed this pass. Distance
/// ties go to the smaller prey id.
pub fn detect(
    agents: &[Agent],
    profile: &Profile,
    grid: &SpatialGrid,
    scratch: &mut Vec<usize>,
) -> Vec<CatchOutcome> {
    let params = &profile.parameters;
    let width = profile.world.width;
    let height = profile.world.height;
    let catch_sq = params.catch_radius * params.catch_radius;

    let mut caught: HashSet<usize> = HashSet::new();
    let mut outcomes = Vec::new();

    for (i, predator) in agents.iter().enumerate() {
        if predator.is_dead || predator.stance != Stance::Hunting {
            continue;
        }
        let species = match profile.species(&predator.type_id) {
            Some(s) => s,
            None => continue,
        };
        if species.role != Role::Predator {
            continue;
        }

        grid.neighbors_role_into(
            predator.x,
            predator.y,
            params.catch_radius,
            Role::Prey,
            agents,
            profile,
            scratch,
        );
        let mut best: Option<(usize, f32)> = None;
        for &j in scratch.iter() {
            if j == i || caught.contains(&j) {
                continue;
            }
            let prey = &agents[j];
            if prey.is_dead || prey.stance == Stance::Mating {
                continue;
            }
            let dist_sq = torus_dist_sq(predator.x, predator.y, prey.x, prey.y, width, height);
            if dist_sq > catch_sq {
                continue;
            }
            let better = match best {
                None => true,
                Some((bj, best_sq)) => {
                    dist_sq < best_sq || (dist_sq == best_sq && prey.id < agents[bj].id)
                }
            };
            if better {
                best = Some((j, dist_sq));
            }
        }

        if let Some((j, _)) = best {
            caught.insert(j);
            let prey = &agents[j];
            outcomes.push(CatchOutcome {
                predator_id: predator.id,
                prey_id: prey.id,
                prey_type_id: prey.type_id.clone(),
                prey_energy: prey.energy,
                prey_x: prey.x,
                prey_y: prey.y,
                energy_gain: species.lifecycle.energy_gain_rate,
            });
        }
    }

    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::profile::builtin_profiles;
    use crate::simulation::rng::EngineRng;

    fn spawn(profile: &Profile, id: u32, type_id: &str, x: f32, y: f32, stance: Stance) -> Agent {
        let mut rng = EngineRng::new(id as u64);
        let species = profile.species(type_id).unwrap();
        let mut agent = Agent::new(id, species, x, y, stance, &mut rng.spawn);
        agent.vx = 0.0;
        agent.vy = 0.0;
        agent
    }

    fn grid_for(profile: &Profile, agents: &[Agent]) -> SpatialGrid {
        let mut grid = SpatialGrid::new(
            profile.world.width,
            profile.world.height,
            profile.grid_cell_size(),
        );
        grid.rebuild(agents);
        grid
    }

    #[test]
    fn hunting_predator_catches_prey_in_radius() {
        let profile = builtin_profiles()[0].clone();
        let agents = vec![
            spawn(&profile, 1, "falcon", 500.0, 500.0, Stance::Hunting),
            spawn(&profile, 2, "starling", 508.0, 500.0, Stance::Flocking),
        ];
        let grid = grid_for(&profile, &agents);
        let mut scratch = Vec::new();
        let outcomes = detect(&agents, &profile, &grid, &mut scratch);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].predator_id, 1);
        assert_eq!(outcomes[0].prey_id, 2);
        assert_eq!(
            outcomes[0].energy_gain,
            profile.species("falcon").unwrap().lifecycle.energy_gain_rate
        );
    }

    #[test]
    fn idle_predator_does_not_catch() {
        let profile = builtin_profiles()[0].clone();
        let agents = vec![
            spawn(&profile, 1, "falcon", 500.0, 500.0, Stance::Idle),
            spawn(&profile, 2, "starling", 505.0, 500.0, Stance::Flocking),
        ];
        let grid = grid_for(&profile, &agents);
        let mut scratch = Vec::new();
        assert!(detect(&agents, &profile, &grid, &mut scratch).is_empty());
    }

    #[test]
    fn mating_prey_is_spared() {
        let profile = builtin_profiles()[0].clone();
        let agents = vec![
            spawn(&profile, 1, "falcon", 500.0, 500.0, Stance::Hunting),
            spawn(&profile, 2, "starling", 505.0, 500.0, Stance::Mating),
        ];
        let grid = grid_for(&profile, &agents);
        let mut scratch = Vec::new();
        assert!(detect(&agents, &profile, &grid, &mut scratch).is_empty());
    }

    #[test]
    fn one_prey_per_predator_and_nearest_wins() {
        let profile = builtin_profiles()[0].clone();
        let agents = vec![
            spawn(&profile, 1, "falcon", 500.0, 500.0, Stance::Hunting),
            spawn(&profile, 2, "starling", 509.0, 500.0, Stance::Flocking),
            spawn(&profile, 3, "starling", 504.0, 500.0, Stance::Flocking),
        ];
        let grid = grid_for(&profile, &agents);
        let mut scratch = Vec::new();
        let outcomes = detect(&agents, &profile, &grid, &mut scratch);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].prey_id, 3);
    }

    #[test]
    fn two_predators_take_distinct_prey() {
        let profile = builtin_profiles()[0].clone();
        let agents = vec![
            spawn(&profile, 1, "falcon", 500.0, 500.0, Stance::Hunting),
            spawn(&profile, 2, "falcon", 503.0, 500.0, Stance::Hunting),
            spawn(&profile, 3, "starling", 502.0, 500.0, Stance::Flocking),
            spawn(&profile, 4, "starling", 498.0, 500.0, Stance::Flocking),
        ];
        let grid = grid_for(&profile, &agents);
        let mut scratch = Vec::new();
        let outcomes = detect(&agents, &profile, &grid, &mut scratch);
        assert_eq!(outcomes.len(), 2);
        let prey_ids: Vec<u32> = outcomes.iter().map(|o| o.prey_id).collect();
        assert!(prey_ids.contains(&3) && prey_ids.contains(&4));
    }

    #[test]
    fn catch_works_across_the_seam() {
        let profile = builtin_profiles()[0].clone();
        let width = profile.world.width;
        let agents = vec![
            spawn(&profile, 1, "falcon", width - 2.0, 500.0, Stance::Hunting),
            spawn(&profile, 2, "starling", 3.0, 500.0, Stance::Flocking),
        ];
        let grid = grid_for(&profile, &agents);
        let mut scratch = Vec::new();
        let outcomes = detect(&agents, &profile, &grid, &mut scratch);
        assert_eq!(outcomes.len(), 1);
    }
}
