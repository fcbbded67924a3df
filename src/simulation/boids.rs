use std::collections::HashMap;

use noise::{NoiseFn, Perlin};

use crate::simulation::agent::{Agent, Stance};
use crate::simulation::lifecycle::{DeathMarker, FoodSource, Obstacle};
use crate::simulation::profile::{Profile, Role};

pub const OBSTACLE_SAFETY_MARGIN: f32 = 12.0;
pub const DEATH_MARKER_REPULSION_RADIUS: f32 = 150.0;
const DEATH_MARKER_WEIGHT: f32 = 1.5;
const MATING_SOFT_CAP_DISTANCE: f32 = 6.0;
const EATING_ORBIT_INWARD: f32 = 0.35;
const IDLE_WANDER_WEIGHT: f32 = 0.4;
const IDLE_DAMPING: f32 = 0.92;

// ─── Torus math ───

pub fn wrap(value: f32, size: f32) -> f32 {
    let wrapped = value.rem_euclid(size);
    // rem_euclid can return `size` itself for tiny negative inputs.
    if wrapped >= size {
        0.0
    } else {
        wrapped
    }
}

/// Shortest signed delta from `from` to `to` on a ring of length `size`.
pub fn torus_delta(from: f32, to: f32, size: f32) -> f32 {
    let mut delta = to - from;
    if delta > size * 0.5 {
        delta -= size;
    } else if delta < -size * 0.5 {
        delta += size;
    }
    delta
}

pub fn torus_dist_sq(ax: f32, ay: f32, bx: f32, by: f32, width: f32, height: f32) -> f32 {
    let dx = torus_delta(ax, bx, width);
    let dy = torus_delta(ay, by, height);
    dx * dx + dy * dy
}

// ─── Spatial grid ───

/// Uniform grid over the torus. Cleared and rebuilt once per tick before any
/// neighbor query; cells hold agent indices in arena order, which is id
/// order, so iteration is deterministic.
pub struct SpatialGrid {
    cell_size: f32,
    cols: usize,
    rows: usize,
    width: f32,
    height: f32,
    cells: Vec<Vec<usize>>,
}

impl SpatialGrid {
    pub fn new(width: f32, height: f32, cell_size: f32) -> Self {
        let cell_size = cell_size.max(1.0);
        let cols = ((width / cell_size).ceil() as usize).max(1);
        let rows = ((height / cell_size).ceil() as usize).max(1);
        Self {
            cell_size,
            cols,
            rows,
            width,
            height,
            cells: vec![Vec::new(); cols * rows],
        }
    }

    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.clear();
        }
    }

    pub fn insert(&mut self, index: usize, x: f32, y: f32) {
        let col = ((x / self.cell_size) as usize).min(self.cols - 1);
        let row = ((y / self.cell_size) as usize).min(self.rows - 1);
        self.cells[row * self.cols + col].push(index);
    }

    pub fn rebuild(&mut self, agents: &[Agent]) {
        self.clear();
        for (i, agent) in agents.iter().enumerate() {
            if agent.is_dead {
                continue;
            }
            self.insert(i, agent.x, agent.y);
        }
    }

    /// Collects candidate agent indices for a disc query into `out`. May
    /// over-approximate; callers do the exact torus distance test. Radii
    /// beyond half the world are clamped so the disc cannot wrap onto
    /// itself twice.
    pub fn neighbors_into(&self, x: f32, y: f32, radius: f32, out: &mut Vec<usize>) {
        out.clear();
        let radius = radius.min(self.width * 0.5).min(self.height * 0.5);
        let min_col = ((x - radius) / self.cell_size).floor() as i64;
        let max_col = ((x + radius) / self.cell_size).floor() as i64;
        let min_row = ((y - radius) / self.cell_size).floor() as i64;
        let max_row = ((y + radius) / self.cell_size).floor() as i64;

        let col_span = if (max_col - min_col) as usize + 1 >= self.cols {
            0..self.cols as i64
        } else {
            min_col..max_col + 1
        };
        let row_span = if (max_row - min_row) as usize + 1 >= self.rows {
            0..self.rows as i64
        } else {
            min_row..max_row + 1
        };

        for row in row_span {
            let row = row.rem_euclid(self.rows as i64) as usize;
            for col in col_span.clone() {
                let col = col.rem_euclid(self.cols as i64) as usize;
                out.extend_from_slice(&self.cells[row * self.cols + col]);
            }
        }
    }

    /// `neighbors_into` narrowed to one species role. Still an
    /// over-approximation by distance; callers do the exact torus test.
    #[allow(clippy::too_many_arguments)]
    pub fn neighbors_role_into(
        &self,
        x: f32,
        y: f32,
        radius: f32,
        role: Role,
        agents: &[Agent],
        profile: &Profile,
        out: &mut Vec<usize>,
    ) {
        self.neighbors_into(x, y, radius, out);
        out.retain(|&j| profile.species(&agents[j].type_id).map(|s| s.role) == Some(role));
    }
}

// ─── Steering ───

/// Computes per-agent steering forces from the current stance intent and
/// integrates the result. Forces are computed for every agent against the
/// pre-move world, then applied, so in-tick ordering cannot leak between
/// agents.
pub struct SteeringEngine {
    perlin: Perlin,
}

impl SteeringEngine {
    pub fn new(seed: u64) -> Self {
        Self {
            perlin: Perlin::new(seed as u32),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &self,
        agents: &mut [Agent],
        profile: &Profile,
        grid: &SpatialGrid,
        obstacles: &[Obstacle],
        food: &[FoodSource],
        markers: &[DeathMarker],
        id_index: &HashMap<u32, usize>,
        frame: u64,
        dt: f32,
        scratch: &mut Vec<usize>,
    ) {
        if agents.is_empty() {
            return;
        }
        let forces: Vec<(f32, f32)> = (0..agents.len())
            .map(|i| {
                self.compute_force(
                    i, agents, profile, grid, obstacles, food, markers, id_index, frame, scratch,
                )
            })
            .collect();

        let width = profile.world.width;
        let height = profile.world.height;
        for (i, (fx, fy)) in forces.into_iter().enumerate() {
            let agent = &mut agents[i];
            if agent.is_dead {
                continue;
            }
            let species = match profile.species(&agent.type_id) {
                Some(s) => s,
                None => continue,
            };

            let smoothed_fx = agent.prev_force_x * 0.3 + fx * 0.7;
            let smoothed_fy = agent.prev_force_y * 0.3 + fy * 0.7;
            agent.prev_force_x = smoothed_fx;
            agent.prev_force_y = smoothed_fy;

            let max_force = species.movement.max_force;
            let mag = (smoothed_fx * smoothed_fx + smoothed_fy * smoothed_fy).sqrt();
            let (ax, ay) = if mag > max_force {
                let scale = max_force / mag;
                (smoothed_fx * scale, smoothed_fy * scale)
            } else {
                (smoothed_fx, smoothed_fy)
            };
            agent.ax = ax;
            agent.ay = ay;

            agent.vx += ax * dt;
            agent.vy += ay * dt;
            if agent.stance == Stance::Idle {
                agent.vx *= IDLE_DAMPING;
                agent.vy *= IDLE_DAMPING;
            }
            let speed = agent.speed();
            if speed > species.movement.max_speed {
                let scale = species.movement.max_speed / speed;
                agent.vx *= scale;
                agent.vy *= scale;
            }

            agent.x = wrap(agent.x + agent.vx * dt, width);
            agent.y = wrap(agent.y + agent.vy * dt, height);

            // Hard resolve: steering alone must not leave an agent inside an
            // obstacle after integration.
            for obstacle in obstacles {
                let dx = torus_delta(obstacle.x, agent.x, width);
                let dy = torus_delta(obstacle.y, agent.y, height);
                let dist_sq = dx * dx + dy * dy;
                if dist_sq < obstacle.radius * obstacle.radius {
                    let dist = dist_sq.sqrt().max(0.01);
                    let push = obstacle.radius + 0.5;
                    agent.x = wrap(obstacle.x + dx / dist * push, width);
                    agent.y = wrap(obstacle.y + dy / dist * push, height);
                }
            }

            agent.trail.push(agent.x, agent.y);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn compute_force(
        &self,
        idx: usize,
        agents: &[Agent],
        profile: &Profile,
        grid: &SpatialGrid,
        obstacles: &[Obstacle],
        food: &[FoodSource],
        markers: &[DeathMarker],
        id_index: &HashMap<u32, usize>,
        frame: u64,
        scratch: &mut Vec<usize>,
    ) -> (f32, f32) {
        let me = &agents[idx];
        if me.is_dead {
            return (0.0, 0.0);
        }
        let species = match profile.species(&me.type_id) {
            Some(s) => s,
            None => return (0.0, 0.0),
        };
        let params = &profile.parameters;
        let width = profile.world.width;
        let height = profile.world.height;
        let max_force = species.movement.max_force;

        let mut fx = 0.0_f32;
        let mut fy = 0.0_f32;

        match me.stance {
            Stance::Flocking => {
                let (sx, sy) = self.flocking_force(idx, agents, profile, grid, scratch);
                fx += sx;
                fy += sy;
            }
            Stance::Fleeing => {
                let fear_radius = species.limits.fear_radius.unwrap_or(params.fear_radius);
                let fear_sq = fear_radius * fear_radius;
                grid.neighbors_into(me.x, me.y, fear_radius, scratch);
                for &j in scratch.iter() {
                    if j == idx {
                        continue;
                    }
                    let other = &agents[j];
                    if other.is_dead {
                        continue;
                    }
                    if profile.species(&other.type_id).map(|s| s.role) != Some(Role::Predator) {
                        continue;
                    }
                    let dx = torus_delta(other.x, me.x, width);
                    let dy = torus_delta(other.y, me.y, height);
                    let dist_sq = dx * dx + dy * dy;
                    if dist_sq >= fear_sq || dist_sq < 0.0001 {
                        continue;
                    }
                    let dist = dist_sq.sqrt();
                    let urgency = species.lifecycle.fear_factor * (1.0 - dist / fear_radius);
                    fx += dx / dist * urgency * max_force;
                    fy += dy / dist * urgency * max_force;
                }
                let (sx, sy) = self.separation_force(idx, agents, profile, grid, scratch);
                fx += sx;
                fy += sy;
            }
            Stance::SeekingMate => {
                let mut nearest: Option<(usize, f32)> = None;
                grid.neighbors_into(me.x, me.y, params.perception_radius, scratch);
                for &j in scratch.iter() {
                    if j == idx {
                        continue;
                    }
                    let other = &agents[j];
                    if other.is_dead || !other.seeking_mate || other.type_id != me.type_id {
                        continue;
                    }
                    let dist_sq = torus_dist_sq(me.x, me.y, other.x, other.y, width, height);
                    let closer = match nearest {
                        None => true,
                        Some((best, best_sq)) => {
                            dist_sq < best_sq
                                || (dist_sq == best_sq && agents[j].id < agents[best].id)
                        }
                    };
                    if closer {
                        nearest = Some((j, dist_sq));
                    }
                }
                if let Some((j, dist_sq)) = nearest {
                    let other = &agents[j];
                    let dist = dist_sq.sqrt().max(0.01);
                    let dx = torus_delta(me.x, other.x, width);
                    let dy = torus_delta(me.y, other.y, height);
                    fx += dx / dist * species.movement.cohesion_weight * max_force;
                    fy += dy / dist * species.movement.cohesion_weight * max_force;
                } else {
                    let (sx, sy) = self.flocking_force(idx, agents, profile, grid, scratch);
                    fx += sx;
                    fy += sy;
                }
            }
            Stance::Mating => {
                if let Some(partner_idx) = me.mate_id.and_then(|id| id_index.get(&id).copied()) {
                    let partner = &agents[partner_idx];
                    if !partner.is_dead {
                        let dx = torus_delta(me.x, partner.x, width);
                        let dy = torus_delta(me.y, partner.y, height);
                        let dist = (dx * dx + dy * dy).sqrt();
                        // Soft cap keeps the pair from overshooting through
                        // each other.
                        let pull = ((dist - MATING_SOFT_CAP_DISTANCE) / params.mate_radius)
                            .clamp(0.0, 1.0);
                        if dist > 0.01 {
                            fx += dx / dist * pull * max_force;
                            fy += dy / dist * pull * max_force;
                        }
                    }
                }
            }
            Stance::Hunting => {
                let mut nearest: Option<(usize, f32)> = None;
                grid.neighbors_into(me.x, me.y, params.chase_radius, scratch);
                let chase_sq = params.chase_radius * params.chase_radius;
                for &j in scratch.iter() {
                    if j == idx {
                        continue;
                    }
                    let other = &agents[j];
                    if other.is_dead {
                        continue;
                    }
                    if profile.species(&other.type_id).map(|s| s.role) != Some(Role::Prey) {
                        continue;
                    }
                    let dist_sq = torus_dist_sq(me.x, me.y, other.x, other.y, width, height);
                    if dist_sq >= chase_sq {
                        continue;
                    }
                    let closer = match nearest {
                        None => true,
                        Some((best, best_sq)) => {
                            dist_sq < best_sq
                                || (dist_sq == best_sq && agents[j].id < agents[best].id)
                        }
                    };
                    if closer {
                        nearest = Some((j, dist_sq));
                    }
                }
                if let Some((j, dist_sq)) = nearest {
                    let prey = &agents[j];
                    let dist = dist_sq.sqrt();
                    // Lead the prey by its velocity over the closing time.
                    let lead = dist / species.movement.max_speed.max(1.0);
                    let aim_x = wrap(prey.x + prey.vx * lead, width);
                    let aim_y = wrap(prey.y + prey.vy * lead, height);
                    let dx = torus_delta(me.x, aim_x, width);
                    let dy = torus_delta(me.y, aim_y, height);
                    let mag = (dx * dx + dy * dy).sqrt().max(0.01);
                    fx += dx / mag * max_force;
                    fy += dy / mag * max_force;
                }
            }
            Stance::Idle => {
                let t = frame as f64 * 0.01;
                let angle = self.perlin.get([
                    me.x as f64 * 0.01 + t,
                    me.y as f64 * 0.01 + me.id as f64 * 100.0,
                ]) as f32
                    * std::f32::consts::TAU;
                fx += angle.cos() * IDLE_WANDER_WEIGHT * max_force;
                fy += angle.sin() * IDLE_WANDER_WEIGHT * max_force;
            }
            Stance::Eating => {
                if let Some(source) = me
                    .eating_target
                    .and_then(|id| food.iter().find(|f| f.id == id))
                {
                    let dx = torus_delta(me.x, source.x, width);
                    let dy = torus_delta(me.y, source.y, height);
                    let dist = (dx * dx + dy * dy).sqrt().max(0.01);
                    // Orbit: tangential drift plus a mild inward bias.
                    let tx = -dy / dist;
                    let ty = dx / dist;
                    fx += (tx + dx / dist * EATING_ORBIT_INWARD) * 0.5 * max_force;
                    fy += (ty + dy / dist * EATING_ORBIT_INWARD) * 0.5 * max_force;
                }
            }
        }

        // Obstacle avoidance applies to every stance.
        for obstacle in obstacles {
            let avoid_radius = obstacle.radius + OBSTACLE_SAFETY_MARGIN;
            let dx = torus_delta(obstacle.x, me.x, width);
            let dy = torus_delta(obstacle.y, me.y, height);
            let dist_sq = dx * dx + dy * dy;
            if dist_sq < avoid_radius * avoid_radius && dist_sq > 0.0001 {
                let dist = dist_sq.sqrt();
                let t = 1.0 - dist / avoid_radius;
                let push = t * t * params.obstacle_avoidance_weight * max_force;
                fx += dx / dist * push;
                fy += dy / dist * push;
            }
        }

        // Death markers repel prey only.
        if species.role == Role::Prey {
            for marker in markers {
                let dx = torus_delta(marker.x, me.x, width);
                let dy = torus_delta(marker.y, me.y, height);
                let dist_sq = dx * dx + dy * dy;
                let radius = DEATH_MARKER_REPULSION_RADIUS;
                if dist_sq < radius * radius && dist_sq > 0.0001 {
                    let dist = dist_sq.sqrt();
                    let falloff = 1.0 - dist / radius;
                    let push = (marker.strength / 5.0) * falloff * DEATH_MARKER_WEIGHT * max_force;
                    fx += dx / dist * push;
                    fy += dy / dist * push;
                }
            }
        }

        (fx, fy)
    }

    /// Classic separation/alignment/cohesion over same-species neighbors.
    fn flocking_force(
        &self,
        idx: usize,
        agents: &[Agent],
        profile: &Profile,
        grid: &SpatialGrid,
        scratch: &mut Vec<usize>,
    ) -> (f32, f32) {
        let me = &agents[idx];
        let species = match profile.species(&me.type_id) {
            Some(s) => s,
            None => return (0.0, 0.0),
        };
        let params = &profile.parameters;
        let width = profile.world.width;
        let height = profile.world.height;
        let min_distance = species.movement.min_distance.unwrap_or(params.min_distance);
        let perception_sq = params.perception_radius * params.perception_radius;
        let max_force = species.movement.max_force;

        let mut sep_x = 0.0_f32;
        let mut sep_y = 0.0_f32;
        let mut align_x = 0.0_f32;
        let mut align_y = 0.0_f32;
        let mut align_count = 0u32;
        let mut coh_x = 0.0_f32;
        let mut coh_y = 0.0_f32;
        let mut coh_count = 0u32;

        grid.neighbors_into(me.x, me.y, params.perception_radius, scratch);
        for &j in scratch.iter() {
            if j == idx {
                continue;
            }
            let other = &agents[j];
            if other.is_dead || other.type_id != me.type_id {
                continue;
            }
            let dx = torus_delta(me.x, other.x, width);
            let dy = torus_delta(me.y, other.y, height);
            let dist_sq = dx * dx + dy * dy;
            if dist_sq >= perception_sq || dist_sq < 0.0001 {
                continue;
            }
            let dist = dist_sq.sqrt();

            if dist < min_distance {
                let strength = (min_distance - dist) / min_distance;
                sep_x -= dx / dist * strength;
                sep_y -= dy / dist * strength;
            }

            let other_speed = other.speed();
            if other_speed > 0.01 {
                align_x += other.vx / other_speed;
                align_y += other.vy / other_speed;
                align_count += 1;
            }

            coh_x += dx;
            coh_y += dy;
            coh_count += 1;
        }

        let mut fx = sep_x * species.movement.separation_weight * max_force;
        let mut fy = sep_y * species.movement.separation_weight * max_force;

        if align_count > 0 {
            let inv = 1.0 / align_count as f32;
            let my_speed = me.speed().max(0.01);
            let diff_x = align_x * inv - me.vx / my_speed;
            let diff_y = align_y * inv - me.vy / my_speed;
            fx += diff_x * species.movement.alignment_weight * max_force * 0.5;
            fy += diff_y * species.movement.alignment_weight * max_force * 0.5;
        }

        if coh_count > 0 {
            let inv = 1.0 / coh_count as f32;
            let center_dx = coh_x * inv;
            let center_dy = coh_y * inv;
            let dist = (center_dx * center_dx + center_dy * center_dy).sqrt();
            if dist > 0.01 {
                let reach = (dist / params.perception_radius).min(1.0);
                fx += center_dx / dist * reach * species.movement.cohesion_weight * max_force * 0.5;
                fy += center_dy / dist * reach * species.movement.cohesion_weight * max_force * 0.5;
            }
        }

        (fx, fy)
    }

    fn separation_force(
        &self,
        idx: usize,
        agents: &[Agent],
        profile: &Profile,
        grid: &SpatialGrid,
        scratch: &mut Vec<usize>,
    ) -> (f32, f32) {
        let me = &agents[idx];
        let species = match profile.species(&me.type_id) {
            Some(s) => s,
            None => return (0.0, 0.0),
        };
        let params = &profile.parameters;
        let width = profile.world.width;
        let height = profile.world.height;
        let min_distance = species.movement.min_distance.unwrap_or(params.min_distance);

        let mut fx = 0.0_f32;
        let mut fy = 0.0_f32;
        grid.neighbors_into(me.x, me.y, min_distance, scratch);
        for &j in scratch.iter() {
            if j == idx {
                continue;
            }
            let other = &agents[j];
            if other.is_dead || other.type_id != me.type_id {
                continue;
            }
            let dx = torus_delta(other.x, me.x, width);
            let dy = torus_delta(other.y, me.y, height);
            let dist_sq = dx * dx + dy * dy;
            if dist_sq >= min_distance * min_distance || dist_sq < 0.0001 {
                continue;
            }
            let dist = dist_sq.sqrt();
            let strength = (min_distance - dist) / min_distance;
            fx += dx / dist * strength * species.movement.separation_weight
                * species.movement.max_force;
            fy += dy / dist * strength * species.movement.separation_weight
                * species.movement.max_force;
        }
        (fx, fy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::agent::Stance;
    use crate::simulation::profile::builtin_profiles;
    use crate::simulation::rng::EngineRng;

    fn make_agent(id: u32, x: f32, y: f32) -> Agent {
        let species = builtin_profiles()[0].species["starling"].clone();
        let mut rng = EngineRng::new(1);
        let mut agent = Agent::new(id, &species, x, y, Stance::Flocking, &mut rng.spawn);
        agent.vx = 0.0;
        agent.vy = 0.0;
        agent
    }

    #[test]
    fn wrap_stays_in_range() {
        assert_eq!(wrap(1005.0, 1000.0), 5.0);
        assert_eq!(wrap(-3.0, 1000.0), 997.0);
        assert_eq!(wrap(0.0, 1000.0), 0.0);
        let w = wrap(999.9999, 1000.0);
        assert!((0.0..1000.0).contains(&w));
    }

    #[test]
    fn torus_delta_takes_shortest_path() {
        assert_eq!(torus_delta(990.0, 10.0, 1000.0), 20.0);
        assert_eq!(torus_delta(10.0, 990.0, 1000.0), -20.0);
        assert_eq!(torus_delta(100.0, 150.0, 1000.0), 50.0);
    }

    #[test]
    fn grid_finds_neighbors_across_the_seam() {
        let mut grid = SpatialGrid::new(1000.0, 1000.0, 100.0);
        let agents = vec![make_agent(1, 5.0, 500.0), make_agent(2, 995.0, 500.0)];
        grid.rebuild(&agents);
        let mut out = Vec::new();
        grid.neighbors_into(5.0, 500.0, 50.0, &mut out);
        assert!(out.contains(&0));
        assert!(out.contains(&1), "wrap-around neighbor must be a candidate");
    }

    #[test]
    fn grid_origin_agent_is_queryable() {
        let mut grid = SpatialGrid::new(1000.0, 1000.0, 100.0);
        let agents = vec![make_agent(1, 0.0, 0.0)];
        grid.rebuild(&agents);
        let mut out = Vec::new();
        grid.neighbors_into(999.0, 999.0, 30.0, &mut out);
        assert!(out.contains(&0));
    }

    #[test]
    fn oversized_radius_visits_each_cell_once() {
        let mut grid = SpatialGrid::new(300.0, 300.0, 100.0);
        let agents = vec![make_agent(1, 150.0, 150.0)];
        grid.rebuild(&agents);
        let mut out = Vec::new();
        grid.neighbors_into(150.0, 150.0, 10_000.0, &mut out);
        assert_eq!(out.iter().filter(|&&i| i == 0).count(), 1);
    }

    #[test]
    fn dead_agents_are_not_indexed() {
        let mut grid = SpatialGrid::new(1000.0, 1000.0, 100.0);
        let mut agents = vec![make_agent(1, 50.0, 50.0)];
        agents[0].is_dead = true;
        grid.rebuild(&agents);
        let mut out = Vec::new();
        grid.neighbors_into(50.0, 50.0, 60.0, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn integration_wraps_position_and_clamps_speed() {
        let profile = builtin_profiles()[0].clone();
        let mut grid = SpatialGrid::new(
            profile.world.width,
            profile.world.height,
            profile.grid_cell_size(),
        );
        let steering = SteeringEngine::new(7);
        let mut agents = vec![make_agent(1, profile.world.width - 0.5, 300.0)];
        agents[0].vx = 1_000_000.0;
        grid.rebuild(&agents);
        let mut scratch = Vec::new();
        let id_index = HashMap::new();
        steering.update(
            &mut agents,
            &profile,
            &grid,
            &[],
            &[],
            &[],
            &id_index,
            1,
            1.0 / 30.0,
            &mut scratch,
        );
        let species = &profile.species["starling"];
        assert!(agents[0].speed() <= species.movement.max_speed + 0.001);
        assert!(agents[0].x >= 0.0 && agents[0].x < profile.world.width);
    }

    #[test]
    fn prey_steers_away_from_obstacle() {
        let profile = builtin_profiles()[0].clone();
        let mut grid = SpatialGrid::new(
            profile.world.width,
            profile.world.height,
            profile.grid_cell_size(),
        );
        let steering = SteeringEngine::new(7);
        let mut agents = vec![make_agent(1, 200.0, 200.0)];
        agents[0].vx = 60.0;
        grid.rebuild(&agents);
        let obstacle = Obstacle {
            id: 1,
            x: 230.0,
            y: 200.0,
            radius: 30.0,
        };
        let mut scratch = Vec::new();
        let id_index = HashMap::new();
        let force = steering.compute_force(
            0,
            &agents,
            &profile,
            &grid,
            std::slice::from_ref(&obstacle),
            &[],
            &[],
            &id_index,
            1,
            &mut scratch,
        );
        assert!(force.0 < 0.0, "repulsion should point away from the obstacle");
    }
}
