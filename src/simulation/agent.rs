use serde::{Deserialize, Serialize};

use crate::simulation::profile::SpeciesConfig;
use crate::simulation::rng::DomainRng;

/// Upper bound on any phenotype's collision radius; the spatial grid cell
/// size is clamped to at least this.
pub const MAX_COLLISION_RADIUS: f32 = 8.0;

const BASE_MAX_HEALTH: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    Flocking,
    SeekingMate,
    Mating,
    Fleeing,
    Hunting,
    Idle,
    Eating,
}

impl Stance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flocking => "flocking",
            Self::SeekingMate => "seeking_mate",
            Self::Mating => "mating",
            Self::Fleeing => "fleeing",
            Self::Hunting => "hunting",
            Self::Idle => "idle",
            Self::Eating => "eating",
        }
    }

    /// Compact encoding for the shared publish buffers.
    pub fn as_u8(&self) -> u8 {
        match self {
            Self::Flocking => 0,
            Self::SeekingMate => 1,
            Self::Mating => 2,
            Self::Fleeing => 3,
            Self::Hunting => 4,
            Self::Idle => 5,
            Self::Eating => 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathCause {
    OldAge,
    Starvation,
    Predation,
}

impl DeathCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OldAge => "old_age",
            Self::Starvation => "starvation",
            Self::Predation => "predation",
        }
    }
}

/// Per-agent constants derived once at spawn from the species config plus a
/// little spawn-domain jitter. Immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phenotype {
    pub base_size: f32,
    pub collision_radius: f32,
    pub max_energy: f32,
    pub max_health: f32,
    /// Hue offset in degrees relative to the species color.
    pub color_shift: f32,
}

impl Phenotype {
    pub fn sample(species: &SpeciesConfig, rng: &mut DomainRng) -> Self {
        let base_size = rng.gaussian(1.0, 0.08).clamp(0.7, 1.4);
        Self {
            base_size,
            collision_radius: (base_size * 5.0).min(MAX_COLLISION_RADIUS),
            max_energy: species.lifecycle.max_energy,
            max_health: BASE_MAX_HEALTH * base_size,
            color_shift: rng.gaussian(0.0, 8.0).clamp(-25.0, 25.0),
        }
    }
}

/// Fixed-capacity ring of recent positions. Capacity is the species trail
/// length; pushes never allocate after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trail {
    slots: Vec<(f32, f32)>,
    head: usize,
    len: usize,
}

impl Trail {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![(0.0, 0.0); capacity],
            head: 0,
            len: 0,
        }
    }

    pub fn push(&mut self, x: f32, y: f32) {
        if self.slots.is_empty() {
            return;
        }
        self.slots[self.head] = (x, y);
        self.head = (self.head + 1) % self.slots.len();
        self.len = (self.len + 1).min(self.slots.len());
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = (f32, f32)> + '_ {
        let cap = self.slots.len().max(1);
        let start = (self.head + cap - self.len) % cap;
        (0..self.len).map(move |i| self.slots[(start + i) % cap])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: u32,
    pub type_id: String,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub ax: f32,
    pub ay: f32,
    pub trail: Trail,
    pub energy: f32,
    pub health: f32,
    /// Simulated seconds since spawn.
    pub age: f32,
    pub stance: Stance,
    pub stance_entered_frame: u64,
    pub reproduction_cooldown: u32,
    pub seeking_mate: bool,
    pub mate_id: Option<u32>,
    pub mating_buildup: u32,
    pub mate_out_of_range: u32,
    pub eating_cooldown: u32,
    /// Food source id while in the eating stance.
    pub eating_target: Option<u32>,
    /// Consecutive ticks without a predator inside the fear radius.
    pub threat_clear_ticks: u32,
    pub phenotype: Phenotype,
    pub is_dead: bool,
    pub death_cause: Option<DeathCause>,
    pub prev_force_x: f32,
    pub prev_force_y: f32,
}

impl Agent {
    pub fn new(
        id: u32,
        species: &SpeciesConfig,
        x: f32,
        y: f32,
        default_stance: Stance,
        rng: &mut DomainRng,
    ) -> Self {
        let phenotype = Phenotype::sample(species, rng);
        let heading = rng.range(0.0, std::f32::consts::TAU);
        let speed = species.movement.max_speed * rng.range(0.1, 0.3);
        Self {
            id,
            type_id: species.id.clone(),
            x,
            y,
            vx: heading.cos() * speed,
            vy: heading.sin() * speed,
            ax: 0.0,
            ay: 0.0,
            trail: Trail::new(species.movement.trail_length),
            energy: species.lifecycle.max_energy * 0.5,
            health: phenotype.max_health,
            age: 0.0,
            stance: default_stance,
            stance_entered_frame: 0,
            reproduction_cooldown: 0,
            seeking_mate: false,
            mate_id: None,
            mating_buildup: 0,
            mate_out_of_range: 0,
            eating_cooldown: 0,
            eating_target: None,
            threat_clear_ticks: 0,
            phenotype,
            is_dead: false,
            death_cause: None,
            prev_force_x: 0.0,
            prev_force_y: 0.0,
        }
    }

    pub fn set_stance(&mut self, stance: Stance, frame: u64) {
        if self.stance != stance {
            self.stance = stance;
            self.stance_entered_frame = frame;
        }
    }

    pub fn speed(&self) -> f32 {
        (self.vx * self.vx + self.vy * self.vy).sqrt()
    }

    pub fn gain_energy(&mut self, amount: f32) {
        self.energy = (self.energy + amount).clamp(0.0, self.phenotype.max_energy);
    }

    pub fn clear_mate(&mut self) {
        self.mate_id = None;
        self.mating_buildup = 0;
        self.mate_out_of_range = 0;
    }

    pub fn kill(&mut self, cause: DeathCause) {
        if !self.is_dead {
            self.is_dead = true;
            self.death_cause = Some(cause);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::profile::builtin_profiles;
    use crate::simulation::rng::EngineRng;

    fn prey_species() -> SpeciesConfig {
        builtin_profiles()[0].species["starling"].clone()
    }

    #[test]
    fn trail_evicts_oldest() {
        let mut trail = Trail::new(3);
        trail.push(1.0, 0.0);
        trail.push(2.0, 0.0);
        trail.push(3.0, 0.0);
        trail.push(4.0, 0.0);
        let xs: Vec<f32> = trail.iter().map(|(x, _)| x).collect();
        assert_eq!(xs, vec![2.0, 3.0, 4.0]);
        assert_eq!(trail.len(), 3);
    }

    #[test]
    fn zero_capacity_trail_ignores_pushes() {
        let mut trail = Trail::new(0);
        trail.push(1.0, 1.0);
        assert!(trail.is_empty());
    }

    #[test]
    fn spawn_respects_species_bounds() {
        let species = prey_species();
        let mut rng = EngineRng::new(9);
        let agent = Agent::new(1, &species, 10.0, 20.0, Stance::Flocking, &mut rng.spawn);
        assert_eq!(agent.type_id, "starling");
        assert!(agent.speed() <= species.movement.max_speed);
        assert!(agent.energy <= species.lifecycle.max_energy);
        assert!(agent.phenotype.collision_radius <= MAX_COLLISION_RADIUS);
        assert!(!agent.is_dead);
    }

    #[test]
    fn set_stance_records_entry_frame_once() {
        let species = prey_species();
        let mut rng = EngineRng::new(9);
        let mut agent = Agent::new(1, &species, 0.0, 0.0, Stance::Flocking, &mut rng.spawn);
        agent.set_stance(Stance::Fleeing, 7);
        assert_eq!(agent.stance_entered_frame, 7);
        agent.set_stance(Stance::Fleeing, 9);
        assert_eq!(agent.stance_entered_frame, 7);
    }

    #[test]
    fn kill_keeps_first_cause() {
        let species = prey_species();
        let mut rng = EngineRng::new(9);
        let mut agent = Agent::new(1, &species, 0.0, 0.0, Stance::Flocking, &mut rng.spawn);
        agent.kill(DeathCause::Starvation);
        agent.kill(DeathCause::Predation);
        assert_eq!(agent.death_cause, Some(DeathCause::Starvation));
    }
}
