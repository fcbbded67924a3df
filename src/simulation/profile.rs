use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Fatal load-time failures. A profile that fails validation is never
/// installed; the engine keeps its previous state.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("profile parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("world dimensions must be positive, got {width}x{height}")]
    InvalidWorld { width: f32, height: f32 },
    #[error("profile `{0}` has an empty species table")]
    EmptySpecies(String),
    #[error("species key `{key}` does not match its config id `{id}`")]
    SpeciesKeyMismatch { key: String, id: String },
    #[error("species `{species}`: {message}")]
    InvalidSpecies { species: String, message: String },
    #[error("parameter `{name}`: {message}")]
    InvalidParameter { name: &'static str, message: String },
    #[error("profile `{0}` has no species for the initial population role")]
    MissingRole(String),
    #[error("unknown profile id `{0}`")]
    UnknownProfile(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Predator,
    Prey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReproductionKind {
    Sexual,
    Asexual,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementConfig {
    #[serde(default)]
    pub min_distance: Option<f32>,
    pub separation_weight: f32,
    pub alignment_weight: f32,
    pub cohesion_weight: f32,
    pub max_speed: f32,
    pub max_force: f32,
    pub trail_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeciesLifecycle {
    pub max_energy: f32,
    pub energy_gain_rate: f32,
    pub energy_loss_rate: f32,
    /// Seconds of simulated time; zero disables old-age death.
    pub max_age: f32,
    pub fear_factor: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReproductionConfig {
    #[serde(rename = "type")]
    pub kind: ReproductionKind,
    pub offspring_count: u32,
    pub offspring_energy_bonus: f32,
    #[serde(default)]
    pub cooldown_ticks: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeciesLimits {
    #[serde(default)]
    pub max_population: Option<u32>,
    #[serde(default)]
    pub fear_radius: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeciesConfig {
    pub id: String,
    pub name: String,
    pub color: String,
    pub role: Role,
    pub movement: MovementConfig,
    pub lifecycle: SpeciesLifecycle,
    pub reproduction: ReproductionConfig,
    #[serde(default)]
    pub limits: SpeciesLimits,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldConfig {
    pub width: f32,
    pub height: f32,
    pub initial_prey_count: u32,
    #[serde(default)]
    pub initial_predator_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameters {
    pub perception_radius: f32,
    pub obstacle_avoidance_weight: f32,
    pub fear_radius: f32,
    pub chase_radius: f32,
    pub catch_radius: f32,
    pub mate_radius: f32,
    pub min_distance: f32,
    pub max_boids: u32,
    pub max_prey_boids: u32,
    pub max_predator_boids: u32,
    /// Seconds of simulated age before an agent may seek a mate.
    pub min_reproduction_age: f32,
    /// Fraction of max energy required to seek a mate.
    pub reproduction_energy_threshold: f32,
    pub reproduction_cooldown_ticks: u32,
    pub mating_buildup_ticks: u32,
    pub eating_cooldown_ticks: u32,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            perception_radius: 60.0,
            obstacle_avoidance_weight: 2.5,
            fear_radius: 80.0,
            chase_radius: 120.0,
            catch_radius: 12.0,
            mate_radius: 25.0,
            min_distance: 20.0,
            max_boids: 1500,
            max_prey_boids: 1200,
            max_predator_boids: 200,
            min_reproduction_age: 10.0,
            reproduction_energy_threshold: 0.6,
            reproduction_cooldown_ticks: 300,
            mating_buildup_ticks: 45,
            eating_cooldown_ticks: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub description: String,
    pub random_seed: u64,
    pub world: WorldConfig,
    pub species: HashMap<String, SpeciesConfig>,
    pub parameters: Parameters,
}

impl Profile {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let profile: Profile = serde_json::from_str(json)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn species(&self, type_id: &str) -> Option<&SpeciesConfig> {
        self.species.get(type_id)
    }

    /// Species ids in a stable order; all spawn-time iteration over the
    /// species table goes through this so runs replay identically.
    pub fn species_ids_sorted(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.species.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn species_ids_with_role(&self, role: Role) -> Vec<String> {
        self.species_ids_sorted()
            .into_iter()
            .filter(|id| self.species[id].role == role)
            .collect()
    }

    /// Cell size for the spatial grid: the largest query radius, clamped
    /// below by the largest plausible collision footprint.
    pub fn grid_cell_size(&self) -> f32 {
        let p = &self.parameters;
        let mut size = p
            .perception_radius
            .max(p.chase_radius)
            .max(p.mate_radius)
            .max(p.fear_radius);
        for species in self.species.values() {
            if let Some(fear) = species.limits.fear_radius {
                size = size.max(fear);
            }
        }
        size.max(crate::simulation::agent::MAX_COLLISION_RADIUS)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let world = &self.world;
        if world.width <= 0.0 || world.height <= 0.0 {
            return Err(ConfigError::InvalidWorld {
                width: world.width,
                height: world.height,
            });
        }
        if self.species.is_empty() {
            return Err(ConfigError::EmptySpecies(self.id.clone()));
        }
        for (key, species) in &self.species {
            if *key != species.id {
                return Err(ConfigError::SpeciesKeyMismatch {
                    key: key.clone(),
                    id: species.id.clone(),
                });
            }
            species.validate()?;
        }
        if world.initial_prey_count > 0
            && !self.species.values().any(|s| s.role == Role::Prey)
        {
            return Err(ConfigError::MissingRole(self.id.clone()));
        }
        if world.initial_predator_count > 0
            && !self.species.values().any(|s| s.role == Role::Predator)
        {
            return Err(ConfigError::MissingRole(self.id.clone()));
        }
        self.parameters.validate()
    }
}

impl SpeciesConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidSpecies {
            species: self.id.clone(),
            message,
        };
        if self.movement.max_speed <= 0.0 {
            return Err(invalid(format!(
                "maxSpeed must be positive, got {}",
                self.movement.max_speed
            )));
        }
        if self.movement.max_force <= 0.0 {
            return Err(invalid(format!(
                "maxForce must be positive, got {}",
                self.movement.max_force
            )));
        }
        if self.lifecycle.max_energy <= 0.0 {
            return Err(invalid(format!(
                "maxEnergy must be positive, got {}",
                self.lifecycle.max_energy
            )));
        }
        if self.lifecycle.max_age < 0.0 {
            return Err(invalid(format!(
                "maxAge must be non-negative, got {}",
                self.lifecycle.max_age
            )));
        }
        if !(1..=2).contains(&self.reproduction.offspring_count) {
            return Err(invalid(format!(
                "offspringCount must be 1 or 2, got {}",
                self.reproduction.offspring_count
            )));
        }
        if self.reproduction.offspring_energy_bonus <= 0.0 {
            return Err(invalid(format!(
                "offspringEnergyBonus must be positive, got {}",
                self.reproduction.offspring_energy_bonus
            )));
        }
        Ok(())
    }
}

impl Parameters {
    fn validate(&self) -> Result<(), ConfigError> {
        fn positive(name: &'static str, value: f32) -> Result<(), ConfigError> {
            if value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::InvalidParameter {
                    name,
                    message: format!("must be positive, got {value}"),
                })
            }
        }
        positive("perceptionRadius", self.perception_radius)?;
        positive("fearRadius", self.fear_radius)?;
        positive("chaseRadius", self.chase_radius)?;
        positive("catchRadius", self.catch_radius)?;
        positive("mateRadius", self.mate_radius)?;
        positive("minDistance", self.min_distance)?;
        if self.max_boids == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "maxBoids",
                message: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.reproduction_energy_threshold) {
            return Err(ConfigError::InvalidParameter {
                name: "reproductionEnergyThreshold",
                message: format!(
                    "must be within [0, 1], got {}",
                    self.reproduction_energy_threshold
                ),
            });
        }
        if self.mating_buildup_ticks == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "matingBuildupTicks",
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

// ─── Built-in profiles ───

fn starling() -> SpeciesConfig {
    SpeciesConfig {
        id: "starling".to_string(),
        name: "Starling".to_string(),
        color: "#7fb2d9".to_string(),
        role: Role::Prey,
        movement: MovementConfig {
            min_distance: None,
            separation_weight: 1.5,
            alignment_weight: 1.0,
            cohesion_weight: 1.0,
            max_speed: 120.0,
            max_force: 240.0,
            trail_length: 16,
        },
        lifecycle: SpeciesLifecycle {
            max_energy: 100.0,
            energy_gain_rate: 4.0,
            energy_loss_rate: 0.0,
            max_age: 240.0,
            fear_factor: 2.0,
        },
        reproduction: ReproductionConfig {
            kind: ReproductionKind::Sexual,
            offspring_count: 2,
            offspring_energy_bonus: 1.2,
            cooldown_ticks: None,
        },
        limits: SpeciesLimits::default(),
    }
}

fn falcon() -> SpeciesConfig {
    SpeciesConfig {
        id: "falcon".to_string(),
        name: "Falcon".to_string(),
        color: "#c25b4a".to_string(),
        role: Role::Predator,
        movement: MovementConfig {
            min_distance: Some(35.0),
            separation_weight: 1.2,
            alignment_weight: 0.4,
            cohesion_weight: 0.3,
            max_speed: 160.0,
            max_force: 300.0,
            trail_length: 24,
        },
        lifecycle: SpeciesLifecycle {
            max_energy: 150.0,
            energy_gain_rate: 40.0,
            energy_loss_rate: 2.5,
            max_age: 360.0,
            fear_factor: 0.0,
        },
        reproduction: ReproductionConfig {
            kind: ReproductionKind::Asexual,
            offspring_count: 1,
            offspring_energy_bonus: 1.0,
            cooldown_ticks: Some(600),
        },
        limits: SpeciesLimits {
            max_population: Some(60),
            fear_radius: None,
        },
    }
}

/// The profiles shipped with the engine; external loaders may add more.
pub fn builtin_profiles() -> Vec<Profile> {
    let mut grassland_species = HashMap::new();
    grassland_species.insert("starling".to_string(), starling());
    grassland_species.insert("falcon".to_string(), falcon());

    let mut ridge_species = HashMap::new();
    ridge_species.insert("starling".to_string(), starling());
    let mut ridge_falcon = falcon();
    ridge_falcon.lifecycle.energy_loss_rate = 1.5;
    ridge_species.insert("falcon".to_string(), ridge_falcon);

    vec![
        Profile {
            id: "grassland".to_string(),
            name: "Grassland".to_string(),
            description: "A balanced flock of starlings with a few falcons overhead".to_string(),
            random_seed: 0x5eed_0001,
            world: WorldConfig {
                width: 1600.0,
                height: 1000.0,
                initial_prey_count: 220,
                initial_predator_count: 6,
            },
            species: grassland_species,
            parameters: Parameters::default(),
        },
        Profile {
            id: "falcon-ridge".to_string(),
            name: "Falcon Ridge".to_string(),
            description: "Predator-heavy cliffs where the flock lives dangerously".to_string(),
            random_seed: 0x5eed_0002,
            world: WorldConfig {
                width: 1200.0,
                height: 900.0,
                initial_prey_count: 120,
                initial_predator_count: 18,
            },
            species: ridge_species,
            parameters: Parameters {
                fear_radius: 110.0,
                chase_radius: 160.0,
                ..Parameters::default()
            },
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_profiles_validate() {
        for profile in builtin_profiles() {
            profile.validate().expect("builtin profile must be valid");
        }
    }

    #[test]
    fn json_round_trip() {
        let profile = &builtin_profiles()[0];
        let json = serde_json::to_string(profile).unwrap();
        let back = Profile::from_json(&json).unwrap();
        assert_eq!(back.id, profile.id);
        assert_eq!(back.species.len(), profile.species.len());
        assert_eq!(back.parameters.catch_radius, profile.parameters.catch_radius);
    }

    #[test]
    fn rejects_zero_world() {
        let mut profile = builtin_profiles()[0].clone();
        profile.world.width = 0.0;
        assert!(matches!(
            profile.validate(),
            Err(ConfigError::InvalidWorld { .. })
        ));
    }

    #[test]
    fn rejects_mismatched_species_key() {
        let mut profile = builtin_profiles()[0].clone();
        let species = profile.species.remove("starling").unwrap();
        profile.species.insert("sparrow".to_string(), species);
        assert!(matches!(
            profile.validate(),
            Err(ConfigError::SpeciesKeyMismatch { .. })
        ));
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let mut profile = builtin_profiles()[0].clone();
        profile.parameters.reproduction_energy_threshold = 1.5;
        assert!(matches!(
            profile.validate(),
            Err(ConfigError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn malformed_profile_json_is_rejected() {
        let err = Profile::from_json("{\"id\": 3}").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn species_ids_sorted_is_stable() {
        let profile = &builtin_profiles()[0];
        assert_eq!(profile.species_ids_sorted(), vec!["falcon", "starling"]);
        assert_eq!(profile.species_ids_with_role(Role::Prey), vec!["starling"]);
    }
}
