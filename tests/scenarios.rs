//! End-to-end scenario runs: small hand-built worlds driven through the
//! public pipeline, checking the observable outcomes.

use std::collections::HashMap;

use wildflock::simulation::scheduler::{SchedulerConfig, UpdateLoop};
use wildflock::{builtin_profiles, DeathCause, Engine, Event, Profile, Simulation, Stance};

const FRAME_MS: f64 = 1000.0 / 30.0;

fn base_profile(seed: u64) -> Profile {
    let mut profile = builtin_profiles()[0].clone();
    profile.random_seed = seed;
    profile.world.width = 1000.0;
    profile.world.height = 1000.0;
    profile.world.initial_prey_count = 0;
    profile.world.initial_predator_count = 0;
    profile
}

fn agent_index(engine: &Engine, id: u32) -> usize {
    engine.agents.iter().position(|a| a.id == id).unwrap()
}

// Scenario 1: a tick over an empty world is a no-op.
#[test]
fn empty_world_ticks_do_nothing() {
    let mut sim = Simulation::new(base_profile(1)).unwrap();
    for _ in 0..10 {
        sim.advance_ms(FRAME_MS);
    }
    assert!(sim.drain_events().is_empty());
    let snapshot = sim.snapshot();
    assert_eq!(snapshot.frame, 10);
    assert!((snapshot.simulated_elapsed_ms - 333.3).abs() < 0.5);
    assert!(snapshot.agents.is_empty());
}

// Scenario 2: a lone prey ages out.
#[test]
fn lone_prey_dies_of_old_age() {
    let mut profile = base_profile(2);
    {
        let starling = profile.species.get_mut("starling").unwrap();
        starling.lifecycle.max_age = 5.0;
        starling.lifecycle.energy_gain_rate = 10.0;
        starling.lifecycle.max_energy = 60.0;
    }
    let mut engine = Engine::new(profile).unwrap();
    let id = engine.spawn_agent("starling", 500.0, 500.0, Some(10.0)).unwrap();
    {
        let idx = agent_index(&engine, id);
        engine.agents[idx].vx = 0.0;
        engine.agents[idx].vy = 0.0;
    }

    let mut update_loop = UpdateLoop::new(SchedulerConfig::default());
    let mut events = Vec::new();
    // Six simulated seconds at 30 Hz.
    for _ in 0..185 {
        events.extend(update_loop.advance(&mut engine, FRAME_MS));
    }

    let deaths: Vec<&Event> = events
        .iter()
        .filter(|e| matches!(e, Event::Died { .. }))
        .collect();
    assert_eq!(deaths.len(), 1);
    match deaths[0] {
        Event::Died { boid_id, reason, .. } => {
            assert_eq!(*boid_id, id);
            assert_eq!(*reason, DeathCause::OldAge);
        }
        _ => unreachable!(),
    }
    assert!(
        !events.iter().any(|e| matches!(e, Event::Reproduced { .. })),
        "a lone prey cannot reproduce"
    );
    assert!(engine.snapshot().agents.is_empty());
}

// Scenario 3: a hunting predator catches adjacent prey in one pass.
#[test]
fn predator_catches_nearby_prey() {
    let mut profile = base_profile(3);
    profile.parameters.catch_radius = 15.0;
    let gain = profile.species("falcon").unwrap().lifecycle.energy_gain_rate;
    let mut engine = Engine::new(profile).unwrap();
    let predator = engine.spawn_agent("falcon", 500.0, 500.0, None).unwrap();
    let prey = engine.spawn_agent("starling", 510.0, 500.0, None).unwrap();
    let predator_energy = engine.agents[agent_index(&engine, predator)].energy;
    assert_eq!(
        engine.agents[agent_index(&engine, predator)].stance,
        Stance::Hunting
    );

    let mut events = Vec::new();
    engine.catch_pass(&mut events);

    let mut saw_catch = false;
    let mut saw_food = false;
    for event in &events {
        match event {
            Event::Caught {
                predator_id,
                prey_id,
                ..
            } => {
                saw_catch = true;
                assert_eq!(*predator_id, predator);
                assert_eq!(*prey_id, prey);
            }
            Event::FoodSourceCreated { food } => {
                saw_food = true;
                assert_eq!(food.kind, wildflock::FoodKind::Predator);
                assert!((food.x - 510.0).abs() < 1.0 && (food.y - 500.0).abs() < 1.0);
            }
            _ => {}
        }
    }
    assert!(saw_catch && saw_food);
    let after = engine.agents[agent_index(&engine, predator)].energy;
    assert!((after - (predator_energy + gain)).abs() < 0.001);
    assert_eq!(engine.snapshot().agents.len(), 1);
}

// Scenario 4: two eligible prey court, mate, and produce offspring.
#[test]
fn sexual_reproduction_produces_offspring_at_the_midpoint() {
    let mut profile = base_profile(4);
    profile.parameters.mate_radius = 20.0;
    profile.parameters.mating_buildup_ticks = 5;
    profile.parameters.min_reproduction_age = 10.0;
    let offspring_count = profile
        .species("starling")
        .unwrap()
        .reproduction
        .offspring_count;
    let mut engine = Engine::new(profile).unwrap();
    let a = engine.spawn_agent("starling", 100.0, 100.0, None).unwrap();
    let b = engine.spawn_agent("starling", 110.0, 100.0, None).unwrap();
    for id in [a, b] {
        let idx = agent_index(&engine, id);
        let agent = &mut engine.agents[idx];
        agent.age = 20.0;
        agent.energy = agent.phenotype.max_energy * 0.9;
        agent.vx = 0.0;
        agent.vy = 0.0;
    }
    let energy_before: HashMap<u32, f32> = engine
        .agents
        .iter()
        .map(|agent| (agent.id, agent.energy))
        .collect();

    let mut events = Vec::new();
    for _ in 0..6 {
        engine.fixed_step(FRAME_MS, &mut events);
    }

    let reproductions: Vec<&Event> = events
        .iter()
        .filter(|e| matches!(e, Event::Reproduced { .. }))
        .collect();
    assert_eq!(reproductions.len(), 1);
    match reproductions[0] {
        Event::Reproduced {
            parent_id,
            parent2_id,
            offspring_count: spawned,
            ..
        } => {
            assert_eq!(*parent_id, a);
            assert_eq!(*parent2_id, Some(b));
            assert_eq!(*spawned, offspring_count);
        }
        _ => unreachable!(),
    }

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.agents.len(), 2 + offspring_count as usize);
    let child = snapshot.agents.iter().find(|v| v.id != a && v.id != b).unwrap();
    assert!((child.x - 105.0).abs() < 15.0 && (child.y - 100.0).abs() < 15.0);
    assert!(child.energy > 0.0);

    for id in [a, b] {
        let idx = agent_index(&engine, id);
        let agent = &engine.agents[idx];
        assert!(agent.energy < energy_before[&id], "parents pay for offspring");
        assert!(agent.reproduction_cooldown > 0);
        assert_eq!(agent.mate_id, None);
    }
}

// Scenario 5: steering keeps a moving prey out of an obstacle.
#[test]
fn obstacle_is_never_penetrated() {
    let mut profile = base_profile(5);
    profile.world.width = 1000.0;
    profile.world.height = 1000.0;
    let mut engine = Engine::new(profile).unwrap();
    let id = engine.spawn_agent("starling", 200.0, 200.0, None).unwrap();
    {
        let idx = agent_index(&engine, id);
        engine.agents[idx].vx = 60.0;
        engine.agents[idx].vy = 0.0;
    }
    engine.add_obstacle(250.0, 200.0, 30.0);

    let mut events = Vec::new();
    for _ in 0..120 {
        engine.fixed_step(FRAME_MS, &mut events);
        let idx = agent_index(&engine, id);
        let agent = &engine.agents[idx];
        let dx = agent.x - 250.0;
        let dy = agent.y - 200.0;
        let dist = (dx * dx + dy * dy).sqrt();
        assert!(
            dist >= 30.0 - 0.5,
            "agent entered the obstacle: dist {dist:.2}"
        );
    }
}

// Scenario 6: switching profiles atomically resets the world.
#[test]
fn profile_switch_resets_everything() {
    let mut profile_a = base_profile(6);
    profile_a.world.initial_prey_count = 100;

    let mut profile_b = base_profile(60);
    profile_b.id = "predators-only".to_string();
    profile_b.name = "Predators Only".to_string();
    profile_b.world.initial_prey_count = 0;
    profile_b.world.initial_predator_count = 10;

    let mut sim = Simulation::new(profile_a).unwrap();
    sim.register_profile(profile_b).unwrap();

    for _ in 0..100 {
        sim.advance_ms(FRAME_MS);
    }
    sim.add_obstacle(500.0, 500.0, 25.0);
    assert!(sim.snapshot().frame >= 100);

    sim.load_profile("predators-only");
    let snapshot = sim.snapshot();
    assert_eq!(snapshot.agents.len(), 10);
    assert_eq!(snapshot.stats.predators, 10);
    assert_eq!(snapshot.stats.prey, 0);
    assert_eq!(snapshot.frame, 0);
    assert_eq!(snapshot.simulated_elapsed_ms, 0.0);
    assert!(snapshot.obstacles.is_empty());
    assert!(snapshot.food.is_empty());
    assert!(snapshot.death_markers.is_empty());
    assert!(sim.drain_errors().is_empty());
}

// Boundary: an agent at the right edge with positive vx wraps, not clamps.
#[test]
fn toroidal_wrap_at_the_world_edge() {
    let profile = base_profile(7);
    let width = profile.world.width;
    let mut engine = Engine::new(profile).unwrap();
    let id = engine.spawn_agent("starling", width - 0.1, 500.0, None).unwrap();
    {
        let idx = agent_index(&engine, id);
        engine.agents[idx].vx = 60.0;
        engine.agents[idx].vy = 0.0;
    }
    let mut events = Vec::new();
    engine.fixed_step(FRAME_MS, &mut events);
    let agent = &engine.agents[agent_index(&engine, id)];
    assert!(
        agent.x >= 0.0 && agent.x < 10.0,
        "expected wrap to a small positive x, got {}",
        agent.x
    );
}

// Prey food appears on the spawn interval and prey eat it.
#[test]
fn periodic_food_spawns_and_is_consumed() {
    let mut profile = base_profile(8);
    profile.world.initial_prey_count = 30;
    let mut sim = Simulation::new(profile).unwrap();

    let mut food_created = 0;
    // 20 simulated seconds.
    for _ in 0..600 {
        sim.advance_ms(FRAME_MS);
        for event in sim.drain_events() {
            if let Event::FoodSourceCreated { food } = event {
                if food.kind == wildflock::FoodKind::Prey {
                    food_created += 1;
                }
            }
        }
    }
    assert!(food_created > 0, "plant food must spawn periodically");
}

// Predators starve without prey and leave death markers behind.
#[test]
fn starving_predators_die_and_mark_the_ground() {
    let mut profile = base_profile(9);
    profile.world.initial_predator_count = 5;
    profile
        .species
        .get_mut("falcon")
        .unwrap()
        .lifecycle
        .energy_loss_rate = 20.0;
    let mut sim = Simulation::new(profile).unwrap();

    let mut starvation_deaths = 0;
    for _ in 0..300 {
        sim.advance_ms(FRAME_MS);
        for event in sim.drain_events() {
            if let Event::Died {
                reason: DeathCause::Starvation,
                type_id,
                ..
            } = event
            {
                assert_eq!(type_id, "falcon");
                starvation_deaths += 1;
            }
        }
    }
    assert_eq!(starvation_deaths, 5);
    let snapshot = sim.snapshot();
    assert!(snapshot.agents.is_empty());
    assert!(!snapshot.death_markers.is_empty());
}
