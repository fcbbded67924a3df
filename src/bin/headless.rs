use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use log::info;

use wildflock::{builtin_profiles, Event, Profile, Simulation};

/// Run the simulation without a renderer and report what happened.
#[derive(Parser, Debug)]
#[command(name = "wildflock-headless", version, about)]
struct Args {
    /// Path to a JSON profile; defaults to the built-in grassland profile.
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Id of a built-in profile to run when no --profile file is given.
    #[arg(long, default_value = "grassland")]
    builtin: String,

    /// Override the profile's random seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Number of fixed simulation ticks to run.
    #[arg(long, default_value_t = 3000)]
    ticks: u64,

    /// Sleep between frames so the run tracks wall time instead of
    /// finishing as fast as possible.
    #[arg(long, default_value_t = false)]
    realtime: bool,

    /// Print a snapshot summary every N ticks (0 disables).
    #[arg(long, default_value_t = 300)]
    report_every: u64,
}

fn load_profile(args: &Args) -> Result<Profile, String> {
    let mut profile = match &args.profile {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
            Profile::from_json(&json).map_err(|e| e.to_string())?
        }
        None => builtin_profiles()
            .into_iter()
            .find(|p| p.id == args.builtin)
            .ok_or_else(|| format!("no built-in profile `{}`", args.builtin))?,
    };
    if let Some(seed) = args.seed {
        profile.random_seed = seed;
    }
    Ok(profile)
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let profile = match load_profile(&args) {
        Ok(p) => p,
        Err(message) => {
            eprintln!("{message}");
            std::process::exit(1);
        }
    };
    info!(
        "running profile `{}` for {} ticks (seed {})",
        profile.id, args.ticks, profile.random_seed
    );

    let mut sim = match Simulation::new(profile) {
        Ok(s) => s,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    let frame_ms = 1000.0 / 30.0;
    let mut births = 0u64;
    let mut deaths = 0u64;
    let mut catches = 0u64;
    let started = Instant::now();

    while sim.snapshot().frame < args.ticks {
        sim.advance_ms(frame_ms);
        for event in sim.drain_events() {
            match event {
                Event::Reproduced { .. } => births += 1,
                Event::Died { .. } => deaths += 1,
                Event::Caught { .. } => catches += 1,
                _ => {}
            }
        }
        let frame = sim.snapshot().frame;
        if args.report_every > 0 && frame % args.report_every == 0 {
            let snapshot = sim.snapshot();
            println!(
                "tick {:>6}  prey {:>5}  predators {:>4}  food {:>3}  markers {:>3}  mean energy {:>6.1}",
                snapshot.frame,
                snapshot.stats.prey,
                snapshot.stats.predators,
                snapshot.food.len(),
                snapshot.death_markers.len(),
                snapshot.stats.mean_energy,
            );
        }
        if args.realtime {
            std::thread::sleep(std::time::Duration::from_millis(frame_ms as u64));
        }
    }

    let snapshot = sim.snapshot();
    println!(
        "done: {} ticks in {:.2}s — {} agents alive, {} births, {} deaths ({} by catch)",
        snapshot.frame,
        started.elapsed().as_secs_f64(),
        snapshot.agents.len(),
        births,
        deaths,
        catches,
    );
}
