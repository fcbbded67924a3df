use std::sync::atomic::{AtomicU32, AtomicU8, AtomicUsize, Ordering};

use serde::Serialize;

use crate::simulation::agent::{Agent, Stance};
use crate::simulation::lifecycle::{DeathMarker, FoodSource, Obstacle};

/// Read-only per-agent view at a tick boundary.
#[derive(Debug, Clone, Serialize)]
pub struct AgentView {
    pub id: u32,
    pub type_id: String,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub stance: Stance,
    pub energy: f32,
    pub health: f32,
    pub age: f32,
    pub mate_id: Option<u32>,
    pub stance_entered_frame: u64,
}

impl AgentView {
    pub fn from_agent(agent: &Agent) -> Self {
        Self {
            id: agent.id,
            type_id: agent.type_id.clone(),
            x: agent.x,
            y: agent.y,
            vx: agent.vx,
            vy: agent.vy,
            stance: agent.stance,
            energy: agent.energy,
            health: agent.health,
            age: agent.age,
            mate_id: agent.mate_id,
            stance_entered_frame: agent.stance_entered_frame,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PopulationStats {
    pub prey: usize,
    pub predators: usize,
    pub mean_energy: f32,
    pub mean_age: f32,
}

/// Authoritative state as seen by external consumers. Built once per request
/// at a tick boundary; never aliases engine memory.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub frame: u64,
    pub simulated_elapsed_ms: f64,
    pub paused: bool,
    pub time_scale: f32,
    pub agents: Vec<AgentView>,
    pub obstacles: Vec<Obstacle>,
    pub food: Vec<FoodSource>,
    pub death_markers: Vec<DeathMarker>,
    pub stats: PopulationStats,
}

// ─── Shared publish buffers ───

struct BufferSlot {
    positions: Vec<AtomicU32>,
    velocities: Vec<AtomicU32>,
    stances: Vec<AtomicU8>,
    len: AtomicUsize,
}

impl BufferSlot {
    fn new(capacity: usize) -> Self {
        Self {
            positions: (0..capacity * 2).map(|_| AtomicU32::new(0)).collect(),
            velocities: (0..capacity * 2).map(|_| AtomicU32::new(0)).collect(),
            stances: (0..capacity).map(|_| AtomicU8::new(0)).collect(),
            len: AtomicUsize::new(0),
        }
    }
}

/// Double-buffered position/velocity/stance arrays for an off-thread
/// reader. The writer fills the inactive slot and publishes it with a single
/// release store of the index; readers acquire-load the index and must
/// tolerate a swap between two reads. Readers never write.
pub struct SharedBuffers {
    slots: [BufferSlot; 2],
    active: AtomicUsize,
    capacity: usize,
}

impl SharedBuffers {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: [BufferSlot::new(capacity), BufferSlot::new(capacity)],
            active: AtomicUsize::new(0),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn active_index(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Write the current agent set into the inactive slot and swap.
    /// Agents beyond the buffer capacity are dropped from the published
    /// view, never reallocated.
    pub fn publish(&self, agents: &[Agent]) {
        let inactive = 1 - self.active.load(Ordering::Acquire);
        let slot = &self.slots[inactive];
        let count = agents.len().min(self.capacity);
        for (i, agent) in agents.iter().take(count).enumerate() {
            slot.positions[i * 2].store(agent.x.to_bits(), Ordering::Relaxed);
            slot.positions[i * 2 + 1].store(agent.y.to_bits(), Ordering::Relaxed);
            slot.velocities[i * 2].store(agent.vx.to_bits(), Ordering::Relaxed);
            slot.velocities[i * 2 + 1].store(agent.vy.to_bits(), Ordering::Relaxed);
            slot.stances[i].store(agent.stance.as_u8(), Ordering::Relaxed);
        }
        slot.len.store(count, Ordering::Relaxed);
        self.active.store(inactive, Ordering::Release);
    }

    /// Read the published positions into `out` as (x, y) pairs.
    pub fn read_positions(&self, out: &mut Vec<(f32, f32)>) {
        let slot = &self.slots[self.active.load(Ordering::Acquire)];
        let len = slot.len.load(Ordering::Relaxed).min(self.capacity);
        out.clear();
        for i in 0..len {
            let x = f32::from_bits(slot.positions[i * 2].load(Ordering::Relaxed));
            let y = f32::from_bits(slot.positions[i * 2 + 1].load(Ordering::Relaxed));
            out.push((x, y));
        }
    }

    pub fn read_stances(&self, out: &mut Vec<u8>) {
        let slot = &self.slots[self.active.load(Ordering::Acquire)];
        let len = slot.len.load(Ordering::Relaxed).min(self.capacity);
        out.clear();
        for i in 0..len {
            out.push(slot.stances[i].load(Ordering::Relaxed));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::profile::builtin_profiles;
    use crate::simulation::rng::EngineRng;

    fn agents(n: u32) -> Vec<Agent> {
        let species = builtin_profiles()[0].species["starling"].clone();
        let mut rng = EngineRng::new(5);
        (0..n)
            .map(|i| {
                Agent::new(
                    i + 1,
                    &species,
                    i as f32 * 10.0,
                    i as f32 * 20.0,
                    Stance::Flocking,
                    &mut rng.spawn,
                )
            })
            .collect()
    }

    #[test]
    fn publish_swaps_the_active_slot() {
        let buffers = SharedBuffers::new(8);
        let first = buffers.active_index();
        buffers.publish(&agents(3));
        assert_ne!(buffers.active_index(), first);
        buffers.publish(&agents(3));
        assert_eq!(buffers.active_index(), first);
    }

    #[test]
    fn published_positions_round_trip() {
        let buffers = SharedBuffers::new(8);
        buffers.publish(&agents(3));
        let mut out = Vec::new();
        buffers.read_positions(&mut out);
        assert_eq!(out.len(), 3);
        assert_eq!(out[1], (10.0, 20.0));
        let mut stances = Vec::new();
        buffers.read_stances(&mut stances);
        assert_eq!(stances, vec![0, 0, 0]);
    }

    #[test]
    fn overflow_is_truncated_not_grown() {
        let buffers = SharedBuffers::new(2);
        buffers.publish(&agents(5));
        let mut out = Vec::new();
        buffers.read_positions(&mut out);
        assert_eq!(out.len(), 2);
    }
}
