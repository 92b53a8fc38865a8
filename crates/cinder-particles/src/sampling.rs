//! Deterministic velocity sampling — no external crate needed
//!
//! Every reset draws a velocity from `sample_velocity(seed, slot, frame)`.
//! The draw is a pure function of its counters, so the host loop and the
//! WGSL update kernel (which mirrors these functions operation for
//! operation) produce the same sequence of resets for the same seed.

use glam::Vec2;
use std::f32::consts::TAU;

/// Minimum speed and spread of the speeds handed to freshly reset particles
#[derive(Copy, Clone, Debug)]
pub struct VelocityEnvelope {
    pub min_speed: f32,
    /// max − min; only the delta is retained
    pub speed_delta: f32,
}

impl VelocityEnvelope {
    pub fn new(min_speed: f32, max_speed: f32) -> Self {
        Self {
            min_speed,
            speed_delta: max_speed - min_speed,
        }
    }
}

/// PCG output hash (Jarzynski & Olano, "Hash Functions for GPU Rendering")
pub fn pcg_hash(input: u32) -> u32 {
    let state = input.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(277_803_737);
    (word >> 22) ^ word
}

/// Maps hash bits onto [0, 1) using the top 24 bits
pub fn unorm(bits: u32) -> f32 {
    (bits >> 8) as f32 / 16_777_216.0
}

/// Per-slot, per-frame hash state that seeds a reset draw
fn slot_state(seed: u32, slot: u32, frame: u32) -> u32 {
    pcg_hash(seed ^ pcg_hash(slot) ^ pcg_hash(frame ^ 0x9E37_79B9))
}

/// Draws the outbound velocity for `slot` resetting on `frame`: a random
/// direction and a magnitude uniform within the envelope.
pub fn sample_velocity(seed: u32, slot: u32, frame: u32, envelope: &VelocityEnvelope) -> Vec2 {
    let state = slot_state(seed, slot, frame);
    let angle = unorm(state) * TAU;
    let speed = envelope.min_speed + unorm(pcg_hash(state)) * envelope.speed_delta;
    Vec2::new(angle.cos(), angle.sin()) * speed
}
