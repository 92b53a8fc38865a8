//! Cinder Particles - fountain simulation state
//!
//! This crate owns everything that does not need a GPU handle:
//! - The 48-byte `Particle` record shared verbatim with the WGSL kernels
//! - Deterministic per-slot velocity sampling (mirrored in WGSL)
//! - The host-side per-particle update rule: bounds check, throttled
//!   emission, integration — the reference the compute engine must match

pub mod particle;
pub mod sampling;
pub mod sim;

pub use particle::Particle;
pub use sampling::VelocityEnvelope;
pub use sim::{spawn_collection, step, SimParams};
