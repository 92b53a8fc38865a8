//! The particle record, laid out exactly as the GPU sees it

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

/// One particle — matches the WGSL `Particle` struct.
/// 48 bytes, 16-byte aligned rows: position and velocity are padded out to
/// vec4 so the storage-buffer layout and the vertex layout agree, and the
/// active flag is a `u32` because vertex attributes cannot carry booleans.
/// The three tail words are padding only.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Particle {
    /// xy = position in normalized device coordinates, zw unused (zero)
    pub position: [f32; 4],
    /// xy = velocity in NDC units per second, zw unused (zero)
    pub velocity: [f32; 4],
    /// 1 = participates in emission/movement, 0 = parked at the emitter
    pub active: u32,
    pub _pad: [u32; 3],
}

impl Particle {
    /// Byte stride of one record in the shared buffer
    pub const STRIDE: u64 = std::mem::size_of::<Particle>() as u64;
    /// Attribute offsets, derived from the declared layout rather than
    /// hard-coded so the vertex bindings can never drift from the struct.
    pub const POSITION_OFFSET: u64 = std::mem::offset_of!(Particle, position) as u64;
    pub const VELOCITY_OFFSET: u64 = std::mem::offset_of!(Particle, velocity) as u64;
    pub const ACTIVE_OFFSET: u64 = std::mem::offset_of!(Particle, active) as u64;

    /// An inactive particle parked at `position` with the given velocity
    pub fn at_rest(position: Vec2, velocity: Vec2) -> Self {
        Self {
            position: [position.x, position.y, 0.0, 0.0],
            velocity: [velocity.x, velocity.y, 0.0, 0.0],
            active: 0,
            _pad: [0; 3],
        }
    }

    pub fn position_xy(&self) -> Vec2 {
        Vec2::new(self.position[0], self.position[1])
    }

    pub fn velocity_xy(&self) -> Vec2 {
        Vec2::new(self.velocity[0], self.velocity[1])
    }

    pub fn is_active(&self) -> bool {
        self.active != 0
    }
}
