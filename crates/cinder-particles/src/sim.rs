//! Host-side particle update — the reference rule set
//!
//! `step` is the authoritative definition of one frame: for every particle,
//! in index order, bounds check → throttled emission → integration. The
//! compute kernels in cinder-render implement the same rules and must keep
//! producing the same collections for the same seed.

use crate::particle::Particle;
use crate::sampling::{sample_velocity, VelocityEnvelope};
use glam::Vec2;

/// Fixed simulation parameters, derived once at init
#[derive(Copy, Clone, Debug)]
pub struct SimParams {
    /// Emitter center in normalized device coordinates
    pub center: Vec2,
    /// Squared bounds radius; the radius itself is never needed again
    pub radius_sqr: f32,
    /// Max inactive → active transitions per update call
    pub emission_cap: u32,
    pub envelope: VelocityEnvelope,
    /// Seed for the deterministic reset draws
    pub seed: u32,
}

impl SimParams {
    pub fn new(
        center: Vec2,
        radius: f32,
        emission_cap: u32,
        min_speed: f32,
        max_speed: f32,
        seed: u32,
    ) -> Self {
        Self {
            center,
            radius_sqr: radius * radius,
            emission_cap,
            envelope: VelocityEnvelope::new(min_speed, max_speed),
            seed,
        }
    }
}

/// Strictly outside the circle; a particle sitting exactly on the rim is
/// still in bounds.
pub fn out_of_bounds(p: &Particle, params: &SimParams) -> bool {
    let offset = p.position_xy() - params.center;
    offset.dot(offset) > params.radius_sqr
}

/// Parks the particle at the center with a fresh outbound velocity.
/// Does not touch the active flag — emission decides that.
pub fn reset_particle(p: &mut Particle, params: &SimParams, slot: u32, frame: u32) {
    let velocity = sample_velocity(params.seed, slot, frame, &params.envelope);
    p.position = [params.center.x, params.center.y, 0.0, 0.0];
    p.velocity = [velocity.x, velocity.y, 0.0, 0.0];
}

/// The whole fixed-size collection: every slot at the center, outbound
/// velocity drawn for frame 0, inactive.
pub fn spawn_collection(count: u32, params: &SimParams) -> Vec<Particle> {
    (0..count)
        .map(|slot| {
            let velocity = sample_velocity(params.seed, slot, 0, &params.envelope);
            Particle::at_rest(params.center, velocity)
        })
        .collect()
}

/// Advances every particle by one frame. Returns how many were emitted.
///
/// The order inside the loop is load-bearing: a particle that exits the
/// bounds is reset here and may be re-emitted and integrated in this same
/// call, taking one step from the center with its fresh velocity.
pub fn step(particles: &mut [Particle], params: &SimParams, frame: u32, dt: f32) -> u32 {
    let mut emitted = 0u32;
    for (slot, p) in particles.iter_mut().enumerate() {
        if out_of_bounds(p, params) {
            p.active = 0;
            reset_particle(p, params, slot as u32, frame);
        }

        if p.active == 0 && emitted < params.emission_cap {
            p.active = 1;
            emitted += 1;
        }

        if p.active != 0 {
            p.position[0] += p.velocity[0] * dt;
            p.position[1] += p.velocity[1] * dt;
        }
    }
    emitted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(count_cap: u32) -> SimParams {
        SimParams::new(Vec2::ZERO, 1.0, count_cap, 0.1, 0.1, 42)
    }

    #[test]
    fn spawn_parks_everything_inactive_at_center() {
        let p = params(5);
        let particles = spawn_collection(16, &p);
        assert_eq!(particles.len(), 16);
        for particle in &particles {
            assert!(!particle.is_active());
            assert_eq!(particle.position_xy(), Vec2::ZERO);
            assert!(particle.velocity_xy().length() > 0.0);
        }
    }

    #[test]
    fn single_particle_zero_dt_emits_in_place() {
        // Init(count=1, cap=1, radius=1, minV=maxV=0.1) then Update(0):
        // emitted immediately, no displacement.
        let p = params(1);
        let mut particles = spawn_collection(1, &p);
        let emitted = step(&mut particles, &p, 1, 0.0);
        assert_eq!(emitted, 1);
        assert!(particles[0].is_active());
        assert_eq!(particles[0].position_xy(), Vec2::ZERO);
    }

    #[test]
    fn emission_respects_cap() {
        let p = params(3);
        let mut particles = spawn_collection(10, &p);
        let emitted = step(&mut particles, &p, 1, 0.01);
        assert_eq!(emitted, 3);
        let active = particles.iter().filter(|q| q.is_active()).count();
        assert_eq!(active, 3);
        // The budget is per call, not cumulative
        let emitted = step(&mut particles, &p, 2, 0.01);
        assert_eq!(emitted, 3);
        assert_eq!(particles.iter().filter(|q| q.is_active()).count(), 6);
    }

    #[test]
    fn cap_of_zero_never_emits() {
        let p = params(0);
        let mut particles = spawn_collection(10, &p);
        for frame in 1..50 {
            step(&mut particles, &p, frame, 0.016);
            assert!(particles.iter().all(|q| !q.is_active()));
        }
    }

    #[test]
    fn cap_above_count_emits_everything() {
        let p = params(100);
        let mut particles = spawn_collection(10, &p);
        let emitted = step(&mut particles, &p, 1, 0.0);
        assert_eq!(emitted, 10);
        assert!(particles.iter().all(|q| q.is_active()));
    }

    #[test]
    fn on_the_rim_is_in_bounds() {
        let p = params(0);
        let mut particle = Particle::at_rest(Vec2::new(1.0, 0.0), Vec2::new(0.1, 0.0));
        particle.active = 1;
        assert!(!out_of_bounds(&particle, &p));
        // Just past the rim is out
        particle.position[0] = 1.0 + 1e-4;
        assert!(out_of_bounds(&particle, &p));
    }

    #[test]
    fn escaped_particle_is_reset_without_emission() {
        let p = params(0);
        let mut particles = vec![Particle::at_rest(Vec2::new(2.0, 0.0), Vec2::new(0.1, 0.0))];
        particles[0].active = 1;
        step(&mut particles, &p, 7, 0.016);
        // Cap 0: recycled back to the center and left inactive there
        assert!(!particles[0].is_active());
        assert_eq!(particles[0].position_xy(), Vec2::ZERO);
    }

    #[test]
    fn reemitted_particle_integrates_from_center_same_frame() {
        let p = params(1);
        let mut particles = vec![Particle::at_rest(Vec2::new(2.0, 0.0), Vec2::new(0.1, 0.0))];
        particles[0].active = 1;
        let dt = 0.5;
        step(&mut particles, &p, 3, dt);
        assert!(particles[0].is_active());
        // One step from the center with the frame-3 velocity draw
        let expected = sample_velocity(p.seed, 0, 3, &p.envelope) * dt;
        assert!((particles[0].position_xy() - expected).length() < 1e-6);
    }

    #[test]
    fn active_flag_is_strictly_binary() {
        let p = params(4);
        let mut particles = spawn_collection(12, &p);
        for frame in 1..200 {
            step(&mut particles, &p, frame, 0.05);
        }
        assert!(particles.iter().all(|q| q.active == 0 || q.active == 1));
    }

    #[test]
    fn same_seed_same_trajectory() {
        let p = params(5);
        let mut a = spawn_collection(20, &p);
        let mut b = spawn_collection(20, &p);
        for frame in 1..100 {
            step(&mut a, &p, frame, 0.02);
            step(&mut b, &p, frame, 0.02);
        }
        assert_eq!(a, b);
    }

    #[test]
    fn huge_dt_escapes_and_recycles_next_frame() {
        let p = params(1);
        let mut particles = spawn_collection(1, &p);
        // One enormous step flings the particle far outside the circle
        step(&mut particles, &p, 1, 1000.0);
        assert!(out_of_bounds(&particles[0], &p));
        // Next frame it is reset, re-emitted, and takes a normal step
        step(&mut particles, &p, 2, 0.016);
        assert!(particles[0].is_active());
        assert!(!out_of_bounds(&particles[0], &p));
    }
}
