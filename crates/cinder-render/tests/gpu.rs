//! GPU integration tests: buffer round trips, device-engine emission, and
//! host/device behavioral equivalence.
//!
//! Every test acquires a headless device and skips cleanly when the machine
//! has no adapter, so the suite stays green on CI boxes without a GPU.

use cinder_particles::{spawn_collection, Particle, SimParams};
use cinder_render::{program, HeadlessContext, ManagerConfig, ParticleManager};
use glam::Vec2;
use wgpu::util::DeviceExt;

const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

fn headless() -> Option<HeadlessContext> {
    match pollster::block_on(HeadlessContext::new()) {
        Ok(ctx) => Some(ctx),
        Err(e) => {
            eprintln!("skipping GPU test: {e}");
            None
        }
    }
}

fn test_config(count: u32, cap: u32) -> ManagerConfig {
    ManagerConfig {
        particle_count: count,
        emission_cap: cap,
        center: Vec2::ZERO,
        radius: 0.8,
        min_speed: 0.2,
        max_speed: 0.4,
        seed: 0x5EED_0001,
    }
}

fn build_host(ctx: &HeadlessContext, config: &ManagerConfig) -> ParticleManager {
    let point = program::build_module(&ctx.device, cinder_render::POINT_SHADER, "point.wgsl")
        .expect("point shader");
    ParticleManager::new_host(&ctx.device, TARGET_FORMAT, &point, config).expect("host manager")
}

fn build_device(ctx: &HeadlessContext, config: &ManagerConfig) -> ParticleManager {
    let point = program::build_module(&ctx.device, cinder_render::POINT_SHADER, "point.wgsl")
        .expect("point shader");
    let update = program::build_module(&ctx.device, cinder_render::UPDATE_SHADER, "update.wgsl")
        .expect("update shader");
    ParticleManager::new_device(&ctx.device, TARGET_FORMAT, &point, &update, config)
        .expect("device manager")
}

#[test]
fn upload_readback_round_trip_is_byte_identical() {
    let Some(ctx) = headless() else { return };

    let params = SimParams::new(Vec2::new(0.1, -0.2), 0.7, 5, 0.2, 0.4, 77);
    let particles = spawn_collection(64, &params);

    let buffer = ctx
        .device
        .create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Round Trip Buffer"),
            contents: bytemuck::cast_slice(&particles),
            usage: wgpu::BufferUsages::COPY_SRC,
        });

    let readback = ctx.read_particles(&buffer, 64).expect("readback");
    assert_eq!(
        bytemuck::cast_slice::<Particle, u8>(&particles),
        bytemuck::cast_slice::<Particle, u8>(&readback),
    );
}

#[test]
fn manager_initial_buffer_matches_host_spawn() {
    let Some(ctx) = headless() else { return };

    let config = test_config(32, 4);
    let manager = build_device(&ctx, &config);

    let gpu_side = ctx
        .read_particles(manager.particle_buffer(), config.particle_count)
        .expect("readback");
    let host_side = spawn_collection(config.particle_count, manager.params());
    assert_eq!(gpu_side, host_side);
}

#[test]
fn device_engine_respects_emission_cap() {
    let Some(ctx) = headless() else { return };

    let config = test_config(100, 7);
    let mut manager = build_device(&ctx, &config);
    manager.update(&ctx.device, &ctx.queue, 0.016);

    let particles = ctx
        .read_particles(manager.particle_buffer(), config.particle_count)
        .expect("readback");
    let active = particles.iter().filter(|p| p.is_active()).count();
    assert_eq!(active, 7);
    // And the first seven slots in index order, matching the host loop
    assert!(particles[..7].iter().all(|p| p.is_active()));
}

#[test]
fn device_engine_cap_zero_never_emits() {
    let Some(ctx) = headless() else { return };

    let config = test_config(64, 0);
    let mut manager = build_device(&ctx, &config);
    for _ in 0..10 {
        manager.update(&ctx.device, &ctx.queue, 0.016);
    }

    let particles = ctx
        .read_particles(manager.particle_buffer(), config.particle_count)
        .expect("readback");
    assert!(particles.iter().all(|p| !p.is_active()));
}

#[test]
fn host_and_device_engines_agree() {
    let Some(ctx) = headless() else { return };

    let config = test_config(128, 9);
    let mut host = build_host(&ctx, &config);
    let mut device = build_device(&ctx, &config);

    // Large enough dt that escapes and recycles happen within the run
    let dt = 0.05;
    for _ in 0..60 {
        host.update(&ctx.device, &ctx.queue, dt);
        device.update(&ctx.device, &ctx.queue, dt);
    }

    let host_side = host.host_particles().expect("host collection").to_vec();
    let device_side = ctx
        .read_particles(device.particle_buffer(), config.particle_count)
        .expect("readback");

    // Same rules, same seed, same order. Positions may diverge by GPU
    // sin/cos ulps compounded over resets, so compare with a tolerance;
    // the flags must agree exactly.
    for (slot, (h, d)) in host_side.iter().zip(&device_side).enumerate() {
        assert_eq!(h.active, d.active, "active flag diverged at slot {slot}");
        let dp = h.position_xy() - d.position_xy();
        assert!(
            dp.length() < 1e-3,
            "position diverged at slot {slot}: host {:?} device {:?}",
            h.position_xy(),
            d.position_xy(),
        );
        let dv = h.velocity_xy() - d.velocity_xy();
        assert!(dv.length() < 1e-3, "velocity diverged at slot {slot}");
    }
}

#[test]
fn cleanup_is_idempotent() {
    let Some(ctx) = headless() else { return };

    let mut manager = build_device(&ctx, &test_config(16, 2));
    manager.update(&ctx.device, &ctx.queue, 0.016);
    manager.cleanup();
    manager.cleanup();
    // Drop runs cleanup a third time
}
