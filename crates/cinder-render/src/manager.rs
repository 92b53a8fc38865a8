//! Particle state manager — owns the collection, the device buffer, and the
//! per-frame update/render protocol
//!
//! The manager runs one of two mutually exclusive engines picked at
//! construction. The host engine advances `Vec<Particle>` on the CPU and
//! overwrites the whole device buffer at render time. The device engine
//! never touches particle data on the host after init: two compute
//! dispatches advance the buffer in place and the point pipeline reads the
//! same buffer as its vertex source.

use crate::program::{self, ProgramError};
use bytemuck::{Pod, Zeroable};
use cinder_particles::{sim, spawn_collection, Particle, SimParams};
use glam::Vec2;
use thiserror::Error;
use wgpu::util::DeviceExt;

/// Workgroup width of the update kernels; must match update.wgsl
pub const UPDATE_WORKGROUP_WIDTH: u32 = 64;

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("particle count must be greater than zero")]
    ZeroParticleCount,
    #[error("bounds radius must be positive, got {0}")]
    NonPositiveRadius(f32),
    #[error("velocity envelope is inverted: min {min} exceeds max {max}")]
    InvertedEnvelope { min: f32, max: f32 },
    #[error(transparent)]
    Program(#[from] ProgramError),
}

/// Everything `ParticleManager` needs to know at init
#[derive(Copy, Clone, Debug)]
pub struct ManagerConfig {
    pub particle_count: u32,
    /// Per-frame cap on inactive → active transitions; values above
    /// `particle_count` degenerate to "emit everything inactive"
    pub emission_cap: u32,
    /// Emitter center in normalized device coordinates
    pub center: Vec2,
    pub radius: f32,
    pub min_speed: f32,
    pub max_speed: f32,
    pub seed: u32,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            particle_count: 10_000,
            emission_cap: 50,
            center: Vec2::ZERO,
            radius: 0.9,
            min_speed: 0.3,
            max_speed: 0.5,
            seed: 0xC1DE,
        }
    }
}

/// Frame-invariant simulation parameters — matches WGSL `SimParams`
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct SimParamsGpu {
    center: [f32; 2],
    radius_sqr: f32,
    min_speed: f32,
    speed_delta: f32,
    emission_cap: u32,
    particle_count: u32,
    seed: u32,
}

/// Per-frame parameters, rewritten before every dispatch — matches WGSL
/// `FrameParams`
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct FrameParamsGpu {
    delta_time: f32,
    frame: u32,
    _pad: [u32; 2],
}

/// Closed set of execution engines; each variant carries exactly the
/// resources its mode needs.
enum UpdateEngine {
    Host {
        particles: Vec<Particle>,
    },
    Device {
        classify_pipeline: wgpu::ComputePipeline,
        emit_pipeline: wgpu::ComputePipeline,
        bind_group: wgpu::BindGroup,
        sim_params: wgpu::Buffer,
        frame_params: wgpu::Buffer,
        emit_flags: wgpu::Buffer,
    },
}

pub struct ParticleManager {
    render_pipeline: wgpu::RenderPipeline,
    particle_buffer: wgpu::Buffer,
    particle_count: u32,
    params: SimParams,
    frame: u32,
    engine: UpdateEngine,
    released: bool,
}

const HOST_ATTRIBUTES: [wgpu::VertexAttribute; 2] = [
    wgpu::VertexAttribute {
        format: wgpu::VertexFormat::Float32x4,
        offset: Particle::POSITION_OFFSET,
        shader_location: 0,
    },
    wgpu::VertexAttribute {
        format: wgpu::VertexFormat::Float32x4,
        offset: Particle::VELOCITY_OFFSET,
        shader_location: 1,
    },
];

// The active flag is exposed as an attribute only here: the host engine's
// vertex stage has no use for it and skips the binding, accepting the dead
// bytes in the stride.
const DEVICE_ATTRIBUTES: [wgpu::VertexAttribute; 3] = [
    HOST_ATTRIBUTES[0],
    HOST_ATTRIBUTES[1],
    wgpu::VertexAttribute {
        format: wgpu::VertexFormat::Uint32,
        offset: Particle::ACTIVE_OFFSET,
        shader_location: 2,
    },
];

fn vertex_layout(attributes: &[wgpu::VertexAttribute]) -> wgpu::VertexBufferLayout<'_> {
    wgpu::VertexBufferLayout {
        array_stride: Particle::STRIDE,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes,
    }
}

fn validate(config: &ManagerConfig) -> Result<SimParams, ManagerError> {
    if config.particle_count == 0 {
        return Err(ManagerError::ZeroParticleCount);
    }
    if config.radius <= 0.0 {
        return Err(ManagerError::NonPositiveRadius(config.radius));
    }
    if config.max_speed < config.min_speed {
        return Err(ManagerError::InvertedEnvelope {
            min: config.min_speed,
            max: config.max_speed,
        });
    }
    Ok(SimParams::new(
        config.center,
        config.radius,
        config.emission_cap,
        config.min_speed,
        config.max_speed,
        config.seed,
    ))
}

impl ParticleManager {
    /// Host engine: state advanced on the CPU, re-uploaded every frame
    pub fn new_host(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        point_shader: &wgpu::ShaderModule,
        config: &ManagerConfig,
    ) -> Result<Self, ManagerError> {
        let params = validate(config)?;
        let particles = spawn_collection(config.particle_count, &params);

        // One upload at init; render() overwrites the whole buffer each frame
        let particle_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Buffer"),
            contents: bytemuck::cast_slice(&particles),
            usage: wgpu::BufferUsages::VERTEX
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
        });

        let render_pipeline = program::link_render_program(
            device,
            point_shader,
            "vs_host",
            "fs_point",
            vertex_layout(&HOST_ATTRIBUTES),
            format,
            wgpu::PrimitiveTopology::PointList,
            "Particle Point Pipeline (host)",
        )?;

        Ok(Self {
            render_pipeline,
            particle_buffer,
            particle_count: config.particle_count,
            params,
            frame: 0,
            engine: UpdateEngine::Host { particles },
            released: false,
        })
    }

    /// Device engine: state advanced by compute dispatches over the same
    /// buffer the renderer reads; the host never reads it back.
    pub fn new_device(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        point_shader: &wgpu::ShaderModule,
        update_shader: &wgpu::ShaderModule,
        config: &ManagerConfig,
    ) -> Result<Self, ManagerError> {
        let params = validate(config)?;
        let particles = spawn_collection(config.particle_count, &params);

        // Only authoritative copy after this upload
        let particle_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Buffer"),
            contents: bytemuck::cast_slice(&particles),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::VERTEX
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
        });
        drop(particles);

        // Frame-invariant parameters go up once
        let sim_params = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Sim Params"),
            contents: bytemuck::bytes_of(&SimParamsGpu {
                center: params.center.to_array(),
                radius_sqr: params.radius_sqr,
                min_speed: params.envelope.min_speed,
                speed_delta: params.envelope.speed_delta,
                emission_cap: params.emission_cap,
                particle_count: config.particle_count,
                seed: params.seed,
            }),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let frame_params = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Frame Params"),
            size: std::mem::size_of::<FrameParamsGpu>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let emit_flags = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Emit Flags"),
            size: u64::from(config.particle_count) * 4,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });

        let bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Particle Update Bind Group Layout"),
                entries: &[
                    storage_entry(0),
                    storage_entry(1),
                    uniform_entry(2),
                    uniform_entry(3),
                ],
            });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Particle Update Bind Group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: particle_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: emit_flags.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: sim_params.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: frame_params.as_entire_binding(),
                },
            ],
        });

        let classify_pipeline = program::link_compute_program(
            device,
            update_shader,
            "cs_classify",
            &bind_group_layout,
            "Particle Classify Pipeline",
        )?;
        let emit_pipeline = program::link_compute_program(
            device,
            update_shader,
            "cs_emit",
            &bind_group_layout,
            "Particle Emit Pipeline",
        )?;

        let render_pipeline = program::link_render_program(
            device,
            point_shader,
            "vs_device",
            "fs_point",
            vertex_layout(&DEVICE_ATTRIBUTES),
            format,
            wgpu::PrimitiveTopology::PointList,
            "Particle Point Pipeline (device)",
        )?;

        Ok(Self {
            render_pipeline,
            particle_buffer,
            particle_count: config.particle_count,
            params,
            frame: 0,
            engine: UpdateEngine::Device {
                classify_pipeline,
                emit_pipeline,
                bind_group,
                sim_params,
                frame_params,
                emit_flags,
            },
            released: false,
        })
    }

    /// Advances the simulation by `dt` seconds.
    pub fn update(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, dt: f32) {
        self.frame = self.frame.wrapping_add(1);

        match &mut self.engine {
            UpdateEngine::Host { particles } => {
                sim::step(particles, &self.params, self.frame, dt);
            }
            UpdateEngine::Device {
                classify_pipeline,
                emit_pipeline,
                bind_group,
                frame_params,
                ..
            } => {
                queue.write_buffer(
                    frame_params,
                    0,
                    bytemuck::bytes_of(&FrameParamsGpu {
                        delta_time: dt,
                        frame: self.frame,
                        _pad: [0; 2],
                    }),
                );

                let workgroups = self.particle_count.div_ceil(UPDATE_WORKGROUP_WIDTH);
                let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Particle Update Encoder"),
                });
                {
                    let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                        label: Some("Particle Classify Pass"),
                        timestamp_writes: None,
                    });
                    pass.set_pipeline(classify_pipeline);
                    pass.set_bind_group(0, &*bind_group, &[]);
                    pass.dispatch_workgroups(workgroups, 1, 1);
                }
                // Second pass: the pass boundary orders the classify writes
                // before the emit reads, and both before any later render
                // pass on this queue.
                {
                    let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                        label: Some("Particle Emit Pass"),
                        timestamp_writes: None,
                    });
                    pass.set_pipeline(emit_pipeline);
                    pass.set_bind_group(0, &*bind_group, &[]);
                    pass.dispatch_workgroups(workgroups, 1, 1);
                }
                queue.submit(std::iter::once(encoder.finish()));
            }
        }
    }

    /// Records the point draw into `pass`. The host engine first pushes its
    /// collection wholesale into the device buffer — the device copy is
    /// stale between renders; the device engine's buffer already holds this
    /// frame's result.
    pub fn render(&self, queue: &wgpu::Queue, pass: &mut wgpu::RenderPass<'_>) {
        if let UpdateEngine::Host { particles } = &self.engine {
            queue.write_buffer(&self.particle_buffer, 0, bytemuck::cast_slice(particles));
        }
        pass.set_pipeline(&self.render_pipeline);
        pass.set_vertex_buffer(0, self.particle_buffer.slice(..));
        pass.draw(0..self.particle_count, 0..1);
    }

    /// Releases the device buffers. Idempotent; also runs on drop.
    pub fn cleanup(&mut self) {
        if self.released {
            return;
        }
        self.particle_buffer.destroy();
        if let UpdateEngine::Device {
            sim_params,
            frame_params,
            emit_flags,
            ..
        } = &self.engine
        {
            sim_params.destroy();
            frame_params.destroy();
            emit_flags.destroy();
        }
        self.released = true;
    }

    pub fn particle_count(&self) -> u32 {
        self.particle_count
    }

    /// Frames simulated so far
    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    /// The shared device buffer (readback hook for tests)
    pub fn particle_buffer(&self) -> &wgpu::Buffer {
        &self.particle_buffer
    }

    /// The host engine's collection; `None` for the device engine, which
    /// keeps its only copy on the GPU.
    pub fn host_particles(&self) -> Option<&[Particle]> {
        match &self.engine {
            UpdateEngine::Host { particles } => Some(particles),
            UpdateEngine::Device { .. } => None,
        }
    }
}

impl Drop for ParticleManager {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn storage_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: false },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}
