//! Headless wgpu context for tests and offscreen use

use crate::context::RenderError;
use cinder_particles::Particle;

/// Adapter-less device + queue. Construction fails cleanly when the machine
/// has no usable adapter, so callers can skip GPU work instead of crashing.
pub struct HeadlessContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl HeadlessContext {
    pub async fn new() -> Result<Self, RenderError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RenderError::AdapterNotFound)?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Cinder Headless Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .map_err(|e| RenderError::DeviceCreation(e.to_string()))?;

        Ok(Self { device, queue })
    }

    /// Copies `size` bytes out of a COPY_SRC buffer and blocks until the
    /// readback completes.
    pub fn read_buffer(&self, buffer: &wgpu::Buffer, size: u64) -> Result<Vec<u8>, RenderError> {
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Buffer"),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);

        rx.recv()
            .map_err(|e| RenderError::BufferReadFailed(e.to_string()))?
            .map_err(|e| RenderError::BufferReadFailed(e.to_string()))?;

        let data = slice.get_mapped_range().to_vec();
        staging.unmap();
        Ok(data)
    }

    /// Reads `count` particle records back from a device buffer
    pub fn read_particles(
        &self,
        buffer: &wgpu::Buffer,
        count: u32,
    ) -> Result<Vec<Particle>, RenderError> {
        let bytes = self.read_buffer(buffer, u64::from(count) * Particle::STRIDE)?;
        // pod_collect_to_vec tolerates the Vec<u8> allocation being
        // under-aligned for Particle
        Ok(bytemuck::pod_collect_to_vec(&bytes))
    }
}
