//! Windowed fountain viewer — Update then Render once per redraw

use anyhow::{Context, Result};
use cinder_render::{program, ManagerConfig, ParticleManager, RenderContext};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

/// Run the viewer until the window closes
pub fn run(config: ManagerConfig, device_update: bool, shader_dir: Option<PathBuf>) -> Result<()> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);
    let mut app = ViewerApp::new(config, device_update, shader_dir);
    event_loop.run_app(&mut app)?;
    Ok(())
}

struct ViewerApp {
    config: ManagerConfig,
    device_update: bool,
    /// Optional directory of replacement WGSL sources; embedded shaders
    /// are used when absent
    shader_dir: Option<PathBuf>,
    window: Option<Arc<Window>>,
    context: Option<RenderContext>,
    manager: Option<ParticleManager>,
    last_frame_time: Instant,
}

impl ViewerApp {
    fn new(config: ManagerConfig, device_update: bool, shader_dir: Option<PathBuf>) -> Self {
        Self {
            config,
            device_update,
            shader_dir,
            window: None,
            context: None,
            manager: None,
            last_frame_time: Instant::now(),
        }
    }

    fn build_shader(
        &self,
        device: &wgpu::Device,
        file_name: &str,
        embedded: &str,
    ) -> Result<wgpu::ShaderModule> {
        let module = match &self.shader_dir {
            Some(dir) => program::build_module_from_path(device, &dir.join(file_name))?,
            None => program::build_module(device, embedded, file_name)?,
        };
        Ok(module)
    }

    fn initialize(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window_attrs = Window::default_attributes()
            .with_title("Cinder Fountain")
            .with_inner_size(PhysicalSize::new(900, 900));

        let window = Arc::new(
            event_loop
                .create_window(window_attrs)
                .context("Failed to create viewer window")?,
        );
        self.window = Some(window.clone());

        let context = pollster::block_on(RenderContext::new(window))
            .context("Failed to initialize render context")?;

        let point_shader =
            self.build_shader(&context.device, "point.wgsl", cinder_render::POINT_SHADER)?;

        let manager = if self.device_update {
            let update_shader =
                self.build_shader(&context.device, "update.wgsl", cinder_render::UPDATE_SHADER)?;
            ParticleManager::new_device(
                &context.device,
                context.config.format,
                &point_shader,
                &update_shader,
                &self.config,
            )?
        } else {
            ParticleManager::new_host(
                &context.device,
                context.config.format,
                &point_shader,
                &self.config,
            )?
        };

        println!(
            "[viewer] {} particles, cap {}/frame, {} update",
            self.config.particle_count,
            self.config.emission_cap,
            if self.device_update { "device" } else { "host" },
        );

        self.context = Some(context);
        self.manager = Some(manager);
        self.last_frame_time = Instant::now();
        Ok(())
    }

    fn frame(&mut self) -> Result<()> {
        let (Some(context), Some(manager)) = (self.context.as_ref(), self.manager.as_mut()) else {
            return Ok(());
        };

        let now = Instant::now();
        let dt = (now - self.last_frame_time).as_secs_f32().min(0.1);
        self.last_frame_time = now;

        manager.update(&context.device, &context.queue, dt);

        let output = context
            .surface
            .get_current_texture()
            .context("Failed to acquire surface texture")?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Fountain Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.02,
                            g: 0.02,
                            b: 0.03,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            manager.render(&context.queue, &mut pass);
        }

        context.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.initialize(event_loop) {
                eprintln!("Failed to initialize viewer: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::KeyboardInput { event, .. } => {
                if event.physical_key == PhysicalKey::Code(KeyCode::Escape) {
                    event_loop.exit();
                }
            }
            WindowEvent::Resized(new_size) => {
                if let Some(context) = self.context.as_mut() {
                    context.resize(new_size);
                }
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.frame() {
                    eprintln!("Frame failed: {e:#}");
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}
