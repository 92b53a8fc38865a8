//! GPU program builder — compile and link WGSL into pipelines
//!
//! Compilation is a naga front-end pass (parse + validate) so bad source is
//! caught with a readable diagnostic before the driver sees it; linking is
//! pipeline creation inside a wgpu validation error scope. Diagnostics are
//! truncated to a fixed length. Shader modules are transient: once a
//! pipeline holds the compiled code, dropping the module releases nothing
//! the pipeline still needs.

use std::path::Path;
use thiserror::Error;

/// Upper bound on the diagnostic text carried in a build error
pub const MAX_DIAGNOSTIC_LEN: usize = 128;

#[derive(Debug, Error)]
pub enum ProgramError {
    #[error("failed to read shader source {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("shader '{label}' failed to compile: {log}")]
    Compile { label: String, log: String },
    #[error("program '{label}' failed to link: {log}")]
    Link { label: String, log: String },
}

fn bounded_log(log: &str) -> String {
    log.chars().take(MAX_DIAGNOSTIC_LEN).collect()
}

/// Reads a WGSL source file in full
pub fn load_source(path: &Path) -> Result<String, ProgramError> {
    std::fs::read_to_string(path).map_err(|source| ProgramError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Parses and validates WGSL, returning the naga IR module
pub fn compile(source: &str, label: &str) -> Result<naga::Module, ProgramError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| ProgramError::Compile {
        label: label.to_string(),
        log: bounded_log(&e.emit_to_string(source)),
    })?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::default(),
    )
    .validate(&module)
    .map_err(|e| ProgramError::Compile {
        label: label.to_string(),
        log: bounded_log(&e.emit_to_string(source)),
    })?;

    Ok(module)
}

/// Compiles `source` and creates the device-side shader module
pub fn build_module(
    device: &wgpu::Device,
    source: &str,
    label: &str,
) -> Result<wgpu::ShaderModule, ProgramError> {
    compile(source, label)?;
    Ok(device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    }))
}

/// Convenience for shader sources kept on disk
pub fn build_module_from_path(
    device: &wgpu::Device,
    path: &Path,
) -> Result<wgpu::ShaderModule, ProgramError> {
    let source = load_source(path)?;
    let label = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    build_module(device, &source, &label)
}

/// Links a render program: one pipeline over the given vertex layout.
/// A validation error during creation surfaces as `ProgramError::Link` and
/// no pipeline is returned.
#[allow(clippy::too_many_arguments)]
pub fn link_render_program(
    device: &wgpu::Device,
    module: &wgpu::ShaderModule,
    vertex_entry: &str,
    fragment_entry: &str,
    vertex_layout: wgpu::VertexBufferLayout<'_>,
    format: wgpu::TextureFormat,
    topology: wgpu::PrimitiveTopology,
    label: &str,
) -> Result<wgpu::RenderPipeline, ProgramError> {
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[],
        push_constant_ranges: &[],
    });

    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some(vertex_entry),
            buffers: &[vertex_layout],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some(fragment_entry),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    });

    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => Err(ProgramError::Link {
            label: label.to_string(),
            log: bounded_log(&err.to_string()),
        }),
        None => Ok(pipeline),
    }
}

/// Links a compute program over one bind group layout
pub fn link_compute_program(
    device: &wgpu::Device,
    module: &wgpu::ShaderModule,
    entry: &str,
    bind_group_layout: &wgpu::BindGroupLayout,
    label: &str,
) -> Result<wgpu::ComputePipeline, ProgramError> {
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[bind_group_layout],
        push_constant_ranges: &[],
    });

    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        module,
        entry_point: Some(entry),
        compilation_options: Default::default(),
        cache: None,
    });

    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => Err(ProgramError::Link {
            label: label.to_string(),
            log: bounded_log(&err.to_string()),
        }),
        None => Ok(pipeline),
    }
}
