//! Cinder Render - wgpu particle manager and program builder
//!
//! Owns the GPU half of the fountain: the shader program builder (WGSL
//! compile + link with bounded diagnostics), the particle-state manager with
//! its two execution engines, and the windowed/headless contexts everything
//! runs in.

mod context;
mod headless;
pub mod manager;
pub mod program;

pub use context::{RenderContext, RenderError};
pub use headless::HeadlessContext;
pub use manager::{ManagerConfig, ManagerError, ParticleManager, UPDATE_WORKGROUP_WIDTH};
pub use program::{ProgramError, MAX_DIAGNOSTIC_LEN};

/// Point-rendering shader (entry points `vs_host`, `vs_device`, `fs_point`)
pub const POINT_SHADER: &str = include_str!("point.wgsl");
/// Device-update kernels (entry points `cs_classify`, `cs_emit`)
pub const UPDATE_SHADER: &str = include_str!("update.wgsl");
