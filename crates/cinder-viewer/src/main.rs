//! Cinder viewer - windowed 2D particle fountain

mod app;
mod config;

use anyhow::Result;
use clap::Parser;
use cinder_render::ManagerConfig;
use config::FountainConfig;
use glam::Vec2;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cinder")]
#[command(about = "Bounded 2D particle fountain with host or GPU update", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to a TOML config file; CLI flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run the per-particle update as GPU compute instead of on the host
    #[arg(long)]
    gpu: bool,

    /// Fixed particle population
    #[arg(long)]
    particles: Option<u32>,

    /// Max particles emitted per frame
    #[arg(long)]
    cap: Option<u32>,

    /// Bounds radius in normalized device coordinates
    #[arg(long)]
    radius: Option<f32>,

    /// Emitter center, e.g. --center 0.0,0.2
    #[arg(long, value_parser = parse_center)]
    center: Option<Vec2>,

    /// Minimum reset speed
    #[arg(long)]
    min_speed: Option<f32>,

    /// Maximum reset speed
    #[arg(long)]
    max_speed: Option<f32>,

    /// Seed for the deterministic velocity draws
    #[arg(long)]
    seed: Option<u32>,

    /// Directory of replacement WGSL sources (point.wgsl, update.wgsl)
    #[arg(long)]
    shader_dir: Option<PathBuf>,
}

fn parse_center(s: &str) -> Result<Vec2, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| "expected x,y".to_string())?;
    let x: f32 = x.trim().parse().map_err(|e| format!("bad x: {e}"))?;
    let y: f32 = y.trim().parse().map_err(|e| format!("bad y: {e}"))?;
    Ok(Vec2::new(x, y))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let file_config = match &cli.config {
        Some(path) => FountainConfig::load(path)?,
        None => FountainConfig::default(),
    };
    let (resolved, file_device_update) = file_config.resolve();

    let config = ManagerConfig {
        particle_count: cli.particles.unwrap_or(resolved.particle_count),
        emission_cap: cli.cap.unwrap_or(resolved.emission_cap),
        center: cli.center.unwrap_or(resolved.center),
        radius: cli.radius.unwrap_or(resolved.radius),
        min_speed: cli.min_speed.unwrap_or(resolved.min_speed),
        max_speed: cli.max_speed.unwrap_or(resolved.max_speed),
        seed: cli.seed.unwrap_or(resolved.seed),
    };
    let device_update = cli.gpu || file_device_update;

    app::run(config, device_update, cli.shader_dir)
}
