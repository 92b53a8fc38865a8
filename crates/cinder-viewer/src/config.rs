//! Viewer configuration: TOML file with CLI overrides on top

use anyhow::{Context, Result};
use cinder_render::ManagerConfig;
use glam::Vec2;
use serde::Deserialize;
use std::path::Path;

/// On-disk shape of the fountain settings. Every field is optional so a
/// config file only has to state what it changes.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FountainConfig {
    pub particles: Option<u32>,
    pub emission_cap: Option<u32>,
    /// Emitter center in normalized device coordinates, [-1, 1] per axis
    pub center: Option<[f32; 2]>,
    pub radius: Option<f32>,
    pub min_speed: Option<f32>,
    pub max_speed: Option<f32>,
    pub seed: Option<u32>,
    /// Run the per-particle update on the GPU instead of the host
    pub device_update: Option<bool>,
}

impl FountainConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Folds the file settings over the built-in defaults
    pub fn resolve(&self) -> (ManagerConfig, bool) {
        let defaults = ManagerConfig::default();
        let manager = ManagerConfig {
            particle_count: self.particles.unwrap_or(defaults.particle_count),
            emission_cap: self.emission_cap.unwrap_or(defaults.emission_cap),
            center: self
                .center
                .map(|[x, y]| Vec2::new(x, y))
                .unwrap_or(defaults.center),
            radius: self.radius.unwrap_or(defaults.radius),
            min_speed: self.min_speed.unwrap_or(defaults.min_speed),
            max_speed: self.max_speed.unwrap_or(defaults.max_speed),
            seed: self.seed.unwrap_or(defaults.seed),
        };
        (manager, self.device_update.unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_resolves_to_defaults() {
        let config: FountainConfig = toml::from_str("").unwrap();
        let (manager, device_update) = config.resolve();
        assert_eq!(manager.particle_count, ManagerConfig::default().particle_count);
        assert!(!device_update);
    }

    #[test]
    fn partial_config_overrides_only_named_fields() {
        let config: FountainConfig = toml::from_str(
            r#"
            particles = 500
            device_update = true
            center = [0.1, -0.2]
            "#,
        )
        .unwrap();
        let (manager, device_update) = config.resolve();
        assert_eq!(manager.particle_count, 500);
        assert_eq!(manager.center, Vec2::new(0.1, -0.2));
        assert_eq!(manager.radius, ManagerConfig::default().radius);
        assert!(device_update);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(toml::from_str::<FountainConfig>("gravity = 9.8").is_err());
    }
}
