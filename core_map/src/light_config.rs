//! Tunable constants for the lighting core.
//!
//! Loaded from `light_config.json` with support for an environment variable
//! override. Every threshold the engine compares against lives here so hosts
//! can rebalance without recompiling.

use std::{
    env, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use bevy::prelude::Resource;
use serde::Deserialize;
use thiserror::Error;

pub const BUILTIN_LIGHT_CONFIG: &str = include_str!("data/light_config.json");

/// Root configuration for lighting, visibility and sight range.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    /// Below this a tile reads as dark.
    pub ambient_low: f32,
    /// At or above this a tile reads as fully lit.
    pub ambient_lit: f32,
    /// A tile whose own emission reaches this reads as bright.
    pub bright_source_floor: f32,
    /// Sources are never treated as stronger than this when deriving range.
    pub max_source_luminance: f32,
    /// Extinction per tile of clear air, for Beer-Lambert sight cutoffs.
    pub transparency_open_air: f32,
    /// Hard cap on any observer's sight range, in tiles.
    pub max_view_distance: i32,
    /// Sunlight bleeding through a window is divided by this.
    pub window_bleed_divisor: f32,
    /// Eye adaptation: threshold = clamp(prev mean brightness × scale, ...).
    pub adaptation_scale: f32,
    pub vision_threshold_min: f32,
    /// Range cap for nearsighted observers without corrective lenses.
    pub nearsight_range: i32,
    /// Range while boomered.
    pub boomer_range: i32,
    /// Range underwater without goggles.
    pub underwater_range: i32,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            ambient_low: 1.0,
            ambient_lit: 5.0,
            bright_source_floor: 10.0,
            max_source_luminance: 50.0,
            transparency_open_air: 0.038376,
            max_view_distance: 60,
            window_bleed_divisor: 4.0,
            adaptation_scale: 0.0125,
            vision_threshold_min: 0.0125,
            nearsight_range: 12,
            boomer_range: 1,
            underwater_range: 4,
        }
    }
}

impl LightConfig {
    pub fn builtin() -> Arc<Self> {
        Arc::new(
            serde_json::from_str(BUILTIN_LIGHT_CONFIG)
                .expect("builtin light config should parse"),
        )
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: &Path) -> Result<Self, LightConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| LightConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = LightConfig::from_json_str(&contents)?;
        Ok(config)
    }

    /// Furthest distance at which a source can contribute above the faint
    /// light floor, clamped by the strongest source the engine models.
    pub fn light_range(&self, luminance: f32) -> i32 {
        let clamped = luminance.clamp(0.0, self.max_source_luminance);
        if clamped <= 0.0 {
            return 0;
        }
        ((clamped / self.ambient_low).sqrt() + 1.0).floor() as i32
    }

    /// Adaptation threshold for the next frame given the mean brightness the
    /// observer just saw. Capped at `ambient_lit` so a sunlit observer still
    /// recognizes lit tiles.
    pub fn vision_threshold(&self, prev_mean_brightness: f32) -> f32 {
        (prev_mean_brightness * self.adaptation_scale)
            .clamp(self.vision_threshold_min, self.ambient_lit)
    }
}

#[derive(Debug, Error)]
pub enum LightConfigError {
    #[error("failed to parse light config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read light config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Handle for accessing the light configuration from systems.
#[derive(Resource, Debug, Clone)]
pub struct LightConfigHandle(pub Arc<LightConfig>);

impl LightConfigHandle {
    pub fn new(config: Arc<LightConfig>) -> Self {
        Self(config)
    }

    pub fn get(&self) -> Arc<LightConfig> {
        Arc::clone(&self.0)
    }

    pub fn replace(&mut self, config: Arc<LightConfig>) {
        self.0 = config;
    }
}

/// Load the light configuration from the environment or fall back to the
/// builtin defaults.
pub fn load_light_config_from_env() -> Arc<LightConfig> {
    let Some(path) = env::var("LIGHT_CONFIG_PATH").ok().map(PathBuf::from) else {
        return LightConfig::builtin();
    };

    match LightConfig::from_file(&path) {
        Ok(config) => {
            tracing::info!(
                target: "gridlight::config",
                path = %path.display(),
                "light_config.loaded=file"
            );
            Arc::new(config)
        }
        Err(err) => {
            tracing::warn!(
                target: "gridlight::config",
                path = %path.display(),
                error = %err,
                "light_config.load_failed, using builtin"
            );
            LightConfig::builtin()
        }
    }
}
