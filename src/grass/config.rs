//! Grass simulation configuration.
//!
//! Loaded from JSON by the host; everything has a default matching the
//! reference setup (1024² grid and field, 10 m patch per unit scale).

use std::path::Path;

use glam::{UVec2, Vec2};
use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use super::tuning::TuningParams;

/// Shape of the precomputed impulse stamp
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpulseConfig {
    /// Stamp image size in texels (square)
    pub size: u32,
    /// Peak magnitude of the Gaussian profile
    pub peak: f32,
    /// Radial position of the peak (0 = centre of the stamp)
    pub center: f32,
    /// Gaussian width, in stamp radii
    pub width: f32,
}

impl Default for ImpulseConfig {
    fn default() -> Self {
        Self {
            size: 256,
            peak: 500.0,
            center: 0.0,
            width: 0.2,
        }
    }
}

/// Debug-only readbacks that stall the queue
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Read the live blade count back to the host every frame.
    pub read_point_count: bool,
}

/// Top-level grass configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrassConfig {
    /// Sampling grid in cells (x, z)
    pub grid_size: [u32; 2],
    /// Physics field in texels (x, z); multiples of 32
    pub field_size: [u32; 2],
    /// Metres covered by the patch per unit of transform scale
    pub unit_size: f32,
    /// Blade length in metres (draw only)
    pub blade_length: f32,
    /// Wind direction in the xz plane; normalized on use
    pub wind_direction: [f32; 2],
    /// Upper bound on impulse stamps per frame
    pub max_impulses_per_frame: u32,
    pub impulse: ImpulseConfig,
    pub tuning: TuningParams,
    pub diagnostics: DiagnosticsConfig,
}

impl Default for GrassConfig {
    fn default() -> Self {
        Self {
            grid_size: [1024, 1024],
            field_size: [1024, 1024],
            unit_size: 10.0,
            blade_length: 3.0,
            wind_direction: [1.0, 1.0],
            max_impulses_per_frame: 64,
            impulse: ImpulseConfig::default(),
            tuning: TuningParams::default(),
            diagnostics: DiagnosticsConfig::default(),
        }
    }
}

/// Field sizes must keep readback rows aligned (8-byte texels, 256-byte rows).
pub const FIELD_SIZE_MULTIPLE: u32 = 32;

impl GrassConfig {
    /// Load a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Save as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), Error> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.grid_size.contains(&0) {
            return Err(Error::Config(format!("grid_size {:?} has a zero axis", self.grid_size)));
        }
        if self.field_size.iter().any(|&s| s == 0 || s % FIELD_SIZE_MULTIPLE != 0) {
            return Err(Error::Config(format!(
                "field_size {:?} must be non-zero multiples of {}",
                self.field_size, FIELD_SIZE_MULTIPLE
            )));
        }
        if !(self.unit_size > 0.0) {
            return Err(Error::Config(format!("unit_size {} must be positive", self.unit_size)));
        }
        if self.impulse.size < 2 || !(self.impulse.width > 0.0) {
            return Err(Error::Config(format!(
                "impulse stamp needs size >= 2 and a positive width, got {:?}",
                self.impulse
            )));
        }
        // Stamps are stored as f16; a larger peak would turn into infinity
        if !(self.impulse.peak.abs() <= half::f16::MAX.to_f32()) {
            return Err(Error::Config(format!(
                "impulse peak {} is not representable in the f16 stamp image",
                self.impulse.peak
            )));
        }
        if !(Vec2::from(self.wind_direction).length() > 0.0) {
            return Err(Error::Config("wind_direction must be non-zero".to_string()));
        }
        Ok(())
    }

    pub fn grid(&self) -> UVec2 {
        UVec2::from(self.grid_size)
    }

    pub fn field(&self) -> UVec2 {
        UVec2::from(self.field_size)
    }

    pub fn wind_direction(&self) -> Vec2 {
        Vec2::from(self.wind_direction).normalize_or_zero()
    }
}
