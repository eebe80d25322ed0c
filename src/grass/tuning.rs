//! Interactive tuning values and the ranges they were tested in.

use serde::{Deserialize, Serialize};

/// Inclusive tested range of one tuning value
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParamRange {
    pub min: f32,
    pub max: f32,
}

impl ParamRange {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Clamp `value` into range. NaN maps to `min`.
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_nan() {
            self.min
        } else {
            value.clamp(self.min, self.max)
        }
    }
}

pub const K_RANGE: ParamRange = ParamRange::new(0.0, 150.0);
pub const DAMPING_RANGE: ParamRange = ParamRange::new(0.0, 100.0);
pub const WIND_FORCE_RANGE: ParamRange = ParamRange::new(0.0, 50.0);
pub const IMPULSE_FORCE_RANGE: ParamRange = ParamRange::new(0.0, 25.0);
pub const DENSITY_RANGE: ParamRange = ParamRange::new(0.0, 1.0);
pub const OFFSET_RANGE: ParamRange = ParamRange::new(0.0, 1.0);

/// Values exposed to the tuning UI
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningParams {
    /// Stiffness of the blade spring / neighbour coupling
    pub k: f32,
    pub damping: f32,
    pub wind_force: f32,
    /// Scale applied to the external forces field
    pub impulse_force: f32,
    /// Fraction of grid cells that spawn a blade
    pub density: f32,
    /// Jitter of blade positions within their cell
    pub offset_multiplier: f32,
    pub wind_enabled: bool,
}

impl Default for TuningParams {
    fn default() -> Self {
        Self {
            k: 144.0,
            damping: 16.0,
            wind_force: 25.0,
            impulse_force: 10.0,
            density: 0.15,
            offset_multiplier: 0.33,
            wind_enabled: true,
        }
    }
}

impl TuningParams {
    /// Clamp every value into its tested range.
    /// Returns the names of the values that had to be changed.
    pub fn clamp_to_tested(&mut self) -> Vec<&'static str> {
        let mut clamped = Vec::new();
        let mut fix = |name: &'static str, value: &mut f32, range: ParamRange| {
            let c = range.clamp(*value);
            if c.to_bits() != value.to_bits() {
                *value = c;
                clamped.push(name);
            }
        };
        fix("k", &mut self.k, K_RANGE);
        fix("damping", &mut self.damping, DAMPING_RANGE);
        fix("wind_force", &mut self.wind_force, WIND_FORCE_RANGE);
        fix("impulse_force", &mut self.impulse_force, IMPULSE_FORCE_RANGE);
        fix("density", &mut self.density, DENSITY_RANGE);
        fix("offset_multiplier", &mut self.offset_multiplier, OFFSET_RANGE);
        clamped
    }
}
