//! View configuration.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_MAX_ITERATIONS;
use crate::error::{Error, Result};
use crate::fractal::{FractalFamily, RenderMode};

/// Startup values for the view and its integration speeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Viewport extent in plane units at startup and after a reset.
    pub scale: Vec2,
    /// Viewport center at startup and after a reset.
    pub center: Vec2,
    /// Iteration cap handed to the kernels.
    pub max_iterations: f32,
    /// Zoom rate multiplier.
    pub scale_speed: f32,
    /// Multiplier applied to wall-clock seconds before integration.
    pub time_scale: f32,
    pub family: FractalFamily,
    pub mode: RenderMode,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            scale: Vec2::new(4.0, 2.25),
            center: Vec2::new(-0.65, 0.0),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            scale_speed: 1.0,
            time_scale: 0.5,
            family: FractalFamily::Mandelbrot,
            mode: RenderMode::Base,
        }
    }
}

impl ViewConfig {
    /// Parse a TOML view config. Missing keys keep their defaults.
    ///
    /// ```toml
    /// family = "tricorn"
    /// center = [-0.5, 0.0]
    /// max_iterations = 512.0
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the integrator cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !(self.scale.is_finite() && self.scale.min_element() > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "scale must be positive and finite, got {}",
                self.scale
            )));
        }
        if !self.center.is_finite() {
            return Err(Error::InvalidConfig(format!(
                "center must be finite, got {}",
                self.center
            )));
        }
        if !(self.max_iterations.is_finite() && self.max_iterations >= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "max_iterations must be at least 1, got {}",
                self.max_iterations
            )));
        }
        for (name, value) in [
            ("scale_speed", self.scale_speed),
            ("time_scale", self.time_scale),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::InvalidConfig(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Set the iteration cap.
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: f32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the zoom speed.
    #[must_use]
    pub const fn with_scale_speed(mut self, scale_speed: f32) -> Self {
        self.scale_speed = scale_speed;
        self
    }

    /// Set the starting fractal family.
    #[must_use]
    pub const fn with_family(mut self, family: FractalFamily) -> Self {
        self.family = family;
        self
    }
}
