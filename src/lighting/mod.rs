//! Environmental light estimation
//!
//! Turns the provider's per-snapshot light estimate into renderer lights: a plain
//! ambient modulation, or in Environmental HDR mode a world-anchored directional
//! light plus spherical-harmonics ambient and an optional reflections cube map.

mod cubemap;
mod estimator;
mod spherical_harmonics;

pub use cubemap::*;
pub use estimator::*;
pub use spherical_harmonics::*;

use crate::tracking::LightEstimationMode;

/// What the light estimator derives from the provider's estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightEstimationConfig {
    pub mode: LightEstimationMode,
    /// Use the provider's reflection cube map instead of a static environment
    pub environmental_hdr_reflections: bool,
    /// Convert and apply the ambient spherical harmonics
    pub environmental_hdr_irradiance: bool,
    /// Generate prefiltered mips for the reflection cube map
    pub environmental_hdr_specular_filter: bool,
    /// Keep following the main light direction after the first estimate
    pub environmental_hdr_main_light_direction: bool,
    pub environmental_hdr_main_light_intensity: bool,
}

impl LightEstimationConfig {
    pub const DISABLED: Self = Self::with_mode(LightEstimationMode::Disabled);
    pub const AMBIENT_INTENSITY: Self = Self::with_mode(LightEstimationMode::AmbientIntensity);
    pub const ENVIRONMENTAL_HDR: Self = Self::with_mode(LightEstimationMode::EnvironmentalHdr);

    pub const fn with_mode(mode: LightEstimationMode) -> Self {
        Self {
            mode,
            environmental_hdr_reflections: true,
            environmental_hdr_irradiance: true,
            environmental_hdr_specular_filter: true,
            environmental_hdr_main_light_direction: true,
            environmental_hdr_main_light_intensity: true,
        }
    }

    pub fn with_reflections(mut self, enabled: bool) -> Self {
        self.environmental_hdr_reflections = enabled;
        self
    }

    pub fn with_irradiance(mut self, enabled: bool) -> Self {
        self.environmental_hdr_irradiance = enabled;
        self
    }

    pub fn with_specular_filter(mut self, enabled: bool) -> Self {
        self.environmental_hdr_specular_filter = enabled;
        self
    }

    pub fn with_main_light_direction(mut self, enabled: bool) -> Self {
        self.environmental_hdr_main_light_direction = enabled;
        self
    }

    pub fn with_main_light_intensity(mut self, enabled: bool) -> Self {
        self.environmental_hdr_main_light_intensity = enabled;
        self
    }
}

impl Default for LightEstimationConfig {
    fn default() -> Self {
        Self::ENVIRONMENTAL_HDR
    }
}
