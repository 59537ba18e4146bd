//! Light estimate state machine
//!
//! Every component of the estimate is carried forward: once populated by a valid
//! estimate it is only ever replaced by a later valid one, never cleared by an
//! invalid one, so the rendered lighting never flickers.
//!
//! In Environmental HDR mode the main light direction is stored relative to a
//! provider anchor placed at the camera. The anchor is recreated when it stops
//! tracking or the camera wanders more than [`ANCHOR_DISTANCE_THRESHOLD`] away;
//! the world direction is re-derived from the anchor each tick so anchor drift
//! is absorbed.

use glam::Vec3;

use super::{pack_cube_map, to_irradiance, LightEstimationConfig, ReflectionsTexture};
use crate::backend::{IndirectLightParams, MainLightParams, RenderBackend, TextureHandle};
use crate::tracking::{
    Anchor, CameraState, FacingDirection, LightEstimationMode, RawLightEstimate, TrackingFrame,
    TrackingSession, TrackingState,
};

/// Camera-to-anchor distance beyond which the light anchor is recreated
pub const ANCHOR_DISTANCE_THRESHOLD: f32 = 0.5;

/// Indirect light intensity of the unestimated environment. Environmental HDR
/// keeps it as is; ambient estimates scale it by pixel intensity and exposure.
pub const BASE_INDIRECT_INTENSITY: f32 = 1.0;

/// Linear-space middle gray
const MIDDLE_GRAY: f32 = 0.18;
const GAMMA: f32 = 2.2;

/// Estimation actually performed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimationMode {
    Disabled,
    Ambient,
    Hdr,
}

impl EstimationMode {
    /// Front-facing capture mirrors the world, so it gets no light estimation.
    pub fn select(mode: LightEstimationMode, facing: FacingDirection) -> Self {
        match (facing, mode) {
            (FacingDirection::Front, _) | (_, LightEstimationMode::Disabled) => EstimationMode::Disabled,
            (_, LightEstimationMode::AmbientIntensity) => EstimationMode::Ambient,
            (_, LightEstimationMode::EnvironmentalHdr) => EstimationMode::Hdr,
        }
    }
}

/// Ambient color modulation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientLight {
    /// Linear RGB relative to middle gray
    pub color: Vec3,
    pub intensity: f32,
}

impl Default for AmbientLight {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            intensity: BASE_INDIRECT_INTENSITY,
        }
    }
}

impl AmbientLight {
    /// Decode a gamma-space color correction (RGB scale + pixel intensity)
    pub fn from_color_correction(color_correction: [f32; 4], exposure: f32) -> Self {
        let [r, g, b, a] = color_correction.map(|c| c.max(0.0).powf(GAMMA) / MIDDLE_GRAY);
        Self {
            color: Vec3::new(r, g, b),
            intensity: BASE_INDIRECT_INTENSITY * a.max(0.0) * exposure,
        }
    }
}

/// World-anchored Environmental HDR lighting
#[derive(Debug, Clone, PartialEq)]
pub struct HdrLight {
    /// World-space unit vector pointing towards the main light
    pub direction: Vec3,
    /// Main light color, each channel in [0, 1]
    pub color: Vec3,
    /// Main light brightness, the factor divided out of `color`
    pub intensity: f32,
    /// Cached ambient coefficients as received
    pub spherical_harmonics: [f32; 27],
    /// Renderer irradiance coefficients, when irradiance is enabled
    pub irradiance: Option<[f32; 27]>,
    pub reflections: Option<TextureHandle>,
    /// Indirect light intensity applied alongside the irradiance
    pub indirect_intensity: f32,
}

/// Lights to apply for one tick
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnvironmentLights {
    pub ambient: AmbientLight,
    pub hdr: Option<HdrLight>,
}

impl EnvironmentLights {
    /// Push the lights to the renderer
    pub fn apply<B: RenderBackend>(&self, backend: &mut B) {
        match &self.hdr {
            Some(hdr) => {
                backend.set_indirect_light(&IndirectLightParams {
                    irradiance: hdr.irradiance,
                    color: Vec3::ONE,
                    intensity: hdr.indirect_intensity,
                    reflections: hdr.reflections,
                });
                backend.set_main_light(&MainLightParams {
                    direction: -hdr.direction,
                    color: hdr.color,
                    intensity: hdr.intensity,
                });
            }
            None => backend.set_indirect_light(&IndirectLightParams {
                irradiance: None,
                color: self.ambient.color,
                intensity: self.ambient.intensity,
                reflections: None,
            }),
        }
    }
}

type CaptureCallback = Box<dyn FnOnce(&HdrLight) + Send>;

/// Converts raw provider estimates into [`EnvironmentLights`]
pub struct LightEstimator {
    config: LightEstimationConfig,
    mode: EstimationMode,
    exposure: f32,
    ambient: AmbientLight,
    anchor: Option<Box<dyn Anchor>>,
    anchor_direction: Option<Vec3>,
    spherical_harmonics: Option<[f32; 27]>,
    main_light_intensity: Option<Vec3>,
    reflections: Option<ReflectionsTexture>,
    last_hdr: Option<HdrLight>,
    capture: Option<CaptureCallback>,
    anchor_recreations: usize,
}

impl LightEstimator {
    pub fn new(config: LightEstimationConfig, facing: FacingDirection, exposure: f32) -> Self {
        Self {
            config,
            mode: EstimationMode::select(config.mode, facing),
            exposure,
            ambient: AmbientLight::default(),
            anchor: None,
            anchor_direction: None,
            spherical_harmonics: None,
            main_light_intensity: None,
            reflections: None,
            last_hdr: None,
            capture: None,
            anchor_recreations: 0,
        }
    }

    pub fn config(&self) -> &LightEstimationConfig {
        &self.config
    }

    pub fn mode(&self) -> EstimationMode {
        self.mode
    }

    /// Replace the configuration and drop everything estimated so far.
    pub fn set_config(&mut self, config: LightEstimationConfig, facing: FacingDirection) {
        let mode = EstimationMode::select(config.mode, facing);
        if mode != self.mode {
            log::info!("Light estimation mode {:?} -> {mode:?}", self.mode);
        }
        self.config = config;
        self.mode = mode;
        self.reset();
    }

    fn reset(&mut self) {
        self.detach_anchor();
        self.ambient = AmbientLight::default();
        self.spherical_harmonics = None;
        self.main_light_intensity = None;
        self.last_hdr = None;
    }

    fn detach_anchor(&mut self) {
        if let Some(mut anchor) = self.anchor.take() {
            anchor.detach();
        }
        self.anchor_direction = None;
    }

    pub fn set_camera_exposure_factor(&mut self, exposure: f32) {
        self.exposure = exposure;
    }

    /// Hand the next emitted HDR estimate to `callback`, once.
    pub fn capture_hdr_light_estimate(&mut self, callback: impl FnOnce(&HdrLight) + Send + 'static) {
        self.capture = Some(Box::new(callback));
    }

    /// Number of times the light anchor has been (re)created
    pub fn anchor_recreations(&self) -> usize {
        self.anchor_recreations
    }

    pub fn anchor(&self) -> Option<&dyn Anchor> {
        self.anchor.as_deref()
    }

    /// Current output without consuming a new estimate
    pub fn current(&self) -> EnvironmentLights {
        EnvironmentLights {
            ambient: self.ambient,
            hdr: match self.mode {
                EstimationMode::Hdr => self.last_hdr.clone(),
                _ => None,
            },
        }
    }

    /// The snapshot has no camera to anchor to; fall back to the ambient state.
    pub fn on_camera_lost(&self) -> EnvironmentLights {
        EnvironmentLights {
            ambient: self.ambient,
            hdr: None,
        }
    }

    /// Consume this tick's estimate.
    pub fn on_frame<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        session: &mut dyn TrackingSession,
        frame: &dyn TrackingFrame,
        camera: &CameraState,
    ) -> EnvironmentLights {
        match self.mode {
            EstimationMode::Disabled => {}
            EstimationMode::Ambient => {
                if let Some(estimate) = frame.light_estimate().filter(RawLightEstimate::is_valid) {
                    self.ambient = AmbientLight::from_color_correction(estimate.color_correction, self.exposure);
                }
            }
            EstimationMode::Hdr => {
                if let Some(estimate) = frame.light_estimate().filter(RawLightEstimate::is_valid) {
                    self.update_hdr(backend, session, frame, camera, &estimate);
                }
            }
        }
        self.current()
    }

    fn update_hdr<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        session: &mut dyn TrackingSession,
        frame: &dyn TrackingFrame,
        camera: &CameraState,
        estimate: &RawLightEstimate,
    ) {
        if self.config.environmental_hdr_main_light_direction || self.anchor_direction.is_none() {
            self.maintain_anchor(session, camera);
            if let (Some(anchor), Some(direction)) = (&self.anchor, estimate.main_light_direction) {
                self.anchor_direction = Some(anchor.pose().inverse_rotate_vector(direction));
            }
        }

        if let Some(coefficients) = estimate.ambient_spherical_harmonics {
            self.spherical_harmonics = Some(coefficients);
        }
        if self.config.environmental_hdr_main_light_intensity {
            if let Some(intensity) = estimate.main_light_intensity {
                self.main_light_intensity = Some(intensity);
            }
        } else {
            self.main_light_intensity = Some(Vec3::ONE);
        }

        let reflections = if self.config.environmental_hdr_reflections {
            self.update_reflections(backend, frame)
        } else {
            None
        };

        let (Some(anchor), Some(local_direction), Some(intensity), Some(coefficients)) = (
            &self.anchor,
            self.anchor_direction,
            self.main_light_intensity,
            self.spherical_harmonics,
        ) else {
            return;
        };

        let brightness = intensity.max_element().max(1.0);
        let hdr = HdrLight {
            direction: anchor.pose().rotate_vector(local_direction),
            color: intensity / brightness,
            intensity: brightness * self.exposure,
            spherical_harmonics: coefficients,
            irradiance: self
                .config
                .environmental_hdr_irradiance
                .then(|| to_irradiance(&coefficients)),
            reflections,
            indirect_intensity: BASE_INDIRECT_INTENSITY,
        };
        if let Some(capture) = self.capture.take() {
            capture(&hdr);
        }
        self.last_hdr = Some(hdr);
    }

    fn maintain_anchor(&mut self, session: &mut dyn TrackingSession, camera: &CameraState) {
        let needs_new_anchor = match &self.anchor {
            None => true,
            Some(anchor) => {
                anchor.tracking_state() != TrackingState::Tracking
                    || anchor.pose().distance_to(&camera.pose) > ANCHOR_DISTANCE_THRESHOLD
            }
        };
        if !needs_new_anchor {
            return;
        }

        self.detach_anchor();
        match session.create_anchor(&camera.pose) {
            Ok(anchor) => {
                log::debug!("Light anchor created at {:?}", camera.pose.position());
                self.anchor = Some(anchor);
                self.anchor_recreations += 1;
            }
            Err(err) => log::error!("Failed to create light estimation anchor: {err}"),
        }
    }

    fn update_reflections<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        frame: &dyn TrackingFrame,
    ) -> Option<TextureHandle> {
        match frame.acquire_environmental_hdr_cube_map() {
            Ok(faces) => {
                if let Some(packed) = pack_cube_map(faces) {
                    let prefilter = self.config.environmental_hdr_specular_filter;
                    match ReflectionsTexture::upload(self.reflections.take(), backend, &packed, prefilter) {
                        Ok(texture) => self.reflections = Some(texture),
                        Err(err) => log::error!("Failed to upload reflections cube map: {err}"),
                    }
                }
            }
            Err(err) if err.is_transient() => log::trace!("Reflections cube map skipped: {err}"),
            Err(err) => log::warn!("Reflections cube map unavailable: {err}"),
        }
        self.reflections.as_ref().map(|texture| texture.handle)
    }

    /// Detach the anchor and release the reflections texture
    pub fn dispose<B: RenderBackend>(&mut self, backend: &mut B) {
        self.reset();
        if let Some(texture) = self.reflections.take() {
            texture.dispose(backend);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::front_hdr(LightEstimationMode::EnvironmentalHdr, FacingDirection::Front, EstimationMode::Disabled)]
    #[case::back_hdr(LightEstimationMode::EnvironmentalHdr, FacingDirection::Back, EstimationMode::Hdr)]
    #[case::back_ambient(LightEstimationMode::AmbientIntensity, FacingDirection::Back, EstimationMode::Ambient)]
    #[case::back_disabled(LightEstimationMode::Disabled, FacingDirection::Back, EstimationMode::Disabled)]
    fn test_mode_selection(
        #[case] mode: LightEstimationMode,
        #[case] facing: FacingDirection,
        #[case] expected: EstimationMode,
    ) {
        assert_eq!(EstimationMode::select(mode, facing), expected);
    }

    #[test]
    fn test_color_correction_decoding() {
        let ambient = AmbientLight::from_color_correction([1.0, 0.0, 1.0, 1.0], 2.0);
        assert!((ambient.color.x - 1.0 / 0.18).abs() < 1e-5);
        assert_eq!(ambient.color.y, 0.0);
        assert!((ambient.intensity - 2.0 / 0.18).abs() < 1e-4);

        let negative = AmbientLight::from_color_correction([1.0, 1.0, 1.0, -0.5], 1.0);
        assert_eq!(negative.intensity, 0.0);
    }

    #[test]
    fn test_apply_hdr_points_main_light_away_from_source() {
        let mut backend = crate::backend::RecordingBackend::new();
        let lights = EnvironmentLights {
            // Stale ambient values never leak into HDR lighting.
            ambient: AmbientLight {
                color: Vec3::X,
                intensity: 7.0,
            },
            hdr: Some(HdrLight {
                direction: Vec3::Y,
                color: Vec3::ONE,
                intensity: 2.0,
                spherical_harmonics: [0.0; 27],
                irradiance: None,
                reflections: None,
                indirect_intensity: 0.75,
            }),
        };
        lights.apply(&mut backend);
        assert_eq!(backend.main_light().unwrap().direction, -Vec3::Y);
        let indirect = backend.indirect_light().unwrap();
        assert_eq!(indirect.intensity, 0.75);
        assert_eq!(indirect.color, Vec3::ONE);
    }
}
