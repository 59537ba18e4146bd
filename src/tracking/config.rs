//! Tracking session and camera configuration

/// Which surfaces the provider searches for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaneFindingMode {
    Disabled,
    #[default]
    Horizontal,
    Vertical,
    HorizontalAndVertical,
}

/// Light estimation requested from the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LightEstimationMode {
    Disabled,
    AmbientIntensity,
    #[default]
    EnvironmentalHdr,
}

/// Depth capability requested from (or supported by) the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DepthCapability {
    #[default]
    Disabled,
    /// Smoothed depth
    Automatic,
    /// Unsmoothed depth with confidence
    RawDepthOnly,
}

/// How `update()` behaves when no new camera image is available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateMode {
    /// Returns immediately with the latest image (required to not stall rendering)
    #[default]
    LatestCameraImage,
    Blocking,
}

/// Active configuration of a tracking session
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionConfig {
    pub plane_finding_mode: PlaneFindingMode,
    pub light_estimation_mode: LightEstimationMode,
    pub depth_mode: DepthCapability,
    pub update_mode: UpdateMode,
}

impl SessionConfig {
    pub fn with_plane_finding_mode(mut self, mode: PlaneFindingMode) -> Self {
        self.plane_finding_mode = mode;
        self
    }

    pub fn with_light_estimation_mode(mut self, mode: LightEstimationMode) -> Self {
        self.light_estimation_mode = mode;
        self
    }

    pub fn with_depth_mode(mut self, mode: DepthCapability) -> Self {
        self.depth_mode = mode;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FacingDirection {
    #[default]
    Back,
    Front,
}

/// Capture configuration of the camera backing the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraConfig {
    pub facing_direction: FacingDirection,
    /// Inclusive capture frame-rate range
    pub fps_range: (u32, u32),
    pub image_size: (u32, u32),
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            facing_direction: FacingDirection::Back,
            fps_range: (30, 30),
            image_size: (640, 480),
        }
    }
}
