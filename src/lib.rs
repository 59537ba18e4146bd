//! AR Scene Sync - frame-synchronized bridge between a tracking provider and a renderer
//!
//! Once per display refresh the view pulls the newest tracking snapshot and, when it
//! carries new data, drives the components that keep the rendered scene aligned with
//! the physical world:
//! - **Camera stream**: full-screen camera feed with optional depth occlusion
//! - **Light estimation**: ambient or world-anchored HDR lighting with carry-forward
//! - **Plane visualization**: one renderable per detected plane plus a focus spotlight
//!
//! # Features
//! - Frame-rate throttling and re-entrancy protection on the vsync callback
//! - Serialized pause/resume transitions that may block off the render thread
//! - Renderer access through the [`RenderBackend`] trait, with a recording backend
//!   for headless use

pub mod backend;
pub mod error;
pub mod frame;
pub mod lighting;
pub mod resources;
pub mod scene;
pub mod trackables;
pub mod tracking;
pub mod view;

pub use backend::{RecordingBackend, RenderBackend};
pub use error::{ArError, ArResult, TaskError, TrackingError};
pub use frame::{FrameRate, PauseResumeSequencer, SyncStatus, TickOutcome};
pub use lighting::{EnvironmentLights, LightEstimationConfig};
pub use resources::DepthOcclusionMode;
pub use scene::PlaneRendererMode;
pub use view::{ArSceneView, FrameOutcome};

/// Configuration for creating an [`ArSceneView`]
#[derive(Debug, Clone)]
pub struct ArViewConfig {
    /// Upper bound on processed frames per second; replaced by the camera's fps bound
    /// once a session is attached
    pub max_frames_per_second: u32,
    /// Further divides the processed frame rate
    pub frame_rate: FrameRate,
    /// Render priority of the camera feed (0 first, 7 last)
    pub camera_stream_render_priority: u8,
    pub light_estimation: LightEstimationConfig,
    pub plane_renderer_mode: PlaneRendererMode,
    pub depth_occlusion: DepthOcclusionMode,
    /// Scales estimated light intensities to the renderer camera's exposure
    pub camera_exposure_factor: f32,
}

impl ArViewConfig {
    pub fn with_max_frames_per_second(mut self, max_frames_per_second: u32) -> Self {
        self.max_frames_per_second = max_frames_per_second;
        self
    }

    pub fn with_frame_rate(mut self, frame_rate: FrameRate) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    pub fn with_camera_stream_render_priority(mut self, priority: u8) -> Self {
        self.camera_stream_render_priority = priority;
        self
    }

    pub fn with_light_estimation(mut self, light_estimation: LightEstimationConfig) -> Self {
        self.light_estimation = light_estimation;
        self
    }

    pub fn with_plane_renderer_mode(mut self, mode: PlaneRendererMode) -> Self {
        self.plane_renderer_mode = mode;
        self
    }

    pub fn with_depth_occlusion(mut self, mode: DepthOcclusionMode) -> Self {
        self.depth_occlusion = mode;
        self
    }

    pub fn with_camera_exposure_factor(mut self, exposure: f32) -> Self {
        self.camera_exposure_factor = exposure;
        self
    }
}

impl Default for ArViewConfig {
    fn default() -> Self {
        Self {
            max_frames_per_second: 60,
            frame_rate: FrameRate::Full,
            camera_stream_render_priority: resources::RENDER_PRIORITY_LAST,
            light_estimation: LightEstimationConfig::default(),
            plane_renderer_mode: PlaneRendererMode::default(),
            depth_occlusion: DepthOcclusionMode::default(),
            camera_exposure_factor: 1.0,
        }
    }
}
