//! Tracking provider interface
//!
//! The pose/tracking engine is an external collaborator. This module defines the
//! slice of it the AR view consumes: a session that produces timestamped
//! snapshots ([`TrackingFrame`]), the tracked entities, anchors, light estimates and
//! the single-tick images a snapshot can hand out.

mod config;
mod image;
mod pose;
mod trackable;

pub use config::*;
pub use image::*;
pub use pose::*;
pub use trackable::*;

use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3};
use parking_lot::Mutex;

use crate::error::TrackingError;

/// Orientation of the display relative to its natural orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayRotation {
    #[default]
    Rotation0,
    Rotation90,
    Rotation180,
    Rotation270,
}

/// Intrinsics of the GPU texture the camera image is streamed into
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraIntrinsics {
    /// Width and height in pixels
    pub image_dimensions: (u32, u32),
    pub focal_length: Vec2,
    pub principal_point: Vec2,
}

/// The tracked device camera for one snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub pose: Pose,
    pub tracking_state: TrackingState,
    pub texture_intrinsics: CameraIntrinsics,
    pub projection: Mat4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightEstimateState {
    Valid,
    NotValid,
}

/// Light estimate exactly as produced by the provider for one snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct RawLightEstimate {
    pub state: LightEstimateState,
    pub timestamp: i64,
    /// RGB color correction followed by pixel intensity, all in gamma space
    pub color_correction: [f32; 4],
    /// Unit vector pointing from the scene towards the main light
    pub main_light_direction: Option<Vec3>,
    /// Per-channel main light intensity, each >= 0
    pub main_light_intensity: Option<Vec3>,
    /// 9 bands x RGB, Environmental HDR coefficient order
    pub ambient_spherical_harmonics: Option<[f32; 27]>,
}

impl RawLightEstimate {
    pub fn not_valid(timestamp: i64) -> Self {
        Self {
            state: LightEstimateState::NotValid,
            timestamp,
            color_correction: [1.0; 4],
            main_light_direction: None,
            main_light_intensity: None,
            ambient_spherical_harmonics: None,
        }
    }

    /// Valid estimate carrying only the ambient color correction
    pub fn ambient(timestamp: i64, color_correction: [f32; 4]) -> Self {
        Self {
            state: LightEstimateState::Valid,
            color_correction,
            ..Self::not_valid(timestamp)
        }
    }

    /// Valid Environmental HDR estimate
    pub fn hdr(
        timestamp: i64,
        main_light_direction: Vec3,
        main_light_intensity: Vec3,
        ambient_spherical_harmonics: [f32; 27],
    ) -> Self {
        Self {
            state: LightEstimateState::Valid,
            main_light_direction: Some(main_light_direction),
            main_light_intensity: Some(main_light_intensity),
            ambient_spherical_harmonics: Some(ambient_spherical_harmonics),
            ..Self::not_valid(timestamp)
        }
    }

    pub fn is_valid(&self) -> bool {
        self.state == LightEstimateState::Valid
    }
}

/// A world-tracking snapshot. Only valid until the next tick.
pub trait TrackingFrame {
    /// Monotonically non-decreasing; equal to the previous value when nothing is new
    fn timestamp(&self) -> i64;

    /// `None` when the provider could not resolve a camera for this snapshot
    fn camera(&self) -> Option<CameraState>;

    /// Rotation or viewport aspect changed since the last snapshot
    fn has_display_geometry_changed(&self) -> bool;

    /// Map normalized view UVs (pairs) to camera texture UVs for the current display geometry
    fn transform_display_uv_coords(&self, uvs: &[f32]) -> Vec<f32>;

    /// Entities whose state changed in this snapshot
    fn updated_trackables(&self) -> Vec<TrackedEntity>;

    fn acquire_depth_image(&self) -> Result<DepthImage, TrackingError>;

    fn acquire_raw_depth_image(&self) -> Result<DepthImage, TrackingError>;

    fn light_estimate(&self) -> Option<RawLightEstimate>;

    /// Six RGBA half-float faces (+X, -X, +Y, -Y, +Z, -Z)
    fn acquire_environmental_hdr_cube_map(&self) -> Result<Vec<EnvironmentImage>, TrackingError> {
        Err(TrackingError::NotYetAvailable)
    }

    /// Ray cast from a view pixel, closest hit first
    fn hit_test(&self, x: f32, y: f32) -> Vec<HitResult>;
}

/// A fixed world pose maintained by the provider
pub trait Anchor: Send {
    fn pose(&self) -> Pose;

    fn tracking_state(&self) -> TrackingState;

    /// Stop tracking; the provider may free it
    fn detach(&mut self);
}

/// A running world-tracking session
pub trait TrackingSession: Send {
    /// Pull the latest snapshot
    fn update(&mut self) -> Result<Option<Box<dyn TrackingFrame>>, TrackingError>;

    /// Every entity the session knows about
    fn all_trackables(&self) -> Vec<TrackedEntity>;

    /// Texture name the provider streams camera images into
    fn set_camera_texture_name(&mut self, texture_id: u32);

    fn config(&self) -> SessionConfig;

    fn configure(&mut self, config: &SessionConfig) -> Result<(), TrackingError>;

    fn camera_config(&self) -> CameraConfig;

    fn is_depth_mode_supported(&self, mode: DepthCapability) -> bool;

    fn resume(&mut self) -> Result<(), TrackingError>;

    fn pause(&mut self);

    fn close(&mut self);

    fn set_display_geometry(&mut self, rotation: DisplayRotation, width: u32, height: u32);

    fn create_anchor(&mut self, pose: &Pose) -> Result<Box<dyn Anchor>, TrackingError>;
}

/// Session shared between the render thread and the pause/resume executor
pub type SharedSession = Arc<Mutex<Box<dyn TrackingSession>>>;

/// Wrap a session for sharing
pub fn share_session(session: Box<dyn TrackingSession>) -> SharedSession {
    Arc::new(Mutex::new(session))
}
