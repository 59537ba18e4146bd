//! Scripted tracking provider shared by the integration tests.
//!
//! [`FakeSession`] hands out queued [`FakeFrame`]s one per `update()` call and
//! records every lifecycle call into a shared [`SessionProbe`], so tests can keep
//! inspecting the session after the view has taken ownership of it.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ar_scene_sync::error::TrackingError;
use ar_scene_sync::tracking::*;
use ar_scene_sync::{ArSceneView, ArViewConfig, RecordingBackend};
use glam::{Mat4, Vec2, Vec3};
use parking_lot::Mutex;

pub const CAMERA_TEXTURE_ID: u32 = 7;
pub const DEPTH_WIDTH: u32 = 160;
pub const DEPTH_HEIGHT: u32 = 90;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn camera_at(position: Vec3) -> CameraState {
    CameraState {
        pose: Pose::from_translation(position),
        tracking_state: TrackingState::Tracking,
        texture_intrinsics: CameraIntrinsics {
            image_dimensions: (640, 480),
            focal_length: Vec2::splat(500.0),
            principal_point: Vec2::new(320.0, 240.0),
        },
        projection: Mat4::IDENTITY,
    }
}

/// Depth image filled with `value`, counting releases into `released`
pub fn depth_image(value: u8, released: &Arc<AtomicUsize>) -> DepthImage {
    let data = vec![value; (DEPTH_WIDTH * DEPTH_HEIGHT * 2) as usize];
    let counter = Arc::clone(released);
    AcquiredImage::new(DEPTH_WIDTH, DEPTH_HEIGHT, ImageFormat::Depth16, data).with_release_hook(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    })
}

pub fn square_plane(id: u64, center: Vec3) -> Plane {
    Plane {
        id: TrackableId(id),
        plane_type: PlaneType::HorizontalUpwardFacing,
        tracking_state: TrackingState::Tracking,
        subsumed_by: None,
        center_pose: Pose::from_translation(center),
        extent_x: 2.0,
        extent_z: 2.0,
        polygon: vec![
            Vec2::new(-1.0, -1.0),
            Vec2::new(1.0, -1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(-1.0, 1.0),
        ],
    }
}

pub fn hit_on(plane: &Plane, distance: f32) -> HitResult {
    HitResult {
        distance,
        hit_pose: plane.center_pose,
        trackable: TrackedEntity::Plane(plane.clone()),
    }
}

/// Result of one depth acquisition
#[derive(Debug, Clone)]
pub enum DepthScript {
    Fail(TrackingError),
    Image(u8),
}

/// One scripted snapshot
#[derive(Clone)]
pub struct FakeFrame {
    pub timestamp: i64,
    pub camera: Option<CameraState>,
    pub display_geometry_changed: bool,
    pub updated: Vec<TrackedEntity>,
    pub depth: DepthScript,
    pub light: Option<RawLightEstimate>,
    pub hits: Vec<HitResult>,
    pub depth_released: Arc<AtomicUsize>,
}

impl FakeFrame {
    pub fn new(timestamp: i64) -> Self {
        Self {
            timestamp,
            camera: Some(camera_at(Vec3::ZERO)),
            display_geometry_changed: false,
            updated: Vec::new(),
            depth: DepthScript::Fail(TrackingError::NotYetAvailable),
            light: None,
            hits: Vec::new(),
            depth_released: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_camera_at(mut self, position: Vec3) -> Self {
        self.camera = Some(camera_at(position));
        self
    }

    pub fn without_camera(mut self) -> Self {
        self.camera = None;
        self
    }

    pub fn with_display_geometry_changed(mut self) -> Self {
        self.display_geometry_changed = true;
        self
    }

    pub fn with_updated(mut self, updated: Vec<TrackedEntity>) -> Self {
        self.updated = updated;
        self
    }

    pub fn with_depth(mut self, depth: DepthScript, released: &Arc<AtomicUsize>) -> Self {
        self.depth = depth;
        self.depth_released = Arc::clone(released);
        self
    }

    pub fn with_light(mut self, light: RawLightEstimate) -> Self {
        self.light = Some(light);
        self
    }

    pub fn with_hits(mut self, hits: Vec<HitResult>) -> Self {
        self.hits = hits;
        self
    }

    fn depth(&self) -> Result<DepthImage, TrackingError> {
        match &self.depth {
            DepthScript::Fail(err) => Err(err.clone()),
            DepthScript::Image(value) => Ok(depth_image(*value, &self.depth_released)),
        }
    }
}

impl TrackingFrame for FakeFrame {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn camera(&self) -> Option<CameraState> {
        self.camera
    }

    fn has_display_geometry_changed(&self) -> bool {
        self.display_geometry_changed
    }

    fn transform_display_uv_coords(&self, uvs: &[f32]) -> Vec<f32> {
        // Quarter turn: (u, v) -> (v, u)
        uvs.chunks_exact(2).flat_map(|uv| [uv[1], uv[0]]).collect()
    }

    fn updated_trackables(&self) -> Vec<TrackedEntity> {
        self.updated.clone()
    }

    fn acquire_depth_image(&self) -> Result<DepthImage, TrackingError> {
        self.depth()
    }

    fn acquire_raw_depth_image(&self) -> Result<DepthImage, TrackingError> {
        self.depth()
    }

    fn light_estimate(&self) -> Option<RawLightEstimate> {
        self.light.clone()
    }

    fn hit_test(&self, _x: f32, _y: f32) -> Vec<HitResult> {
        self.hits.clone()
    }
}

/// Anchor whose tracking state tests can flip
#[derive(Debug)]
pub struct AnchorState {
    pub pose: Pose,
    pub tracking_state: TrackingState,
    pub detached: bool,
}

pub struct FakeAnchor {
    state: Arc<Mutex<AnchorState>>,
}

impl Anchor for FakeAnchor {
    fn pose(&self) -> Pose {
        self.state.lock().pose
    }

    fn tracking_state(&self) -> TrackingState {
        self.state.lock().tracking_state
    }

    fn detach(&mut self) {
        let mut state = self.state.lock();
        state.detached = true;
        state.tracking_state = TrackingState::Stopped;
    }
}

/// Everything a [`FakeSession`] has been asked to do
#[derive(Default)]
pub struct ProbeState {
    pub frames: VecDeque<Result<Option<FakeFrame>, TrackingError>>,
    pub all_trackables: Vec<TrackedEntity>,
    pub config: SessionConfig,
    pub camera_config: CameraConfig,
    pub supported_depth: Vec<DepthCapability>,
    pub anchors: Vec<Arc<Mutex<AnchorState>>>,
    pub fail_anchor_creation: bool,
    pub events: Vec<String>,
    pub updates: usize,
    pub pause_delay: Option<Duration>,
}

#[derive(Clone, Default)]
pub struct SessionProbe {
    pub state: Arc<Mutex<ProbeState>>,
}

impl SessionProbe {
    pub fn push_frame(&self, frame: FakeFrame) {
        self.state.lock().frames.push_back(Ok(Some(frame)));
    }

    pub fn push_error(&self, err: TrackingError) {
        self.state.lock().frames.push_back(Err(err));
    }

    pub fn events(&self) -> Vec<String> {
        self.state.lock().events.clone()
    }

    pub fn updates(&self) -> usize {
        self.state.lock().updates
    }

    pub fn anchors_created(&self) -> usize {
        self.state.lock().anchors.len()
    }

    pub fn anchor(&self, index: usize) -> Arc<Mutex<AnchorState>> {
        Arc::clone(&self.state.lock().anchors[index])
    }

    pub fn set_all_trackables(&self, trackables: Vec<TrackedEntity>) {
        self.state.lock().all_trackables = trackables;
    }
}

pub struct FakeSession {
    probe: SessionProbe,
}

impl FakeSession {
    pub fn new() -> (Box<dyn TrackingSession>, SessionProbe) {
        Self::with_config(SessionConfig::default(), CameraConfig::default())
    }

    pub fn with_config(config: SessionConfig, camera_config: CameraConfig) -> (Box<dyn TrackingSession>, SessionProbe) {
        let probe = SessionProbe::default();
        {
            let mut state = probe.state.lock();
            state.config = config;
            state.camera_config = camera_config;
            state.supported_depth = vec![DepthCapability::Automatic, DepthCapability::RawDepthOnly];
        }
        let session = FakeSession { probe: probe.clone() };
        (Box::new(session), probe)
    }

    fn record(&self, event: impl Into<String>) {
        self.probe.state.lock().events.push(event.into());
    }
}

impl TrackingSession for FakeSession {
    fn update(&mut self) -> Result<Option<Box<dyn TrackingFrame>>, TrackingError> {
        let mut state = self.probe.state.lock();
        state.updates += 1;
        match state.frames.pop_front() {
            Some(Ok(Some(frame))) => {
                for entity in &frame.updated {
                    match state.all_trackables.iter_mut().find(|known| known.id() == entity.id()) {
                        Some(known) => *known = entity.clone(),
                        None => state.all_trackables.push(entity.clone()),
                    }
                }
                Ok(Some(Box::new(frame)))
            }
            Some(Ok(None)) | None => Ok(None),
            Some(Err(err)) => Err(err),
        }
    }

    fn all_trackables(&self) -> Vec<TrackedEntity> {
        self.probe.state.lock().all_trackables.clone()
    }

    fn set_camera_texture_name(&mut self, texture_id: u32) {
        self.record(format!("texture {texture_id}"));
    }

    fn config(&self) -> SessionConfig {
        self.probe.state.lock().config.clone()
    }

    fn configure(&mut self, config: &SessionConfig) -> Result<(), TrackingError> {
        self.probe.state.lock().config = config.clone();
        self.record("configure");
        Ok(())
    }

    fn camera_config(&self) -> CameraConfig {
        self.probe.state.lock().camera_config
    }

    fn is_depth_mode_supported(&self, mode: DepthCapability) -> bool {
        self.probe.state.lock().supported_depth.contains(&mode)
    }

    fn resume(&mut self) -> Result<(), TrackingError> {
        self.record("resume");
        Ok(())
    }

    fn pause(&mut self) {
        let delay = self.probe.state.lock().pause_delay;
        self.record("pause begin");
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        self.record("pause end");
    }

    fn close(&mut self) {
        self.record("close");
    }

    fn set_display_geometry(&mut self, rotation: DisplayRotation, width: u32, height: u32) {
        self.record(format!("display {rotation:?} {width}x{height}"));
    }

    fn create_anchor(&mut self, pose: &Pose) -> Result<Box<dyn Anchor>, TrackingError> {
        let mut state = self.probe.state.lock();
        if state.fail_anchor_creation {
            return Err(TrackingError::ResourceExhausted("anchor limit".to_string()));
        }
        let anchor = Arc::new(Mutex::new(AnchorState {
            pose: *pose,
            tracking_state: TrackingState::Tracking,
            detached: false,
        }));
        state.anchors.push(Arc::clone(&anchor));
        Ok(Box::new(FakeAnchor { state: anchor }))
    }
}

/// View with a fake session attached and resumed
pub fn resumed_view(
    config: ArViewConfig,
    session_config: SessionConfig,
) -> (ArSceneView<RecordingBackend>, SessionProbe) {
    let mut view = ArSceneView::new(RecordingBackend::new(), CAMERA_TEXTURE_ID, config).unwrap();
    let (session, probe) = FakeSession::with_config(session_config, CameraConfig::default());
    view.set_session(session).unwrap();
    view.on_layout(1080, 1920, DisplayRotation::Rotation0);
    view.resume().unwrap();
    (view, probe)
}
