//! AR scene view orchestrator
//!
//! [`ArSceneView`] owns the renderer backend and every per-frame component. The
//! host calls [`ArSceneView::do_frame`] once per display refresh on the render
//! thread; everything else (session attachment, pause/resume, layout) is driven
//! from the same thread, except the session half of the async lifecycle calls.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::backend::RenderBackend;
use crate::error::{ArError, ArResult, TaskError, TrackingError};
use crate::frame::*;
use crate::lighting::{EnvironmentLights, EstimationMode, HdrLight, LightEstimationConfig, LightEstimator};
use crate::resources::{CameraStream, DepthMode, DepthOcclusionMode};
use crate::scene::PlaneRenderer;
use crate::trackables::{self, TrackableQuery};
use crate::tracking::*;
use crate::ArViewConfig;

/// Result of one vsync callback; `Ran` carries what the synchronizer reported
pub type FrameOutcome = TickOutcome<SyncStatus>;

type SessionConfigListener = Box<dyn FnMut(&SessionConfig) + Send>;

#[derive(Debug, Clone, Copy, Default)]
struct DisplayGeometry {
    rotation: DisplayRotation,
    width: u32,
    height: u32,
}

impl DisplayGeometry {
    fn is_known(&self) -> bool {
        self.width != 0 && self.height != 0
    }
}

fn resume_session(session: &SharedSession, display: DisplayGeometry) -> Result<(), TrackingError> {
    let mut session = session.lock();
    session.resume()?;
    if display.is_known() {
        session.set_display_geometry(display.rotation, display.width, display.height);
    }
    Ok(())
}

fn destroy_session(session: &SharedSession) {
    let mut session = session.lock();
    session.pause();
    session.close();
}

/// Keeps the rendered scene in step with the tracking session
pub struct ArSceneView<B: RenderBackend> {
    backend: B,
    config: ArViewConfig,
    scheduler: Arc<FrameScheduler>,
    synchronizer: SessionSynchronizer,
    sequencer: PauseResumeSequencer,
    render_queue: RenderThreadQueue,
    lifecycle: LifecycleToken,
    camera_stream: CameraStream,
    light_estimator: LightEstimator,
    plane_renderer: PlaneRenderer,
    camera_config: Option<CameraConfig>,
    session_config: Option<SessionConfig>,
    on_session_config_change: Option<SessionConfigListener>,
    environment_lights: EnvironmentLights,
    display: DisplayGeometry,
}

impl<B: RenderBackend> ArSceneView<B> {
    /// Create the view and its GPU resources. `camera_texture_id` is the texture
    /// name the session writes camera images into.
    pub fn new(mut backend: B, camera_texture_id: u32, config: ArViewConfig) -> ArResult<Self> {
        let camera_stream = CameraStream::new(
            &mut backend,
            camera_texture_id,
            config.camera_stream_render_priority,
            config.depth_occlusion,
        )?;
        let mut plane_renderer = PlaneRenderer::new(&mut backend)?;
        plane_renderer.set_mode(config.plane_renderer_mode);

        let render_queue = RenderThreadQueue::new();
        let sequencer = PauseResumeSequencer::new(Arc::new(render_queue.executor()));
        let light_estimator = LightEstimator::new(
            config.light_estimation,
            FacingDirection::default(),
            config.camera_exposure_factor,
        );
        let environment_lights = light_estimator.current();

        log::info!("AR scene view created for camera texture {camera_texture_id}");
        Ok(Self {
            backend,
            scheduler: Arc::new(FrameScheduler::new(config.max_frames_per_second, config.frame_rate)),
            synchronizer: SessionSynchronizer::new(camera_texture_id),
            sequencer,
            render_queue,
            lifecycle: LifecycleToken::new(),
            camera_stream,
            light_estimator,
            plane_renderer,
            camera_config: None,
            session_config: None,
            on_session_config_change: None,
            environment_lights,
            display: DisplayGeometry::default(),
            config,
        })
    }

    // Session

    /// Attach `session`, closing the previous one.
    pub fn set_session(&mut self, session: Box<dyn TrackingSession>) -> ArResult<()> {
        if let Some(previous) = self.synchronizer.clear_session() {
            log::info!("Replacing tracking session");
            destroy_session(&previous);
        }

        let session = share_session(session);
        let (camera_config, session_config) = {
            let session = session.lock();
            (session.camera_config(), session.config())
        };

        let front_facing = camera_config.facing_direction == FacingDirection::Front;
        // Mirrored capture flips the triangle winding.
        self.backend.set_front_face_winding_inverted(front_facing);
        self.scheduler.set_max_frames_per_second(camera_config.fps_range.1);
        self.camera_config = Some(camera_config);
        self.synchronizer.set_session(session);

        let light_estimation = if front_facing {
            LightEstimationConfig::DISABLED
        } else {
            self.config.light_estimation
        };
        self.apply_light_estimation_config(light_estimation);

        log::info!(
            "Tracking session attached ({:?} camera, {} fps max)",
            camera_config.facing_direction,
            camera_config.fps_range.1
        );
        self.set_session_config(session_config, false)
    }

    pub fn session(&self) -> Option<&SharedSession> {
        self.synchronizer.session()
    }

    /// Apply `config`; with `configure_session` the session is reconfigured first.
    pub fn set_session_config(&mut self, config: SessionConfig, configure_session: bool) -> ArResult<()> {
        match self.synchronizer.session() {
            Some(session) => {
                let mut session = session.lock();
                if configure_session {
                    session.configure(&config)?;
                }
                self.camera_stream
                    .check_if_depth_is_enabled(&mut self.backend, &**session, &config)?;
            }
            None if configure_session => return Err(ArError::NoSession),
            None => {}
        }

        self.plane_renderer
            .set_enabled(&mut self.backend, config.plane_finding_mode != PlaneFindingMode::Disabled)?;
        if let Some(listener) = self.on_session_config_change.as_mut() {
            listener(&config);
        }
        self.session_config = Some(config);
        Ok(())
    }

    pub fn session_config(&self) -> Option<&SessionConfig> {
        self.session_config.as_ref()
    }

    pub fn camera_config(&self) -> Option<&CameraConfig> {
        self.camera_config.as_ref()
    }

    /// Called with the active configuration every time it is applied
    pub fn set_on_session_config_change(&mut self, listener: impl FnMut(&SessionConfig) + Send + 'static) {
        self.on_session_config_change = Some(Box::new(listener));
    }

    // Lifecycle

    /// Resume the session, then the frame loop.
    pub fn resume(&mut self) -> ArResult<()> {
        if let Some(session) = self.synchronizer.session() {
            resume_session(session, self.display)?;
            self.synchronizer.set_resumed(true);
        }
        self.scheduler.resume();
        log::info!("AR scene view resumed");
        Ok(())
    }

    /// Pause the frame loop, then the session.
    pub fn pause(&mut self) {
        self.scheduler.pause();
        self.synchronizer.set_resumed(false);
        if let Some(session) = self.synchronizer.session() {
            session.lock().pause();
        }
        log::info!("AR scene view paused");
    }

    /// Resume the session on `executor`, then the frame loop on the render thread.
    ///
    /// Queued behind any pause or resume still in flight. The handle completes
    /// on the render thread, during [`do_frame`](Self::do_frame) or
    /// [`pump_render_thread`](Self::pump_render_thread).
    pub fn resume_async(&mut self, executor: Arc<dyn Executor>) -> TaskHandle {
        let session = self.synchronizer.session().cloned();
        let has_session = session.is_some();
        let display = self.display;
        let session_token = self.lifecycle.clone();
        let scene_token = self.lifecycle.clone();
        let resumed = self.synchronizer.resumed_flag();
        let scheduler = Arc::clone(&self.scheduler);

        let task = SequencedTask::new()
            .then(executor, move || {
                session_token.check()?;
                match &session {
                    Some(session) => {
                        resume_session(session, display).map_err(|err| TaskError::Failed(err.to_string()))
                    }
                    None => Ok(()),
                }
            })
            .then(self.sequencer.render_thread(), move || {
                scene_token.check()?;
                if has_session {
                    resumed.store(true, Ordering::Release);
                }
                scheduler.resume();
                log::info!("AR scene view resumed");
                Ok(())
            });
        self.sequencer.enqueue_task(task)
    }

    /// Pause the frame loop on the render thread, then the session on `executor`.
    pub fn pause_async(&mut self, executor: Arc<dyn Executor>) -> TaskHandle {
        let session = self.synchronizer.session().cloned();
        let scene_token = self.lifecycle.clone();
        let session_token = self.lifecycle.clone();
        let resumed = self.synchronizer.resumed_flag();
        let scheduler = Arc::clone(&self.scheduler);

        let task = SequencedTask::new()
            .then(self.sequencer.render_thread(), move || {
                scene_token.check()?;
                scheduler.pause();
                resumed.store(false, Ordering::Release);
                Ok(())
            })
            .then(executor, move || {
                session_token.check()?;
                if let Some(session) = &session {
                    session.lock().pause();
                }
                log::info!("AR scene view paused");
                Ok(())
            });
        self.sequencer.enqueue_task(task)
    }

    /// Run completions and scene steps posted to the render thread
    pub fn pump_render_thread(&self) -> usize {
        self.render_queue.pump()
    }

    /// Tear everything down and hand the backend back.
    ///
    /// Queued lifecycle steps that have not run yet complete as cancelled, as
    /// does a background step whose completion lands after teardown.
    pub fn destroy(self) -> B {
        self.lifecycle.invalidate();
        self.sequencer.shutdown();
        self.scheduler.pause();
        self.render_queue.pump();

        let Self {
            mut backend,
            camera_stream,
            mut light_estimator,
            plane_renderer,
            mut synchronizer,
            ..
        } = self;
        light_estimator.dispose(&mut backend);
        camera_stream.dispose(&mut backend);
        plane_renderer.dispose(&mut backend);
        if let Some(session) = synchronizer.clear_session() {
            destroy_session(&session);
        }
        log::info!("AR scene view destroyed");
        backend
    }

    /// Forward the view size and display rotation to the session
    pub fn on_layout(&mut self, width: u32, height: u32, rotation: DisplayRotation) {
        self.display = DisplayGeometry {
            rotation,
            width,
            height,
        };
        if let Some(session) = self.synchronizer.session() {
            session.lock().set_display_geometry(rotation, width, height);
        }
    }

    // Frame loop

    /// Vsync entry point; `now_nanos` is a monotonic timestamp.
    pub fn do_frame(&mut self, now_nanos: u64) -> FrameOutcome {
        self.render_queue.pump();
        let scheduler = Arc::clone(&self.scheduler);
        scheduler.tick(now_nanos, || self.on_begin_frame())
    }

    /// [`do_frame`](Self::do_frame) timed by the scheduler's own clock
    pub fn on_vsync(&mut self) -> FrameOutcome {
        self.render_queue.pump();
        let scheduler = Arc::clone(&self.scheduler);
        scheduler.on_vsync(|| self.on_begin_frame())
    }

    /// Pull the latest snapshot and, when it is new, update every component.
    pub fn on_begin_frame(&mut self) -> SyncStatus {
        let status = self.synchronizer.advance(!self.sequencer.is_idle());
        match status {
            SyncStatus::Updated => self.on_snapshot_updated(),
            SyncStatus::NoCamera => self.environment_lights = self.light_estimator.on_camera_lost(),
            _ => {}
        }
        status
    }

    fn on_snapshot_updated(&mut self) {
        let (Some(frame), Some(camera)) = (self.synchronizer.frame(), self.synchronizer.camera().copied()) else {
            return;
        };

        if !self.camera_stream.is_texture_initialized() {
            if let Err(err) = self
                .camera_stream
                .initialize_texture(&mut self.backend, &camera.texture_intrinsics)
            {
                log::error!("Failed to initialize camera stream texture: {err}");
            }
        }
        if frame.has_display_geometry_changed() {
            self.camera_stream.recalculate_camera_uvs(&mut self.backend, frame);
        }

        self.backend.set_camera_pose(&camera.pose, camera.projection);

        if self.camera_stream.is_occlusion_active() {
            let depth_image = match self.camera_stream.depth_mode() {
                DepthMode::Depth => Some(frame.acquire_depth_image()),
                DepthMode::RawDepth => Some(frame.acquire_raw_depth_image()),
                DepthMode::NoDepth => None,
            };
            match depth_image {
                Some(Ok(image)) => self.camera_stream.recalculate_occlusion(&mut self.backend, image),
                Some(Err(err)) if err.is_transient() => log::trace!("Depth image skipped: {err}"),
                Some(Err(err)) => log::warn!("Depth image unavailable: {err}"),
                None => {}
            }
        }

        if self.light_estimator.mode() != EstimationMode::Disabled {
            if let Some(session) = self.synchronizer.session() {
                let mut session = session.lock();
                self.environment_lights =
                    self.light_estimator
                        .on_frame(&mut self.backend, &mut **session, frame, &camera);
            }
            self.environment_lights.apply(&mut self.backend);
        }

        if self.plane_renderer.is_enabled() {
            let all_planes: Vec<Plane> = trackables::planes(self.synchronizer.all_trackables(), &[])
                .into_iter()
                .cloned()
                .collect();
            let updated_planes: Vec<Plane> = trackables::planes(self.synchronizer.updated_trackables(), &[])
                .into_iter()
                .cloned()
                .collect();
            if let Err(err) = self.plane_renderer.update(
                &mut self.backend,
                frame,
                &all_planes,
                &updated_planes,
                self.display.width,
                self.display.height,
            ) {
                log::error!("Plane visualization update failed: {err}");
            }
        }
    }

    pub fn set_max_frames_per_second(&mut self, max_frames_per_second: u32) {
        self.scheduler.set_max_frames_per_second(max_frames_per_second);
    }

    pub fn set_frame_rate(&mut self, frame_rate: FrameRate) {
        self.scheduler.set_frame_rate(frame_rate);
    }

    pub fn scheduler(&self) -> &Arc<FrameScheduler> {
        &self.scheduler
    }

    pub fn sequencer(&self) -> &PauseResumeSequencer {
        &self.sequencer
    }

    // Accessors

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn config(&self) -> &ArViewConfig {
        &self.config
    }

    /// Snapshot of the current tick; do not hold on to it across ticks
    pub fn ar_frame(&self) -> Option<&dyn TrackingFrame> {
        self.synchronizer.frame()
    }

    pub fn synchronizer(&self) -> &SessionSynchronizer {
        &self.synchronizer
    }

    pub fn trackables(&self) -> TrackableQuery<'_> {
        TrackableQuery::new(
            self.synchronizer.all_trackables(),
            self.synchronizer.updated_trackables(),
        )
    }

    pub fn camera_stream(&self) -> &CameraStream {
        &self.camera_stream
    }

    /// Camera stream together with the backend its setters need
    pub fn camera_stream_mut(&mut self) -> (&mut CameraStream, &mut B) {
        (&mut self.camera_stream, &mut self.backend)
    }

    pub fn set_camera_stream_render_priority(&mut self, priority: u8) {
        self.camera_stream.set_render_priority(&mut self.backend, priority);
        self.config.camera_stream_render_priority = self.camera_stream.render_priority();
    }

    pub fn set_depth_occlusion_mode(&mut self, mode: DepthOcclusionMode) -> ArResult<()> {
        self.camera_stream.set_depth_occlusion_mode(&mut self.backend, mode)?;
        self.config.depth_occlusion = mode;
        Ok(())
    }

    pub fn plane_renderer(&self) -> &PlaneRenderer {
        &self.plane_renderer
    }

    /// Plane renderer together with the backend its setters need
    pub fn plane_renderer_mut(&mut self) -> (&mut PlaneRenderer, &mut B) {
        (&mut self.plane_renderer, &mut self.backend)
    }

    pub fn light_estimator(&self) -> &LightEstimator {
        &self.light_estimator
    }

    pub fn light_estimation_config(&self) -> &LightEstimationConfig {
        self.light_estimator.config()
    }

    /// Replace the light estimation configuration; estimated state starts over.
    pub fn set_light_estimation_config(&mut self, config: LightEstimationConfig) {
        self.config.light_estimation = config;
        self.apply_light_estimation_config(config);
    }

    fn apply_light_estimation_config(&mut self, config: LightEstimationConfig) {
        let facing = self
            .camera_config
            .map(|camera| camera.facing_direction)
            .unwrap_or_default();
        self.light_estimator.set_config(config, facing);
        self.environment_lights = self.light_estimator.current();
    }

    pub fn set_camera_exposure_factor(&mut self, exposure: f32) {
        self.light_estimator.set_camera_exposure_factor(exposure);
        self.config.camera_exposure_factor = exposure;
    }

    /// Lights derived from the most recent estimate
    pub fn estimated_environment_lights(&self) -> &EnvironmentLights {
        &self.environment_lights
    }

    /// Receive the next complete HDR estimate, once
    pub fn capture_hdr_light_estimate(&mut self, callback: impl FnOnce(&HdrLight) + Send + 'static) {
        self.light_estimator.capture_hdr_light_estimate(callback);
    }
}
