//! Tracking snapshot pull and deduplication

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::tracking::{CameraState, SharedSession, TrackedEntity, TrackingFrame};

/// Result of one [`SessionSynchronizer::advance`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// No session attached, or a pause/resume transition is still in flight
    NoSession,
    /// Session attached but not resumed
    NotReady,
    /// The provider produced no snapshot or failed to update
    NoFrame,
    /// The snapshot has no resolvable camera
    NoCamera,
    /// Same timestamp as the previous snapshot
    Unchanged,
    /// New tracking data
    Updated,
}

impl SyncStatus {
    pub fn is_updated(&self) -> bool {
        *self == SyncStatus::Updated
    }
}

/// Pulls the latest snapshot once per tick and reports whether it carries new data
pub struct SessionSynchronizer {
    session: Option<SharedSession>,
    camera_texture_id: u32,
    texture_name_set: bool,
    resumed: Arc<AtomicBool>,
    frame: Option<Box<dyn TrackingFrame>>,
    camera: Option<CameraState>,
    last_timestamp: Option<i64>,
    all_trackables: Vec<TrackedEntity>,
    updated_trackables: Vec<TrackedEntity>,
}

impl SessionSynchronizer {
    pub fn new(camera_texture_id: u32) -> Self {
        Self {
            session: None,
            camera_texture_id,
            texture_name_set: false,
            resumed: Arc::new(AtomicBool::new(false)),
            frame: None,
            camera: None,
            last_timestamp: None,
            all_trackables: Vec::new(),
            updated_trackables: Vec::new(),
        }
    }

    /// Attach a session. Snapshot state of the previous session is dropped.
    pub fn set_session(&mut self, session: SharedSession) {
        self.clear_session();
        self.session = Some(session);
    }

    /// Detach the session and drop everything derived from it
    pub fn clear_session(&mut self) -> Option<SharedSession> {
        self.texture_name_set = false;
        self.resumed.store(false, Ordering::Release);
        self.frame = None;
        self.camera = None;
        self.last_timestamp = None;
        self.all_trackables.clear();
        self.updated_trackables.clear();
        self.session.take()
    }

    pub fn session(&self) -> Option<&SharedSession> {
        self.session.as_ref()
    }

    pub fn is_resumed(&self) -> bool {
        self.resumed.load(Ordering::Acquire)
    }

    pub fn set_resumed(&self, resumed: bool) {
        self.resumed.store(resumed, Ordering::Release);
    }

    /// Flag shared with sequenced lifecycle tasks
    pub fn resumed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.resumed)
    }

    /// Pull the latest snapshot from the session.
    pub fn advance(&mut self, transition_in_flight: bool) -> SyncStatus {
        let Some(session) = self.session.as_ref() else {
            return SyncStatus::NoSession;
        };
        if transition_in_flight {
            return SyncStatus::NoSession;
        }
        if !self.is_resumed() {
            return SyncStatus::NotReady;
        }

        let update = {
            let mut session = session.lock();
            // Texture names only need to be handed over once per session.
            if !self.texture_name_set {
                session.set_camera_texture_name(self.camera_texture_id);
                self.texture_name_set = true;
            }
            session.update()
        };

        let frame = match update {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                self.frame = None;
                return SyncStatus::NoFrame;
            }
            Err(err) => {
                if err.is_transient() {
                    log::warn!("Tracking session update skipped: {err}");
                } else {
                    log::error!("Tracking session update failed: {err}");
                }
                self.frame = None;
                return SyncStatus::NoFrame;
            }
        };

        let timestamp = frame.timestamp();
        let changed = self.last_timestamp != Some(timestamp);
        self.last_timestamp = Some(timestamp);
        self.camera = frame.camera();
        self.frame = Some(frame);

        let Some(camera) = self.camera else {
            return SyncStatus::NoCamera;
        };
        if !changed {
            return SyncStatus::Unchanged;
        }

        self.all_trackables = session.lock().all_trackables();
        self.updated_trackables = self
            .frame
            .as_ref()
            .map(|frame| frame.updated_trackables())
            .unwrap_or_default();
        log::trace!(
            "Snapshot {timestamp}: camera {:?}, {} updated trackables",
            camera.tracking_state,
            self.updated_trackables.len()
        );

        SyncStatus::Updated
    }

    /// Snapshot of the current tick
    pub fn frame(&self) -> Option<&dyn TrackingFrame> {
        self.frame.as_deref()
    }

    pub fn camera(&self) -> Option<&CameraState> {
        self.camera.as_ref()
    }

    pub fn timestamp(&self) -> Option<i64> {
        self.last_timestamp
    }

    pub fn all_trackables(&self) -> &[TrackedEntity] {
        &self.all_trackables
    }

    pub fn updated_trackables(&self) -> &[TrackedEntity] {
        &self.updated_trackables
    }
}
