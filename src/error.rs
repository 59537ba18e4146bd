//! Error types

use thiserror::Error;

use crate::backend::BackendError;

/// Failures reported by the tracking provider
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackingError {
    #[error("Camera not available")]
    CameraNotAvailable,
    #[error("Deadline exceeded")]
    DeadlineExceeded,
    #[error("Not yet available")]
    NotYetAvailable,
    #[error("Session paused")]
    SessionPaused,
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),
    #[error("Fatal tracking error: {0}")]
    Fatal(String),
}

impl TrackingError {
    /// Failures that clear up on their own; the next tick simply retries.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TrackingError::CameraNotAvailable
                | TrackingError::DeadlineExceeded
                | TrackingError::NotYetAvailable
        )
    }
}

/// Failure of a task queued on the pause/resume sequencer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("Task failed: {0}")]
    Failed(String),
    #[error("Task panicked: {0}")]
    Panicked(String),
    #[error("Task cancelled: owning view was destroyed")]
    Cancelled,
}

/// Top-level error of the AR view
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArError {
    #[error("No tracking session attached")]
    NoSession,
    #[error(transparent)]
    Tracking(#[from] TrackingError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Task(#[from] TaskError),
}

pub type ArResult<T> = Result<T, ArError>;
