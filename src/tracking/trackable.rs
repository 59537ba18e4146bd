//! Tracked real-world entities

use glam::{Vec2, Vec3};

use super::Pose;

/// Tracking state of an entity, anchor or camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackingState {
    Tracking,
    /// Temporarily lost; may resume
    Paused,
    /// Will never be tracked again
    Stopped,
}

/// Provider-assigned identity of a tracked entity, stable across snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackableId(pub u64);

/// Variant tag used by type filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackableKind {
    Plane,
    Image,
    Face,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaneType {
    HorizontalUpwardFacing,
    HorizontalDownwardFacing,
    Vertical,
}

/// A detected flat surface
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    pub id: TrackableId,
    pub plane_type: PlaneType,
    pub tracking_state: TrackingState,
    /// Set once the provider merged this plane into a larger one
    pub subsumed_by: Option<TrackableId>,
    pub center_pose: Pose,
    pub extent_x: f32,
    pub extent_z: f32,
    /// Boundary in the plane's local X/Z coordinates, relative to `center_pose`
    pub polygon: Vec<Vec2>,
}

impl Plane {
    /// Whether `pose` lies inside the boundary polygon once projected onto the plane.
    pub fn is_pose_in_polygon(&self, pose: &Pose) -> bool {
        if self.polygon.len() < 3 {
            return false;
        }
        let local = self.center_pose.inverse().transform_point(pose.translation);
        point_in_polygon(Vec2::new(local.x, local.z), &self.polygon)
    }

    /// Whether the visualization for this plane must be torn down
    pub fn is_retired(&self) -> bool {
        self.subsumed_by.is_some() || self.tracking_state == TrackingState::Stopped
    }
}

/// Even-odd rule
fn point_in_polygon(p: Vec2, polygon: &[Vec2]) -> bool {
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let a = polygon[i];
        let b = polygon[j];
        if (a.y > p.y) != (b.y > p.y) {
            let x = (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x;
            if p.x < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// How an augmented image is currently being tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackingMethod {
    NotTracking,
    FullTracking,
    LastKnownPose,
}

/// A recognized reference image
#[derive(Debug, Clone, PartialEq)]
pub struct AugmentedImage {
    pub id: TrackableId,
    pub name: String,
    pub index: usize,
    pub tracking_state: TrackingState,
    pub tracking_method: TrackingMethod,
    pub center_pose: Pose,
    pub extent_x: f32,
    pub extent_z: f32,
}

/// A recognized face mesh
#[derive(Debug, Clone, PartialEq)]
pub struct AugmentedFace {
    pub id: TrackableId,
    pub tracking_state: TrackingState,
    pub center_pose: Pose,
}

/// Any other provider entity (points, instant placement, ...)
#[derive(Debug, Clone, PartialEq)]
pub struct GenericTrackable {
    pub id: TrackableId,
    pub tracking_state: TrackingState,
}

/// Everything the provider can track
#[derive(Debug, Clone, PartialEq)]
pub enum TrackedEntity {
    Plane(Plane),
    Image(AugmentedImage),
    Face(AugmentedFace),
    Other(GenericTrackable),
}

impl TrackedEntity {
    pub fn id(&self) -> TrackableId {
        match self {
            TrackedEntity::Plane(p) => p.id,
            TrackedEntity::Image(i) => i.id,
            TrackedEntity::Face(f) => f.id,
            TrackedEntity::Other(o) => o.id,
        }
    }

    pub fn tracking_state(&self) -> TrackingState {
        match self {
            TrackedEntity::Plane(p) => p.tracking_state,
            TrackedEntity::Image(i) => i.tracking_state,
            TrackedEntity::Face(f) => f.tracking_state,
            TrackedEntity::Other(o) => o.tracking_state,
        }
    }

    pub fn kind(&self) -> TrackableKind {
        match self {
            TrackedEntity::Plane(_) => TrackableKind::Plane,
            TrackedEntity::Image(_) => TrackableKind::Image,
            TrackedEntity::Face(_) => TrackableKind::Face,
            TrackedEntity::Other(_) => TrackableKind::Other,
        }
    }

    pub fn as_plane(&self) -> Option<&Plane> {
        match self {
            TrackedEntity::Plane(p) => Some(p),
            _ => None,
        }
    }
}

/// One intersection of a screen-space ray with tracked geometry
#[derive(Debug, Clone, PartialEq)]
pub struct HitResult {
    /// Distance from the camera to the hit
    pub distance: f32,
    pub hit_pose: Pose,
    pub trackable: TrackedEntity,
}

impl HitResult {
    pub fn position(&self) -> Vec3 {
        self.hit_pose.translation
    }
}
