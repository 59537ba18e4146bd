//! Filtering of tracked entities by kind and state
//!
//! All functions borrow from the entity slice held by the synchronizer, so the
//! results live no longer than the current snapshot.

use crate::tracking::{
    AugmentedFace, AugmentedImage, Plane, TrackableKind, TrackedEntity, TrackingMethod, TrackingState,
};

fn state_matches(entity: &TrackedEntity, states: &[TrackingState]) -> bool {
    states.is_empty() || states.contains(&entity.tracking_state())
}

/// Entities of `kind`; an empty `states` slice accepts any state
pub fn of_kind<'a>(
    entities: &'a [TrackedEntity],
    kind: TrackableKind,
    states: &[TrackingState],
) -> Vec<&'a TrackedEntity> {
    entities
        .iter()
        .filter(|e| e.kind() == kind && state_matches(e, states))
        .collect()
}

/// Planes in one of `states`; an empty slice accepts any state
pub fn planes<'a>(entities: &'a [TrackedEntity], states: &[TrackingState]) -> Vec<&'a Plane> {
    entities
        .iter()
        .filter(|e| state_matches(e, states))
        .filter_map(TrackedEntity::as_plane)
        .collect()
}

pub fn augmented_images<'a>(
    entities: &'a [TrackedEntity],
    state: Option<TrackingState>,
    method: Option<TrackingMethod>,
) -> Vec<&'a AugmentedImage> {
    entities
        .iter()
        .filter_map(|e| match e {
            TrackedEntity::Image(image) => Some(image),
            _ => None,
        })
        .filter(|image| state.map_or(true, |s| image.tracking_state == s))
        .filter(|image| method.map_or(true, |m| image.tracking_method == m))
        .collect()
}

pub fn augmented_faces<'a>(
    entities: &'a [TrackedEntity],
    state: Option<TrackingState>,
) -> Vec<&'a AugmentedFace> {
    entities
        .iter()
        .filter_map(|e| match e {
            TrackedEntity::Face(face) => Some(face),
            _ => None,
        })
        .filter(|face| state.map_or(true, |s| face.tracking_state == s))
        .collect()
}

/// Snapshot-scoped views over the all/updated entity sets
#[derive(Debug, Clone, Copy)]
pub struct TrackableQuery<'a> {
    all: &'a [TrackedEntity],
    updated: &'a [TrackedEntity],
}

impl<'a> TrackableQuery<'a> {
    pub fn new(all: &'a [TrackedEntity], updated: &'a [TrackedEntity]) -> Self {
        Self { all, updated }
    }

    pub fn all(&self) -> &'a [TrackedEntity] {
        self.all
    }

    pub fn updated(&self) -> &'a [TrackedEntity] {
        self.updated
    }

    pub fn all_planes(&self, states: &[TrackingState]) -> Vec<&'a Plane> {
        planes(self.all, states)
    }

    pub fn updated_planes(&self, states: &[TrackingState]) -> Vec<&'a Plane> {
        planes(self.updated, states)
    }

    /// A plane was updated this snapshot and is tracking
    pub fn is_tracking_plane(&self) -> bool {
        !self.updated_planes(&[TrackingState::Tracking]).is_empty()
    }

    /// Any plane is tracking or temporarily paused
    pub fn has_tracked_plane(&self) -> bool {
        !self
            .all_planes(&[TrackingState::Tracking, TrackingState::Paused])
            .is_empty()
    }

    pub fn all_augmented_images(
        &self,
        state: Option<TrackingState>,
        method: Option<TrackingMethod>,
    ) -> Vec<&'a AugmentedImage> {
        augmented_images(self.all, state, method)
    }

    pub fn updated_augmented_images(
        &self,
        state: Option<TrackingState>,
        method: Option<TrackingMethod>,
    ) -> Vec<&'a AugmentedImage> {
        augmented_images(self.updated, state, method)
    }

    pub fn is_tracking_augmented_image(&self) -> bool {
        !self
            .updated_augmented_images(Some(TrackingState::Tracking), Some(TrackingMethod::FullTracking))
            .is_empty()
    }

    /// Any fully tracked image that is tracking or paused
    pub fn has_tracked_augmented_image(&self) -> bool {
        [TrackingState::Tracking, TrackingState::Paused].into_iter().any(|state| {
            !self
                .all_augmented_images(Some(state), Some(TrackingMethod::FullTracking))
                .is_empty()
        })
    }

    pub fn all_augmented_faces(&self, state: Option<TrackingState>) -> Vec<&'a AugmentedFace> {
        augmented_faces(self.all, state)
    }

    pub fn updated_augmented_faces(&self, state: Option<TrackingState>) -> Vec<&'a AugmentedFace> {
        augmented_faces(self.updated, state)
    }

    pub fn is_tracking_augmented_faces(&self) -> bool {
        !self.updated_augmented_faces(Some(TrackingState::Tracking)).is_empty()
    }

    pub fn has_tracked_augmented_faces(&self) -> bool {
        !self.all_augmented_faces(Some(TrackingState::Tracking)).is_empty()
    }
}
