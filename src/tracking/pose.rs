//! Rigid world poses reported by the tracking provider

use glam::{Mat4, Quat, Vec3};

/// Translation + rotation from a local frame to world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub translation: Vec3,
    pub rotation: Quat,
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Pose {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    pub fn new(translation: Vec3, rotation: Quat) -> Self {
        Self {
            translation,
            rotation: rotation.normalize(),
        }
    }

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn position(&self) -> Vec3 {
        self.translation
    }

    /// Local +X in world space
    pub fn x_axis(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    /// Local +Y in world space
    pub fn y_axis(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    /// Local +Z in world space. For a camera this points backwards.
    pub fn z_axis(&self) -> Vec3 {
        self.rotation * Vec3::Z
    }

    /// Rotate a local direction into world space
    pub fn rotate_vector(&self, v: Vec3) -> Vec3 {
        self.rotation * v
    }

    /// Rotate a world direction into this pose's local frame
    pub fn inverse_rotate_vector(&self, v: Vec3) -> Vec3 {
        self.rotation.inverse() * v
    }

    /// Map a local point to world space
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        self.rotation * p + self.translation
    }

    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.inverse();
        Self {
            translation: rotation * -self.translation,
            rotation,
        }
    }

    /// `self * other`: apply `other` first, then `self`
    pub fn compose(&self, other: &Pose) -> Self {
        Self {
            translation: self.transform_point(other.translation),
            rotation: (self.rotation * other.rotation).normalize(),
        }
    }

    /// Euclidean distance between the two origins
    pub fn distance_to(&self, other: &Pose) -> f32 {
        self.translation.distance(other.translation)
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.translation)
    }
}
