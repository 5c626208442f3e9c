//! Math types for Sonance

pub use glam::{Quat, Vec3};

/// Listener orientation as a pair of "at" (forward) and "up" vectors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orientation {
    pub at: Vec3,
    pub up: Vec3,
}

impl Orientation {
    pub fn new(at: Vec3, up: Vec3) -> Self {
        Self { at, up }
    }

    pub fn identity() -> Self {
        Self {
            at: -Vec3::Z,
            up: Vec3::Y,
        }
    }

    /// Orientation of a listener rotated by `rotation` from the identity pose.
    pub fn from_rotation(rotation: Quat) -> Self {
        Self {
            at: rotation * (-Vec3::Z),
            up: rotation * Vec3::Y,
        }
    }

    pub fn right(&self) -> Vec3 {
        self.at.cross(self.up)
    }

    /// Faces `target` from `position` with the given `up` vector.
    pub fn look_at(position: Vec3, target: Vec3, up: Vec3) -> Self {
        Self {
            at: (target - position).normalize(),
            up,
        }
    }

    pub(crate) fn is_finite(&self) -> bool {
        self.at.is_finite() && self.up.is_finite()
    }
}

impl Default for Orientation {
    fn default() -> Self {
        Self::identity()
    }
}
