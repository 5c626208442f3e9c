use crate::error::{Result, SonanceError};
use crate::math::{Orientation, Quat, Vec3};

/// The listener (the "ears") of a context.
///
/// Every context has exactly one listener. Its gain scales the whole mix;
/// position, velocity and orientation are stored for spatial collaborators
/// and reported back unchanged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Listener {
    pub position: Vec3,
    pub velocity: Vec3,
    pub orientation: Orientation,
    pub gain: f32,
}

impl Default for Listener {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            orientation: Orientation::identity(),
            gain: 1.0,
        }
    }
}

impl Listener {
    /// Places the listener at `position`, rotated by `rotation` from facing -Z.
    pub fn from_pose(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            orientation: Orientation::from_rotation(rotation),
            ..Default::default()
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !self.gain.is_finite() || self.gain < 0.0 {
            return Err(SonanceError::InvalidValue(format!(
                "listener gain {} must be finite and non-negative",
                self.gain
            )));
        }
        if !self.position.is_finite() || !self.velocity.is_finite() || !self.orientation.is_finite()
        {
            return Err(SonanceError::InvalidValue(
                "listener vectors must be finite".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pose() {
        let rotation = Quat::from_rotation_y(std::f32::consts::PI);
        let listener = Listener::from_pose(Vec3::new(0.0, 1.5, 0.0), rotation);
        assert_eq!(listener.position, Vec3::new(0.0, 1.5, 0.0));
        assert!(listener.orientation.at.abs_diff_eq(Vec3::Z, 1e-5));
        assert!(listener.orientation.up.abs_diff_eq(Vec3::Y, 1e-5));
        assert_eq!(listener.gain, 1.0);
        assert!(listener.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let listener = Listener {
            gain: f32::INFINITY,
            ..Default::default()
        };
        assert!(matches!(listener.validate(), Err(SonanceError::InvalidValue(_))));

        let listener = Listener::from_pose(Vec3::ZERO, Quat::from_xyzw(f32::NAN, 0.0, 0.0, 1.0));
        assert!(listener.validate().is_err());
    }
}
